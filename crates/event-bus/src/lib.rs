//! In-process broadcast bus used to fan trace and lifecycle events out to
//! observers without coupling the emitting layer to any particular sink.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

#[derive(Debug, Error)]
pub enum BusError {
    #[error("no active subscribers")]
    NoSubscribers,
}

/// Payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<usize, BusError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// Broadcast-backed bus; dropped when the last sender handle goes away.
pub struct BroadcastBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> BroadcastBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Synchronous publish for callers already inside non-async emit paths.
    /// An event published with nobody listening is dropped silently.
    pub fn emit(&self, event: E) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for BroadcastBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<usize, BusError> {
        self.sender.send(event).map_err(|_| BusError::NoSubscribers)
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Bridge a broadcast subscription into an mpsc receiver so callers can await
/// events without handling lag/closed broadcast semantics directly.
pub fn to_mpsc<E>(bus: Arc<BroadcastBus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event bus subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    out_rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus: Arc<BroadcastBus<String>> = BroadcastBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let delivered = bus.publish("hello".to_string()).await.unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(a.recv().await.unwrap(), "hello");
        assert_eq!(b.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_dropped() {
        let bus: Arc<BroadcastBus<u32>> = BroadcastBus::new(4);
        assert_eq!(bus.emit(7), 0);
    }

    #[tokio::test]
    async fn mpsc_bridge_delivers_in_order() {
        let bus: Arc<BroadcastBus<u32>> = BroadcastBus::new(16);
        let mut rx = to_mpsc(Arc::clone(&bus), 16);

        for i in 0..5 {
            bus.emit(i);
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap(), i);
        }
    }
}
