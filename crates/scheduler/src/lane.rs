use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;

/// A queued unit of work; the closure is invoked on the lane's drain task
/// and drives its own completion channel.
pub type QueuedJob = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// FIFO queue for one workspace. `draining` is true while a drain task owns
/// the lane; exactly one drain task runs at a time, which is what gives the
/// workspace its mutual exclusion.
#[derive(Default)]
pub struct Lane {
    queue: Mutex<VecDeque<QueuedJob>>,
    draining: AtomicBool,
}

impl Lane {
    /// Enqueue a job; returns true when the caller must spawn a drain task.
    pub fn push(&self, job: QueuedJob) -> bool {
        self.queue.lock().push_back(job);
        !self.draining.swap(true, Ordering::AcqRel)
    }

    pub fn pop(&self) -> Option<QueuedJob> {
        self.queue.lock().pop_front()
    }

    /// Release drain ownership; returns true if new work raced in and the
    /// caller should keep draining instead of exiting.
    pub fn release(&self) -> bool {
        self.draining.store(false, Ordering::Release);
        if self.queue.lock().is_empty() {
            false
        } else {
            // Re-acquire; if someone else already did, let them drain.
            !self.draining.swap(true, Ordering::AcqRel)
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_job() -> QueuedJob {
        Box::new(|| Box::pin(async {}))
    }

    #[test]
    fn first_push_claims_drain_ownership() {
        let lane = Lane::default();
        assert!(lane.push(noop_job()));
        assert!(!lane.push(noop_job()));
        assert_eq!(lane.len(), 2);
    }

    #[test]
    fn release_reports_raced_work() {
        let lane = Lane::default();
        lane.push(noop_job());
        lane.pop().unwrap();
        assert!(!lane.release());

        lane.push(noop_job());
        // Drain finished pop but a job raced in before release.
        lane.pop().unwrap();
        lane.queue.lock().push_back(noop_job());
        assert!(lane.release());
    }
}
