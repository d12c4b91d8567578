//! Per-workspace concurrency scheduler.
//!
//! All work against one workspace id runs on a single FIFO lane — strict
//! submission order, no overlap, and a failed task never blocks its
//! successors. Across workspaces, total parallelism is bounded by a global
//! semaphore so resource consumption stays capped no matter how many
//! workspaces are live. An idle workspace costs nothing beyond its lane
//! entry.

mod lane;
pub mod metrics;

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{oneshot, Semaphore};
use tracing::warn;

use lane::Lane;
use tabweaver_core_types::WorkspaceId;

pub use lane::QueuedJob;

pub const DEFAULT_GLOBAL_SLOTS: usize = 4;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("scheduled task was dropped before completion")]
    Dropped,
}

pub struct WorkspaceScheduler {
    lanes: DashMap<WorkspaceId, Arc<Lane>>,
    global_slots: Arc<Semaphore>,
}

impl WorkspaceScheduler {
    pub fn new(global_slots: usize) -> Arc<Self> {
        Arc::new(Self {
            lanes: DashMap::new(),
            global_slots: Arc::new(Semaphore::new(global_slots.max(1))),
        })
    }

    /// Append a task to the workspace's FIFO lane and await its result.
    ///
    /// The task starts only once every earlier task for the same workspace
    /// has finished (regardless of their outcomes) and a global slot is
    /// available.
    pub async fn run<T, F>(self: &Arc<Self>, workspace: &WorkspaceId, task: F) -> Result<T, ScheduleError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: QueuedJob = Box::new(move || {
            Box::pin(async move {
                let output = task.await;
                // Receiver gone means the submitter stopped waiting; the
                // task still ran to completion in order.
                let _ = tx.send(output);
            })
        });

        let lane = self
            .lanes
            .entry(workspace.clone())
            .or_insert_with(|| Arc::new(Lane::default()))
            .clone();
        metrics::record_enqueued();
        if lane.push(job) {
            let scheduler = Arc::clone(self);
            let workspace = workspace.clone();
            tokio::spawn(async move {
                scheduler.drain(workspace, lane).await;
            });
        }

        rx.await.map_err(|_| ScheduleError::Dropped)
    }

    /// Pop-and-run loop owning one lane until it is empty.
    async fn drain(self: Arc<Self>, workspace: WorkspaceId, lane: Arc<Lane>) {
        loop {
            match lane.pop() {
                Some(job) => {
                    let permit = match self.global_slots.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!(%workspace, "scheduler semaphore closed, dropping lane");
                            return;
                        }
                    };
                    metrics::record_started();
                    job().await;
                    metrics::record_completed();
                    drop(permit);
                }
                None => {
                    if !lane.release() {
                        return;
                    }
                }
            }
        }
    }

    /// Queued (not yet started) tasks for one workspace.
    pub fn pending(&self, workspace: &WorkspaceId) -> usize {
        self.lanes
            .get(workspace)
            .map(|lane| lane.len())
            .unwrap_or(0)
    }

    pub fn available_slots(&self) -> usize {
        self.global_slots.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn returns_task_output() {
        let scheduler = WorkspaceScheduler::new(4);
        let workspace = WorkspaceId::new();
        let out = scheduler.run(&workspace, async { 41 + 1 }).await.unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn same_workspace_runs_in_submission_order_without_overlap() {
        let scheduler = WorkspaceScheduler::new(8);
        let workspace = WorkspaceId::new();
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let log = Arc::clone(&log);
            let scheduler = Arc::clone(&scheduler);
            let workspace = workspace.clone();
            handles.push(tokio::spawn(async move {
                scheduler
                    .run(&workspace, async move {
                        log.lock().push(format!("start {i}"));
                        sleep(Duration::from_millis(10)).await;
                        log.lock().push(format!("end {i}"));
                    })
                    .await
                    .unwrap();
            }));
            // Stagger submissions so submission order is well-defined.
            sleep(Duration::from_millis(2)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let log = log.lock();
        let expected: Vec<String> = (0..5)
            .flat_map(|i| vec![format!("start {i}"), format!("end {i}")])
            .collect();
        assert_eq!(*log, expected);
    }

    #[tokio::test]
    async fn failed_tasks_do_not_block_successors() {
        let scheduler = WorkspaceScheduler::new(2);
        let workspace = WorkspaceId::new();

        let first: Result<(), String> = scheduler
            .run(&workspace, async { Err("boom".to_string()) })
            .await
            .unwrap();
        assert!(first.is_err());

        let second = scheduler.run(&workspace, async { "fine" }).await.unwrap();
        assert_eq!(second, "fine");
    }

    #[tokio::test]
    async fn distinct_workspaces_interleave() {
        let scheduler = WorkspaceScheduler::new(4);
        let ws_a = WorkspaceId::new();
        let ws_b = WorkspaceId::new();
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let slow = {
            let log = Arc::clone(&log);
            let scheduler = Arc::clone(&scheduler);
            let ws = ws_a.clone();
            tokio::spawn(async move {
                scheduler
                    .run(&ws, async move {
                        log.lock().push("a-start");
                        sleep(Duration::from_millis(50)).await;
                        log.lock().push("a-end");
                    })
                    .await
                    .unwrap();
            })
        };
        sleep(Duration::from_millis(5)).await;
        scheduler
            .run(&ws_b, {
                let log = Arc::clone(&log);
                async move {
                    log.lock().push("b");
                }
            })
            .await
            .unwrap();
        slow.await.unwrap();

        let log = log.lock();
        assert_eq!(*log, vec!["a-start", "b", "a-end"]);
    }

    #[tokio::test]
    async fn global_slots_bound_cross_workspace_parallelism() {
        let scheduler = WorkspaceScheduler::new(1);
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let scheduler = Arc::clone(&scheduler);
            let log = Arc::clone(&log);
            let workspace = WorkspaceId::new();
            handles.push(tokio::spawn(async move {
                scheduler
                    .run(&workspace, async move {
                        log.lock().push("start");
                        sleep(Duration::from_millis(10)).await;
                        log.lock().push("end");
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // With one slot, starts and ends must strictly alternate.
        let log = log.lock();
        for pair in log.chunks(2) {
            assert_eq!(pair, ["start", "end"]);
        }
    }
}
