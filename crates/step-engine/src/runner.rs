//! Orchestrates a step list against one workspace: scheduler lane, per-step
//! telemetry, stop-on-error, and the advisory replay-cancel flag.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use runtime_bind::PageBinder;
use tabweaver_core_types::{OpError, WorkspaceId};
use tabweaver_registry::Registry;
use tabweaver_scheduler::WorkspaceScheduler;

use crate::exec::{execute_step, StepCtx};
use crate::human::HumanPolicy;
use crate::result::{RunOptions, RunOutcome, StepResult};
use crate::step::Step;

#[derive(Clone)]
pub struct Runner {
    registry: Arc<Registry>,
    binder: Arc<PageBinder>,
    scheduler: Arc<WorkspaceScheduler>,
    human: HumanPolicy,
    cancels: Arc<DashMap<WorkspaceId, CancellationToken>>,
}

impl Runner {
    pub fn new(
        registry: Arc<Registry>,
        binder: Arc<PageBinder>,
        scheduler: Arc<WorkspaceScheduler>,
        human: HumanPolicy,
    ) -> Self {
        Self {
            registry,
            binder,
            scheduler,
            human,
            cancels: Arc::new(DashMap::new()),
        }
    }

    /// Run a step list under the workspace's FIFO lane. The error position
    /// is reserved for scheduling failures; step failures are data inside
    /// the outcome.
    pub async fn run_steps(
        &self,
        workspace: &WorkspaceId,
        steps: Vec<Step>,
        options: RunOptions,
    ) -> Result<RunOutcome, OpError> {
        let runner = self.clone();
        let ws = workspace.clone();
        self.scheduler
            .run(workspace, async move { runner.run_list(ws, steps, options).await })
            .await
            .map_err(|err| OpError::internal(err.to_string()))
    }

    /// Mark the workspace's current replay as cancelled. Advisory only: the
    /// in-flight engine call finishes, remaining steps are skipped.
    pub fn cancel_replay(&self, workspace: &WorkspaceId) {
        if let Some(token) = self.cancels.get(workspace) {
            token.value().cancel();
        }
    }

    fn cancel_token(&self, workspace: &WorkspaceId) -> CancellationToken {
        let mut entry = self
            .cancels
            .entry(workspace.clone())
            .or_insert_with(CancellationToken::new);
        if entry.value().is_cancelled() {
            // A cancel aimed at a previous run must not poison this one.
            *entry.value_mut() = CancellationToken::new();
        }
        entry.value().clone()
    }

    async fn run_list(
        &self,
        workspace: WorkspaceId,
        steps: Vec<Step>,
        options: RunOptions,
    ) -> RunOutcome {
        let cancel = self.cancel_token(&workspace);
        let mut results = Vec::with_capacity(steps.len());
        info!(%workspace, steps = steps.len(), "running step list");

        for step in &steps {
            if cancel.is_cancelled() {
                warn!(%workspace, "replay cancelled, skipping remaining steps");
                break;
            }
            let started = Instant::now();
            let kind = step.kind.name();
            let outcome = match self.binder.ensure_active_page(&workspace).await {
                Ok(binding) => {
                    binding.tools.emit_step_start(&step.id, kind);
                    let ctx = StepCtx {
                        registry: &self.registry,
                        human: &self.human,
                        workspace: &workspace,
                    };
                    let result = execute_step(&ctx, &binding, step).await;
                    binding.tools.emit_step_end(
                        &step.id,
                        kind,
                        result.is_ok(),
                        started.elapsed().as_millis() as u64,
                        result.as_ref().err(),
                    );
                    result
                }
                Err(err) => Err(err.into_op_error()),
            };

            let result = match outcome {
                Ok(data) => StepResult::success(step.id.clone(), data),
                Err(error) => StepResult::failure(step.id.clone(), error),
            };
            let failed = !result.ok;
            results.push(result);
            if failed && options.stop_on_error {
                break;
            }
        }

        let ok = results.iter().all(|result| result.ok);
        RunOutcome { ok, results }
    }
}
