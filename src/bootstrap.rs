//! Process wiring: one dependency graph built at startup and handed to
//! every surface. No settable globals.

use std::sync::Arc;

use page_port::PageFactory;
use runtime_bind::PageBinder;
use step_engine::Runner;
use tabweaver_adapters::{AgentDeps, ScopeContext};
use tabweaver_event_bus::BroadcastBus;
use tabweaver_registry::Registry;
use tabweaver_scheduler::WorkspaceScheduler;
use trace_tools::{BusSink, LogSink, TraceEvent, TraceHooks, TraceSink};

use crate::config::AgentConfig;

pub struct Agent {
    pub deps: Arc<AgentDeps>,
    pub ctx: Arc<ScopeContext>,
    /// Live trace feed; subscribe for record/observability consumers.
    pub trace_bus: Arc<BroadcastBus<TraceEvent>>,
}

pub fn build_agent(config: &AgentConfig, factory: Arc<dyn PageFactory>) -> Agent {
    let registry = Registry::with_bind_policy(factory, config.bind_policy());
    let trace_bus: Arc<BroadcastBus<TraceEvent>> = BroadcastBus::new(256);

    let mut sinks: Vec<Arc<dyn TraceSink>> =
        vec![Arc::new(BusSink::new(Arc::clone(&trace_bus)))];
    if config.trace.log_ops {
        sinks.push(Arc::new(LogSink));
    }

    let binder = PageBinder::new(
        Arc::clone(&registry),
        sinks,
        TraceHooks::default(),
        config.wait_timeouts(),
    );
    let scheduler = WorkspaceScheduler::new(config.scheduler.global_slots);
    let runner = Runner::new(
        Arc::clone(&registry),
        Arc::clone(&binder),
        scheduler,
        config.human_policy(),
    );

    let prom = prometheus::default_registry();
    tabweaver_registry::metrics::register_metrics(prom);
    tabweaver_scheduler::metrics::register_metrics(prom);

    Agent {
        deps: AgentDeps::new(registry, binder, runner),
        ctx: ScopeContext::new(),
        trace_bus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::mock::MemoryBrowser;

    #[tokio::test]
    async fn agent_wiring_is_usable_end_to_end() {
        let config = AgentConfig::default();
        let agent = build_agent(&config, MemoryBrowser::new());
        let workspace = agent
            .ctx
            .resolve_workspace(&agent.deps, None)
            .await
            .unwrap();
        assert!(agent.deps.registry.workspace_exists(&workspace));
    }
}
