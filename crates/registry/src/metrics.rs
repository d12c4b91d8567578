use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounter, IntGauge, Registry};
use tracing::error;

lazy_static! {
    static ref REGISTRY_WORKSPACES_TOTAL: IntGauge =
        IntGauge::new("tw_registry_workspaces_total", "Active workspaces").unwrap();
    static ref REGISTRY_TABS_TOTAL: IntGauge =
        IntGauge::new("tw_registry_tabs_total", "Active tabs").unwrap();
    static ref REGISTRY_PAGES_BOUND: IntCounter =
        IntCounter::new("tw_registry_pages_bound_total", "Pages bound to tokens").unwrap();
    static ref REGISTRY_TABS_CLOSED: IntCounter =
        IntCounter::new("tw_registry_tabs_closed_total", "Tabs closed").unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register registry metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, REGISTRY_WORKSPACES_TOTAL.clone());
    register(registry, REGISTRY_TABS_TOTAL.clone());
    register(registry, REGISTRY_PAGES_BOUND.clone());
    register(registry, REGISTRY_TABS_CLOSED.clone());
}

pub fn set_workspace_count(count: usize) {
    REGISTRY_WORKSPACES_TOTAL.set(count as i64);
}

pub fn set_tab_count(count: usize) {
    REGISTRY_TABS_TOTAL.set(count as i64);
}

pub fn record_page_bound() {
    REGISTRY_PAGES_BOUND.inc();
}

pub fn record_tab_closed() {
    REGISTRY_TABS_CLOSED.inc();
}
