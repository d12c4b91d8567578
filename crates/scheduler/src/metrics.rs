use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounter, IntGauge, Registry};
use tracing::error;

lazy_static! {
    static ref SCHED_ENQUEUED: IntCounter =
        IntCounter::new("tw_scheduler_enqueued_total", "Tasks enqueued").unwrap();
    static ref SCHED_COMPLETED: IntCounter =
        IntCounter::new("tw_scheduler_completed_total", "Tasks completed").unwrap();
    static ref SCHED_INFLIGHT: IntGauge =
        IntGauge::new("tw_scheduler_inflight", "Tasks currently executing").unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register scheduler metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, SCHED_ENQUEUED.clone());
    register(registry, SCHED_COMPLETED.clone());
    register(registry, SCHED_INFLIGHT.clone());
}

pub fn record_enqueued() {
    SCHED_ENQUEUED.inc();
}

pub fn record_started() {
    SCHED_INFLIGHT.inc();
}

pub fn record_completed() {
    SCHED_COMPLETED.inc();
    SCHED_INFLIGHT.dec();
}
