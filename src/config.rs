//! Agent configuration: defaults, optional JSON file, `TABWEAVER_*`
//! environment overrides — merged in that order.

use std::path::Path;
use std::time::Duration;

use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub wait: WaitConfig,
    pub human: HumanConfig,
    pub scheduler: SchedulerConfig,
    pub bind: BindConfig,
    pub trace: TraceConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub timeout_ms: u64,
    pub visible_timeout_ms: u64,
    pub navigate_timeout_ms: u64,
    /// Parsed but not consumed by the engine; retry policy belongs to
    /// callers at the step-list level.
    pub retry: RetryConfig,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            visible_timeout_ms: 5_000,
            navigate_timeout_ms: 30_000,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max: 0,
            backoff_ms: 300,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HumanConfig {
    pub enabled: bool,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
}

impl Default for HumanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_min_ms: 50,
            delay_max_ms: 200,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub global_slots: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            global_slots: tabweaver_scheduler::DEFAULT_GLOBAL_SLOTS,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    pub token_poll_attempts: u32,
    pub token_poll_interval_ms: u64,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            token_poll_attempts: 10,
            token_poll_interval_ms: 100,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub log_ops: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { log_ops: true }
    }
}

impl AgentConfig {
    /// Load configuration; a missing file is fine, environment always wins.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("tabweaver").required(false)),
        };
        builder = builder.add_source(Environment::with_prefix("TABWEAVER").separator("__"));
        builder.build()?.try_deserialize()
    }

    pub fn wait_timeouts(&self) -> trace_tools::WaitTimeouts {
        trace_tools::WaitTimeouts {
            action: Duration::from_millis(self.wait.timeout_ms),
            visible: Duration::from_millis(self.wait.visible_timeout_ms),
            navigate: Duration::from_millis(self.wait.navigate_timeout_ms),
        }
    }

    pub fn human_policy(&self) -> step_engine::HumanPolicy {
        step_engine::HumanPolicy {
            enabled: self.human.enabled,
            delay_min_ms: self.human.delay_min_ms,
            delay_max_ms: self.human.delay_max_ms,
        }
    }

    pub fn bind_policy(&self) -> tabweaver_registry::BindPolicy {
        tabweaver_registry::BindPolicy {
            token_poll_attempts: self.bind.token_poll_attempts,
            token_poll_interval: Duration::from_millis(self.bind.token_poll_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_any_source() {
        let config = AgentConfig::default();
        assert_eq!(config.wait.timeout_ms, 5_000);
        assert!(config.human.enabled);
        assert_eq!(config.scheduler.global_slots, 4);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"human": {{"enabled": false}}, "scheduler": {{"global_slots": 9}}}}"#
        )
        .unwrap();
        let config = AgentConfig::load(Some(file.path())).unwrap();
        assert!(!config.human.enabled);
        assert_eq!(config.scheduler.global_slots, 9);
        // Untouched sections keep their defaults.
        assert_eq!(config.bind.token_poll_attempts, 10);
    }
}
