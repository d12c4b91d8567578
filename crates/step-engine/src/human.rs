//! Human-like pacing between interactions.

use std::time::Duration;

use rand::Rng;

/// Randomized delay injected after clicks and key presses so replayed
/// interaction timing does not look machine-regular.
#[derive(Clone, Debug)]
pub struct HumanPolicy {
    pub enabled: bool,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
}

impl Default for HumanPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_min_ms: 50,
            delay_max_ms: 200,
        }
    }
}

impl HumanPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            delay_min_ms: 0,
            delay_max_ms: 0,
        }
    }

    /// Sleep a random duration drawn from the configured range; no-op when
    /// the policy is off.
    pub async fn pause(&self) {
        if !self.enabled {
            return;
        }
        let lo = self.delay_min_ms.min(self.delay_max_ms);
        let hi = self.delay_min_ms.max(self.delay_max_ms);
        let ms = rand::thread_rng().gen_range(lo..=hi);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn disabled_policy_does_not_sleep() {
        let started = Instant::now();
        HumanPolicy::disabled().pause().await;
        assert!(started.elapsed() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn pause_stays_within_configured_range() {
        let policy = HumanPolicy {
            enabled: true,
            delay_min_ms: 10,
            delay_max_ms: 30,
        };
        let started = Instant::now();
        policy.pause().await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_millis(300));
    }
}
