use serde::{Deserialize, Serialize};

use crate::convergence::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Exponential,
    Linear,
    Fixed,
}

/// When a completed run leaves a completion marker behind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPolicy {
    /// Every completed run, even one with failed operations.
    #[default]
    Always,
    /// Only runs with zero failures; a later boot retries otherwise.
    OnSuccess,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconcilerConfig {
    pub name: String,
    /// Foreground readiness wait.
    pub readiness: RetryPolicy,
    /// Interval between background watcher polls.
    pub poll_interval_secs: u64,
    pub marker_policy: MarkerPolicy,
    /// How long a freshly detached watcher waits for the lock to be handed over.
    pub adopt_timeout_ms: u64,
}

/// Partial override read from `<config_dir>/<name>.yaml`. Absent fields keep
/// the compiled-in value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverride {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    #[serde(default)]
    pub strategy: Option<BackoffStrategy>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub marker_policy: Option<MarkerPolicy>,
}

impl ReconcilerConfig {
    pub fn apply(&mut self, o: &ConfigOverride) {
        if let Some(v) = o.max_attempts {
            self.readiness.max_attempts = v;
        }
        if let Some(v) = o.base_delay_ms {
            self.readiness.base_delay_ms = v;
        }
        if let Some(v) = o.max_delay_ms {
            self.readiness.max_delay_ms = v;
        }
        if let Some(v) = o.strategy {
            self.readiness.strategy = v;
        }
        if let Some(v) = o.poll_interval_secs {
            self.poll_interval_secs = v;
        }
        if let Some(v) = o.marker_policy {
            self.marker_policy = v;
        }
    }

    /// Reject timings the watcher and retry loop cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be at least 1".to_string());
        }
        if self.readiness.max_delay_ms < self.readiness.base_delay_ms {
            return Err(format!(
                "max_delay_ms ({}) is below base_delay_ms ({})",
                self.readiness.max_delay_ms, self.readiness.base_delay_ms
            ));
        }
        Ok(())
    }
}
