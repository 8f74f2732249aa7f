use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestrator tuning, loaded from the `[orchestrator]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard per-agent limit for `self_test_all`.
    #[serde(default = "default_self_test_timeout_ms")]
    pub self_test_timeout_ms: u64,
    /// Worker thread name prefix.
    #[serde(default = "default_worker_thread_prefix")]
    pub worker_thread_prefix: String,
    /// Maximum handoff chain depth below an originating task.
    #[serde(default = "default_max_handoff_depth")]
    pub max_handoff_depth: u32,
}

fn default_self_test_timeout_ms() -> u64 {
    5_000
}

fn default_worker_thread_prefix() -> String {
    "taskbridge-worker".to_string()
}

fn default_max_handoff_depth() -> u32 {
    8
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            self_test_timeout_ms: default_self_test_timeout_ms(),
            worker_thread_prefix: default_worker_thread_prefix(),
            max_handoff_depth: default_max_handoff_depth(),
        }
    }
}

impl OrchestratorConfig {
    pub fn self_test_timeout(&self) -> Duration {
        Duration::from_millis(self.self_test_timeout_ms)
    }

    pub fn with_self_test_timeout(mut self, timeout: Duration) -> Self {
        self.self_test_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_handoff_depth(mut self, depth: u32) -> Self {
        self.max_handoff_depth = depth;
        self
    }
}
