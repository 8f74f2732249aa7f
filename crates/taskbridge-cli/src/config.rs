//! `taskbridge.toml` loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use taskbridge_builtins::BuiltinsConfig;
use taskbridge_core::{TaskbridgeError, TaskbridgeResult};
use taskbridge_orchestrator::OrchestratorConfig;

/// Environment variable consulted when `[email] smtp_host` is not set.
pub const SMTP_HOST_ENV: &str = "TASKBRIDGE_SMTP_HOST";

#[derive(Debug, Default, Deserialize)]
pub struct TaskbridgeConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub cli: CliConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

impl CliConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentsConfig {
    /// Agents registered as unavailable.
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_wait_timeout_ms() -> u64 {
    30_000
}

impl TaskbridgeConfig {
    /// Load the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> TaskbridgeResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            TaskbridgeError::Config(format!(
                "Failed to read config '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            TaskbridgeError::Config(format!(
                "Failed to parse config '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Options for `register_builtins`; `env_smtp_host` fills in a missing
    /// `[email] smtp_host`.
    pub fn builtins(&self, env_smtp_host: Option<String>) -> BuiltinsConfig {
        BuiltinsConfig {
            smtp_host: self.email.smtp_host.clone().or(env_smtp_host),
            disabled: self.agents.disabled.clone(),
        }
    }
}
