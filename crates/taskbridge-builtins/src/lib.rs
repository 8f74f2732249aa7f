//! Built-in agents for the Taskbridge framework.
//!
//! These are deterministic stand-ins for the job-application agents: they
//! validate their inputs, combine the payload with earlier agents' results
//! and return structured JSON, without calling any external service. They
//! keep the CLI and tests runnable end to end.
//!
//! # Main entry points
//!
//! - [`register_builtins()`]: Register all built-in agents, honoring [`BuiltinsConfig`].

/// Cover letter drafting agent.
pub mod cover_letter;
/// Email drafting agent (requires SMTP configuration).
pub mod email;
/// Job listing search agent.
pub mod job_search;
/// Resume tailoring agent.
pub mod resume;

mod fields;

pub use cover_letter::CoverLetterAgent;
pub use email::EmailAgent;
pub use job_search::JobSearchAgent;
pub use resume::ResumeAgent;

use serde::Deserialize;
use std::sync::Arc;
use taskbridge_agents::{AgentRegistry, Capability};
use taskbridge_core::TaskbridgeResult;

/// Names of all built-in agents, in registration order.
pub const BUILTIN_AGENTS: [&str; 4] = ["resume", "cover_letter", "job_search", "email"];

/// Startup options for the built-in agents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuiltinsConfig {
    /// SMTP host for the email agent; without one it registers unavailable.
    #[serde(default)]
    pub smtp_host: Option<String>,
    /// Agents to register as unavailable.
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// Register every built-in agent.
///
/// Agents listed in `config.disabled` are registered unavailable, so
/// dispatching to them yields `AgentUnavailable` rather than `UnknownAgent`.
pub fn register_builtins(
    registry: &mut AgentRegistry,
    config: &BuiltinsConfig,
) -> TaskbridgeResult<()> {
    let agents: Vec<Arc<dyn Capability>> = vec![
        Arc::new(ResumeAgent::new()),
        Arc::new(CoverLetterAgent::new()),
        Arc::new(JobSearchAgent::new()),
        Arc::new(EmailAgent::new(config.smtp_host.clone())),
    ];

    for agent in agents {
        let name = agent.name().to_string();
        if config.disabled.iter().any(|d| d == &name) {
            registry.register_unavailable(name, agent, "disabled by configuration")?;
        } else {
            registry.register(name, agent)?;
        }
    }
    Ok(())
}
