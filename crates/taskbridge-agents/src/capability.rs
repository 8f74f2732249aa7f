use async_trait::async_trait;
use taskbridge_core::{AgentResult, Context};

/// Trait that every agent implements.
///
/// `execute` runs on a background worker with its own runtime, never on the
/// caller's thread; it may read only what `ctx` carries. Failures are
/// returned as [`AgentResult::failure`]; a panic is converted to a failure by
/// the worker guard but should not be relied upon.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Registered agent name.
    fn name(&self) -> &str;

    /// Perform the agent's work for one task.
    async fn execute(&self, ctx: &Context) -> AgentResult;

    /// Cheap synthetic invocation for health reporting. Must not touch
    /// persistent state.
    async fn self_test(&self) -> bool;

    /// Startup initialization check, run once at registration.
    ///
    /// Returning `Err(reason)` registers the agent as unavailable.
    fn readiness(&self) -> Result<(), String> {
        Ok(())
    }
}
