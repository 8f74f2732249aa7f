use crate::task::TaskId;
use thiserror::Error;

/// A convenience `Result` alias using [`TaskbridgeError`].
pub type TaskbridgeResult<T> = Result<T, TaskbridgeError>;

/// Top-level error type for the Taskbridge framework.
///
/// Registry and orchestrator variants are returned synchronously to the
/// caller of `register`/`get`/`dispatch`/`handoff`. Failures inside a worker
/// never surface as a `TaskbridgeError`; they are captured into the task's
/// terminal [`AgentResult`](crate::AgentResult).
#[derive(Error, Debug)]
pub enum TaskbridgeError {
    /// An agent with this name is already registered.
    #[error("Duplicate agent name: {0}")]
    DuplicateName(String),

    /// No agent with this name is registered.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// The agent is registered but its startup dependencies were not met.
    #[error("Agent '{name}' is unavailable: {reason}")]
    AgentUnavailable {
        /// Registered agent name.
        name: String,
        /// Why the agent could not be initialized.
        reason: String,
    },

    /// A task with this identifier is already running.
    #[error("Task {0} is already running")]
    DuplicateTask(TaskId),

    /// The task identifier was never submitted, or was already reaped.
    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    /// Adding the handoff edge would create a cycle for the originating task.
    #[error("Handoff cycle: '{from}' -> '{to}' (originating task {origin})")]
    HandoffCycle {
        /// Agent handing off.
        from: String,
        /// Agent receiving the handoff.
        to: String,
        /// Root of the handoff graph.
        origin: TaskId,
    },

    /// A failure raised from inside a capability's `execute`.
    #[error("Agent execution error: {0}")]
    AgentExecution(String),

    /// An orchestration constraint was violated (e.g. handoff depth).
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error (e.g. a worker thread failed to spawn).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
