//! Multi-agent task orchestration and sync/async execution bridging.
//!
//! A synchronous caller (a UI request handler, a CLI) hands tasks to the
//! [`Orchestrator`], which resolves them to registered agents and runs each
//! one on its own background worker through the [`ExecutionBridge`]. Status
//! and results are learned only by polling the [`TaskTracker`].
//!
//! # Main types
//!
//! - [`Orchestrator`]: Dispatch, handoff, self-test sweep and status.
//! - [`ExecutionBridge`]: Runs a unit of work on an isolated worker thread and runtime.
//! - [`TaskTracker`]: Concurrency-safe map of task records, queried by id.
//! - [`HandoffGraph`]: Per-originating-task handoff DAG with cycle prevention.
//! - [`AgentMonitor`]: Per-agent metrics, last result and last self-test.
//! - [`OrchestratorConfig`]: Tunables loaded from the `[orchestrator]` config section.

/// Worker management for synchronous callers.
pub mod bridge;
/// Orchestrator configuration.
pub mod config;
/// The orchestrator engine.
pub mod engine;
/// Handoff graph and cycle detection.
pub mod handoff;
/// Agent health and metrics monitoring.
pub mod monitor;
/// Task record bookkeeping.
pub mod tracker;

pub use bridge::ExecutionBridge;
pub use config::OrchestratorConfig;
pub use engine::Orchestrator;
pub use handoff::HandoffGraph;
pub use monitor::{AgentMetrics, AgentMonitor, AgentStatus, LastResult, SelfTestOutcome};
pub use tracker::{TaskSummary, TaskTracker};
