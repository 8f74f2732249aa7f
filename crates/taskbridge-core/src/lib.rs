//! Core types and error definitions for the Taskbridge framework.
//!
//! This crate provides the foundational types shared across all Taskbridge
//! crates: the unit of work a caller submits, the read-only context a
//! capability receives, the outcome it produces, and the unified error enum.
//!
//! # Main types
//!
//! - [`TaskbridgeError`]: Unified error enum for all Taskbridge subsystems.
//! - [`TaskbridgeResult`]: Convenience alias for `Result<T, TaskbridgeError>`.
//! - [`TaskId`]: Unique, never reused identifier of a task.
//! - [`Task`]: An immutable request for an agent to do work.
//! - [`Context`]: What a capability invocation is allowed to read.
//! - [`AgentResult`]: Outcome of one capability invocation.

/// Read-only invocation context.
pub mod context;
/// Unified error type.
pub mod error;
/// Outcome of a capability invocation.
pub mod result;
/// Task and task identifier types.
pub mod task;

pub use context::Context;
pub use error::{TaskbridgeError, TaskbridgeResult};
pub use result::AgentResult;
pub use task::{Task, TaskId};
