//! Runs asynchronous work on background workers for a synchronous caller.
//!
//! Every submitted unit of work gets its own OS thread driving its own
//! current-thread tokio runtime, so workers share no executor with each other
//! or with the caller. Completion is published into the [`TaskTracker`];
//! callers learn about it only by polling.

use crate::tracker::TaskTracker;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::thread;
use std::time::{Duration, Instant};
use taskbridge_core::{AgentResult, TaskId, TaskbridgeError, TaskbridgeResult};
use tracing::{debug, error, warn};

const DEFAULT_THREAD_PREFIX: &str = "taskbridge-worker";

/// Bridges a synchronous caller to asynchronous agent work.
#[derive(Clone)]
pub struct ExecutionBridge {
    tracker: TaskTracker,
    thread_prefix: String,
}

impl ExecutionBridge {
    /// Create a bridge publishing into `tracker`.
    pub fn new(tracker: TaskTracker) -> Self {
        Self {
            tracker,
            thread_prefix: DEFAULT_THREAD_PREFIX.to_string(),
        }
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_prefix = prefix.into();
        self
    }

    /// The tracker this bridge publishes into.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Start `work` on a fresh worker and return immediately.
    ///
    /// The record is created (running) before the worker starts, so
    /// `is_running(task_id)` is true as soon as this returns. Fails with
    /// `DuplicateTask` if `task_id` is already tracked, or `Io` if the worker
    /// thread cannot be spawned (no record is left behind).
    pub fn submit<F>(&self, task_id: TaskId, kind: &str, work: F) -> TaskbridgeResult<()>
    where
        F: Future<Output = AgentResult> + Send + 'static,
    {
        let generation = self.tracker.begin(task_id, kind)?;
        let tracker = self.tracker.clone();

        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.thread_prefix, task_id.short()))
            .spawn(move || {
                let start = Instant::now();
                let result = run_isolated(work)
                    .unwrap_or_else(|fault| {
                        error!(task_id = %task_id, error = %fault, "Worker fault converted to failure");
                        AgentResult::failure(fault, start.elapsed())
                    });
                if !tracker.complete(task_id, generation, result) {
                    debug!(task_id = %task_id, "Task untracked before completion, result dropped");
                }
            });

        match spawned {
            Ok(handle) => {
                self.tracker.attach_worker(task_id, generation, handle);
                Ok(())
            }
            Err(e) => {
                self.tracker.abandon(task_id, generation);
                Err(TaskbridgeError::Io(e))
            }
        }
    }

    /// True iff `task_id` is tracked and not yet finished.
    pub fn is_running(&self, task_id: TaskId) -> bool {
        self.tracker.is_running(task_id)
    }

    /// `None` while running, the terminal result once finished.
    pub fn result(&self, task_id: TaskId) -> TaskbridgeResult<Option<AgentResult>> {
        self.tracker.result(task_id)
    }

    /// Stop tracking `task_id`. Does not interrupt a running worker; its
    /// side effects still happen and its result is discarded.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        match self.tracker.remove(task_id) {
            Some(true) => {
                warn!(task_id = %task_id, "Cancelled running task; worker continues untracked");
                true
            }
            Some(false) => true,
            None => false,
        }
    }

    /// Remove a finished record and return its result.
    pub fn acknowledge(&self, task_id: TaskId) -> TaskbridgeResult<Option<AgentResult>> {
        self.tracker.acknowledge(task_id)
    }

    /// Poll until `task_id` finishes or `timeout` elapses.
    ///
    /// Blocks the calling thread; meant for non-interactive callers such as
    /// the CLI. Returns `Ok(None)` on timeout.
    pub fn wait(
        &self,
        task_id: TaskId,
        timeout: Duration,
        poll_interval: Duration,
    ) -> TaskbridgeResult<Option<AgentResult>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(result) = self.tracker.result(task_id)? {
                return Ok(Some(result));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(poll_interval.min(deadline - now));
        }
    }
}

/// Drive `work` to completion on a private current-thread runtime,
/// converting a panic into an error message.
pub(crate) fn run_isolated<F>(work: F) -> Result<F::Output, String>
where
    F: Future,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start worker runtime: {e}"))?;
    runtime
        .block_on(AssertUnwindSafe(work).catch_unwind())
        .map_err(|payload| format!("agent panicked: {}", panic_message(payload.as_ref())))
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
