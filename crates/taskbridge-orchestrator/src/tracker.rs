use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use taskbridge_core::{AgentResult, TaskId, TaskbridgeError, TaskbridgeResult};

/// Lifecycle state of a tracked task.
///
/// The terminal result lives inside the `Finished` variant, so "finished"
/// and "result attached" flip together under one lock acquisition.
enum TaskState {
    Running {
        /// Detached when the record finishes or is removed.
        worker: Option<JoinHandle<()>>,
    },
    Finished(AgentResult),
}

/// Tracker bookkeeping for one task.
struct TaskRecord {
    kind: String,
    /// Distinguishes this record from any earlier, cancelled record with the
    /// same id whose worker may still be running.
    generation: u64,
    submitted_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    state: TaskState,
}

impl TaskRecord {
    fn is_running(&self) -> bool {
        matches!(self.state, TaskState::Running { .. })
    }
}

/// Listing row returned by [`TaskTracker::list_tasks`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub kind: String,
    pub running: bool,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Registry of outstanding and completed task records.
///
/// Cloning yields another handle to the same records. Every method takes the
/// lock for the duration of one read, insert, update or removal of a single
/// record (plus the full scan in `list_tasks`/`counts`); no lock is held
/// across agent work.
#[derive(Clone, Default)]
pub struct TaskTracker {
    records: Arc<Mutex<HashMap<TaskId, TaskRecord>>>,
    generations: Arc<AtomicU64>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a running record. Returns the record's generation.
    ///
    /// Fails with `DuplicateTask` if any record exists for `id`: a running
    /// id has its worker, and a finished id keeps its result until it is
    /// acknowledged or cancelled.
    pub(crate) fn begin(&self, id: TaskId, kind: &str) -> TaskbridgeResult<u64> {
        let mut records = self.records.lock();
        if records.contains_key(&id) {
            return Err(TaskbridgeError::DuplicateTask(id));
        }
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        records.insert(
            id,
            TaskRecord {
                kind: kind.to_string(),
                generation,
                submitted_at: Utc::now(),
                finished_at: None,
                state: TaskState::Running { worker: None },
            },
        );
        Ok(generation)
    }

    /// Store the worker handle, unless the record already finished or went away.
    pub(crate) fn attach_worker(&self, id: TaskId, generation: u64, handle: JoinHandle<()>) {
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(&id) {
            if record.generation == generation {
                if let TaskState::Running { worker } = &mut record.state {
                    *worker = Some(handle);
                }
            }
        }
    }

    /// Write the terminal result. Returns false when the record was removed
    /// (or replaced) while the worker ran, in which case the result is dropped.
    pub(crate) fn complete(&self, id: TaskId, generation: u64, result: AgentResult) -> bool {
        let mut records = self.records.lock();
        match records.get_mut(&id) {
            Some(record) if record.generation == generation && record.is_running() => {
                record.state = TaskState::Finished(result);
                record.finished_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Drop a record whose worker never started.
    pub(crate) fn abandon(&self, id: TaskId, generation: u64) {
        let mut records = self.records.lock();
        if records.get(&id).is_some_and(|r| r.generation == generation) {
            records.remove(&id);
        }
    }

    /// True iff a record exists for `id`, running or finished.
    pub fn contains(&self, id: TaskId) -> bool {
        self.records.lock().contains_key(&id)
    }

    /// True iff a record exists for `id` and has not finished.
    pub fn is_running(&self, id: TaskId) -> bool {
        self.records.lock().get(&id).is_some_and(TaskRecord::is_running)
    }

    /// `None` while running; the terminal result once finished.
    pub fn result(&self, id: TaskId) -> TaskbridgeResult<Option<AgentResult>> {
        let records = self.records.lock();
        let record = records.get(&id).ok_or(TaskbridgeError::UnknownTask(id))?;
        Ok(match &record.state {
            TaskState::Running { .. } => None,
            TaskState::Finished(result) => Some(result.clone()),
        })
    }

    /// Remove a record regardless of state. Returns whether it existed and
    /// whether it was still running.
    pub(crate) fn remove(&self, id: TaskId) -> Option<bool> {
        self.records.lock().remove(&id).map(|r| r.is_running())
    }

    /// Remove a finished record and hand back its result. A running record
    /// is left in place and `None` is returned.
    pub fn acknowledge(&self, id: TaskId) -> TaskbridgeResult<Option<AgentResult>> {
        let mut records = self.records.lock();
        let running = records
            .get(&id)
            .ok_or(TaskbridgeError::UnknownTask(id))?
            .is_running();
        if running {
            return Ok(None);
        }
        Ok(records.remove(&id).and_then(|r| match r.state {
            TaskState::Finished(result) => Some(result),
            TaskState::Running { .. } => None,
        }))
    }

    /// All tracked tasks in submission order.
    pub fn list_tasks(&self) -> Vec<TaskSummary> {
        let records = self.records.lock();
        let mut tasks: Vec<(u64, TaskSummary)> = records
            .iter()
            .map(|(id, r)| {
                (
                    r.generation,
                    TaskSummary {
                        task_id: *id,
                        kind: r.kind.clone(),
                        running: r.is_running(),
                        submitted_at: r.submitted_at,
                        finished_at: r.finished_at,
                    },
                )
            })
            .collect();
        tasks.sort_by_key(|(generation, _)| *generation);
        tasks.into_iter().map(|(_, t)| t).collect()
    }

    /// `(running, finished)` record counts.
    pub fn counts(&self) -> (usize, usize) {
        let records = self.records.lock();
        let running = records.values().filter(|r| r.is_running()).count();
        (running, records.len() - running)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
