use crate::task::{Task, TaskId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The data a capability invocation is allowed to read.
///
/// A context owns a copy of its task and a snapshot of results produced by
/// earlier agents for the same originating task, keyed by agent name. It
/// exposes no mutators; an agent cannot alter another agent's entry.
#[derive(Debug, Clone)]
pub struct Context {
    task: Arc<Task>,
    dependencies: Arc<BTreeMap<String, serde_json::Value>>,
}

impl Context {
    /// Context for a task with no prior results.
    pub fn new(task: Task) -> Self {
        Self::for_task(task, BTreeMap::new())
    }

    /// Context for a task with a snapshot of prior agents' results.
    pub fn for_task(task: Task, dependencies: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            task: Arc::new(task),
            dependencies: Arc::new(dependencies),
        }
    }

    /// The task being executed.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Shorthand for `task().payload()`.
    pub fn payload(&self) -> &serde_json::Value {
        self.task.payload()
    }

    /// A caller-supplied parameter.
    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.task.params().get(key)
    }

    /// Result produced earlier by `agent` for the same originating task.
    pub fn dependency(&self, agent: &str) -> Option<&serde_json::Value> {
        self.dependencies.get(agent)
    }

    /// All prior results, keyed by agent name.
    pub fn dependencies(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.dependencies
    }

    /// Originating root task.
    pub fn origin(&self) -> TaskId {
        self.task.origin()
    }

    /// One-line description for log events.
    pub fn summary(&self) -> String {
        let payload_keys: Vec<&str> = self
            .task
            .payload()
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        let deps: Vec<&str> = self.dependencies.keys().map(String::as_str).collect();
        format!(
            "task={} origin={} depth={} payload_keys=[{}] deps=[{}]",
            self.task.id().short(),
            self.task.origin().short(),
            self.task.depth(),
            payload_keys.join(","),
            deps.join(",")
        )
    }
}
