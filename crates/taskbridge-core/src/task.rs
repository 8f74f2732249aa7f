use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of a task. Generated once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, used for thread names and compact log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A unit of work requested by a caller.
///
/// Fields are private: a task is immutable once built. `kind` names the
/// agent (and action) that should handle it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    kind: String,
    payload: serde_json::Value,
    #[serde(default)]
    params: HashMap<String, serde_json::Value>,
    created_at: DateTime<Utc>,
    /// Task that handed this one off, if any.
    #[serde(default)]
    parent: Option<TaskId>,
    /// Root of the handoff chain. Equal to `id` for a root task.
    origin: TaskId,
    /// Depth in the handoff chain (0 = root task).
    #[serde(default)]
    depth: u32,
}

impl Task {
    /// Create a root task.
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        let id = TaskId::new();
        Self {
            id,
            kind: kind.into(),
            payload,
            params: HashMap::new(),
            created_at: Utc::now(),
            parent: None,
            origin: id,
            depth: 0,
        }
    }

    /// Create a task handed off from `parent`. It shares the parent's origin.
    pub fn subtask(parent: &Task, kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: TaskId::new(),
            kind: kind.into(),
            payload,
            params: parent.params.clone(),
            created_at: Utc::now(),
            parent: Some(parent.id),
            origin: parent.origin,
            depth: parent.depth + 1,
        }
    }

    /// Attach a caller-supplied parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Attach several caller-supplied parameters.
    pub fn with_params(mut self, params: HashMap<String, serde_json::Value>) -> Self {
        self.params.extend(params);
        self
    }

    /// Task identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Agent name / action.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Caller payload.
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Caller-supplied parameters.
    pub fn params(&self) -> &HashMap<String, serde_json::Value> {
        &self.params
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Parent task, for handed-off tasks.
    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    /// Originating root task.
    pub fn origin(&self) -> TaskId {
        self.origin
    }

    /// Whether this task is the root of its handoff chain.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Depth in the handoff chain.
    pub fn depth(&self) -> u32 {
        self.depth
    }
}
