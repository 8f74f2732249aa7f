use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use taskbridge_core::{AgentResult, TaskId};

/// Outcome of one agent's self-test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum SelfTestOutcome {
    Passed,
    Failed,
    TimedOut,
    /// The self-test panicked or its worker could not start.
    Faulted(String),
    /// The agent is registered unavailable and was not invoked.
    Unavailable(String),
}

impl SelfTestOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, SelfTestOutcome::Passed)
    }
}

/// Summary of the most recent terminal result for an agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastResult {
    pub task_id: TaskId,
    pub success: bool,
    pub duration_ms: u64,
    pub summary: String,
    pub finished_at: DateTime<Utc>,
}

/// Per-agent counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentMetrics {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub running: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
struct AgentStats {
    metrics: AgentMetrics,
    last_result: Option<LastResult>,
    last_self_test: Option<SelfTestOutcome>,
}

/// Health view of one agent as returned by `Orchestrator::status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
    pub last_result: Option<LastResult>,
    pub last_self_test: Option<SelfTestOutcome>,
    pub metrics: AgentMetrics,
}

/// Tracks per-agent metrics and last outcomes.
///
/// Written from worker threads on completion and read by the caller; each
/// method holds the lock for one map update or one snapshot.
#[derive(Default)]
pub struct AgentMonitor {
    stats: Mutex<HashMap<String, AgentStats>>,
}

impl AgentMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of one invocation of `agent`.
    pub fn record_start(&self, agent: &str) {
        let mut stats = self.stats.lock();
        let entry = stats.entry(agent.to_string()).or_default();
        entry.metrics.dispatched += 1;
        entry.metrics.running += 1;
    }

    /// Undo a `record_start` whose submission was rejected.
    pub fn record_rejected(&self, agent: &str) {
        let mut stats = self.stats.lock();
        if let Some(entry) = stats.get_mut(agent) {
            entry.metrics.dispatched = entry.metrics.dispatched.saturating_sub(1);
            entry.metrics.running = entry.metrics.running.saturating_sub(1);
        }
    }

    /// Record the terminal result of one invocation of `agent`.
    pub fn record_finish(&self, agent: &str, task_id: TaskId, result: &AgentResult) {
        let mut stats = self.stats.lock();
        let entry = stats.entry(agent.to_string()).or_default();
        entry.metrics.running = entry.metrics.running.saturating_sub(1);
        entry.metrics.duration_ms += result.duration_ms();
        if result.is_success() {
            entry.metrics.succeeded += 1;
        } else {
            entry.metrics.failed += 1;
        }
        entry.last_result = Some(LastResult {
            task_id,
            success: result.is_success(),
            duration_ms: result.duration_ms(),
            summary: result.summary(),
            finished_at: Utc::now(),
        });
    }

    pub fn record_self_test(&self, agent: &str, outcome: SelfTestOutcome) {
        let mut stats = self.stats.lock();
        stats.entry(agent.to_string()).or_default().last_self_test = Some(outcome);
    }

    pub fn metrics(&self, agent: &str) -> AgentMetrics {
        self.stats
            .lock()
            .get(agent)
            .map(|s| s.metrics.clone())
            .unwrap_or_default()
    }

    pub fn last_result(&self, agent: &str) -> Option<LastResult> {
        self.stats.lock().get(agent).and_then(|s| s.last_result.clone())
    }

    /// Build the status of `agent` given its registry availability.
    pub fn status(&self, agent: &str, unavailable_reason: Option<&str>) -> AgentStatus {
        let stats = self.stats.lock();
        let s = stats.get(agent).cloned().unwrap_or_default();
        AgentStatus {
            available: unavailable_reason.is_none(),
            unavailable_reason: unavailable_reason.map(str::to_string),
            last_result: s.last_result,
            last_self_test: s.last_self_test,
            metrics: s.metrics,
        }
    }

    /// Totals across all agents.
    pub fn aggregate_metrics(&self) -> AgentMetrics {
        let stats = self.stats.lock();
        let mut total = AgentMetrics::default();
        for s in stats.values() {
            total.dispatched += s.metrics.dispatched;
            total.succeeded += s.metrics.succeeded;
            total.failed += s.metrics.failed;
            total.running += s.metrics.running;
            total.duration_ms += s.metrics.duration_ms;
        }
        total
    }

    /// Serialize a status map together with aggregate metrics.
    pub fn to_json(&self, statuses: &BTreeMap<String, AgentStatus>) -> serde_json::Value {
        serde_json::json!({
            "agents": statuses,
            "aggregate": self.aggregate_metrics(),
        })
    }
}
