use crate::bridge::{panic_message, run_isolated, ExecutionBridge};
use crate::config::OrchestratorConfig;
use crate::handoff::HandoffGraph;
use crate::monitor::{AgentMonitor, AgentStatus, SelfTestOutcome};
use crate::tracker::{TaskSummary, TaskTracker};
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use taskbridge_agents::{AgentRegistry, Capability};
use taskbridge_core::{AgentResult, Context, Task, TaskId, TaskbridgeError, TaskbridgeResult};
use tracing::{error, info, warn};

/// Slack added to the self-test deadline for thread start-up and reporting.
const SELF_TEST_GRACE: Duration = Duration::from_millis(50);

/// Handoff edges and successful results accumulated under one originating task.
#[derive(Default)]
struct OriginState {
    graph: HandoffGraph,
    results: BTreeMap<String, serde_json::Value>,
    /// Tracked tasks under this origin.
    live: usize,
}

/// Origin of a tracked task and the submission token its worker carries.
struct Member {
    origin: TaskId,
    token: u64,
}

/// Per-origin state and the tracked tasks that keep it alive.
///
/// An origin's state lives exactly as long as some task under it is
/// tracked. Untracking the last one drops its graph and results.
#[derive(Default)]
struct OriginTable {
    states: HashMap<TaskId, OriginState>,
    members: HashMap<TaskId, Member>,
    next_token: u64,
}

impl OriginTable {
    fn results(&self, origin: TaskId) -> BTreeMap<String, serde_json::Value> {
        self.states
            .get(&origin)
            .map(|s| s.results.clone())
            .unwrap_or_default()
    }

    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn join(&mut self, task_id: TaskId, origin: TaskId, token: u64) -> &mut OriginState {
        self.members.insert(task_id, Member { origin, token });
        let state = self.states.entry(origin).or_default();
        state.live += 1;
        state
    }

    /// Drop `task_id`'s membership, and its origin's state with the last one.
    fn leave(&mut self, task_id: TaskId) {
        let Some(member) = self.members.remove(&task_id) else {
            return;
        };
        if let Some(state) = self.states.get_mut(&member.origin) {
            state.live = state.live.saturating_sub(1);
            if state.live == 0 {
                self.states.remove(&member.origin);
            }
        }
    }

    /// Forget members whose records were removed through the tracker itself.
    fn sweep(&mut self, tracker: &TaskTracker) {
        let stale: Vec<TaskId> = self
            .members
            .keys()
            .copied()
            .filter(|id| !tracker.contains(*id))
            .collect();
        for id in stale {
            self.leave(id);
        }
    }

    /// Whether the worker holding `token` still owns `task_id`'s record.
    fn is_current(&self, task_id: TaskId, token: u64) -> bool {
        self.members
            .get(&task_id)
            .is_some_and(|m| m.token == token)
    }
}

type Origins = Arc<Mutex<OriginTable>>;

/// The multi-agent orchestrator.
///
/// Resolves tasks to registered agents, starts them on the
/// [`ExecutionBridge`] and answers polling queries. Every public method is
/// synchronous and returns without waiting on agent work, except
/// [`Orchestrator::wait`] and the bounded [`Orchestrator::self_test_all`].
///
/// The origin table lock is held across submission, cancellation and
/// release, so origin membership and tracker records change together.
/// Workers take it only after their agent has returned.
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    bridge: ExecutionBridge,
    monitor: Arc<AgentMonitor>,
    origins: Origins,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator over a startup-built registry and an
    /// application-owned tracker.
    pub fn new(registry: Arc<AgentRegistry>, tracker: TaskTracker, config: OrchestratorConfig) -> Self {
        let bridge =
            ExecutionBridge::new(tracker).with_thread_prefix(config.worker_thread_prefix.clone());
        Self {
            registry,
            bridge,
            monitor: Arc::new(AgentMonitor::new()),
            origins: Arc::default(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &TaskTracker {
        self.bridge.tracker()
    }

    pub fn bridge(&self) -> &ExecutionBridge {
        &self.bridge
    }

    pub fn monitor(&self) -> &Arc<AgentMonitor> {
        &self.monitor
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Start `task` on the agent named by its kind and return its id.
    ///
    /// Fails synchronously with `UnknownAgent`, `AgentUnavailable` or
    /// `DuplicateTask`; in that case no record is created.
    pub fn dispatch(&self, task: Task) -> TaskbridgeResult<TaskId> {
        let capability = self.registry.get(task.kind())?;
        let agent = task.kind().to_string();
        let task_id = task.id();
        let origin = task.origin();

        let mut table = self.origins.lock();
        table.sweep(self.tracker());
        let dependencies = table.results(origin);
        let token = table.next_token();
        self.submit(agent, capability, task, dependencies, token)?;
        table.join(task_id, origin, token);
        Ok(task_id)
    }

    /// Delegate `subtask` from agent `from` to agent `to`.
    ///
    /// The subtask's context carries every result accumulated so far under
    /// its originating task. Fails with `HandoffCycle` if `to` can already
    /// reach `from` in that task's handoff graph.
    pub fn handoff(&self, from: &str, to: &str, subtask: Task) -> TaskbridgeResult<TaskId> {
        if !self.registry.contains(from) {
            return Err(TaskbridgeError::UnknownAgent(from.to_string()));
        }
        let capability = self.registry.get(to)?;
        if subtask.kind() != to {
            return Err(TaskbridgeError::Orchestrator(format!(
                "subtask kind '{}' does not match handoff target '{to}'",
                subtask.kind()
            )));
        }
        if subtask.depth() > self.config.max_handoff_depth {
            return Err(TaskbridgeError::Orchestrator(format!(
                "maximum handoff depth {} exceeded (subtask depth is {})",
                self.config.max_handoff_depth,
                subtask.depth()
            )));
        }

        let task_id = subtask.id();
        let origin = subtask.origin();
        let mut table = self.origins.lock();
        table.sweep(self.tracker());
        let cyclic = from == to
            || table
                .states
                .get(&origin)
                .is_some_and(|s| s.graph.would_cycle(from, to));
        if cyclic {
            warn!(from = %from, to = %to, origin = %origin, "Handoff rejected: cycle");
            return Err(TaskbridgeError::HandoffCycle {
                from: from.to_string(),
                to: to.to_string(),
                origin,
            });
        }

        info!(
            from = %from,
            to = %to,
            origin = %origin,
            task_id = %task_id,
            "Handing off task"
        );

        let dependencies = table.results(origin);
        let token = table.next_token();
        self.submit(to.to_string(), capability, subtask, dependencies, token)?;
        let state = table.join(task_id, origin, token);
        // Acyclic: checked above under the same lock.
        let _ = state.graph.try_add(from, to);
        Ok(task_id)
    }

    fn submit(
        &self,
        agent: String,
        capability: Arc<dyn Capability>,
        task: Task,
        dependencies: BTreeMap<String, serde_json::Value>,
        token: u64,
    ) -> TaskbridgeResult<TaskId> {
        let task_id = task.id();
        let origin = task.origin();
        let action = task.kind().to_string();
        let ctx = Context::for_task(task, dependencies);

        let monitor = self.monitor.clone();
        let origins = self.origins.clone();
        let worker_agent = agent.clone();
        let worker_action = action.clone();

        let work = async move {
            let agent = worker_agent;
            let action = worker_action;
            info!(
                agent = %agent,
                action = %action,
                task_id = %task_id,
                context = %ctx.summary(),
                "Agent task started"
            );

            let start = Instant::now();
            let outcome = AssertUnwindSafe(capability.execute(&ctx)).catch_unwind().await;
            let elapsed = start.elapsed();
            let result = match outcome {
                Ok(result) => result.with_duration(elapsed),
                Err(payload) => {
                    let err = TaskbridgeError::AgentExecution(format!(
                        "agent panicked: {}",
                        panic_message(payload.as_ref())
                    ));
                    AgentResult::failure(err.to_string(), elapsed)
                }
            };

            if let Some(data) = result.data() {
                {
                    // A cancelled task's output is not shared with its origin.
                    let mut table = origins.lock();
                    if table.is_current(task_id, token) {
                        if let Some(state) = table.states.get_mut(&origin) {
                            state.results.insert(agent.clone(), data.clone());
                        }
                    }
                }
                info!(
                    agent = %agent,
                    action = %action,
                    task_id = %task_id,
                    success = true,
                    duration_ms = result.duration_ms(),
                    result = %result.summary(),
                    "Agent task succeeded"
                );
            } else {
                error!(
                    agent = %agent,
                    action = %action,
                    task_id = %task_id,
                    success = false,
                    duration_ms = result.duration_ms(),
                    error = %result.summary(),
                    "Agent task failed"
                );
            }
            monitor.record_finish(&agent, task_id, &result);
            result
        };

        self.monitor.record_start(&agent);
        if let Err(e) = self.bridge.submit(task_id, &action, work) {
            self.monitor.record_rejected(&agent);
            return Err(e);
        }
        Ok(task_id)
    }

    pub fn is_running(&self, task_id: TaskId) -> bool {
        self.bridge.is_running(task_id)
    }

    /// `None` while running; fails with `UnknownTask` if never submitted or
    /// already released/cancelled.
    pub fn result(&self, task_id: TaskId) -> TaskbridgeResult<Option<AgentResult>> {
        self.bridge.result(task_id)
    }

    /// Best-effort cancellation: stops tracking, does not interrupt.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        let mut table = self.origins.lock();
        let cancelled = self.bridge.cancel(task_id);
        table.leave(task_id);
        cancelled
    }

    /// Acknowledge a finished task and return its result. `Ok(None)` while
    /// still running.
    ///
    /// The handoff state of its originating task is dropped once no task
    /// under that origin remains tracked.
    pub fn release(&self, task_id: TaskId) -> TaskbridgeResult<Option<AgentResult>> {
        let mut table = self.origins.lock();
        match self.bridge.acknowledge(task_id) {
            Ok(Some(result)) => {
                table.leave(task_id);
                Ok(Some(result))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                table.leave(task_id);
                Err(e)
            }
        }
    }

    /// Blocking poll helper, see [`ExecutionBridge::wait`].
    pub fn wait(
        &self,
        task_id: TaskId,
        timeout: Duration,
        poll_interval: Duration,
    ) -> TaskbridgeResult<Option<AgentResult>> {
        self.bridge.wait(task_id, timeout, poll_interval)
    }

    pub fn list_tasks(&self) -> Vec<TaskSummary> {
        self.tracker().list_tasks()
    }

    /// Handoff edges recorded under `origin`.
    pub fn handoff_edges(&self, origin: TaskId) -> Vec<(String, String)> {
        self.origins
            .lock()
            .states
            .get(&origin)
            .map(|s| s.graph.edges())
            .unwrap_or_default()
    }

    /// Successful results accumulated under `origin`, keyed by agent.
    pub fn accumulated_results(&self, origin: TaskId) -> BTreeMap<String, serde_json::Value> {
        self.origins.lock().results(origin)
    }

    /// Number of originating tasks with handoff state still held.
    pub fn active_origins(&self) -> usize {
        self.origins.lock().states.len()
    }

    /// Run every agent's self-test and report pass/fail.
    pub fn self_test_all(&self) -> BTreeMap<String, bool> {
        self.self_test_report()
            .into_iter()
            .map(|(name, outcome)| (name, outcome.passed()))
            .collect()
    }

    /// Run every agent's self-test concurrently, each on its own worker, and
    /// report detailed outcomes.
    ///
    /// Bounded by the configured timeout: an agent that has not answered by
    /// then is reported `TimedOut` and its worker is abandoned. Unavailable
    /// agents are not invoked.
    pub fn self_test_report(&self) -> BTreeMap<String, SelfTestOutcome> {
        let timeout = self.config.self_test_timeout();
        let deadline = Instant::now() + timeout + SELF_TEST_GRACE;
        let (tx, rx) = mpsc::channel();
        let mut report = BTreeMap::new();
        let mut pending = 0usize;

        for entry in self.registry.iter() {
            let name = entry.name().to_string();
            if let Some(reason) = entry.unavailable_reason() {
                report.insert(name, SelfTestOutcome::Unavailable(reason.to_string()));
                continue;
            }

            let capability = entry.capability().clone();
            let tx = tx.clone();
            let agent = name.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-selftest-{name}", self.config.worker_thread_prefix))
                .spawn(move || {
                    let run = run_isolated(async move {
                        tokio::time::timeout(timeout, capability.self_test()).await
                    });
                    let outcome = match run {
                        Ok(Ok(true)) => SelfTestOutcome::Passed,
                        Ok(Ok(false)) => SelfTestOutcome::Failed,
                        Ok(Err(_elapsed)) => SelfTestOutcome::TimedOut,
                        Err(fault) => SelfTestOutcome::Faulted(fault),
                    };
                    // The sweep may have given up on us already.
                    let _ = tx.send((agent, outcome));
                });

            match spawned {
                Ok(_) => pending += 1,
                Err(e) => {
                    report.insert(name, SelfTestOutcome::Faulted(format!("failed to spawn: {e}")));
                }
            }
        }
        drop(tx);

        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((name, outcome)) => {
                    report.insert(name, outcome);
                    pending -= 1;
                }
                Err(_) => break,
            }
        }

        for entry in self.registry.iter() {
            report
                .entry(entry.name().to_string())
                .or_insert(SelfTestOutcome::TimedOut);
        }

        for (name, outcome) in &report {
            if !outcome.passed() {
                warn!(agent = %name, outcome = ?outcome, "Agent self-test failed");
            }
            self.monitor.record_self_test(name, outcome.clone());
        }
        info!(
            agents = report.len(),
            passed = report.values().filter(|o| o.passed()).count(),
            "Self-test sweep complete"
        );
        report
    }

    /// Availability and last outcome of every registered agent.
    pub fn status(&self) -> BTreeMap<String, AgentStatus> {
        self.registry
            .iter()
            .map(|e| {
                (
                    e.name().to_string(),
                    self.monitor.status(e.name(), e.unavailable_reason()),
                )
            })
            .collect()
    }

    /// `status()` plus aggregate metrics as JSON.
    pub fn status_json(&self) -> serde_json::Value {
        self.monitor.to_json(&self.status())
    }
}
