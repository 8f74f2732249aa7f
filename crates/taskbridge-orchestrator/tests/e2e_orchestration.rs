#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end orchestration tests.
//!
//! Drives the orchestrator through the built-in job-application agents and
//! a few purpose-built test agents. Checks: dispatch and polling, result
//! accumulation across handoffs, cycle rejection, cancellation, duplicate
//! ids, panic isolation and the bounded self-test sweep.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskbridge_agents::{AgentRegistry, Capability};
use taskbridge_builtins::{register_builtins, BuiltinsConfig};
use taskbridge_core::{AgentResult, Context, Task, TaskbridgeError};
use taskbridge_orchestrator::*;

const WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(5);

// ---------------------------------------------------------------------------
// Test agents
// ---------------------------------------------------------------------------

/// Blocks until its gate opens, then reports how many times it has run.
#[derive(Clone, Default)]
struct Gated {
    open: Arc<AtomicBool>,
    runs: Arc<AtomicUsize>,
}

impl Gated {
    fn release(&self) {
        self.open.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Capability for Gated {
    fn name(&self) -> &str {
        "gated"
    }

    async fn execute(&self, _ctx: &Context) -> AgentResult {
        while !self.open.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        AgentResult::success(json!({ "run": run }), Duration::ZERO)
    }

    async fn self_test(&self) -> bool {
        true
    }
}

/// Panics in both execution and self-test.
struct Faulty;

#[async_trait]
impl Capability for Faulty {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn execute(&self, _ctx: &Context) -> AgentResult {
        panic!("faulty agent exploded")
    }

    async fn self_test(&self) -> bool {
        panic!("faulty self-test exploded")
    }
}

/// Self-test that never yields within any reasonable timeout.
struct Sleepy {
    blocking: bool,
}

#[async_trait]
impl Capability for Sleepy {
    fn name(&self) -> &str {
        "sleepy"
    }

    async fn execute(&self, _ctx: &Context) -> AgentResult {
        AgentResult::success(json!(null), Duration::ZERO)
    }

    async fn self_test(&self) -> bool {
        if self.blocking {
            std::thread::sleep(Duration::from_secs(2));
        } else {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        true
    }
}

fn builtins_orchestrator(smtp_host: Option<&str>) -> Orchestrator {
    let mut registry = AgentRegistry::new();
    let config = BuiltinsConfig {
        smtp_host: smtp_host.map(str::to_string),
        disabled: Vec::new(),
    };
    register_builtins(&mut registry, &config).unwrap();
    Orchestrator::new(
        Arc::new(registry),
        TaskTracker::new(),
        OrchestratorConfig::default(),
    )
}

fn gated_orchestrator() -> (Orchestrator, Gated) {
    let gated = Gated::default();
    let mut registry = AgentRegistry::new();
    registry.register("gated", Arc::new(gated.clone())).unwrap();
    registry.register("faulty", Arc::new(Faulty)).unwrap();
    let orch = Orchestrator::new(
        Arc::new(registry),
        TaskTracker::new(),
        OrchestratorConfig::default(),
    );
    (orch, gated)
}

fn resume_task() -> Task {
    Task::new(
        "resume",
        json!({
            "resume": "Backend engineer. Rust, Tokio, Postgres.",
            "job_description": "Rust engineer comfortable with Tokio and Kafka",
        }),
    )
    .with_param("applicant", json!("Ada"))
}

// ---------------------------------------------------------------------------
// 1. Dispatch and polling
// ---------------------------------------------------------------------------

#[test]
fn test_dispatch_resume_then_poll_until_finished() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let task = resume_task();
    let id = orch.dispatch(task.clone()).unwrap();
    assert_eq!(id, task.id());

    let result = orch.wait(id, WAIT, POLL).unwrap().expect("resume finished");
    assert!(!orch.is_running(id));
    assert!(result.is_success());
    let data = result.data().unwrap();
    assert_eq!(data["matched_keywords"], json!(["rust", "engineer", "tokio"]));
    assert_eq!(data["missing_keywords"], json!(["comfortable", "kafka"]));

    // Reading the result does not consume it.
    let again = orch.result(id).unwrap().unwrap();
    assert_eq!(again.data(), result.data());
}

#[test]
fn test_is_running_flips_only_when_result_is_available() {
    let (orch, gated) = gated_orchestrator();
    let id = orch.dispatch(Task::new("gated", json!({}))).unwrap();

    assert!(orch.is_running(id));
    assert!(orch.result(id).unwrap().is_none());

    gated.release();
    let result = orch.wait(id, WAIT, POLL).unwrap().unwrap();
    assert!(!orch.is_running(id));
    assert_eq!(result.data(), Some(&json!({"run": 1})));
}

#[test]
fn test_unknown_kind_fails_without_creating_a_record() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let err = orch
        .dispatch(Task::new("unknown_kind", json!({})))
        .unwrap_err();
    assert!(matches!(err, TaskbridgeError::UnknownAgent(ref n) if n == "unknown_kind"));
    assert!(orch.list_tasks().is_empty());
}

#[test]
fn test_unavailable_agent_is_rejected_synchronously() {
    let orch = builtins_orchestrator(None);
    let task = Task::new("email", json!({"to": "jobs@acme.io", "body": "hi"}));
    let id = task.id();
    let err = orch.dispatch(task).unwrap_err();
    assert!(matches!(err, TaskbridgeError::AgentUnavailable { ref name, .. } if name == "email"));
    assert!(matches!(orch.result(id), Err(TaskbridgeError::UnknownTask(_))));
}

#[test]
fn test_duplicate_task_id_is_rejected_while_tracked() {
    let (orch, gated) = gated_orchestrator();
    let task = Task::new("gated", json!({}));
    orch.dispatch(task.clone()).unwrap();

    let err = orch.dispatch(task.clone()).unwrap_err();
    assert!(matches!(err, TaskbridgeError::DuplicateTask(id) if id == task.id()));

    gated.release();
    orch.wait(task.id(), WAIT, POLL).unwrap().unwrap();
    // Finished records still occupy the id until released.
    assert!(orch.dispatch(task.clone()).is_err());
    orch.release(task.id()).unwrap().unwrap();
    assert!(orch.dispatch(task).is_ok());
}

#[test]
fn test_unknown_task_id_is_reported() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let stranger = Task::new("resume", json!({})).id();
    assert!(!orch.is_running(stranger));
    assert!(matches!(
        orch.result(stranger),
        Err(TaskbridgeError::UnknownTask(id)) if id == stranger
    ));
}

// ---------------------------------------------------------------------------
// 2. Failure isolation
// ---------------------------------------------------------------------------

#[test]
fn test_agent_failure_becomes_a_failed_result() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let id = orch.dispatch(Task::new("resume", json!({}))).unwrap();
    let result = orch.wait(id, WAIT, POLL).unwrap().unwrap();
    assert!(!result.is_success());
    assert_eq!(result.error(), Some("missing field 'resume'"));
}

#[test]
fn test_agent_panic_becomes_a_failed_result() {
    let (orch, gated) = gated_orchestrator();
    let id = orch.dispatch(Task::new("faulty", json!({}))).unwrap();
    let result = orch.wait(id, WAIT, POLL).unwrap().unwrap();
    assert!(!result.is_success());
    assert!(result.error().unwrap().contains("faulty agent exploded"));

    // The orchestrator keeps serving other work.
    gated.release();
    let ok = orch.dispatch(Task::new("gated", json!({}))).unwrap();
    assert!(orch.wait(ok, WAIT, POLL).unwrap().unwrap().is_success());
    assert_eq!(orch.monitor().metrics("faulty").failed, 1);
}

// ---------------------------------------------------------------------------
// 3. Handoff
// ---------------------------------------------------------------------------

#[test]
fn test_handoff_chain_carries_accumulated_results() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let root = resume_task();
    let origin = orch.dispatch(root.clone()).unwrap();
    orch.wait(origin, WAIT, POLL).unwrap().unwrap();

    let letter_task = Task::subtask(&root, "cover_letter", json!({"company": "Acme"}));
    let letter_id = orch.handoff("resume", "cover_letter", letter_task.clone()).unwrap();
    let letter = orch.wait(letter_id, WAIT, POLL).unwrap().unwrap();
    let text = letter.data().unwrap()["letter"].as_str().unwrap().to_string();
    assert!(text.contains("rust, engineer, tokio"));
    assert!(text.ends_with("Ada"));

    let email_task = Task::subtask(&letter_task, "email", json!({"to": "jobs@acme.io"}));
    let email_id = orch.handoff("cover_letter", "email", email_task).unwrap();
    let email = orch.wait(email_id, WAIT, POLL).unwrap().unwrap();
    assert_eq!(email.data().unwrap()["body"].as_str(), Some(text.as_str()));

    let accumulated = orch.accumulated_results(origin);
    assert_eq!(
        accumulated.keys().cloned().collect::<Vec<_>>(),
        vec!["cover_letter", "email", "resume"]
    );
    assert_eq!(
        orch.handoff_edges(origin),
        vec![
            ("cover_letter".to_string(), "email".to_string()),
            ("resume".to_string(), "cover_letter".to_string()),
        ]
    );
}

#[test]
fn test_handoff_back_to_an_earlier_agent_is_a_cycle() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let root = resume_task();
    orch.dispatch(root.clone()).unwrap();

    let forward = Task::subtask(&root, "cover_letter", json!({"company": "Acme"}));
    orch.handoff("resume", "cover_letter", forward.clone()).unwrap();

    let back = Task::subtask(&forward, "resume", json!({"resume": "again"}));
    let back_id = back.id();
    let err = orch.handoff("cover_letter", "resume", back).unwrap_err();
    match err {
        TaskbridgeError::HandoffCycle { from, to, origin } => {
            assert_eq!(from, "cover_letter");
            assert_eq!(to, "resume");
            assert_eq!(origin, root.id());
        }
        other => panic!("expected HandoffCycle, got {other:?}"),
    }
    assert!(matches!(orch.result(back_id), Err(TaskbridgeError::UnknownTask(_))));
    assert_eq!(orch.handoff_edges(root.id()).len(), 1);
}

#[test]
fn test_self_handoff_is_a_cycle() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let root = resume_task();
    let sub = Task::subtask(&root, "resume", json!({"resume": "x"}));
    assert!(matches!(
        orch.handoff("resume", "resume", sub),
        Err(TaskbridgeError::HandoffCycle { .. })
    ));
}

#[test]
fn test_separate_origins_have_separate_graphs() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let first = resume_task();
    let second = Task::new("cover_letter", json!({"company": "Acme"}));

    orch.handoff(
        "resume",
        "cover_letter",
        Task::subtask(&first, "cover_letter", json!({"company": "Acme"})),
    )
    .unwrap();
    // The reverse edge is fine under a different originating task.
    orch.handoff(
        "cover_letter",
        "resume",
        Task::subtask(&second, "resume", json!({"resume": "Rust"})),
    )
    .unwrap();
}

#[test]
fn test_handoff_depth_is_bounded() {
    let mut registry = AgentRegistry::new();
    register_builtins(&mut registry, &BuiltinsConfig::default()).unwrap();
    let orch = Orchestrator::new(
        Arc::new(registry),
        TaskTracker::new(),
        OrchestratorConfig::default().with_max_handoff_depth(1),
    );
    let root = resume_task();
    let child = Task::subtask(&root, "job_search", json!({"query": "rust"}));
    let grandchild = Task::subtask(&child, "cover_letter", json!({"company": "Acme"}));
    let err = orch.handoff("job_search", "cover_letter", grandchild).unwrap_err();
    assert!(matches!(err, TaskbridgeError::Orchestrator(ref m) if m.contains("depth")));
}

#[test]
fn test_handoff_from_unknown_agent_is_rejected() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let root = resume_task();
    let sub = Task::subtask(&root, "cover_letter", json!({"company": "Acme"}));
    assert!(matches!(
        orch.handoff("ghost", "cover_letter", sub),
        Err(TaskbridgeError::UnknownAgent(ref n)) if n == "ghost"
    ));
}

// ---------------------------------------------------------------------------
// 4. Cancellation
// ---------------------------------------------------------------------------

#[test]
fn test_cancel_stops_tracking_but_not_the_worker() {
    let (orch, gated) = gated_orchestrator();
    let id = orch.dispatch(Task::new("gated", json!({}))).unwrap();
    assert!(orch.is_running(id));

    assert!(orch.cancel(id));
    assert!(!orch.is_running(id));
    assert!(matches!(orch.result(id), Err(TaskbridgeError::UnknownTask(_))));
    assert!(!orch.cancel(id));

    gated.release();
    let deadline = Instant::now() + WAIT;
    while gated.runs.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(POLL);
    }
    // The side effect happened, but no result was recorded.
    assert_eq!(gated.runs.load(Ordering::SeqCst), 1);
    std::thread::sleep(Duration::from_millis(50));
    assert!(orch.list_tasks().is_empty());
}

#[test]
fn test_cancelled_id_can_be_resubmitted() {
    let (orch, gated) = gated_orchestrator();
    let task = Task::new("gated", json!({}));
    orch.dispatch(task.clone()).unwrap();
    assert!(orch.cancel(task.id()));

    orch.dispatch(task.clone()).unwrap();
    gated.release();
    let result = orch.wait(task.id(), WAIT, POLL).unwrap().unwrap();
    assert!(result.is_success());
}

#[test]
fn test_cancel_of_finished_task_discards_its_result() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let id = orch.dispatch(resume_task()).unwrap();
    orch.wait(id, WAIT, POLL).unwrap().unwrap();
    assert!(orch.cancel(id));
    assert!(orch.result(id).is_err());
    assert!(orch.accumulated_results(id).is_empty());
}

// ---------------------------------------------------------------------------
// 5. Task listing
// ---------------------------------------------------------------------------

#[test]
fn test_list_tasks_reports_running_and_finished() {
    let (orch, gated) = gated_orchestrator();
    let first = orch.dispatch(Task::new("faulty", json!({}))).unwrap();
    orch.wait(first, WAIT, POLL).unwrap().unwrap();
    let second = orch.dispatch(Task::new("gated", json!({}))).unwrap();

    let listed = orch.list_tasks();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].task_id, first);
    assert!(!listed[0].running);
    assert!(listed[0].finished_at.is_some());
    assert_eq!(listed[1].task_id, second);
    assert_eq!(listed[1].kind, "gated");
    assert!(listed[1].running);
    assert_eq!(orch.tracker().counts(), (1, 1));

    gated.release();
    orch.wait(second, WAIT, POLL).unwrap().unwrap();
    assert!(orch.list_tasks().iter().all(|t| !t.running));
}

#[test]
fn test_tracker_is_shared_with_the_application() {
    let tracker = TaskTracker::new();
    let mut registry = AgentRegistry::new();
    register_builtins(&mut registry, &BuiltinsConfig::default()).unwrap();
    let orch = Orchestrator::new(
        Arc::new(registry),
        tracker.clone(),
        OrchestratorConfig::default(),
    );
    let id = orch.dispatch(resume_task()).unwrap();
    orch.wait(id, WAIT, POLL).unwrap().unwrap();
    assert_eq!(tracker.list_tasks().len(), 1);
    assert!(tracker.result(id).unwrap().unwrap().is_success());
}

// ---------------------------------------------------------------------------
// 6. Self-test sweep and status
// ---------------------------------------------------------------------------

#[test]
fn test_self_test_all_reports_every_agent_within_the_timeout() {
    let mut registry = AgentRegistry::new();
    register_builtins(&mut registry, &BuiltinsConfig::default()).unwrap();
    registry.register("faulty", Arc::new(Faulty)).unwrap();
    registry
        .register("sleepy", Arc::new(Sleepy { blocking: false }))
        .unwrap();
    registry
        .register("stuck", Arc::new(Sleepy { blocking: true }))
        .unwrap();
    let orch = Orchestrator::new(
        Arc::new(registry),
        TaskTracker::new(),
        OrchestratorConfig::default().with_self_test_timeout(Duration::from_millis(200)),
    );

    let start = Instant::now();
    let report = orch.self_test_report();
    assert!(start.elapsed() < Duration::from_millis(1500));

    assert_eq!(report.len(), 7);
    assert_eq!(report["resume"], SelfTestOutcome::Passed);
    assert_eq!(report["cover_letter"], SelfTestOutcome::Passed);
    assert_eq!(report["job_search"], SelfTestOutcome::Passed);
    assert!(matches!(report["email"], SelfTestOutcome::Unavailable(_)));
    assert!(matches!(report["faulty"], SelfTestOutcome::Faulted(ref m) if m.contains("exploded")));
    assert_eq!(report["sleepy"], SelfTestOutcome::TimedOut);
    assert_eq!(report["stuck"], SelfTestOutcome::TimedOut);

    let summary = orch.self_test_all();
    assert_eq!(summary.len(), 7);
    assert!(summary["resume"]);
    assert!(!summary["faulty"]);
    assert!(!summary["stuck"]);
}

#[test]
fn test_status_reflects_availability_and_last_outcomes() {
    let orch = builtins_orchestrator(None);
    let id = orch.dispatch(resume_task()).unwrap();
    orch.wait(id, WAIT, POLL).unwrap().unwrap();
    orch.self_test_all();

    let status = orch.status();
    assert_eq!(status.len(), 4);
    assert!(status["resume"].available);
    assert!(!status["email"].available);
    assert!(status["email"].unavailable_reason.is_some());

    let last = status["resume"].last_result.as_ref().unwrap();
    assert_eq!(last.task_id, id);
    assert!(last.success);
    assert_eq!(status["resume"].metrics.dispatched, 1);
    assert_eq!(status["resume"].metrics.succeeded, 1);
    assert_eq!(status["resume"].last_self_test, Some(SelfTestOutcome::Passed));

    let json = orch.status_json();
    assert_eq!(json["agents"]["email"]["available"], json!(false));
}

// ---------------------------------------------------------------------------
// 7. Origin state lifetime
// ---------------------------------------------------------------------------

#[test]
fn test_release_of_root_keeps_graph_while_subtasks_are_tracked() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let root = resume_task();
    let origin = orch.dispatch(root.clone()).unwrap();
    orch.wait(origin, WAIT, POLL).unwrap().unwrap();

    let forward = Task::subtask(&root, "cover_letter", json!({"company": "Acme"}));
    let forward_id = orch.handoff("resume", "cover_letter", forward.clone()).unwrap();
    orch.wait(forward_id, WAIT, POLL).unwrap().unwrap();

    assert!(orch.release(origin).unwrap().is_some());
    assert!(orch.tracker().contains(forward_id));
    assert_eq!(orch.handoff_edges(origin).len(), 1);

    let back = Task::subtask(&forward, "resume", json!({"resume": "again"}));
    assert!(matches!(
        orch.handoff("cover_letter", "resume", back),
        Err(TaskbridgeError::HandoffCycle { .. })
    ));
}

#[test]
fn test_cancel_of_root_keeps_graph_while_subtasks_are_tracked() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let root = resume_task();
    let origin = orch.dispatch(root.clone()).unwrap();

    let forward = Task::subtask(&root, "cover_letter", json!({"company": "Acme"}));
    orch.handoff("resume", "cover_letter", forward.clone()).unwrap();
    assert!(orch.cancel(origin));

    let back = Task::subtask(&forward, "resume", json!({"resume": "again"}));
    assert!(matches!(
        orch.handoff("cover_letter", "resume", back),
        Err(TaskbridgeError::HandoffCycle { .. })
    ));
}

#[test]
fn test_origin_state_dropped_once_every_task_is_released() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let root = resume_task();
    let origin = orch.dispatch(root.clone()).unwrap();
    orch.wait(origin, WAIT, POLL).unwrap().unwrap();
    let sub_id = orch
        .handoff(
            "resume",
            "cover_letter",
            Task::subtask(&root, "cover_letter", json!({"company": "Acme"})),
        )
        .unwrap();
    orch.wait(sub_id, WAIT, POLL).unwrap().unwrap();

    orch.release(sub_id).unwrap().unwrap();
    assert_eq!(orch.active_origins(), 1);
    assert!(!orch.accumulated_results(origin).is_empty());

    orch.release(origin).unwrap().unwrap();
    assert_eq!(orch.active_origins(), 0);
    assert!(orch.accumulated_results(origin).is_empty());
    assert!(orch.handoff_edges(origin).is_empty());
}

#[test]
fn test_handoff_under_untracked_origin_is_released_with_its_subtask() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let root = resume_task();
    let sub_id = orch
        .handoff(
            "resume",
            "cover_letter",
            Task::subtask(&root, "cover_letter", json!({"company": "Acme"})),
        )
        .unwrap();
    assert_eq!(orch.handoff_edges(root.id()).len(), 1);

    orch.wait(sub_id, WAIT, POLL).unwrap().unwrap();
    orch.release(sub_id).unwrap().unwrap();
    assert_eq!(orch.active_origins(), 0);
    assert!(orch.handoff_edges(root.id()).is_empty());
}

#[test]
fn test_cancelled_subtask_output_is_not_accumulated() {
    let (orch, gated) = gated_orchestrator();
    let root = Task::new("faulty", json!({}));
    let origin = orch.dispatch(root.clone()).unwrap();
    orch.wait(origin, WAIT, POLL).unwrap().unwrap();

    let sub_id = orch
        .handoff("faulty", "gated", Task::subtask(&root, "gated", json!({})))
        .unwrap();
    assert!(orch.cancel(sub_id));

    gated.release();
    let deadline = Instant::now() + WAIT;
    while gated.runs.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(POLL);
    }
    std::thread::sleep(Duration::from_millis(50));

    // The failed root keeps the origin alive; the cancelled output is not in it.
    assert_eq!(orch.active_origins(), 1);
    assert!(orch.accumulated_results(origin).is_empty());
}

#[test]
fn test_records_acknowledged_through_tracker_release_origin_state() {
    let orch = builtins_orchestrator(Some("smtp.example.com"));
    let first = orch.dispatch(resume_task()).unwrap();
    orch.wait(first, WAIT, POLL).unwrap().unwrap();
    orch.tracker().acknowledge(first).unwrap().unwrap();

    let second = orch.dispatch(resume_task()).unwrap();
    assert_eq!(orch.active_origins(), 1);
    assert!(orch.accumulated_results(first).is_empty());
    orch.wait(second, WAIT, POLL).unwrap().unwrap();
}
