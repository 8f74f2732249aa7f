mod config;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use config::{CliConfig, TaskbridgeConfig, SMTP_HOST_ENV};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use taskbridge_agents::AgentRegistry;
use taskbridge_core::{AgentResult, Task, TaskId};
use taskbridge_orchestrator::{Orchestrator, TaskTracker};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskbridge", about = "Taskbridge: multi-agent task orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "taskbridge.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered agents and their availability
    Agents,
    /// Dispatch a task and wait for its result
    Run {
        /// Agent name
        kind: String,
        /// Task payload as JSON
        #[arg(short, long, default_value = "{}")]
        payload: String,
        /// Hand the task on to this agent once it succeeds
        #[arg(long)]
        handoff_to: Option<String>,
    },
    /// Run every agent's self-test
    SelfTest,
    /// Print agent health and metrics
    Status,
}

fn init_logging(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn build_orchestrator(config: &TaskbridgeConfig) -> anyhow::Result<Orchestrator> {
    let mut registry = AgentRegistry::new();
    let builtins = config.builtins(std::env::var(SMTP_HOST_ENV).ok());
    taskbridge_builtins::register_builtins(&mut registry, &builtins)?;
    info!(count = registry.len(), "Built-in agents registered");

    Ok(Orchestrator::new(
        Arc::new(registry),
        TaskTracker::new(),
        config.orchestrator.clone(),
    ))
}

/// Block until `id` finishes; a task still running at the deadline is
/// cancelled.
fn await_result(orch: &Orchestrator, id: TaskId, cli: &CliConfig) -> anyhow::Result<AgentResult> {
    match orch.wait(id, cli.wait_timeout(), cli.poll_interval())? {
        Some(result) => Ok(result),
        None => {
            orch.cancel(id);
            anyhow::bail!(
                "task {id} did not finish within {} ms",
                cli.wait_timeout_ms
            )
        }
    }
}

fn run(
    orch: &Orchestrator,
    cli: &CliConfig,
    kind: String,
    payload: &str,
    handoff_to: Option<String>,
) -> anyhow::Result<ExitCode> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("--payload is not valid JSON")?;
    let task = Task::new(kind, payload.clone());
    let id = orch.dispatch(task.clone())?;
    let result = await_result(orch, id, cli)?;
    let mut success = result.is_success();
    let mut output = json!({ "task_id": id, "agent": task.kind(), "result": result });

    if let Some(to) = handoff_to {
        if success {
            let subtask = Task::subtask(&task, to.as_str(), payload);
            let sub_id = orch.handoff(task.kind(), &to, subtask)?;
            let sub_result = await_result(orch, sub_id, cli)?;
            success = sub_result.is_success();
            output["handoff"] = json!({ "task_id": sub_id, "agent": to, "result": sub_result });
        } else {
            warn!(task_id = %id, to = %to, "Skipping handoff: task failed");
        }
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    if let Ok(path) = dotenvy::dotenv() {
        info!(path = %path.display(), "Loaded environment file");
    }
    let config = TaskbridgeConfig::load(&cli.config)?;
    let orch = build_orchestrator(&config)?;

    match cli.command {
        Commands::Agents => {
            for listing in orch.registry().entries() {
                match listing.reason {
                    None => println!("{:<14} available", listing.name),
                    Some(reason) => println!("{:<14} unavailable ({reason})", listing.name),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            kind,
            payload,
            handoff_to,
        } => run(&orch, &config.cli, kind, &payload, handoff_to),
        Commands::SelfTest => {
            let report = orch.self_test_all();
            println!("{}", serde_json::to_string_pretty(&report)?);
            let failed = report.values().filter(|passed| !**passed).count();
            if failed > 0 {
                warn!(failed, "Self-test sweep reported failures");
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&orch.status_json())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
