use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use conveyor_config::{DataNodeDef, PipelineDef};
use conveyor_graph::{DataNode, Pipeline, Task};
use conveyor_orchestrator::{NoopNotifier, Scheduler, SubmissionStatus};
use conveyor_registry::{FunctionError, FunctionRegistry};
use conveyor_store::InMemoryStore;

/// Conveyor - a batch pipeline orchestrator
#[derive(Parser)]
#[command(name = "conveyor")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a pipeline to completion
  Run {
    /// Path to the pipeline definition (JSON)
    pipeline_file: PathBuf,

    /// Re-run every task even when its outputs are fresh
    #[arg(long)]
    force: bool,

    /// Give up waiting after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
  },

  /// Parse and validate a pipeline definition without running it
  Validate {
    /// Path to the pipeline definition (JSON)
    pipeline_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "conveyor=info".into()),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  match cli.command {
    Commands::Run {
      pipeline_file,
      force,
      timeout_secs,
    } => run_pipeline(pipeline_file, force, timeout_secs),
    Commands::Validate { pipeline_file } => {
      load_definition(&pipeline_file)?;
      eprintln!("{}: ok", pipeline_file.display());
      Ok(())
    }
  }
}

fn load_definition(pipeline_file: &PathBuf) -> Result<PipelineDef> {
  let content = std::fs::read_to_string(pipeline_file)
    .with_context(|| format!("failed to read pipeline file: {}", pipeline_file.display()))?;
  PipelineDef::from_json_str(&content)
    .with_context(|| format!("invalid pipeline file: {}", pipeline_file.display()))
}

fn run_pipeline(pipeline_file: PathBuf, force: bool, timeout_secs: Option<u64>) -> Result<()> {
  let def = load_definition(&pipeline_file)?;
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_pipeline_async(def, force, timeout_secs).await })
}

async fn run_pipeline_async(def: PipelineDef, force: bool, timeout_secs: Option<u64>) -> Result<()> {
  let registry = Arc::new(FunctionRegistry::new());
  let pipeline = build_pipeline(&def, &registry);

  let scheduler = Scheduler::new(
    &def.orchestrator,
    registry,
    Arc::new(InMemoryStore::new()),
    Arc::new(NoopNotifier),
  )
  .context("failed to build scheduler")?;

  info!(pipeline_id = %def.id, tasks = def.tasks.len(), force, "submitting pipeline");
  let submission = scheduler
    .submit(&pipeline, vec![], force)
    .context("submission rejected")?;

  let timeout = timeout_secs.map(Duration::from_secs);
  let status = submission.wait(timeout).await;
  scheduler.stop();

  let jobs: Vec<serde_json::Value> = submission
    .jobs()
    .iter()
    .map(|job| {
      serde_json::json!({
        "task": job.task().id(),
        "status": job.status(),
        "detail": job.stacktrace(),
      })
    })
    .collect();
  let report = serde_json::json!({
    "pipeline": def.id,
    "submission": submission.id(),
    "status": submission.status(),
    "jobs": jobs,
  });
  println!("{}", serde_json::to_string_pretty(&report)?);

  match status {
    Some(SubmissionStatus::Completed) => Ok(()),
    Some(status) => bail!("pipeline finished with status {status:?}"),
    None => bail!("timed out waiting for the pipeline to finish"),
  }
}

/// Materialize the declared graph and register one shell-command function
/// per task.
fn build_pipeline(def: &PipelineDef, registry: &FunctionRegistry) -> Pipeline {
  let nodes: std::collections::HashMap<&str, Arc<DataNode>> = def
    .data_nodes
    .iter()
    .map(|node_def| (node_def.id.as_str(), build_node(node_def)))
    .collect();

  let tasks = def
    .tasks
    .iter()
    .map(|task_def| {
      let key = format!("cmd:{}", task_def.id);
      registry.register(&key, shell_function(task_def.command.clone()));
      let lookup = |ids: &[String]| {
        ids
          .iter()
          .map(|id| nodes[id.as_str()].clone())
          .collect::<Vec<_>>()
      };
      let task = Task::new(
        &task_def.id,
        &key,
        lookup(&task_def.inputs),
        lookup(&task_def.outputs),
      );
      Arc::new(if task_def.skippable {
        task.skippable()
      } else {
        task
      })
    })
    .collect();

  Pipeline::new(&def.id, tasks)
}

fn build_node(def: &DataNodeDef) -> Arc<DataNode> {
  Arc::new(match def.validity_secs {
    Some(secs) => DataNode::with_validity(&def.id, Duration::from_secs(secs)),
    None => DataNode::new(&def.id),
  })
}

/// Wrap an argv-style command as a task function. Validation already
/// guarantees the command is non-empty.
fn shell_function(command: Vec<String>) -> Arc<dyn conveyor_registry::TaskFunction> {
  Arc::new(move || -> std::result::Result<(), FunctionError> {
    let status = Command::new(&command[0])
      .args(&command[1..])
      .status()
      .map_err(|err| FunctionError::new(format!("failed to spawn '{}': {err}", command[0])))?;
    if status.success() {
      Ok(())
    } else {
      Err(FunctionError::new(format!(
        "'{}' exited with {status}",
        command[0]
      )))
    }
  })
}
