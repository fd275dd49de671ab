//! Orchestration errors.

use conveyor_graph::GraphError;
use conveyor_registry::RegistryError;

/// Errors surfaced to callers of the scheduler.
///
/// Task execution failures are deliberately absent: they are captured on
/// the job as a `Failed` status with detail, never raised here.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
  /// A referenced task, data node, job, or function is absent.
  #[error("not found: {0}")]
  NotFound(String),

  /// The submitted pipeline is not a valid DAG.
  #[error(transparent)]
  Graph(#[from] GraphError),

  /// The storage backend failed outside of a missing record.
  #[error("storage error: {0}")]
  Store(String),

  /// The selected dispatcher needs a tokio runtime and none is running.
  #[error("pooled dispatcher requires a running tokio runtime: {0}")]
  Runtime(String),
}

impl From<conveyor_store::Error> for OrchestrationError {
  fn from(err: conveyor_store::Error) -> Self {
    match err {
      conveyor_store::Error::NotFound(what) => Self::NotFound(what),
      conveyor_store::Error::Backend(message) => Self::Store(message),
    }
  }
}

impl From<RegistryError> for OrchestrationError {
  fn from(err: RegistryError) -> Self {
    match err {
      RegistryError::NotFound { key } => Self::NotFound(format!("function '{key}'")),
    }
  }
}
