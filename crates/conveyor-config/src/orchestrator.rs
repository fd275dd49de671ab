use serde::{Deserialize, Serialize};

/// Which dispatcher the scheduler is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherKind {
  /// Run each job on the submitting thread, one at a time.
  Synchronous,
  /// Run jobs on a bounded worker pool.
  Pooled,
}

/// Scheduler construction parameters, read exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
  #[serde(default = "default_dispatcher")]
  pub dispatcher: DispatcherKind,
  /// Maximum number of concurrently running jobs. Only meaningful for the
  /// pooled dispatcher.
  #[serde(default = "default_workers")]
  pub workers: usize,
}

fn default_dispatcher() -> DispatcherKind {
  DispatcherKind::Pooled
}

fn default_workers() -> usize {
  2
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      dispatcher: default_dispatcher(),
      workers: default_workers(),
    }
  }
}
