use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a single job (one execution attempt of a task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  /// Created, not yet routed through the blocking check.
  Submitted,
  /// At least one input data node is not ready for reading.
  Blocked,
  /// In the run queue, waiting for dispatch capacity.
  Pending,
  /// Handed to a dispatcher.
  Running,
  /// The task function returned successfully; outputs were written.
  Completed,
  /// The task function raised; detail captured on the job.
  Failed,
  /// The skip policy decided the outputs were already fresh.
  Skipped,
  /// Explicitly canceled by the caller.
  Canceled,
  /// Canceled transitively because an upstream job was canceled.
  Abandoned,
}

impl JobStatus {
  /// Whether this status ends the job's lifecycle.
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      JobStatus::Completed
        | JobStatus::Failed
        | JobStatus::Skipped
        | JobStatus::Canceled
        | JobStatus::Abandoned
    )
  }
}

/// Aggregate status of a submission, derived from its jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
  Failed,
  Canceled,
  Undefined,
  Running,
  Pending,
  Blocked,
  Completed,
}

/// A job as persisted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
  pub job_id: String,
  pub task_id: String,
  pub submission_id: String,
  pub status: JobStatus,
  pub force: bool,
  pub created_at: DateTime<Utc>,
  /// Failure detail captured from the task function, if the job failed.
  pub stacktrace: Option<String>,
}

/// A submission as persisted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
  pub submission_id: String,
  /// Id of the submitted pipeline or task.
  pub entity_id: String,
  pub status: SubmissionStatus,
  pub created_at: DateTime<Utc>,
  pub job_ids: Vec<String>,
}
