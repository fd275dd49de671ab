//! Submissions and aggregate status.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use conveyor_store::SubmissionRecord;
use tokio::sync::watch;

use crate::job::{Job, JobStatus};

pub use conveyor_store::SubmissionStatus;

/// The set of jobs created by one top-level submit call.
///
/// The job list is fixed at creation; the aggregate status is derived from
/// the member jobs and recomputed on every member transition until all jobs
/// are terminal.
pub struct Submission {
  id: String,
  entity_id: String,
  created_at: DateTime<Utc>,
  jobs: Vec<Arc<Job>>,
  status: Mutex<SubmissionStatus>,
  status_tx: watch::Sender<SubmissionStatus>,
}

impl Submission {
  pub(crate) fn new(id: impl Into<String>, entity_id: impl Into<String>, jobs: Vec<Arc<Job>>) -> Self {
    let status = aggregate(&jobs);
    let (status_tx, _) = watch::channel(status);
    Self {
      id: id.into(),
      entity_id: entity_id.into(),
      created_at: Utc::now(),
      jobs,
      status: Mutex::new(status),
      status_tx,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Id of the submitted pipeline or task.
  pub fn entity_id(&self) -> &str {
    &self.entity_id
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn jobs(&self) -> &[Arc<Job>] {
    &self.jobs
  }

  pub fn status(&self) -> SubmissionStatus {
    *self.status.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// All member jobs have reached a terminal status.
  pub fn is_finished(&self) -> bool {
    self.jobs.iter().all(|job| job.is_finished())
  }

  /// Recompute the aggregate from the member jobs. Returns the new status
  /// and whether it changed. Waiters are woken either way so they can
  /// re-check `is_finished`.
  pub(crate) fn refresh_status(&self) -> (SubmissionStatus, bool) {
    let computed = aggregate(&self.jobs);
    let changed = {
      let mut current = self.status.lock().unwrap_or_else(|e| e.into_inner());
      let changed = *current != computed;
      *current = computed;
      changed
    };
    self.status_tx.send_replace(computed);
    (computed, changed)
  }

  /// Wait until every member job is terminal.
  ///
  /// Returns `None` when the optional timeout elapses first. Note that a
  /// submission with a failed job does not finish on its own: the failed
  /// job's dependents stay blocked until canceled.
  pub async fn wait(&self, timeout: Option<Duration>) -> Option<SubmissionStatus> {
    let mut rx = self.status_tx.subscribe();
    let finished = async move {
      loop {
        rx.borrow_and_update();
        if self.is_finished() {
          return self.status();
        }
        if rx.changed().await.is_err() {
          return self.status();
        }
      }
    };
    match timeout {
      Some(limit) => tokio::time::timeout(limit, finished).await.ok(),
      None => Some(finished.await),
    }
  }

  /// The persistable view of this submission.
  pub(crate) fn record(&self) -> SubmissionRecord {
    SubmissionRecord {
      submission_id: self.id.clone(),
      entity_id: self.entity_id.clone(),
      status: self.status(),
      created_at: self.created_at,
      job_ids: self.jobs.iter().map(|job| job.id().to_string()).collect(),
    }
  }
}

impl std::fmt::Debug for Submission {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Submission")
      .field("id", &self.id)
      .field("entity_id", &self.entity_id)
      .field("jobs", &self.jobs.len())
      .field("status", &self.status())
      .finish()
  }
}

/// Single pass over the jobs, short-circuiting on the highest-priority
/// condition found.
fn aggregate(jobs: &[Arc<Job>]) -> SubmissionStatus {
  let mut any_abandoned = false;
  let mut any_running = false;
  let mut any_pending = false;
  let mut any_blocked = false;
  let mut any_completed = false;

  for job in jobs {
    match job.status() {
      JobStatus::Failed => return SubmissionStatus::Failed,
      JobStatus::Canceled => return SubmissionStatus::Canceled,
      JobStatus::Abandoned => any_abandoned = true,
      JobStatus::Running => any_running = true,
      JobStatus::Pending | JobStatus::Submitted => any_pending = true,
      JobStatus::Blocked => any_blocked = true,
      JobStatus::Completed | JobStatus::Skipped => any_completed = true,
    }
  }

  if any_abandoned {
    SubmissionStatus::Undefined
  } else if any_running {
    SubmissionStatus::Running
  } else if any_pending {
    SubmissionStatus::Pending
  } else if any_blocked {
    SubmissionStatus::Blocked
  } else if any_completed {
    SubmissionStatus::Completed
  } else {
    SubmissionStatus::Undefined
  }
}
