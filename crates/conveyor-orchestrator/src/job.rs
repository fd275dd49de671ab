//! The job state machine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use conveyor_graph::Task;
use conveyor_store::JobRecord;
use tokio::sync::watch;
use tracing::warn;

pub use conveyor_store::JobStatus;

/// Trait for observing job status transitions.
///
/// Listeners are invoked synchronously, in registration order, on every
/// transition. They run on whichever thread applied the transition, so
/// implementations should stay short.
pub trait JobListener: Send + Sync {
  fn on_status_change(&self, job: &Job);
}

/// One execution attempt of a task.
///
/// Created exactly once per (task, submission) pair. The status is the only
/// mutable field callers observe; it moves through the state machine below
/// and every transition is validated:
///
/// ```text
/// Submitted ─┬─> Blocked ─┬─> Pending ─┬─> Running ─┬─> Completed
///            │            │            │            └─> Failed
///            │            │            └─> Skipped
///            │            └─> Canceled / Abandoned
///            └─> Pending ──> Canceled
/// ```
pub struct Job {
  id: String,
  task: Arc<Task>,
  submission_id: String,
  force: bool,
  created_at: DateTime<Utc>,
  status: Mutex<JobStatus>,
  status_tx: watch::Sender<JobStatus>,
  stacktrace: Mutex<Option<String>>,
  listeners: Mutex<Vec<Arc<dyn JobListener>>>,
}

impl Job {
  pub(crate) fn new(task: Arc<Task>, submission_id: impl Into<String>, force: bool) -> Self {
    let (status_tx, _) = watch::channel(JobStatus::Submitted);
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      task,
      submission_id: submission_id.into(),
      force,
      created_at: Utc::now(),
      status: Mutex::new(JobStatus::Submitted),
      status_tx,
      stacktrace: Mutex::new(None),
      listeners: Mutex::new(Vec::new()),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn task(&self) -> &Arc<Task> {
    &self.task
  }

  pub fn submission_id(&self) -> &str {
    &self.submission_id
  }

  /// Whether this job bypasses the skip policy.
  pub fn is_force(&self) -> bool {
    self.force
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn status(&self) -> JobStatus {
    *self.status.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn is_finished(&self) -> bool {
    self.status().is_terminal()
  }

  /// Failure detail captured from the task body, if the job failed.
  pub fn stacktrace(&self) -> Option<String> {
    self
      .stacktrace
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  pub(crate) fn set_stacktrace(&self, trace: String) {
    *self.stacktrace.lock().unwrap_or_else(|e| e.into_inner()) = Some(trace);
  }

  /// Attach a listener; it will observe every subsequent transition.
  pub fn add_listener(&self, listener: Arc<dyn JobListener>) {
    self
      .listeners
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(listener);
  }

  /// Apply a status transition, returning false (and warning) when the
  /// transition is not legal from the current status. Listeners run after
  /// the status is visible, outside the status lock.
  pub(crate) fn transition(&self, to: JobStatus) -> bool {
    {
      let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
      if !can_transition(*status, to) {
        warn!(
          job_id = %self.id,
          from = ?*status,
          to = ?to,
          "ignoring invalid job status transition"
        );
        return false;
      }
      *status = to;
    }
    self.status_tx.send_replace(to);
    let listeners = self
      .listeners
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone();
    for listener in listeners {
      listener.on_status_change(self);
    }
    true
  }

  /// Wait for this job to reach a terminal status.
  ///
  /// Condition wait on the status channel, not polling. Returns `None` when
  /// the optional timeout elapses first.
  pub async fn wait(&self, timeout: Option<Duration>) -> Option<JobStatus> {
    let mut rx = self.status_tx.subscribe();
    let terminal = async move {
      loop {
        let status = *rx.borrow_and_update();
        if status.is_terminal() {
          return status;
        }
        if rx.changed().await.is_err() {
          return *rx.borrow();
        }
      }
    };
    match timeout {
      Some(limit) => tokio::time::timeout(limit, terminal).await.ok(),
      None => Some(terminal.await),
    }
  }

  /// The persistable view of this job.
  pub(crate) fn record(&self) -> JobRecord {
    JobRecord {
      job_id: self.id.clone(),
      task_id: self.task.id().to_string(),
      submission_id: self.submission_id.clone(),
      status: self.status(),
      force: self.force,
      created_at: self.created_at,
      stacktrace: self.stacktrace(),
    }
  }
}

impl std::fmt::Debug for Job {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Job")
      .field("id", &self.id)
      .field("task", &self.task.id())
      .field("submission_id", &self.submission_id)
      .field("force", &self.force)
      .field("status", &self.status())
      .finish()
  }
}

fn can_transition(from: JobStatus, to: JobStatus) -> bool {
  use JobStatus::*;
  matches!(
    (from, to),
    (Submitted, Blocked)
      | (Submitted, Pending)
      | (Blocked, Pending)
      | (Pending, Running)
      | (Pending, Skipped)
      | (Running, Completed)
      | (Running, Failed)
      | (Blocked, Canceled)
      | (Pending, Canceled)
      | (Running, Canceled)
      | (Blocked, Abandoned)
  )
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  fn job() -> Job {
    let task = Arc::new(Task::new("t1", "fn_t1", vec![], vec![]));
    Job::new(task, "s1", false)
  }

  #[test]
  fn follows_the_happy_path() {
    let job = job();
    assert_eq!(job.status(), JobStatus::Submitted);
    assert!(job.transition(JobStatus::Pending));
    assert!(job.transition(JobStatus::Running));
    assert!(job.transition(JobStatus::Completed));
    assert!(job.is_finished());
  }

  #[test]
  fn rejects_illegal_transitions() {
    let job = job();
    assert!(!job.transition(JobStatus::Running));
    assert!(!job.transition(JobStatus::Completed));
    assert_eq!(job.status(), JobStatus::Submitted);

    assert!(job.transition(JobStatus::Pending));
    assert!(job.transition(JobStatus::Running));
    assert!(job.transition(JobStatus::Canceled));
    // Terminal states admit nothing further.
    assert!(!job.transition(JobStatus::Completed));
    assert_eq!(job.status(), JobStatus::Canceled);
  }

  #[test]
  fn listeners_fire_in_registration_order() {
    struct Counter {
      calls: AtomicUsize,
      expected_order: usize,
      order_seen: Arc<AtomicUsize>,
    }
    impl JobListener for Counter {
      fn on_status_change(&self, _job: &Job) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.order_seen.store(self.expected_order, Ordering::SeqCst);
      }
    }

    let job = job();
    let order_seen = Arc::new(AtomicUsize::new(0));
    let first = Arc::new(Counter {
      calls: AtomicUsize::new(0),
      expected_order: 1,
      order_seen: order_seen.clone(),
    });
    let second = Arc::new(Counter {
      calls: AtomicUsize::new(0),
      expected_order: 2,
      order_seen: order_seen.clone(),
    });
    job.add_listener(first.clone());
    job.add_listener(second.clone());

    job.transition(JobStatus::Pending);
    assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    // The last listener to run was the last one registered.
    assert_eq!(order_seen.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn wait_returns_on_terminal_status() {
    let job = Arc::new(job());
    job.transition(JobStatus::Pending);

    let waiter = {
      let job = job.clone();
      tokio::spawn(async move { job.wait(None).await })
    };
    job.transition(JobStatus::Skipped);
    assert_eq!(waiter.await.unwrap(), Some(JobStatus::Skipped));
  }

  #[tokio::test]
  async fn wait_times_out_on_a_stuck_job() {
    let job = job();
    job.transition(JobStatus::Blocked);
    let outcome = job.wait(Some(Duration::from_millis(20))).await;
    assert_eq!(outcome, None);
  }
}
