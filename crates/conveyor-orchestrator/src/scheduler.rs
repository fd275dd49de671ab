//! The scheduler: queueing, blocking, skip decisions, and the cancellation
//! cascade.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use conveyor_config::{DispatcherKind, OrchestratorConfig};
use conveyor_graph::{Pipeline, Task};
use conveyor_registry::FunctionRegistry;
use conveyor_store::Store;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatcher::{
  DispatchContext, Dispatcher, JobOutcome, PooledDispatcher, SynchronousDispatcher,
};
use crate::error::OrchestrationError;
use crate::events::{Event, Notifier};
use crate::job::{Job, JobListener, JobStatus};
use crate::skip::needs_to_run;
use crate::submission::Submission;

/// Runtime state guarded by the scheduler lock.
///
/// All read-modify-write of the queue and blocked set happens while holding
/// this lock; dispatch hand-off happens outside it so a slow task body
/// never stalls other submitters.
#[derive(Default)]
struct SchedulerState {
  /// Jobs ready to run, FIFO.
  queue: VecDeque<Arc<Job>>,
  /// Jobs with at least one input data node not ready for reading.
  blocked: Vec<Arc<Job>>,
  /// Every job by id, for cancellation lookups. Entries are retained for
  /// the process lifetime until pruned through `prune_finished`.
  jobs: HashMap<String, Arc<Job>>,
  /// Every submission by id, for aggregate refresh. Same retention as
  /// `jobs`.
  submissions: HashMap<String, Arc<Submission>>,
}

/// The job orchestration engine.
///
/// Owns the run queue, the blocked set, and the dispatcher selected once at
/// construction. Many threads may submit and cancel concurrently; the
/// internal lock serializes queue mutation only.
#[derive(Clone)]
pub struct Scheduler {
  inner: Arc<SchedulerInner>,
}

pub(crate) struct SchedulerInner {
  state: Mutex<SchedulerState>,
  dispatcher: Box<dyn Dispatcher>,
  registry: Arc<FunctionRegistry>,
  store: Arc<dyn Store>,
  notifier: Arc<dyn Notifier>,
}

impl Scheduler {
  /// Build a scheduler with the dispatcher named by `config`.
  ///
  /// The pooled dispatcher spawns its workers on the current tokio runtime,
  /// so construction must happen inside one.
  pub fn new(
    config: &OrchestratorConfig,
    registry: Arc<FunctionRegistry>,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
  ) -> Result<Self, OrchestrationError> {
    let dispatcher: Box<dyn Dispatcher> = match config.dispatcher {
      DispatcherKind::Synchronous => Box::new(SynchronousDispatcher),
      DispatcherKind::Pooled => {
        let runtime = tokio::runtime::Handle::try_current()
          .map_err(|err| OrchestrationError::Runtime(err.to_string()))?;
        Box::new(PooledDispatcher::new(config.workers, runtime))
      }
    };
    info!(
      dispatcher = ?config.dispatcher,
      capacity = dispatcher.capacity(),
      "scheduler initialized"
    );
    Ok(Self {
      inner: Arc::new(SchedulerInner {
        state: Mutex::new(SchedulerState::default()),
        dispatcher,
        registry,
        store,
        notifier,
      }),
    })
  }

  /// Submit a whole pipeline: one job per task, topologically ordered,
  /// grouped under a fresh submission.
  pub fn submit(
    &self,
    pipeline: &Pipeline,
    callbacks: Vec<Arc<dyn JobListener>>,
    force: bool,
  ) -> Result<Arc<Submission>, OrchestrationError> {
    let ordered = pipeline.topological_tasks()?;
    self
      .inner
      .submit_tasks(pipeline.id(), ordered, callbacks, force)
  }

  /// Submit a single task under its own single-job submission.
  pub fn submit_task(
    &self,
    task: Arc<Task>,
    callbacks: Vec<Arc<dyn JobListener>>,
    force: bool,
  ) -> Result<Arc<Job>, OrchestrationError> {
    let entity_id = task.id().to_string();
    let submission = self
      .inner
      .submit_tasks(&entity_id, vec![task], callbacks, force)?;
    // Single-task submissions always carry exactly one job.
    Ok(submission.jobs()[0].clone())
  }

  /// Cancel a job and abandon every blocked job of the same submission that
  /// transitively depends on its outputs.
  pub fn cancel(&self, job_id: &str) -> Result<(), OrchestrationError> {
    self.inner.cancel(job_id)
  }

  /// Look up a live job by id.
  pub fn job(&self, job_id: &str) -> Result<Arc<Job>, OrchestrationError> {
    self
      .inner
      .lock_state()
      .jobs
      .get(job_id)
      .cloned()
      .ok_or_else(|| OrchestrationError::NotFound(format!("job '{job_id}'")))
  }

  /// Look up a live submission by id.
  pub fn submission(&self, submission_id: &str) -> Result<Arc<Submission>, OrchestrationError> {
    self
      .inner
      .lock_state()
      .submissions
      .get(submission_id)
      .cloned()
      .ok_or_else(|| OrchestrationError::NotFound(format!("submission '{submission_id}'")))
  }

  /// Number of jobs waiting in the run queue.
  pub fn queued_jobs(&self) -> usize {
    self.inner.lock_state().queue.len()
  }

  /// Number of jobs waiting on inputs.
  pub fn blocked_jobs(&self) -> usize {
    self.inner.lock_state().blocked.len()
  }

  /// Drop finished submissions and their jobs from the in-memory
  /// registries, returning how many submissions were removed. Persisted
  /// records are untouched; long-running hosts call this periodically to
  /// keep the registries bounded.
  pub fn prune_finished(&self) -> usize {
    let mut state = self.inner.lock_state();
    let finished: Vec<String> = state
      .submissions
      .iter()
      .filter(|(_, submission)| submission.is_finished())
      .map(|(id, _)| id.clone())
      .collect();
    for id in &finished {
      if let Some(submission) = state.submissions.remove(id) {
        for job in submission.jobs() {
          state.jobs.remove(job.id());
        }
      }
    }
    finished.len()
  }

  /// Stop the dispatcher. Queued jobs stay queued; running jobs are
  /// signaled best-effort.
  pub fn stop(&self) {
    info!("scheduler stopping");
    self.inner.dispatcher.stop();
  }
}

impl SchedulerInner {
  fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Create, register, route, and drain the jobs of one submit call.
  fn submit_tasks(
    self: &Arc<Self>,
    entity_id: &str,
    tasks: Vec<Arc<Task>>,
    callbacks: Vec<Arc<dyn JobListener>>,
    force: bool,
  ) -> Result<Arc<Submission>, OrchestrationError> {
    // Fail the whole call before creating anything if a function is
    // missing from the registry.
    for task in &tasks {
      if !self.registry.contains(task.function()) {
        return Err(OrchestrationError::NotFound(format!(
          "function '{}'",
          task.function()
        )));
      }
    }

    let submission_id = Uuid::new_v4().to_string();
    let mut jobs: Vec<Arc<Job>> = Vec::with_capacity(tasks.len());
    for task in tasks {
      // Locking outputs before the job exists signals concurrent readers
      // that fresh data is pending.
      for output in task.outputs() {
        output.lock_edit();
      }
      let job = Arc::new(Job::new(task, &submission_id, force));
      for callback in &callbacks {
        job.add_listener(callback.clone());
      }
      let record = job.record();
      jobs.push(job);
      if let Err(err) = self.store.save_job(&record) {
        unlock_outputs(&jobs);
        return Err(err.into());
      }
    }

    let submission = Arc::new(Submission::new(&submission_id, entity_id, jobs.clone()));
    if let Err(err) = self.store.save_submission(&submission.record()) {
      unlock_outputs(&jobs);
      return Err(err.into());
    }
    {
      let mut state = self.lock_state();
      for job in &jobs {
        state.jobs.insert(job.id().to_string(), job.clone());
      }
      state
        .submissions
        .insert(submission_id.clone(), submission.clone());
    }

    info!(
      entity_id,
      submission_id = %submission_id,
      jobs = jobs.len(),
      force,
      "submission created"
    );

    for job in &jobs {
      self.route(job);
    }
    self.drain();
    Ok(submission)
  }

  /// Blocking check: queue the job, or park it until its inputs are ready.
  ///
  /// Re-evaluated only here and in the unblock scan, never polled. The
  /// readiness check and the insertion happen under one lock acquisition:
  /// a producer completing in between would run its unblock scan before
  /// this job is visible and the wakeup would be lost. The status is
  /// published after insertion; a scan or cancel that races it wins, and
  /// the late transition is refused as usual.
  fn route(self: &Arc<Self>, job: &Arc<Job>) {
    let blocked = {
      let mut state = self.lock_state();
      let blocked = job
        .task()
        .inputs()
        .iter()
        .any(|node| !node.is_ready_for_reading());
      if blocked {
        state.blocked.push(job.clone());
      } else {
        state.queue.push_back(job.clone());
      }
      blocked
    };
    if blocked {
      self.set_status(job, JobStatus::Blocked);
    } else {
      self.set_status(job, JobStatus::Pending);
    }
  }

  /// Pop and handle queued jobs while the dispatcher has capacity.
  pub(crate) fn drain(self: &Arc<Self>) {
    enum Action {
      Run(Arc<Job>),
      Skip(Arc<Job>),
      Drop,
    }

    loop {
      let action = {
        let mut state = self.lock_state();
        let Some(head) = state.queue.front().cloned() else {
          return;
        };
        let status = head.status();
        if status == JobStatus::Submitted {
          // Routing has not published the Pending transition yet; the
          // submitting thread drains again right after it does.
          return;
        }
        if status.is_terminal() {
          // Canceled while queued; nothing left to do for it.
          state.queue.pop_front();
          Action::Drop
        } else if head.is_force() || needs_to_run(head.task()) {
          if !self.dispatcher.try_reserve() {
            // Capacity exhausted is not an error: leave the job queued.
            return;
          }
          state.queue.pop_front();
          Action::Run(head)
        } else {
          state.queue.pop_front();
          Action::Skip(head)
        }
      };

      match action {
        Action::Run(job) => {
          if self.set_status(&job, JobStatus::Running) {
            let ctx = DispatchContext::new(self.registry.clone(), Arc::downgrade(self));
            self.dispatcher.dispatch(job, ctx);
          } else {
            // Lost a race with cancellation between pop and transition.
            self.dispatcher.release();
          }
        }
        Action::Skip(job) => {
          for output in job.task().outputs() {
            output.unlock_edit(None);
          }
          info!(job_id = %job.id(), task_id = %job.task().id(), "job skipped, outputs fresh");
          self.set_status(&job, JobStatus::Skipped);
          self.unblock_scan();
        }
        Action::Drop => {}
      }
    }
  }

  /// Completion callback invoked by dispatchers.
  pub(crate) fn on_job_done(self: &Arc<Self>, job: Arc<Job>, outcome: JobOutcome) {
    match outcome {
      JobOutcome::Success => {
        if self.set_status(&job, JobStatus::Completed) {
          let now = Utc::now();
          for output in job.task().outputs() {
            output.unlock_edit(Some(now));
          }
          info!(job_id = %job.id(), task_id = %job.task().id(), "job completed");
          self.unblock_scan();
        } else {
          debug!(job_id = %job.id(), "dropping stale completion for terminal job");
        }
      }
      JobOutcome::Failure(trace) => {
        job.set_stacktrace(trace.clone());
        if self.set_status(&job, JobStatus::Failed) {
          for output in job.task().outputs() {
            output.unlock_edit(None);
          }
          error!(job_id = %job.id(), task_id = %job.task().id(), error = %trace, "job failed");
          // No unblock scan: dependents of a failed job stay blocked
          // until an operator cancels them.
        } else {
          debug!(job_id = %job.id(), "dropping stale failure for terminal job");
        }
      }
    }
    self.drain();
  }

  /// Move every blocked job whose inputs are now ready into the run queue.
  fn unblock_scan(self: &Arc<Self>) {
    let unblocked: Vec<Arc<Job>> = {
      let mut state = self.lock_state();
      let (ready, still_blocked): (Vec<_>, Vec<_>) =
        state.blocked.drain(..).partition(|job| {
          job
            .task()
            .inputs()
            .iter()
            .all(|node| node.is_ready_for_reading())
        });
      state.blocked = still_blocked;
      ready
    };

    for job in unblocked {
      debug!(job_id = %job.id(), task_id = %job.task().id(), "job unblocked");
      self.set_status(&job, JobStatus::Pending);
      self.lock_state().queue.push_back(job);
    }
  }

  /// The cancellation cascade.
  fn cancel(self: &Arc<Self>, job_id: &str) -> Result<(), OrchestrationError> {
    let (target, abandoned) = {
      let mut state = self.lock_state();
      let target = state
        .jobs
        .get(job_id)
        .cloned()
        .ok_or_else(|| OrchestrationError::NotFound(format!("job '{job_id}'")))?;

      if target.status().is_terminal() {
        warn!(job_id, status = ?target.status(), "cancel of a terminal job is a no-op");
        return Ok(());
      }

      // Reachability over the blocked subgraph of this submission: start
      // from the target's outputs and follow output -> input edges.
      let mut abandoned: Vec<Arc<Job>> = Vec::new();
      let mut seen: HashSet<String> = HashSet::from([target.id().to_string()]);
      let mut frontier: Vec<String> = target
        .task()
        .outputs()
        .iter()
        .map(|node| node.id().to_string())
        .collect();
      while !frontier.is_empty() {
        let mut next = Vec::new();
        for job in &state.blocked {
          if job.submission_id() != target.submission_id() || seen.contains(job.id()) {
            continue;
          }
          if frontier.iter().any(|node_id| job.task().reads(node_id)) {
            seen.insert(job.id().to_string());
            next.extend(job.task().outputs().iter().map(|n| n.id().to_string()));
            abandoned.push(job.clone());
          }
        }
        frontier = next;
      }

      state.queue.retain(|job| !seen.contains(job.id()));
      state.blocked.retain(|job| !seen.contains(job.id()));
      (target, abandoned)
    };

    for job in std::iter::once(&target).chain(abandoned.iter()) {
      for output in job.task().outputs() {
        output.unlock_edit(None);
      }
    }

    if target.status() == JobStatus::Running {
      self.dispatcher.cancel(target.id());
    }

    info!(
      job_id,
      abandoned = abandoned.len(),
      "canceling job and its blocked dependents"
    );
    self.set_status(&target, JobStatus::Canceled);
    for job in &abandoned {
      self.set_status(job, JobStatus::Abandoned);
    }

    self.unblock_scan();
    self.drain();
    Ok(())
  }

  /// Apply a transition and its side effects: persist the record, publish
  /// the event, refresh the owning submission. Returns false when the
  /// transition was not legal (and had no side effects).
  fn set_status(&self, job: &Arc<Job>, status: JobStatus) -> bool {
    if !job.transition(status) {
      return false;
    }
    if let Err(err) = self.store.save_job(&job.record()) {
      error!(job_id = %job.id(), error = %err, "failed to persist job transition");
    }
    self.notifier.publish(Event::JobStatusChanged {
      job_id: job.id().to_string(),
      task_id: job.task().id().to_string(),
      submission_id: job.submission_id().to_string(),
      status,
    });
    self.refresh_submission(job.submission_id());
    true
  }

  /// Recompute one submission's aggregate and publish/persist on change.
  fn refresh_submission(&self, submission_id: &str) {
    let submission = self.lock_state().submissions.get(submission_id).cloned();
    let Some(submission) = submission else {
      return;
    };
    let (status, changed) = submission.refresh_status();
    if changed {
      if let Err(err) = self.store.save_submission(&submission.record()) {
        error!(submission_id, error = %err, "failed to persist submission transition");
      }
      self.notifier.publish(Event::SubmissionStatusChanged {
        submission_id: submission.id().to_string(),
        entity_id: submission.entity_id().to_string(),
        status,
      });
    }
  }
}

/// Release the edit locks of every output owned by `jobs`. A rejected
/// submit leaves no trace behind.
fn unlock_outputs(jobs: &[Arc<Job>]) {
  for job in jobs {
    for output in job.task().outputs() {
      output.unlock_edit(None);
    }
  }
}
