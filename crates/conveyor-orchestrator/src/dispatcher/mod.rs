//! Job dispatchers.
//!
//! Two interchangeable implementations behind one contract: the
//! [`SynchronousDispatcher`] runs a job's function on the calling thread,
//! the [`PooledDispatcher`] runs it on a bounded tokio worker pool.
//! Admission (`try_reserve`) is called under the scheduler lock so the pool
//! bound is never exceeded; the dispatch hand-off itself happens outside
//! the lock.

mod pooled;
mod sync;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use conveyor_registry::FunctionRegistry;

use crate::job::Job;
use crate::scheduler::SchedulerInner;

pub(crate) use pooled::PooledDispatcher;
pub(crate) use sync::SynchronousDispatcher;

/// What a finished job body reports back to the scheduler.
#[derive(Debug)]
pub(crate) enum JobOutcome {
  Success,
  /// Captured failure detail: the function's error or a panic message.
  Failure(String),
}

/// Everything a dispatcher needs to run one job and report back.
#[derive(Clone)]
pub(crate) struct DispatchContext {
  registry: Arc<FunctionRegistry>,
  scheduler: Weak<SchedulerInner>,
}

impl DispatchContext {
  pub(crate) fn new(registry: Arc<FunctionRegistry>, scheduler: Weak<SchedulerInner>) -> Self {
    Self {
      registry,
      scheduler,
    }
  }

  /// Resolve and run the job's function, isolating panics.
  pub(crate) fn run_body(&self, job: &Job) -> JobOutcome {
    let function = match self.registry.get(job.task().function()) {
      Ok(function) => function,
      Err(err) => return JobOutcome::Failure(err.to_string()),
    };
    match catch_unwind(AssertUnwindSafe(|| function.call())) {
      Ok(Ok(())) => JobOutcome::Success,
      Ok(Err(err)) => JobOutcome::Failure(err.to_string()),
      Err(panic) => JobOutcome::Failure(format!("task panicked: {}", panic_message(panic.as_ref()))),
    }
  }

  /// Report a completed job to the scheduler.
  pub(crate) fn complete(&self, job: Arc<Job>, outcome: JobOutcome) {
    if let Some(scheduler) = self.scheduler.upgrade() {
      scheduler.on_job_done(job, outcome);
    }
  }

  /// Re-run the drain loop (used when capacity frees without a completion).
  pub(crate) fn drain(&self) {
    if let Some(scheduler) = self.scheduler.upgrade() {
      scheduler.drain();
    }
  }
}

/// Contract shared by the two dispatcher variants.
pub(crate) trait Dispatcher: Send + Sync {
  /// Claim a dispatch slot. Called under the scheduler lock so concurrent
  /// drains cannot overshoot the capacity.
  fn try_reserve(&self) -> bool;

  /// Give back a slot claimed with `try_reserve` but never dispatched.
  fn release(&self);

  /// Run `job` on a previously reserved slot. Fire-and-forget: the
  /// implementation must eventually report through the context's
  /// completion sink.
  fn dispatch(&self, job: Arc<Job>, ctx: DispatchContext);

  /// Best-effort cancellation of a running job's execution.
  fn cancel(&self, job_id: &str);

  /// Nominal parallel capacity.
  fn capacity(&self) -> usize;

  /// Stop accepting work and signal in-flight executions.
  fn stop(&self);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(message) = panic.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = panic.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}
