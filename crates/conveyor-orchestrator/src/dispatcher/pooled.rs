//! The pooled dispatcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{DispatchContext, Dispatcher, JobOutcome};
use crate::job::Job;

/// Bookkeeping shared with the spawned job wrappers.
struct PoolShared {
  workers: usize,
  in_flight: AtomicUsize,
  /// Cancellation handle per dispatched job, removed when the wrapper
  /// finishes or gives up waiting.
  handles: Mutex<HashMap<String, CancellationToken>>,
}

impl PoolShared {
  fn release(&self, job_id: &str) {
    self
      .handles
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .remove(job_id);
    self.in_flight.fetch_sub(1, Ordering::SeqCst);
  }
}

/// Runs jobs asynchronously on tokio workers, bounded to `workers`
/// concurrent job bodies.
///
/// Each body runs on `spawn_blocking` so a panicking or CPU-bound task
/// cannot corrupt a sibling's run. Cancellation is cooperative: signaling
/// the handle makes the wrapper stop waiting and free the slot, but the
/// blocking body itself may run to completion in the background; its late
/// outcome is discarded because the job is already terminal.
pub(crate) struct PooledDispatcher {
  shared: Arc<PoolShared>,
  runtime: tokio::runtime::Handle,
  shutdown: CancellationToken,
}

impl PooledDispatcher {
  pub(crate) fn new(workers: usize, runtime: tokio::runtime::Handle) -> Self {
    Self {
      shared: Arc::new(PoolShared {
        workers: workers.max(1),
        in_flight: AtomicUsize::new(0),
        handles: Mutex::new(HashMap::new()),
      }),
      runtime,
      shutdown: CancellationToken::new(),
    }
  }
}

impl Dispatcher for PooledDispatcher {
  fn try_reserve(&self) -> bool {
    if self.shutdown.is_cancelled() {
      return false;
    }
    let workers = self.shared.workers;
    self
      .shared
      .in_flight
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
        (current < workers).then_some(current + 1)
      })
      .is_ok()
  }

  fn release(&self) {
    self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
  }

  fn dispatch(&self, job: Arc<Job>, ctx: DispatchContext) {
    let token = self.shutdown.child_token();
    self
      .shared
      .handles
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .insert(job.id().to_string(), token.clone());

    debug!(job_id = %job.id(), task_id = %job.task().id(), "dispatching job to pool");

    let shared = self.shared.clone();
    self.runtime.spawn(async move {
      let body = {
        let ctx = ctx.clone();
        let job = job.clone();
        tokio::task::spawn_blocking(move || ctx.run_body(&job))
      };

      let outcome = tokio::select! {
        result = body => match result {
          Ok(outcome) => Some(outcome),
          // run_body catches panics itself; a join error only shows up
          // when the runtime is shutting down.
          Err(err) => Some(JobOutcome::Failure(format!("worker terminated: {err}"))),
        },
        _ = token.cancelled() => None,
      };

      shared.release(job.id());
      match outcome {
        Some(outcome) => ctx.complete(job, outcome),
        None => {
          warn!(
            job_id = %job.id(),
            "stopped waiting on canceled job; its body may still be running"
          );
          // The slot is free even though no completion will arrive.
          ctx.drain();
        }
      }
    });
  }

  fn cancel(&self, job_id: &str) {
    let handle = self
      .shared
      .handles
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .get(job_id)
      .cloned();
    if let Some(token) = handle {
      debug!(job_id, "signaling best-effort cancellation");
      token.cancel();
    }
  }

  fn capacity(&self) -> usize {
    self.shared.workers
  }

  fn stop(&self) {
    self.shutdown.cancel();
  }
}
