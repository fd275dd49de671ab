//! The synchronous dispatcher.

use std::sync::Arc;

use tracing::debug;

use super::{DispatchContext, Dispatcher};
use crate::job::Job;

/// Runs each job on the calling thread, blocking the submitter until the
/// function returns. No parallelism, no queue buildup: the drain loop
/// executes jobs one by one as it pops them. Used for debugging and
/// low-volume deployments.
pub(crate) struct SynchronousDispatcher;

impl Dispatcher for SynchronousDispatcher {
  fn try_reserve(&self) -> bool {
    true
  }

  fn release(&self) {}

  fn dispatch(&self, job: Arc<Job>, ctx: DispatchContext) {
    debug!(job_id = %job.id(), task_id = %job.task().id(), "dispatching job inline");
    let outcome = ctx.run_body(&job);
    ctx.complete(job, outcome);
  }

  fn cancel(&self, _job_id: &str) {
    // A running synchronous job occupies the submitting thread; there is
    // no handle to signal.
  }

  fn capacity(&self) -> usize {
    1
  }

  fn stop(&self) {}
}
