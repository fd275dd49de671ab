//! Status-change notifications.
//!
//! The scheduler publishes an event on every job and submission transition.
//! Publication is fire-and-forget: the orchestrator never consults a return
//! value, and a slow or absent consumer cannot stall scheduling.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::job::JobStatus;
use crate::submission::SubmissionStatus;

/// Events emitted on status transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
  /// A job changed status.
  JobStatusChanged {
    job_id: String,
    task_id: String,
    submission_id: String,
    status: JobStatus,
  },

  /// A submission's aggregate status changed.
  SubmissionStatusChanged {
    submission_id: String,
    entity_id: String,
    status: SubmissionStatus,
  },
}

/// Trait for receiving orchestration events.
///
/// Implementations decide what to do with them (persist, broadcast, log,
/// ignore, etc.).
pub trait Notifier: Send + Sync {
  fn publish(&self, event: Event);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
  fn publish(&self, _event: Event) {
    // Intentionally empty
  }
}

/// A notifier that sends events to an unbounded channel.
///
/// Unbounded so the scheduler never blocks on a slow consumer; volume is
/// one event per transition, so growth stays small in practice.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<Event>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<Event>) -> Self {
    Self { sender }
  }
}

impl Notifier for ChannelNotifier {
  fn publish(&self, event: Event) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
