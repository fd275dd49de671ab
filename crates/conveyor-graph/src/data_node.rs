//! Data node metadata handles.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Mutable freshness metadata, guarded by the node's own mutex.
#[derive(Debug, Default)]
struct NodeState {
  /// Time of the last successful write. `None` means never written.
  last_edit: Option<DateTime<Utc>>,
  /// Set while a pending or running job owns this node as an output.
  edit_in_progress: bool,
}

/// A named, versioned handle to a piece of external data.
///
/// The orchestrator reads and writes only the metadata held here: the edit
/// lock signals concurrent readers that fresh data is pending, and the last
/// write timestamp drives the skip policy. The payload itself lives behind
/// whatever storage backend the hosting application uses.
#[derive(Debug)]
pub struct DataNode {
  id: String,
  /// How long a write stays fresh. `None` means writes never expire.
  validity: Option<Duration>,
  state: Mutex<NodeState>,
}

impl DataNode {
  /// Create a data node that has never been written.
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      validity: None,
      state: Mutex::new(NodeState::default()),
    }
  }

  /// Create a data node whose writes expire after `validity`.
  pub fn with_validity(id: impl Into<String>, validity: Duration) -> Self {
    Self {
      id: id.into(),
      validity: Some(validity),
      state: Mutex::new(NodeState::default()),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn validity(&self) -> Option<Duration> {
    self.validity
  }

  /// Time of the last successful write, if any.
  pub fn last_edit(&self) -> Option<DateTime<Utc>> {
    self.state.lock().unwrap_or_else(|e| e.into_inner()).last_edit
  }

  /// Whether a job currently owns this node as a pending output.
  pub fn is_locked(&self) -> bool {
    self
      .state
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .edit_in_progress
  }

  /// A node can be read iff it is not locked for edit and has been written
  /// at least once.
  pub fn is_ready_for_reading(&self) -> bool {
    let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
    !state.edit_in_progress && state.last_edit.is_some()
  }

  /// A node is up to date iff it has been written and its validity window
  /// (when configured) has not elapsed. Purely a timestamp check: an edit
  /// lock held by an in-flight job does not age the existing data.
  pub fn is_up_to_date(&self) -> bool {
    let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
    let Some(last_edit) = state.last_edit else {
      return false;
    };
    match self.validity {
      None => true,
      Some(validity) => match chrono::Duration::from_std(validity) {
        Ok(window) => Utc::now() <= last_edit + window,
        // A validity window too large for chrono never expires.
        Err(_) => true,
      },
    }
  }

  /// Mark this node as having a write in flight.
  pub fn lock_edit(&self) {
    self
      .state
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .edit_in_progress = true;
  }

  /// Release the edit lock. Passing `Some(ts)` records a completed write at
  /// `ts`; `None` leaves the last write timestamp untouched (the job was
  /// skipped, canceled, or failed — no new data was produced).
  pub fn unlock_edit(&self, effective: Option<DateTime<Utc>>) {
    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
    state.edit_in_progress = false;
    if let Some(ts) = effective {
      state.last_edit = Some(ts);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn never_written_node_is_not_ready() {
    let node = DataNode::new("raw");
    assert!(!node.is_ready_for_reading());
    assert!(!node.is_up_to_date());
    assert!(node.last_edit().is_none());
  }

  #[test]
  fn locked_node_is_not_ready_even_when_written() {
    let node = DataNode::new("raw");
    node.unlock_edit(Some(Utc::now()));
    assert!(node.is_ready_for_reading());

    node.lock_edit();
    assert!(node.is_locked());
    assert!(!node.is_ready_for_reading());
    // Freshness is independent of the edit lock.
    assert!(node.is_up_to_date());
  }

  #[test]
  fn unlock_without_timestamp_preserves_last_edit() {
    let node = DataNode::new("raw");
    let first = Utc::now();
    node.unlock_edit(Some(first));

    node.lock_edit();
    node.unlock_edit(None);
    assert_eq!(node.last_edit(), Some(first));
    assert!(node.is_ready_for_reading());
  }

  #[test]
  fn validity_window_expires() {
    let node = DataNode::with_validity("cache", Duration::from_millis(0));
    node.unlock_edit(Some(Utc::now() - chrono::Duration::seconds(1)));
    assert!(node.is_ready_for_reading());
    assert!(!node.is_up_to_date());
  }

  #[test]
  fn no_validity_means_always_fresh_once_written() {
    let node = DataNode::new("stable");
    node.unlock_edit(Some(Utc::now() - chrono::Duration::days(365)));
    assert!(node.is_up_to_date());
  }
}
