//! Immutable task descriptions.

use std::sync::Arc;

use crate::data_node::DataNode;

/// An immutable description of one computation unit: a function (referenced
/// by its registry key, never as a captured closure) plus the data nodes it
/// reads and writes, in declaration order.
#[derive(Debug, Clone)]
pub struct Task {
  id: String,
  /// Registry key of the function executed for this task.
  function: String,
  inputs: Vec<Arc<DataNode>>,
  outputs: Vec<Arc<DataNode>>,
  /// Whether the skip policy may decide not to re-run this task when its
  /// outputs are already fresh. Defaults to false.
  skippable: bool,
}

impl Task {
  pub fn new(
    id: impl Into<String>,
    function: impl Into<String>,
    inputs: Vec<Arc<DataNode>>,
    outputs: Vec<Arc<DataNode>>,
  ) -> Self {
    Self {
      id: id.into(),
      function: function.into(),
      inputs,
      outputs,
      skippable: false,
    }
  }

  /// Mark this task as skippable.
  pub fn skippable(mut self) -> Self {
    self.skippable = true;
    self
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn function(&self) -> &str {
    &self.function
  }

  pub fn inputs(&self) -> &[Arc<DataNode>] {
    &self.inputs
  }

  pub fn outputs(&self) -> &[Arc<DataNode>] {
    &self.outputs
  }

  pub fn is_skippable(&self) -> bool {
    self.skippable
  }

  /// Whether `node_id` appears among this task's inputs.
  pub fn reads(&self, node_id: &str) -> bool {
    self.inputs.iter().any(|n| n.id() == node_id)
  }

  /// Whether `node_id` appears among this task's outputs.
  pub fn writes(&self, node_id: &str) -> bool {
    self.outputs.iter().any(|n| n.id() == node_id)
  }
}
