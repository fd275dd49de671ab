/// Errors raised while assembling or ordering a pipeline graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
  /// Two tasks in the same pipeline share an identifier.
  #[error("duplicate task '{task_id}' in pipeline '{pipeline_id}'")]
  DuplicateTask {
    pipeline_id: String,
    task_id: String,
  },

  /// The data-node edges between tasks form a cycle.
  #[error("pipeline '{pipeline_id}' contains a cycle through its data nodes")]
  Cycle { pipeline_id: String },
}
