/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// The definition file is not valid JSON for the expected shape.
  #[error("failed to parse pipeline definition: {0}")]
  Parse(#[from] serde_json::Error),

  /// A task references a data node that is not declared.
  #[error("task '{task_id}' references undeclared data node '{node_id}'")]
  UnknownDataNode { task_id: String, node_id: String },

  /// A task declares an empty command.
  #[error("task '{task_id}' has an empty command")]
  EmptyCommand { task_id: String },
}
