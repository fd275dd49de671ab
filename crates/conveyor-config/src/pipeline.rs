use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::orchestrator::OrchestratorConfig;

/// A pipeline definition as loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
  pub id: String,
  #[serde(default)]
  pub data_nodes: Vec<DataNodeDef>,
  pub tasks: Vec<TaskDef>,
  #[serde(default)]
  pub orchestrator: OrchestratorConfig,
}

/// A declared data node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNodeDef {
  pub id: String,
  /// Freshness window in seconds; omitted means writes never expire.
  #[serde(default)]
  pub validity_secs: Option<u64>,
}

/// A declared task. The command is executed as-is, argv style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  pub id: String,
  pub command: Vec<String>,
  #[serde(default)]
  pub inputs: Vec<String>,
  #[serde(default)]
  pub outputs: Vec<String>,
  #[serde(default)]
  pub skippable: bool,
}

impl PipelineDef {
  /// Parse a definition from JSON and validate its internal references.
  pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
    let def: PipelineDef = serde_json::from_str(content)?;
    def.validate()?;
    Ok(def)
  }

  /// Check that every task references only declared data nodes and carries
  /// a non-empty command.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let declared: HashSet<&str> = self.data_nodes.iter().map(|n| n.id.as_str()).collect();
    for task in &self.tasks {
      if task.command.is_empty() {
        return Err(ConfigError::EmptyCommand {
          task_id: task.id.clone(),
        });
      }
      for node_id in task.inputs.iter().chain(&task.outputs) {
        if !declared.contains(node_id.as_str()) {
          return Err(ConfigError::UnknownDataNode {
            task_id: task.id.clone(),
            node_id: node_id.clone(),
          });
        }
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::orchestrator::DispatcherKind;

  #[test]
  fn parses_a_minimal_definition() {
    let def = PipelineDef::from_json_str(
      r#"{
        "id": "etl",
        "data_nodes": [{ "id": "raw" }, { "id": "clean", "validity_secs": 3600 }],
        "tasks": [
          { "id": "ingest", "command": ["sh", "-c", "true"], "outputs": ["raw"] },
          { "id": "scrub", "command": ["sh", "-c", "true"], "inputs": ["raw"], "outputs": ["clean"], "skippable": true }
        ]
      }"#,
    )
    .unwrap();

    assert_eq!(def.tasks.len(), 2);
    assert_eq!(def.data_nodes[1].validity_secs, Some(3600));
    assert!(def.tasks[1].skippable);
    assert_eq!(def.orchestrator, OrchestratorConfig::default());
  }

  #[test]
  fn orchestrator_section_overrides_defaults() {
    let def = PipelineDef::from_json_str(
      r#"{
        "id": "etl",
        "tasks": [{ "id": "t", "command": ["true"] }],
        "orchestrator": { "dispatcher": "synchronous" }
      }"#,
    )
    .unwrap();

    assert_eq!(def.orchestrator.dispatcher, DispatcherKind::Synchronous);
    assert_eq!(def.orchestrator.workers, 2);
  }

  #[test]
  fn rejects_undeclared_data_node_references() {
    let err = PipelineDef::from_json_str(
      r#"{
        "id": "etl",
        "tasks": [{ "id": "t", "command": ["true"], "inputs": ["ghost"] }]
      }"#,
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::UnknownDataNode { .. }));
  }

  #[test]
  fn rejects_empty_commands() {
    let err = PipelineDef::from_json_str(
      r#"{
        "id": "etl",
        "tasks": [{ "id": "t", "command": [] }]
      }"#,
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::EmptyCommand { .. }));
  }
}
