//! Pipeline graphs and topological ordering.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::data_node::DataNode;
use crate::error::GraphError;
use crate::task::Task;

/// A set of tasks connected through the data nodes they share.
///
/// There are no explicit edges: task A precedes task B iff one of A's
/// outputs is one of B's inputs.
#[derive(Debug, Clone)]
pub struct Pipeline {
  id: String,
  tasks: Vec<Arc<Task>>,
}

impl Pipeline {
  pub fn new(id: impl Into<String>, tasks: Vec<Arc<Task>>) -> Self {
    Self {
      id: id.into(),
      tasks,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn tasks(&self) -> &[Arc<Task>] {
    &self.tasks
  }

  /// All distinct data nodes referenced by this pipeline's tasks, in first
  /// occurrence order.
  pub fn data_nodes(&self) -> Vec<Arc<DataNode>> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for task in &self.tasks {
      for node in task.inputs().iter().chain(task.outputs()) {
        if seen.insert(node.id().to_string()) {
          nodes.push(node.clone());
        }
      }
    }
    nodes
  }

  /// Order tasks so that every producer precedes its consumers.
  ///
  /// Kahn's algorithm over the data-node edges; ties are broken by
  /// declaration order, so independent tasks come out in the order the
  /// caller listed them.
  pub fn topological_tasks(&self) -> Result<Vec<Arc<Task>>, GraphError> {
    let mut ids = HashSet::new();
    for task in &self.tasks {
      if !ids.insert(task.id().to_string()) {
        return Err(GraphError::DuplicateTask {
          pipeline_id: self.id.clone(),
          task_id: task.id().to_string(),
        });
      }
    }

    // Map each data node to the indexes of the tasks producing it.
    let mut producers: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, task) in self.tasks.iter().enumerate() {
      for output in task.outputs() {
        producers.entry(output.id()).or_default().push(idx);
      }
    }

    let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); self.tasks.len()];
    let mut in_degree: Vec<usize> = vec![0; self.tasks.len()];
    for (idx, task) in self.tasks.iter().enumerate() {
      for input in task.inputs() {
        for &producer in producers.get(input.id()).map(Vec::as_slice).unwrap_or(&[]) {
          downstream[producer].push(idx);
          in_degree[idx] += 1;
        }
      }
    }

    let mut ready: VecDeque<usize> = (0..self.tasks.len())
      .filter(|&idx| in_degree[idx] == 0)
      .collect();
    let mut ordered = Vec::with_capacity(self.tasks.len());

    while let Some(idx) = ready.pop_front() {
      ordered.push(self.tasks[idx].clone());
      for &next in &downstream[idx] {
        in_degree[next] -= 1;
        if in_degree[next] == 0 {
          ready.push_back(next);
        }
      }
    }

    if ordered.len() != self.tasks.len() {
      return Err(GraphError::Cycle {
        pipeline_id: self.id.clone(),
      });
    }
    Ok(ordered)
  }
}
