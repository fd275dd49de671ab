//! The skip policy: a pure freshness check deciding run-vs-skip.
//!
//! Consulted once per job at drain time, never for forced jobs. The policy
//! is conservative: it never skips a task whose inputs could have changed
//! after the outputs were produced, and it never re-runs a task whose
//! declared freshness window still holds.

use conveyor_graph::Task;

/// Decide whether `task` must execute.
///
/// 1. Zero outputs: run — there is nothing to cache.
/// 2. Not skippable: run.
/// 3. Any output not ready for reading or past its validity window: run.
/// 4. Zero inputs: skip — a stable output cannot be invalidated.
/// 5. Run iff the newest input write is strictly newer than the oldest
///    output write.
pub fn needs_to_run(task: &Task) -> bool {
  if task.outputs().is_empty() {
    return true;
  }
  if !task.is_skippable() {
    return true;
  }
  if task.outputs().iter().any(|node| !node.is_up_to_date()) {
    return true;
  }
  if task.inputs().is_empty() {
    return false;
  }

  let newest_input = task.inputs().iter().filter_map(|node| node.last_edit()).max();
  let oldest_output = task
    .outputs()
    .iter()
    .filter_map(|node| node.last_edit())
    .min();
  match (newest_input, oldest_output) {
    (Some(input), Some(output)) => input > output,
    // Inputs that were never written cannot have changed after the outputs.
    (None, _) => false,
    // Unreachable: every output passed the freshness check above.
    (_, None) => true,
  }
}
