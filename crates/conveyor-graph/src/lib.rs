//! Conveyor Graph
//!
//! This crate provides the entities a caller wires together before handing
//! them to the orchestrator:
//!
//! - [`DataNode`] — a named handle to external data carrying freshness
//!   metadata (last write time, edit lock, optional validity window). The
//!   orchestrator only ever touches this metadata, never the payload.
//! - [`Task`] — an immutable description of a function (referenced by
//!   registry key) plus its ordered input and output data nodes.
//! - [`Pipeline`] — a set of tasks connected through shared data nodes,
//!   with topological ordering for submission.

mod data_node;
mod error;
mod pipeline;
mod task;

pub use data_node::DataNode;
pub use error::GraphError;
pub use pipeline::Pipeline;
pub use task::Task;
