//! Conveyor Config
//!
//! Serializable configuration types consumed by the host layer: the
//! dispatcher selection read once at scheduler construction, and the
//! pipeline definition format the CLI loads from JSON. The orchestrator
//! itself never re-reads configuration mid-run — these types are resolved
//! into graph entities before anything is submitted.

mod error;
mod orchestrator;
mod pipeline;

pub use error::ConfigError;
pub use orchestrator::{DispatcherKind, OrchestratorConfig};
pub use pipeline::{DataNodeDef, PipelineDef, TaskDef};
