//! Conveyor Registry
//!
//! Tasks reference their executable by a registry key rather than carrying a
//! closure: only data crosses the dispatch boundary, behavior is resolved
//! through the [`FunctionRegistry`] at dispatch time. The hosting
//! application registers every function before submitting pipelines that
//! use it.

mod error;
mod registry;

pub use error::RegistryError;
pub use registry::{FunctionError, FunctionRegistry, TaskFunction};
