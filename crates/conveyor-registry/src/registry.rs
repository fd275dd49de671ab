//! Function registration and lookup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::RegistryError;

/// A failure raised by a task body.
///
/// The orchestrator captures this as the job's failure detail; it never
/// propagates to the submitter as an error.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct FunctionError {
  message: String,
}

impl FunctionError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

impl From<String> for FunctionError {
  fn from(message: String) -> Self {
    Self { message }
  }
}

impl From<&str> for FunctionError {
  fn from(message: &str) -> Self {
    Self {
      message: message.to_string(),
    }
  }
}

/// An executable task body.
///
/// Implemented automatically for any `Fn() -> Result<(), FunctionError>`
/// closure; implement it by hand when the body needs owned state.
pub trait TaskFunction: Send + Sync {
  fn call(&self) -> Result<(), FunctionError>;
}

impl<F> TaskFunction for F
where
  F: Fn() -> Result<(), FunctionError> + Send + Sync,
{
  fn call(&self) -> Result<(), FunctionError> {
    self()
  }
}

/// Maps function keys to executable task bodies.
#[derive(Default)]
pub struct FunctionRegistry {
  functions: RwLock<HashMap<String, Arc<dyn TaskFunction>>>,
}

impl FunctionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `function` under `key`, replacing any previous registration.
  pub fn register(&self, key: impl Into<String>, function: Arc<dyn TaskFunction>) {
    self
      .functions
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .insert(key.into(), function);
  }

  /// Look up the function registered under `key`.
  pub fn get(&self, key: &str) -> Result<Arc<dyn TaskFunction>, RegistryError> {
    self
      .functions
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .get(key)
      .cloned()
      .ok_or_else(|| RegistryError::NotFound {
        key: key.to_string(),
      })
  }

  /// Whether a function is registered under `key`.
  pub fn contains(&self, key: &str) -> bool {
    self
      .functions
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .contains_key(key)
  }
}
