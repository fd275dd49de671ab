/// Errors raised by registry lookups.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
  /// No function was registered under the requested key.
  #[error("function '{key}' not found in registry")]
  NotFound { key: String },
}
