//! Conveyor Store
//!
//! This crate provides the persistence trait and serializable records for
//! jobs and submissions, plus the in-memory reference implementation. The
//! orchestrator persists every status transition through the [`Store`]
//! trait; database backends are the hosting application's concern and plug
//! in behind the same trait.
//!
//! The status enums live here so that stored records and runtime entities
//! share one vocabulary.

mod memory;
mod types;

pub use memory::InMemoryStore;
pub use types::{JobRecord, JobStatus, SubmissionRecord, SubmissionStatus};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// The backend failed.
  #[error("storage backend error: {0}")]
  Backend(String),
}

/// Storage for job and submission records.
///
/// Calls are synchronous: the orchestrator persists transitions from inside
/// its scheduling paths, and backends that need async IO are expected to
/// queue writes internally.
pub trait Store: Send + Sync {
  /// Insert or update a job record.
  fn save_job(&self, job: &JobRecord) -> Result<(), Error>;

  /// Get a job record by id.
  fn job(&self, job_id: &str) -> Result<JobRecord, Error>;

  /// List the job records belonging to one submission.
  fn jobs_of_submission(&self, submission_id: &str) -> Result<Vec<JobRecord>, Error>;

  /// Insert or update a submission record.
  fn save_submission(&self, submission: &SubmissionRecord) -> Result<(), Error>;

  /// Get a submission record by id.
  fn submission(&self, submission_id: &str) -> Result<SubmissionRecord, Error>;
}
