//! In-memory store, the reference implementation used by tests and
//! single-process deployments.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{JobRecord, SubmissionRecord};
use crate::{Error, Store};

/// A `Store` backed by process-local hash maps.
#[derive(Default)]
pub struct InMemoryStore {
  jobs: RwLock<HashMap<String, JobRecord>>,
  submissions: RwLock<HashMap<String, SubmissionRecord>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Store for InMemoryStore {
  fn save_job(&self, job: &JobRecord) -> Result<(), Error> {
    self
      .jobs
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .insert(job.job_id.clone(), job.clone());
    Ok(())
  }

  fn job(&self, job_id: &str) -> Result<JobRecord, Error> {
    self
      .jobs
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .get(job_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("job '{job_id}'")))
  }

  fn jobs_of_submission(&self, submission_id: &str) -> Result<Vec<JobRecord>, Error> {
    let submission = self.submission(submission_id)?;
    let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
    Ok(
      submission
        .job_ids
        .iter()
        .filter_map(|id| jobs.get(id).cloned())
        .collect(),
    )
  }

  fn save_submission(&self, submission: &SubmissionRecord) -> Result<(), Error> {
    self
      .submissions
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .insert(submission.submission_id.clone(), submission.clone());
    Ok(())
  }

  fn submission(&self, submission_id: &str) -> Result<SubmissionRecord, Error> {
    self
      .submissions
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .get(submission_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("submission '{submission_id}'")))
  }
}
