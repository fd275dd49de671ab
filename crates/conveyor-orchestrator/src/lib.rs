//! Conveyor Orchestrator
//!
//! The job orchestration and dispatch engine: it turns a submitted pipeline
//! into one job per task, decides skip-vs-run per job through the freshness
//! policy, dispatches runnable jobs onto a synchronous executor or a bounded
//! worker pool, blocks jobs whose inputs are not ready, cascades
//! cancellation to dependent jobs, and aggregates job outcomes into one
//! submission status.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Scheduler                            │
//! │  - run queue + blocked set under one mutex                  │
//! │  - submit / submit_task / cancel                            │
//! │  - drain loop: skip decision, admission, dispatch hand-off  │
//! │  - unblock scan on terminal non-failure transitions         │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                           │
//! │  - SynchronousDispatcher: calling thread, capacity 1        │
//! │  - PooledDispatcher: tokio workers, admission < W,          │
//! │    per-job cancellation handles                             │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Job / Submission                        │
//! │  - job state machine with listeners and watch-based waits   │
//! │  - submission aggregate recomputed on every job transition  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failures never propagate to the submitter as errors: a failed task body
//! is visible only through the job's `Failed` status and captured detail,
//! and its dependents stay blocked until an operator cancels them.

mod dispatcher;
mod error;
mod events;
mod job;
mod scheduler;
mod skip;
mod submission;

pub use conveyor_config::{DispatcherKind, OrchestratorConfig};
pub use error::OrchestrationError;
pub use events::{ChannelNotifier, Event, Notifier, NoopNotifier};
pub use job::{Job, JobListener, JobStatus};
pub use scheduler::Scheduler;
pub use skip::needs_to_run;
pub use submission::{Submission, SubmissionStatus};
