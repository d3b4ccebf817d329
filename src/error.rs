//! # Error types of the scheduler runtime.
//!
//! [`SchedulerError`] covers failures of the orchestration surface itself.
//! Collaborator failures (executor, metadata store) never appear here: the
//! gateway adapters convert them into typed inbox messages and the state
//! machine decides between retry, propagation, and terminal failure (see
//! [`gateways`](crate::gateways)).

use thiserror::Error;

/// Errors produced by the scheduler runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The request names a `url_path` the catalog does not know.
    #[error("view '{path}' is not in the catalog")]
    UnknownView {
        /// The unknown identity.
        path: String,
    },
    /// The scheduler is shutting down and no longer accepts requests.
    #[error("scheduler is shut down")]
    Shutdown,
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::UnknownView { .. } => "scheduler_unknown_view",
            SchedulerError::Shutdown => "scheduler_shutdown",
        }
    }
}
