//! # Transformation executor seam.
//!
//! The scheduler never runs transformations itself; it submits them through
//! [`TransformationExecutor`] (Hive/MapReduce/shell/filesystem drivers live
//! behind this trait, outside this crate).
//!
//! ## Rules
//! - `submit` runs one transformation to completion; there is no
//!   user-initiated cancellation of an in-flight run.
//! - Errors never cross the inbox boundary: the internal adapter converts
//!   every `submit` error into a `TransformationFailed` message.

use async_trait::async_trait;

use thiserror::Error;

use crate::views::View;

/// Errors produced by the transformation executor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The transformation ran and failed.
    #[error("transformation failed: {reason}")]
    TransformationFailure {
        /// Driver-reported failure reason.
        reason: String,
    },
    /// The driver could not be reached or refused the submission.
    #[error("executor unavailable: {reason}")]
    Unavailable { reason: String },
    /// A filesystem operation (touch/probe) failed.
    #[error("filesystem operation failed: {reason}")]
    Filesystem { reason: String },
}

impl ExecutorError {
    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::TransformationFailure { .. } => "executor_transformation_failure",
            ExecutorError::Unavailable { .. } => "executor_unavailable",
            ExecutorError::Filesystem { .. } => "executor_filesystem",
        }
    }
}

/// Asynchronous driver for view transformations and output-directory markers.
#[async_trait]
pub trait TransformationExecutor: Send + Sync + 'static {
    /// Runs the view's transformation to completion.
    ///
    /// `Ok(true)` means the transformation produced data, `Ok(false)` means
    /// it ran but the result is empty.
    async fn submit(&self, view: &View) -> Result<bool, ExecutorError>;

    /// Creates the zero-byte `_SUCCESS` marker under `path`.
    async fn touch(&self, path: &str) -> Result<(), ExecutorError>;

    /// Whether the `_SUCCESS` marker exists under `path`.
    ///
    /// Used as a cheap readiness probe for views with neither dependencies
    /// nor transformation logic.
    async fn success_flag_exists(&self, path: &str) -> Result<bool, ExecutorError>;
}
