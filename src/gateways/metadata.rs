//! # Metadata store seam.
//!
//! The schema registry and version/checksum/timestamp persistence live
//! outside this crate, behind [`MetadataStore`]. The scheduler reads from it
//! at bootstrap and on external-view materializations, and writes to it
//! fire-and-forget after successful transformations.

use async_trait::async_trait;
use thiserror::Error;

use crate::views::View;

/// Stored version/timestamp pair for one view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewMetadata {
    /// Persisted transformation checksum, if the view was ever transformed.
    pub version: Option<String>,
    /// Persisted transformation time, epoch millis (0 = never / no data).
    pub last_transformed_at: u64,
}

/// Result of the bootstrap version check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckVersionResult {
    /// Stored checksum matches the current transformation code.
    VersionOk,
    /// Stored checksum differs; the view will re-transform on its next
    /// default-mode materialization.
    VersionMismatch { stored: String, current: String },
    /// The check itself failed.
    Error,
}

/// Errors produced by the metadata store.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The store could not be reached.
    #[error("metadata store unavailable: {reason}")]
    Unavailable { reason: String },
    /// The store has no record of the view.
    #[error("view '{view}' unknown to the metadata store")]
    UnknownView { view: String },
}

impl MetadataError {
    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            MetadataError::Unavailable { .. } => "metadata_unavailable",
            MetadataError::UnknownView { .. } => "metadata_unknown_view",
        }
    }
}

/// Asynchronous access to the schema registry and scheduling metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Reads the stored version/timestamp pair for a view.
    ///
    /// Serves both supervisor bootstrap and external-view materializations.
    async fn get_metadata_for_materialize(&self, view: &View)
        -> Result<ViewMetadata, MetadataError>;

    /// Persists a new transformation time.
    async fn log_transformation_timestamp(
        &self,
        view: &View,
        timestamp: u64,
    ) -> Result<(), MetadataError>;

    /// Persists the view's current transformation checksum.
    async fn set_view_version(&self, view: &View) -> Result<(), MetadataError>;

    /// Registers the view's partition at bootstrap.
    async fn add_partition(&self, view: &View) -> Result<(), MetadataError>;

    /// Compares the stored checksum against the current transformation code
    /// at bootstrap.
    async fn check_version(&self, view: &View) -> CheckVersionResult;
}
