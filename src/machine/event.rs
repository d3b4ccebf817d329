//! # Events accepted by the state machine.
//!
//! [`ViewEvent`] covers every message kind a view supervisor can feed into
//! the machine, grouped by originator:
//! - users/clients: `Materialize`, `Invalidate`
//! - dependencies: `ViewMaterialized`, `ViewHasNoData`, `ViewFailed`
//! - the transformation executor: `TransformationSucceeded`,
//!   `TransformationFailed`
//! - the retry timer: `Retry`
//! - the metadata store (external views): `MetadataForMaterialize`,
//!   `MetadataFetchFailed`

use crate::views::{Listener, MaterializeMode};

/// One event targeting a view.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    /// Ensure the view is up to date; `requester` joins the listeners.
    Materialize {
        mode: MaterializeMode,
        requester: Listener,
    },
    /// Mark the view invalidated; acknowledged or rejected to `requester`.
    Invalidate { requester: Listener },
    /// A dependency finished with data.
    ViewMaterialized {
        dependency: String,
        transformation_ts: u64,
        with_errors: bool,
        incomplete: bool,
    },
    /// A dependency finished without data.
    ViewHasNoData { dependency: String },
    /// A dependency failed terminally.
    ViewFailed { dependency: String },
    /// The executor finished the in-flight transformation.
    TransformationSucceeded { has_data: bool },
    /// The executor failed the in-flight transformation (adapters convert
    /// every executor error into this).
    TransformationFailed,
    /// The armed backoff timer fired.
    Retry,
    /// The metadata store answered an external view's materialize request.
    MetadataForMaterialize {
        version: Option<String>,
        timestamp: u64,
        mode: MaterializeMode,
        requester: Listener,
    },
    /// The metadata fetch for an external view's materialize timed out or
    /// failed; synthesized by the gateway adapter.
    MetadataFetchFailed { requester: Listener },
}

impl ViewEvent {
    /// Returns a short stable label for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ViewEvent::Materialize { .. } => "materialize",
            ViewEvent::Invalidate { .. } => "invalidate",
            ViewEvent::ViewMaterialized { .. } => "view-materialized",
            ViewEvent::ViewHasNoData { .. } => "view-has-no-data",
            ViewEvent::ViewFailed { .. } => "view-failed",
            ViewEvent::TransformationSucceeded { .. } => "transformation-succeeded",
            ViewEvent::TransformationFailed => "transformation-failed",
            ViewEvent::Retry => "retry",
            ViewEvent::MetadataForMaterialize { .. } => "metadata-for-materialize",
            ViewEvent::MetadataFetchFailed { .. } => "metadata-fetch-failed",
        }
    }
}
