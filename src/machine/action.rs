//! # Scheduling actions emitted by the state machine.
//!
//! The machine never performs I/O; it emits [`Action`]s and the supervisor
//! interprets them: routing to peers, submitting to the executor, persisting
//! metadata, notifying listeners.
//!
//! ## Rules
//! - Actions of one transition form a set: no inter-action ordering may be
//!   assumed, except that listener notifications logically follow the state
//!   update.
//! - `Report*` actions carry the listeners they consume; the machine clears
//!   them from state itself.

use crate::views::{Listener, MaterializeMode};

/// One action for the supervisor to perform after a transition.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Ask a dependency view to materialize.
    Materialize {
        target: String,
        mode: MaterializeMode,
    },
    /// Submit this view's transformation to the executor.
    Transform,
    /// Persist a new transformation time.
    WriteTransformationTimestamp { timestamp: u64 },
    /// Persist the current transformation code checksum.
    WriteTransformationChecksum,
    /// Create the `_SUCCESS` marker in the view's output directory.
    TouchSuccessFlag,
    /// Ask the metadata gateway for an external view's version/timestamp;
    /// the answer re-enters as `MetadataForMaterialize`.
    FetchMetadata {
        mode: MaterializeMode,
        requester: Listener,
    },
    /// Notify listeners of success.
    ReportMaterialized {
        listeners: Vec<Listener>,
        transformation_ts: u64,
        with_errors: bool,
        incomplete: bool,
    },
    /// Notify listeners of an empty result.
    ReportNoDataAvailable { listeners: Vec<Listener> },
    /// Notify listeners of terminal failure.
    ReportFailed { listeners: Vec<Listener> },
    /// Acknowledge an invalidate.
    ReportInvalidated { listeners: Vec<Listener> },
    /// Reject an invalidate (illegal while in flight).
    ReportNotInvalidated { listeners: Vec<Listener> },
}

impl Action {
    /// Returns a short stable label for scheduling-action events.
    pub fn as_label(&self) -> &'static str {
        match self {
            Action::Materialize { .. } => "materialize",
            Action::Transform => "transform",
            Action::WriteTransformationTimestamp { .. } => "write-transformation-timestamp",
            Action::WriteTransformationChecksum => "write-transformation-checksum",
            Action::TouchSuccessFlag => "touch-success-flag",
            Action::FetchMetadata { .. } => "fetch-metadata",
            Action::ReportMaterialized { .. } => "report-materialized",
            Action::ReportNoDataAvailable { .. } => "report-no-data-available",
            Action::ReportFailed { .. } => "report-failed",
            Action::ReportInvalidated { .. } => "report-invalidated",
            Action::ReportNotInvalidated { .. } => "report-not-invalidated",
        }
    }
}
