//! # Materialization modes.
//!
//! [`MaterializeMode`] tunes how far a materialization request goes: whether
//! dependencies are materialized first, whether the transformation actually
//! runs, and whether stored checksums/timestamps are rewritten on the skip
//! path. The mode is threaded through `Waiting`/`Transforming`/`Retrying`
//! so one materialization attempt stays self-consistent.

use serde::{Deserialize, Serialize};

/// How a materialization request is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterializeMode {
    /// Full protocol: materialize dependencies, transform when stale or the
    /// transformation code changed.
    Default,
    /// A checksum mismatch alone does not force a transformation; the stored
    /// checksum is realigned when the transformation is skipped.
    ResetTransformationChecksums,
    /// Never transforms on freshness grounds: rewrites both the stored
    /// checksum and the transformation timestamp instead.
    ResetTransformationChecksumsAndTimestamps,
    /// Runs the transformation without materializing dependencies first.
    TransformOnly,
    /// Neither fan-out nor transformation: stamps the view as materialized
    /// now and rewrites checksum and timestamp.
    SetOnly,
}

impl Default for MaterializeMode {
    /// Returns [`MaterializeMode::Default`].
    fn default() -> Self {
        MaterializeMode::Default
    }
}

impl MaterializeMode {
    /// Returns a short stable label for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            MaterializeMode::Default => "default",
            MaterializeMode::ResetTransformationChecksums => "reset-transformation-checksums",
            MaterializeMode::ResetTransformationChecksumsAndTimestamps => {
                "reset-transformation-checksums-and-timestamps"
            }
            MaterializeMode::TransformOnly => "transform-only",
            MaterializeMode::SetOnly => "set-only",
        }
    }
}
