//! # Scheduling states.
//!
//! [`ViewState`] is the tagged sum of every state a view can be in, each
//! variant carrying its own payload. The state machine matches on it
//! exhaustively; [`ViewState::view`] is the common accessor.
//!
//! ## Rules
//! - A view is in exactly one state at any moment.
//! - `Waiting::dependencies_materializing` is non-empty for as long as the
//!   view remains `Waiting`; the machine transitions out the moment the last
//!   dependency responds, so an empty set is never observable.
//! - `with_errors` is monotone within one materialization attempt: once set
//!   it stays set until the attempt terminates.
//! - `Transforming::retry` / `Retrying::retry` count failed attempts so far.
//! - [`ViewState::label`] is the lower-case kebab wire label used in status
//!   snapshots and listener events.

use std::collections::HashSet;

use crate::views::{Listener, MaterializeMode, View};

/// Scheduling state of one view.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewState {
    /// No metadata known.
    CreatedFromScratch {
        view: View,
    },
    /// Loaded from the schema manager at bootstrap.
    ReadFromSchemaManager {
        view: View,
        /// Stored transformation checksum.
        version: String,
        /// Stored transformation time.
        last_transformed_at: u64,
    },
    /// Explicitly invalidated; requires a re-materialize to leave.
    Invalidated {
        view: View,
    },
    /// Dependencies produced no data / the source is empty.
    NoData {
        view: View,
    },
    /// Waiting for dependency fan-in.
    Waiting {
        view: View,
        listeners: Vec<Listener>,
        /// Dependencies still materializing, by `url_path`.
        dependencies_materializing: HashSet<String>,
        /// At least one dependency reported data.
        one_dependency_returned_data: bool,
        with_errors: bool,
        incomplete: bool,
        /// Newest transformation timestamp reported by a completed
        /// dependency; compared against the stored timestamp at fan-in
        /// completion.
        dependencies_freshest: u64,
        mode: MaterializeMode,
    },
    /// Transformation in flight.
    Transforming {
        view: View,
        listeners: Vec<Listener>,
        /// Failed attempts so far.
        retry: u32,
        with_errors: bool,
        incomplete: bool,
        mode: MaterializeMode,
    },
    /// Backoff armed after a failed attempt.
    Retrying {
        view: View,
        listeners: Vec<Listener>,
        /// Failed attempts so far.
        retry: u32,
        with_errors: bool,
        incomplete: bool,
        mode: MaterializeMode,
    },
    /// Up to date.
    Materialized {
        view: View,
        transformation_ts: u64,
        with_errors: bool,
        incomplete: bool,
    },
    /// Non-recoverable failure.
    Failed {
        view: View,
    },
}

impl ViewState {
    /// Returns the subject view.
    pub fn view(&self) -> &View {
        match self {
            ViewState::CreatedFromScratch { view }
            | ViewState::ReadFromSchemaManager { view, .. }
            | ViewState::Invalidated { view }
            | ViewState::NoData { view }
            | ViewState::Waiting { view, .. }
            | ViewState::Transforming { view, .. }
            | ViewState::Retrying { view, .. }
            | ViewState::Materialized { view, .. }
            | ViewState::Failed { view } => view,
        }
    }

    /// Returns the wire label of the state variant.
    pub fn label(&self) -> &'static str {
        match self {
            ViewState::CreatedFromScratch { .. } => "created",
            ViewState::ReadFromSchemaManager { .. } => "read-from-schema-manager",
            ViewState::Invalidated { .. } => "invalidated",
            ViewState::NoData { .. } => "no-data",
            ViewState::Waiting { .. } => "waiting",
            ViewState::Transforming { .. } => "transforming",
            ViewState::Retrying { .. } => "retrying",
            ViewState::Materialized { .. } => "materialized",
            ViewState::Failed { .. } => "failed",
        }
    }

    /// True while a materialization attempt is in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            ViewState::Waiting { .. } | ViewState::Transforming { .. } | ViewState::Retrying { .. }
        )
    }

    /// Returns the attempt's `with_errors` flag where the state carries one.
    pub fn with_errors(&self) -> Option<bool> {
        match self {
            ViewState::Waiting { with_errors, .. }
            | ViewState::Transforming { with_errors, .. }
            | ViewState::Retrying { with_errors, .. }
            | ViewState::Materialized { with_errors, .. } => Some(*with_errors),
            _ => None,
        }
    }

    /// Returns the attempt's `incomplete` flag where the state carries one.
    pub fn incomplete(&self) -> Option<bool> {
        match self {
            ViewState::Waiting { incomplete, .. }
            | ViewState::Transforming { incomplete, .. }
            | ViewState::Retrying { incomplete, .. }
            | ViewState::Materialized { incomplete, .. } => Some(*incomplete),
            _ => None,
        }
    }

    /// Returns the transformation timestamp where the state carries one.
    pub fn transformation_ts(&self) -> Option<u64> {
        match self {
            ViewState::Materialized {
                transformation_ts, ..
            } => Some(*transformation_ts),
            ViewState::ReadFromSchemaManager {
                last_transformed_at,
                ..
            } => Some(*last_transformed_at),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_kebab_case_wire_names() {
        let view = View::new("db/T/p", "v1");
        let labels = [
            ViewState::CreatedFromScratch { view: view.clone() }.label(),
            ViewState::ReadFromSchemaManager {
                view: view.clone(),
                version: "v1".into(),
                last_transformed_at: 10,
            }
            .label(),
            ViewState::Invalidated { view: view.clone() }.label(),
            ViewState::NoData { view: view.clone() }.label(),
            ViewState::Materialized {
                view: view.clone(),
                transformation_ts: 10,
                with_errors: false,
                incomplete: false,
            }
            .label(),
            ViewState::Failed { view }.label(),
        ];
        assert_eq!(
            labels,
            [
                "created",
                "read-from-schema-manager",
                "invalidated",
                "no-data",
                "materialized",
                "failed",
            ]
        );
    }

    #[test]
    fn in_flight_covers_waiting_transforming_retrying() {
        let view = View::new("db/T/p", "v1");
        let waiting = ViewState::Waiting {
            view: view.clone(),
            listeners: Vec::new(),
            dependencies_materializing: HashSet::from(["db/A/p".to_string()]),
            one_dependency_returned_data: false,
            with_errors: false,
            incomplete: false,
            dependencies_freshest: 0,
            mode: MaterializeMode::Default,
        };
        assert!(waiting.is_in_flight());
        assert!(!ViewState::Failed { view }.is_in_flight());
    }
}
