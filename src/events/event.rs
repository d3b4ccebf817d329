//! # Runtime events emitted by view supervisors.
//!
//! The [`EventKind`] enum classifies event types:
//! - **State changes**: a view's state variant changed (payload-only changes
//!   are not reported, which keeps churn off the bus).
//! - **Scheduling actions**: a transition produced actions for the
//!   supervisor to perform.
//! - **Internal events**: subscriber overflow/panic and router drops.
//!
//! The [`SchedulerEvent`] struct carries the view identity, the previous and
//! current state labels, a JSON-compatible [`ViewStatus`] snapshot, and the
//! action labels of the transition.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, so subscribers can order events delivered through async
//! channels.
//!
//! ## Rules
//! - External views emit no events.
//! - Scheduling-action events are emitted only for transitions that produced
//!   at least one action.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::views::ViewState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A view's state variant changed.
    StateChanged,
    /// A transition produced scheduling actions.
    ActionsScheduled,
    /// An envelope could not be routed and was dropped.
    RouterDropped,
    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
    /// Subscriber panicked during event processing.
    SubscriberPanicked,
}

/// JSON-compatible snapshot of one view's state.
///
/// This is the wire format of state snapshots and listener events:
/// `{ "label": "materialized", "viewPath": "db/T/p", ... }` with the
/// optional flags present only where the state carries them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStatus {
    /// State variant name in lower-case kebab form.
    pub label: String,
    /// Stable view identity.
    pub view_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_errors: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation_timestamp: Option<u64>,
}

impl ViewStatus {
    /// Snapshots a scheduling state.
    pub fn of(state: &ViewState) -> Self {
        Self {
            label: state.label().to_string(),
            view_path: state.view().url_path().to_string(),
            with_errors: state.with_errors(),
            incomplete: state.incomplete(),
            transformation_timestamp: state.transformation_ts(),
        }
    }

    /// Renders the snapshot in its JSON wire form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct SchedulerEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Subject view, if applicable.
    pub view: Option<String>,
    /// Previous state label for `StateChanged`/`ActionsScheduled`.
    pub previous: Option<&'static str>,
    /// Current state snapshot, if applicable.
    pub status: Option<ViewStatus>,
    /// Action labels of the transition, for `ActionsScheduled`.
    pub actions: Vec<&'static str>,
    /// Error message, if the event represents a fault.
    pub error: Option<String>,
}

impl SchedulerEvent {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            view: None,
            previous: None,
            status: None,
            actions: Vec::new(),
            error: None,
        }
    }

    /// Attaches the subject view.
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Attaches the previous state label.
    pub fn with_previous(mut self, label: &'static str) -> Self {
        self.previous = Some(label);
        self
    }

    /// Attaches the current state snapshot.
    pub fn with_status(mut self, status: ViewStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the transition's action labels.
    pub fn with_actions(mut self, actions: Vec<&'static str>) -> Self {
        self.actions = actions;
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Creates a subscriber overflow event.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        SchedulerEvent::now(EventKind::SubscriberOverflow)
            .with_error(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        SchedulerEvent::now(EventKind::SubscriberPanicked)
            .with_view(subscriber)
            .with_error(info)
    }

    /// True for overflow diagnostics (kept out of overflow accounting).
    pub fn is_subscriber_overflow(&self) -> bool {
        self.kind == EventKind::SubscriberOverflow
    }

    /// True for panic diagnostics (kept out of overflow accounting).
    pub fn is_subscriber_panic(&self) -> bool {
        self.kind == EventKind::SubscriberPanicked
    }
}
