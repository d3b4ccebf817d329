//! # Listeners and terminal outcomes.
//!
//! A [`Listener`] is a party registered to be notified on a view's next
//! terminal event. It is either another view (by identity — the upstream view
//! that requested the materialization) or an opaque external subscriber
//! handle ([`ClientRef`]).
//!
//! ## Rules
//! - Listeners are enqueued while a view is in flight and consumed (cleared
//!   from state) by the state machine on the terminal transition.
//! - Each listener receives exactly one [`ViewOutcome`] per request.
//! - [`ClientRef`] equality is by handle id. The scheduler facade mints a
//!   fresh handle per request, so identical handles in a listener queue mean
//!   the same pending request and are collapsed.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tokio::sync::mpsc;

/// Global allocator for client handle ids.
static CLIENT_ID: AtomicU64 = AtomicU64::new(0);

/// Terminal outcome of a materialize or invalidate request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewOutcome {
    /// The view is up to date.
    Materialized {
        /// The reporting view.
        view: String,
        /// Transformation time the view is current as of.
        transformation_ts: u64,
        /// At least one dependency reported a failure, but enough data
        /// existed to proceed.
        with_errors: bool,
        /// At least one dependency returned no data.
        incomplete: bool,
    },
    /// Dependencies produced no data / the source is empty.
    NoData { view: String },
    /// Non-recoverable failure.
    Failed { view: String },
    /// The invalidate request was applied.
    Invalidated { view: String },
    /// The invalidate request was rejected (view was in flight).
    NotInvalidated { view: String },
}

impl ViewOutcome {
    /// Returns the reporting view's identity.
    pub fn view(&self) -> &str {
        match self {
            ViewOutcome::Materialized { view, .. }
            | ViewOutcome::NoData { view }
            | ViewOutcome::Failed { view }
            | ViewOutcome::Invalidated { view }
            | ViewOutcome::NotInvalidated { view } => view,
        }
    }
}

/// Opaque external subscriber handle.
///
/// Created in pairs by [`ClientRef::channel`]: the handle travels through
/// scheduler state as a listener, the receiver stays with the caller and
/// yields one [`ViewOutcome`] per request made with this handle.
#[derive(Clone, Debug)]
pub struct ClientRef {
    id: u64,
    tx: mpsc::UnboundedSender<ViewOutcome>,
}

impl ClientRef {
    /// Creates a handle/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ViewOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: CLIENT_ID.fetch_add(1, AtomicOrdering::Relaxed),
            tx,
        };
        (handle, rx)
    }

    /// Returns the unique handle id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Delivers an outcome to the subscriber.
    ///
    /// A gone receiver is not an error: the caller stopped caring.
    pub fn deliver(&self, outcome: ViewOutcome) {
        let _ = self.tx.send(outcome);
    }
}

impl PartialEq for ClientRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClientRef {}

/// A party registered for a view's next terminal event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Listener {
    /// Another view, by identity.
    View(String),
    /// An external subscriber handle.
    Client(ClientRef),
}
