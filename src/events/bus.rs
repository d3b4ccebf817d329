//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that lets view
//! supervisors and the scheduler exchange [`SchedulerEvent`]s.
//!
//! - [`Bus::publish`] sends an event to all subscribers (non-blocking).
//! - [`Bus::subscribe`] creates a new receiver for consuming events.
//!
//! The [`Scheduler`](crate::Scheduler) drains one subscription into the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet) fan-out; additional
//! subscriptions are available to embedders through
//! [`Scheduler::subscribe`](crate::Scheduler::subscribe).

use tokio::sync::broadcast;

use crate::events::SchedulerEvent;

/// Broadcast channel for runtime events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Errors are ignored if there are no active subscribers.
    pub fn publish(&self, ev: SchedulerEvent) {
        let _ = self.tx.send(ev);
    }

    /// Subscribes to the bus and returns a new receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }
}
