//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] — the extension point for plugging custom event
//! handlers into the scheduler.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Bounded queue** (configurable capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics caught, reported as `SubscriberPanicked`)
//!
//! ## Rules
//! - Slow subscribers only affect themselves (queue overflow → event drop)
//! - Panics do not crash the scheduler or other subscribers
//! - Subscribers do not block publishers or each other
//! - Delivery is per-subscriber FIFO; there is no cross-subscriber ordering
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use viewvisor::{SchedulerEvent, EventKind, Subscribe};
//!
//! struct Metrics;
//!
//! #[async_trait]
//! impl Subscribe for Metrics {
//!     async fn on_event(&self, ev: &SchedulerEvent) {
//!         if ev.kind == EventKind::StateChanged {
//!             // export the transition
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "metrics"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::SchedulerEvent;

/// Event subscriber for scheduler observability.
///
/// Receives events from the bus via a dedicated worker task with a bounded
/// queue. Handle errors internally; a panicking subscriber is isolated and
/// reported, not propagated.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from the subscriber's worker task, events arrive in FIFO order.
    async fn on_event(&self, event: &SchedulerEvent);

    /// Returns the subscriber name for overflow/panic diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// When the queue is full, new events are dropped for this subscriber
    /// only and a `SubscriberOverflow` event is published.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
