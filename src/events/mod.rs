//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by view supervisors, the
//! router, and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`SchedulerEvent`] — event classification and payload
//! - [`ViewStatus`] — JSON-compatible state snapshot (the wire format)
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ViewSupervisor` (state changes, scheduling actions),
//!   `Router` (drops), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the scheduler's fan-out listener (per-subscriber queues),
//!   plus any receiver obtained from [`Scheduler::subscribe`](crate::Scheduler::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{EventKind, SchedulerEvent, ViewStatus};
