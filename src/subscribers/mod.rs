//! # Event subscribers for the scheduler.
//!
//! This module provides the [`Subscribe`] trait — the injected observer
//! surface of the listener bus — and the [`SubscriberSet`] fan-out that
//! delivers every bus event to every registered subscriber.
//!
//! ## Architecture
//! ```text
//! ViewSupervisor ── publish(SchedulerEvent) ──► Bus ──► fan-out listener
//!                                                         │
//!                                                   SubscriberSet
//!                                                    ┌────┴─────┬────────┐
//!                                                    ▼          ▼        ▼
//!                                                LogWriter   Metrics   Custom
//! ```
//!
//! ## Rules
//! - Delivery is best-effort: a saturated subscriber drops events (reported
//!   as `SubscriberOverflow`) without affecting the scheduler or its peers.
//! - Ordered per subscriber, unordered across subscribers.

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
