//! # Global scheduler configuration.
//!
//! [`Config`] defines the core's behavior: the retry cap, the backoff
//! ceiling, the metadata fetch timeout, dispatcher parallelism, and the event
//! bus capacity.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use viewvisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.max_retries = 3;
//! cfg.backoff_cap = Duration::from_secs(30);
//!
//! assert_eq!(cfg.max_retries, 3);
//! ```

use std::time::Duration;

/// Global configuration for the scheduler core.
#[derive(Clone, Debug)]
pub struct Config {
    /// Failed transformation attempts allowed per view before `Failed`.
    pub max_retries: u32,
    /// Upper bound on the `2^retry`-seconds backoff delay.
    pub backoff_cap: Duration,
    /// Cap on external-view metadata fetches; on expiry the materialization
    /// is reported failed to the requester.
    pub metadata_fetch_timeout: Duration,
    /// Maximum number of supervisor inboxes drained concurrently
    /// (0 = unlimited).
    pub dispatcher_parallelism: usize,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `max_retries = 5`
    /// - `backoff_cap = 60s`
    /// - `metadata_fetch_timeout = 30s`
    /// - `dispatcher_parallelism = 0` (unlimited)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_cap: Duration::from_secs(60),
            metadata_fetch_timeout: Duration::from_secs(30),
            dispatcher_parallelism: 0,
            bus_capacity: 1024,
        }
    }
}
