//! # LogWriter — simple event printer.
//!
//! A minimal subscriber that prints incoming [`SchedulerEvent`]s to stdout.
//! Use it for tests or demos; enabled via the `logging` feature.
//!
//! ## Example output
//! ```text
//! [waiting] view=db/Report/2024 prev=created
//! [actions] view=db/Report/2024 actions=["materialize", "materialize"]
//! [materialized] view=db/Report/2024 ts=Some(1700000000000)
//! [router-dropped] view=Some("db/Gone/p") err=Some("unknown view")
//! ```

use async_trait::async_trait;

use crate::events::{EventKind, SchedulerEvent};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &SchedulerEvent) {
        match e.kind {
            EventKind::StateChanged => {
                if let Some(status) = &e.status {
                    println!(
                        "[{}] view={} prev={:?} ts={:?}",
                        status.label, status.view_path, e.previous, status.transformation_timestamp,
                    );
                }
            }
            EventKind::ActionsScheduled => {
                println!("[actions] view={:?} actions={:?}", e.view, e.actions);
            }
            EventKind::RouterDropped => {
                println!("[router-dropped] view={:?} err={:?}", e.view, e.error);
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] err={:?}", e.error);
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panicked] sub={:?} err={:?}", e.view, e.error);
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
