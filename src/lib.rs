//! # viewvisor
//!
//! **Viewvisor** is a lightweight view materialization scheduler.
//!
//! It coordinates the materialization of derived, partitioned datasets over a
//! dependency graph: for every view it decides — in response to client or
//! upstream events — whether the view is already up to date, must wait for
//! its dependencies, must run its transformation, must retry with backoff, or
//! must be invalidated. Transformation drivers and the metadata store stay
//! outside, behind traits.
//!
//! ## Features
//!
//! | Area               | Description                                                            | Key types / traits                            |
//! |--------------------|------------------------------------------------------------------------|-----------------------------------------------|
//! | **Scheduling**     | Pure, table-testable per-view state machine.                           | [`StateMachine`], [`ViewState`], [`Action`]   |
//! | **Supervision**    | One actor task per view, FIFO inbox, retries with capped backoff.      | [`Scheduler`], [`BackoffPolicy`]              |
//! | **View graph**     | View identity, dependencies, materialization modes.                    | [`View`], [`Catalog`], [`MaterializeMode`]    |
//! | **Observability**  | Broadcast bus with per-subscriber fan-out and JSON status snapshots.   | [`Subscribe`], [`SchedulerEvent`], [`ViewStatus`] |
//! | **Collaborators**  | Async seams for the executor and the metadata store.                   | [`TransformationExecutor`], [`MetadataStore`] |
//! | **Errors**         | Typed errors; collaborator failures become typed inbox messages.       | [`SchedulerError`], [`ExecutorError`], [`MetadataError`] |
//! | **Configuration**  | Centralized runtime settings.                                          | [`Config`]                                    |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber
//!   _(demo/reference only)_.
//!
//! ```no_run
//! use std::sync::Arc;
//! use viewvisor::{Catalog, Config, Scheduler, View};
//! # use async_trait::async_trait;
//! # struct NoExecutor;
//! # #[async_trait]
//! # impl viewvisor::TransformationExecutor for NoExecutor {
//! #     async fn submit(&self, _: &View) -> Result<bool, viewvisor::ExecutorError> { Ok(true) }
//! #     async fn touch(&self, _: &str) -> Result<(), viewvisor::ExecutorError> { Ok(()) }
//! #     async fn success_flag_exists(&self, _: &str) -> Result<bool, viewvisor::ExecutorError> { Ok(false) }
//! # }
//! # struct NoMetadata;
//! # #[async_trait]
//! # impl viewvisor::MetadataStore for NoMetadata {
//! #     async fn get_metadata_for_materialize(&self, _: &View) -> Result<viewvisor::ViewMetadata, viewvisor::MetadataError> { Ok(Default::default()) }
//! #     async fn log_transformation_timestamp(&self, _: &View, _: u64) -> Result<(), viewvisor::MetadataError> { Ok(()) }
//! #     async fn set_view_version(&self, _: &View) -> Result<(), viewvisor::MetadataError> { Ok(()) }
//! #     async fn add_partition(&self, _: &View) -> Result<(), viewvisor::MetadataError> { Ok(()) }
//! #     async fn check_version(&self, _: &View) -> viewvisor::CheckVersionResult { viewvisor::CheckVersionResult::VersionOk }
//! # }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Catalog::new([
//!         View::new("db/Clicks/2024", "v1"),
//!         View::new("db/Report/2024", "v3")
//!             .with_dependencies(vec!["db/Clicks/2024".into()]),
//!     ]);
//!
//!     let scheduler = Scheduler::new(
//!         Config::default(),
//!         catalog,
//!         Arc::new(NoExecutor),
//!         Arc::new(NoMetadata),
//!         Vec::new(),
//!     );
//!
//!     let mut outcome = scheduler.materialize("db/Report/2024")?;
//!     if let Some(result) = outcome.recv().await {
//!         println!("report: {result:?}");
//!     }
//!     scheduler.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod config;
mod core;
mod error;
mod events;
mod gateways;
mod machine;
mod subscribers;
mod views;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{BackoffPolicy, CommandForView, OutcomeReceiver, Scheduler, ViewCommand};
pub use error::SchedulerError;
pub use events::{Bus, EventKind, SchedulerEvent, ViewStatus};
pub use gateways::{
    CheckVersionResult, ExecutorError, MetadataError, MetadataStore, TransformationExecutor,
    ViewMetadata,
};
pub use machine::{Action, StateMachine, StepContext, StoredMetadata, Transition, ViewEvent};
pub use subscribers::{Subscribe, SubscriberSet};
pub use views::{Catalog, ClientRef, Listener, MaterializeMode, View, ViewOutcome, ViewState};

// Optional: expose a simple built-in stdout subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
