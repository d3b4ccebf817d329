//! # Gateway adapters.
//!
//! [`Gateways`] bundles the executor and metadata seams behind the
//! conversions the supervisors rely on:
//! - every `submit` outcome becomes a `TransformationSucceeded` /
//!   `TransformationFailed` inbox message (errors never cross the inbox
//!   boundary),
//! - metadata fetches for external views run under the configured timeout
//!   and synthesize `MetadataFetchFailed` on timeout or error,
//! - metadata writes and marker touches are fire-and-forget.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::core::message::{CommandForView, Inbox, ViewCommand};
use crate::gateways::{MetadataStore, TransformationExecutor};
use crate::views::{Listener, MaterializeMode, View};

/// Shared handles to the external collaborators.
#[derive(Clone)]
pub(crate) struct Gateways {
    pub executor: Arc<dyn TransformationExecutor>,
    pub metadata: Arc<dyn MetadataStore>,
    /// Cap on external-view metadata fetches.
    pub fetch_timeout: Duration,
}

impl Gateways {
    /// Submits the view's transformation; the completion arrives on `inbox`.
    pub(crate) fn submit_transformation(&self, view: View, inbox: Inbox) {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            let command = match executor.submit(&view).await {
                Ok(has_data) => ViewCommand::TransformationSucceeded { has_data },
                Err(e) => {
                    eprintln!(
                        "[viewvisor] transformation of '{}' errored ({}): {e}",
                        view.url_path(),
                        e.as_label(),
                    );
                    ViewCommand::TransformationFailed
                }
            };
            let _ = inbox.send(CommandForView::to(view.url_path(), command));
        });
    }

    /// Fetches an external view's metadata; the answer arrives on `inbox`.
    ///
    /// Timeouts and store errors both synthesize `MetadataFetchFailed` so the
    /// state machine stays live.
    pub(crate) fn fetch_for_materialize(
        &self,
        view: View,
        mode: MaterializeMode,
        requester: Listener,
        inbox: Inbox,
    ) {
        let metadata = Arc::clone(&self.metadata);
        let fetch_timeout = self.fetch_timeout;
        tokio::spawn(async move {
            let fetched = time::timeout(fetch_timeout, metadata.get_metadata_for_materialize(&view))
                .await;
            let command = match fetched {
                Ok(Ok(meta)) => ViewCommand::MetadataForMaterialize {
                    version: meta.version,
                    timestamp: meta.last_transformed_at,
                    mode,
                    requester,
                },
                Ok(Err(_)) | Err(_) => ViewCommand::MetadataFetchFailed { requester },
            };
            let _ = inbox.send(CommandForView::to(view.url_path(), command));
        });
    }

    /// Persists a new transformation time, fire-and-forget.
    pub(crate) fn write_transformation_timestamp(&self, view: View, timestamp: u64) {
        let metadata = Arc::clone(&self.metadata);
        tokio::spawn(async move {
            if let Err(e) = metadata.log_transformation_timestamp(&view, timestamp).await {
                eprintln!(
                    "[viewvisor] timestamp write for '{}' failed: {e}",
                    view.url_path()
                );
            }
        });
    }

    /// Persists the current transformation checksum, fire-and-forget.
    pub(crate) fn write_transformation_checksum(&self, view: View) {
        let metadata = Arc::clone(&self.metadata);
        tokio::spawn(async move {
            if let Err(e) = metadata.set_view_version(&view).await {
                eprintln!(
                    "[viewvisor] checksum write for '{}' failed: {e}",
                    view.url_path()
                );
            }
        });
    }

    /// Creates the `_SUCCESS` marker, fire-and-forget.
    pub(crate) fn touch_success_flag(&self, view: View) {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            if let Err(e) = executor.touch(view.url_path()).await {
                eprintln!("[viewvisor] touch for '{}' failed: {e}", view.url_path());
            }
        });
    }

    /// Probes the `_SUCCESS` marker for a NoOp materialization.
    ///
    /// A probe failure reads as "marker missing": the view lands in `NoData`
    /// and a re-materialize retries the probe.
    pub(crate) async fn probe_success_flag(&self, view: &View) -> bool {
        self.executor
            .success_flag_exists(view.url_path())
            .await
            .unwrap_or(false)
    }
}
