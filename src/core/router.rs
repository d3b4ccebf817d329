//! # Router: view identity → supervisor inbox.
//!
//! The [`Router`] owns the keyed mapping from `url_path` to supervisor inbox
//! and creates supervisors lazily: the first envelope for an unknown view
//! resolves the view from the catalog, bootstraps its initial state from the
//! metadata store, and spawns the supervisor task.
//!
//! ## Architecture
//! ```text
//! forward(envelope)
//!     ├─► entry Ready(inbox)   ──► inbox.send(envelope)
//!     ├─► entry Pending(buf)   ──► buf.push(envelope)          (bootstrap in flight)
//!     └─► vacant ──► catalog hit? ──► insert Pending([envelope])
//!                          │               └─► spawn bootstrap:
//!                          │                     add_partition + check_version
//!                          │                     read stored version/timestamp
//!                          │                     spawn ViewSupervisor
//!                          │                     drain buffer → Ready(inbox)
//!                          └─► miss ──► UnknownView
//! ```
//!
//! ## Rules
//! - Envelopes for a bootstrapping supervisor are buffered **in arrival
//!   order** and drained before the entry flips to `Ready`; no message to an
//!   as-yet-uncreated supervisor is lost.
//! - Bootstrap metadata failures degrade to `CreatedFromScratch` (the machine
//!   stays live and the first materialization re-transforms).
//! - One entry per `url_path`; supervisors live until shutdown.

use dashmap::DashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::message::{CommandForView, Inbox, ViewCommand};
use crate::core::scheduler::SupervisorContext;
use crate::core::supervisor::ViewSupervisor;
use crate::error::SchedulerError;
use crate::gateways::CheckVersionResult;
use crate::machine::StoredMetadata;
use crate::views::{Catalog, View, ViewState};

/// One routing slot.
enum RouterEntry {
    /// Supervisor bootstrapping; envelopes buffered in arrival order.
    Pending(Vec<CommandForView>),
    /// Supervisor live.
    Ready(Inbox),
}

/// Concurrent map of view supervisors, shared by the scheduler facade and
/// every supervisor (for cross-view traffic).
#[derive(Clone)]
pub(crate) struct Router {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    entries: DashMap<String, RouterEntry>,
    catalog: Catalog,
    context: SupervisorContext,
}

impl Router {
    /// Creates an empty router over the given catalog.
    pub(crate) fn new(catalog: Catalog, context: SupervisorContext) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                entries: DashMap::new(),
                catalog,
                context,
            }),
        }
    }

    /// Returns the live inbox for a view, if its supervisor is up.
    ///
    /// Supervisors fold the result into their peer cache; `None` while the
    /// target is unknown or still bootstrapping.
    pub(crate) fn lookup(&self, url_path: &str) -> Option<Inbox> {
        match self.inner.entries.get(url_path)?.value() {
            RouterEntry::Ready(tx) => Some(tx.clone()),
            RouterEntry::Pending(_) => None,
        }
    }

    /// Ensures a supervisor exists (or is bootstrapping) for the view.
    pub(crate) fn lookup_or_create(&self, url_path: &str) -> Result<(), SchedulerError> {
        use dashmap::mapref::entry::Entry;

        match self.inner.entries.entry(url_path.to_string()) {
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(vacant) => {
                let Some(view) = self.inner.catalog.get(url_path).cloned() else {
                    return Err(SchedulerError::UnknownView {
                        path: url_path.to_string(),
                    });
                };
                vacant.insert(RouterEntry::Pending(Vec::new()));
                self.spawn_bootstrap(view);
                Ok(())
            }
        }
    }

    /// Delivers an envelope to its target supervisor, creating it on first
    /// reference.
    pub(crate) fn forward(&self, envelope: CommandForView) -> Result<(), SchedulerError> {
        use dashmap::mapref::entry::Entry;

        match self.inner.entries.entry(envelope.target.clone()) {
            Entry::Occupied(mut occupied) => {
                match occupied.get_mut() {
                    RouterEntry::Ready(tx) => {
                        // A closed inbox means shutdown; the token has
                        // already stopped the sender's loop as well.
                        let _ = tx.send(envelope);
                    }
                    RouterEntry::Pending(buffer) => buffer.push(envelope),
                }
                Ok(())
            }
            Entry::Vacant(vacant) => {
                let Some(view) = self.inner.catalog.get(&envelope.target).cloned() else {
                    return Err(SchedulerError::UnknownView {
                        path: envelope.target,
                    });
                };
                vacant.insert(RouterEntry::Pending(vec![envelope]));
                self.spawn_bootstrap(view);
                Ok(())
            }
        }
    }

    /// Sends a command to every known supervisor.
    pub(crate) fn broadcast(&self, command: ViewCommand) {
        let targets: Vec<String> = self
            .inner
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for target in targets {
            let _ = self.forward(CommandForView::to(target, command.clone()));
        }
    }

    fn spawn_bootstrap(&self, view: View) {
        let router = self.clone();
        tokio::spawn(async move { router.bootstrap(view).await });
    }

    /// Reads the view's bootstrap state and brings its supervisor up.
    async fn bootstrap(&self, view: View) {
        let gateways = &self.inner.context.gateways;

        if !view.is_external() {
            if let Err(e) = gateways.metadata.add_partition(&view).await {
                eprintln!(
                    "[viewvisor] add_partition for '{}' failed: {e}",
                    view.url_path()
                );
            }
            if let CheckVersionResult::Error = gateways.metadata.check_version(&view).await {
                eprintln!(
                    "[viewvisor] version check for '{}' failed",
                    view.url_path()
                );
            }
        }

        let stored = match gateways.metadata.get_metadata_for_materialize(&view).await {
            Ok(meta) => StoredMetadata {
                checksum: meta.version,
                last_transformed_at: meta.last_transformed_at,
            },
            Err(_) => StoredMetadata::default(),
        };
        let initial = if stored.checksum.is_some() || stored.last_transformed_at > 0 {
            ViewState::ReadFromSchemaManager {
                view: view.clone(),
                version: stored.checksum.clone().unwrap_or_default(),
                last_transformed_at: stored.last_transformed_at,
            }
        } else {
            ViewState::CreatedFromScratch { view: view.clone() }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = ViewSupervisor::new(
            view.clone(),
            initial,
            stored,
            rx,
            tx.clone(),
            self.clone(),
            self.inner.context.clone(),
        );
        tokio::spawn(supervisor.run());

        // Flip the entry under its lock: buffered envelopes drain in arrival
        // order before any concurrent forward can observe Ready.
        if let Some(mut entry) = self.inner.entries.get_mut(view.url_path()) {
            if let RouterEntry::Pending(buffer) = &mut *entry {
                for envelope in buffer.drain(..) {
                    let _ = tx.send(envelope);
                }
            }
            *entry = RouterEntry::Ready(tx);
        }
    }
}
