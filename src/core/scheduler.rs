//! # Scheduler: the facade that owns the runtime.
//!
//! The [`Scheduler`] wires the pieces together — event bus, subscriber
//! fan-out, router, gateway adapters, cancellation token — and exposes the
//! two client entry points, [`Scheduler::materialize`] and
//! [`Scheduler::invalidate`].
//!
//! ## Architecture
//! ```text
//! Scheduler::new(cfg, catalog, executor, metadata, subscribers)
//!       │
//!       ├──► Bus ──► fan-out listener ──► SubscriberSet (per-subscriber queues)
//!       │
//!       └──► Router (lazy supervisors) ──► ViewSupervisor per view
//!                                               │
//!                                      Gateways (executor, metadata)
//!
//! materialize(path) ──► ClientRef ──► CommandForView ──► router ──► supervisor
//!                          └──────────── outcome receiver ◄──────────────┘
//! ```
//!
//! ## Rules
//! - Each request mints a fresh [`ClientRef`]; its receiver yields exactly
//!   one terminal [`ViewOutcome`] for that request.
//! - Parallelism is across views; `dispatcher_parallelism` caps how many
//!   inboxes drain concurrently (0 = unlimited).
//! - Shutdown is cooperative: the token stops every supervisor after its
//!   current message, then subscriber workers drain and exit.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::message::{CommandForView, ViewCommand};
use crate::core::router::Router;
use crate::error::SchedulerError;
use crate::events::{Bus, SchedulerEvent};
use crate::gateways::{Gateways, MetadataStore, TransformationExecutor};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::views::{Catalog, ClientRef, MaterializeMode, ViewOutcome};

/// Shared handles every supervisor runs with.
#[derive(Clone)]
pub(crate) struct SupervisorContext {
    pub gateways: Gateways,
    pub bus: Bus,
    pub cfg: Config,
    /// Global inbox-drain limiter (`None` = unlimited).
    pub semaphore: Option<Arc<Semaphore>>,
    pub token: CancellationToken,
}

/// Receiver for the terminal outcome(s) of a request.
pub type OutcomeReceiver = mpsc::UnboundedReceiver<ViewOutcome>;

/// Coordinates the materialization of derived views over a dependency graph.
pub struct Scheduler {
    catalog: Catalog,
    bus: Bus,
    router: Router,
    subs: Arc<SubscriberSet>,
    fanout: JoinHandle<()>,
    token: CancellationToken,
}

impl Scheduler {
    /// Creates a scheduler over the given view graph and collaborators.
    ///
    /// Spawns the subscriber fan-out; supervisors come up lazily on first
    /// reference (or eagerly via [`Scheduler::preload`]).
    pub fn new(
        cfg: Config,
        catalog: Catalog,
        executor: Arc<dyn TransformationExecutor>,
        metadata: Arc<dyn MetadataStore>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));
        let token = CancellationToken::new();
        let semaphore = match cfg.dispatcher_parallelism {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        let context = SupervisorContext {
            gateways: Gateways {
                executor,
                metadata,
                fetch_timeout: cfg.metadata_fetch_timeout,
            },
            bus: bus.clone(),
            cfg,
            semaphore,
            token: token.clone(),
        };
        let router = Router::new(catalog.clone(), context);
        let fanout = Self::spawn_fanout_listener(&bus, &subs, &token);

        Self {
            catalog,
            bus,
            router,
            subs,
            fanout,
            token,
        }
    }

    /// Brings up a supervisor for every catalog view (bootstrap load).
    ///
    /// Purely an optimization: supervisors also come up lazily on first
    /// message.
    pub fn preload(&self) {
        for path in self.catalog.paths() {
            let _ = self.router.lookup_or_create(path);
        }
    }

    /// Materializes a view in [`MaterializeMode::Default`].
    ///
    /// The returned receiver yields exactly one terminal [`ViewOutcome`] for
    /// this request.
    pub fn materialize(&self, path: &str) -> Result<OutcomeReceiver, SchedulerError> {
        self.materialize_with(path, MaterializeMode::Default)
    }

    /// Materializes a view in an explicit mode.
    pub fn materialize_with(
        &self,
        path: &str,
        mode: MaterializeMode,
    ) -> Result<OutcomeReceiver, SchedulerError> {
        self.request(path, |client| ViewCommand::Materialize {
            mode,
            client: Some(client),
        })
    }

    /// Invalidates a view.
    ///
    /// Applied from resting states; rejected (with
    /// [`ViewOutcome::NotInvalidated`]) while the view is in flight.
    pub fn invalidate(&self, path: &str) -> Result<OutcomeReceiver, SchedulerError> {
        self.request(path, |client| ViewCommand::Invalidate {
            client: Some(client),
        })
    }

    /// Invalidates every view that currently has a supervisor.
    ///
    /// The receiver yields one outcome per signalled view, attributable via
    /// [`ViewOutcome::view`].
    pub fn invalidate_all(&self) -> OutcomeReceiver {
        let (client, rx) = ClientRef::channel();
        self.router.broadcast(ViewCommand::Invalidate {
            client: Some(client),
        });
        rx
    }

    /// Taps the raw event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.bus.subscribe()
    }

    /// Stops every supervisor and drains subscriber workers.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.fanout.await;
        if let Ok(set) = Arc::try_unwrap(self.subs) {
            set.shutdown().await;
        }
    }

    fn request(
        &self,
        path: &str,
        command: impl FnOnce(ClientRef) -> ViewCommand,
    ) -> Result<OutcomeReceiver, SchedulerError> {
        if self.token.is_cancelled() {
            return Err(SchedulerError::Shutdown);
        }
        let (client, rx) = ClientRef::channel();
        self.router
            .forward(CommandForView::to(path, command(client)))?;
        Ok(rx)
    }

    /// Spawns the task that drains the bus into the subscriber fan-out.
    ///
    /// Spawned before any supervisor exists, so early events are not missed.
    fn spawn_fanout_listener(
        bus: &Bus,
        subs: &Arc<SubscriberSet>,
        token: &CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let set = Arc::clone(subs);
        let token = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit_arc(Arc::new(ev)),
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        })
    }
}
