//! # ViewSupervisor: per-view owner of state and inbox.
//!
//! One supervisor task per view. It owns the view's [`ViewState`], drains a
//! single-consumer inbox strictly in receive order, feeds each envelope
//! through the pure [`StateMachine`], and performs the returned actions.
//! This loop is the serialization point: nothing else ever mutates the state.
//!
//! ## Event flow
//! ```text
//! loop {
//!   ├─► receive envelope (sole suspension point; optional global permit)
//!   ├─► classify: envelope + source attribution → ViewEvent
//!   ├─► probe _SUCCESS (NoOp materialize only) → StepContext
//!   ├─► machine.step(state, event, ctx) → (state', actions)
//!   ├─► publish StateChanged (variant changed) / ActionsScheduled (any actions)
//!   ├─► entered Retrying(r)? → arm one-shot timer: sleep(min(2^r, cap)) → Retry
//!   └─► dispatch actions (all non-blocking):
//!         Materialize(dep)      → peer cache / router
//!         Transform             → executor adapter → completion self-send
//!         Write* / Touch        → fire-and-forget gateways (mirror updated)
//!         FetchMetadata         → metadata adapter → answer self-send
//!         Report*               → view listeners via router, clients directly
//! }
//! ```
//!
//! ## Rules
//! - At most one transformation is in flight per view: `Transform` is only
//!   emitted on entry into `Transforming`, and the next submission waits for
//!   the completion self-send.
//! - Retry timers are never cancelled; a stale `Retry` is a no-op in the
//!   machine.
//! - Status events are emitted on variant changes only, never for external
//!   views.
//! - The peer cache holds router-confirmed inboxes; a stale entry falls back
//!   to the router, which buffers instead of dropping.

use std::collections::HashMap;
use std::mem;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time;

use crate::core::backoff::BackoffPolicy;
use crate::core::message::{CommandForView, Inbox, InboxReceiver, ViewCommand};
use crate::core::router::Router;
use crate::core::scheduler::SupervisorContext;
use crate::events::{EventKind, SchedulerEvent, ViewStatus};
use crate::machine::{Action, StateMachine, StepContext, StoredMetadata, Transition, ViewEvent};
use crate::views::{ClientRef, Listener, View, ViewOutcome, ViewState};

/// Owns one view's scheduling state and inbox.
pub(crate) struct ViewSupervisor {
    view: View,
    state: ViewState,
    /// Mirror of the persisted checksum/timestamp, updated as write actions
    /// are dispatched.
    stored: StoredMetadata,
    machine: StateMachine,
    backoff: BackoffPolicy,
    /// Cache of peer inboxes, filled through the router on first use.
    peers: HashMap<String, Inbox>,
    inbox: InboxReceiver,
    self_tx: Inbox,
    router: Router,
    context: SupervisorContext,
}

impl ViewSupervisor {
    /// Creates a supervisor with its bootstrap state.
    pub(crate) fn new(
        view: View,
        initial: ViewState,
        stored: StoredMetadata,
        inbox: InboxReceiver,
        self_tx: Inbox,
        router: Router,
        context: SupervisorContext,
    ) -> Self {
        Self {
            machine: StateMachine::new(context.cfg.max_retries),
            backoff: BackoffPolicy::new(context.cfg.backoff_cap),
            view,
            state: initial,
            stored,
            peers: HashMap::new(),
            inbox,
            self_tx,
            router,
            context,
        }
    }

    /// Drains the inbox until shutdown.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.context.token.cancelled() => break,
                envelope = self.inbox.recv() => match envelope {
                    Some(envelope) => self.handle(envelope).await,
                    None => break,
                },
            }
        }
    }

    /// Processes one envelope: classify, step, publish, dispatch.
    async fn handle(&mut self, envelope: CommandForView) {
        let _permit = match &self.context.semaphore {
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        };

        let Some(event) = self.classify(envelope) else {
            return;
        };
        let step_ctx = self.step_context(&event).await;

        let previous = self.state.label();
        let state = mem::replace(
            &mut self.state,
            ViewState::CreatedFromScratch {
                view: self.view.clone(),
            },
        );
        let Transition { next, actions } = self.machine.step(state, event, &step_ctx);
        let entered_retrying =
            matches!(next, ViewState::Retrying { .. }) && previous != next.label();
        self.state = next;

        self.publish_events(previous, &actions);
        if entered_retrying {
            self.arm_retry_timer();
        }
        for action in actions {
            self.dispatch(action);
        }
    }

    /// Maps an envelope to a machine event, resolving the requester or
    /// dependency from the source attribution.
    fn classify(&self, envelope: CommandForView) -> Option<ViewEvent> {
        let CommandForView {
            source, command, ..
        } = envelope;
        match command {
            ViewCommand::Materialize { mode, client } => {
                match requester_of(client, source) {
                    Some(requester) => Some(ViewEvent::Materialize { mode, requester }),
                    None => {
                        self.drop_unattributed("materialize");
                        None
                    }
                }
            }
            ViewCommand::Invalidate { client } => match requester_of(client, source) {
                Some(requester) => Some(ViewEvent::Invalidate { requester }),
                None => {
                    self.drop_unattributed("invalidate");
                    None
                }
            },
            ViewCommand::ViewMaterialized {
                transformation_ts,
                with_errors,
                incomplete,
            } => match source {
                Some(dependency) => Some(ViewEvent::ViewMaterialized {
                    dependency,
                    transformation_ts,
                    with_errors,
                    incomplete,
                }),
                None => {
                    self.drop_unattributed("view-materialized");
                    None
                }
            },
            ViewCommand::ViewHasNoData => match source {
                Some(dependency) => Some(ViewEvent::ViewHasNoData { dependency }),
                None => {
                    self.drop_unattributed("view-has-no-data");
                    None
                }
            },
            ViewCommand::ViewFailed => match source {
                Some(dependency) => Some(ViewEvent::ViewFailed { dependency }),
                None => {
                    self.drop_unattributed("view-failed");
                    None
                }
            },
            ViewCommand::TransformationSucceeded { has_data } => {
                Some(ViewEvent::TransformationSucceeded { has_data })
            }
            ViewCommand::TransformationFailed => Some(ViewEvent::TransformationFailed),
            ViewCommand::Retry => Some(ViewEvent::Retry),
            ViewCommand::MetadataForMaterialize {
                version,
                timestamp,
                mode,
                requester,
            } => Some(ViewEvent::MetadataForMaterialize {
                version,
                timestamp,
                mode,
                requester,
            }),
            ViewCommand::MetadataFetchFailed { requester } => {
                Some(ViewEvent::MetadataFetchFailed { requester })
            }
        }
    }

    /// Builds the contextual parameters for one step, probing the success
    /// flag when a NoOp view is being materialized.
    async fn step_context(&self, event: &ViewEvent) -> StepContext {
        let success_flag = if self.view.is_no_op()
            && matches!(event, ViewEvent::Materialize { .. })
        {
            Some(self.context.gateways.probe_success_flag(&self.view).await)
        } else {
            None
        };
        StepContext {
            now: epoch_millis(),
            success_flag,
            stored: self.stored.clone(),
        }
    }

    /// Publishes state-change and scheduling-action events.
    ///
    /// Variant changes only; payload-only changes stay off the bus. External
    /// views publish nothing.
    fn publish_events(&self, previous: &'static str, actions: &[Action]) {
        if self.view.is_external() {
            return;
        }
        if self.state.label() != previous {
            self.context.bus.publish(
                SchedulerEvent::now(EventKind::StateChanged)
                    .with_view(self.view.url_path())
                    .with_previous(previous)
                    .with_status(ViewStatus::of(&self.state)),
            );
        }
        if !actions.is_empty() {
            self.context.bus.publish(
                SchedulerEvent::now(EventKind::ActionsScheduled)
                    .with_view(self.view.url_path())
                    .with_previous(previous)
                    .with_status(ViewStatus::of(&self.state))
                    .with_actions(actions.iter().map(Action::as_label).collect()),
            );
        }
    }

    /// Arms the one-shot backoff timer for the current `Retrying` state.
    ///
    /// The timer is fire-and-forget and self-identifying: if the state moved
    /// on before it fires, the machine ignores the `Retry`.
    fn arm_retry_timer(&self) {
        let ViewState::Retrying { retry, .. } = &self.state else {
            return;
        };
        let delay = self.backoff.delay(*retry);
        let inbox = self.self_tx.clone();
        let target = self.view.url_path().to_string();
        let token = self.context.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(delay) => {
                    let _ = inbox.send(CommandForView::to(target, ViewCommand::Retry));
                }
                _ = token.cancelled() => {}
            }
        });
    }

    /// Performs one action. Dispatch never blocks: sends enqueue, gateway
    /// calls run on spawned tasks.
    fn dispatch(&mut self, action: Action) {
        match action {
            Action::Materialize { target, mode } => {
                self.send_to_view(target, ViewCommand::Materialize { mode, client: None });
            }
            Action::Transform => {
                self.context
                    .gateways
                    .submit_transformation(self.view.clone(), self.self_tx.clone());
            }
            Action::WriteTransformationTimestamp { timestamp } => {
                self.stored.last_transformed_at = timestamp;
                self.context
                    .gateways
                    .write_transformation_timestamp(self.view.clone(), timestamp);
            }
            Action::WriteTransformationChecksum => {
                self.stored.checksum = Some(self.view.version().to_string());
                self.context
                    .gateways
                    .write_transformation_checksum(self.view.clone());
            }
            Action::TouchSuccessFlag => {
                self.context.gateways.touch_success_flag(self.view.clone());
            }
            Action::FetchMetadata { mode, requester } => {
                self.context.gateways.fetch_for_materialize(
                    self.view.clone(),
                    mode,
                    requester,
                    self.self_tx.clone(),
                );
            }
            Action::ReportMaterialized {
                listeners,
                transformation_ts,
                with_errors,
                incomplete,
            } => {
                for listener in listeners {
                    match listener {
                        Listener::View(path) => self.send_to_view(
                            path,
                            ViewCommand::ViewMaterialized {
                                transformation_ts,
                                with_errors,
                                incomplete,
                            },
                        ),
                        Listener::Client(client) => client.deliver(ViewOutcome::Materialized {
                            view: self.view.url_path().to_string(),
                            transformation_ts,
                            with_errors,
                            incomplete,
                        }),
                    }
                }
            }
            Action::ReportNoDataAvailable { listeners } => {
                for listener in listeners {
                    match listener {
                        Listener::View(path) => {
                            self.send_to_view(path, ViewCommand::ViewHasNoData)
                        }
                        Listener::Client(client) => client.deliver(ViewOutcome::NoData {
                            view: self.view.url_path().to_string(),
                        }),
                    }
                }
            }
            Action::ReportFailed { listeners } => {
                for listener in listeners {
                    match listener {
                        Listener::View(path) => self.send_to_view(path, ViewCommand::ViewFailed),
                        Listener::Client(client) => client.deliver(ViewOutcome::Failed {
                            view: self.view.url_path().to_string(),
                        }),
                    }
                }
            }
            Action::ReportInvalidated { listeners } => {
                self.deliver_invalidation(listeners, true);
            }
            Action::ReportNotInvalidated { listeners } => {
                self.deliver_invalidation(listeners, false);
            }
        }
    }

    /// Invalidation acks go to clients; views never request invalidation.
    fn deliver_invalidation(&self, listeners: Vec<Listener>, applied: bool) {
        for listener in listeners {
            match listener {
                Listener::Client(client) => {
                    let view = self.view.url_path().to_string();
                    client.deliver(if applied {
                        ViewOutcome::Invalidated { view }
                    } else {
                        ViewOutcome::NotInvalidated { view }
                    });
                }
                Listener::View(path) => {
                    self.context.bus.publish(
                        SchedulerEvent::now(EventKind::RouterDropped)
                            .with_view(self.view.url_path())
                            .with_error(format!("invalidation ack for view listener '{path}'")),
                    );
                }
            }
        }
    }

    /// Routes a command to a peer supervisor: cached inbox first, router on
    /// miss (the router buffers for supervisors still bootstrapping).
    fn send_to_view(&mut self, target: String, command: ViewCommand) {
        let mut envelope = CommandForView::from_view(self.view.url_path(), target.clone(), command);

        if let Some(tx) = self.peers.get(&target).cloned() {
            match tx.send(envelope) {
                Ok(()) => return,
                Err(tokio::sync::mpsc::error::SendError(returned)) => {
                    self.peers.remove(&target);
                    envelope = returned;
                }
            }
        }

        if let Err(e) = self.router.forward(envelope) {
            self.context.bus.publish(
                SchedulerEvent::now(EventKind::RouterDropped)
                    .with_view(target.as_str())
                    .with_error(e.to_string()),
            );
            return;
        }
        if let Some(tx) = self.router.lookup(&target) {
            self.peers.insert(target, tx);
        }
    }

    /// Reports an envelope that cannot be attributed to a requester.
    fn drop_unattributed(&self, label: &'static str) {
        self.context.bus.publish(
            SchedulerEvent::now(EventKind::RouterDropped)
                .with_view(self.view.url_path())
                .with_error(format!("unattributed {label} envelope")),
        );
    }
}

/// The requester of a materialize/invalidate: explicit client handle, or the
/// source view of the envelope.
fn requester_of(client: Option<ClientRef>, source: Option<String>) -> Option<Listener> {
    client
        .map(Listener::Client)
        .or_else(|| source.map(Listener::View))
}

/// Wall-clock time as epoch millis.
fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
