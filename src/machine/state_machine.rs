//! # The scheduling state machine.
//!
//! [`StateMachine::step`] is a pure, total function: given the current
//! [`ViewState`], one [`ViewEvent`], and the contextual parameters in
//! [`StepContext`], it returns the next state plus the set of actions the
//! supervisor must perform. No I/O, no clock access, no message sending.
//!
//! ## Transition sketch
//! ```text
//! created / read-from-schema-manager / invalidated / no-data / materialized / failed
//!     │ Materialize(mode)
//!     ├─► external view ──► FetchMetadata ──► MetadataForMaterialize
//!     │                                        ├─► materialized (ts > 0)
//!     │                                        └─► no-data      (ts = 0)
//!     ├─► NoOp view ──► materialized / no-data (success-flag probe)
//!     ├─► SET_ONLY ──► materialized (stamp now, rewrite metadata)
//!     ├─► TRANSFORM_ONLY ──► transforming(0)
//!     ├─► dependencies ──► waiting ──(fan-in)──► no-data | materialized | transforming(0)
//!     └─► no dependencies ──► materialized (fresh) | transforming(0)
//!
//! transforming(k) ── TransformationSucceeded(data)  ──► materialized
//!                 ── TransformationSucceeded(empty) ──► no-data
//!                 ── TransformationFailed, k <  max ──► retrying(k+1)
//!                 ── TransformationFailed, k >= max ──► failed
//! retrying(k)     ── Retry ──► transforming(k)
//! ```
//!
//! ## Rules
//! - Every `(state, event)` cell is defined; combinations outside the
//!   protocol (stale `Retry`, executor completions without a transformation
//!   in flight, dependency responses for untracked dependencies) leave the
//!   state unchanged with an empty action set.
//! - A `Waiting` state with an empty dependency set is never produced: the
//!   fan-in evaluation runs inline and dependency-less views transition
//!   straight through. A dependency-less view with transformation logic
//!   counts as having seen data (its transformation reads raw storage).
//! - `with_errors` and `incomplete` only accumulate within one attempt.
//! - Listeners are consumed by the terminal transition that reports to them.

use std::collections::HashSet;

use crate::machine::{Action, ViewEvent};
use crate::views::{Listener, MaterializeMode, View, ViewState};

/// Mirror of the persisted checksum/timestamp pair for one view.
///
/// The supervisor seeds it from bootstrap metadata and keeps it current as it
/// performs `WriteTransformationChecksum` / `WriteTransformationTimestamp`
/// actions; `last_transformed_at == 0` means "never transformed".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredMetadata {
    /// Persisted transformation checksum, if any.
    pub checksum: Option<String>,
    /// Persisted transformation time, epoch millis (0 = never).
    pub last_transformed_at: u64,
}

/// Contextual parameters for one step.
///
/// Everything the machine may not compute itself: the current time, the
/// success-flag probe answer for NoOp views, and the stored metadata mirror.
#[derive(Clone, Debug, Default)]
pub struct StepContext {
    /// Current time, epoch millis.
    pub now: u64,
    /// Whether `_SUCCESS` exists in the view's output directory; supplied by
    /// the supervisor for NoOp materializations, `None` otherwise.
    pub success_flag: Option<bool>,
    /// Persisted checksum/timestamp mirror.
    pub stored: StoredMetadata,
}

/// Result of one step: the next state and the actions to perform.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub next: ViewState,
    pub actions: Vec<Action>,
}

impl Transition {
    /// Keeps the state, with actions.
    fn stay(state: ViewState, actions: Vec<Action>) -> Self {
        Self {
            next: state,
            actions,
        }
    }

    /// Keeps the state, no actions (ignored event).
    fn ignore(state: ViewState) -> Self {
        Self::stay(state, Vec::new())
    }
}

/// Pure per-view scheduling logic.
#[derive(Clone, Copy, Debug)]
pub struct StateMachine {
    /// Failed attempts allowed before `Failed`.
    max_retries: u32,
}

impl StateMachine {
    /// Creates a machine with the given retry cap.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Applies one event to one state.
    pub fn step(&self, state: ViewState, event: ViewEvent, ctx: &StepContext) -> Transition {
        match event {
            ViewEvent::Materialize { mode, requester } => {
                self.on_materialize(state, mode, requester, ctx)
            }
            ViewEvent::Invalidate { requester } => Self::on_invalidate(state, requester),
            ViewEvent::ViewMaterialized {
                dependency,
                transformation_ts,
                with_errors,
                incomplete,
            } => self.on_dependency_done(
                state,
                &dependency,
                DependencyResult::Materialized {
                    transformation_ts,
                    with_errors,
                    incomplete,
                },
                ctx,
            ),
            ViewEvent::ViewHasNoData { dependency } => {
                self.on_dependency_done(state, &dependency, DependencyResult::NoData, ctx)
            }
            ViewEvent::ViewFailed { dependency } => {
                self.on_dependency_done(state, &dependency, DependencyResult::Failed, ctx)
            }
            ViewEvent::TransformationSucceeded { has_data } => {
                Self::on_transformation_succeeded(state, has_data, ctx)
            }
            ViewEvent::TransformationFailed => self.on_transformation_failed(state),
            ViewEvent::Retry => Self::on_retry(state),
            ViewEvent::MetadataForMaterialize {
                version: _,
                timestamp,
                mode: _,
                requester,
            } => Self::on_metadata(state, timestamp, requester),
            ViewEvent::MetadataFetchFailed { requester } => Transition::stay(
                state,
                vec![Action::ReportFailed {
                    listeners: vec![requester],
                }],
            ),
        }
    }

    /// `Materialize` entry point.
    ///
    /// In flight: the requester joins the listeners, nothing restarts.
    /// Otherwise a new attempt begins: metadata fetch for external views,
    /// success-flag probe for NoOp views, dependency fan-out for the rest.
    fn on_materialize(
        &self,
        state: ViewState,
        mode: MaterializeMode,
        requester: Listener,
        ctx: &StepContext,
    ) -> Transition {
        match state {
            ViewState::Waiting {
                view,
                mut listeners,
                dependencies_materializing,
                one_dependency_returned_data,
                with_errors,
                incomplete,
                dependencies_freshest,
                mode,
            } => {
                push_listener(&mut listeners, requester);
                Transition::ignore(ViewState::Waiting {
                    view,
                    listeners,
                    dependencies_materializing,
                    one_dependency_returned_data,
                    with_errors,
                    incomplete,
                    dependencies_freshest,
                    mode,
                })
            }
            ViewState::Transforming {
                view,
                mut listeners,
                retry,
                with_errors,
                incomplete,
                mode,
            } => {
                push_listener(&mut listeners, requester);
                Transition::ignore(ViewState::Transforming {
                    view,
                    listeners,
                    retry,
                    with_errors,
                    incomplete,
                    mode,
                })
            }
            ViewState::Retrying {
                view,
                mut listeners,
                retry,
                with_errors,
                incomplete,
                mode,
            } => {
                push_listener(&mut listeners, requester);
                Transition::ignore(ViewState::Retrying {
                    view,
                    listeners,
                    retry,
                    with_errors,
                    incomplete,
                    mode,
                })
            }
            resting => {
                let view = resting.view().clone();
                if view.is_external() {
                    return Transition::stay(resting, vec![Action::FetchMetadata { mode, requester }]);
                }
                if view.is_no_op() {
                    return match ctx.success_flag {
                        Some(true) => Transition {
                            next: ViewState::Materialized {
                                view,
                                transformation_ts: ctx.now,
                                with_errors: false,
                                incomplete: false,
                            },
                            actions: vec![Action::ReportMaterialized {
                                listeners: vec![requester],
                                transformation_ts: ctx.now,
                                with_errors: false,
                                incomplete: false,
                            }],
                        },
                        _ => Transition {
                            next: ViewState::NoData { view },
                            actions: vec![Action::ReportNoDataAvailable {
                                listeners: vec![requester],
                            }],
                        },
                    };
                }
                self.enter_attempt(view, vec![requester], mode, ctx)
            }
        }
    }

    /// Starts a fresh materialization attempt for a transformed view.
    fn enter_attempt(
        &self,
        view: View,
        listeners: Vec<Listener>,
        mode: MaterializeMode,
        ctx: &StepContext,
    ) -> Transition {
        match mode {
            MaterializeMode::SetOnly => {
                let ts = ctx.now;
                Transition {
                    next: ViewState::Materialized {
                        view,
                        transformation_ts: ts,
                        with_errors: false,
                        incomplete: false,
                    },
                    actions: vec![
                        Action::WriteTransformationTimestamp { timestamp: ts },
                        Action::WriteTransformationChecksum,
                        Action::ReportMaterialized {
                            listeners,
                            transformation_ts: ts,
                            with_errors: false,
                            incomplete: false,
                        },
                    ],
                }
            }
            MaterializeMode::TransformOnly => Transition {
                next: ViewState::Transforming {
                    view,
                    listeners,
                    retry: 0,
                    with_errors: false,
                    incomplete: false,
                    mode,
                },
                actions: vec![Action::Transform],
            },
            _ => {
                let waiting_for: HashSet<String> =
                    view.dependencies().iter().cloned().collect();
                if waiting_for.is_empty() {
                    // Vacuous fan-in: the transformation reads raw storage,
                    // so the attempt counts as having seen data.
                    return self.complete_waiting(view, listeners, mode, FanIn::vacuous(), ctx);
                }
                let actions = view
                    .dependencies()
                    .iter()
                    .map(|dep| Action::Materialize {
                        target: dep.clone(),
                        mode,
                    })
                    .collect();
                Transition {
                    next: ViewState::Waiting {
                        view,
                        listeners,
                        dependencies_materializing: waiting_for,
                        one_dependency_returned_data: false,
                        with_errors: false,
                        incomplete: false,
                        dependencies_freshest: 0,
                        mode,
                    },
                    actions,
                }
            }
        }
    }

    /// Folds one dependency response into a `Waiting` state.
    fn on_dependency_done(
        &self,
        state: ViewState,
        dependency: &str,
        result: DependencyResult,
        ctx: &StepContext,
    ) -> Transition {
        match state {
            ViewState::Waiting {
                view,
                listeners,
                mut dependencies_materializing,
                mut one_dependency_returned_data,
                mut with_errors,
                mut incomplete,
                mut dependencies_freshest,
                mode,
            } => {
                if !dependencies_materializing.remove(dependency) {
                    // Response for an untracked dependency: stale traffic.
                    return Transition::ignore(ViewState::Waiting {
                        view,
                        listeners,
                        dependencies_materializing,
                        one_dependency_returned_data,
                        with_errors,
                        incomplete,
                        dependencies_freshest,
                        mode,
                    });
                }
                match result {
                    DependencyResult::Materialized {
                        transformation_ts,
                        with_errors: dep_errors,
                        incomplete: dep_incomplete,
                    } => {
                        one_dependency_returned_data = true;
                        with_errors |= dep_errors;
                        incomplete |= dep_incomplete;
                        dependencies_freshest = dependencies_freshest.max(transformation_ts);
                    }
                    DependencyResult::NoData => incomplete = true,
                    DependencyResult::Failed => with_errors = true,
                }
                if !dependencies_materializing.is_empty() {
                    return Transition::ignore(ViewState::Waiting {
                        view,
                        listeners,
                        dependencies_materializing,
                        one_dependency_returned_data,
                        with_errors,
                        incomplete,
                        dependencies_freshest,
                        mode,
                    });
                }
                self.complete_waiting(
                    view,
                    listeners,
                    mode,
                    FanIn {
                        one_dependency_returned_data,
                        with_errors,
                        incomplete,
                        dependencies_freshest,
                    },
                    ctx,
                )
            }
            other => Transition::ignore(other),
        }
    }

    /// Fan-in completed: decide between `NoData`, direct `Materialized`, and
    /// `Transforming`.
    fn complete_waiting(
        &self,
        view: View,
        listeners: Vec<Listener>,
        mode: MaterializeMode,
        fan_in: FanIn,
        ctx: &StepContext,
    ) -> Transition {
        let FanIn {
            one_dependency_returned_data,
            with_errors,
            incomplete,
            dependencies_freshest,
        } = fan_in;
        if !one_dependency_returned_data {
            return Transition {
                next: ViewState::NoData { view },
                actions: vec![Action::ReportNoDataAvailable { listeners }],
            };
        }

        let stale = ctx.stored.last_transformed_at == 0
            || ctx.stored.last_transformed_at < dependencies_freshest;
        let checksum_changed = ctx.stored.checksum.as_deref() != Some(view.version());
        let transform = match mode {
            MaterializeMode::ResetTransformationChecksums => stale,
            MaterializeMode::ResetTransformationChecksumsAndTimestamps => false,
            _ => stale || checksum_changed,
        };

        if transform {
            return Transition {
                next: ViewState::Transforming {
                    view,
                    listeners,
                    retry: 0,
                    with_errors,
                    incomplete,
                    mode,
                },
                actions: vec![Action::Transform],
            };
        }

        let mut actions = Vec::new();
        let mut transformation_ts = ctx.stored.last_transformed_at;
        if mode == MaterializeMode::ResetTransformationChecksumsAndTimestamps && stale {
            transformation_ts = ctx.now;
            actions.push(Action::WriteTransformationTimestamp {
                timestamp: transformation_ts,
            });
        }
        if checksum_changed {
            actions.push(Action::WriteTransformationChecksum);
        }
        actions.push(Action::ReportMaterialized {
            listeners,
            transformation_ts,
            with_errors,
            incomplete,
        });
        Transition {
            next: ViewState::Materialized {
                view,
                transformation_ts,
                with_errors,
                incomplete,
            },
            actions,
        }
    }

    /// Executor completion while `Transforming`; ignored elsewhere.
    fn on_transformation_succeeded(state: ViewState, has_data: bool, ctx: &StepContext) -> Transition {
        match state {
            ViewState::Transforming {
                view,
                listeners,
                retry: _,
                with_errors,
                incomplete,
                mode: _,
            } => {
                if !has_data {
                    return Transition {
                        next: ViewState::NoData { view },
                        actions: vec![Action::ReportNoDataAvailable { listeners }],
                    };
                }
                let ts = ctx.now;
                Transition {
                    next: ViewState::Materialized {
                        view,
                        transformation_ts: ts,
                        with_errors,
                        incomplete,
                    },
                    actions: vec![
                        Action::WriteTransformationTimestamp { timestamp: ts },
                        Action::WriteTransformationChecksum,
                        Action::TouchSuccessFlag,
                        Action::ReportMaterialized {
                            listeners,
                            transformation_ts: ts,
                            with_errors,
                            incomplete,
                        },
                    ],
                }
            }
            other => Transition::ignore(other),
        }
    }

    /// Executor failure while `Transforming`; ignored elsewhere.
    ///
    /// Below the cap the view enters `Retrying` with no actions — arming the
    /// backoff timer is the supervisor's job. At the cap the failure is
    /// terminal.
    fn on_transformation_failed(&self, state: ViewState) -> Transition {
        match state {
            ViewState::Transforming {
                view,
                listeners,
                retry,
                with_errors,
                incomplete,
                mode,
            } => {
                if retry < self.max_retries {
                    Transition::ignore(ViewState::Retrying {
                        view,
                        listeners,
                        retry: retry + 1,
                        with_errors,
                        incomplete,
                        mode,
                    })
                } else {
                    Transition {
                        next: ViewState::Failed { view },
                        actions: vec![Action::ReportFailed { listeners }],
                    }
                }
            }
            other => Transition::ignore(other),
        }
    }

    /// Backoff timer fired. Stale timers (state moved on) are harmless.
    fn on_retry(state: ViewState) -> Transition {
        match state {
            ViewState::Retrying {
                view,
                listeners,
                retry,
                with_errors,
                incomplete,
                mode,
            } => Transition {
                next: ViewState::Transforming {
                    view,
                    listeners,
                    retry,
                    with_errors,
                    incomplete,
                    mode,
                },
                actions: vec![Action::Transform],
            },
            other => Transition::ignore(other),
        }
    }

    /// `Invalidate`: rejected while in flight, applied otherwise.
    fn on_invalidate(state: ViewState, requester: Listener) -> Transition {
        if state.is_in_flight() {
            return Transition::stay(
                state,
                vec![Action::ReportNotInvalidated {
                    listeners: vec![requester],
                }],
            );
        }
        let view = state.view().clone();
        Transition {
            next: ViewState::Invalidated { view },
            actions: vec![Action::ReportInvalidated {
                listeners: vec![requester],
            }],
        }
    }

    /// Metadata answer for an external view's materialize.
    ///
    /// A non-zero timestamp means the external data exists as of that time;
    /// zero means nothing has been produced. External views never go in
    /// flight, so in-flight states ignore the event.
    fn on_metadata(state: ViewState, timestamp: u64, requester: Listener) -> Transition {
        if state.is_in_flight() {
            return Transition::ignore(state);
        }
        let view = state.view().clone();
        if timestamp > 0 {
            Transition {
                next: ViewState::Materialized {
                    view,
                    transformation_ts: timestamp,
                    with_errors: false,
                    incomplete: false,
                },
                actions: vec![Action::ReportMaterialized {
                    listeners: vec![requester],
                    transformation_ts: timestamp,
                    with_errors: false,
                    incomplete: false,
                }],
            }
        } else {
            Transition {
                next: ViewState::NoData { view },
                actions: vec![Action::ReportNoDataAvailable {
                    listeners: vec![requester],
                }],
            }
        }
    }
}

/// Accumulated fan-in summary at the moment the last dependency responded.
struct FanIn {
    one_dependency_returned_data: bool,
    with_errors: bool,
    incomplete: bool,
    dependencies_freshest: u64,
}

impl FanIn {
    /// Summary for a view with no dependencies at all.
    fn vacuous() -> Self {
        Self {
            one_dependency_returned_data: true,
            with_errors: false,
            incomplete: false,
            dependencies_freshest: 0,
        }
    }
}

/// What a dependency reported back.
enum DependencyResult {
    Materialized {
        transformation_ts: u64,
        with_errors: bool,
        incomplete: bool,
    },
    NoData,
    Failed,
}

/// Enqueues a listener unless the identical party is already registered.
fn push_listener(listeners: &mut Vec<Listener>, requester: Listener) {
    if !listeners.contains(&requester) {
        listeners.push(requester);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_RETRIES: u32 = 3;
    const NOW: u64 = 5_000;

    fn machine() -> StateMachine {
        StateMachine::new(MAX_RETRIES)
    }

    fn ctx() -> StepContext {
        StepContext {
            now: NOW,
            success_flag: None,
            stored: StoredMetadata::default(),
        }
    }

    fn ctx_stored(checksum: &str, last_transformed_at: u64) -> StepContext {
        StepContext {
            now: NOW,
            success_flag: None,
            stored: StoredMetadata {
                checksum: Some(checksum.to_string()),
                last_transformed_at,
            },
        }
    }

    fn leaf() -> View {
        View::new("db/A/p", "v1")
    }

    fn parent() -> View {
        View::new("db/B/p", "v1").with_dependencies(vec!["db/A/p".into(), "db/C/p".into()])
    }

    fn client() -> Listener {
        Listener::Client(crate::views::ClientRef::channel().0)
    }

    fn waiting(view: View, deps: &[&str]) -> ViewState {
        ViewState::Waiting {
            view,
            listeners: vec![client()],
            dependencies_materializing: deps.iter().map(|d| d.to_string()).collect(),
            one_dependency_returned_data: false,
            with_errors: false,
            incomplete: false,
            dependencies_freshest: 0,
            mode: MaterializeMode::Default,
        }
    }

    fn transforming(view: View, retry: u32) -> ViewState {
        ViewState::Transforming {
            view,
            listeners: vec![client()],
            retry,
            with_errors: false,
            incomplete: false,
            mode: MaterializeMode::Default,
        }
    }

    fn retrying(view: View, retry: u32) -> ViewState {
        ViewState::Retrying {
            view,
            listeners: vec![client()],
            retry,
            with_errors: false,
            incomplete: false,
            mode: MaterializeMode::Default,
        }
    }

    /// One state per variant, over the same view.
    fn all_states(view: &View) -> Vec<ViewState> {
        vec![
            ViewState::CreatedFromScratch { view: view.clone() },
            ViewState::ReadFromSchemaManager {
                view: view.clone(),
                version: "v0".into(),
                last_transformed_at: 100,
            },
            ViewState::Invalidated { view: view.clone() },
            ViewState::NoData { view: view.clone() },
            waiting(view.clone(), &["db/A/p"]),
            transforming(view.clone(), 1),
            retrying(view.clone(), 1),
            ViewState::Materialized {
                view: view.clone(),
                transformation_ts: 100,
                with_errors: false,
                incomplete: false,
            },
            ViewState::Failed { view: view.clone() },
        ]
    }

    /// One event per kind.
    fn all_events() -> Vec<ViewEvent> {
        vec![
            ViewEvent::Materialize {
                mode: MaterializeMode::Default,
                requester: client(),
            },
            ViewEvent::Invalidate { requester: client() },
            ViewEvent::ViewMaterialized {
                dependency: "db/A/p".into(),
                transformation_ts: 200,
                with_errors: false,
                incomplete: false,
            },
            ViewEvent::ViewHasNoData {
                dependency: "db/A/p".into(),
            },
            ViewEvent::ViewFailed {
                dependency: "db/A/p".into(),
            },
            ViewEvent::TransformationSucceeded { has_data: true },
            ViewEvent::TransformationFailed,
            ViewEvent::Retry,
            ViewEvent::MetadataForMaterialize {
                version: Some("v7".into()),
                timestamp: 1_000,
                mode: MaterializeMode::Default,
                requester: client(),
            },
            ViewEvent::MetadataFetchFailed { requester: client() },
        ]
    }

    #[test]
    fn deterministic_over_every_state_event_cell() {
        let m = machine();
        let c = ctx();
        for state in all_states(&parent()) {
            for event in all_events() {
                let a = m.step(state.clone(), event.clone(), &c);
                let b = m.step(state.clone(), event.clone(), &c);
                assert_eq!(a, b, "state={} event={}", state.label(), event.as_label());
            }
        }
    }

    #[test]
    fn protocol_stragglers_are_noops() {
        let m = machine();
        let c = ctx();
        let view = leaf();

        // Retry outside Retrying.
        for state in [
            ViewState::Materialized {
                view: view.clone(),
                transformation_ts: 100,
                with_errors: false,
                incomplete: false,
            },
            ViewState::NoData { view: view.clone() },
            transforming(view.clone(), 0),
        ] {
            let out = m.step(state.clone(), ViewEvent::Retry, &c);
            assert_eq!(out, Transition::ignore(state));
        }

        // Executor completions without a transformation in flight.
        let resting = ViewState::Failed { view: view.clone() };
        let out = m.step(
            resting.clone(),
            ViewEvent::TransformationSucceeded { has_data: true },
            &c,
        );
        assert_eq!(out, Transition::ignore(resting.clone()));
        let out = m.step(resting.clone(), ViewEvent::TransformationFailed, &c);
        assert_eq!(out, Transition::ignore(resting));

        // Dependency response for an untracked dependency.
        let state = waiting(parent(), &["db/A/p"]);
        let out = m.step(
            state.clone(),
            ViewEvent::ViewHasNoData {
                dependency: "db/Z/p".into(),
            },
            &c,
        );
        assert_eq!(out, Transition::ignore(state));
    }

    #[test]
    fn invalidate_applies_from_resting_states() {
        let m = machine();
        let c = ctx();
        let view = leaf();
        for state in [
            ViewState::Materialized {
                view: view.clone(),
                transformation_ts: 100,
                with_errors: false,
                incomplete: false,
            },
            ViewState::NoData { view: view.clone() },
            ViewState::Failed { view: view.clone() },
            ViewState::CreatedFromScratch { view: view.clone() },
            ViewState::Invalidated { view: view.clone() },
        ] {
            let requester = client();
            let out = m.step(
                state,
                ViewEvent::Invalidate {
                    requester: requester.clone(),
                },
                &c,
            );
            assert_eq!(out.next, ViewState::Invalidated { view: view.clone() });
            assert_eq!(
                out.actions,
                vec![Action::ReportInvalidated {
                    listeners: vec![requester]
                }]
            );
        }
    }

    #[test]
    fn invalidate_is_rejected_in_flight() {
        let m = machine();
        let c = ctx();
        for state in [
            waiting(parent(), &["db/A/p"]),
            transforming(leaf(), 0),
            retrying(leaf(), 1),
        ] {
            let requester = client();
            let out = m.step(
                state.clone(),
                ViewEvent::Invalidate {
                    requester: requester.clone(),
                },
                &c,
            );
            assert_eq!(out.next, state);
            assert_eq!(
                out.actions,
                vec![Action::ReportNotInvalidated {
                    listeners: vec![requester]
                }]
            );
        }
    }

    #[test]
    fn materialize_fans_out_to_all_dependencies() {
        let m = machine();
        let requester = client();
        let out = m.step(
            ViewState::CreatedFromScratch { view: parent() },
            ViewEvent::Materialize {
                mode: MaterializeMode::Default,
                requester: requester.clone(),
            },
            &ctx(),
        );
        match &out.next {
            ViewState::Waiting {
                listeners,
                dependencies_materializing,
                one_dependency_returned_data,
                ..
            } => {
                assert_eq!(listeners, &vec![requester]);
                assert_eq!(dependencies_materializing.len(), 2);
                assert!(!one_dependency_returned_data);
            }
            other => panic!("expected waiting, got {}", other.label()),
        }
        assert_eq!(out.actions.len(), 2);
        assert!(out.actions.iter().all(|a| matches!(
            a,
            Action::Materialize {
                mode: MaterializeMode::Default,
                ..
            }
        )));
    }

    #[test]
    fn materialize_in_flight_only_enqueues_the_requester() {
        let m = machine();
        let c = ctx();
        for state in [
            waiting(parent(), &["db/A/p"]),
            transforming(leaf(), 0),
            retrying(leaf(), 2),
        ] {
            let requester = client();
            let out = m.step(
                state.clone(),
                ViewEvent::Materialize {
                    mode: MaterializeMode::Default,
                    requester: requester.clone(),
                },
                &c,
            );
            assert!(out.actions.is_empty());
            assert_eq!(out.next.label(), state.label());
            match out.next {
                ViewState::Waiting { listeners, .. }
                | ViewState::Transforming { listeners, .. }
                | ViewState::Retrying { listeners, .. } => {
                    assert_eq!(listeners.len(), 2);
                    assert_eq!(listeners[1], requester);
                }
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn repeated_requester_is_enqueued_once() {
        let m = machine();
        let c = ctx();
        let requester = Listener::View("db/Up/p".into());
        let state = waiting(parent(), &["db/A/p"]);
        let once = m.step(
            state,
            ViewEvent::Materialize {
                mode: MaterializeMode::Default,
                requester: requester.clone(),
            },
            &c,
        );
        let twice = m.step(
            once.next,
            ViewEvent::Materialize {
                mode: MaterializeMode::Default,
                requester,
            },
            &c,
        );
        match twice.next {
            ViewState::Waiting { listeners, .. } => assert_eq!(listeners.len(), 2),
            other => panic!("expected waiting, got {}", other.label()),
        }
    }

    #[test]
    fn sole_dependency_without_data_yields_no_data() {
        let m = machine();
        let state = waiting(parent(), &["db/A/p"]);
        let out = m.step(
            state,
            ViewEvent::ViewHasNoData {
                dependency: "db/A/p".into(),
            },
            &ctx(),
        );
        assert_eq!(out.next, ViewState::NoData { view: parent() });
        assert_eq!(out.actions.len(), 1);
        match &out.actions[0] {
            Action::ReportNoDataAvailable { listeners } => assert_eq!(listeners.len(), 1),
            other => panic!("expected no-data report, got {}", other.as_label()),
        }
    }

    #[test]
    fn fan_in_accumulates_flags_and_transforms() {
        let m = machine();
        let c = ctx();
        let state = waiting(parent(), &["db/A/p", "db/C/p"]);

        let mid = m.step(
            state,
            ViewEvent::ViewFailed {
                dependency: "db/A/p".into(),
            },
            &c,
        );
        assert!(mid.actions.is_empty());
        match &mid.next {
            ViewState::Waiting {
                with_errors,
                dependencies_materializing,
                ..
            } => {
                assert!(*with_errors);
                assert_eq!(dependencies_materializing.len(), 1);
            }
            other => panic!("expected waiting, got {}", other.label()),
        }

        let done = m.step(
            mid.next,
            ViewEvent::ViewMaterialized {
                dependency: "db/C/p".into(),
                transformation_ts: 900,
                with_errors: false,
                incomplete: true,
            },
            &c,
        );
        assert_eq!(done.actions, vec![Action::Transform]);
        match done.next {
            ViewState::Transforming {
                retry,
                with_errors,
                incomplete,
                ..
            } => {
                assert_eq!(retry, 0);
                assert!(with_errors, "dependency failure must persist");
                assert!(incomplete);
            }
            other => panic!("expected transforming, got {}", other.label()),
        }
    }

    #[test]
    fn fan_in_skips_the_transformation_when_nothing_changed() {
        let m = machine();
        // Stored checksum matches the code version and the stored timestamp
        // is newer than everything the dependencies produced.
        let c = ctx_stored("v1", 1_000);
        let state = waiting(parent(), &["db/A/p", "db/C/p"]);

        let mid = m.step(
            state,
            ViewEvent::ViewMaterialized {
                dependency: "db/A/p".into(),
                transformation_ts: 800,
                with_errors: false,
                incomplete: false,
            },
            &c,
        );
        let done = m.step(
            mid.next,
            ViewEvent::ViewMaterialized {
                dependency: "db/C/p".into(),
                transformation_ts: 900,
                with_errors: false,
                incomplete: false,
            },
            &c,
        );
        assert_eq!(
            done.next,
            ViewState::Materialized {
                view: parent(),
                transformation_ts: 1_000,
                with_errors: false,
                incomplete: false,
            }
        );
        assert_eq!(done.actions.len(), 1);
        assert!(matches!(
            done.actions[0],
            Action::ReportMaterialized {
                transformation_ts: 1_000,
                ..
            }
        ));
    }

    #[test]
    fn fan_in_transforms_when_a_dependency_is_fresher() {
        let m = machine();
        let c = ctx_stored("v1", 1_000);
        let state = waiting(parent(), &["db/A/p", "db/C/p"]);

        let mid = m.step(
            state,
            ViewEvent::ViewMaterialized {
                dependency: "db/A/p".into(),
                transformation_ts: 2_000,
                with_errors: false,
                incomplete: false,
            },
            &c,
        );
        let done = m.step(
            mid.next,
            ViewEvent::ViewMaterialized {
                dependency: "db/C/p".into(),
                transformation_ts: 900,
                with_errors: false,
                incomplete: false,
            },
            &c,
        );
        assert_eq!(done.actions, vec![Action::Transform]);
        assert_eq!(done.next.label(), "transforming");
    }

    #[test]
    fn dependencyless_view_is_fresh_or_transforms() {
        let m = machine();

        let fresh = m.step(
            ViewState::ReadFromSchemaManager {
                view: leaf(),
                version: "v1".into(),
                last_transformed_at: 1_000,
            },
            ViewEvent::Materialize {
                mode: MaterializeMode::Default,
                requester: client(),
            },
            &ctx_stored("v1", 1_000),
        );
        assert_eq!(fresh.next.label(), "materialized");
        assert_eq!(fresh.next.transformation_ts(), Some(1_000));

        let stale = m.step(
            ViewState::CreatedFromScratch { view: leaf() },
            ViewEvent::Materialize {
                mode: MaterializeMode::Default,
                requester: client(),
            },
            &ctx(),
        );
        assert_eq!(stale.actions, vec![Action::Transform]);
        assert_eq!(stale.next.label(), "transforming");
    }

    #[test]
    fn transformation_success_writes_metadata_and_reports() {
        let m = machine();
        let requester = client();
        let state = ViewState::Transforming {
            view: leaf(),
            listeners: vec![requester.clone()],
            retry: 2,
            with_errors: true,
            incomplete: false,
            mode: MaterializeMode::Default,
        };
        let out = m.step(state, ViewEvent::TransformationSucceeded { has_data: true }, &ctx());
        assert_eq!(
            out.next,
            ViewState::Materialized {
                view: leaf(),
                transformation_ts: NOW,
                with_errors: true,
                incomplete: false,
            }
        );
        assert_eq!(
            out.actions,
            vec![
                Action::WriteTransformationTimestamp { timestamp: NOW },
                Action::WriteTransformationChecksum,
                Action::TouchSuccessFlag,
                Action::ReportMaterialized {
                    listeners: vec![requester],
                    transformation_ts: NOW,
                    with_errors: true,
                    incomplete: false,
                },
            ]
        );
    }

    #[test]
    fn transformation_without_data_yields_no_data() {
        let m = machine();
        let out = m.step(
            transforming(leaf(), 0),
            ViewEvent::TransformationSucceeded { has_data: false },
            &ctx(),
        );
        assert_eq!(out.next, ViewState::NoData { view: leaf() });
        assert!(matches!(
            out.actions.as_slice(),
            [Action::ReportNoDataAvailable { .. }]
        ));
    }

    #[test]
    fn failures_below_the_cap_increment_retry_silently() {
        let m = machine();
        let c = ctx();
        for k in 0..MAX_RETRIES {
            let out = m.step(transforming(leaf(), k), ViewEvent::TransformationFailed, &c);
            assert!(out.actions.is_empty(), "retry transition emits nothing");
            match out.next {
                ViewState::Retrying { retry, .. } => assert_eq!(retry, k + 1),
                other => panic!("expected retrying, got {}", other.label()),
            }
        }
    }

    #[test]
    fn failure_at_the_cap_is_terminal() {
        let m = machine();
        let out = m.step(
            transforming(leaf(), MAX_RETRIES),
            ViewEvent::TransformationFailed,
            &ctx(),
        );
        assert_eq!(out.next, ViewState::Failed { view: leaf() });
        assert_eq!(out.actions.len(), 1);
        assert!(matches!(out.actions[0], Action::ReportFailed { .. }));
    }

    #[test]
    fn retry_resubmits_with_the_same_count() {
        let m = machine();
        let out = m.step(retrying(leaf(), 2), ViewEvent::Retry, &ctx());
        assert_eq!(out.actions, vec![Action::Transform]);
        match out.next {
            ViewState::Transforming { retry, .. } => assert_eq!(retry, 2),
            other => panic!("expected transforming, got {}", other.label()),
        }
    }

    #[test]
    fn with_errors_never_decreases_within_an_attempt() {
        let m = machine();
        let c = ctx();
        let mut state = waiting(parent(), &["db/A/p", "db/C/p"]);
        if let ViewState::Waiting { with_errors, .. } = &mut state {
            *with_errors = true;
        }
        let mid = m.step(
            state,
            ViewEvent::ViewMaterialized {
                dependency: "db/A/p".into(),
                transformation_ts: 100,
                with_errors: false,
                incomplete: false,
            },
            &c,
        );
        assert_eq!(mid.next.with_errors(), Some(true));
        let done = m.step(
            mid.next,
            ViewEvent::ViewMaterialized {
                dependency: "db/C/p".into(),
                transformation_ts: 100,
                with_errors: false,
                incomplete: false,
            },
            &c,
        );
        assert_eq!(done.next.with_errors(), Some(true));
    }

    #[test]
    fn external_materialize_round_trips_through_metadata() {
        let m = machine();
        let c = ctx();
        let ext = View::external("ext/X/p");
        let requester = client();

        let asked = m.step(
            ViewState::CreatedFromScratch { view: ext.clone() },
            ViewEvent::Materialize {
                mode: MaterializeMode::Default,
                requester: requester.clone(),
            },
            &c,
        );
        assert_eq!(asked.next, ViewState::CreatedFromScratch { view: ext.clone() });
        assert_eq!(
            asked.actions,
            vec![Action::FetchMetadata {
                mode: MaterializeMode::Default,
                requester: requester.clone(),
            }]
        );

        let answered = m.step(
            asked.next,
            ViewEvent::MetadataForMaterialize {
                version: Some("v7".into()),
                timestamp: 1_000,
                mode: MaterializeMode::Default,
                requester: requester.clone(),
            },
            &c,
        );
        assert_eq!(
            answered.next,
            ViewState::Materialized {
                view: ext.clone(),
                transformation_ts: 1_000,
                with_errors: false,
                incomplete: false,
            }
        );
        assert_eq!(
            answered.actions,
            vec![Action::ReportMaterialized {
                listeners: vec![requester],
                transformation_ts: 1_000,
                with_errors: false,
                incomplete: false,
            }]
        );

        let empty = m.step(
            ViewState::CreatedFromScratch { view: ext.clone() },
            ViewEvent::MetadataForMaterialize {
                version: None,
                timestamp: 0,
                mode: MaterializeMode::Default,
                requester: client(),
            },
            &c,
        );
        assert_eq!(empty.next, ViewState::NoData { view: ext });
    }

    #[test]
    fn metadata_fetch_failure_reports_failed_without_moving() {
        let m = machine();
        let ext = View::external("ext/X/p");
        let requester = client();
        let state = ViewState::CreatedFromScratch { view: ext };
        let out = m.step(
            state.clone(),
            ViewEvent::MetadataFetchFailed {
                requester: requester.clone(),
            },
            &ctx(),
        );
        assert_eq!(out.next, state);
        assert_eq!(
            out.actions,
            vec![Action::ReportFailed {
                listeners: vec![requester]
            }]
        );
    }

    #[test]
    fn no_op_view_follows_the_success_flag() {
        let m = machine();
        let no_op = View::new("db/Raw/p", "v1").without_transformation();

        let mut present = ctx();
        present.success_flag = Some(true);
        let out = m.step(
            ViewState::CreatedFromScratch { view: no_op.clone() },
            ViewEvent::Materialize {
                mode: MaterializeMode::Default,
                requester: client(),
            },
            &present,
        );
        assert_eq!(out.next.label(), "materialized");
        assert_eq!(out.next.transformation_ts(), Some(NOW));

        let mut missing = ctx();
        missing.success_flag = Some(false);
        let out = m.step(
            ViewState::CreatedFromScratch { view: no_op.clone() },
            ViewEvent::Materialize {
                mode: MaterializeMode::Default,
                requester: client(),
            },
            &missing,
        );
        assert_eq!(out.next, ViewState::NoData { view: no_op });
    }

    #[test]
    fn set_only_stamps_without_transforming() {
        let m = machine();
        let out = m.step(
            ViewState::CreatedFromScratch { view: parent() },
            ViewEvent::Materialize {
                mode: MaterializeMode::SetOnly,
                requester: client(),
            },
            &ctx(),
        );
        assert_eq!(out.next.label(), "materialized");
        assert_eq!(out.next.transformation_ts(), Some(NOW));
        assert!(matches!(
            out.actions.as_slice(),
            [
                Action::WriteTransformationTimestamp { timestamp: NOW },
                Action::WriteTransformationChecksum,
                Action::ReportMaterialized { .. },
            ]
        ));
    }

    #[test]
    fn transform_only_skips_the_dependency_fan_out() {
        let m = machine();
        let out = m.step(
            ViewState::CreatedFromScratch { view: parent() },
            ViewEvent::Materialize {
                mode: MaterializeMode::TransformOnly,
                requester: client(),
            },
            &ctx(),
        );
        assert_eq!(out.actions, vec![Action::Transform]);
        assert_eq!(out.next.label(), "transforming");
    }

    #[test]
    fn reset_checksums_realigns_instead_of_transforming() {
        let m = machine();
        // Checksum differs ("v0" vs "v1") but the stored timestamp is fresh.
        let c = ctx_stored("v0", 1_000);
        let state = waiting_with_mode(parent(), MaterializeMode::ResetTransformationChecksums);
        let mid = m.step(
            state,
            ViewEvent::ViewMaterialized {
                dependency: "db/A/p".into(),
                transformation_ts: 800,
                with_errors: false,
                incomplete: false,
            },
            &c,
        );
        let done = m.step(
            mid.next,
            ViewEvent::ViewMaterialized {
                dependency: "db/C/p".into(),
                transformation_ts: 900,
                with_errors: false,
                incomplete: false,
            },
            &c,
        );
        assert_eq!(done.next.label(), "materialized");
        assert!(matches!(
            done.actions.as_slice(),
            [
                Action::WriteTransformationChecksum,
                Action::ReportMaterialized { .. },
            ]
        ));
    }

    #[test]
    fn reset_checksums_and_timestamps_rewrites_both() {
        let m = machine();
        // Stale relative to the dependency, checksum differs: both rewritten,
        // no transformation.
        let c = ctx_stored("v0", 500);
        let state = waiting_with_mode(
            parent(),
            MaterializeMode::ResetTransformationChecksumsAndTimestamps,
        );
        let mid = m.step(
            state,
            ViewEvent::ViewMaterialized {
                dependency: "db/A/p".into(),
                transformation_ts: 800,
                with_errors: false,
                incomplete: false,
            },
            &c,
        );
        let done = m.step(
            mid.next,
            ViewEvent::ViewMaterialized {
                dependency: "db/C/p".into(),
                transformation_ts: 900,
                with_errors: false,
                incomplete: false,
            },
            &c,
        );
        assert_eq!(done.next.label(), "materialized");
        assert_eq!(done.next.transformation_ts(), Some(NOW));
        assert!(matches!(
            done.actions.as_slice(),
            [
                Action::WriteTransformationTimestamp { timestamp: NOW },
                Action::WriteTransformationChecksum,
                Action::ReportMaterialized { .. },
            ]
        ));
    }

    fn waiting_with_mode(view: View, mode: MaterializeMode) -> ViewState {
        ViewState::Waiting {
            view,
            listeners: vec![client()],
            dependencies_materializing: ["db/A/p", "db/C/p"].iter().map(|d| d.to_string()).collect(),
            one_dependency_returned_data: false,
            with_errors: false,
            incomplete: false,
            dependencies_freshest: 0,
            mode,
        }
    }
}
