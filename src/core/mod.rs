//! Runtime core: routing, supervision, and the scheduler facade.
//!
//! The only public API re-exported from here is [`Scheduler`] (plus the
//! message envelope and the backoff policy, which appear in its interfaces).
//! Everything else is an internal building block the facade wires together.
//!
//! ## Files & responsibilities
//! - **scheduler.rs**: public facade; owns the runtime (Bus, SubscriberSet,
//!   Router, gateway handles, CancellationToken), mints per-request client
//!   handles, drives shutdown.
//! - **router.rs**: `url_path → inbox` map; lazy bootstrap from metadata;
//!   buffers envelopes for supervisors still bootstrapping and drains them in
//!   arrival order.
//! - **supervisor.rs**: per-view loop: classify envelope → pure machine step
//!   → publish status events → dispatch actions → arm retry timers.
//! - **message.rs**: the `CommandForView` envelope and `ViewCommand` set.
//! - **backoff.rs**: capped `2^retry`-seconds delay computation.
//!
//! ## Message data-plane (who sends what, and to whom)
//!
//! Into supervisor inboxes:
//! - **Scheduler** → `Materialize{client}` / `Invalidate{client}`
//! - **Peer supervisors** → `Materialize` (fan-out, source = requesting view),
//!   `ViewMaterialized` / `ViewHasNoData` / `ViewFailed` (fan-in, source =
//!   reporting dependency)
//! - **Executor adapter** → `TransformationSucceeded` / `TransformationFailed`
//! - **Metadata adapter** → `MetadataForMaterialize` / `MetadataFetchFailed`
//! - **Retry timers** → `Retry`
//!
//! Onto the bus (consumed by the fan-out listener → `SubscriberSet`):
//! - **ViewSupervisor** → `StateChanged`, `ActionsScheduled`, `RouterDropped`
//! - **SubscriberSet workers** → `SubscriberOverflow`, `SubscriberPanicked`
//!
//! ## Wiring (module-level flow)
//! ```text
//! Scheduler::materialize(path)
//!   └─ router.forward(CommandForView{target: path, Materialize{client}})
//!        ├─ known supervisor → inbox
//!        └─ first reference  → buffer + bootstrap (metadata) + spawn supervisor
//!
//! ViewSupervisor::run()  (one task per view)
//! loop {
//!   receive envelope (FIFO; optional global permit)
//!   machine.step(state, event, ctx) → (state', actions)
//!   publish StateChanged / ActionsScheduled
//!   dispatch: peers ◄─ Materialize/Report*, executor ◄─ Transform,
//!             metadata ◄─ writes/fetches, self ◄─ Retry (delayed)
//! }
//! ```
//!
//! ## Shutdown timeline
//! ```text
//! Scheduler::shutdown() → token.cancel()
//! → every supervisor breaks after its current message
//! → fan-out listener exits → SubscriberSet workers drain and exit
//! ```

mod backoff;
pub(crate) mod message;
mod router;
mod scheduler;
mod supervisor;

pub use backoff::BackoffPolicy;
pub use message::{CommandForView, ViewCommand};
pub use scheduler::{OutcomeReceiver, Scheduler};

pub(crate) use scheduler::SupervisorContext;
