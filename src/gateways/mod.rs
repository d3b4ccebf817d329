//! External collaborator seams: the transformation executor and the metadata
//! store.
//!
//! The scheduler core performs no I/O of its own. Everything it needs from
//! the outside world goes through these traits, and the internal adapters
//! convert every failure into a typed inbox message so the state machine is
//! the sole decider of retry, propagation, or terminal failure.
//!
//! ## Contents
//! - [`TransformationExecutor`], [`ExecutorError`] — submit/touch/probe
//! - [`MetadataStore`], [`MetadataError`], [`ViewMetadata`],
//!   [`CheckVersionResult`] — registry reads and fire-and-forget writes

mod adapter;
mod executor;
mod metadata;

pub use executor::{ExecutorError, TransformationExecutor};
pub use metadata::{CheckVersionResult, MetadataError, MetadataStore, ViewMetadata};

pub(crate) use adapter::Gateways;
