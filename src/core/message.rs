//! # Inter-supervisor messages.
//!
//! [`CommandForView`] envelopes every message that targets a view supervisor.
//! `source` is the reporting view, so recipients can attribute a
//! `ViewMaterialized`/`ViewHasNoData`/`ViewFailed` to a specific dependency;
//! it is `None` for client requests and for messages a supervisor posts to
//! itself (executor completions, retry timers, metadata answers).
//!
//! ## Rules
//! - Inboxes are FIFO; a supervisor sees its envelopes in arrival order.
//! - Dependency responses without a `source` cannot be attributed and are
//!   dropped with a `RouterDropped` diagnostic.

use tokio::sync::mpsc;

use crate::views::{ClientRef, Listener, MaterializeMode};

/// Sending end of a supervisor inbox.
pub(crate) type Inbox = mpsc::UnboundedSender<CommandForView>;

/// Receiving end of a supervisor inbox.
pub(crate) type InboxReceiver = mpsc::UnboundedReceiver<CommandForView>;

/// Envelope for every message targeting a view supervisor.
#[derive(Clone, Debug)]
pub struct CommandForView {
    /// Reporting view, for dependency attribution.
    pub source: Option<String>,
    /// Target view identity.
    pub target: String,
    /// The command itself.
    pub command: ViewCommand,
}

impl CommandForView {
    /// Envelope without a source view (client requests, self-sends).
    pub fn to(target: impl Into<String>, command: ViewCommand) -> Self {
        Self {
            source: None,
            target: target.into(),
            command,
        }
    }

    /// Envelope attributed to a source view.
    pub fn from_view(
        source: impl Into<String>,
        target: impl Into<String>,
        command: ViewCommand,
    ) -> Self {
        Self {
            source: Some(source.into()),
            target: target.into(),
            command,
        }
    }
}

/// Commands a view supervisor accepts.
#[derive(Clone, Debug)]
pub enum ViewCommand {
    /// Ensure the target is up to date. The requester is either `client` or
    /// the envelope's source view.
    Materialize {
        mode: MaterializeMode,
        client: Option<ClientRef>,
    },
    /// Mark the target invalidated (acknowledged or rejected).
    Invalidate { client: Option<ClientRef> },
    /// The source dependency finished with data.
    ViewMaterialized {
        transformation_ts: u64,
        with_errors: bool,
        incomplete: bool,
    },
    /// The source dependency finished without data.
    ViewHasNoData,
    /// The source dependency failed terminally.
    ViewFailed,
    /// Executor completion (self-send by the executor adapter).
    TransformationSucceeded { has_data: bool },
    /// Executor failure (self-send by the executor adapter).
    TransformationFailed,
    /// Backoff timer fired (self-send by the retry timer).
    Retry,
    /// Metadata answer for an external view (self-send by the metadata
    /// adapter).
    MetadataForMaterialize {
        version: Option<String>,
        timestamp: u64,
        mode: MaterializeMode,
        requester: Listener,
    },
    /// Metadata fetch timed out or failed (self-send by the metadata
    /// adapter).
    MetadataFetchFailed { requester: Listener },
}

impl ViewCommand {
    /// Returns a short stable label for diagnostics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ViewCommand::Materialize { .. } => "materialize",
            ViewCommand::Invalidate { .. } => "invalidate",
            ViewCommand::ViewMaterialized { .. } => "view-materialized",
            ViewCommand::ViewHasNoData => "view-has-no-data",
            ViewCommand::ViewFailed => "view-failed",
            ViewCommand::TransformationSucceeded { .. } => "transformation-succeeded",
            ViewCommand::TransformationFailed => "transformation-failed",
            ViewCommand::Retry => "retry",
            ViewCommand::MetadataForMaterialize { .. } => "metadata-for-materialize",
            ViewCommand::MetadataFetchFailed { .. } => "metadata-fetch-failed",
        }
    }
}
