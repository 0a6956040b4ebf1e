//! Error types for resource locking operations.

use thiserror::Error;

use crate::traits::ConnectionId;

/// Errors that can occur while handling lock traffic.
///
/// Busy, enqueued and impossible locks are not errors: they travel back to the
/// client as an [`AnswerStatus`](crate::message::AnswerStatus).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlomError {
    /// Resource name is malformed, or does not match the resource the
    /// connection is bound to.
    #[error("invalid resource name: {0}")]
    InvalidResourceName(String),

    /// Timestamp format has no specifier that changes at least once per hour,
    /// or contains an unknown specifier.
    #[error("invalid timestamp format: {0}")]
    InvalidTimestampFormat(String),

    /// Request is not acceptable in the current connection state.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Internal state is inconsistent; this is a bug, not a runtime condition.
    #[error("internal error: {0}")]
    Internal(String),

    /// An answer could not be handed to the transport layer.
    #[error("unable to deliver answer to connection {connection}: {reason}")]
    Delivery {
        connection: ConnectionId,
        reason: String,
    },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for resource locking operations.
pub type FlomResult<T> = Result<T, FlomError>;
