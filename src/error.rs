//! Canonical error types for the crate.
//!
//! [`CommandError`] is what a suspended command resolves with when it cannot
//! be answered. [`ListenerError`] covers correlation and handler failures
//! surfaced to the connection owner; only its `Framing` variant is fatal.

use thiserror::Error;

use crate::codec::CodecError;

/// Error returned by event handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by event handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Failure outcome of a command submission.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CommandError {
    /// The connection closed before the reply arrived, or was already
    /// closed when the command was submitted.
    #[error("connection closed before the command was answered")]
    Disconnected,
    /// The command text cannot be framed.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

/// Problems surfaced by a [`Listener`](crate::listener::Listener).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ListenerError {
    /// A reply arrived while no command was awaiting one. The peer and the
    /// engine no longer agree on which reply answers which command.
    #[error("unexpected {content_type} with no command in flight")]
    UnexpectedReply {
        /// Declared content type of the stray reply.
        content_type: String,
    },
    /// An event handler returned an error.
    #[error("handler for {event} failed: {source}")]
    Handler {
        /// Event the handler was invoked for.
        event: String,
        /// Error returned by the handler.
        #[source]
        source: HandlerError,
    },
    /// An event handler panicked.
    #[error("handler for {event} panicked: {message}")]
    HandlerPanic {
        /// Event the handler was invoked for.
        event: String,
        /// Formatted panic payload.
        message: String,
    },
    /// The connection closed while commands were still waiting for replies.
    #[error("connection closed with {pending} command(s) unanswered")]
    UnterminatedCommands {
        /// Number of in-flight and queued commands that were failed.
        pending: usize,
    },
    /// The inbound stream cannot be framed any more. Fatal.
    #[error(transparent)]
    Framing(#[from] CodecError),
}

impl ListenerError {
    /// Returns `true` when the connection cannot continue.
    #[must_use]
    pub fn is_fatal(&self) -> bool { matches!(self, Self::Framing(_)) }
}
