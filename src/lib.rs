#![doc(html_root_url = "https://docs.rs/eslframe/latest")]
//! Client-side engine for the event socket control protocol.
//!
//! The crate reassembles a byte stream into [`Message`]s, dispatches events
//! to registered hooks and serialises commands so that at most one awaits a
//! reply at any time. Handlers are async functions that can issue commands
//! through a [`SessionHandle`] and await the replies as ordinary values.
//!
//! [`Listener`] is transport-agnostic: feed it bytes and drain its
//! [`Outbound`](outbound::Outbound) stream. [`Connection`] drives one over a
//! Tokio stream.

pub mod codec;
pub mod command;
pub mod config;
pub mod connection;
pub mod correlation;
pub mod error;
pub mod hooks;
pub mod listener;
pub mod message;
pub mod metrics;
pub mod outbound;
pub mod panic;
pub mod prelude;
pub mod session;

pub use codec::{CodecError, EventSocketCodec, FrameParser};
pub use command::Command;
pub use config::ListenerConfig;
pub use connection::{Connection, ConnectionError};
pub use error::{CommandError, HandlerError, HandlerResult, ListenerError};
pub use hooks::{CatchAll, EventHandler, HookRegistry};
pub use listener::Listener;
pub use message::{ContentType, Headers, Message, MessageKind};
pub use metrics::{
    COMMANDS_TOTAL,
    CONNECTIONS_ACTIVE,
    Direction,
    ERRORS_TOTAL,
    FRAMES_PROCESSED,
    HANDLER_PANICS,
};
pub use session::SessionHandle;
