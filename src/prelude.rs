//! Convenience imports for writing handlers and wiring listeners.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use eslframe::prelude::*;
//!
//! let registry = HookRegistry::new().on("channel_park", |session: SessionHandle| async move {
//!     session.command("log", "INFO parked").await?;
//!     Ok(())
//! });
//! let (_listener, _outbound) = Listener::new(Arc::new(registry), ListenerConfig::default());
//! ```

pub use crate::{
    command::Command,
    config::ListenerConfig,
    connection::{Connection, ConnectionError},
    correlation::ReplyFuture,
    error::{CommandError, HandlerError, HandlerResult, ListenerError},
    hooks::{HookRegistry, catch_all},
    listener::Listener,
    message::{Message, MessageKind},
    session::SessionHandle,
};
