//! Command facade handed to event handlers.
//!
//! A [`SessionHandle`] is a cheap, cloneable view of one connection's
//! command queue. Handlers use it to issue commands and await their replies
//! as ordinary return values:
//!
//! ```rust,no_run
//! use eslframe::{SessionHandle, error::HandlerResult};
//!
//! async fn on_answer(session: SessionHandle) -> HandlerResult {
//!     let status = session.api("status", "").await?;
//!     session.command("log", &format!("INFO {}", status.body_lossy())).await?;
//!     Ok(())
//! }
//! ```

use bytes::Bytes;

use crate::{
    command::Command,
    correlation::{CommandQueue, ReplyFuture},
    error::CommandError,
};

/// Handle used to talk to the peer of a single connection.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    commands: CommandQueue,
}

impl SessionHandle {
    pub(crate) fn new(commands: CommandQueue) -> Self { Self { commands } }

    /// Queue an arbitrary command and await its reply.
    pub fn send(&self, command: impl Into<Command>) -> ReplyFuture {
        self.commands.submit(&command.into())
    }

    /// Run `api <command> <args>`; the reply body holds the command output.
    pub fn api(&self, command: &str, args: &str) -> ReplyFuture {
        self.send(Command::api(command, args))
    }

    /// Run `bgapi <command> <args>`; the reply carries the `Job-UUID`.
    pub fn bgapi(&self, command: &str, args: &str) -> ReplyFuture {
        self.send(Command::bgapi(command, args))
    }

    /// Run `<name> <args>`.
    pub fn command(&self, name: &str, args: &str) -> ReplyFuture {
        self.send(Command::new(name, args))
    }

    /// Write raw bytes to the peer, bypassing the command queue.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Disconnected`] if the transport is gone.
    pub fn send_data(&self, data: impl Into<Bytes>) -> Result<(), CommandError> {
        self.commands
            .sink()
            .write(data.into())
            .map_err(|_| CommandError::Disconnected)
    }

    /// Number of commands awaiting replies on this connection.
    #[must_use]
    pub fn outstanding_commands(&self) -> usize { self.commands.outstanding() }

    /// Returns `true` once the connection has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.commands.is_closed() }
}
