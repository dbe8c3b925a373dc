//! FIFO correlation of commands with their replies.
//!
//! The peer answers commands strictly in the order it receives them and
//! replies carry no identifier tying them to a command. [`CommandQueue`]
//! therefore keeps at most one command on the wire: the next queued command
//! is written only once the reply for the in-flight one has been handed to
//! its caller. The oldest outstanding command is always the one resolved.
//!
//! Callers hold a [`ReplyFuture`]. Awaiting it suspends only the calling
//! task; the listener keeps parsing and dispatching events meanwhile.

use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::{
    command::Command,
    error::CommandError,
    message::Message,
    metrics,
    outbound::OutboundSink,
};

type ReplySender = oneshot::Sender<Result<Message, CommandError>>;

/// A submitted command awaiting its reply.
#[derive(Debug)]
struct PendingCommand {
    line: String,
    payload: Bytes,
    reply_tx: ReplySender,
}

impl PendingCommand {
    fn fail(self, error: CommandError) {
        tracing::debug!(command = %self.line, %error, "failing pending command");
        // The caller may have dropped its future; nothing to report then.
        let _ = self.reply_tx.send(Err(error));
    }
}

#[derive(Debug, Default)]
struct QueueState {
    in_flight: Option<PendingCommand>,
    waiting: VecDeque<PendingCommand>,
    closed: bool,
}

/// Per-connection queue enforcing a single in-flight command.
///
/// Clones share the same queue.
#[derive(Clone, Debug)]
pub struct CommandQueue {
    state: Arc<Mutex<QueueState>>,
    sink: OutboundSink,
}

/// Returned by [`CommandQueue::resolve`] when no command is in flight.
#[derive(Debug)]
pub struct UnexpectedReply(pub Message);

impl CommandQueue {
    /// Create an empty queue writing commands to `sink`.
    #[must_use]
    pub fn new(sink: OutboundSink) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            sink,
        }
    }

    /// Queue `command` and return a future resolving to its reply.
    ///
    /// The command is written immediately when the queue is idle, otherwise
    /// after every earlier command has been answered. Submission happens
    /// eagerly: dropping the returned future does not withdraw the command,
    /// its reply is consumed and discarded when it arrives.
    pub fn submit(&self, command: &Command) -> ReplyFuture {
        let payload = match command.to_bytes() {
            Ok(payload) => payload,
            Err(e) => return ReplyFuture::failed(CommandError::InvalidCommand(e.to_string())),
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        let pending = PendingCommand {
            line: command.line().to_owned(),
            payload,
            reply_tx,
        };

        let mut state = self.lock();
        if state.closed {
            drop(state);
            pending.fail(CommandError::Disconnected);
            return ReplyFuture::new(reply_rx);
        }
        if state.in_flight.is_some() {
            tracing::debug!(
                command = %pending.line,
                queued = state.waiting.len() + 1,
                "command queued behind in-flight command"
            );
            state.waiting.push_back(pending);
        } else {
            match self.write(pending) {
                Ok(sent) => state.in_flight = Some(sent),
                Err(unsent) => {
                    drop(state);
                    unsent.fail(CommandError::Disconnected);
                }
            }
        }
        ReplyFuture::new(reply_rx)
    }

    /// Hand `reply` to the oldest outstanding command and put the next queued
    /// command on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`UnexpectedReply`] carrying the reply when no command is in
    /// flight.
    pub fn resolve(&self, reply: Message) -> Result<(), UnexpectedReply> {
        let mut state = self.lock();
        let Some(answered) = state.in_flight.take() else {
            return Err(UnexpectedReply(reply));
        };
        tracing::debug!(command = %answered.line, "reply received");
        if answered.reply_tx.send(Ok(reply)).is_err() {
            tracing::debug!(command = %answered.line, "reply discarded; caller went away");
        }

        let mut failed = Vec::new();
        while let Some(next) = state.waiting.pop_front() {
            match self.write(next) {
                Ok(sent) => {
                    state.in_flight = Some(sent);
                    break;
                }
                Err(unsent) => failed.push(unsent),
            }
        }
        drop(state);
        for pending in failed {
            pending.fail(CommandError::Disconnected);
        }
        Ok(())
    }

    /// Fail every in-flight and queued command with
    /// [`CommandError::Disconnected`] and reject later submissions.
    ///
    /// Returns the number of commands that were failed.
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let pending: Vec<_> = state
            .in_flight
            .take()
            .into_iter()
            .chain(state.waiting.drain(..))
            .collect();
        drop(state);
        let count = pending.len();
        for command in pending {
            command.fail(CommandError::Disconnected);
        }
        count
    }

    /// Returns `true` when no command is in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool { self.lock().in_flight.is_none() }

    /// Number of commands submitted but not yet answered, including the
    /// in-flight one.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        let state = self.lock();
        usize::from(state.in_flight.is_some()) + state.waiting.len()
    }

    /// Returns `true` once [`CommandQueue::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.lock().closed }

    /// Raw access to the outbound stream, bypassing the queue.
    pub(crate) fn sink(&self) -> &OutboundSink { &self.sink }

    fn write(&self, pending: PendingCommand) -> Result<PendingCommand, PendingCommand> {
        if self.sink.write(pending.payload.clone()).is_err() {
            tracing::warn!(command = %pending.line, "outbound stream closed; command not sent");
            return Err(pending);
        }
        metrics::inc_commands();
        tracing::debug!(command = %pending.line, "command sent");
        Ok(pending)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Future resolving to the reply of a submitted command.
#[derive(Debug)]
#[must_use = "the command is already queued; await the future to read its reply"]
pub struct ReplyFuture {
    state: ReplyState,
}

#[derive(Debug)]
enum ReplyState {
    Waiting(oneshot::Receiver<Result<Message, CommandError>>),
    Failed(Option<CommandError>),
}

impl ReplyFuture {
    fn new(rx: oneshot::Receiver<Result<Message, CommandError>>) -> Self {
        Self {
            state: ReplyState::Waiting(rx),
        }
    }

    fn failed(error: CommandError) -> Self {
        Self {
            state: ReplyState::Failed(Some(error)),
        }
    }
}

impl Future for ReplyFuture {
    type Output = Result<Message, CommandError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            ReplyState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(CommandError::Disconnected))),
            ReplyState::Failed(error) => {
                Poll::Ready(Err(error.take().unwrap_or(CommandError::Disconnected)))
            }
        }
    }
}
