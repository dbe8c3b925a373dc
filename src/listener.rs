//! Per-connection orchestrator.
//!
//! A [`Listener`] turns inbound bytes into [`Message`]s, routes each one to
//! either the event hooks or the command queue, and runs the handler tasks
//! that dispatch starts.
//!
//! Handlers are futures. Each is polled once as soon as it is started, in
//! registration order, so everything a handler does before its first
//! `.await` on a reply happens before the next handler runs. A handler that
//! awaits a reply is parked and resumed when that reply is routed in, while
//! events keep flowing to other handlers. All of this happens on the caller's
//! thread inside [`Listener::receive_data`]; no runtime is required.
//!
//! ```
//! use std::sync::Arc;
//!
//! use eslframe::{config::ListenerConfig, hooks::HookRegistry, listener::Listener};
//!
//! let registry = Arc::new(HookRegistry::new().on("heartbeat", |session| async move {
//!     session.send_data("pong")?;
//!     Ok(())
//! }));
//! let (mut listener, mut outbound) = Listener::new(registry, ListenerConfig::default());
//! listener.receive_data(b"Content-Type: auth/request\n\n")?;
//! listener.receive_data(b"Event-Name: HEARTBEAT\n\n")?;
//! assert_eq!(outbound.try_recv().as_deref(), Some(&b"pong"[..]));
//! # Ok::<(), eslframe::error::ListenerError>(())
//! ```

use std::{
    any::Any,
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
};

use futures::{
    FutureExt,
    StreamExt,
    future::{BoxFuture, poll_fn},
    stream::FuturesUnordered,
    task::{ArcWake, noop_waker_ref, waker_ref},
};

use crate::{
    codec::FrameParser,
    config::ListenerConfig,
    correlation::{CommandQueue, UnexpectedReply},
    error::{HandlerResult, ListenerError},
    hooks::{CatchAll, HandlerFuture, HookRegistry},
    message::{CONTENT_TYPE, Message, MessageKind},
    metrics::{self, Direction},
    outbound::{self, Outbound},
    panic::format_panic,
    session::SessionHandle,
};

/// Consecutive self-wakes tolerated while draining handlers synchronously.
/// Anything still runnable afterwards is left to [`Listener::drive_handlers`].
const MAX_YIELD_ROUNDS: usize = 64;

type ErrorHandler = Box<dyn FnMut(&ListenerError) + Send>;
type HandlerTask = BoxFuture<'static, HandlerOutcome>;

struct HandlerOutcome {
    event: String,
    result: Result<HandlerResult, Box<dyn Any + Send>>,
}

/// Records whether a parked handler asked to be polled again.
#[derive(Default)]
struct WakeFlag(AtomicBool);

impl WakeFlag {
    fn take(&self) -> bool { self.0.swap(false, Ordering::AcqRel) }
}

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) { arc_self.0.store(true, Ordering::Release); }
}

/// Protocol engine for one connection.
pub struct Listener {
    registry: Arc<HookRegistry>,
    config: ListenerConfig,
    parser: FrameParser,
    commands: CommandQueue,
    session: SessionHandle,
    catch_all: Option<CatchAll>,
    error_handler: Option<ErrorHandler>,
    session_data: Option<Message>,
    last_message: Option<Message>,
    last_event: Option<Message>,
    handlers: FuturesUnordered<HandlerTask>,
    wake_flag: Arc<WakeFlag>,
}

impl Listener {
    /// Create a listener sharing `registry` with its siblings.
    ///
    /// Returns the listener together with the stream of bytes it wants
    /// written to the peer.
    #[must_use]
    pub fn new(registry: Arc<HookRegistry>, config: ListenerConfig) -> (Self, Outbound) {
        let (sink, outbound) = outbound::channel();
        let commands = CommandQueue::new(sink);
        let listener = Self {
            registry,
            config,
            parser: FrameParser::with_codec(config.codec(), config.read_buffer_capacity_value()),
            session: SessionHandle::new(commands.clone()),
            commands,
            catch_all: None,
            error_handler: None,
            session_data: None,
            last_message: None,
            last_event: None,
            handlers: FuturesUnordered::new(),
            wake_flag: Arc::new(WakeFlag::default()),
        };
        (listener, outbound)
    }

    /// Install the handler run for every dispatched event, after the
    /// registry's handlers. Replaces any previous one.
    pub fn set_catch_all(&mut self, handler: CatchAll) { self.catch_all = Some(handler); }

    /// Remove the catch-all handler.
    pub fn clear_catch_all(&mut self) { self.catch_all = None; }

    /// Install the callback receiving recoverable errors: stray replies,
    /// handler failures and unanswered commands at close.
    pub fn set_error_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&ListenerError) + Send + 'static,
    {
        self.error_handler = Some(Box::new(handler));
    }

    /// Command facade for code outside the handlers.
    #[must_use]
    pub fn session(&self) -> SessionHandle { self.session.clone() }

    /// Configuration this listener was built with.
    #[must_use]
    pub fn config(&self) -> ListenerConfig { self.config }

    /// Hooks shared by this listener.
    #[must_use]
    pub fn registry(&self) -> &Arc<HookRegistry> { &self.registry }

    /// Feed raw bytes from the transport.
    ///
    /// Every frame they complete is routed, in arrival order, before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Framing`] when the stream cannot be framed
    /// any more. Frames completed before the error have been routed.
    pub fn receive_data(&mut self, data: &[u8]) -> Result<(), ListenerError> {
        self.parser.push_bytes(data);
        while let Some(frame) = self.parser.next_frame() {
            match frame {
                Ok(message) => self.receive_message(message),
                Err(e) => {
                    metrics::inc_errors();
                    tracing::warn!(error = %e, "inbound stream cannot be framed");
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Signal that the transport has no more bytes, then [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Framing`] when the stream ended inside a
    /// frame. The listener is closed either way.
    pub fn receive_eof(&mut self) -> Result<(), ListenerError> {
        let tail = self.parser.finish();
        let result = match tail {
            Ok(Some(message)) => {
                self.receive_message(message);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                metrics::inc_errors();
                tracing::warn!(error = %e, "transport closed inside a frame");
                self.parser.reset();
                Err(e.into())
            }
        };
        self.close();
        result
    }

    /// Route one already-framed message.
    ///
    /// The first message establishes the session and is stored. It is not
    /// dispatched, and it only resolves a command when one is already in
    /// flight and the frame is declared as a reply, as with the answer to
    /// `connect`. After that, events are dispatched and replies resolve the
    /// oldest outstanding command. Handlers woken by this message run before
    /// it returns.
    pub fn receive_message(&mut self, message: Message) {
        metrics::inc_frames(Direction::Inbound);
        self.last_message = Some(message.clone());
        if self.session_data.is_none() {
            self.session_data = Some(message.clone());
            let answers_command = message.declares_reply() && self.commands.outstanding() > 0;
            tracing::debug!(
                headers = message.headers().len(),
                answers_command,
                "session established"
            );
            if answers_command {
                self.correlate(message);
                self.run_until_stalled();
            }
            return;
        }
        match message.kind() {
            MessageKind::Event => self.dispatch(message),
            MessageKind::CommandReply | MessageKind::ApiReply => self.correlate(message),
            MessageKind::Notice => {
                tracing::debug!(
                    content_type = message.header(CONTENT_TYPE).unwrap_or_default(),
                    "notice received"
                );
            }
        }
        self.run_until_stalled();
    }

    /// Fail every outstanding command with
    /// [`CommandError::Disconnected`](crate::error::CommandError::Disconnected)
    /// and let the handlers waiting on them finish.
    ///
    /// Commands submitted afterwards fail immediately. Returns the number of
    /// commands that were unanswered.
    pub fn close(&mut self) -> usize {
        let pending = self.commands.close();
        if pending > 0 {
            self.raise(ListenerError::UnterminatedCommands { pending });
        }
        self.run_until_stalled();
        pending
    }

    /// Frame that established the session, if any.
    #[must_use]
    pub fn session_data(&self) -> Option<&Message> { self.session_data.as_ref() }

    /// Returns `true` once the first frame has arrived.
    #[must_use]
    pub fn is_session_established(&self) -> bool { self.session_data.is_some() }

    /// Most recently parsed frame. Handlers never see this instance.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> { self.last_message.as_ref() }

    /// Most recently dispatched event.
    #[must_use]
    pub fn last_event(&self) -> Option<&Message> { self.last_event.as_ref() }

    /// Number of handlers parked on a reply or other wakeup.
    #[must_use]
    pub fn pending_handlers(&self) -> usize { self.handlers.len() }

    /// Returns `true` while any handler is parked.
    #[must_use]
    pub fn has_pending_handlers(&self) -> bool { !self.handlers.is_empty() }

    /// Number of commands awaiting replies.
    #[must_use]
    pub fn outstanding_commands(&self) -> usize { self.commands.outstanding() }

    /// Wait until at least one parked handler finishes.
    ///
    /// Handlers normally advance inside [`receive_data`](Self::receive_data).
    /// Drivers call this so that handlers woken by something other than an
    /// inbound frame, such as a timer, also make progress. Never completes
    /// while no handler is parked.
    pub async fn drive_handlers(&mut self) { poll_fn(|cx| self.poll_handlers(cx)).await; }

    /// Poll parked handlers with `cx`, reporting any that finish.
    pub fn poll_handlers(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let mut finished = false;
        loop {
            match self.handlers.poll_next_unpin(cx) {
                Poll::Ready(Some(outcome)) => {
                    finished = true;
                    self.report(outcome);
                }
                Poll::Ready(None) | Poll::Pending if finished => return Poll::Ready(()),
                Poll::Ready(None) | Poll::Pending => return Poll::Pending,
            }
        }
    }

    fn dispatch(&mut self, event: Message) {
        let name = event.event_name().unwrap_or_default().to_owned();
        self.last_event = Some(event.clone());
        let registry = Arc::clone(&self.registry);
        let handlers = registry.handlers_for(&name);
        tracing::debug!(
            event = %name,
            handlers = handlers.len(),
            catch_all = self.catch_all.is_some(),
            "dispatching event"
        );
        for handler in handlers {
            self.start(&name, |session| handler.invoke(session, &event));
        }
        if let Some(catch_all) = self.catch_all.clone() {
            self.start(&name, |session| catch_all(session, event));
        }
    }

    fn correlate(&mut self, reply: Message) {
        if let Err(UnexpectedReply(stray)) = self.commands.resolve(reply) {
            let content_type = stray.header(CONTENT_TYPE).unwrap_or("<none>").to_owned();
            self.raise(ListenerError::UnexpectedReply { content_type });
        }
    }

    /// Create a handler future and poll it once.
    fn start(&mut self, event: &str, invoke: impl FnOnce(SessionHandle) -> HandlerFuture) {
        let session = self.session.clone();
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| invoke(session))) {
            Ok(future) => future,
            Err(payload) => {
                self.report(HandlerOutcome {
                    event: event.to_owned(),
                    result: Err(payload),
                });
                return;
            }
        };
        let event = event.to_owned();
        let mut task: HandlerTask = async move {
            let result = AssertUnwindSafe(future).catch_unwind().await;
            HandlerOutcome { event, result }
        }
        .boxed();

        let mut cx = Context::from_waker(noop_waker_ref());
        match task.poll_unpin(&mut cx) {
            Poll::Ready(outcome) => self.report(outcome),
            // Queued tasks are polled again with a real waker.
            Poll::Pending => self.handlers.push(task),
        }
    }

    /// Resume every parked handler that can make progress right now.
    fn run_until_stalled(&mut self) {
        let flag = Arc::clone(&self.wake_flag);
        let waker = waker_ref(&flag);
        let mut cx = Context::from_waker(&waker);
        let mut yield_rounds = 0;
        while !self.handlers.is_empty() {
            flag.take();
            match self.handlers.poll_next_unpin(&mut cx) {
                Poll::Ready(Some(outcome)) => {
                    yield_rounds = 0;
                    self.report(outcome);
                }
                Poll::Ready(None) => break,
                Poll::Pending if flag.take() && yield_rounds < MAX_YIELD_ROUNDS => {
                    yield_rounds += 1;
                }
                Poll::Pending => break,
            }
        }
    }

    fn report(&mut self, outcome: HandlerOutcome) {
        let HandlerOutcome { event, result } = outcome;
        let error = match result {
            Ok(Ok(())) => {
                tracing::trace!(event = %event, "handler finished");
                return;
            }
            Ok(Err(source)) => ListenerError::Handler { event, source },
            Err(payload) => {
                metrics::inc_handler_panics();
                ListenerError::HandlerPanic {
                    event,
                    message: format_panic(payload).to_string(),
                }
            }
        };
        self.raise(error);
    }

    fn raise(&mut self, error: ListenerError) {
        metrics::inc_errors();
        tracing::warn!(error = %error, "listener error");
        if let Some(handler) = self.error_handler.as_mut() {
            handler(&error);
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("hooks", &self.registry.len())
            .field("buffered", &self.parser.buffered())
            .field("session_established", &self.is_session_established())
            .field("outstanding_commands", &self.commands.outstanding())
            .field("pending_handlers", &self.handlers.len())
            .field("catch_all", &self.catch_all.is_some())
            .finish_non_exhaustive()
    }
}
