//! Event hooks.
//!
//! [`HookRegistry`] maps event names to ordered lists of [`EventHandler`]s.
//! It is assembled once during setup and then shared, read-only, by every
//! [`Listener`](crate::listener::Listener) of the same kind via `Arc`.
//!
//! Each listener additionally owns an optional [`CatchAll`] handler invoked
//! for every dispatched event after the registry's handlers.

use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use futures::{FutureExt, future::BoxFuture};

use crate::{error::HandlerResult, message::Message, session::SessionHandle};

/// Boxed future returned by handlers.
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

type NotifyFn = dyn Fn(SessionHandle) -> HandlerFuture + Send + Sync;
type WithEventFn = dyn Fn(SessionHandle, Message) -> HandlerFuture + Send + Sync;

/// Handler bound to an event name.
#[derive(Clone)]
pub enum EventHandler {
    /// Invoked for its side effects only.
    Notify(Arc<NotifyFn>),
    /// Invoked with its own copy of the event.
    WithEvent(Arc<WithEventFn>),
}

impl EventHandler {
    /// Start the handler for `event`.
    ///
    /// `WithEvent` handlers receive a fresh clone; the caller's copy is
    /// never shared.
    #[must_use]
    pub fn invoke(&self, session: SessionHandle, event: &Message) -> HandlerFuture {
        match self {
            Self::Notify(f) => f(session),
            Self::WithEvent(f) => f(session, event.clone()),
        }
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notify(_) => f.write_str("Notify(..)"),
            Self::WithEvent(_) => f.write_str("WithEvent(..)"),
        }
    }
}

/// Per-listener handler invoked for every dispatched event.
pub type CatchAll = Arc<WithEventFn>;

/// Wrap an async closure as a [`CatchAll`] handler.
///
/// # Examples
///
/// ```
/// use eslframe::hooks::catch_all;
///
/// let handler = catch_all(|_session, event| async move {
///     tracing::info!(event = ?event.event_name(), "event");
///     Ok(())
/// });
/// # let _ = handler;
/// ```
pub fn catch_all<F, Fut>(handler: F) -> CatchAll
where
    F: Fn(SessionHandle, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |session, event| handler(session, event).boxed())
}

/// Event-name → handlers table.
///
/// Names are matched case-insensitively and exactly; there are no wildcards.
/// Registering several handlers under one name keeps all of them, and they
/// run in registration order.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use eslframe::hooks::HookRegistry;
///
/// let registry = HookRegistry::new()
///     .on("channel_answer", |session| async move {
///         session.api("uuid_record", "start").await?;
///         Ok(())
///     })
///     .on_event("channel_hangup", |_session, event| async move {
///         tracing::info!(cause = ?event.content_header("Hangup-Cause"), "hangup");
///         Ok(())
///     });
/// let shared = Arc::new(registry);
/// assert_eq!(shared.len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Vec<EventHandler>>,
}

impl HookRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register a handler that does not need the event itself.
    #[must_use]
    pub fn on<F, Fut>(self, event_name: &str, handler: F) -> Self
    where
        F: Fn(SessionHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: Arc<NotifyFn> = Arc::new(move |session| handler(session).boxed());
        self.register(event_name, EventHandler::Notify(handler))
    }

    /// Register a handler that receives its own copy of the event.
    #[must_use]
    pub fn on_event<F, Fut>(self, event_name: &str, handler: F) -> Self
    where
        F: Fn(SessionHandle, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: Arc<WithEventFn> =
            Arc::new(move |session, event| handler(session, event).boxed());
        self.register(event_name, EventHandler::WithEvent(handler))
    }

    /// Append an already-built handler under `event_name`.
    #[must_use]
    pub fn register(mut self, event_name: &str, handler: EventHandler) -> Self {
        self.hooks
            .entry(normalise(event_name))
            .or_default()
            .push(handler);
        self
    }

    /// Handlers registered for `event_name`, in registration order.
    #[must_use]
    pub fn handlers_for(&self, event_name: &str) -> &[EventHandler] {
        self.hooks
            .get(&normalise(event_name))
            .map_or(&[], Vec::as_slice)
    }

    /// Total number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize { self.hooks.values().map(Vec::len).sum() }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.hooks.is_empty() }

    /// Distinct event names with at least one handler, uppercased.
    pub fn event_names(&self) -> impl Iterator<Item = &str> { self.hooks.keys().map(String::as_str) }
}

/// Event identifiers are uppercase on the wire (`CHANNEL_ANSWER`).
fn normalise(event_name: &str) -> String { event_name.trim().to_ascii_uppercase() }

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: SessionHandle) -> HandlerFuture { async { Ok(()) }.boxed() }

    #[test]
    fn names_match_case_insensitively() {
        let registry = HookRegistry::new()
            .on("some_event", noop)
            .on("SOME_EVENT", noop)
            .on_event("Other_Event", |_s, _e| async { Ok(()) });
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.handlers_for("Some_Event").len(), 2);
        assert_eq!(registry.handlers_for("OTHER_EVENT").len(), 1);
        assert!(registry.handlers_for("THIRD_EVENT").is_empty());

        let mut names: Vec<_> = registry.event_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["OTHER_EVENT", "SOME_EVENT"]);
    }

    #[test]
    fn no_wildcard_matching() {
        let registry = HookRegistry::new().on("CHANNEL_*", noop);
        assert!(registry.handlers_for("CHANNEL_ANSWER").is_empty());
    }

    #[test]
    fn empty_registry() {
        let registry = HookRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
