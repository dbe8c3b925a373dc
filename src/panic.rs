//! Panic payload formatting for handlers that panic.
//!
//! Handler futures run under `catch_unwind`; the payload they leave behind is
//! an opaque `Box<dyn Any + Send>`. [`format_panic`] turns it into something
//! that can be logged and carried in
//! [`ListenerError::HandlerPanic`](crate::error::ListenerError::HandlerPanic).

use std::{any::Any, fmt};

/// Displayable wrapper around a panic payload.
///
/// `&'static str` and `String` payloads (what `panic!` produces) print as
/// their text; anything else prints as an opaque marker.
///
/// ```
/// use eslframe::panic::format_panic;
/// assert_eq!(format_panic(Box::new("boom")).to_string(), "boom");
/// assert_eq!(
///     format_panic(Box::new(String::from("bang"))).to_string(),
///     "bang"
/// );
/// assert_eq!(format_panic(Box::new(7_u8)).to_string(), "<non-string panic payload>");
/// ```
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl PanicMessage {
    /// Borrow the payload text, if it has one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| self.0.downcast_ref::<&'static str>().copied())
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("<non-string panic payload>"))
    }
}

impl fmt::Debug for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicMessage").field(&self.to_string()).finish()
    }
}

/// Create a [`PanicMessage`] for the given payload.
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(panic) }
