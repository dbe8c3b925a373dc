//! Listener configuration.

use crate::codec::{
    DEFAULT_MAX_BODY_LENGTH,
    DEFAULT_MAX_HEADER_LENGTH,
    EventSocketCodec,
    clamp_body_length,
    clamp_header_length,
};

const DEFAULT_READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Tunables for a [`Listener`](crate::listener::Listener).
///
/// # Examples
///
/// ```
/// use eslframe::config::ListenerConfig;
///
/// let config = ListenerConfig::default().max_body_length(2048);
/// assert_eq!(config.max_body_length_value(), 2048);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    max_body_length: usize,
    max_header_length: usize,
    read_buffer_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_body_length: DEFAULT_MAX_BODY_LENGTH,
            max_header_length: DEFAULT_MAX_HEADER_LENGTH,
            read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY,
        }
    }
}

impl ListenerConfig {
    /// Set the largest `Content-Length` the listener accepts.
    ///
    /// The value is clamped between 64 bytes and 16 MiB. A larger body is a
    /// fatal framing error.
    ///
    /// # Examples
    ///
    /// ```
    /// use eslframe::config::ListenerConfig;
    ///
    /// let config = ListenerConfig::default().max_body_length(1);
    /// assert_eq!(config.max_body_length_value(), 64);
    /// ```
    #[must_use]
    pub fn max_body_length(mut self, max_body_length: usize) -> Self {
        self.max_body_length = clamp_body_length(max_body_length);
        self
    }

    /// Set the largest header block the listener buffers while waiting for
    /// its terminating blank line.
    ///
    /// The value is clamped between 64 bytes and 1 MiB. A longer block is a
    /// fatal framing error.
    #[must_use]
    pub fn max_header_length(mut self, max_header_length: usize) -> Self {
        self.max_header_length = clamp_header_length(max_header_length);
        self
    }

    /// Set the initial capacity of the parse buffer.
    #[must_use]
    pub fn read_buffer_capacity(mut self, capacity: usize) -> Self {
        self.read_buffer_capacity = capacity;
        self
    }

    /// Return the configured body length limit.
    #[must_use]
    pub const fn max_body_length_value(&self) -> usize { self.max_body_length }

    /// Return the configured header block limit.
    #[must_use]
    pub const fn max_header_length_value(&self) -> usize { self.max_header_length }

    /// Return the configured parse buffer capacity.
    #[must_use]
    pub const fn read_buffer_capacity_value(&self) -> usize { self.read_buffer_capacity }

    /// Build a codec enforcing these limits.
    #[must_use]
    pub fn codec(&self) -> EventSocketCodec {
        EventSocketCodec::new(self.max_body_length).with_max_header_length(self.max_header_length)
    }
}
