//! Framing for the event socket wire format.
//!
//! Each inbound frame is a block of `Name: value` lines terminated by a blank
//! line, optionally followed by exactly `Content-Length` body bytes:
//!
//! ```text
//! Content-Type: api/response
//! Content-Length: 4
//!
//! +YAY
//! ```
//!
//! [`EventSocketCodec`] implements Tokio's [`Decoder`] and [`Encoder`] so it
//! can drive a `FramedRead`/`FramedWrite` pair directly. [`FrameParser`]
//! wraps the same decoder behind a push-style [`FrameParser::feed`] for
//! callers that receive raw byte chunks from their own transport.
//!
//! # Error Handling
//!
//! Malformed header lines are skipped, and a frame whose body has not fully
//! arrived is held back until it has. The only framing errors are an
//! oversized header block or body, which desynchronise the stream, and a
//! premature EOF. See the [`error`] module.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    command::Command,
    message::{Headers, Message},
};

pub mod error;

pub use error::{CodecError, EofError, FramingError};

/// Minimum accepted body length limit in bytes.
pub const MIN_BODY_LENGTH: usize = 64;

/// Maximum accepted body length limit in bytes (16 MiB).
pub const MAX_BODY_LENGTH: usize = 16 * 1024 * 1024;

/// Default body length limit (8 MiB).
pub const DEFAULT_MAX_BODY_LENGTH: usize = 8 * 1024 * 1024;

/// Minimum accepted header block limit in bytes.
pub const MIN_HEADER_LENGTH: usize = 64;

/// Maximum accepted header block limit in bytes (1 MiB).
pub const MAX_HEADER_LENGTH: usize = 1024 * 1024;

/// Default header block limit (64 KiB).
pub const DEFAULT_MAX_HEADER_LENGTH: usize = 64 * 1024;

pub(crate) fn clamp_body_length(value: usize) -> usize {
    value.clamp(MIN_BODY_LENGTH, MAX_BODY_LENGTH)
}

pub(crate) fn clamp_header_length(value: usize) -> usize {
    value.clamp(MIN_HEADER_LENGTH, MAX_HEADER_LENGTH)
}

/// Decoder progress through the current frame.
#[derive(Debug)]
enum DecodeState {
    /// Scanning for the blank line ending the header block. Bytes before
    /// `scanned` are known not to end it.
    AwaitingHeaders { scanned: usize },
    /// Header block consumed; waiting for `expected` body bytes.
    AwaitingBody { headers: Headers, expected: usize },
}

impl Default for DecodeState {
    fn default() -> Self { Self::AwaitingHeaders { scanned: 0 } }
}

/// Tokio codec for event socket frames.
///
/// Decoding yields [`Message`] values; encoding accepts [`Command`] values.
#[derive(Debug)]
pub struct EventSocketCodec {
    max_body_length: usize,
    max_header_length: usize,
    state: DecodeState,
}

impl EventSocketCodec {
    /// Create a codec rejecting bodies longer than `max_body_length`.
    ///
    /// The limit is clamped to `[MIN_BODY_LENGTH, MAX_BODY_LENGTH]`.
    #[must_use]
    pub fn new(max_body_length: usize) -> Self {
        Self {
            max_body_length: clamp_body_length(max_body_length),
            max_header_length: DEFAULT_MAX_HEADER_LENGTH,
            state: DecodeState::default(),
        }
    }

    /// Reject header blocks longer than `max_header_length` bytes.
    ///
    /// The limit is clamped to `[MIN_HEADER_LENGTH, MAX_HEADER_LENGTH]`.
    #[must_use]
    pub fn with_max_header_length(mut self, max_header_length: usize) -> Self {
        self.max_header_length = clamp_header_length(max_header_length);
        self
    }

    /// Return the configured body length limit.
    #[must_use]
    pub fn max_body_length(&self) -> usize { self.max_body_length }

    /// Return the configured header block limit.
    #[must_use]
    pub fn max_header_length(&self) -> usize { self.max_header_length }

    /// Returns `true` when a header block has been consumed but its body is
    /// still incomplete.
    #[must_use]
    pub fn is_awaiting_body(&self) -> bool { matches!(self.state, DecodeState::AwaitingBody { .. }) }

    fn decode_headers(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        let DecodeState::AwaitingHeaders { scanned } = self.state else {
            return Ok(None);
        };
        if scanned == 0 {
            skip_leading_line_breaks(src);
        }
        let Some(block_len) = find_header_end(src, scanned) else {
            if src.len() > self.max_header_length {
                return Err(FramingError::OversizedHeader {
                    size: src.len(),
                    max: self.max_header_length,
                }
                .into());
            }
            self.state = DecodeState::AwaitingHeaders { scanned: src.len() };
            return Ok(None);
        };
        if block_len > self.max_header_length {
            return Err(FramingError::OversizedHeader {
                size: block_len,
                max: self.max_header_length,
            }
            .into());
        }
        self.state = DecodeState::default();
        let block = src.split_to(block_len);
        let (headers, _) = Headers::parse_block(&block, false);

        let Some(expected) = headers.content_length() else {
            return Ok(Some(Message::from_parts(headers, None)));
        };
        if expected > self.max_body_length {
            return Err(FramingError::OversizedBody {
                size: expected,
                max: self.max_body_length,
            }
            .into());
        }
        self.state = DecodeState::AwaitingBody { headers, expected };
        self.decode_body(src)
    }

    fn decode_body(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        let DecodeState::AwaitingBody { expected, .. } = self.state else {
            return Ok(None);
        };
        if src.len() < expected {
            src.reserve(expected - src.len());
            return Ok(None);
        }
        let body: Bytes = src.split_to(expected).freeze();
        let DecodeState::AwaitingBody { headers, .. } = std::mem::take(&mut self.state) else {
            return Ok(None);
        };
        Ok(Some(Message::from_parts(headers, Some(body))))
    }
}

impl Default for EventSocketCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_BODY_LENGTH) }
}

impl Decoder for EventSocketCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let message = match self.state {
            DecodeState::AwaitingHeaders { .. } => self.decode_headers(src)?,
            DecodeState::AwaitingBody { .. } => self.decode_body(src)?,
        };
        if let Some(message) = &message {
            tracing::trace!(
                headers = message.headers().len(),
                body = message.body().map_or(0, Bytes::len),
                "frame decoded"
            );
        }
        Ok(message)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        match &self.state {
            DecodeState::AwaitingBody { expected, .. } => Err(EofError::MidBody {
                bytes_received: src.len(),
                expected: *expected,
            }
            .into()),
            DecodeState::AwaitingHeaders { .. } if src.is_empty() => Ok(None),
            DecodeState::AwaitingHeaders { .. } => Err(EofError::MidHeader {
                bytes_received: src.len(),
            }
            .into()),
        }
    }
}

impl Encoder<Command> for EventSocketCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)?;
        Ok(())
    }
}

/// Drop blank lines left between frames, such as the trailing `\n\n` some
/// peers append after a body.
fn skip_leading_line_breaks(src: &mut BytesMut) {
    let n = src.iter().take_while(|b| matches!(b, b'\n' | b'\r')).count();
    src.advance(n);
}

/// Locate the end of a header block: the offset just past the first blank
/// line. Accepts both `\n\n` and `\r\n\r\n`. Scanning starts at `from`;
/// each line feed is judged by the bytes just before it, so resuming is exact.
fn find_header_end(src: &[u8], from: usize) -> Option<usize> {
    src.iter()
        .enumerate()
        .skip(from)
        .filter(|(_, byte)| **byte == b'\n')
        .map(|(i, _)| i)
        .find(|&i| ends_blank_line(src, i))
        .map(|i| i + 1)
}

fn ends_blank_line(src: &[u8], newline: usize) -> bool {
    match newline {
        0 => true,
        1 => matches!(src[0], b'\n' | b'\r'),
        i => src[i - 1] == b'\n' || (src[i - 1] == b'\r' && src[i - 2] == b'\n'),
    }
}

/// Push-style wrapper around [`EventSocketCodec`].
///
/// Bytes handed to [`FrameParser::feed`] are appended to an internal buffer;
/// the returned iterator lazily yields every frame that is now complete, in
/// arrival order. Unconsumed bytes stay buffered for the next call.
///
/// # Examples
///
/// ```
/// use eslframe::codec::FrameParser;
///
/// let mut parser = FrameParser::default();
/// assert_eq!(parser.feed(b"Content-Length: 4\n").count(), 0);
/// let frames: Vec<_> = parser.feed(b"\nabcd").collect();
/// assert_eq!(frames.len(), 1);
/// ```
#[derive(Debug)]
pub struct FrameParser {
    codec: EventSocketCodec,
    buffer: BytesMut,
}

impl FrameParser {
    /// Create a parser with the given body limit and initial buffer capacity.
    #[must_use]
    pub fn new(max_body_length: usize, capacity: usize) -> Self {
        Self::with_codec(EventSocketCodec::new(max_body_length), capacity)
    }

    /// Create a parser around a configured `codec`.
    #[must_use]
    pub fn with_codec(codec: EventSocketCodec, capacity: usize) -> Self {
        Self {
            codec,
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append `data` and iterate over the frames it completes.
    pub fn feed(&mut self, data: &[u8]) -> Frames<'_> {
        self.push_bytes(data);
        Frames { parser: self }
    }

    /// Append `data` without decoding anything yet.
    pub fn push_bytes(&mut self, data: &[u8]) { self.buffer.extend_from_slice(data); }

    /// Decode the next complete frame from the buffered bytes.
    ///
    /// A framing error clears the buffer, since the stream position is lost.
    pub fn next_frame(&mut self) -> Option<Result<Message, CodecError>> {
        match self.codec.decode(&mut self.buffer) {
            Ok(frame) => frame.map(Ok),
            Err(e) => {
                self.reset();
                Some(Err(e))
            }
        }
    }

    /// Number of bytes buffered but not yet part of an emitted frame.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buffer.len() }

    /// Signal end of input.
    ///
    /// # Errors
    ///
    /// Returns an [`EofError`] when the stream stopped inside a frame.
    pub fn finish(&mut self) -> Result<Option<Message>, CodecError> {
        self.codec.decode_eof(&mut self.buffer)
    }

    /// Drop all buffered bytes and partial frame state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.codec.state = DecodeState::default();
    }
}

impl Default for FrameParser {
    fn default() -> Self { Self::new(DEFAULT_MAX_BODY_LENGTH, 8 * 1024) }
}

/// Iterator returned by [`FrameParser::feed`].
#[derive(Debug)]
pub struct Frames<'a> {
    parser: &'a mut FrameParser,
}

impl Iterator for Frames<'_> {
    type Item = Result<Message, CodecError>;

    fn next(&mut self) -> Option<Self::Item> { self.parser.next_frame() }
}
