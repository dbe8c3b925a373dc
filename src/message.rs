//! Parsed event socket frames.
//!
//! A [`Message`] is one complete frame: a header block, an optional body of
//! exactly `Content-Length` bytes and, for event-style payloads, a second
//! header block parsed out of that body. Messages are immutable once built;
//! consumers that need to keep one around receive a clone.

use std::{borrow::Cow, collections::HashMap, fmt, str};

use bytes::Bytes;
use percent_encoding::percent_decode_str;

/// Header carrying the body length.
pub const CONTENT_LENGTH: &str = "Content-Length";
/// Header classifying the frame.
pub const CONTENT_TYPE: &str = "Content-Type";
/// Header naming the event carried by a frame.
pub const EVENT_NAME: &str = "Event-Name";
/// Header carrying the textual outcome of a command reply.
pub const REPLY_TEXT: &str = "Reply-Text";
/// Header carrying the job identifier of a background API call.
pub const JOB_UUID: &str = "Job-UUID";

/// Case-insensitive header map.
///
/// Names are normalised to ASCII lowercase on insertion and lookup, so
/// `Event-Name`, `event-name` and `EVENT-NAME` address the same entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    /// Create an empty header map.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Insert a header, replacing any previous value under the same name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Look up a header value by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns `true` when a header with `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.0.contains_key(&name.to_ascii_lowercase()) }

    /// Number of headers stored.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns `true` when no headers are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Iterate over `(lowercased name, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse the declared `Content-Length`, if present and well formed.
    ///
    /// A malformed value is treated as absent.
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        let raw = self.get(CONTENT_LENGTH)?;
        match raw.trim().parse::<usize>() {
            Ok(len) => Some(len),
            Err(_) => {
                tracing::debug!(value = raw, "ignoring malformed Content-Length");
                None
            }
        }
    }

    /// Parse a `name: value` block into a header map.
    ///
    /// Parsing stops at the first blank line. Lines without a `:` separator
    /// or with an empty name are skipped. When `decode_values` is set, values
    /// are percent-decoded, as the peer does for plain-text event bodies.
    ///
    /// Returns the headers and the byte offset just past the terminating
    /// blank line (or the end of `block` when there is none).
    pub(crate) fn parse_block(block: &[u8], decode_values: bool) -> (Self, usize) {
        let mut headers = Self::new();
        let mut offset = 0;
        while offset < block.len() {
            let rest = block.get(offset..).unwrap_or_default();
            let (line, advance) = match rest.iter().position(|b| *b == b'\n') {
                Some(pos) => (rest.get(..pos).unwrap_or_default(), pos + 1),
                None => (rest, rest.len()),
            };
            offset += advance;
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                break;
            }
            headers.insert_line(line, decode_values);
        }
        (headers, offset)
    }

    fn insert_line(&mut self, line: &[u8], decode_values: bool) {
        let text = String::from_utf8_lossy(line);
        let Some((name, value)) = text.split_once(':') else {
            tracing::debug!(line = %text, "skipping malformed header line");
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            tracing::debug!(line = %text, "skipping header line without a name");
            return;
        }
        let value = value.trim();
        if decode_values {
            self.insert(name, percent_decode_str(value).decode_utf8_lossy());
        } else {
            self.insert(name, value);
        }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Headers {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Frame classification declared by the `Content-Type` header.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentType {
    /// `command/reply`: answer to a non-API command.
    CommandReply,
    /// `api/response`: answer to an `api` command; body is opaque text.
    ApiResponse,
    /// `text/event-plain`: event serialised as a header block.
    EventPlain,
    /// `text/event-json`: event serialised as a JSON object.
    EventJson,
    /// `text/event-xml`: event serialised as XML; kept opaque.
    EventXml,
    /// `auth/request`: the peer asks for credentials.
    AuthRequest,
    /// `text/disconnect-notice`: the peer is about to close.
    DisconnectNotice,
    /// `text/rude-rejection`: the peer refused the connection.
    RudeRejection,
    /// `log/data`: log line forwarded by the peer.
    LogData,
    /// Any other declared type.
    Other(String),
}

impl ContentType {
    /// Parse a `Content-Type` header value.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "command/reply" => Self::CommandReply,
            "api/response" => Self::ApiResponse,
            "text/event-plain" => Self::EventPlain,
            "text/event-json" => Self::EventJson,
            "text/event-xml" => Self::EventXml,
            "auth/request" => Self::AuthRequest,
            "text/disconnect-notice" => Self::DisconnectNotice,
            "text/rude-rejection" => Self::RudeRejection,
            "log/data" => Self::LogData,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The wire representation of this content type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CommandReply => "command/reply",
            Self::ApiResponse => "api/response",
            Self::EventPlain => "text/event-plain",
            Self::EventJson => "text/event-json",
            Self::EventXml => "text/event-xml",
            Self::AuthRequest => "auth/request",
            Self::DisconnectNotice => "text/disconnect-notice",
            Self::RudeRejection => "text/rude-rejection",
            Self::LogData => "log/data",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// How the listener routes a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// Asynchronous notification dispatched to hooks.
    Event,
    /// Reply to a queued non-API command.
    CommandReply,
    /// Reply to a queued `api` command.
    ApiReply,
    /// Anything else: auth requests, disconnect notices, log lines.
    Notice,
}

impl MessageKind {
    /// Returns `true` for both reply kinds.
    #[must_use]
    pub fn is_reply(self) -> bool { matches!(self, Self::CommandReply | Self::ApiReply) }
}

/// One complete protocol frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    headers: Headers,
    body: Option<Bytes>,
    content: Option<Headers>,
    event_body: Option<Bytes>,
}

impl Message {
    /// Build a message from a parsed header block and an optional body.
    ///
    /// The body is re-parsed into [`Message::content`] when the declared
    /// content type carries header-style event data:
    ///
    /// - no content type, or `command/reply`: the body is parsed as a header block when its first
    ///   line contains `:`;
    /// - `text/event-plain`: the body is parsed as a header block with percent-decoded values;
    /// - `text/event-json`: the body is parsed as a flat JSON object.
    ///
    /// Every other type keeps the body opaque.
    #[must_use]
    pub fn from_parts(headers: Headers, body: Option<Bytes>) -> Self {
        let content_type = headers.get(CONTENT_TYPE).map(ContentType::parse);
        let (content, event_body) = match &body {
            Some(body) => parse_content(content_type.as_ref(), body),
            None => (None, None),
        };
        Self {
            headers,
            body,
            content,
            event_body,
        }
    }

    /// Top-level headers.
    #[must_use]
    pub fn headers(&self) -> &Headers { &self.headers }

    /// Look up a top-level header, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> { self.headers.get(name) }

    /// Raw body bytes, present only when `Content-Length` was declared.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> { self.body.as_ref() }

    /// Body as UTF-8 text, if present and valid.
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_deref().and_then(|b| str::from_utf8(b).ok())
    }

    /// Body as text, replacing invalid UTF-8 sequences. Empty when absent.
    #[must_use]
    pub fn body_lossy(&self) -> Cow<'_, str> {
        self.body
            .as_deref()
            .map_or(Cow::Borrowed(""), String::from_utf8_lossy)
    }

    /// Header block parsed from the body of an event-style frame.
    #[must_use]
    pub fn content(&self) -> Option<&Headers> { self.content.as_ref() }

    /// Look up a header in the nested content block, ignoring case.
    #[must_use]
    pub fn content_header(&self, name: &str) -> Option<&str> {
        self.content.as_ref().and_then(|c| c.get(name))
    }

    /// Text following the nested header block of an event, if any.
    #[must_use]
    pub fn event_body(&self) -> Option<&Bytes> { self.event_body.as_ref() }

    /// Declared content type.
    #[must_use]
    pub fn content_type(&self) -> Option<ContentType> {
        self.headers.get(CONTENT_TYPE).map(ContentType::parse)
    }

    /// Event name from the headers, falling back to the nested content.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        self.headers
            .get(EVENT_NAME)
            .or_else(|| self.content_header(EVENT_NAME))
    }

    /// Classify the message for routing.
    ///
    /// Anything carrying an event name is an event, even when its declared
    /// content type is a reply type; otherwise the content type decides.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        if self.event_name().is_some() {
            return MessageKind::Event;
        }
        match self.content_type() {
            Some(ContentType::ApiResponse) => MessageKind::ApiReply,
            Some(ContentType::CommandReply) => MessageKind::CommandReply,
            _ => MessageKind::Notice,
        }
    }

    /// Returns `true` when the declared content type is a reply type,
    /// whatever [`kind`](Self::kind) says.
    #[must_use]
    pub fn declares_reply(&self) -> bool {
        matches!(
            self.content_type(),
            Some(ContentType::CommandReply | ContentType::ApiResponse)
        )
    }

    /// `Reply-Text` header of a command reply.
    #[must_use]
    pub fn reply_text(&self) -> Option<&str> { self.header(REPLY_TEXT) }

    /// `Job-UUID` of a background API reply or its completion event.
    #[must_use]
    pub fn job_uuid(&self) -> Option<&str> {
        self.header(JOB_UUID)
            .or_else(|| self.content_header(JOB_UUID))
    }

    /// Returns `true` when the reply reports success.
    ///
    /// Command replies carry the outcome in `Reply-Text`; API replies carry it
    /// at the start of the body.
    #[must_use]
    pub fn is_ok(&self) -> bool { self.outcome().is_some_and(|text| text.starts_with("+OK")) }

    /// Returns `true` when the reply reports failure.
    #[must_use]
    pub fn is_err(&self) -> bool { self.outcome().is_some_and(|text| text.starts_with("-ERR")) }

    fn outcome(&self) -> Option<&str> {
        self.reply_text()
            .or_else(|| self.body_str().map(str::trim_start))
    }
}

fn parse_content(
    content_type: Option<&ContentType>,
    body: &Bytes,
) -> (Option<Headers>, Option<Bytes>) {
    match content_type {
        None | Some(ContentType::CommandReply) if looks_like_header_block(body) => {
            header_content(body, false)
        }
        Some(ContentType::EventPlain) => header_content(body, true),
        Some(ContentType::EventJson) => (json_content(body), None),
        _ => (None, None),
    }
}

fn looks_like_header_block(body: &[u8]) -> bool {
    let first_line = body.split(|b| *b == b'\n').next().unwrap_or_default();
    first_line.contains(&b':')
}

fn header_content(body: &Bytes, decode_values: bool) -> (Option<Headers>, Option<Bytes>) {
    let (headers, consumed) = Headers::parse_block(body, decode_values);
    let rest = body.slice(consumed.min(body.len())..);
    let event_body = (!rest.is_empty()).then_some(rest);
    ((!headers.is_empty()).then_some(headers), event_body)
}

fn json_content(body: &[u8]) -> Option<Headers> {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "event body is not valid JSON; keeping it opaque");
            return None;
        }
    };
    let serde_json::Value::Object(map) = value else {
        return None;
    };
    let mut headers = Headers::new();
    for (name, value) in map {
        match value {
            serde_json::Value::String(s) => headers.insert(&name, s),
            other => headers.insert(&name, other.to_string()),
        }
    }
    Some(headers)
}
