//! Builders for inbound frames.
//!
//! Event builders follow the peer's habit of appending a blank line after the
//! body, outside `Content-Length`.

use bytes::{BufMut, Bytes, BytesMut};

fn frame(headers: &[(&str, &str)], body: Option<&[u8]>) -> Bytes {
    let mut out = BytesMut::new();
    for (name, value) in headers {
        out.put_slice(format!("{name}: {value}\n").as_bytes());
    }
    match body {
        Some(body) => {
            out.put_slice(format!("Content-Length: {}\n\n", body.len()).as_bytes());
            out.put_slice(body);
            out.put_slice(b"\n\n");
        }
        None => out.put_slice(b"\n"),
    }
    out.freeze()
}

fn header_block(event_name: &str, headers: &[(&str, &str)]) -> String {
    let mut block = format!("Event-Name: {event_name}");
    for (name, value) in headers {
        block.push_str(&format!("\n{name}: {value}"));
    }
    block
}

/// Session establishment frame of an inbound connection.
#[must_use]
pub fn auth_request() -> Bytes { frame(&[("Content-Type", "auth/request")], None) }

/// Untyped event: the body is a header block carrying `Event-Name`.
#[must_use]
pub fn event_frame(event_name: &str, headers: &[(&str, &str)]) -> Bytes {
    let block = header_block(event_name, headers);
    frame(&[], Some(block.as_bytes()))
}

/// `text/event-plain` event; `headers` values must already be URL-encoded.
#[must_use]
pub fn plain_event_frame(event_name: &str, headers: &[(&str, &str)]) -> Bytes {
    let block = header_block(event_name, headers);
    frame(&[("Content-Type", "text/event-plain")], Some(block.as_bytes()))
}

/// `text/event-json` event with string-valued fields.
#[must_use]
pub fn json_event_frame(event_name: &str, fields: &[(&str, &str)]) -> Bytes {
    let mut json = format!("{{\"Event-Name\":\"{event_name}\"");
    for (name, value) in fields {
        json.push_str(&format!(",\"{name}\":\"{value}\""));
    }
    json.push('}');
    frame(&[("Content-Type", "text/event-json")], Some(json.as_bytes()))
}

/// `api/response` carrying `body`.
#[must_use]
pub fn api_response(body: &str) -> Bytes {
    frame(&[("Content-Type", "api/response")], Some(body.as_bytes()))
}

/// `command/reply` with the given `Reply-Text`.
#[must_use]
pub fn command_reply(reply_text: &str) -> Bytes {
    frame(
        &[("Content-Type", "command/reply"), ("Reply-Text", reply_text)],
        None,
    )
}

/// `text/disconnect-notice` sent before the peer hangs up.
#[must_use]
pub fn disconnect_notice(body: &str) -> Bytes {
    frame(&[("Content-Type", "text/disconnect-notice")], Some(body.as_bytes()))
}
