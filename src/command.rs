//! Outgoing commands.
//!
//! A command is a single text line, optionally followed by `name: value`
//! lines and a body, terminated by a blank line:
//!
//! ```text
//! api status
//!
//! sendmsg 0f2a...
//! call-command: execute
//! execute-app-name: playback
//!
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{codec::FramingError, message::CONTENT_LENGTH};

/// A command ready to be written to the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    line: String,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl Command {
    /// Build a command from its name and argument string.
    ///
    /// Empty parts are omitted, so `Command::new("api foo", "")` encodes as
    /// `api foo`.
    #[must_use]
    pub fn new(name: &str, args: &str) -> Self {
        Self {
            line: join_words(&[name, args]),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Build a raw command line, used verbatim.
    #[must_use]
    pub fn raw(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// `api <command> <args>`: run an API command and wait for its output.
    #[must_use]
    pub fn api(command: &str, args: &str) -> Self { Self::raw(join_words(&["api", command, args])) }

    /// `bgapi <command> <args>`: run an API command in the background.
    ///
    /// The reply only carries a `Job-UUID`; the output arrives later in a
    /// `BACKGROUND_JOB` event.
    #[must_use]
    pub fn bgapi(command: &str, args: &str) -> Self {
        Self::raw(join_words(&["bgapi", command, args]))
    }

    /// Append a `name: value` line after the command line.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a body. A matching `Content-Length` line is emitted on encode.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// The command line without its terminator.
    #[must_use]
    pub fn line(&self) -> &str { &self.line }

    /// Number of bytes [`Command::encode`] will produce.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let headers: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.len() + value.len() + 3)
            .sum();
        let body = self
            .body
            .as_ref()
            .map_or(0, |b| CONTENT_LENGTH.len() + 2 + b.len().to_string().len() + 1 + b.len());
        self.line.len() + 1 + headers + body + 1
    }

    /// Serialise the command into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::EmbeddedLineBreak`] if the command line or a
    /// header line contains `\r` or `\n`, which would split the command.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), FramingError> {
        self.validate()?;
        dst.reserve(self.encoded_len());
        dst.put_slice(self.line.as_bytes());
        dst.put_u8(b'\n');
        for (name, value) in &self.headers {
            dst.put_slice(name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_u8(b'\n');
        }
        if let Some(body) = &self.body {
            dst.put_slice(format!("{CONTENT_LENGTH}: {}\n\n", body.len()).as_bytes());
            dst.put_slice(body);
        } else {
            dst.put_u8(b'\n');
        }
        Ok(())
    }

    /// Serialise the command into a fresh buffer.
    ///
    /// # Errors
    ///
    /// See [`Command::encode`].
    pub fn to_bytes(&self) -> Result<Bytes, FramingError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    fn validate(&self) -> Result<(), FramingError> {
        let has_break = |s: &str| s.contains(['\n', '\r']);
        let bad_header = self
            .headers
            .iter()
            .find(|(name, value)| has_break(name) || has_break(value));
        if has_break(&self.line) {
            return Err(FramingError::EmbeddedLineBreak {
                line: self.line.clone(),
            });
        }
        if let Some((name, value)) = bad_header {
            return Err(FramingError::EmbeddedLineBreak {
                line: format!("{name}: {value}"),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.line) }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self { Self::raw(line) }
}

impl From<String> for Command {
    fn from(line: String) -> Self { Self::raw(line) }
}

fn join_words(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn encoded(cmd: &Command) -> String {
        let bytes = cmd.to_bytes().expect("command should encode");
        String::from_utf8(bytes.to_vec()).expect("command bytes should be UTF-8")
    }

    #[rstest]
    #[case(Command::api("foo", ""), "api foo\n\n")]
    #[case(Command::api("foo", "bar baz"), "api foo bar baz\n\n")]
    #[case(Command::bgapi("originate", "user/1000 &park"), "bgapi originate user/1000 &park\n\n")]
    #[case(Command::new("response", "+YAY"), "response +YAY\n\n")]
    #[case(Command::raw("event plain ALL"), "event plain ALL\n\n")]
    fn encodes_flat_commands(#[case] cmd: Command, #[case] expected: &str) {
        assert_eq!(encoded(&cmd), expected);
        assert_eq!(cmd.encoded_len(), expected.len());
    }

    #[test]
    fn encodes_header_lines_and_body() {
        let cmd = Command::raw("sendmsg")
            .header("call-command", "execute")
            .header("execute-app-name", "playback")
            .body("hello");
        let expected = "sendmsg\ncall-command: execute\nexecute-app-name: playback\nContent-Length: 5\n\nhello";
        assert_eq!(encoded(&cmd), expected);
        assert_eq!(cmd.encoded_len(), expected.len());
    }

    #[rstest]
    #[case(Command::raw("api status\n\nexit"))]
    #[case(Command::raw("api status").header("x", "a\r\nb"))]
    fn rejects_embedded_line_breaks(#[case] cmd: Command) {
        assert!(matches!(
            cmd.to_bytes(),
            Err(FramingError::EmbeddedLineBreak { .. })
        ));
    }
}
