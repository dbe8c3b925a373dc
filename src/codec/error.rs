//! Error types for the framing layer.
//!
//! Only conditions the parser cannot recover from are errors. Malformed
//! header lines are skipped and incomplete frames simply wait for more
//! bytes, so neither appears here.
//!
//! - [`FramingError`]: the byte stream cannot be split into frames any more.
//! - [`EofError`]: the transport ended inside a frame. A close at a frame
//!   boundary is not an error and decodes as `Ok(None)`.
//! - [`CodecError`]: top-level enum wrapping both plus I/O errors.

use std::io;

use thiserror::Error;

/// Wire-level problems that desynchronise the parser.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum FramingError {
    /// The header block grew past the configured maximum without ending.
    #[error("frame header block exceeds max length: {size} > {max}")]
    OversizedHeader {
        /// Header bytes buffered or found.
        size: usize,
        /// Maximum allowed header block size.
        max: usize,
    },

    /// `Content-Length` announces a body larger than the configured maximum.
    #[error("frame body exceeds max length: {size} > {max}")]
    OversizedBody {
        /// Declared body size.
        size: usize,
        /// Maximum allowed body size.
        max: usize,
    },

    /// An outgoing command contains a line break in its command line.
    #[error("command line must not contain line breaks: {line:?}")]
    EmbeddedLineBreak {
        /// The offending command line.
        line: String,
    },
}

/// End-of-stream conditions inside a frame.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The transport closed before the header block was terminated.
    #[error("premature EOF during header block: {bytes_received} bytes buffered")]
    MidHeader {
        /// Bytes buffered when the stream ended.
        bytes_received: usize,
    },

    /// The transport closed before the declared body was complete.
    #[error("premature EOF: {bytes_received} of {expected} body bytes received")]
    MidBody {
        /// Body bytes received before EOF.
        bytes_received: usize,
        /// Declared body length.
        expected: usize,
    },
}

/// Top-level codec error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The stream cannot be framed.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    /// The stream ended.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
    /// Transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_sizes() {
        let err = CodecError::from(FramingError::OversizedBody { size: 10, max: 4 });
        assert_eq!(err.to_string(), "framing error: frame body exceeds max length: 10 > 4");

        let eof = CodecError::from(EofError::MidBody {
            bytes_received: 2,
            expected: 9,
        });
        assert!(eof.to_string().contains("2 of 9"));

        let header = CodecError::from(FramingError::OversizedHeader { size: 65, max: 64 });
        assert!(header.to_string().contains("header block exceeds max length: 65 > 64"));
    }
}
