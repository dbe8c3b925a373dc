//! Outbound byte stream shared by the command queue and handlers.
//!
//! [`OutboundSink`] is the cloneable producer side; [`Outbound`] is drained by
//! the transport. Chunks are delivered in the order they were written.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::metrics::{self, Direction};

/// Create a connected sink/stream pair.
#[must_use]
pub fn channel() -> (OutboundSink, Outbound) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundSink { tx }, Outbound { rx })
}

/// Cloneable producer of outbound bytes.
#[derive(Clone, Debug)]
pub struct OutboundSink {
    tx: mpsc::UnboundedSender<Bytes>,
}

/// Error returned when the transport side of the outbound stream is gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("outbound stream closed")]
pub struct SinkClosed;

impl OutboundSink {
    /// Append a chunk to the outbound stream.
    ///
    /// # Errors
    ///
    /// Returns [`SinkClosed`] if the [`Outbound`] receiver has been dropped.
    pub fn write(&self, data: Bytes) -> Result<(), SinkClosed> {
        let len = data.len();
        self.tx.send(data).map_err(|_| SinkClosed)?;
        metrics::inc_frames(Direction::Outbound);
        tracing::trace!(bytes = len, "outbound chunk queued");
        Ok(())
    }

    /// Returns `true` once the receiver has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.tx.is_closed() }
}

/// Receiving side of the outbound stream, drained by the transport.
#[derive(Debug)]
pub struct Outbound {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Outbound {
    /// Wait for the next chunk. Returns `None` once every sink is dropped.
    pub async fn recv(&mut self) -> Option<Bytes> { self.rx.recv().await }

    /// Take the next chunk if one is ready.
    pub fn try_recv(&mut self) -> Option<Bytes> { self.rx.try_recv().ok() }

    /// Take every chunk that is ready, in order.
    pub fn drain(&mut self) -> Vec<Bytes> { std::iter::from_fn(|| self.try_recv()).collect() }
}
