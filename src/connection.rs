//! Tokio driver binding a [`Listener`] to a byte stream.
//!
//! [`Connection::run`] reads frames with a [`FramedRead`] over the
//! listener's [`EventSocketCodec`](crate::codec::EventSocketCodec), hands
//! them to the listener, and writes its outbound bytes back in order. Parked handlers are polled on every iteration so
//! that wakeups from timers or other tasks are not lost between frames.
//!
//! The loop ends when the peer closes the stream, the shutdown token fires,
//! or the transport fails. In every case the listener is closed so that
//! handlers waiting on replies resume with
//! [`CommandError::Disconnected`](crate::error::CommandError::Disconnected).

use std::io;

use futures::StreamExt;
use log::{info, warn};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::{codec::FramedRead, sync::CancellationToken};

use crate::{
    codec::CodecError,
    error::ListenerError,
    listener::Listener,
    metrics,
    outbound::Outbound,
};

/// Errors that end a [`Connection`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    /// Reading from or writing to the transport failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    /// The inbound stream could not be framed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

impl From<CodecError> for ConnectionError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::Io(e) => Self::Io(e),
            other => Self::Listener(ListenerError::Framing(other)),
        }
    }
}

/// A listener attached to its transport.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use eslframe::{
///     config::ListenerConfig,
///     connection::Connection,
///     hooks::HookRegistry,
///     listener::Listener,
/// };
/// use tokio::net::TcpStream;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Arc::new(HookRegistry::new());
/// let stream = TcpStream::connect("127.0.0.1:8021").await?;
/// let (listener, outbound) = Listener::new(registry, ListenerConfig::default());
/// let shutdown = CancellationToken::new();
/// let mut connection = Connection::new(stream, listener, outbound).with_shutdown(shutdown);
/// connection.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Connection<S> {
    stream: S,
    listener: Listener,
    outbound: Outbound,
    shutdown: CancellationToken,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Bind `listener` and its `outbound` stream to `stream`.
    pub fn new(stream: S, listener: Listener, outbound: Outbound) -> Self {
        Self {
            stream,
            listener,
            outbound,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop the connection when `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Token that stops this connection when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken { self.shutdown.clone() }

    /// The driven listener.
    #[must_use]
    pub fn listener(&self) -> &Listener { &self.listener }

    /// Mutable access to the driven listener, e.g. to set its catch-all.
    pub fn listener_mut(&mut self) -> &mut Listener { &mut self.listener }

    /// Release the listener, typically after [`run`](Self::run) returned.
    pub fn into_listener(self) -> Listener { self.listener }

    /// Drive the connection until EOF, shutdown or a transport failure.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Io`] if the transport fails and
    /// [`ConnectionError::Listener`] if the inbound stream cannot be framed,
    /// including EOF inside a frame.
    pub async fn run(&mut self) -> Result<(), ConnectionError> {
        if self.shutdown.is_cancelled() {
            info!("connection aborted before start");
            self.listener.close();
            return Ok(());
        }
        metrics::inc_connections();
        info!(
            "connection opened: hooks={}, max_body_length={}",
            self.listener.registry().len(),
            self.listener.config().max_body_length_value()
        );
        let result = self.pump().await;
        metrics::dec_connections();
        match &result {
            Ok(()) => info!("connection closed"),
            Err(e) => warn!("connection failed: error={e}"),
        }
        result
    }

    async fn pump(&mut self) -> Result<(), ConnectionError> {
        let Self {
            stream,
            listener,
            outbound,
            shutdown,
        } = self;
        let config = listener.config();
        let (reader, mut writer) = tokio::io::split(stream);
        let mut frames = FramedRead::with_capacity(
            reader,
            config.codec(),
            config.read_buffer_capacity_value(),
        );

        let outcome: Result<(), ConnectionError> = loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    info!("connection shutdown requested");
                    break Ok(());
                }
                Some(chunk) = outbound.recv() => {
                    if let Err(e) = writer.write_all(&chunk).await {
                        break Err(e.into());
                    }
                }
                frame = frames.next() => match frame {
                    Some(Ok(message)) => listener.receive_message(message),
                    Some(Err(e)) => break Err(e.into()),
                    None => break Ok(()),
                },
                () = listener.drive_handlers() => {}
            }
        };

        listener.close();
        if outcome.is_ok() {
            for chunk in outbound.drain() {
                writer.write_all(&chunk).await?;
            }
            writer.flush().await?;
        }
        outcome
    }
}
