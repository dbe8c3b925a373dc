//! Run a [`Connection`] over an in-memory stream.

use std::time::Duration;

use eslframe::{Connection, ConnectionError, Listener, outbound::Outbound};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;

const DUPLEX_CAPACITY: usize = 64 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Peer side of a connection started by [`spawn_connection`].
pub struct DriverHandle {
    /// The peer's end of the duplex stream.
    pub peer: DuplexStream,
    /// Cancels the connection.
    pub shutdown: CancellationToken,
    /// Completes with the listener once the connection ends.
    pub task: JoinHandle<(Listener, Result<(), ConnectionError>)>,
}

impl DriverHandle {
    /// Write `data` as the peer.
    ///
    /// # Panics
    ///
    /// Panics if the duplex stream is closed.
    pub async fn send(&mut self, data: &[u8]) {
        self.peer.write_all(data).await.expect("peer write");
    }

    /// Read exactly `expected.len()` bytes and assert they match.
    ///
    /// # Panics
    ///
    /// Panics on mismatch, EOF, or after two seconds without data.
    pub async fn expect(&mut self, expected: &str) {
        let mut buf = vec![0; expected.len()];
        timeout(READ_TIMEOUT, self.peer.read_exact(&mut buf))
            .await
            .expect("timed out waiting for outbound data")
            .expect("peer read");
        assert_eq!(String::from_utf8_lossy(&buf), expected);
    }

    /// Close the peer side and wait for the connection to finish.
    ///
    /// # Panics
    ///
    /// Panics if the connection task panicked or does not finish in time.
    pub async fn hang_up(self) -> (Listener, Result<(), ConnectionError>) {
        drop(self.peer);
        timeout(READ_TIMEOUT, self.task)
            .await
            .expect("connection did not finish")
            .expect("connection task panicked")
    }

    /// Cancel the connection and wait for it to finish.
    ///
    /// # Panics
    ///
    /// Panics if the connection task panicked or does not finish in time.
    pub async fn shut_down(self) -> (DuplexStream, Listener, Result<(), ConnectionError>) {
        self.shutdown.cancel();
        let (listener, result) = timeout(READ_TIMEOUT, self.task)
            .await
            .expect("connection did not finish")
            .expect("connection task panicked");
        (self.peer, listener, result)
    }
}

/// Spawn `listener` on one end of a duplex stream.
#[must_use]
pub fn spawn_connection(listener: Listener, outbound: Outbound) -> DriverHandle {
    let (peer, local) = tokio::io::duplex(DUPLEX_CAPACITY);
    let shutdown = CancellationToken::new();
    let mut connection = Connection::new(local, listener, outbound).with_shutdown(shutdown.clone());
    let task = tokio::spawn(async move {
        let result = connection.run().await;
        (connection.into_listener(), result)
    });
    DriverHandle {
        peer,
        shutdown,
        task,
    }
}
