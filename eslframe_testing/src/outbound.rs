//! Helpers for reading what a listener wrote.

use eslframe::outbound::Outbound;

/// Every chunk that is ready, as lossy UTF-8.
pub fn drain_text(outbound: &mut Outbound) -> Vec<String> {
    outbound
        .drain()
        .iter()
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Wait for the next chunk, as lossy UTF-8.
pub async fn recv_text(outbound: &mut Outbound) -> Option<String> {
    outbound
        .recv()
        .await
        .map(|chunk| String::from_utf8_lossy(&chunk).into_owned())
}
