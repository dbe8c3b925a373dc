//! End-to-end runs of `Connection` over an in-memory stream.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use eslframe::{
    CommandError,
    ConnectionError,
    HookRegistry,
    Listener,
    ListenerConfig,
    ListenerError,
    codec::{CodecError, EofError},
};
use eslframe_testing::{api_response, auth_request, event_frame, spawn_connection};

fn listener(registry: HookRegistry) -> (Listener, eslframe::outbound::Outbound) {
    Listener::new(Arc::new(registry), ListenerConfig::default())
}

#[tokio::test]
async fn handler_commands_round_trip_over_the_stream() {
    let registry = HookRegistry::new().on("channel_answer", |session| async move {
        let uuid = session.api("create_uuid", "").await?;
        session.command("log", &format!("INFO {}", uuid.body_lossy())).await?;
        Ok(())
    });
    let (listener, outbound) = listener(registry);
    let mut driver = spawn_connection(listener, outbound);

    driver.send(&auth_request()).await;
    driver.send(&event_frame("CHANNEL_ANSWER", &[])).await;
    driver.expect("api create_uuid\n\n").await;

    driver.send(&api_response("4f1e")).await;
    driver.expect("log INFO 4f1e\n\n").await;
    driver
        .send(b"Content-Type: command/reply\nReply-Text: +OK\n\n")
        .await;

    let (listener, result) = driver.hang_up().await;
    result.expect("clean close");
    assert!(!listener.has_pending_handlers());
    assert_eq!(listener.outstanding_commands(), 0);
}

#[tokio::test]
async fn connect_handshake_resolves_with_channel_data() {
    let (listener, outbound) = listener(HookRegistry::new());
    let session = listener.session();
    let connect = session.command("connect", "");
    let mut driver = spawn_connection(listener, outbound);

    driver.expect("connect\n\n").await;
    driver
        .send(b"Content-Type: command/reply\nReply-Text: +OK\nEvent-Name: CHANNEL_DATA\nUnique-ID: 42\n\n")
        .await;
    let channel = tokio::time::timeout(Duration::from_secs(2), connect)
        .await
        .expect("connect answered")
        .expect("channel data");
    assert_eq!(channel.header("Unique-ID"), Some("42"));

    let (listener, result) = driver.hang_up().await;
    result.expect("clean close");
    assert!(listener.is_session_established());
    assert_eq!(listener.outstanding_commands(), 0);
}

#[tokio::test]
async fn eof_fails_commands_still_waiting() {
    let outcome: Arc<Mutex<Option<Result<(), CommandError>>>> = Arc::default();
    let slot = Arc::clone(&outcome);
    let registry = HookRegistry::new().on("start", move |session| {
        let slot = Arc::clone(&slot);
        async move {
            let result = session.api("status", "").await.map(drop);
            *slot.lock().expect("slot") = Some(result);
            Ok(())
        }
    });
    let (listener, outbound) = listener(registry);
    let mut driver = spawn_connection(listener, outbound);

    driver.send(&auth_request()).await;
    driver.send(&event_frame("START", &[])).await;
    driver.expect("api status\n\n").await;

    let (listener, result) = driver.hang_up().await;
    result.expect("clean close");
    assert_eq!(
        *outcome.lock().expect("slot"),
        Some(Err(CommandError::Disconnected))
    );
    assert!(listener.session().is_closed());
}

#[tokio::test]
async fn eof_inside_a_body_is_an_error() {
    let (listener, outbound) = listener(HookRegistry::new());
    let mut driver = spawn_connection(listener, outbound);
    driver.send(&auth_request()).await;
    driver.send(b"Content-Length: 50\n\npartial").await;

    let (_listener, result) = driver.hang_up().await;
    assert!(matches!(
        result,
        Err(ConnectionError::Listener(ListenerError::Framing(CodecError::Eof(
            EofError::MidBody { expected: 50, .. }
        ))))
    ));
}

#[tokio::test]
async fn shutdown_token_stops_the_connection() {
    let (listener, outbound) = listener(HookRegistry::new());
    let driver = spawn_connection(listener, outbound);
    let (_peer, listener, result) = driver.shut_down().await;
    result.expect("shutdown is not an error");
    assert!(listener.session().is_closed());
}

#[tokio::test]
async fn timer_driven_handlers_progress_without_inbound_traffic() {
    let registry = HookRegistry::new().on("later", |session| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.send_data("after the timer")?;
        Ok(())
    });
    let (listener, outbound) = listener(registry);
    let mut driver = spawn_connection(listener, outbound);

    driver.send(&auth_request()).await;
    driver.send(&event_frame("LATER", &[])).await;
    driver.expect("after the timer").await;

    let (_listener, result) = driver.hang_up().await;
    result.expect("clean close");
}
