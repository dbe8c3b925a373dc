#![cfg(feature = "metrics")]
//! Metrics recorded while routing frames.

mod common;

use common::established;
use eslframe::{HookRegistry, metrics};
use eslframe_testing::{api_response, counter_value, event_frame, feed, with_recorder};
use rstest::rstest;

#[test]
fn frames_are_counted_per_direction() {
    let snapshotter = with_recorder(|| {
        let registry = HookRegistry::new().on("ping", |session| async move {
            session.send_data("pong")?;
            Ok(())
        });
        let (mut listener, _outbound) = established(registry);
        feed!(listener, event_frame("PING", &[]), event_frame("PING", &[]));
    });

    // The session frame counts as inbound too.
    assert_eq!(
        counter_value(&snapshotter, metrics::FRAMES_PROCESSED, Some(("direction", "inbound"))),
        3
    );
    assert_eq!(
        counter_value(&snapshotter, metrics::FRAMES_PROCESSED, Some(("direction", "outbound"))),
        2
    );
}

#[test]
fn commands_and_errors_are_counted() {
    let snapshotter = with_recorder(|| {
        let registry = HookRegistry::new()
            .on("work", |session| async move {
                session.api("status", "").await?;
                Ok(())
            })
            .on("work", |_session| async { panic!("handler bug") });
        let (mut listener, _outbound) = established(registry);
        feed!(listener, event_frame("WORK", &[]), api_response("+OK"), api_response("+OK"));
    });

    assert_eq!(counter_value(&snapshotter, metrics::COMMANDS_TOTAL, None), 1);
    assert_eq!(counter_value(&snapshotter, metrics::HANDLER_PANICS, None), 1);
    // One panic plus one stray reply.
    assert_eq!(counter_value(&snapshotter, metrics::ERRORS_TOTAL, None), 2);
}

#[rstest]
#[case(1)]
#[case(3)]
fn connection_gauge_helpers_balance(#[case] connections: usize) {
    let snapshotter = with_recorder(|| {
        for _ in 0..connections {
            metrics::inc_connections();
        }
        for _ in 0..connections {
            metrics::dec_connections();
        }
    });
    let recorded = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .any(|(key, _, _, _)| key.key().name() == metrics::CONNECTIONS_ACTIVE);
    assert!(recorded, "connection gauge not recorded");
}
