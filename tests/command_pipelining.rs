//! Command submission from inside handlers: one command on the wire at a
//! time, replies matched oldest first.

mod common;

use std::sync::{Arc, Mutex};

use common::established;
use eslframe::{CommandError, HookRegistry, Message, hooks::catch_all};
use eslframe_testing::{api_response, assert_written, command_reply, event_frame, feed};
use rstest::rstest;

type Replies = Arc<Mutex<Vec<String>>>;

#[test]
fn only_one_command_is_sent_at_a_time() {
    let registry = HookRegistry::new().on("api_test", |session| async move {
        session.api("foo", "").await?;
        let reply = session.api("foo", "bar baz").await?;
        drop(session.command("response", &reply.body_lossy()));
        Ok(())
    });
    let (mut listener, mut outbound) = established(registry);
    listener.set_catch_all(catch_all(|_session, _event| async { Ok(()) }));

    feed!(
        listener,
        b"Content-Type: command/reply\nContent-Length: 22\n\nEvent-Name: API_TEST\n\n"
    );
    assert_written!(outbound, "api foo\n\n");

    feed!(listener, b"Content-Type: api/response\nReply-Text: +OK\n\n");
    assert_written!(outbound, "api foo bar baz\n\n");

    feed!(listener, b"Content-Type: api/response\nContent-Length: 4\n\n+YAY\n\n");
    assert_written!(outbound, "response +YAY\n\n");
    assert!(!listener.has_pending_handlers());
}

#[test]
fn replies_resolve_in_submission_order_across_interleaved_events() {
    let replies = Replies::default();
    let sink = Arc::clone(&replies);
    let registry = HookRegistry::new()
        .on("start", move |session| {
            let sink = Arc::clone(&sink);
            async move {
                let first = session.api("first", "").await?;
                sink.lock().expect("replies").push(format!("first={}", first.body_lossy()));
                let second = session.api("second", "").await?;
                sink.lock().expect("replies").push(format!("second={}", second.body_lossy()));
                Ok(())
            }
        })
        .on("noise", |session| async move {
            session.send_data("noise seen")?;
            Ok(())
        });
    let (mut listener, mut outbound) = established(registry);

    feed!(listener, event_frame("START", &[]));
    assert_written!(outbound, "api first\n\n");

    feed!(listener, event_frame("NOISE", &[]), api_response("+OK one"));
    assert_written!(outbound, "noise seen", "api second\n\n");

    feed!(listener, event_frame("NOISE", &[]));
    assert_written!(outbound, "noise seen");

    feed!(listener, api_response("+OK two"));
    assert_written!(outbound);
    assert_eq!(
        *replies.lock().expect("replies"),
        vec!["first=+OK one".to_owned(), "second=+OK two".to_owned()]
    );
}

#[test]
fn concurrent_submissions_wait_their_turn() {
    let replies = Replies::default();
    let sink = Arc::clone(&replies);
    let registry = HookRegistry::new().on("batch", move |session| {
        let sink = Arc::clone(&sink);
        async move {
            let a = session.command("event", "plain ALL");
            let b = session.command("filter", "Unique-ID abc");
            let (a, b) = futures::join!(a, b);
            let mut sink = sink.lock().expect("replies");
            sink.push(a?.reply_text().unwrap_or_default().to_owned());
            sink.push(b?.reply_text().unwrap_or_default().to_owned());
            Ok(())
        }
    });
    let (mut listener, mut outbound) = established(registry);

    feed!(listener, event_frame("BATCH", &[]));
    assert_written!(outbound, "event plain ALL\n\n");
    assert_eq!(listener.outstanding_commands(), 2);

    feed!(listener, command_reply("+OK event listener enabled plain"));
    assert_written!(outbound, "filter Unique-ID abc\n\n");

    feed!(listener, command_reply("+OK filter added"));
    assert_written!(outbound);
    assert_eq!(
        *replies.lock().expect("replies"),
        vec![
            "+OK event listener enabled plain".to_owned(),
            "+OK filter added".to_owned()
        ]
    );
}

#[test]
fn handlers_of_different_events_share_one_queue() {
    let replies = Replies::default();
    let make = |tag: &'static str, replies: Replies| {
        move |session: eslframe::SessionHandle| {
            let replies = Arc::clone(&replies);
            async move {
                let reply = session.api(tag, "").await?;
                replies
                    .lock()
                    .expect("replies")
                    .push(format!("{tag}={}", reply.body_lossy()));
                Ok(())
            }
        }
    };
    let registry = HookRegistry::new()
        .on("one", make("alpha", Arc::clone(&replies)))
        .on("two", make("beta", Arc::clone(&replies)));
    let (mut listener, mut outbound) = established(registry);

    feed!(listener, event_frame("ONE", &[]), event_frame("TWO", &[]));
    assert_written!(outbound, "api alpha\n\n");

    feed!(listener, api_response("1"));
    assert_written!(outbound, "api beta\n\n");
    feed!(listener, api_response("2"));

    assert_eq!(
        *replies.lock().expect("replies"),
        vec!["alpha=1".to_owned(), "beta=2".to_owned()]
    );
}

#[test]
fn dropped_reply_future_is_still_answered_in_order() {
    let (mut listener, mut outbound) = established(HookRegistry::new());
    let session = listener.session();
    drop(session.command("log", "INFO fire and forget"));
    let kept = session.bgapi("originate", "user/1000 &park");
    assert_written!(outbound, "log INFO fire and forget\n\n");

    feed!(listener, command_reply("+OK log"));
    assert_written!(outbound, "bgapi originate user/1000 &park\n\n");

    feed!(
        listener,
        b"Content-Type: command/reply\nReply-Text: +OK Job-UUID: 7f4d\nJob-UUID: 7f4d\n\n"
    );
    let reply: Message = futures::FutureExt::now_or_never(kept)
        .expect("resolved")
        .expect("reply");
    assert!(reply.is_ok());
    assert_eq!(reply.job_uuid(), Some("7f4d"));
}

#[rstest]
#[case::api(b"Content-Type: api/response\nContent-Length: 3\n\n+OK".as_slice())]
#[case::command(b"Content-Type: command/reply\nReply-Text: +OK\n\n".as_slice())]
fn reply_without_command_is_reported(#[case] reply: &[u8]) {
    let (mut listener, _outbound) = established(HookRegistry::new());
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    listener.set_error_handler(move |e| sink.lock().expect("errors").push(e.to_string()));

    feed!(listener, reply);

    let errors = errors.lock().expect("errors");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("unexpected "));
}

#[test]
fn commands_with_line_breaks_are_rejected() {
    let (listener, mut outbound) = established(HookRegistry::new());
    let result = futures::FutureExt::now_or_never(listener.session().api("status\nexit", ""));
    assert!(matches!(result, Some(Err(CommandError::InvalidCommand(_)))));
    assert_written!(outbound);
}
