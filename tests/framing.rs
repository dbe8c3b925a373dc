//! Reassembly of frames from arbitrarily chunked input.

use eslframe::{FrameParser, Message, MessageKind};
use eslframe_testing::{api_response, command_reply, event_frame, json_event_frame, plain_event_frame};
use proptest::prelude::*;

fn parse_all(parser: &mut FrameParser, chunks: &[&[u8]]) -> Vec<Message> {
    chunks
        .iter()
        .flat_map(|chunk| parser.feed(chunk).collect::<Vec<_>>())
        .map(|frame| frame.expect("valid frame"))
        .collect()
}

fn frame_strategy() -> impl Strategy<Value = Vec<u8>> {
    let name = "[A-Z][A-Z_]{0,15}";
    let value = "[a-zA-Z0-9 +./-]{0,24}";
    prop_oneof![
        (name, value).prop_map(|(n, v)| event_frame(&n, &[("Variable-Test", &v)]).to_vec()),
        (name, value).prop_map(|(n, v)| plain_event_frame(&n, &[("Caller", &v)]).to_vec()),
        (name, value).prop_map(|(n, v)| json_event_frame(&n, &[("Caller", &v)]).to_vec()),
        value.prop_map(|v| api_response(&v).to_vec()),
        value.prop_map(|v| command_reply(&format!("+OK {v}")).to_vec()),
    ]
}

proptest! {
    #[test]
    fn chunking_does_not_change_the_result(
        frames in prop::collection::vec(frame_strategy(), 1..8),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..12),
    ) {
        let stream: Vec<u8> = frames.concat();

        let whole = parse_all(&mut FrameParser::default(), &[&stream]);

        let mut offsets: Vec<usize> = cuts.iter().map(|i| i.index(stream.len() + 1)).collect();
        offsets.push(0);
        offsets.push(stream.len());
        offsets.sort_unstable();
        offsets.dedup();
        let chunks: Vec<&[u8]> = offsets.windows(2).map(|w| &stream[w[0]..w[1]]).collect();
        let mut parser = FrameParser::default();
        let chunked = parse_all(&mut parser, &chunks);

        prop_assert_eq!(whole.len(), frames.len());
        prop_assert_eq!(&chunked, &whole);
        prop_assert!(parser.finish().expect("clean end").is_none());
    }

    #[test]
    fn single_byte_feeding_matches(frames in prop::collection::vec(frame_strategy(), 1..4)) {
        let stream: Vec<u8> = frames.concat();
        let whole = parse_all(&mut FrameParser::default(), &[&stream]);
        let bytes: Vec<&[u8]> = stream.chunks(1).collect();
        let chunked = parse_all(&mut FrameParser::default(), &bytes);
        prop_assert_eq!(chunked, whole);
    }
}

#[test]
fn several_frames_in_one_feed_arrive_in_order() {
    let stream = [
        event_frame("FIRST", &[]),
        api_response("+OK middle"),
        event_frame("LAST", &[]),
    ]
    .concat();
    let messages = parse_all(&mut FrameParser::default(), &[&stream]);
    let kinds: Vec<MessageKind> = messages.iter().map(Message::kind).collect();
    assert_eq!(
        kinds,
        vec![MessageKind::Event, MessageKind::ApiReply, MessageKind::Event]
    );
    assert_eq!(messages[0].event_name(), Some("FIRST"));
    assert_eq!(messages[1].body_str(), Some("+OK middle"));
    assert_eq!(messages[2].event_name(), Some("LAST"));
}

#[test]
fn garbage_lines_do_not_wedge_the_parser() {
    let mut parser = FrameParser::default();
    let frames: Vec<_> = parser
        .feed(b"no separator here\nContent-Type: command/reply\n: nameless\nReply-Text: +OK\n\n")
        .collect::<Result<_, _>>()
        .expect("frame");
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].reply_text(), Some("+OK"));
    assert_eq!(frames[0].headers().len(), 2);
}
