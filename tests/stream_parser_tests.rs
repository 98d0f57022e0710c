use fencepost::api::stream::StreamParser;
use fencepost::types::{Role, TransportEvent};

fn delta(text: &str) -> TransportEvent {
    TransportEvent::Delta {
        role: Role::Assistant,
        text: text.to_string(),
    }
}

#[test]
fn test_fragmented_events() {
    let mut parser = StreamParser::new();

    let chunk1 = b"event: content_block_delta\ndata: {\"type\":\"content";
    assert!(parser.process(chunk1).is_empty());

    let chunk2 =
        b"_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n";
    assert_eq!(parser.process(chunk2), vec![delta("Hi")]);
}

#[test]
fn test_multibyte_character_split_across_chunks() {
    let mut parser = StreamParser::new();
    let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9} \u{2615}\"},\"finish_reason\":null}]}\n\n"
        .as_bytes();
    // Split inside the two-byte 'é'.
    let split = frame
        .iter()
        .position(|byte| *byte == 0xC3)
        .expect("frame contains e-acute")
        + 1;

    assert!(parser.process(&frame[..split]).is_empty());
    assert_eq!(parser.process(&frame[split..]), vec![delta("caf\u{e9} \u{2615}")]);
}

#[test]
fn test_parse_error_handling() {
    let mut parser = StreamParser::new();

    let events = parser.process(b"event: message_start\ndata: {invalid json}\n\n");
    assert!(events.is_empty(), "malformed frames are skipped, not fatal");

    let events = parser.process(
        b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"still here\"}}\n\n",
    );
    assert_eq!(events, vec![delta("still here")]);
}

#[test]
fn test_anthropic_turn_maps_to_deltas_and_completion() {
    let mut parser = StreamParser::new();
    let body = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"role\":\"assistant\",\"content\":[]}}\n\n",
        "event: ping\n",
        "data: {\"type\":\"ping\"}\n\n",
        "event: content_block_start\n",
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"```js\\n\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{}\"}}\n\n",
        "event: content_block_stop\n",
        "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
        "event: message_delta\n",
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );

    let events = parser.process(body.as_bytes());
    assert_eq!(events, vec![delta("```js\n"), TransportEvent::Complete]);
}

#[test]
fn test_openai_stream_maps_to_unified_events() {
    let mut parser = StreamParser::new();

    let chunk1 = br#"data: {"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}

data: {"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Here you go"},"finish_reason":null}]}

"#;
    assert_eq!(parser.process(chunk1), vec![delta("Here you go")]);

    let chunk2 = br#"data: {"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}

data: [DONE]

"#;
    assert_eq!(parser.process(chunk2), vec![TransportEvent::Complete]);
    assert!(parser.is_completed());
}
