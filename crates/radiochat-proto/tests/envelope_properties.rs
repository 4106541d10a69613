//! Property-based tests for envelope decoding.
//!
//! Inbound text comes from an untrusted peer, so decoding must never panic and
//! must classify every input as a frame or an error.

use proptest::prelude::*;
use radiochat_proto::{AckPayload, ProtoError, RawMessage, ServerFrame};
use serde_json::{Value, json};

/// Strategy for arbitrary JSON leaves used as loosely-typed fields.
fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        ".{0,16}".prop_map(Value::String),
    ]
}

proptest! {
    #[test]
    fn prop_decode_never_panics(text in ".{0,256}") {
        let _ = ServerFrame::decode(&text);
    }

    #[test]
    fn prop_message_fields_any_type(
        id in json_leaf(),
        content in json_leaf(),
        timestamp in json_leaf(),
        user in json_leaf(),
    ) {
        let text = json!({
            "event": "message",
            "data": { "id": id, "content": content, "user": user, "timestamp": timestamp },
        })
        .to_string();

        let frame = ServerFrame::decode(&text);
        prop_assert!(matches!(frame, Ok(ServerFrame::Message(_))));
    }

    #[test]
    fn prop_snapshot_preserves_entry_count(entries in prop::collection::vec(json_leaf(), 0..32)) {
        let text = json!({ "event": "recent-messages", "data": entries.clone() }).to_string();

        match ServerFrame::decode(&text) {
            Ok(ServerFrame::RecentMessages(raws)) => prop_assert_eq!(raws.len(), entries.len()),
            other => prop_assert!(false, "unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn prop_ack_survives_reencode(id in any::<u64>(), success in any::<bool>(), reason in proptest::option::of("[a-z ]{1,20}")) {
        let frame = ServerFrame::Ack {
            id,
            ack: Some(AckPayload { success, error: reason }),
        };
        let decoded = ServerFrame::decode(&frame.encode().unwrap()).unwrap();
        prop_assert_eq!(decoded, frame);
    }
}

#[test]
fn encoded_snapshot_decodes_to_same_messages() {
    let raws = vec![
        RawMessage::new("first").with_id("a").with_user("Alice", None),
        RawMessage::new("second").with_id("b").with_user("Bob", Some("b.png")),
    ];
    let text = ServerFrame::RecentMessages(raws.clone()).encode().unwrap();
    assert_eq!(ServerFrame::decode(&text).unwrap(), ServerFrame::RecentMessages(raws));
}

#[test]
fn unknown_event_is_not_malformed() {
    let text = json!({ "event": "presence", "data": [] }).to_string();
    assert_eq!(ServerFrame::decode(&text), Err(ProtoError::UnknownEvent("presence".into())));
}
