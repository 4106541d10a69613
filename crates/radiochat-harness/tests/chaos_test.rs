//! Randomized server behavior against the real runtime.
//!
//! Each case drives a running chat service through an arbitrary sequence of
//! server events, faults and user commands on a paused clock, checking the
//! message-log invariants after every step.

use std::time::Duration;

use proptest::prelude::*;
use radiochat_app::{ChatConfig, ChatService, Delivery, SendRequest};
use radiochat_harness::{AckPolicy, ChatSnapshot, InvariantRegistry, SimEnv, SimServer};
use radiochat_proto::RawMessage;
use serde_json::json;

#[derive(Debug, Clone)]
enum Step {
    Push { id: Option<u8>, content: String, author: Option<String> },
    Snapshot(Vec<(Option<u8>, String)>),
    Error,
    Drop,
    Vanish,
    Reachable(bool),
    Policy(AckPolicy),
    Send(String),
    Reconnect,
    Clear,
    Advance(u64),
}

fn content() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z]{1,8}",
        1 => Just(String::new()),
        1 => Just("   ".to_string()),
        1 => " [a-z]{1,4} ",
    ]
}

fn policy() -> impl Strategy<Value = AckPolicy> {
    prop_oneof![
        Just(AckPolicy::Accept),
        Just(AckPolicy::Silent),
        Just(AckPolicy::Empty),
        Just(AckPolicy::Reject(None)),
        Just(AckPolicy::Reject(Some("nope".to_string()))),
    ]
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => (prop::option::of(0u8..16), content(), prop::option::of("[A-Z][a-z]{0,5}"))
            .prop_map(|(id, content, author)| Step::Push { id, content, author }),
        1 => prop::collection::vec((prop::option::of(0u8..16), content()), 0..8)
            .prop_map(Step::Snapshot),
        1 => Just(Step::Error),
        1 => Just(Step::Drop),
        1 => Just(Step::Vanish),
        1 => any::<bool>().prop_map(Step::Reachable),
        1 => policy().prop_map(Step::Policy),
        2 => content().prop_map(Step::Send),
        1 => Just(Step::Reconnect),
        1 => Just(Step::Clear),
        2 => (1u64..8_000).prop_map(Step::Advance),
    ]
}

fn raw(id: Option<u8>, content: &str) -> RawMessage {
    let raw = RawMessage::new(content);
    match id {
        Some(id) => raw.with_id(format!("m{id}")),
        None => raw,
    }
}

fn run_case(seed: u64, steps: Vec<Step>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async move {
        let server = SimServer::new();
        let handle =
            ChatService::new(ChatConfig::default(), server.connector(), SimEnv::with_seed(seed))
                .start();
        let registry = InvariantRegistry::standard();
        let mut sends = Vec::new();

        for (index, step) in steps.into_iter().enumerate() {
            match step.clone() {
                Step::Push { id, content, author } => {
                    let mut message = raw(id, &content);
                    if let Some(author) = author {
                        message = message.with_user(author, None);
                    }
                    server.push_message(message);
                },
                Step::Snapshot(entries) => {
                    server.push_snapshot(
                        entries.iter().map(|(id, content)| raw(*id, content)).collect(),
                    );
                },
                Step::Error => server.push_error(json!("boom")),
                Step::Drop => server.drop_clients("chaos"),
                Step::Vanish => server.vanish_clients(),
                Step::Reachable(reachable) => server.set_reachable(reachable),
                Step::Policy(policy) => server.set_ack_policy(policy),
                Step::Send(content) => {
                    let sender = handle.clone();
                    let blank = content.trim().is_empty();
                    let task = tokio::spawn(async move {
                        sender.send(SendRequest::new(content, "Chaos")).await
                    });
                    sends.push((blank, task));
                },
                Step::Reconnect => handle.reconnect().await,
                Step::Clear => handle.clear().await,
                Step::Advance(millis) => tokio::time::sleep(Duration::from_millis(millis)).await,
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
            let context = format!("after step {index} ({step:?})");
            registry.assert_all(&ChatSnapshot::from_state(&handle.state()), &context);
        }

        handle.shutdown().await;
        assert_eq!(handle.state().connected, Some(false));

        // Every send resolves one way or another once the service stops.
        for (blank, task) in sends {
            let outcome = task.await.unwrap();
            if blank {
                assert_eq!(outcome, Ok(Delivery::Skipped));
            }
        }
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn log_invariants_hold_under_chaos(seed in any::<u64>(), steps in prop::collection::vec(step(), 1..40)) {
        run_case(seed, steps);
    }
}

#[test]
fn recovers_after_outage() {
    run_case(7, vec![
        Step::Reachable(false),
        Step::Drop,
        Step::Advance(30_000),
        Step::Reachable(true),
        Step::Reconnect,
        Step::Push { id: Some(1), content: "back".into(), author: None },
        Step::Send("hello".into()),
        Step::Advance(4_000),
    ]);
}
