//! End-to-end tests of the chat service against the simulated server.
//!
//! Every test runs on tokio's paused clock, so deadlines resolve instantly
//! and elapsed times are exact.

use std::time::Duration;

use radiochat_app::{
    ChatConfig, ChatHandle, ChatService, ChatState, DEFAULT_STATE_POLL_INTERVAL, Delivery,
    DeliveryError, SendRequest, Signal,
};
use radiochat_harness::{AckPolicy, ChatSnapshot, InvariantRegistry, SimEnv, SimServer};
use radiochat_proto::RawMessage;
use serde_json::json;
use tokio::time::Instant;

fn start(server: &SimServer) -> ChatHandle {
    ChatService::new(ChatConfig::default(), server.connector(), SimEnv::with_seed(42)).start()
}

async fn wait_until(handle: &ChatHandle, mut condition: impl FnMut(&ChatState) -> bool) -> ChatState {
    let mut rx = handle.watch();
    let state = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| condition(s)))
        .await
        .expect("condition not reached")
        .expect("service stopped");
    state.clone()
}

async fn connected(server: &SimServer) -> ChatHandle {
    let handle = start(server);
    wait_until(&handle, |s| s.connected == Some(true)).await;
    handle
}

fn check_invariants(handle: &ChatHandle, context: &str) {
    InvariantRegistry::standard().assert_all(&ChatSnapshot::from_state(&handle.state()), context);
}

fn hello() -> SendRequest {
    SendRequest::new("hello", "Alice")
}

#[tokio::test(start_paused = true)]
async fn connects_and_loads_history() {
    let server = SimServer::new();
    server.set_history(vec![
        RawMessage::new("first").with_id("h1").with_user("Bob", None),
        RawMessage::new("second").with_id("h2").with_user("Carol", Some("c.png")),
    ]);

    let handle = start(&server);
    let mut signals = handle.subscribe();
    let state = wait_until(&handle, |s| s.messages.len() == 2).await;

    assert_eq!(state.connected, Some(true));
    assert_eq!(state.messages[0].content, "first");
    assert_eq!(state.messages[1].author.avatar.as_deref(), Some("c.png"));

    let mut replaced = None;
    while let Some(signal) = signals.try_recv() {
        if let Signal::SnapshotReplaced { count } = signal {
            replaced = Some(count);
        }
    }
    assert_eq!(replaced, Some(2));
    check_invariants(&handle, "after history load");
}

#[tokio::test(start_paused = true)]
async fn empty_history_sends_no_snapshot_signal() {
    let server = SimServer::new();
    let handle = start(&server);
    let mut signals = handle.subscribe();
    wait_until(&handle, |s| s.connected == Some(true)).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    while let Some(signal) = signals.try_recv() {
        assert!(!matches!(signal, Signal::SnapshotReplaced { .. }));
    }
    assert!(handle.state().messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn ack_resolves_without_touching_the_log() {
    let server = SimServer::new();
    server.set_echo(false);
    let handle = connected(&server).await;

    let outcome = handle.send(hello()).await;

    assert_eq!(outcome, Ok(Delivery::Acknowledged));
    let state = handle.state();
    assert!(state.messages.is_empty());
    assert!(!state.loading);
    assert_eq!(state.error, None);
    assert_eq!(server.received().len(), 1);
    assert_eq!(server.received()[0].user.name, "Alice");
}

#[tokio::test(start_paused = true)]
async fn echo_appears_in_the_log() {
    let server = SimServer::new();
    let handle = connected(&server).await;
    let mut signals = handle.subscribe();

    assert_eq!(handle.send(hello().with_avatar("a.png")).await, Ok(Delivery::Acknowledged));

    let state = handle.state();
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].content, "hello");
    assert_eq!(state.messages[0].author.avatar.as_deref(), Some("a.png"));

    let admitted = std::iter::from_fn(|| signals.try_recv())
        .filter(|signal| matches!(signal, Signal::MessageAdmitted(_)))
        .count();
    assert_eq!(admitted, 1);
    check_invariants(&handle, "after echo");
}

#[tokio::test(start_paused = true)]
async fn silent_server_is_assumed_delivered_after_ack_timeout() {
    let server = SimServer::new();
    server.set_ack_policy(AckPolicy::Silent);
    let handle = connected(&server).await;

    let started = Instant::now();
    let outcome = handle.send(hello()).await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, Ok(Delivery::Assumed));
    assert!(elapsed >= Duration::from_secs(3), "resolved early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(3200), "resolved late: {elapsed:?}");
    assert!(!handle.state().loading);
}

#[tokio::test(start_paused = true)]
async fn empty_ack_is_assumed_delivered() {
    let server = SimServer::new();
    server.set_ack_policy(AckPolicy::Empty);
    let handle = connected(&server).await;

    assert_eq!(handle.send(hello()).await, Ok(Delivery::Assumed));
}

#[tokio::test(start_paused = true)]
async fn rejection_surfaces_server_reason() {
    let server = SimServer::new();
    server.set_ack_policy(AckPolicy::Reject(Some("Message too long".into())));
    let handle = connected(&server).await;

    let outcome = handle.send(hello()).await;

    assert_eq!(outcome, Err(DeliveryError::Rejected("Message too long".into())));
    let state = handle.state();
    assert_eq!(state.error.as_deref(), Some("Message too long"));
    assert!(state.messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unexplained_rejection_uses_generic_text() {
    let server = SimServer::new();
    server.set_ack_policy(AckPolicy::Reject(None));
    let handle = connected(&server).await;

    let outcome = handle.send(hello()).await;

    assert_eq!(outcome, Err(DeliveryError::Rejected("Failed to send message".into())));
}

#[tokio::test(start_paused = true)]
async fn blank_sends_are_skipped() {
    let server = SimServer::new();
    let handle = connected(&server).await;

    assert_eq!(handle.send(SendRequest::new("   ", "Alice")).await, Ok(Delivery::Skipped));
    assert_eq!(handle.send(SendRequest::new("hi", " ")).await, Ok(Delivery::Skipped));
    assert!(server.received().is_empty());
    assert!(!handle.state().loading);
}

#[tokio::test(start_paused = true)]
async fn send_while_unreachable_fails_after_ready_wait() {
    let server = SimServer::new();
    server.set_reachable(false);
    let handle = start(&server);

    let started = Instant::now();
    let outcome = handle.send(hello()).await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, Err(DeliveryError::NotConnected));
    assert!(elapsed >= Duration::from_secs(1), "resolved early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1200), "resolved late: {elapsed:?}");
    assert!(handle.state().error.is_some());
    assert!(server.received().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_waits_for_a_connection_in_progress() {
    let server = SimServer::new();
    let handle = start(&server);

    // Submitted before the link has opened.
    assert_eq!(handle.send(hello()).await, Ok(Delivery::Acknowledged));
    assert_eq!(server.received().len(), 1);
    assert_eq!(server.connection_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_marks_disconnected_then_recovers() {
    let server = SimServer::new();
    let handle = connected(&server).await;

    server.drop_clients("server restart");
    wait_until(&handle, |s| s.connected == Some(false)).await;

    let state = wait_until(&handle, |s| s.connected == Some(true)).await;
    assert_eq!(state.error, None);
    assert_eq!(server.connection_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn unreported_loss_is_caught_by_polling() {
    let server = SimServer::new();
    let handle = connected(&server).await;

    server.vanish_clients();
    let started = Instant::now();
    wait_until(&handle, |s| s.connected == Some(false)).await;
    assert!(started.elapsed() <= Duration::from_secs(5));

    wait_until(&handle, |s| s.connected == Some(true)).await;
    assert_eq!(server.connection_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn retries_stop_after_budget_until_manual_reconnect() {
    let server = SimServer::new();
    server.set_reachable(false);
    let handle = start(&server);

    let state = wait_until(&handle, |s| s.connected == Some(false)).await;
    assert_eq!(state.error, None, "a retryable failure is not shown");
    assert!(server.connection_attempts() < 5);

    let state = wait_until(&handle, |s| s.error.is_some()).await;
    assert_eq!(state.connected, Some(false));
    assert_eq!(
        state.error.as_deref(),
        Some("Unable to reach the chat server after 5 attempts")
    );
    assert_eq!(server.connection_attempts(), 5);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(server.connection_attempts(), 5);

    server.set_reachable(true);
    handle.reconnect().await;
    let state = wait_until(&handle, |s| s.connected == Some(true)).await;
    assert_eq!(state.error, None);
    assert_eq!(server.connection_attempts(), 6);
}

#[tokio::test(start_paused = true)]
async fn server_error_event_sets_error_text() {
    let server = SimServer::new();
    let handle = connected(&server).await;

    server.push_error(json!("rate limited"));
    let state = wait_until(&handle, |s| s.error.is_some()).await;
    assert_eq!(state.error.as_deref(), Some("rate limited"));
    assert_eq!(state.connected, Some(false));

    server.push_error(json!({ "code": 500 }));
    let state =
        wait_until(&handle, |s| s.error.as_deref() == Some("Chat connection error")).await;
    assert_eq!(state.connected, Some(false));
}

#[tokio::test(start_paused = true)]
async fn server_error_clears_when_poll_finds_the_link_up() {
    let server = SimServer::new();
    let handle = connected(&server).await;

    server.push_error(json!("rate limited"));
    wait_until(&handle, |s| s.error.is_some()).await;
    let raised = Instant::now();

    let state = wait_until(&handle, |s| s.error.is_none()).await;
    assert_eq!(state.connected, Some(true));
    assert!(raised.elapsed() <= DEFAULT_STATE_POLL_INTERVAL);
    assert_eq!(server.connection_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn replayed_and_anonymous_messages() {
    let server = SimServer::new();
    let handle = connected(&server).await;

    let known = RawMessage::new("once").with_id("m1").with_user("Bob", None);
    server.push_message(known.clone());
    server.push_message(known);
    server.push_message(RawMessage::new("same"));
    server.push_message(RawMessage::new("same"));
    server.push_message(RawMessage::new("   "));
    server.push_message(RawMessage::new("last").with_id("m9"));

    let state = wait_until(&handle, |s| s.messages.iter().any(|m| m.id.as_str() == "m9")).await;
    let contents: Vec<_> = state.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["once", "same", "same", "last"]);
    assert_eq!(state.messages[1].author.name, "Anonymous");
    assert_ne!(state.messages[1].id, state.messages[2].id);
    check_invariants(&handle, "after replay");
}

#[tokio::test(start_paused = true)]
async fn snapshot_replaces_the_log() {
    let server = SimServer::new();
    let handle = connected(&server).await;
    server.push_message(RawMessage::new("live").with_id("m1"));
    wait_until(&handle, |s| s.messages.len() == 1).await;

    server.push_snapshot(vec![
        RawMessage::new("a").with_id("s1"),
        RawMessage::new("b").with_id("s2"),
        RawMessage::new("a again").with_id("s1"),
    ]);
    let state = wait_until(&handle, |s| s.messages.first().is_some_and(|m| m.id.as_str() == "s1")).await;
    assert_eq!(state.messages.len(), 2);

    // Ids from the snapshot are now known.
    server.push_message(RawMessage::new("b").with_id("s2"));
    server.push_message(RawMessage::new("c").with_id("s3"));
    let state = wait_until(&handle, |s| s.messages.len() == 3).await;
    assert_eq!(state.messages[2].content, "c");
    check_invariants(&handle, "after snapshot");
}

#[tokio::test(start_paused = true)]
async fn clear_empties_the_log_only_locally() {
    let server = SimServer::new();
    let handle = connected(&server).await;
    server.push_message(RawMessage::new("x").with_id("m1"));
    wait_until(&handle, |s| !s.messages.is_empty()).await;

    handle.clear().await;
    wait_until(&handle, |s| s.messages.is_empty()).await;

    // The cache was cleared too, so the same id is admitted again.
    server.push_message(RawMessage::new("x").with_id("m1"));
    wait_until(&handle, |s| s.messages.len() == 1).await;
    assert_eq!(handle.state().connected, Some(true));
}

#[tokio::test(start_paused = true)]
async fn shutdown_fails_pending_sends() {
    let server = SimServer::new();
    server.set_ack_policy(AckPolicy::Silent);
    let handle = connected(&server).await;

    let sender = handle.clone();
    let pending = tokio::spawn(async move { sender.send(hello()).await });
    wait_until(&handle, |s| s.loading).await;

    handle.shutdown().await;

    assert_eq!(pending.await.unwrap(), Err(DeliveryError::Stopped));
    assert_eq!(handle.state().connected, Some(false));
    assert!(!handle.is_running());
    assert_eq!(handle.send(hello()).await, Err(DeliveryError::Stopped));
}

#[tokio::test(start_paused = true)]
async fn dropped_subscription_stops_receiving() {
    let server = SimServer::new();
    let handle = connected(&server).await;
    let mut kept = handle.subscribe();
    let dropped = handle.subscribe();
    dropped.unsubscribe();

    server.push_message(RawMessage::new("x").with_id("m1"));
    wait_until(&handle, |s| s.messages.len() == 1).await;

    let mut saw_message = false;
    while let Some(signal) = kept.try_recv() {
        saw_message |= matches!(signal, Signal::MessageAdmitted(_));
    }
    assert!(saw_message);
}
