//! Integration tests for the session state machine
//!
//! Drives a real session task against the in-memory broker.

#[macro_use]
mod common;

use common::*;
use iotsockets::*;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn base_builder() -> SessionBuilder<states::HasEndpoint, states::HasCredentials> {
    iotsockets::builder()
        .endpoint("a.iot.us-east-1.amazonaws.com", "us-east-1")
        .credentials(test_credentials())
        .clock(SteppingClock::starting_at(reference_instant()))
        .presence("kiosk-1", "/chat")
        .reconnect_strategy(FixedDelay::new(Duration::from_millis(10), None))
}

async fn connected_session(
    builder: SessionBuilder<states::HasEndpoint, states::HasCredentials>,
    broker: &MockBroker,
) -> (Session, String) {
    let session = builder.build(broker.clone()).await.unwrap();
    session.start().unwrap();

    let event = wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. }))
        .await
        .expect("session should connect");
    let SessionEvent::Connected { client_id } = event else {
        unreachable!()
    };
    (session, client_id)
}

#[derive(Clone, Default)]
struct Collect {
    seen: Arc<Mutex<Vec<DataMessage>>>,
}

impl DataHandler for Collect {
    fn on_message_arrived(&mut self, message: DataMessage) -> Result<()> {
        self.seen.lock().push(message);
        Ok(())
    }
}

#[tokio::test]
async fn test_session_is_idle_until_started() {
    let broker = MockBroker::new();
    let session = base_builder().build(broker.clone()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.client_id().is_none());
    assert!(broker.requests().is_empty());
}

#[tokio::test]
async fn test_connect_subscribes_and_announces_presence() {
    verbose_println!("Testing connect sequence...");
    let broker = MockBroker::new();
    let (session, client_id) = connected_session(base_builder(), &broker).await;

    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.client_id().as_deref(), Some(client_id.as_str()));
    assert_eq!(client_id.len(), 17);
    assert!(client_id.chars().all(|c| c.is_ascii_digit()));

    let inbound = format!("chat/in/{}", client_id);
    assert_eq!(session.inbound_topic().as_deref(), Some(inbound.as_str()));

    let ops = broker.ops_on(0);
    assert_eq!(ops[0], Op::Subscribe(inbound));
    assert_eq!(
        broker.published_to("chat/out"),
        vec![json!({"connected": true, "host": "kiosk-1", "path": "/chat"})]
    );

    let request = &broker.requests()[0];
    assert_eq!(request.client_id, client_id);
    assert!(request.url.starts_with("wss://a.iot.us-east-1.amazonaws.com/mqtt?"));
    assert_eq!(
        query_param(&request.url, "X-Amz-Security-Token").as_deref(),
        Some("token")
    );

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_loss_reconnects_with_fresh_identity_and_signature() {
    verbose_println!("Testing reconnect after loss...");
    let broker = MockBroker::new();
    let (session, first_id) = connected_session(base_builder(), &broker).await;

    broker.lose(0, "keep-alive timeout");

    let lost = wait_for_event(&session, |e| matches!(e, SessionEvent::Lost(_))).await;
    assert_eq!(lost, Some(SessionEvent::Lost("keep-alive timeout".to_string())));

    let event = wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. }))
        .await
        .expect("session should reconnect");
    let SessionEvent::Connected { client_id: second_id } = event else {
        unreachable!()
    };

    assert_ne!(first_id, second_id);

    let requests = broker.requests();
    assert_eq!(requests.len(), 2);
    let first_date = query_param(&requests[0].url, "X-Amz-Date").unwrap();
    let second_date = query_param(&requests[1].url, "X-Amz-Date").unwrap();
    assert_ne!(first_date, second_date);
    assert_ne!(
        query_param(&requests[0].url, "X-Amz-Signature"),
        query_param(&requests[1].url, "X-Amz-Signature")
    );

    // Old identity released before the new attempt
    let old_ops = broker.ops_on(0);
    assert!(old_ops.contains(&Op::Unsubscribe(format!("chat/in/{}", first_id))));
    assert_eq!(old_ops.last(), Some(&Op::Disconnect));
    assert_eq!(
        broker.ops_on(1)[0],
        Op::Subscribe(format!("chat/in/{}", second_id))
    );

    assert_eq!(session.metrics().reconnect_count, 1);
    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_exhausted_strategy_leaves_session_lost() {
    let broker = MockBroker::new();
    let (session, _) =
        connected_session(base_builder().reconnect_strategy(NeverReconnect), &broker).await;

    broker.lose(0, "");

    assert!(wait_for_event(&session, |e| matches!(e, SessionEvent::Lost(_))).await.is_some());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.state(), SessionState::Lost);
    assert!(session.client_id().is_none());
    assert_eq!(broker.requests().len(), 1);

    // A caller restart still works
    session.start().unwrap();
    assert!(
        wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. }))
            .await
            .is_some()
    );
    assert_eq!(broker.requests().len(), 2);
}

#[tokio::test]
async fn test_ping_replies_with_pong() {
    let broker = MockBroker::new();
    let (session, client_id) = connected_session(base_builder(), &broker).await;

    broker.deliver(0, &format!("chat/in/{}", client_id), json!({"run": "ping"}));

    assert!(wait_until(|| broker.published_to("chat/out").len() == 2).await);
    assert_eq!(
        broker.published_to("chat/out")[1],
        json!({"pong": true, "clientId": client_id})
    );
    assert_eq!(
        wait_for_event(&session, |e| matches!(e, SessionEvent::CommandReceived(_))).await,
        Some(SessionEvent::CommandReceived(CommandKind::Ping))
    );
}

#[tokio::test]
async fn test_reconnect_command_restarts_with_new_identity() {
    let broker = MockBroker::new();
    let (session, first_id) = connected_session(base_builder(), &broker).await;

    broker.deliver(0, &format!("chat/in/{}", first_id), json!({"run": "reconnect"}));

    let event = wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. }))
        .await
        .expect("session should restart");
    let SessionEvent::Connected { client_id: second_id } = event else {
        unreachable!()
    };

    assert_ne!(first_id, second_id);
    assert!(broker
        .ops_on(0)
        .contains(&Op::Unsubscribe(format!("chat/in/{}", first_id))));
    assert_eq!(broker.requests().len(), 2);
}

#[tokio::test]
async fn test_start_while_connected_supersedes_connection() {
    let broker = MockBroker::new();
    let (session, first_id) = connected_session(base_builder(), &broker).await;

    session.start().unwrap();

    let event = wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. }))
        .await
        .expect("session should restart");
    assert_ne!(event, SessionEvent::Connected { client_id: first_id.clone() });
    assert!(broker
        .ops_on(0)
        .contains(&Op::Unsubscribe(format!("chat/in/{}", first_id))));
}

#[tokio::test]
async fn test_commands_and_data_are_dispatched() {
    let broker = MockBroker::new();
    let notices = Arc::new(Mutex::new(Vec::new()));
    let collect = Collect::default();

    let builder = {
        let notices = Arc::clone(&notices);
        base_builder()
            .data_handler(collect.clone())
            .command(CommandKind::Notify, move |m: CommandMessage| -> Result<()> {
                if let Command::Notify { text } = m.command {
                    notices.lock().push(text);
                }
                Ok(())
            })
    };
    let (session, client_id) = connected_session(builder, &broker).await;
    let own = format!("chat/in/{}", client_id);

    broker.deliver(0, &own, json!({"run": "notify", "text": "maintenance at 18:00"}));
    broker.deliver(
        0,
        "chat/room/1",
        json!({"message": {"text": "hola", "source_lang": "es", "timestamp": 1705307400000i64}}),
    );
    // Command shape on a foreign topic is data, and lacks `message`
    broker.deliver(0, "chat/in/999", json!({"run": "notify", "text": "x"}));
    broker.deliver(0, &own, json!({"run": "rm -rf"}));
    broker.deliver_raw(0, &own, b"{not json".to_vec());

    assert!(wait_until(|| session.metrics().messages_received == 5).await);

    assert_eq!(*notices.lock(), vec!["maintenance at 18:00".to_string()]);
    let data = collect.seen.lock().clone();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].destination_topic, "chat/room/1");
    assert_eq!(data[0].message.text, "hola");

    let metrics = session.metrics();
    assert_eq!(metrics.commands_dispatched, 1);
    assert_eq!(metrics.data_dispatched, 1);
    assert_eq!(metrics.parse_errors, 3);
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_messages_without_data_handler_are_discarded() {
    let broker = MockBroker::new();
    let (session, _) = connected_session(base_builder(), &broker).await;

    broker.deliver(
        0,
        "chat/room/1",
        json!({"message": {"text": "hi", "source_lang": "en", "timestamp": "t1"}}),
    );

    assert!(wait_until(|| session.metrics().messages_discarded == 1).await);
    assert_eq!(session.metrics().data_dispatched, 0);
}

#[tokio::test]
async fn test_credential_failure_is_not_retried() {
    let broker = MockBroker::new();
    let failing = FailingCredentials::default();
    let calls = Arc::clone(&failing.calls);

    let session = iotsockets::builder()
        .endpoint("a.iot.us-east-1.amazonaws.com", "us-east-1")
        .credentials(failing)
        .reconnect_strategy(FixedDelay::new(Duration::from_millis(5), None))
        .retry_failed_connects(true)
        .build(broker.clone())
        .await
        .unwrap();
    session.start().unwrap();

    let event = wait_for_event(&session, |e| matches!(e, SessionEvent::CredentialsFailed(_))).await;
    assert!(event.is_some());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(broker.requests().is_empty());
    assert_eq!(session.state(), SessionState::Connecting);
    assert!(session.client_id().is_none());
}

#[tokio::test]
async fn test_refused_connect_waits_for_caller_by_default() {
    let broker = MockBroker::new();
    broker.refuse_next(1);

    let session = base_builder().build(broker.clone()).await.unwrap();
    session.start().unwrap();

    assert!(
        wait_for_event(&session, |e| matches!(e, SessionEvent::ConnectFailed(_)))
            .await
            .is_some()
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(broker.requests().len(), 1);
    assert_eq!(session.state(), SessionState::Connecting);

    session.start().unwrap();
    assert!(
        wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. }))
            .await
            .is_some()
    );
    assert_eq!(broker.requests().len(), 2);
}

#[tokio::test]
async fn test_refused_connect_retries_when_enabled() {
    let broker = MockBroker::new();
    broker.refuse_next(2);

    let session = base_builder()
        .retry_failed_connects(true)
        .build(broker.clone())
        .await
        .unwrap();
    session.start().unwrap();

    assert!(
        wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. }))
            .await
            .is_some()
    );

    let requests = broker.requests();
    assert_eq!(requests.len(), 3);
    assert_ne!(requests[0].client_id, requests[1].client_id);
    assert_eq!(session.metrics().connect_attempts, 3);
}

#[tokio::test]
async fn test_publish_and_shutdown() {
    let broker = MockBroker::new();
    let (session, client_id) = connected_session(base_builder(), &broker).await;

    session
        .publish_json("chat/room/1", &json!({"message": {"text": "hello"}}))
        .unwrap();
    assert!(wait_until(|| broker.published_to("chat/room/1").len() == 1).await);
    assert_eq!(session.metrics().messages_published, 2);

    let events = session.event_receiver();
    session.shutdown().await.unwrap();

    let ops = broker.ops_on(0);
    assert!(ops.contains(&Op::Unsubscribe(format!("chat/in/{}", client_id))));
    assert_eq!(ops.last(), Some(&Op::Disconnect));
    assert!(events.try_iter().any(|e| e == SessionEvent::Stopped));
}

#[tokio::test]
async fn test_build_rejects_empty_endpoint() {
    let result = iotsockets::builder()
        .endpoint("", "us-east-1")
        .credentials(test_credentials())
        .build(MockBroker::new())
        .await;

    assert!(matches!(result, Err(IotSocketError::Configuration(_))));
}

#[tokio::test]
async fn test_flapping_connection_keeps_growing_backoff() {
    verbose_println!("Testing backoff across short-lived connections...");

    let broker = MockBroker::new();
    let session = base_builder()
        .reconnect_strategy(ExponentialBackoff::new(
            Duration::from_millis(5),
            Duration::from_secs(60),
            None,
        ))
        .build(broker.clone())
        .await
        .unwrap();
    session.start().unwrap();

    let mut observed = Vec::new();
    for index in 0..5 {
        assert!(
            wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. }))
                .await
                .is_some(),
            "connection {} should come up",
            index
        );
        broker.lose(index, "subscription rejected");

        match wait_for_event(&session, |e| matches!(e, SessionEvent::Reconnecting { .. })).await {
            Some(SessionEvent::Reconnecting { attempt, delay }) => observed.push((attempt, delay)),
            other => panic!("expected reconnecting, got {:?}", other),
        }
    }

    let expected: Vec<_> = [5, 10, 20, 40, 80]
        .iter()
        .enumerate()
        .map(|(i, ms)| (i + 1, Duration::from_millis(*ms)))
        .collect();
    assert_eq!(observed, expected);
}

#[tokio::test]
async fn test_stable_connection_resets_backoff() {
    let broker = MockBroker::new();
    let session = base_builder()
        .reconnect_strategy(ExponentialBackoff::new(
            Duration::from_millis(5),
            Duration::from_secs(60),
            None,
        ))
        .stable_after(Duration::from_millis(100))
        .build(broker.clone())
        .await
        .unwrap();
    session.start().unwrap();

    assert!(wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. })).await.is_some());
    broker.lose(0, "dropped at once");
    let first = wait_for_event(&session, |e| matches!(e, SessionEvent::Reconnecting { .. })).await;
    assert_eq!(
        first,
        Some(SessionEvent::Reconnecting { attempt: 1, delay: Duration::from_millis(5) })
    );

    assert!(wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. })).await.is_some());
    broker.lose(1, "dropped at once");
    let second = wait_for_event(&session, |e| matches!(e, SessionEvent::Reconnecting { .. })).await;
    assert_eq!(
        second,
        Some(SessionEvent::Reconnecting { attempt: 2, delay: Duration::from_millis(10) })
    );

    // This one outlives the threshold
    assert!(wait_for_event(&session, |e| matches!(e, SessionEvent::Connected { .. })).await.is_some());
    tokio::time::sleep(Duration::from_millis(150)).await;
    broker.lose(2, "dropped after a while");
    let third = wait_for_event(&session, |e| matches!(e, SessionEvent::Reconnecting { .. })).await;
    assert_eq!(
        third,
        Some(SessionEvent::Reconnecting { attempt: 1, delay: Duration::from_millis(5) })
    );
}

#[tokio::test]
async fn test_shutdown_interrupts_pending_credentials() {
    let broker = MockBroker::new();
    let stalling = StallingCredentials::default();
    let calls = Arc::clone(&stalling.calls);

    let session = iotsockets::builder()
        .endpoint("a.iot.us-east-1.amazonaws.com", "us-east-1")
        .credentials(stalling)
        .build(broker.clone())
        .await
        .unwrap();
    let events = session.event_receiver();
    session.start().unwrap();

    assert!(wait_until(|| calls.load(Ordering::SeqCst) == 1).await);

    // A second start abandons the stuck call and asks again
    session.start().unwrap();
    assert!(wait_until(|| calls.load(Ordering::SeqCst) == 2).await);

    let shutdown = tokio::time::timeout(Duration::from_secs(1), session.shutdown()).await;
    assert!(matches!(shutdown, Ok(Ok(()))));
    assert!(events.try_iter().any(|e| e == SessionEvent::Stopped));
    assert!(broker.requests().is_empty());
}
