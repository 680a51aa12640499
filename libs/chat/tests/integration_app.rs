//! Integration tests: chat handlers wired into a live session

#[macro_use]
mod common;

use chat::{session_builder, ChatConfig, ChatState};
use common::{wait_until, Loopback};
use iotsockets::{Credentials, StaticCredentials};
use serde_json::json;

const CONFIG: &str = r#"
aws:
  region: us-east-1
  endpoint: abc123-ats.iot.us-east-1.amazonaws.com
  credentials: env
app:
  name: lobby
  presence_host: kiosk-7
  presence_path: /chat
  target_language: en
  history_size: 10
"#;

fn credentials() -> StaticCredentials {
    StaticCredentials::new(Credentials::new("AK", "SK", None))
}

#[tokio::test]
async fn test_handlers_share_chat_state() {
    verbose_println!("Testing chat wiring...");

    let config = ChatConfig::from_yaml_str(CONFIG).unwrap();
    config.validate().unwrap();
    let state = ChatState::shared(&config.app.target_language, config.app.history_size);
    let transport = Loopback::default();

    let session = session_builder(&config, &state, credentials())
        .build(transport.clone())
        .await
        .unwrap();
    session.start().unwrap();
    assert!(wait_until(|| session.is_connected()).await);

    let own = session.inbound_topic().unwrap();
    assert!(own.starts_with("lobby/in/"));
    assert_eq!(
        transport.published()[0],
        (
            "lobby/out".to_string(),
            json!({"connected": true, "host": "kiosk-7", "path": "/chat"})
        )
    );

    transport.deliver(&own, json!({"run": "set_target_language", "language": "de"}));
    transport.deliver(
        "lobby/room/1",
        json!({"message": {"text": "hola", "source_lang": "es", "custom_term": "lobby", "timestamp": 1}}),
    );
    transport.deliver(
        "lobby/room/1",
        json!({"message": {"text": "hallo", "source_lang": "de", "timestamp": 2}}),
    );
    transport.deliver(&own, json!({"run": "notify", "text": "closing soon"}));

    assert!(wait_until(|| state.read().notices().count() == 1).await);

    let state = state.read();
    assert_eq!(state.target_language(), "de");

    let lines: Vec<_> = state.history().cloned().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].needs_translation);
    assert_eq!(lines[0].terminology.as_deref(), Some("lobby-es"));
    assert!(!lines[1].needs_translation);
    assert_eq!(lines[1].terminology, None);

    assert_eq!(state.notices().next().map(|n| n.text.as_str()), Some("closing soon"));
}

#[tokio::test]
async fn test_empty_target_language_is_ignored() {
    let config = ChatConfig::from_yaml_str(CONFIG).unwrap();
    let state = ChatState::shared("en", 10);
    let transport = Loopback::default();

    let session = session_builder(&config, &state, credentials())
        .build(transport.clone())
        .await
        .unwrap();
    session.start().unwrap();
    assert!(wait_until(|| session.is_connected()).await);

    let own = session.inbound_topic().unwrap();
    transport.deliver(&own, json!({"run": "set_target_language", "language": "  "}));
    transport.deliver(&own, json!({"run": "ping"}));

    assert!(wait_until(|| transport.published().len() == 2).await);
    assert_eq!(state.read().target_language(), "en");
    assert_eq!(session.metrics().commands_dispatched, 2);
}
