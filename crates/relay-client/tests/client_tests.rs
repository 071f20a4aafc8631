//! Client tests against a live relay bound to an ephemeral port.

use relay_client::{RelayClient, UpdatePoller};
use relay_config::{MailboxConfig, ServerConfig};
use relay_core::{ChatId, EnvelopeKind, RelayError};
use relay_server::AppState;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "client-test-token";

struct TestRelay {
    url: String,
    shutdown: CancellationToken,
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn spawn_relay() -> TestRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(ServerConfig {
        auth_token: TOKEN.to_string(),
        ..Default::default()
    });
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        relay_server::serve(listener, state, &MailboxConfig::default(), token)
            .await
            .unwrap();
    });
    TestRelay {
        url: format!("http://{addr}"),
        shutdown,
    }
}

#[tokio::test]
async fn test_ping_and_health() {
    let relay = spawn_relay().await;
    let client = RelayClient::new(&relay.url, TOKEN);

    assert_eq!(client.ping().await.unwrap(), "pong");
    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.agents, 0);
}

#[tokio::test]
async fn test_register_send_and_poll() {
    let relay = spawn_relay().await;
    let client = RelayClient::new(&relay.url, TOKEN);

    client.register("alice").await.unwrap();
    let members = client.register("bob").await.unwrap();
    assert_eq!(members, vec!["alice".to_string(), "bob".to_string()]);

    let mut alice = UpdatePoller::new(client.clone(), "alice");
    let notices = alice.poll().await.unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, EnvelopeKind::AgentConnected);
    assert_eq!(alice.offset(), notices[0].update_id + 1);

    let sent = client
        .send_message("bob", ChatId::Numeric(7), "hey alice")
        .await
        .unwrap();
    assert_eq!(sent.recipients, 1);

    let got = alice.poll().await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].update_id, sent.message_id);
    assert_eq!(got[0].sender, "bob");
    assert_eq!(got[0].message.text(), Some("hey alice"));
    assert!(alice.poll().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forward_and_chat_action() {
    let relay = spawn_relay().await;
    let client = RelayClient::new(&relay.url, TOKEN);
    client.register("alice").await.unwrap();
    client.register("bob").await.unwrap();
    client.get_updates("alice", 0).await.unwrap();

    let raw = serde_json::json!({ "text": "custom", "sticker": "🦀" });
    client
        .forward_message("bob", ChatId::from("@room"), "custom", raw.clone())
        .await
        .unwrap();
    client
        .send_chat_action("bob", ChatId::from("@room"), "typing")
        .await
        .unwrap();

    let got = client.get_updates("alice", 0).await.unwrap();
    assert_eq!(serde_json::to_value(&got[0].message).unwrap(), raw);
}

#[tokio::test]
async fn test_heartbeat_reports_auto_registration() {
    let relay = spawn_relay().await;
    let client = RelayClient::new(&relay.url, TOKEN);
    assert!(client.heartbeat("carol").await.unwrap());
    assert!(!client.heartbeat("carol").await.unwrap());
    client.unregister("carol").await.unwrap();
    assert_eq!(client.health().await.unwrap().agents, 0);
}

#[tokio::test]
async fn test_errors_map_back_to_variants() {
    let relay = spawn_relay().await;
    let client = RelayClient::new(&relay.url, TOKEN);

    let err = client.unregister("ghost").await.unwrap_err();
    assert!(matches!(err, RelayError::UnknownAgent(ref id) if id == "ghost"));

    let err = client
        .send_message("alice", ChatId::Numeric(1), "")
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::InvalidBody(ref msg) if msg.contains("text")));

    let intruder = RelayClient::new(&relay.url, "wrong");
    let err = intruder.register("mallory").await.unwrap_err();
    assert!(matches!(err, RelayError::Unauthorized));
}

#[tokio::test]
async fn test_unreachable_relay_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RelayClient::new(format!("http://{addr}/"), TOKEN);
    assert_eq!(client.base_url(), format!("http://{addr}"));
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, RelayError::Transport(_)));
}
