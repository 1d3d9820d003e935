//! End-to-end tests against a real bound listener, in the style of the
//! teacher's `tests/e2e` suite: spawn the gateway on `127.0.0.1:0`, drive it
//! with real HTTP/WebSocket clients.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use vla_core::NullActuator;

async fn spawn_gateway() -> (String, String, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let actuator: Arc<dyn vla_core::Actuator> = Arc::new(NullActuator::new(1920, 1080));
    let root_path = root.path().to_path_buf();
    tokio::spawn(vla_gateway::run_gateway_on_listener(listener, root_path, actuator));

    let key_path = root.path().join("config").join("secrets").join("api_key");
    for _ in 0..200 {
        if key_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let api_key = std::fs::read_to_string(&key_path).unwrap().trim().to_string();

    (format!("http://{addr}"), api_key, root)
}

#[tokio::test]
#[serial_test::serial]
async fn health_requires_no_auth() {
    let (base, _key, _root) = spawn_gateway().await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
#[serial_test::serial]
async fn state_without_bearer_token_is_rejected() {
    let (base, _key, _root) = spawn_gateway().await;
    let resp = reqwest::get(format!("{base}/state")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial_test::serial]
async fn task_submit_then_state_round_trips_with_bearer_token() {
    let (base, key, _root) = spawn_gateway().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/task"))
        .bearer_auth(&key)
        .json(&json!({"command": "open settings"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "accepted");

    let state_resp = client
        .get(format!("{base}/state"))
        .bearer_auth(&key)
        .send()
        .await
        .unwrap();
    assert_eq!(state_resp.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
#[serial_test::serial]
async fn websocket_without_matching_auth_frame_is_closed() {
    let (base, _key, _root) = spawn_gateway().await;
    let ws_url = base.replacen("http://", "ws://", 1) + "/ws";
    let (ws, _) = connect_async(&ws_url).await.unwrap();
    let (mut write, mut read) = ws.split();

    write
        .send(Message::Text(json!({"auth": "wrong-key"}).to_string()))
        .await
        .unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = msg.to_text().unwrap();
    assert!(text.contains("AUTH_ERROR"), "expected auth error, got: {text}");
}

#[tokio::test]
#[serial_test::serial]
async fn websocket_with_matching_auth_frame_receives_events() {
    let (base, key, _root) = spawn_gateway().await;
    let ws_url = base.replacen("http://", "ws://", 1) + "/ws";
    let (ws, _) = connect_async(&ws_url).await.unwrap();
    let (mut write, mut read) = ws.split();

    write
        .send(Message::Text(json!({"auth": key}).to_string()))
        .await
        .unwrap();

    let client = reqwest::Client::new();
    client
        .post(format!("{base}/task"))
        .bearer_auth(&key)
        .json(&json!({"command": "open settings"}))
        .send()
        .await
        .unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), read.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(msg.is_text());
}
