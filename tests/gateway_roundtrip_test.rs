// ABOUTME: End-to-end request/response tests over a real WebSocket connection
// ABOUTME: Covers successful dispatch, unknown methods, permissions, and protocol errors

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use gatekit::testing::RecordingNotificationHandler;
use gatekit::traits::ResponderChannel;
use serde_json::json;

async fn default_harness() -> Harness {
    let handler = Arc::new(RecordingNotificationHandler::new());
    start_gateway_with_handler(
        DEFAULT_RESOLUTIONS,
        default_broker(&handler),
        default_authenticator(),
        None,
        handler,
    )
    .await
}

#[tokio::test]
async fn successful_request_returns_downstream_result() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "tok-1").await;

    client.send_request(7, "device.name", None).await;
    let frame = client.next_json().await;

    assert_eq!(frame["jsonrpc"], "2.0");
    assert_eq!(frame["id"], 7);
    assert_eq!(frame["result"], "Living Room");
    assert!(frame.get("error").is_none());
}

#[tokio::test]
async fn unknown_method_returns_not_supported() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "tok-1").await;

    client.send_request(8, "does.not.exist", None).await;
    let frame = client.next_json().await;

    assert_eq!(frame["id"], 8);
    assert_eq!(frame["error"]["code"], -50100);
    assert_eq!(frame["error"]["message"], "NotSupported");
}

#[tokio::test]
async fn method_lookup_is_case_insensitive() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "tok-1").await;

    client.send_request(9, "DEVICE.NAME", None).await;
    let frame = client.next_json().await;
    assert_eq!(frame["result"], "Living Room");
}

#[tokio::test]
async fn permission_group_denies_unauthorized_app() {
    let harness = default_harness().await;
    // a2 is not a member of "restricted".
    let mut client = TestClient::connect(&harness.addr, "tok-2").await;

    client.send_request(10, "secure.op", None).await;
    let frame = client.next_json().await;

    assert_eq!(frame["id"], 10);
    assert_eq!(frame["error"]["code"], -40300);
    assert_eq!(frame["error"]["message"], "NotPermitted");
}

#[tokio::test]
async fn permission_group_admits_member_app() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "tok-1").await;

    client.send_request(11, "secure.op", None).await;
    let frame = client.next_json().await;
    assert_eq!(frame["result"], "Living Room");
}

#[tokio::test]
async fn typed_dispatch_wraps_params_and_context() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "tok-1").await;

    client.send_request(12, "typed.op", Some(json!({"k": 1}))).await;
    let frame = client.next_json().await;

    let result = &frame["result"];
    assert_eq!(result["method"], "typed.op");
    assert_eq!(result["appId"], "a1");
    assert_eq!(result["wrapped"]["params"]["k"], 1);
    assert_eq!(result["wrapped"]["_additionalContext"]["feature"], "x");
    assert_eq!(result["wrapped"]["_additionalContext"]["origin"], "gateway");
}

#[tokio::test]
async fn message_without_id_is_dropped() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "tok-1").await;

    client
        .send_json(json!({"jsonrpc": "2.0", "method": "device.name"}))
        .await;
    client.expect_silence(Duration::from_millis(300)).await;

    // The connection is still usable afterwards.
    client.send_request(13, "device.name", None).await;
    let frame = client.next_json().await;
    assert_eq!(frame["id"], 13);
}

#[tokio::test]
async fn message_without_method_gets_error_response() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "tok-1").await;

    client.send_json(json!({"jsonrpc": "2.0", "id": 14})).await;
    let frame = client.next_json().await;

    assert_eq!(frame["id"], 14);
    assert_eq!(frame["error"]["code"], -32600);
}

#[tokio::test]
async fn unparseable_frame_is_dropped_without_closing() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "tok-1").await;

    client
        .send_json(json!("not an object"))
        .await;
    client.expect_silence(Duration::from_millis(200)).await;

    client.send_request(15, "device.name", None).await;
    assert_eq!(client.next_json().await["id"], 15);
}

#[tokio::test]
async fn unknown_session_closes_connection() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "bogus-token").await;
    assert!(client.closed_by_server().await);
}

#[tokio::test]
async fn missing_session_parameter_closes_connection() {
    let harness = default_harness().await;
    let url = format!("ws://{}/?other=1", harness.addr);
    let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let mut client_ws = ws;
    use futures_util::StreamExt;
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match client_ws.next().await {
                Some(Ok(tokio_tungstenite::tungstenite::Message::Close(_))) | None => break true,
                Some(Err(_)) => break true,
                _ => continue,
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(closed);
}

#[tokio::test]
async fn server_initiated_request_reaches_the_app() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "tok-1").await;

    // Make sure authentication has completed before pushing at the app.
    client.send_request(1, "device.name", None).await;
    client.next_json().await;

    harness
        .responder
        .request(1, 42, "app.interrogate", r#"{"q":"state"}"#)
        .await
        .unwrap();

    let frame = client.next_json().await;
    assert_eq!(frame["id"], 42);
    assert_eq!(frame["method"], "app.interrogate");
    assert_eq!(frame["params"]["q"], "state");
}

#[tokio::test]
async fn responses_use_request_id_for_correlation() {
    let harness = default_harness().await;
    let mut client = TestClient::connect(&harness.addr, "tok-1").await;

    // Two in-flight requests; ids must match regardless of arrival order.
    client.send_request(21, "device.name", None).await;
    client.send_request(22, "does.not.exist", None).await;

    let first = client.next_json().await;
    let second = client.next_json().await;
    let mut ids: Vec<u64> = vec![
        first["id"].as_u64().unwrap(),
        second["id"].as_u64().unwrap(),
    ];
    ids.sort_unstable();
    assert_eq!(ids, vec![21, 22]);
}
