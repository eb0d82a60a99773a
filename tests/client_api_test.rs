// ABOUTME: Exercises the application-side GatewayClient against a live gateway
// ABOUTME: Correlated calls, wire errors as typed failures, and buffered event reception

mod common;

use std::sync::Arc;

use common::*;
use gatekit::prelude::*;
use gatekit::testing::RecordingNotificationHandler;
use serde_json::json;

async fn harness() -> Harness {
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
async fn call_returns_the_result_value() {
    let harness = harness().await;
    let mut client = GatewayClient::connect(&harness.addr, "tok-1").await.unwrap();

    let result = client.call("device.name", None).await.unwrap();
    assert_eq!(result, json!("Living Room"));
}

#[tokio::test]
async fn wire_errors_become_invoke_failures() {
    let harness = harness().await;
    let mut client = GatewayClient::connect(&harness.addr, "tok-1").await.unwrap();

    let err = client.call("does.not.exist", None).await.unwrap_err();
    assert_eq!(
        err,
        GatekitError::invoke_failed(-50100, "NotSupported")
    );
}

#[tokio::test]
async fn subscribe_then_receive_event() {
    let harness = harness().await;
    let mut client = GatewayClient::connect(&harness.addr, "tok-1").await.unwrap();

    let ack = client.subscribe("audio.onChanged").await.unwrap();
    assert_eq!(ack["listening"], true);
    assert_eq!(ack["event"], "audio.onChanged");

    harness
        .emitter
        .emit("audio.onChanged", r#"{"v":1}"#, "")
        .await
        .unwrap();

    let event = client.next_event().await.unwrap();
    assert_eq!(event.method, "audio.onChanged");
    assert_eq!(event.params.unwrap()["v"], 1);
}

#[tokio::test]
async fn events_arriving_during_a_call_are_buffered() {
    let harness = harness().await;
    let mut client = GatewayClient::connect(&harness.addr, "tok-1").await.unwrap();

    client.subscribe("audio.onChanged").await.unwrap();
    harness
        .emitter
        .emit("audio.onChanged", r#"{"v":7}"#, "")
        .await
        .unwrap();

    // Give the event time to land in front of the next response.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let result = client.call("device.name", None).await.unwrap();
    assert_eq!(result, json!("Living Room"));

    let event = client.next_event().await.unwrap();
    assert_eq!(event.method, "audio.onChanged");
    assert_eq!(event.params.unwrap()["v"], 7);
}

#[tokio::test]
async fn unsubscribe_round_trip() {
    let harness = harness().await;
    let mut client = GatewayClient::connect(&harness.addr, "tok-1").await.unwrap();

    client.subscribe("audio.onChanged").await.unwrap();
    let ack = client.unsubscribe("audio.onChanged").await.unwrap();
    assert_eq!(ack["listening"], false);

    let hub = Arc::clone(&harness.hub);
    wait_until(|| !hub.registry().exists("audio.onChanged"), "registry emptied").await;
    client.close().await.unwrap();
}
