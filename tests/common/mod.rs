// ABOUTME: Shared harness for gateway integration tests
// ABOUTME: Boots a gateway on an ephemeral port and provides a JSON-RPC WebSocket test client

// Each integration suite compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gatekit::notifications::NotificationHub;
use gatekit::prelude::*;
use gatekit::resolver::Resolver;
use gatekit::server::GatewayResponder;
use gatekit::testing::RecordingNotificationHandler;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// A running gateway plus handles into its subsystems
pub struct Harness {
    pub addr: String,
    pub emitter: Arc<dyn EventEmitter>,
    pub hub: Arc<NotificationHub>,
    pub resolver: Arc<Resolver>,
    pub responder: Arc<GatewayResponder>,
    pub shutdown: Arc<tokio::sync::Notify>,
    pub notification_handler: Arc<RecordingNotificationHandler>,
    pub _dir: TempDir,
}

/// Default resolution table used by most suites
pub const DEFAULT_RESOLUTIONS: &str = r#"{"resolutions":{
    "device.name": {"alias": "org.rdk.System.getFriendlyName"},
    "secure.op": {"alias": "org.rdk.System.getFriendlyName", "permissionGroup": "restricted"},
    "typed.op": {"alias": "TypedPlugin", "additionalContext": {"feature": "x"}},
    "audio.onChanged": {"alias": "org.rdk.Audio.onChanged", "event": "onChanged"}
}}"#;

/// Default plugin set: a generic system plugin, a typed plugin, and a
/// recording notification handler for the audio plugin.
pub fn default_broker(handler: &Arc<RecordingNotificationHandler>) -> StaticPluginBroker {
    let mut broker = StaticPluginBroker::new();
    broker.register_rpc_link("org.rdk.System", |method, _params| match method {
        "getFriendlyName" => Ok("\"Living Room\"".to_string()),
        other => Err(GatekitError::invoke_failed(2, format!("unknown method {}", other))),
    });
    broker.register_request_handler("TypedPlugin", |context, method, params| {
        Ok(serde_json::json!({
            "method": method,
            "appId": context.app_id,
            "wrapped": serde_json::from_str::<Value>(params).unwrap(),
        })
        .to_string())
    });
    broker.register_notification_handler("org.rdk.Audio", Arc::clone(handler) as _);
    broker
}

/// Default sessions: `tok-1` -> `a1`, `tok-2` -> `a2`, plus an observer.
pub fn default_authenticator() -> StaticAuthenticator {
    StaticAuthenticator::new()
        .with_session("tok-1", "a1")
        .with_session("tok-2", "a2")
        .with_session("tok-observer", "observer-app")
        .with_group_member("restricted", "a1")
}

pub async fn start_gateway(
    resolutions: &str,
    broker: StaticPluginBroker,
    authenticator: StaticAuthenticator,
    mirror_app_id: Option<&str>,
) -> Harness {
    start_gateway_with_handler(
        resolutions,
        broker,
        authenticator,
        mirror_app_id,
        Arc::new(RecordingNotificationHandler::new()),
    )
    .await
}

pub async fn start_gateway_with_handler(
    resolutions: &str,
    broker: StaticPluginBroker,
    authenticator: StaticAuthenticator,
    mirror_app_id: Option<&str>,
    notification_handler: Arc<RecordingNotificationHandler>,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("resolutions.json");
    std::fs::write(&path, resolutions).unwrap();

    let config = GatewayConfig {
        connector: "127.0.0.1:0".to_string(),
        enhanced_logging: true,
        mirror_app_id: mirror_app_id.map(String::from),
        ..GatewayConfig::default()
    };

    let mut gateway = Gateway::builder()
        .config(config)
        .authenticator(Arc::new(authenticator))
        .broker(Arc::new(broker))
        .build()
        .unwrap();
    gateway
        .configure_resolution_paths(&[path.to_string_lossy().to_string()])
        .unwrap();

    let addr = gateway.bind().await.unwrap();
    let harness = Harness {
        addr: addr.to_string(),
        emitter: gateway.emitter(),
        hub: Arc::clone(gateway.hub()),
        resolver: Arc::clone(gateway.resolver()),
        responder: Arc::clone(gateway.responder()),
        shutdown: gateway.shutdown_handle(),
        notification_handler,
        _dir: dir,
    };

    tokio::spawn(async move {
        let _ = gateway.run().await;
    });

    harness
}

/// Poll a condition until it holds or the deadline passes.
pub async fn wait_until<F: Fn() -> bool>(condition: F, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// JSON-RPC WebSocket client for driving the gateway in tests
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Open a connection with the given session token.
    pub async fn connect(addr: &str, session: &str) -> Self {
        let url = format!("ws://{}/?session={}", addr, session);
        let (ws, _) = connect_async(url.as_str()).await.expect("connect failed");
        Self { ws }
    }

    /// Send a raw JSON value as a text frame.
    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("send failed");
    }

    /// Send a JSON-RPC request frame.
    pub async fn send_request(&mut self, id: u32, method: &str, params: Option<Value>) {
        let mut frame = serde_json::json!({"jsonrpc": "2.0", "id": id, "method": method});
        if let Some(params) = params {
            frame["params"] = params;
        }
        self.send_json(frame).await;
    }

    /// Next text frame parsed as JSON, within a timeout.
    pub async fn next_json(&mut self) -> Value {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(2), self.ws.next())
                .await
                .expect("timed out waiting for frame")
                .expect("connection closed")
                .expect("websocket error");
            match message {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    /// Expect no frame to arrive within the window.
    pub async fn expect_silence(&mut self, window: Duration) {
        let result = tokio::time::timeout(window, self.ws.next()).await;
        if let Ok(Some(Ok(Message::Text(text)))) = result {
            panic!("expected silence, got frame: {}", text);
        }
    }

    /// True when the server closes the connection within the timeout.
    pub async fn closed_by_server(&mut self) -> bool {
        loop {
            match tokio::time::timeout(Duration::from_secs(2), self.ws.next()).await {
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return true,
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(_))) => return true,
                Err(_) => return false,
            }
        }
    }

    /// Close from the client side.
    pub async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
