// ABOUTME: WebSocket client for applications talking to the gateway
// ABOUTME: Session-authenticated connect, correlated calls, and buffered event reception

//! Application-side gateway client.
//!
//! [`GatewayClient`] is the counterpart of the server: it opens the
//! session-authenticated WebSocket, issues JSON-RPC requests with
//! correlation ids, and surfaces server-initiated notifications. Responses
//! and events interleave freely on the wire; events that arrive while a
//! call is waiting for its response are buffered and handed out by
//! [`GatewayClient::next_event`].

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::constants::timeouts;
use crate::error::{GatekitError, Result};
use crate::types::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// JSON-RPC WebSocket client for one gateway connection
pub struct GatewayClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u32,
    buffered_events: VecDeque<JsonRpcNotification>,
    // A subscription is identified gateway-side by the request id that
    // created it, so the unsubscribe must be sent under the same id.
    subscription_ids: HashMap<String, u32>,
    call_timeout: Duration,
}

impl GatewayClient {
    /// Connect to `addr` (`host:port`) with the given session token.
    pub async fn connect(addr: &str, session: &str) -> Result<Self> {
        let url = format!("ws://{}/?session={}", addr, urlencoding::encode(session));
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| GatekitError::connection(format!("connect to {} failed: {}", addr, e)))?;
        Ok(Self {
            ws,
            next_id: 0,
            buffered_events: VecDeque::new(),
            subscription_ids: HashMap::new(),
            call_timeout: timeouts::CLIENT_CALL_TIMEOUT,
        })
    }

    /// Override the per-call response timeout.
    pub fn set_call_timeout(&mut self, timeout: Duration) {
        self.call_timeout = timeout;
    }

    /// Issue a request and wait for its correlated response.
    ///
    /// Returns the `result` value; a wire `error` becomes
    /// [`GatekitError::InvokeFailed`] carrying the code and message.
    /// Notifications arriving in between are buffered for
    /// [`GatewayClient::next_event`].
    pub async fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.allocate_id();
        self.call_with_id(id, method, params).await
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    async fn call_with_id(
        &mut self,
        id: u32,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value> {
        let request = JsonRpcRequest {
            jsonrpc: Some("2.0".to_string()),
            id: Some(id),
            method: Some(method.to_string()),
            params,
        };
        let text = serde_json::to_string(&request)?;
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| GatekitError::transport(format!("send failed: {}", e)))?;

        let deadline = tokio::time::Instant::now() + self.call_timeout;
        loop {
            let frame = self.next_text_frame(deadline).await?;
            if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&frame) {
                if response.result.is_some() || response.error.is_some() {
                    if response.id != id {
                        // A response for an earlier, abandoned call.
                        tracing::debug!("Discarding stale response for id {}", response.id);
                        continue;
                    }
                    return match response.error {
                        Some(error) => Err(GatekitError::invoke_failed(error.code, error.message)),
                        None => Ok(response.result.unwrap_or(Value::Null)),
                    };
                }
            }
            self.buffer_event(&frame);
        }
    }

    /// Subscribe to an event method (`{"listen": true}`).
    pub async fn subscribe(&mut self, method: &str) -> Result<Value> {
        let id = self.allocate_id();
        self.subscription_ids.insert(method.to_lowercase(), id);
        self.call_with_id(id, method, Some(serde_json::json!({"listen": true})))
            .await
    }

    /// Unsubscribe from an event method (`{"listen": false}`).
    ///
    /// Sent under the request id that created the subscription; the
    /// gateway matches subscription entries by that id.
    pub async fn unsubscribe(&mut self, method: &str) -> Result<Value> {
        let id = self
            .subscription_ids
            .remove(&method.to_lowercase())
            .unwrap_or_else(|| self.allocate_id());
        self.call_with_id(id, method, Some(serde_json::json!({"listen": false})))
            .await
    }

    /// Next server-initiated notification, buffered or fresh off the wire.
    pub async fn next_event(&mut self) -> Result<JsonRpcNotification> {
        if let Some(event) = self.buffered_events.pop_front() {
            return Ok(event);
        }
        let deadline = tokio::time::Instant::now() + self.call_timeout;
        loop {
            let frame = self.next_text_frame(deadline).await?;
            if let Ok(event) = serde_json::from_str::<JsonRpcNotification>(&frame) {
                if !event.method.is_empty() {
                    return Ok(event);
                }
            }
            tracing::debug!("Discarding non-notification frame while waiting for event");
        }
    }

    /// Close the connection.
    pub async fn close(&mut self) -> Result<()> {
        self.ws
            .close(None)
            .await
            .map_err(|e| GatekitError::transport(format!("close failed: {}", e)))
    }

    fn buffer_event(&mut self, frame: &str) {
        match serde_json::from_str::<JsonRpcNotification>(frame) {
            Ok(event) if !event.method.is_empty() => {
                self.buffered_events.push_back(event);
            }
            _ => {
                tracing::debug!("Discarding unrecognized frame: {}", frame);
            }
        }
    }

    async fn next_text_frame(&mut self, deadline: tokio::time::Instant) -> Result<String> {
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or_else(|| GatekitError::transport("timed out waiting for frame"))?;
            let message = tokio::time::timeout(remaining, self.ws.next())
                .await
                .map_err(|_| GatekitError::transport("timed out waiting for frame"))?
                .ok_or_else(|| GatekitError::connection("connection closed"))?
                .map_err(|e| GatekitError::transport(format!("read failed: {}", e)))?;
            match message {
                Message::Text(text) => return Ok(text.to_string()),
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => {
                    return Err(GatekitError::connection("connection closed by gateway"));
                }
                _ => continue,
            }
        }
    }
}
