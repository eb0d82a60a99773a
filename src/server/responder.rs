// ABOUTME: Responder back-channel writing responses, notifications, and server requests to sockets
// ABOUTME: All writes run as worker jobs; error envelopes become JSON-RPC errors on the wire

//! Gateway responder.
//!
//! [`GatewayResponder`] is the [`ResponderChannel`] for the public gateway
//! origin: it turns terminal resolutions into JSON-RPC frames and hands
//! them to the owning connection's writer task. Every operation is
//! submitted to the worker pool; the caller never waits for the socket.
//!
//! A resolution payload that parses as a terminal error envelope
//! (`{"code": <int>, "text": <string>}`) becomes the response `error`;
//! everything else becomes `result`. Payloads that are not valid JSON are
//! delivered as JSON strings rather than dropped.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use crate::error::Result;
use crate::server::mirror::TrafficMirror;
use crate::server::registry::ConnectionTable;
use crate::traits::responder::ResponderChannel;
use crate::types::jsonrpc::{
    ErrorEnvelope, JsonRpcNotification, JsonRpcResponse, JsonRpcServerRequest,
};
use crate::workers::WorkerPool;

/// Responder channel for the public gateway origin
pub struct GatewayResponder {
    connections: Arc<ConnectionTable>,
    workers: Arc<WorkerPool>,
    mirror: Arc<TrafficMirror>,
}

impl GatewayResponder {
    /// Create a responder over the connection table
    pub fn new(
        connections: Arc<ConnectionTable>,
        workers: Arc<WorkerPool>,
        mirror: Arc<TrafficMirror>,
    ) -> Arc<Self> {
        Arc::new(Self {
            connections,
            workers,
            mirror,
        })
    }

    /// Build the wire response for a resolution payload.
    fn build_response(request_id: u32, payload: &str) -> JsonRpcResponse {
        match ErrorEnvelope::from_payload(payload) {
            Some(envelope) => JsonRpcResponse::error(request_id, envelope.to_wire()),
            None => {
                let result = serde_json::from_str::<Value>(payload)
                    .unwrap_or_else(|_| Value::String(payload.to_string()));
                JsonRpcResponse::result(request_id, result)
            }
        }
    }

    fn payload_value(payload: &str) -> Option<Value> {
        if payload.is_empty() {
            return None;
        }
        Some(
            serde_json::from_str::<Value>(payload)
                .unwrap_or_else(|_| Value::String(payload.to_string())),
        )
    }

    async fn send_frame(connections: &ConnectionTable, connection_id: u32, frame: String) {
        tracing::trace!("WebSocket send to {}: {}", connection_id, frame);
        connections.send(connection_id, Message::Text(frame.into())).await;
    }
}

#[async_trait]
impl ResponderChannel for GatewayResponder {
    async fn respond(&self, connection_id: u32, request_id: u32, payload: &str) -> Result<()> {
        let connections = Arc::clone(&self.connections);
        let mirror = Arc::clone(&self.mirror);
        let payload = payload.to_string();
        self.workers
            .submit(async move {
                let response = Self::build_response(request_id, &payload);
                match serde_json::to_string(&response) {
                    Ok(frame) => {
                        tracing::trace!(
                            "Sending response for requestId={}, connectionId={}",
                            request_id,
                            connection_id
                        );
                        Self::send_frame(&connections, connection_id, frame).await;
                        mirror.mirror_response(connection_id, request_id, &payload).await;
                    }
                    Err(e) => {
                        tracing::error!("Failed to serialize response: {}", e);
                    }
                }
            })
            .await;
        Ok(())
    }

    async fn emit(&self, connection_id: u32, method: &str, payload: &str) -> Result<()> {
        let connections = Arc::clone(&self.connections);
        let mirror = Arc::clone(&self.mirror);
        let method = method.to_string();
        let payload = payload.to_string();
        self.workers
            .submit(async move {
                let event = JsonRpcNotification::new(&method, Self::payload_value(&payload));
                match serde_json::to_string(&event) {
                    Ok(frame) => {
                        tracing::trace!(
                            "Emit event for method={}, connectionId={}",
                            method,
                            connection_id
                        );
                        Self::send_frame(&connections, connection_id, frame).await;
                        mirror.mirror_notification(connection_id, &method, &payload).await;
                    }
                    Err(e) => {
                        tracing::error!("Failed to serialize notification: {}", e);
                    }
                }
            })
            .await;
        Ok(())
    }

    async fn request(
        &self,
        connection_id: u32,
        request_id: u32,
        method: &str,
        params: &str,
    ) -> Result<()> {
        let connections = Arc::clone(&self.connections);
        let mirror = Arc::clone(&self.mirror);
        let method = method.to_string();
        let params = params.to_string();
        self.workers
            .submit(async move {
                let request =
                    JsonRpcServerRequest::new(request_id, &method, Self::payload_value(&params));
                match serde_json::to_string(&request) {
                    Ok(frame) => {
                        tracing::trace!(
                            "Send request for method={}, connectionId={}",
                            method,
                            connection_id
                        );
                        Self::send_frame(&connections, connection_id, frame).await;
                        mirror
                            .mirror_request(connection_id, request_id, &method, &params)
                            .await;
                    }
                    Err(e) => {
                        tracing::error!("Failed to serialize server request: {}", e);
                    }
                }
            })
            .await;
        Ok(())
    }
}
