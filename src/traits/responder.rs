// ABOUTME: Back-channel capability delivering responses, events, and server requests to apps
// ABOUTME: One implementation per origin; the origin router selects among them

//! Responder back-channel capability.
//!
//! Each origin callsign maps to one [`ResponderChannel`]: the public
//! gateway channel writes to the WebSocket connection the request arrived
//! on, the internal launch-delegate channel hands payloads to the
//! in-process launcher. All operations are fire-and-forget for the caller;
//! delivery failures are logged by the implementation and never propagate.

use async_trait::async_trait;

use crate::error::Result;

/// Asynchronous write path toward one class of application endpoints
#[async_trait]
pub trait ResponderChannel: Send + Sync {
    /// Finalize a JSON-RPC response for `request_id` on `connection_id`.
    ///
    /// If `payload` parses as a terminal error envelope it becomes the
    /// response `error`; otherwise it becomes the `result`.
    async fn respond(&self, connection_id: u32, request_id: u32, payload: &str) -> Result<()>;

    /// Send a server-initiated notification (no id) to a connection.
    async fn emit(&self, connection_id: u32, method: &str, payload: &str) -> Result<()>;

    /// Send a server-initiated request expecting a matching response.
    async fn request(
        &self,
        connection_id: u32,
        request_id: u32,
        method: &str,
        params: &str,
    ) -> Result<()>;
}
