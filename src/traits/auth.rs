// ABOUTME: Authenticator capability resolving session tokens and permission groups
// ABOUTME: Implemented by an external component; the gateway only consumes the interface

//! Authentication capability.
//!
//! Session resolution and permission-group membership live outside the
//! gateway. The connection manager calls [`Authenticator::authenticate`]
//! during the WebSocket handshake; the dispatcher calls
//! [`Authenticator::check_permission_group`] for methods whose resolution
//! carries a permission group.

use async_trait::async_trait;

use crate::error::Result;

/// Session and permission authority consulted by the gateway
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a session token to an application id.
    ///
    /// Returns the authenticated app id, or an error when the session is
    /// unknown or expired. An error closes the connection before any frame
    /// is dispatched.
    async fn authenticate(&self, session: &str) -> Result<String>;

    /// Check whether an app id is authorized under a permission group.
    async fn check_permission_group(&self, app_id: &str, group: &str) -> Result<bool>;
}
