// ABOUTME: Socket server configuration shared by the connection manager
// ABOUTME: Connector address plus the optional enhanced-logging and traffic-mirror toggles

//! Socket server configuration.

use crate::config::settings::GatewayConfig;
use crate::constants::network;

/// Configuration for the gateway's WebSocket server
#[derive(Debug, Clone, PartialEq)]
pub struct SocketServerConfig {
    /// Loopback `host:port` to bind
    pub connector: String,
    /// Log full inbound frames at debug level
    pub enhanced_logging: bool,
    /// App id whose connection receives mirrored traffic
    pub mirror_app_id: Option<String>,
}

impl Default for SocketServerConfig {
    fn default() -> Self {
        Self {
            connector: network::DEFAULT_CONNECTOR.to_string(),
            enhanced_logging: false,
            mirror_app_id: None,
        }
    }
}

impl From<&GatewayConfig> for SocketServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            connector: config.connector.clone(),
            enhanced_logging: config.enhanced_logging,
            mirror_app_id: config.mirror_app_id.clone(),
        }
    }
}

/// Builder for socket server configuration
#[derive(Debug, Default)]
pub struct SocketServerConfigBuilder {
    config: SocketServerConfig,
}

impl SocketServerConfigBuilder {
    /// Start from the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connector address
    pub fn connector(mut self, connector: impl Into<String>) -> Self {
        self.config.connector = connector.into();
        self
    }

    /// Enable enhanced frame logging
    pub fn enhanced_logging(mut self, enabled: bool) -> Self {
        self.config.enhanced_logging = enabled;
        self
    }

    /// Route mirrored traffic to the given app id
    pub fn mirror_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.config.mirror_app_id = Some(app_id.into());
        self
    }

    /// Finish the configuration
    pub fn build(self) -> SocketServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SocketServerConfig::default();
        assert_eq!(config.connector, network::DEFAULT_CONNECTOR);
        assert!(!config.enhanced_logging);
        assert!(config.mirror_app_id.is_none());
    }

    #[test]
    fn test_builder() {
        let config = SocketServerConfigBuilder::new()
            .connector("127.0.0.1:0")
            .enhanced_logging(true)
            .mirror_app_id("observer-app")
            .build();
        assert_eq!(config.connector, "127.0.0.1:0");
        assert!(config.enhanced_logging);
        assert_eq!(config.mirror_app_id.as_deref(), Some("observer-app"));
    }

    #[test]
    fn test_from_gateway_config() {
        let gateway = GatewayConfig {
            connector: "127.0.0.1:4000".to_string(),
            enhanced_logging: true,
            ..GatewayConfig::default()
        };
        let config = SocketServerConfig::from(&gateway);
        assert_eq!(config.connector, "127.0.0.1:4000");
        assert!(config.enhanced_logging);
    }
}
