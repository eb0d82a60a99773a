// ABOUTME: Demo gateway server wiring in-memory plugins and sessions for local testing
// ABOUTME: Features colored startup logging and a small built-in plugin set

use std::sync::Arc;

use colored::*;
use gatekit::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_file = std::env::var("GATEKIT_CONFIG_FILE").ok();
    let mut config = GatewayConfig::load(config_file.as_deref())?;
    if let Ok(connector) = std::env::var("DEMO_CONNECTOR") {
        // Lets two demo instances coexist on one machine.
        config.connector = connector;
    }

    let server_id = format!("gateway-demo-{}", &Uuid::now_v7().to_string()[..8]);

    let mut broker = StaticPluginBroker::new();
    broker.register_rpc_link("org.rdk.System", |method, _params| match method {
        "getFriendlyName" => Ok("\"Living Room\"".to_string()),
        "getDeviceInfo" => Ok(r#"{"make":"demo","model":"gateway"}"#.to_string()),
        other => Err(GatekitError::invoke_failed(2, format!("unknown method {}", other))),
    });
    broker.register_request_handler("DemoTyped", |context, method, params| {
        Ok(serde_json::json!({
            "handled": method,
            "appId": context.app_id,
            "echo": serde_json::from_str::<serde_json::Value>(params).unwrap_or_default(),
        })
        .to_string())
    });

    let authenticator = StaticAuthenticator::new()
        .with_session("demo-session", "demo-app")
        .with_session("observer-session", "observer-app")
        .with_group_member("restricted", "demo-app");

    let mut gateway = Gateway::builder()
        .config(config.clone())
        .authenticator(Arc::new(authenticator))
        .broker(Arc::new(broker))
        .build()?;

    if let Err(e) = gateway.configure_resolutions() {
        tracing::warn!("Resolution config not loaded ({}), using built-in demo table", e);
        let demo_table = write_demo_resolutions()?;
        gateway.configure_resolution_paths(&[demo_table])?;
    }

    let addr = gateway.bind().await?;
    print_startup_banner(&server_id, &addr.to_string());

    let shutdown = gateway.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("{}", "Shutting down...".yellow());
            shutdown.notify_waiters();
        }
    });

    gateway.run().await?;
    gateway.stop().await;
    Ok(())
}

/// Write the built-in demo resolution table to a temp file.
fn write_demo_resolutions() -> Result<String> {
    let table = serde_json::json!({
        "resolutions": {
            "device.name": {"alias": "org.rdk.System.getFriendlyName"},
            "device.info": {"alias": "org.rdk.System.getDeviceInfo", "permissionGroup": "restricted"},
            "demo.typed": {"alias": "DemoTyped", "additionalContext": {"feature": "demo"}},
            "demo.onEvent": {"alias": "org.rdk.Demo.onEvent", "event": "onEvent"}
        }
    });
    let path = std::env::temp_dir().join("gatekit-demo-resolutions.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&table)?)?;
    Ok(path.to_string_lossy().to_string())
}

fn print_startup_banner(server_id: &str, addr: &str) {
    println!();
    println!("{}", "  Gatekit demo gateway".bright_green().bold());
    println!("  {} {}", "server:".dimmed(), server_id);
    println!("  {} ws://{}/?session=demo-session", "connect:".dimmed(), addr);
    println!();
    println!(
        "  {}",
        "try: {\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"device.name\"}".cyan()
    );
    println!();
}
