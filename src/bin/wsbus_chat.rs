//! Line-based chat over a wsbus connection
//!
//! Every line typed on stdin is sent as `{"name": <event_name>, "data": {"text": <line>}}`.
//! Every inbound frame is printed. Lines typed while the server is down are
//! buffered and delivered once the connection comes back.
//!
//! Usage:
//!   cargo run --bin wsbus_chat [config.yaml]
//!
//! Environment variables:
//!   WSBUS_CONFIG_PATH - config file (default config/wsbus.yaml)
//!   WSBUS_URI / WSBUS_HOST / WSBUS_PORT - endpoint overrides

use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use wsbus_app::bin_common::{load_config_from_env, parse_args, ConfigType};
use wsbus_app::config::AppConfig;
use wsbus_app::logging::init_tracing_with_level;
use wsbus_app::wsbus::{ClientEvent, Inbound, WsBusClientBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenv::dotenv().ok();

    // Load config first (before logging is initialized)
    // An explicit argument wins over WSBUS_CONFIG_PATH
    let config_path = match parse_args().into_iter().next() {
        Some(path) => PathBuf::from(path),
        None => load_config_from_env(ConfigType::Client),
    };
    let config = AppConfig::load(&config_path)?;

    init_tracing_with_level(&config.log_level);
    config.log();

    let client = WsBusClientBuilder::from_config(config.client.clone())
        .listener(|msg: &Inbound| -> wsbus_app::wsbus::Result<()> {
            match msg {
                Inbound::Json(value) => println!("< {}", value),
                Inbound::Raw(frame) => println!("< (raw) {:?}", frame),
            }
            Ok(())
        })
        .build()?;

    print_banner(&client.endpoint().to_string());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => {
                        if !client.is_open() {
                            info!("Not connected, message buffered");
                        }
                        client.send(&config.event_name, &json!({ "text": line }))?;
                    }
                    None => break,
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received");
                break;
            }
        }

        while let Some(event) = client.try_recv_event() {
            if let ClientEvent::GaveUp { attempts } = event {
                warn!("Gave up reconnecting after {} attempts", attempts);
            }
        }
    }

    let metrics = client.metrics();
    client.shutdown().await?;

    print_shutdown(&format!(
        "sent: {}, received: {}, reconnects: {}, expired: {}, dropped: {}",
        metrics.messages_sent,
        metrics.messages_received,
        metrics.reconnect_count,
        metrics.messages_expired,
        metrics.messages_dropped
    ));
    Ok(())
}

fn print_banner(endpoint: &str) {
    info!("");
    info!("========================================");
    info!("Starting wsbus chat");
    info!("Endpoint: {}", endpoint);
    info!("Type a line to send, Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown(stats: &str) {
    info!("");
    info!("========================================");
    info!("wsbus chat stopped gracefully");
    info!("{}", stats);
    info!("========================================");
}
