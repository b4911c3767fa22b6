//! Chat relay: entry point.
//!
//! Accepts WebSocket connections from chat clients on one path and forwards
//! every valid message to every other connected client.
//!
//! # Usage
//!
//! ```text
//! chat-relay [OPTIONS]
//!
//! Options:
//!   --config <PATH>              TOML configuration file
//!   --bind <IP>                  Address to bind [default: 0.0.0.0]
//!   --port <PORT>                WebSocket listener port [default: 8080]
//!   --path <PATH>                Channel path [default: /chat]
//!   --max-message-bytes <BYTES>  Largest inbound message [default: 65536]
//!   --reject-unknown-fields      Reject frames with keys outside the schema
//!   --log-level <FILTER>         Log filter when RUST_LOG is unset [default: info]
//!   --print-config               Print the effective configuration as TOML and exit
//! ```
//!
//! # Precedence
//!
//! Built-in defaults < config file < environment variables < CLI flags.
//!
//! | Variable                       | Flag                      |
//! |--------------------------------|---------------------------|
//! | `CHAT_RELAY_CONFIG`            | `--config`                |
//! | `CHAT_RELAY_BIND`              | `--bind`                  |
//! | `CHAT_RELAY_PORT`              | `--port`                  |
//! | `CHAT_RELAY_PATH`              | `--path`                  |
//! | `CHAT_RELAY_MAX_MESSAGE_BYTES` | `--max-message-bytes`     |
//! | `CHAT_RELAY_REJECT_UNKNOWN`    | `--reject-unknown-fields` |
//! | `CHAT_RELAY_LOG_LEVEL`         | `--log-level`             |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::domain::RelayConfig;
use chat_relay::infrastructure::{load_config, run_server, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Real-time chat relay.
///
/// Options left unset fall back to the config file, then to built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "chat-relay",
    about = "WebSocket relay that broadcasts chat messages to every other peer",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "CHAT_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the WebSocket server to.
    #[arg(long, env = "CHAT_RELAY_BIND")]
    bind: Option<String>,

    /// TCP port for the WebSocket server.
    #[arg(long, env = "CHAT_RELAY_PORT")]
    port: Option<u16>,

    /// HTTP path clients must request to join the channel.
    #[arg(long, env = "CHAT_RELAY_PATH")]
    path: Option<String>,

    /// Largest inbound WebSocket message, in bytes.
    #[arg(long, env = "CHAT_RELAY_MAX_MESSAGE_BYTES")]
    max_message_bytes: Option<usize>,

    /// Reject frames that carry keys other than id, sent_at, text, chatter.
    #[arg(long, env = "CHAT_RELAY_REJECT_UNKNOWN")]
    reject_unknown_fields: bool,

    /// Log filter used when `RUST_LOG` is not set (e.g. `debug`).
    #[arg(long, env = "CHAT_RELAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Merges the config file (if any) with CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded.
    fn into_file_config(self) -> anyhow::Result<FileConfig> {
        let mut file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => FileConfig::default(),
        };

        if let Some(bind) = self.bind {
            file.server.bind = bind;
        }
        if let Some(port) = self.port {
            file.server.port = port;
        }
        if let Some(path) = self.path {
            file.server.channel_path = path;
        }
        if let Some(max) = self.max_message_bytes {
            file.server.max_message_bytes = max;
        }
        if self.reject_unknown_fields {
            file.validation.reject_unknown_fields = true;
        }
        if let Some(level) = self.log_level {
            file.logging.level = level;
        }
        Ok(file)
    }
}

fn relay_config(file: FileConfig) -> anyhow::Result<RelayConfig> {
    file.into_relay_config()
        .context("invalid relay configuration")
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let print_config = cli.print_config;
    let file = cli.into_file_config()?;

    if print_config {
        print!("{}", file.to_toml()?);
        return Ok(());
    }

    let config = relay_config(file)?;

    // `RUST_LOG` wins; otherwise use the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "chat relay starting: bind={}, path={}, policy={:?}",
        config.bind_addr, config.channel_path, config.policy.unknown_fields
    );

    // Ctrl+C clears the flag; the accept loop notices within one poll period.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
