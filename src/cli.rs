//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use nyx_stream::RelayConfig;

/// nyx-stream - real-time telemetry relay
#[derive(Parser, Debug)]
#[command(
    name = "nyx-stream",
    author,
    version,
    about = "Relay framed telemetry records to WebSocket subscribers",
    long_about = "Accepts framed records on a TCP ingest link and fans each one out to the\n\
                  WebSocket subscribers registered for its routing key.\n\n\
                  Settings are read from built-in defaults, then the TOML file given\n\
                  with --config, then environment variables and flags."
)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "NYX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ingest listener address
    #[arg(long, env = "NYX_INGEST_ADDR")]
    pub ingest: Option<String>,

    /// Control-plane listener address
    #[arg(long, env = "NYX_CONTROL_ADDR")]
    pub control: Option<String>,

    /// Heartbeat MQTT broker address
    #[arg(long, env = "NYX_HEARTBEAT_ADDR")]
    pub heartbeat: Option<String>,

    /// Broker username; also enables subscriber tokens
    #[arg(long, env = "NYX_USERNAME")]
    pub username: Option<String>,

    /// Broker password; also enables subscriber tokens
    #[arg(long, env = "NYX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// MQTT client identifier
    #[arg(long, env = "NYX_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Initial event-loop poll interval in milliseconds
    #[arg(long, env = "NYX_POLL_MS")]
    pub poll_ms: Option<u32>,

    /// Largest accepted ingest payload in bytes
    #[arg(long, env = "NYX_MAX_PAYLOAD")]
    pub max_payload: Option<usize>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, env = "NYX_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", env = "NYX_LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Cli {
    /// Layer flag and environment overrides on top of a loaded configuration
    pub fn apply(&self, mut config: RelayConfig) -> RelayConfig {
        if let Some(addr) = &self.ingest {
            config.ingest_addr = addr.clone();
        }
        if let Some(addr) = &self.control {
            config.control_addr = addr.clone();
        }
        if let Some(addr) = &self.heartbeat {
            config.heartbeat_addr = addr.clone();
        }
        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(client_id) = &self.client_id {
            config.client_id = client_id.clone();
        }
        if let Some(ms) = self.poll_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(len) = self.max_payload {
            config.max_payload_len = len;
        }
        config
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
