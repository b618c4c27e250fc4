//! nyx-stream relay binary
//!
//! Loads configuration, installs logging and signal handlers, and runs the
//! relay until it is stopped over the control plane or by a signal.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::Layer;

use cli::Cli;
use nyx_stream::RelayConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "nyx-stream starting");

    let config = match &cli.config {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RelayConfig::default(),
    };
    let config = cli.apply(config);

    info!(
        ingest = %config.ingest_addr,
        control = %config.control_addr,
        heartbeat = %config.heartbeat_addr,
        "Configuration loaded"
    );

    let (relay, runtime) = nyx_stream::server::build(config).context("invalid configuration")?;

    tokio::spawn(stop_on_signal(runtime.shutdown_token()));

    let stats = relay.run().await;

    info!(
        frames = stats.frames_received,
        deliveries = stats.deliveries,
        "nyx-stream finished"
    );
    Ok(())
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else {
        let default_level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let fmt_layer = match cli.log_format {
        cli::LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .boxed(),
        cli::LogFormat::Pretty => fmt::layer().pretty().boxed(),
        cli::LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Cancel the relay on Ctrl+C or SIGTERM
async fn stop_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => return,
    }

    tracing::warn!("Received shutdown signal, stopping relay");
    shutdown.cancel();
}
