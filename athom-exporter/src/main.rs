//! Prometheus exporter for Athom smart plugs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use athom_exporter::config::normalize_listen;
use athom_exporter::{ExporterConfig, HttpServer, SensorCollector};

/// Prometheus exporter for Athom smart plugs.
#[derive(Parser, Debug)]
#[command(name = "athom-exporter")]
#[command(about = "Export Athom smart plug sensors as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address, `:port` listens on all interfaces (overrides config).
    #[arg(long, env = "BIND_ADDRESS")]
    listen: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ExporterConfig::default(),
    };

    if let Some(listen) = args.listen.as_deref().filter(|l| !l.trim().is_empty()) {
        config.server.listen = normalize_listen(listen);
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    athom_exporter::init_tracing(&config.logging)?;

    let listen_addr = config.server.listen_addr()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %listen_addr,
        "Starting athom-exporter"
    );

    let collector = Arc::new(
        SensorCollector::from_config(&config.upstream)
            .context("Failed to create upstream HTTP client")?,
    );
    let http_server = HttpServer::new(
        collector,
        listen_addr,
        config.server.path.clone(),
        config.server.request_timeout(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut http_task = tokio::spawn(http_server.run(shutdown_rx));

    tokio::select! {
        result = &mut http_task => {
            // The server only returns on its own when something went wrong.
            let err = match result {
                Ok(Ok(())) => anyhow::anyhow!("HTTP server exited unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => anyhow::anyhow!("HTTP server task failed: {}", e),
            };
            error!(error = %err, "Server failed");
            return Err(err);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    if tokio::time::timeout(Duration::from_secs(5), http_task)
        .await
        .is_err()
    {
        error!("HTTP server did not stop within 5s");
    }

    info!("Exporter stopped");
    Ok(())
}

/// Resolve when the process receives SIGTERM.
async fn terminate() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
