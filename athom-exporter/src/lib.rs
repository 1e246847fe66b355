//! Prometheus exporter for Athom smart plugs.
//!
//! Every scrape of `/metrics?target=<plug-url>` reads the plug's sensors over
//! its HTTP API and answers with one exposition line per sensor.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   HTTP Server   │────>│    Collector    │────>│   Athom plug    │
//! │   (/metrics)    │     │  (sequential)   │     │ (/sensor/<name>)│
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Sensors are read one at a time in a fixed order and the first failure
//! fails the scrape, so a response is either complete or an error.
//!
//! # Usage
//!
//! ```bash
//! athom-exporter --listen 0.0.0.0:5573
//! curl 'http://localhost:5573/metrics?target=http://192.168.1.40'
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod error;
pub mod format;
pub mod http;
pub mod sensor;

pub use collector::{SensorCollector, SharedCollector};
pub use config::{ExporterConfig, LogFormat, LoggingConfig};
pub use error::{FetchError, ScrapeError};
pub use format::{LabelSet, format_metric};
pub use http::HttpServer;
pub use sensor::{HttpSensorSource, SENSORS, SensorReading, SensorSource};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
    }

    Ok(())
}
