//! Configuration for the Athom exporter.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Settings for requests to the sensor devices.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (default: "0.0.0.0:5573").
    ///
    /// The `:port` shorthand listens on all interfaces.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Upper bound on handling one request, scrape included (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_listen() -> String {
    "0.0.0.0:5573".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Parse the listen address, expanding the `:port` shorthand.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        normalize_listen(&self.listen)
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Invalid listen address: {}", self.listen)))
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Expand `:5573` to `0.0.0.0:5573`; other addresses are returned as is.
pub fn normalize_listen(listen: &str) -> String {
    let listen = listen.trim();
    if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_string()
    }
}

/// Settings for the HTTP client talking to the plugs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Total timeout for one sensor request (seconds).
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Deadline for reading all sensors of one scrape (seconds).
    ///
    /// Must be shorter than `server.request_timeout_secs` so a slow plug
    /// is reported as a failed sensor instead of a bare request timeout.
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,

    /// Timeout for establishing the connection (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// User-Agent header sent to the plugs.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_upstream_timeout() -> u64 {
    5
}

fn default_scrape_timeout() -> u64 {
    8
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!("athom-exporter/{}", env!("CARGO_PKG_VERSION"))
}

impl UpstreamConfig {
    /// Scrape deadline as a [`Duration`].
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_upstream_timeout(),
            scrape_timeout_secs: default_scrape_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.listen_addr()?;

        if !self.server.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if self.server.path == "/health" {
            return Err(ConfigError::Validation(
                "Metrics path must not be /health".to_string(),
            ));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream timeout_secs must be > 0".to_string(),
            ));
        }

        if self.upstream.scrape_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream scrape_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.upstream.scrape_timeout_secs >= self.server.request_timeout_secs {
            return Err(ConfigError::Validation(format!(
                "upstream scrape_timeout_secs ({}) must be shorter than request_timeout_secs ({})",
                self.upstream.scrape_timeout_secs, self.server.request_timeout_secs
            )));
        }

        if self.upstream.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream connect_timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
