//! Sensor readings and the sources they are fetched from.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::trace;

use crate::config::UpstreamConfig;
use crate::error::FetchError;

/// Sensors read on every scrape, in output order.
pub const SENSORS: [&str; 4] = ["power", "wifi_signal_db", "voltage", "current"];

/// One sensor value as reported by the plug.
///
/// ```json
/// {"id": "sensor-power", "value": 42.5, "state": "42.5 W"}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorReading {
    pub id: String,
    pub value: f32,
    pub state: String,
}

impl SensorReading {
    /// Parse a reading from a response body.
    pub fn from_json(body: &[u8]) -> Result<Self, FetchError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Build the URL of one sensor on a target.
pub fn sensor_url(target: &str, sensor: &str) -> String {
    format!("{}/sensor/{}", target, sensor)
}

/// Somewhere sensor readings can be fetched from.
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Fetch a single sensor from `target`.
    async fn fetch(&self, target: &str, sensor: &str) -> Result<SensorReading, FetchError>;
}

/// Fetches readings from the plug's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSensorSource {
    client: reqwest::Client,
}

impl HttpSensorSource {
    /// Build a source with its own connection pool.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl SensorSource for HttpSensorSource {
    async fn fetch(&self, target: &str, sensor: &str) -> Result<SensorReading, FetchError> {
        let url = sensor_url(target, sensor);
        trace!(url = %url, "Requesting sensor");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        // Only 200 is accepted, other 2xx codes included.
        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status().to_string()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read response body: {}", e)))?;

        SensorReading::from_json(&body)
    }
}
