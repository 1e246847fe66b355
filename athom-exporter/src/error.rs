//! Error types for scraping sensors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Why a single sensor fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The upstream could not be reached, timed out, or the body could not be read.
    #[error("failed to fetch data from target: {0}")]
    Transport(String),

    /// The upstream answered with something other than `200 OK`.
    #[error("unexpected HTTP status: {0}")]
    Status(String),

    /// The body is not a valid sensor reading.
    #[error("failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors that abort a scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The `target` query parameter was missing or empty.
    #[error("Missing 'target' query parameter")]
    MissingTarget,

    /// One of the sensors could not be fetched.
    #[error("Error fetching sensor {sensor}: {source}")]
    Fetch {
        sensor: String,
        #[source]
        source: FetchError,
    },
}

impl ScrapeError {
    /// Wrap a fetch error with the sensor it belongs to.
    pub fn fetch(sensor: impl Into<String>, source: FetchError) -> Self {
        Self::Fetch {
            sensor: sensor.into(),
            source,
        }
    }

    /// HTTP status reported to the scraper.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScrapeError::MissingTarget => StatusCode::BAD_REQUEST,
            ScrapeError::Fetch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ScrapeError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [("content-type", "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}
