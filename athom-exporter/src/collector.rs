//! Scrape orchestration: one scrape request, one pass over the sensors.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, debug, info_span, warn};

use crate::config::UpstreamConfig;
use crate::error::{FetchError, ScrapeError};
use crate::format::{LabelSet, format_metric};
use crate::sensor::{HttpSensorSource, SENSORS, SensorSource};

/// Prefix of every exported metric name.
pub const METRIC_PREFIX: &str = "athom_sensor";

/// Exported metric name for a sensor.
pub fn metric_name(sensor: &str) -> String {
    format!("{}_{}", METRIC_PREFIX, sensor)
}

/// Reads all sensors of a target and renders them as exposition text.
///
/// Sensors are fetched one after the other in [`SENSORS`] order. The first
/// failure aborts the scrape; partial output is never returned. The whole
/// pass shares one deadline, and running out of it fails the sensor being
/// read at that moment.
pub struct SensorCollector {
    source: Arc<dyn SensorSource>,
    scrape_timeout: Duration,
}

/// Collector shared across request handlers.
pub type SharedCollector = Arc<SensorCollector>;

impl SensorCollector {
    /// Create a collector reading from `source` with the default scrape deadline.
    pub fn new(source: Arc<dyn SensorSource>) -> Self {
        Self {
            source,
            scrape_timeout: UpstreamConfig::default().scrape_timeout(),
        }
    }

    /// Create a collector talking HTTP to the plugs.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, FetchError> {
        Ok(Self::new(Arc::new(HttpSensorSource::new(config)?))
            .with_scrape_timeout(config.scrape_timeout()))
    }

    /// Set the deadline for reading all sensors of one scrape.
    pub fn with_scrape_timeout(mut self, scrape_timeout: Duration) -> Self {
        self.scrape_timeout = scrape_timeout;
        self
    }

    /// Scrape every sensor of `target` and return the response body.
    ///
    /// The target is used verbatim; only an empty one is rejected.
    pub async fn collect(&self, target: &str) -> Result<String, ScrapeError> {
        if target.is_empty() {
            return Err(ScrapeError::MissingTarget);
        }

        let span = info_span!("scrape", target = %target);
        self.collect_all(target).instrument(span).await
    }

    async fn collect_all(&self, target: &str) -> Result<String, ScrapeError> {
        let deadline = Instant::now() + self.scrape_timeout;
        let mut body = String::with_capacity(SENSORS.len() * 64);

        for sensor in SENSORS {
            let fetched = match timeout_at(deadline, self.source.fetch(target, sensor)).await {
                Ok(fetched) => fetched,
                Err(_) => Err(FetchError::Transport(format!(
                    "scrape deadline of {:?} exceeded",
                    self.scrape_timeout
                ))),
            };

            let reading = match fetched {
                Ok(reading) => reading,
                Err(e) => {
                    warn!(sensor, error = %e, "Sensor fetch failed, aborting scrape");
                    return Err(ScrapeError::fetch(sensor, e));
                }
            };

            debug!(
                sensor,
                id = %reading.id,
                value = reading.value,
                state = %reading.state,
                "Sensor read"
            );

            let mut labels = LabelSet::with_capacity(1);
            labels.insert("id".to_string(), reading.id);
            body.push_str(&format_metric(&metric_name(sensor), &labels, reading.value));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorReading;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fake source that records every call and fails on one sensor.
    #[derive(Default)]
    struct FakeSource {
        calls: Mutex<Vec<(String, String)>>,
        fail_on: Option<&'static str>,
    }

    impl FakeSource {
        fn failing_on(sensor: &'static str) -> Self {
            Self {
                fail_on: Some(sensor),
                ..Default::default()
            }
        }

        fn sensors_called(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(_, s)| s.clone())
                .collect()
        }
    }

    #[async_trait]
    impl SensorSource for FakeSource {
        async fn fetch(&self, target: &str, sensor: &str) -> Result<SensorReading, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((target.to_string(), sensor.to_string()));

            if self.fail_on == Some(sensor) {
                return Err(FetchError::Status("503 Service Unavailable".to_string()));
            }

            Ok(SensorReading {
                id: "s1".to_string(),
                value: 42.5,
                state: "ok".to_string(),
            })
        }
    }

    fn collector(source: &Arc<FakeSource>) -> SensorCollector {
        SensorCollector::new(source.clone())
    }

    #[test]
    fn test_metric_name() {
        assert_eq!(metric_name("power"), "athom_sensor_power");
        assert_eq!(metric_name("wifi_signal_db"), "athom_sensor_wifi_signal_db");
    }

    #[tokio::test]
    async fn test_collect_all_sensors_in_order() {
        let source = Arc::new(FakeSource::default());
        let body = collector(&source).collect("http://fake").await.unwrap();

        assert_eq!(
            body,
            "athom_sensor_power{id=\"s1\"} 42.5\n\
             athom_sensor_wifi_signal_db{id=\"s1\"} 42.5\n\
             athom_sensor_voltage{id=\"s1\"} 42.5\n\
             athom_sensor_current{id=\"s1\"} 42.5\n"
        );
        assert_eq!(
            source.sensors_called(),
            vec!["power", "wifi_signal_db", "voltage", "current"]
        );
        assert!(
            source
                .calls
                .lock()
                .unwrap()
                .iter()
                .all(|(t, _)| t == "http://fake")
        );
    }

    #[tokio::test]
    async fn test_collect_stops_after_first_failure() {
        let source = Arc::new(FakeSource::failing_on("wifi_signal_db"));
        let err = collector(&source).collect("http://fake").await.unwrap_err();

        assert!(matches!(
            &err,
            ScrapeError::Fetch { sensor, source: FetchError::Status(_) } if sensor == "wifi_signal_db"
        ));
        assert!(err.to_string().contains("wifi_signal_db"));
        assert_eq!(source.sensors_called(), vec!["power", "wifi_signal_db"]);
    }

    #[tokio::test]
    async fn test_collect_failure_on_first_sensor() {
        let source = Arc::new(FakeSource::failing_on("power"));
        let result = collector(&source).collect("http://fake").await;

        assert!(result.is_err());
        assert_eq!(source.sensors_called(), vec!["power"]);
    }

    #[tokio::test]
    async fn test_collect_failure_on_last_sensor_returns_nothing() {
        let source = Arc::new(FakeSource::failing_on("current"));
        let result = collector(&source).collect("http://fake").await;

        assert!(matches!(result, Err(ScrapeError::Fetch { .. })));
        assert_eq!(source.sensors_called().len(), 4);
    }

    #[tokio::test]
    async fn test_collect_empty_target() {
        let source = Arc::new(FakeSource::default());

        let result = collector(&source).collect("").await;
        assert!(matches!(result, Err(ScrapeError::MissingTarget)));
        assert!(source.sensors_called().is_empty());
    }

    #[tokio::test]
    async fn test_collect_uses_target_verbatim() {
        let source = Arc::new(FakeSource::default());

        collector(&source).collect(" http://fake ").await.unwrap();
        assert!(
            source
                .calls
                .lock()
                .unwrap()
                .iter()
                .all(|(t, _)| t == " http://fake ")
        );
    }

    /// Never answers.
    struct HangingSource;

    #[async_trait]
    impl SensorSource for HangingSource {
        async fn fetch(&self, _target: &str, _sensor: &str) -> Result<SensorReading, FetchError> {
            std::future::pending::<Result<SensorReading, FetchError>>().await
        }
    }

    #[tokio::test]
    async fn test_collect_deadline_fails_current_sensor() {
        let collector = SensorCollector::new(Arc::new(HangingSource))
            .with_scrape_timeout(Duration::from_millis(50));

        let err = collector.collect("http://fake").await.unwrap_err();
        match err {
            ScrapeError::Fetch { sensor, source } => {
                assert_eq!(sensor, "power");
                assert!(matches!(source, FetchError::Transport(_)));
                assert!(source.to_string().contains("deadline"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
