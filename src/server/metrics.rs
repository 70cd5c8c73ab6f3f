//! Prometheus metrics for drain requests
//!
//! - `drain_delay_requests_total{outcome}` - finished requests by outcome
//! - `drain_delay_duration_seconds{outcome}` - time spent holding a request
//! - `drain_delay_in_flight` - requests currently waiting

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics output is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Outcome label values
pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_TIMEOUT: &str = "timeout";
pub const OUTCOME_NOT_FOUND: &str = "not_found";
pub const OUTCOME_INVALID: &str = "invalid";

/// Duration buckets in seconds, sized around the default 60s max delay
const DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0, 120.0];

pub struct DrainMetrics {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
    in_flight: IntGauge,
}

pub type SharedMetrics = Arc<DrainMetrics>;

impl DrainMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(
                "drain_delay_requests_total",
                "Drain delay requests by outcome",
            ),
            &["outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "drain_delay_duration_seconds",
                "Time a drain delay request was held, by outcome",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["outcome"],
        )?;
        let in_flight = IntGauge::new(
            "drain_delay_in_flight",
            "Drain delay requests currently waiting",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;

        Ok(Self {
            registry,
            requests,
            duration,
            in_flight,
        })
    }

    /// Record a finished request
    pub fn record(&self, outcome: &str, seconds: f64) {
        self.requests.with_label_values(&[outcome]).inc();
        self.duration
            .with_label_values(&[outcome])
            .observe(seconds);
    }

    /// Record a request rejected before any waiting
    pub fn record_invalid(&self) {
        self.requests.with_label_values(&[OUTCOME_INVALID]).inc();
    }

    /// Mark a request as waiting until the returned guard is dropped
    pub fn track_in_flight(&self) -> InFlightGuard {
        self.in_flight.inc();
        InFlightGuard {
            gauge: self.in_flight.clone(),
        }
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.get()
    }

    pub fn request_count(&self, outcome: &str) -> u64 {
        self.requests.with_label_values(&[outcome]).get()
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Decrements the in-flight gauge on drop, so cancelled requests are
/// accounted for too
pub struct InFlightGuard {
    gauge: IntGauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

pub fn create_metrics() -> Result<SharedMetrics, MetricsError> {
    Ok(Arc::new(DrainMetrics::new()?))
}
