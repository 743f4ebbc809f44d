//! Prometheus metrics for swapguard.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`: a failure means duplicate metric
//! names, which must crash at startup. It never happens after the first
//! access of each metric.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

/// Submission attempts.
/// Labels: leg (entry/take_profit/stop_loss), outcome (accepted or error kind)
pub static SUBMISSION_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "swapguard_submission_attempts_total",
        "Order submission attempts by leg and outcome",
        &["leg", "outcome"]
    )
    .unwrap()
});

/// Protective quantities normalized to a lot size.
pub static NORMALIZATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "swapguard_normalizations_total",
        "Conditional-order quantities normalized",
        &["symbol"]
    )
    .unwrap()
});

/// Instrument cache activity.
/// Labels: event (cached/invalidated/fetch_failed)
pub static INSTRUMENT_CACHE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "swapguard_instrument_cache_total",
        "Instrument cache population, invalidation and fetch failures",
        &["event"]
    )
    .unwrap()
});

/// Completed decisions.
/// Labels: result (protected/partial/entry_failed)
pub static PIPELINE_RESULTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "swapguard_pipeline_results_total",
        "Completed trading decisions by result",
        &["result"]
    )
    .unwrap()
});

/// Metrics helper for common operations.
pub struct Metrics;

impl Metrics {
    pub fn submission_attempt(leg: &str, outcome: &str) {
        SUBMISSION_ATTEMPTS_TOTAL
            .with_label_values(&[leg, outcome])
            .inc();
    }

    pub fn quantity_normalized(symbol: &str) {
        NORMALIZATIONS_TOTAL.with_label_values(&[symbol]).inc();
    }

    pub fn instrument_cache(event: &str) {
        INSTRUMENT_CACHE_TOTAL.with_label_values(&[event]).inc();
    }

    pub fn pipeline_result(result: &str) {
        PIPELINE_RESULTS_TOTAL.with_label_values(&[result]).inc();
    }

    /// Render the default registry in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render() {
        Metrics::pipeline_result("protected");
        let text = Metrics::render().unwrap();
        assert!(text.contains("swapguard_pipeline_results_total"));
    }

    #[test]
    fn test_submission_counter() {
        let before = SUBMISSION_ATTEMPTS_TOTAL
            .with_label_values(&["entry", "retryable"])
            .get();
        Metrics::submission_attempt("entry", "retryable");
        let after = SUBMISSION_ATTEMPTS_TOTAL
            .with_label_values(&["entry", "retryable"])
            .get();
        assert_eq!(after, before + 1);
    }
}
