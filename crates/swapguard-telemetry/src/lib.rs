//! Prometheus metrics and structured logging for swapguard.
//!
//! - `init_logging`: tracing subscriber, JSON in production
//! - `Metrics`: counters for submissions, normalizations, cache activity
//! - `TracingEventSink`: renders pipeline events as log records and metrics

pub mod error;
pub mod event_log;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use event_log::TracingEventSink;
pub use logging::init_logging;
pub use metrics::Metrics;
