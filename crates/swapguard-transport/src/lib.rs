//! Outbound connectivity for swapguard.
//!
//! Wraps order placement with per-attempt timeouts, optional proxy routing
//! and a bounded exponential backoff that only ever retries transport-level
//! failures.
//!
//! # Key Components
//!
//! - [`TransportConfig`]: proxy, timeout and retry settings, HTTP client builder
//! - [`RetryPolicy`] / [`RetryState`]: attempt budget and delay sequence
//! - [`Sleeper`]: injectable delay, so backoff is testable without waiting
//! - [`ErrorClassifier`]: exchange code -> `ErrorKind` table
//! - [`ConnectivityManager`]: the resilient `send(request)` wrapper

pub mod classify;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod retry;

pub use classify::{ErrorClassifier, LOT_SIZE_VIOLATION_CODE};
pub use config::{ProxyScheme, TransportConfig};
pub use connectivity::ConnectivityManager;
pub use error::{TransportError, TransportResult};
pub use retry::{DynSleeper, RecordingSleeper, RetryPolicy, RetryState, Sleeper, TokioSleeper};
