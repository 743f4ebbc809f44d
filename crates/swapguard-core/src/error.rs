//! Error types for swapguard-core.
//!
//! Two layers live here. `PlacementError` is what a placement collaborator
//! reports verbatim (transport failure, HTTP status, exchange code). `ErrorKind`
//! and `SubmissionError` are the classified taxonomy that every terminal
//! failure is surfaced with.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid instrument id: {0}")]
    InvalidInstId(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Failure taxonomy for order submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input to normalization or the pipeline. Never retried.
    InvalidArgument,
    /// Lot size could not be resolved by any path.
    MetadataUnavailable,
    /// Transport-level failure (connect, DNS, timeout, 5xx).
    Retryable,
    /// Exchange rejected the quantity as not a multiple of the lot size.
    LotSizeViolation,
    /// Any other exchange rejection.
    Permanent,
    /// The decision was cancelled before its entry order was acknowledged.
    Cancelled,
}

impl ErrorKind {
    /// Whether the generic backoff loop may retry this kind.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::MetadataUnavailable => "metadata_unavailable",
            Self::Retryable => "retryable",
            Self::LotSizeViolation => "lot_size_violation",
            Self::Permanent => "permanent",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw failure reported by an order-placement collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// Connection refused, DNS failure, proxy failure, broken body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The attempt exceeded its timeout.
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Non-success HTTP status without a parseable exchange error.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Application-level rejection carrying the exchange's own code.
    #[error("Exchange error {code}: {message}")]
    Exchange { code: String, message: String },
}

/// A classified, terminal submission failure.
///
/// Preserves the exchange code and message so nothing is lost between the
/// wire and the pipeline result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} (code={code:?}, attempts={attempts}): {message}")]
pub struct SubmissionError {
    pub kind: ErrorKind,
    pub code: Option<String>,
    pub message: String,
    /// Number of network attempts made before this error became terminal.
    pub attempts: u32,
}

impl SubmissionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            attempts: 0,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn metadata_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MetadataUnavailable, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "decision cancelled before entry acknowledgement")
    }
}

impl From<CoreError> for SubmissionError {
    fn from(err: CoreError) -> Self {
        Self::invalid_argument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_retryable_kind_is_retryable() {
        assert!(ErrorKind::Retryable.is_retryable());
        assert!(!ErrorKind::Permanent.is_retryable());
        assert!(!ErrorKind::LotSizeViolation.is_retryable());
        assert!(!ErrorKind::InvalidArgument.is_retryable());
        assert!(!ErrorKind::MetadataUnavailable.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_submission_error_keeps_exchange_code() {
        let err = SubmissionError::new(ErrorKind::LotSizeViolation, "must be a multiple of the lot size")
            .with_code("51121")
            .with_attempts(1);
        assert_eq!(err.code.as_deref(), Some("51121"));
        assert_eq!(err.attempts, 1);
        let text = err.to_string();
        assert!(text.contains("lot_size_violation"));
        assert!(text.contains("51121"));
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::LotSizeViolation).unwrap();
        assert_eq!(json, r#""lot_size_violation""#);
    }
}
