//! Registry error types.

use swapguard_core::{CoreError, ErrorKind, SubmissionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Metadata unavailable for {symbol}: {reason}")]
    MetadataUnavailable { symbol: String, reason: String },

    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("Exchange error {code}: {message}")]
    Exchange { code: String, message: String },

    #[error("Instrument parse error: {0}")]
    ParseError(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

impl From<RegistryError> for SubmissionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Core(core) => core.into(),
            other => SubmissionError::new(ErrorKind::MetadataUnavailable, other.to_string()),
        }
    }
}
