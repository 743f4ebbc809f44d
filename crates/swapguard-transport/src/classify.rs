//! Exchange error classification.
//!
//! Maps raw placement failures onto the `ErrorKind` taxonomy. Exchange codes
//! are looked up in a table; nothing here inspects message text.

use std::collections::HashMap;
use swapguard_core::{ErrorKind, PlacementError, SubmissionError};

/// Exchange code for "order quantity must be a multiple of the lot size".
pub const LOT_SIZE_VIOLATION_CODE: &str = "51121";

/// Table-driven classifier.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    codes: HashMap<String, ErrorKind>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        let mut codes = HashMap::new();
        codes.insert(LOT_SIZE_VIOLATION_CODE.to_string(), ErrorKind::LotSizeViolation);
        Self { codes }
    }
}

impl ErrorClassifier {
    /// Default table plus exchange codes that may be retried.
    pub fn with_retryable_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classifier = Self::default();
        for code in codes {
            classifier.codes.insert(code.into(), ErrorKind::Retryable);
        }
        classifier
    }

    /// Map an exchange code to a kind, overriding any existing entry.
    pub fn insert(&mut self, code: impl Into<String>, kind: ErrorKind) {
        self.codes.insert(code.into(), kind);
    }

    /// Kind for an exchange code. Unknown codes are permanent.
    pub fn kind_for_code(&self, code: &str) -> ErrorKind {
        self.codes.get(code).copied().unwrap_or(ErrorKind::Permanent)
    }

    /// Classify a raw failure, keeping its code and message.
    pub fn classify(&self, error: &PlacementError) -> SubmissionError {
        match error {
            PlacementError::Transport(_) | PlacementError::Timeout(_) => {
                SubmissionError::new(ErrorKind::Retryable, error.to_string())
            }
            PlacementError::Http { status, .. } => {
                let kind = if *status == 429 || (500..600).contains(status) {
                    ErrorKind::Retryable
                } else {
                    ErrorKind::Permanent
                };
                SubmissionError::new(kind, error.to_string()).with_code(status.to_string())
            }
            PlacementError::Exchange { code, message } => {
                SubmissionError::new(self.kind_for_code(code), message.clone()).with_code(code.clone())
            }
        }
    }
}
