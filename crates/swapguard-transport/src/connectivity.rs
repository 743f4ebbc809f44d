//! Resilient order submission.
//!
//! `ConnectivityManager` wraps an `OrderPlacer` with a per-attempt timeout,
//! table-driven error classification and bounded exponential backoff.
//! Only `Retryable` failures are retried; everything else surfaces on the
//! attempt that produced it. Every attempt is reported as a
//! `PipelineEvent::SubmissionAttempt`; the manager writes no log lines.

use crate::classify::ErrorClassifier;
use crate::config::TransportConfig;
use crate::error::TransportResult;
use crate::retry::{DynSleeper, RetryPolicy, RetryState, TokioSleeper};
use std::sync::Arc;
use std::time::Duration;
use swapguard_core::{
    AttemptOutcome, DynEventSink, DynOrderPlacer, OrderAck, OrderRequest, PipelineEvent,
    PlacementError, SubmissionError,
};
use tokio_util::sync::CancellationToken;

/// Retry/timeout wrapper around the order-placement collaborator.
pub struct ConnectivityManager {
    placer: DynOrderPlacer,
    policy: RetryPolicy,
    timeout: Duration,
    classifier: ErrorClassifier,
    sleeper: DynSleeper,
    events: DynEventSink,
}

impl ConnectivityManager {
    /// Create a manager from transport configuration.
    pub fn new(
        placer: DynOrderPlacer,
        config: &TransportConfig,
        events: DynEventSink,
    ) -> TransportResult<Self> {
        config.validate()?;
        Ok(Self {
            placer,
            policy: config.retry_policy(),
            timeout: config.timeout(),
            classifier: ErrorClassifier::with_retryable_codes(config.retryable_codes.iter().cloned()),
            sleeper: Arc::new(TokioSleeper),
            events,
        })
    }

    /// Replace the sleeper (tests inject a recording sleeper).
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: DynSleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Submit one request with retry.
    pub async fn send(&self, request: &OrderRequest) -> Result<OrderAck, SubmissionError> {
        self.send_inner(request, None).await
    }

    /// Submit one request, giving up early if `cancel` fires before an
    /// attempt starts or while backing off. An attempt already on the wire
    /// is never abandoned.
    pub async fn send_cancellable(
        &self,
        request: &OrderRequest,
        cancel: &CancellationToken,
    ) -> Result<OrderAck, SubmissionError> {
        self.send_inner(request, Some(cancel)).await
    }

    async fn send_inner(
        &self,
        request: &OrderRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<OrderAck, SubmissionError> {
        let mut state = RetryState::new(self.policy);

        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(SubmissionError::cancelled().with_attempts(state.attempt_count));
            }

            let attempt = state.begin_attempt();
            let error = match self.attempt_once(request).await {
                Ok(ack) => {
                    self.emit_attempt(
                        request,
                        attempt,
                        AttemptOutcome::Accepted {
                            order_id: ack.order_id.clone(),
                        },
                    );
                    return Ok(ack);
                }
                Err(raw) => self.classifier.classify(&raw).with_attempts(attempt),
            };

            if !error.kind.is_retryable() {
                self.emit_attempt(request, attempt, failed_outcome(&error, None));
                return Err(error);
            }

            let delay = state.next_delay;
            self.emit_attempt(request, attempt, failed_outcome(&error, Some(delay)));
            state.record_failure(error);

            if self.backoff(delay, cancel).await {
                return Err(SubmissionError::cancelled().with_attempts(state.attempt_count));
            }

            if state.is_exhausted() {
                return Err(exhausted(state));
            }
        }
    }

    async fn attempt_once(&self, request: &OrderRequest) -> Result<OrderAck, PlacementError> {
        match tokio::time::timeout(self.timeout, self.placer.place_order(request)).await {
            Ok(result) => result,
            Err(_) => Err(PlacementError::Timeout(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    /// Sleep for `delay`. Returns true if cancelled meanwhile.
    async fn backoff(&self, delay: Duration, cancel: Option<&CancellationToken>) -> bool {
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => true,
                    () = self.sleeper.sleep(delay) => false,
                }
            }
            None => {
                self.sleeper.sleep(delay).await;
                false
            }
        }
    }

    fn emit_attempt(&self, request: &OrderRequest, attempt: u32, outcome: AttemptOutcome) {
        self.events.emit(PipelineEvent::SubmissionAttempt {
            symbol: request.symbol.clone(),
            leg: request.leg(),
            attempt,
            max_attempts: self.policy.max_attempts,
            outcome,
        });
    }
}

fn failed_outcome(error: &SubmissionError, retry_in: Option<Duration>) -> AttemptOutcome {
    AttemptOutcome::Failed {
        kind: error.kind,
        code: error.code.clone(),
        message: error.message.clone(),
        retry_in,
    }
}

fn exhausted(state: RetryState) -> SubmissionError {
    let attempts = state.attempt_count;
    match state.last_error {
        Some(last) => SubmissionError {
            message: format!("{} (gave up after {attempts} attempts)", last.message),
            attempts,
            ..last
        },
        None => SubmissionError::new(
            swapguard_core::ErrorKind::Retryable,
            format!("gave up after {attempts} attempts"),
        )
        .with_attempts(attempts),
    }
}
