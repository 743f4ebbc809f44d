//! Pipeline events rendered as tracing records and Prometheus counters.

use crate::metrics::Metrics;
use swapguard_core::{AttemptOutcome, EventSink, PipelineEvent};
use tracing::{debug, error, info, warn};

/// Event sink that logs every event and keeps the counters current.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn emit(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::InstrumentCached {
                symbol,
                lot_size,
                source,
                version,
            } => {
                Metrics::instrument_cache("cached");
                info!(%symbol, %lot_size, %source, version, "Instrument cached");
            }
            PipelineEvent::InstrumentInvalidated { symbol, reason } => {
                Metrics::instrument_cache("invalidated");
                warn!(%symbol, %reason, "Instrument invalidated");
            }
            PipelineEvent::InstrumentFetchFailed {
                symbol,
                reason,
                served_stale,
            } => {
                Metrics::instrument_cache("fetch_failed");
                warn!(%symbol, %reason, served_stale, "Instrument fetch failed");
            }
            PipelineEvent::QuantityNormalized {
                symbol,
                raw,
                rounded,
                lot_size,
                display: shown,
            } => {
                Metrics::quantity_normalized(symbol.as_str());
                info!(%symbol, %raw, %rounded, %lot_size, display = %shown, "Quantity normalized");
            }
            PipelineEvent::SubmissionAttempt {
                symbol,
                leg,
                attempt,
                max_attempts,
                outcome,
            } => match outcome {
                AttemptOutcome::Accepted { order_id } => {
                    Metrics::submission_attempt(leg.as_str(), "accepted");
                    info!(%symbol, %leg, attempt, max_attempts, %order_id, "Order accepted");
                }
                AttemptOutcome::Failed {
                    kind,
                    code,
                    message,
                    retry_in,
                } => {
                    Metrics::submission_attempt(leg.as_str(), kind.as_str());
                    match retry_in {
                        Some(delay) => warn!(
                            %symbol,
                            %leg,
                            attempt,
                            max_attempts,
                            %kind,
                            code = code.as_deref().unwrap_or(""),
                            %message,
                            retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "Order attempt failed, backing off"
                        ),
                        None => error!(
                            %symbol,
                            %leg,
                            attempt,
                            max_attempts,
                            %kind,
                            code = code.as_deref().unwrap_or(""),
                            %message,
                            "Order attempt failed"
                        ),
                    }
                }
            },
            PipelineEvent::StateChanged { symbol, from, to } => {
                debug!(%symbol, %from, %to, "Pipeline state changed");
            }
            PipelineEvent::PipelineCompleted { result } => {
                let summary = result.summary();
                Metrics::pipeline_result(summary);
                if result.is_partial() {
                    warn!(
                        symbol = %result.symbol,
                        entry = %result.entry,
                        take_profit = %result.take_profit,
                        stop_loss = %result.stop_loss,
                        "Position open without full protection"
                    );
                } else {
                    info!(
                        symbol = %result.symbol,
                        %summary,
                        entry = %result.entry,
                        take_profit = %result.take_profit,
                        stop_loss = %result.stop_loss,
                        "Pipeline completed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{INSTRUMENT_CACHE_TOTAL, NORMALIZATIONS_TOTAL, SUBMISSION_ATTEMPTS_TOTAL};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use swapguard_core::{ErrorKind, InstId, LotSizeSource, OrderLeg, Size};

    fn eth() -> InstId {
        InstId::new("ETH-USDT-SWAP").unwrap()
    }

    #[test]
    fn test_attempt_events_update_counters() {
        let counter = SUBMISSION_ATTEMPTS_TOTAL.with_label_values(&["take_profit", "lot_size_violation"]);
        let before = counter.get();

        TracingEventSink.emit(PipelineEvent::SubmissionAttempt {
            symbol: eth(),
            leg: OrderLeg::TakeProfit,
            attempt: 1,
            max_attempts: 3,
            outcome: AttemptOutcome::Failed {
                kind: ErrorKind::LotSizeViolation,
                code: Some("51121".to_string()),
                message: "Order quantity must be a multiple of the lot size.".to_string(),
                retry_in: None,
            },
        });

        assert_eq!(counter.get(), before + 1);
    }

    #[test]
    fn test_retry_event_is_rendered() {
        let counter = SUBMISSION_ATTEMPTS_TOTAL.with_label_values(&["stop_loss", "retryable"]);
        let before = counter.get();

        TracingEventSink.emit(PipelineEvent::SubmissionAttempt {
            symbol: eth(),
            leg: OrderLeg::StopLoss,
            attempt: 1,
            max_attempts: 3,
            outcome: AttemptOutcome::Failed {
                kind: ErrorKind::Retryable,
                code: None,
                message: "connection refused".to_string(),
                retry_in: Some(Duration::from_secs(5)),
            },
        });

        assert_eq!(counter.get(), before + 1);
    }

    #[test]
    fn test_normalization_event_updates_counter() {
        let symbol = InstId::new("DOGE-USDT-SWAP").unwrap();
        let counter = NORMALIZATIONS_TOTAL.with_label_values(&[symbol.as_str()]);
        let before = counter.get();

        TracingEventSink.emit(PipelineEvent::QuantityNormalized {
            symbol,
            raw: Size::new(dec!(1234.5)),
            rounded: Size::new(dec!(1235)),
            lot_size: Size::new(dec!(1)),
            display: "1235".to_string(),
        });

        assert_eq!(counter.get(), before + 1);
    }

    #[test]
    fn test_cache_events_update_counters() {
        let counter = INSTRUMENT_CACHE_TOTAL.with_label_values(&["cached"]);
        let before = counter.get();

        TracingEventSink.emit(PipelineEvent::InstrumentCached {
            symbol: eth(),
            lot_size: Size::new(dec!(1)),
            source: LotSizeSource::Precision,
            version: 1,
        });

        assert_eq!(counter.get(), before + 1);
    }
}
