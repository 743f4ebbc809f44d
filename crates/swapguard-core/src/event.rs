//! Structured events emitted by the pipeline and its collaborators.
//!
//! Components below the pipeline never format log lines themselves. They emit
//! `PipelineEvent`s into an `EventSink`; rendering is the sink's concern.

use crate::error::ErrorKind;
use crate::instrument::LotSizeSource;
use crate::order::OrderLeg;
use crate::outcome::{PipelineResult, PipelineState};
use crate::{InstId, Size};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one network attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted {
        order_id: String,
    },
    Failed {
        kind: ErrorKind,
        code: Option<String>,
        message: String,
        /// Backoff before the next step, if the failure is retryable.
        retry_in: Option<Duration>,
    },
}

/// Observable events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// An instrument's constraints entered the cache.
    InstrumentCached {
        symbol: InstId,
        lot_size: Size,
        source: LotSizeSource,
        version: u64,
    },
    /// A cached instrument was marked stale.
    InstrumentInvalidated { symbol: InstId, reason: String },
    /// Fetching an instrument failed; `served_stale` tells whether an older
    /// cached value was used instead.
    InstrumentFetchFailed {
        symbol: InstId,
        reason: String,
        served_stale: bool,
    },
    /// A conditional-order quantity was normalized.
    QuantityNormalized {
        symbol: InstId,
        raw: Size,
        rounded: Size,
        lot_size: Size,
        display: String,
    },
    /// One submission attempt finished.
    SubmissionAttempt {
        symbol: InstId,
        leg: OrderLeg,
        attempt: u32,
        max_attempts: u32,
        outcome: AttemptOutcome,
    },
    /// The decision moved to a new state.
    StateChanged {
        symbol: InstId,
        from: PipelineState,
        to: PipelineState,
    },
    /// The decision reached `Done`.
    PipelineCompleted { result: PipelineResult },
}

impl PipelineEvent {
    /// Short event name for metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InstrumentCached { .. } => "instrument_cached",
            Self::InstrumentInvalidated { .. } => "instrument_invalidated",
            Self::InstrumentFetchFailed { .. } => "instrument_fetch_failed",
            Self::QuantityNormalized { .. } => "quantity_normalized",
            Self::SubmissionAttempt { .. } => "submission_attempt",
            Self::StateChanged { .. } => "state_changed",
            Self::PipelineCompleted { .. } => "pipeline_completed",
        }
    }
}

/// Receiver of pipeline events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Arc wrapper for EventSink trait objects.
pub type DynEventSink = Arc<dyn EventSink>;

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Sink that keeps every event in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    /// Recorded submission attempts for a leg, in order.
    pub fn attempts_for(&self, leg: OrderLeg) -> Vec<AttemptOutcome> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::SubmissionAttempt {
                    leg: l, outcome, ..
                } if *l == leg => Some(outcome.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sequence of states entered.
    pub fn states(&self) -> Vec<PipelineState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().push(event);
    }
}

/// Forwards every event to several sinks.
#[derive(Default, Clone)]
pub struct FanoutEventSink {
    sinks: Vec<DynEventSink>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<DynEventSink>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: DynEventSink) {
        self.sinks.push(sink);
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, event: PipelineEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn normalized_event() -> PipelineEvent {
        PipelineEvent::QuantityNormalized {
            symbol: InstId::new("ETH-USDT-SWAP").unwrap(),
            raw: Size::new(dec!(0.2127)),
            rounded: Size::new(dec!(1)),
            lot_size: Size::new(dec!(1)),
            display: "1".to_string(),
        }
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingEventSink::new();
        sink.emit(normalized_event());
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.count("quantity_normalized"), 1);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(RecordingEventSink::new());
        let b = Arc::new(RecordingEventSink::new());
        let fanout = FanoutEventSink::new(vec![a.clone(), b.clone()]);
        fanout.emit(normalized_event());
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
    }

    #[test]
    fn test_empty_fanout_is_noop() {
        FanoutEventSink::default().emit(normalized_event());
    }
}
