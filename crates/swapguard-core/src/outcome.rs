//! Per-leg and per-decision results.

use crate::error::SubmissionError;
use crate::quantity::NormalizedQuantity;
use crate::InstId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// States a trading decision moves through.
///
/// `Done` is terminal whatever happened to the protective legs; an accepted
/// entry is never rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    EntrySubmitted,
    EntryAcked,
    TpSubmitted,
    TpAcked,
    TpFailed,
    SlSubmitted,
    SlAcked,
    SlFailed,
    Done,
}

impl PipelineState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, EntrySubmitted)
                | (Idle, Done)
                | (EntrySubmitted, EntryAcked)
                | (EntrySubmitted, Done)
                | (EntryAcked, TpSubmitted)
                | (EntryAcked, Done)
                | (TpSubmitted, TpAcked)
                | (TpSubmitted, TpFailed)
                | (TpAcked, SlSubmitted)
                | (TpFailed, SlSubmitted)
                | (SlSubmitted, SlAcked)
                | (SlSubmitted, SlFailed)
                | (SlAcked, Done)
                | (SlFailed, Done)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::EntrySubmitted => "entry_submitted",
            Self::EntryAcked => "entry_acked",
            Self::TpSubmitted => "tp_submitted",
            Self::TpAcked => "tp_acked",
            Self::TpFailed => "tp_failed",
            Self::SlSubmitted => "sl_submitted",
            Self::SlAcked => "sl_acked",
            Self::SlFailed => "sl_failed",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Result of one leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LegOutcome {
    Accepted { order_id: String },
    Failed(SubmissionError),
    /// Not attempted because the entry leg did not succeed.
    Skipped,
}

impl LegOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::Accepted { order_id } => Some(order_id),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SubmissionError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for LegOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { order_id } => write!(f, "accepted({order_id})"),
            Self::Failed(err) => write!(f, "failed({err})"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one trading decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub symbol: InstId,
    pub entry: LegOutcome,
    pub take_profit: LegOutcome,
    pub stop_loss: LegOutcome,
    /// Quantity used for both protective legs, once the entry was accepted.
    pub protective_quantity: Option<NormalizedQuantity>,
}

impl PipelineResult {
    /// Entry failed; nothing else was attempted.
    pub fn entry_failed(symbol: InstId, err: crate::SubmissionError) -> Self {
        Self {
            symbol,
            entry: LegOutcome::Failed(err),
            take_profit: LegOutcome::Skipped,
            stop_loss: LegOutcome::Skipped,
            protective_quantity: None,
        }
    }

    /// Entry and both protective orders accepted.
    pub fn is_fully_protected(&self) -> bool {
        self.entry.is_accepted() && self.take_profit.is_accepted() && self.stop_loss.is_accepted()
    }

    /// Entry accepted but at least one protective leg failed.
    ///
    /// The position is open on the exchange and needs attention.
    pub fn is_partial(&self) -> bool {
        self.entry.is_accepted() && (self.take_profit.is_failed() || self.stop_loss.is_failed())
    }

    /// Short label for metrics.
    pub fn summary(&self) -> &'static str {
        if self.is_fully_protected() {
            "protected"
        } else if self.is_partial() {
            "partial"
        } else {
            "entry_failed"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn sym() -> InstId {
        InstId::new("ETH-USDT-SWAP").unwrap()
    }

    fn accepted(id: &str) -> LegOutcome {
        LegOutcome::Accepted {
            order_id: id.to_string(),
        }
    }

    #[test]
    fn test_state_machine_happy_path() {
        use PipelineState::*;
        let path = [
            Idle,
            EntrySubmitted,
            EntryAcked,
            TpSubmitted,
            TpFailed,
            SlSubmitted,
            SlAcked,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_state_machine_rejects_skipping_sl() {
        use PipelineState::*;
        assert!(!TpAcked.can_transition_to(Done));
        assert!(!Done.can_transition_to(Idle));
        assert!(!EntryAcked.can_transition_to(SlSubmitted));
    }

    #[test]
    fn test_partial_result() {
        let result = PipelineResult {
            symbol: sym(),
            entry: accepted("1"),
            take_profit: LegOutcome::Failed(crate::SubmissionError::new(ErrorKind::Permanent, "bad trigger")),
            stop_loss: accepted("3"),
            protective_quantity: None,
        };
        assert!(result.is_partial());
        assert!(!result.is_fully_protected());
        assert_eq!(result.summary(), "partial");
    }

    #[test]
    fn test_entry_failed_skips_protective_legs() {
        let result = PipelineResult::entry_failed(
            sym(),
            crate::SubmissionError::new(ErrorKind::Permanent, "insufficient balance"),
        );
        assert_eq!(result.take_profit, LegOutcome::Skipped);
        assert_eq!(result.stop_loss, LegOutcome::Skipped);
        assert!(!result.is_partial());
        assert_eq!(result.summary(), "entry_failed");
    }
}
