//! Order submission for swapguard.
//!
//! Places the entry order for a trading decision, then the take-profit and
//! stop-loss orders that protect the resulting position.
//!
//! # Key Components
//!
//! - [`OrderSubmissionPipeline`]: per-decision state machine
//! - [`EntryDecision`]: what to trade and where to protect it
//! - [`RestOrderPlacer`]: v5 REST wire format for orders and algo orders
//! - [`RequestSigner`]: authentication seam for the REST placer
//! - [`PaperOrderPlacer`]: accepts everything, for dry runs
//!
//! # Sequencing
//!
//! 1. Entry is submitted with the raw quantity (never normalized)
//! 2. Entry failure ends the decision; no protective leg is attempted
//! 3. The protective quantity is normalized once to the instrument lot size
//! 4. Take-profit, then stop-loss; a failure on one never blocks the other
//! 5. A lot-size rejection invalidates the cached lot size and resubmits once

pub mod decision;
pub mod error;
pub mod paper;
pub mod pipeline;
pub mod rest_placer;

pub use decision::{EntryDecision, EntryParams};
pub use error::{ExecutorError, ExecutorResult};
pub use paper::PaperOrderPlacer;
pub use pipeline::{OrderSubmissionPipeline, PipelineConfig};
pub use rest_placer::{DynRequestSigner, RequestSigner, RestOrderPlacer, UnsignedRequests};
