//! Core domain types for the swapguard order pipeline.
//!
//! This crate provides the types shared by every other crate:
//! - `InstId`, `Instrument`: instrument identity and trading constraints
//! - `Price`, `Size`: precision-safe numeric types
//! - `normalize`, `NormalizedQuantity`: lot-size rounding for conditional orders
//! - `OrderRequest`, `OrderSide`, `OrderKind`: order construction
//! - `ErrorKind`, `SubmissionError`, `PlacementError`: failure taxonomy
//! - `PipelineEvent`, `EventSink`: structured observability
//! - `OrderPlacer`: the order-placement port

pub mod decimal;
pub mod error;
pub mod event;
pub mod instrument;
pub mod order;
pub mod outcome;
pub mod placer;
pub mod quantity;

pub use decimal::{Price, Size};
pub use error::{CoreError, ErrorKind, PlacementError, Result, SubmissionError};
pub use event::{
    AttemptOutcome, DynEventSink, EventSink, FanoutEventSink, NoopEventSink, PipelineEvent,
    RecordingEventSink,
};
pub use instrument::{InstId, Instrument, LotSizeSource, DEFAULT_LOT_SIZE};
pub use order::{
    ClientOrderId, OrderKind, OrderLeg, OrderRequest, OrderSide, PositionMode, TradeMode,
};
pub use outcome::{LegOutcome, PipelineResult, PipelineState};
pub use placer::{BoxFuture, DynOrderPlacer, MockOrderPlacer, OrderAck, OrderPlacer};
pub use quantity::{amount_precision, normalize, NormalizedQuantity};
