//! Per-decision submission pipeline.
//!
//! ```text
//! Idle -> EntrySubmitted -> EntryAcked -> TpSubmitted -> TpAcked|TpFailed
//!      -> SlSubmitted -> SlAcked|SlFailed -> Done
//! ```
//!
//! `Done` is reached from any state that cannot continue (invalid input,
//! entry failure, unresolvable lot size). An accepted entry is never rolled
//! back: protective-leg failures are reported as a partial result.

use crate::decision::EntryDecision;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swapguard_core::{
    normalize, DynEventSink, ErrorKind, LegOutcome, NormalizedQuantity, OrderKind, OrderRequest,
    PipelineEvent, PipelineResult, PipelineState, Price, SubmissionError,
};
use swapguard_registry::InstrumentCache;
use swapguard_transport::ConnectivityManager;
use tokio_util::sync::CancellationToken;

/// Pipeline behaviour knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// On a lot-size rejection, invalidate the cached lot size and resubmit
    /// the leg once with a freshly normalized quantity.
    #[serde(default = "default_refresh_on_lot_size_violation")]
    pub refresh_on_lot_size_violation: bool,
}

fn default_refresh_on_lot_size_violation() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refresh_on_lot_size_violation: default_refresh_on_lot_size_violation(),
        }
    }
}

/// Places entry, take-profit and stop-loss orders for one decision at a time.
///
/// Cheap to share: concurrent decisions each get their own state and retry
/// budget, and only the instrument cache is common to all of them.
pub struct OrderSubmissionPipeline {
    cache: Arc<InstrumentCache>,
    connectivity: Arc<ConnectivityManager>,
    events: DynEventSink,
    config: PipelineConfig,
}

impl OrderSubmissionPipeline {
    pub fn new(
        cache: Arc<InstrumentCache>,
        connectivity: Arc<ConnectivityManager>,
        events: DynEventSink,
        config: PipelineConfig,
    ) -> Self {
        Self {
            cache,
            connectivity,
            events,
            config,
        }
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    /// Run one decision to completion.
    pub async fn enter_position(&self, decision: &EntryDecision) -> PipelineResult {
        self.run(decision, None).await
    }

    /// Run one decision, honouring `cancel` until the entry is acknowledged.
    ///
    /// Once the entry is accepted the protective legs are always attempted.
    pub async fn enter_position_cancellable(
        &self,
        decision: &EntryDecision,
        cancel: &CancellationToken,
    ) -> PipelineResult {
        self.run(decision, Some(cancel)).await
    }

    async fn run(&self, decision: &EntryDecision, cancel: Option<&CancellationToken>) -> PipelineResult {
        let mut state = StateTracker::new(decision, &self.events);

        if let Err(err) = decision.validate() {
            state.advance(PipelineState::Done);
            return self.finish(PipelineResult::entry_failed(decision.symbol.clone(), err));
        }

        let entry_request = decision.entry_request();
        state.advance(PipelineState::EntrySubmitted);
        let entry = match cancel {
            Some(token) => self.connectivity.send_cancellable(&entry_request, token).await,
            None => self.connectivity.send(&entry_request).await,
        };
        let entry_ack = match entry {
            Ok(ack) => ack,
            Err(err) => {
                state.advance(PipelineState::Done);
                return self.finish(PipelineResult::entry_failed(decision.symbol.clone(), err));
            }
        };
        state.advance(PipelineState::EntryAcked);
        let entry = LegOutcome::Accepted {
            order_id: entry_ack.order_id,
        };

        let mut quantity = match self.normalized_quantity(decision).await {
            Ok(quantity) => quantity,
            Err(err) => {
                state.advance(PipelineState::Done);
                return self.finish(PipelineResult {
                    symbol: decision.symbol.clone(),
                    entry,
                    take_profit: LegOutcome::Failed(err.clone()),
                    stop_loss: LegOutcome::Failed(err),
                    protective_quantity: None,
                });
            }
        };

        state.advance(PipelineState::TpSubmitted);
        let take_profit = self
            .submit_protective(
                decision,
                OrderKind::TakeProfit,
                decision.take_profit_trigger,
                &mut quantity,
            )
            .await;
        state.advance(if take_profit.is_accepted() {
            PipelineState::TpAcked
        } else {
            PipelineState::TpFailed
        });

        state.advance(PipelineState::SlSubmitted);
        let stop_loss = self
            .submit_protective(
                decision,
                OrderKind::StopLoss,
                decision.stop_loss_trigger,
                &mut quantity,
            )
            .await;
        state.advance(if stop_loss.is_accepted() {
            PipelineState::SlAcked
        } else {
            PipelineState::SlFailed
        });

        state.advance(PipelineState::Done);
        self.finish(PipelineResult {
            symbol: decision.symbol.clone(),
            entry,
            take_profit,
            stop_loss,
            protective_quantity: Some(quantity),
        })
    }

    /// Submit one protective leg.
    ///
    /// `quantity` is shared with the sibling leg and is replaced when a
    /// lot-size rejection forces a refresh.
    async fn submit_protective(
        &self,
        decision: &EntryDecision,
        kind: OrderKind,
        trigger: Price,
        quantity: &mut NormalizedQuantity,
    ) -> LegOutcome {
        let request = self.protective_request(decision, kind, trigger, quantity);
        let err = match self.connectivity.send(&request).await {
            Ok(ack) => {
                return LegOutcome::Accepted {
                    order_id: ack.order_id,
                }
            }
            Err(err) => err,
        };

        if err.kind != ErrorKind::LotSizeViolation || !self.config.refresh_on_lot_size_violation {
            return LegOutcome::Failed(err);
        }

        self.cache.invalidate(&decision.symbol, &err.message);
        match self.normalized_quantity(decision).await {
            Ok(refreshed) => *quantity = refreshed,
            Err(refresh_err) => return LegOutcome::Failed(refresh_err),
        }

        let retry = self.protective_request(decision, kind, trigger, quantity);
        match self.connectivity.send(&retry).await {
            Ok(ack) => LegOutcome::Accepted {
                order_id: ack.order_id,
            },
            Err(err) => LegOutcome::Failed(err),
        }
    }

    fn protective_request(
        &self,
        decision: &EntryDecision,
        kind: OrderKind,
        trigger: Price,
        quantity: &NormalizedQuantity,
    ) -> OrderRequest {
        OrderRequest::protective(decision.symbol.clone(), decision.side, kind, quantity, trigger)
    }

    /// Normalize the raw quantity to the instrument's current lot size.
    async fn normalized_quantity(
        &self,
        decision: &EntryDecision,
    ) -> Result<NormalizedQuantity, SubmissionError> {
        let lot_size = self.cache.lot_size_of(&decision.symbol).await?;
        let quantity = normalize(decision.raw_quantity, lot_size)?;
        self.events.emit(PipelineEvent::QuantityNormalized {
            symbol: decision.symbol.clone(),
            raw: quantity.raw,
            rounded: quantity.rounded,
            lot_size: quantity.lot_size,
            display: quantity.display.clone(),
        });
        Ok(quantity)
    }

    fn finish(&self, result: PipelineResult) -> PipelineResult {
        self.events.emit(PipelineEvent::PipelineCompleted {
            result: result.clone(),
        });
        result
    }
}

/// Current state of one decision; every transition is emitted.
struct StateTracker<'a> {
    decision: &'a EntryDecision,
    events: &'a DynEventSink,
    current: PipelineState,
}

impl<'a> StateTracker<'a> {
    fn new(decision: &'a EntryDecision, events: &'a DynEventSink) -> Self {
        Self {
            decision,
            events,
            current: PipelineState::Idle,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.current.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.current
        );
        self.events.emit(PipelineEvent::StateChanged {
            symbol: self.decision.symbol.clone(),
            from: self.current,
            to: next,
        });
        self.current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::EntryParams;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use swapguard_core::{
        BoxFuture, InstId, Instrument, MockOrderPlacer, OrderAck, OrderLeg, OrderPlacer,
        OrderSide, PlacementError, RecordingEventSink, Size,
    };
    use swapguard_registry::{CacheConfig, StaticInstrumentTable};
    use swapguard_transport::{RecordingSleeper, TransportConfig};

    struct Harness {
        placer: Arc<MockOrderPlacer>,
        table: Arc<StaticInstrumentTable>,
        cache: Arc<InstrumentCache>,
        sleeper: Arc<RecordingSleeper>,
        events: Arc<RecordingEventSink>,
        pipeline: OrderSubmissionPipeline,
    }

    fn eth() -> InstId {
        InstId::new("ETH-USDT-SWAP").unwrap()
    }

    fn eth_with_lot(lot: Decimal) -> Instrument {
        Instrument::from_definition(eth(), Some(lot), Some(lot), Some(dec!(0.1)))
    }

    fn harness_with(placer: Arc<dyn OrderPlacer>, mock: Arc<MockOrderPlacer>, config: PipelineConfig) -> Harness {
        let table = Arc::new(StaticInstrumentTable::new());
        let events = Arc::new(RecordingEventSink::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        let cache = Arc::new(InstrumentCache::new(
            table.clone(),
            CacheConfig::default(),
            events.clone(),
        ));
        let connectivity = Arc::new(
            ConnectivityManager::new(placer, &TransportConfig::default(), events.clone())
                .unwrap()
                .with_sleeper(sleeper.clone()),
        );
        let pipeline =
            OrderSubmissionPipeline::new(cache.clone(), connectivity, events.clone(), config);
        Harness {
            placer: mock,
            table,
            cache,
            sleeper,
            events,
            pipeline,
        }
    }

    fn harness(config: PipelineConfig) -> Harness {
        let mock = Arc::new(MockOrderPlacer::new());
        harness_with(mock.clone(), mock, config)
    }

    fn decision(qty: Decimal) -> EntryDecision {
        EntryDecision::market(
            eth(),
            OrderSide::Buy,
            Size::new(qty),
            Price::new(dec!(3600)),
            Price::new(dec!(3300)),
        )
    }

    fn lot_size_violation() -> PlacementError {
        PlacementError::Exchange {
            code: "51121".to_string(),
            message: "Order quantity must be a multiple of the lot size.".to_string(),
        }
    }

    fn quantity_text(h: &Harness, leg: OrderLeg) -> Vec<String> {
        h.placer
            .requests_for(leg)
            .into_iter()
            .map(|r| r.quantity_text)
            .collect()
    }

    #[tokio::test]
    async fn test_fractional_entry_protected_with_one_lot() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));

        let result = h.pipeline.enter_position(&decision(dec!(0.2127))).await;

        assert!(result.is_fully_protected());
        assert_eq!(quantity_text(&h, OrderLeg::Entry), vec!["0.2127"]);
        assert_eq!(quantity_text(&h, OrderLeg::TakeProfit), vec!["1"]);
        assert_eq!(quantity_text(&h, OrderLeg::StopLoss), vec!["1"]);
        assert_eq!(result.protective_quantity.unwrap().rounded.inner(), dec!(1));
    }

    #[tokio::test]
    async fn test_half_lot_rounds_up() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));

        let result = h.pipeline.enter_position(&decision(dec!(2.5))).await;

        assert!(result.is_fully_protected());
        assert_eq!(quantity_text(&h, OrderLeg::TakeProfit), vec!["3"]);
        assert_eq!(quantity_text(&h, OrderLeg::StopLoss), vec!["3"]);
    }

    #[tokio::test]
    async fn test_protective_legs_close_the_position() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(0.01)));

        h.pipeline.enter_position(&decision(dec!(1.234))).await;

        let tp = &h.placer.requests_for(OrderLeg::TakeProfit)[0];
        let sl = &h.placer.requests_for(OrderLeg::StopLoss)[0];
        assert_eq!(tp.side, OrderSide::Sell);
        assert_eq!(sl.side, OrderSide::Sell);
        assert_eq!(tp.quantity_text, "1.23");
        assert_eq!(tp.trigger_price, Some(Price::new(dec!(3600))));
        assert_eq!(sl.trigger_price, Some(Price::new(dec!(3300))));
    }

    #[tokio::test]
    async fn test_states_on_success() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));

        h.pipeline.enter_position(&decision(dec!(1))).await;

        use PipelineState::*;
        assert_eq!(
            h.events.states(),
            vec![EntrySubmitted, EntryAcked, TpSubmitted, TpAcked, SlSubmitted, SlAcked, Done]
        );
        assert_eq!(h.events.count("pipeline_completed"), 1);
        assert_eq!(h.events.count("quantity_normalized"), 1);
    }

    #[tokio::test]
    async fn test_entry_failure_skips_protective_legs() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));
        h.placer.push_result(
            OrderLeg::Entry,
            Err(PlacementError::Exchange {
                code: "51008".to_string(),
                message: "Insufficient balance".to_string(),
            }),
        );

        let result = h.pipeline.enter_position(&decision(dec!(1))).await;

        assert_eq!(result.entry.error().unwrap().kind, ErrorKind::Permanent);
        assert_eq!(result.take_profit, LegOutcome::Skipped);
        assert_eq!(result.stop_loss, LegOutcome::Skipped);
        assert_eq!(h.placer.requests().len(), 1);
        assert_eq!(h.table.fetch_count(), 0);
        assert_eq!(
            h.events.states(),
            vec![PipelineState::EntrySubmitted, PipelineState::Done]
        );
    }

    #[tokio::test]
    async fn test_entry_retry_exhaustion() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));
        h.placer.fail_times(
            OrderLeg::Entry,
            PlacementError::Transport("connection reset".to_string()),
            3,
        );

        let result = h.pipeline.enter_position(&decision(dec!(1))).await;

        let err = result.entry.error().unwrap();
        assert_eq!(err.kind, ErrorKind::Retryable);
        assert_eq!(err.attempts, 3);
        assert_eq!(
            h.sleeper.delays(),
            vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(20)
            ]
        );
        assert_eq!(result.take_profit, LegOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_stale_lot_size_refreshed_once() {
        let h = harness(PipelineConfig::default());
        h.cache.insert(eth_with_lot(dec!(0.1)));
        h.table.insert(eth_with_lot(dec!(1)));
        h.placer.push_result(OrderLeg::TakeProfit, Err(lot_size_violation()));

        let result = h.pipeline.enter_position(&decision(dec!(0.2127))).await;

        assert!(result.take_profit.is_accepted());
        assert!(result.is_fully_protected());
        assert_eq!(quantity_text(&h, OrderLeg::TakeProfit), vec!["0.2", "1"]);
        // The sibling leg uses the refreshed quantity.
        assert_eq!(quantity_text(&h, OrderLeg::StopLoss), vec!["1"]);
        assert_eq!(h.cache.version(&eth()), 2);
        assert_eq!(h.events.count("instrument_invalidated"), 1);
        assert!(h.sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_refreshed_submission_uses_new_client_order_id() {
        let h = harness(PipelineConfig::default());
        h.cache.insert(eth_with_lot(dec!(0.1)));
        h.table.insert(eth_with_lot(dec!(1)));
        h.placer.push_result(OrderLeg::TakeProfit, Err(lot_size_violation()));

        h.pipeline.enter_position(&decision(dec!(0.2127))).await;

        let tp = h.placer.requests_for(OrderLeg::TakeProfit);
        assert_ne!(tp[0].client_order_id, tp[1].client_order_id);
    }

    #[tokio::test]
    async fn test_repeated_lot_size_violation_is_terminal() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));
        h.placer.fail_times(OrderLeg::TakeProfit, lot_size_violation(), 2);

        let result = h.pipeline.enter_position(&decision(dec!(1))).await;

        let err = result.take_profit.error().unwrap();
        assert_eq!(err.kind, ErrorKind::LotSizeViolation);
        assert_eq!(err.code.as_deref(), Some("51121"));
        assert_eq!(h.placer.attempts(OrderLeg::TakeProfit), 2);
        assert!(result.stop_loss.is_accepted());
        assert!(result.is_partial());
    }

    #[tokio::test]
    async fn test_refresh_can_be_disabled() {
        let h = harness(PipelineConfig {
            refresh_on_lot_size_violation: false,
        });
        h.table.insert(eth_with_lot(dec!(1)));
        h.placer.push_result(OrderLeg::TakeProfit, Err(lot_size_violation()));

        let result = h.pipeline.enter_position(&decision(dec!(1))).await;

        assert_eq!(
            result.take_profit.error().unwrap().kind,
            ErrorKind::LotSizeViolation
        );
        assert_eq!(h.placer.attempts(OrderLeg::TakeProfit), 1);
        assert_eq!(h.events.count("instrument_invalidated"), 0);
        assert!(result.stop_loss.is_accepted());
    }

    #[tokio::test]
    async fn test_take_profit_failure_does_not_block_stop_loss() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));
        h.placer.push_result(
            OrderLeg::TakeProfit,
            Err(PlacementError::Exchange {
                code: "51280".to_string(),
                message: "TP trigger price invalid".to_string(),
            }),
        );

        let result = h.pipeline.enter_position(&decision(dec!(1))).await;

        assert!(result.entry.is_accepted());
        assert!(result.take_profit.is_failed());
        assert!(result.stop_loss.is_accepted());
        assert!(result.is_partial());
        assert!(h.events.states().contains(&PipelineState::TpFailed));
        assert_eq!(result.summary(), "partial");
    }

    #[tokio::test]
    async fn test_stop_loss_failure_keeps_take_profit() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));
        h.placer.push_result(
            OrderLeg::StopLoss,
            Err(PlacementError::Exchange {
                code: "51277".to_string(),
                message: "SL trigger price invalid".to_string(),
            }),
        );

        let result = h.pipeline.enter_position(&decision(dec!(1))).await;

        assert!(result.take_profit.is_accepted());
        assert_eq!(result.stop_loss.error().unwrap().code.as_deref(), Some("51277"));
        assert!(h.events.states().contains(&PipelineState::SlFailed));
    }

    #[tokio::test]
    async fn test_metadata_unavailable_fails_protective_legs() {
        let h = harness(PipelineConfig::default());

        let result = h.pipeline.enter_position(&decision(dec!(1))).await;

        assert!(result.entry.is_accepted());
        assert_eq!(
            result.take_profit.error().unwrap().kind,
            ErrorKind::MetadataUnavailable
        );
        assert_eq!(
            result.stop_loss.error().unwrap().kind,
            ErrorKind::MetadataUnavailable
        );
        assert_eq!(h.placer.attempts(OrderLeg::TakeProfit), 0);
        assert_eq!(
            h.events.states(),
            vec![
                PipelineState::EntrySubmitted,
                PipelineState::EntryAcked,
                PipelineState::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_quantity_submits_nothing() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));

        let result = h.pipeline.enter_position(&decision(dec!(0))).await;

        assert_eq!(result.entry.error().unwrap().kind, ErrorKind::InvalidArgument);
        assert!(h.placer.requests().is_empty());
        assert_eq!(h.events.states(), vec![PipelineState::Done]);
    }

    #[tokio::test]
    async fn test_limit_entry_is_submitted_with_price() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));
        let decision = decision(dec!(1)).with_limit_price(Price::new(dec!(3450)));
        assert!(matches!(decision.entry, EntryParams::Limit { .. }));

        h.pipeline.enter_position(&decision).await;

        let entry = &h.placer.requests_for(OrderLeg::Entry)[0];
        assert_eq!(entry.kind, OrderKind::Limit);
        assert_eq!(entry.limit_price, Some(Price::new(dec!(3450))));
    }

    #[tokio::test]
    async fn test_cancelled_before_entry() {
        let h = harness(PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));
        let token = CancellationToken::new();
        token.cancel();

        let result = h
            .pipeline
            .enter_position_cancellable(&decision(dec!(1)), &token)
            .await;

        assert_eq!(result.entry.error().unwrap().kind, ErrorKind::Cancelled);
        assert!(h.placer.requests().is_empty());
        assert_eq!(result.take_profit, LegOutcome::Skipped);
    }

    /// Cancels the token as soon as the entry order is placed.
    struct CancelOnEntry {
        inner: Arc<MockOrderPlacer>,
        token: CancellationToken,
    }

    impl OrderPlacer for CancelOnEntry {
        fn place_order<'a>(
            &'a self,
            request: &'a OrderRequest,
        ) -> BoxFuture<'a, Result<OrderAck, PlacementError>> {
            if request.leg() == OrderLeg::Entry {
                self.token.cancel();
            }
            self.inner.place_order(request)
        }
    }

    #[tokio::test]
    async fn test_cancellation_after_entry_ack_is_ignored() {
        let mock = Arc::new(MockOrderPlacer::new());
        let token = CancellationToken::new();
        let placer = Arc::new(CancelOnEntry {
            inner: mock.clone(),
            token: token.clone(),
        });
        let h = harness_with(placer, mock, PipelineConfig::default());
        h.table.insert(eth_with_lot(dec!(1)));

        let result = h
            .pipeline
            .enter_position_cancellable(&decision(dec!(1)), &token)
            .await;

        assert!(token.is_cancelled());
        assert!(result.is_fully_protected());
    }
}
