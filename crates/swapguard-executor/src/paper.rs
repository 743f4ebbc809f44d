//! Paper placement: every order is accepted locally.

use parking_lot::Mutex;
use swapguard_core::{BoxFuture, OrderAck, OrderPlacer, OrderRequest, PlacementError};
use tracing::info;
use uuid::Uuid;

/// Accepts every order with a `paper-<uuid>` id and remembers it.
#[derive(Debug, Default)]
pub struct PaperOrderPlacer {
    placed: Mutex<Vec<(String, OrderRequest)>>,
}

impl PaperOrderPlacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders placed so far, with their assigned ids.
    pub fn placed(&self) -> Vec<(String, OrderRequest)> {
        self.placed.lock().clone()
    }
}

impl OrderPlacer for PaperOrderPlacer {
    fn place_order<'a>(
        &'a self,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, Result<OrderAck, PlacementError>> {
        Box::pin(async move {
            let order_id = format!("paper-{}", Uuid::new_v4());
            info!(
                symbol = %request.symbol,
                leg = %request.leg(),
                side = request.side.as_str(),
                sz = %request.quantity_text,
                %order_id,
                "Paper order placed"
            );
            self.placed.lock().push((order_id.clone(), request.clone()));
            Ok(OrderAck::new(order_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use swapguard_core::{InstId, OrderSide, Size};

    #[tokio::test]
    async fn test_paper_orders_are_accepted() {
        let placer = PaperOrderPlacer::new();
        let request = OrderRequest::market(
            InstId::new("BTC-USDT-SWAP").unwrap(),
            OrderSide::Sell,
            Size::new(dec!(0.01)),
        );

        let first = placer.place_order(&request).await.unwrap();
        let second = placer.place_order(&request).await.unwrap();

        assert!(first.order_id.starts_with("paper-"));
        assert_ne!(first.order_id, second.order_id);
        let placed = placer.placed();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].0, first.order_id);
        assert_eq!(placed[1].1.quantity_text, "0.01");
    }
}
