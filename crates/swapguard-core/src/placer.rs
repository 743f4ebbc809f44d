//! Order-placement port.
//!
//! The exchange-facing collaborator that takes one `OrderRequest` and returns
//! the exchange's order id or its raw error. Retries, timeouts and error
//! classification live above this trait, in the connectivity layer.

use crate::error::PlacementError;
use crate::order::{OrderLeg, OrderRequest};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Exchange acknowledgement of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    /// Exchange-assigned id (`ordId` or `algoId`).
    pub order_id: String,
}

impl OrderAck {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
        }
    }
}

/// Trait for placing a single order.
///
/// Implementations perform exactly one network call per invocation and must
/// surface the exchange's raw error code.
pub trait OrderPlacer: Send + Sync {
    fn place_order<'a>(
        &'a self,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, Result<OrderAck, PlacementError>>;
}

/// Arc wrapper for OrderPlacer trait objects.
pub type DynOrderPlacer = Arc<dyn OrderPlacer>;

/// Scripted placer for testing.
///
/// Responses are queued per leg; once a leg's queue is empty every further
/// request on that leg is accepted with a generated id.
#[derive(Debug, Default)]
pub struct MockOrderPlacer {
    scripts: Mutex<HashMap<OrderLeg, VecDeque<Result<OrderAck, PlacementError>>>>,
    requests: Mutex<Vec<OrderRequest>>,
}

impl MockOrderPlacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next attempt on `leg`.
    pub fn push_result(&self, leg: OrderLeg, result: Result<OrderAck, PlacementError>) {
        self.scripts.lock().entry(leg).or_default().push_back(result);
    }

    /// Queue the same error `times` times on `leg`.
    pub fn fail_times(&self, leg: OrderLeg, error: PlacementError, times: usize) {
        for _ in 0..times {
            self.push_result(leg, Err(error.clone()));
        }
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<OrderRequest> {
        self.requests.lock().clone()
    }

    /// Requests received on one leg.
    pub fn requests_for(&self, leg: OrderLeg) -> Vec<OrderRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.leg() == leg)
            .cloned()
            .collect()
    }

    /// Number of attempts made on one leg.
    pub fn attempts(&self, leg: OrderLeg) -> usize {
        self.requests.lock().iter().filter(|r| r.leg() == leg).count()
    }
}

impl OrderPlacer for MockOrderPlacer {
    fn place_order<'a>(
        &'a self,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, Result<OrderAck, PlacementError>> {
        Box::pin(async move {
            let leg = request.leg();
            let attempt = {
                let mut requests = self.requests.lock();
                requests.push(request.clone());
                requests.iter().filter(|r| r.leg() == leg).count()
            };
            let scripted = self
                .scripts
                .lock()
                .get_mut(&leg)
                .and_then(|queue| queue.pop_front());
            scripted.unwrap_or_else(|| Ok(OrderAck::new(format!("mock-{leg}-{attempt}"))))
        })
    }
}
