//! REST order placement (v5 trade API).
//!
//! Entry orders go to `/api/v5/trade/order`; take-profit and stop-loss go to
//! `/api/v5/trade/order-algo` as `conditional` algo orders that execute at
//! market when triggered (`tpOrdPx` / `slOrdPx` = `-1`).
//!
//! Rejections keep the exchange's per-order `sCode`/`sMsg` so the classifier
//! can tell lot-size violations from other failures. A `51016` rejection
//! (client order id already used) is resolved by looking the order up by
//! that id, since it means an earlier attempt was accepted.

use crate::error::ExecutorResult;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use swapguard_core::{
    BoxFuture, OrderAck, OrderKind, OrderPlacer, OrderRequest, PlacementError, PositionMode,
    TradeMode,
};
use swapguard_transport::TransportConfig;
use tracing::{debug, info, warn};

const ORDER_PATH: &str = "/api/v5/trade/order";
const ALGO_ORDER_PATH: &str = "/api/v5/trade/order-algo";
const ACCOUNT_CONFIG_PATH: &str = "/api/v5/account/config";
/// Exchange code for "client order id already exists".
pub const DUPLICATE_CLIENT_ORDER_ID_CODE: &str = "51016";
/// Trigger execution price meaning "market".
const MARKET_ON_TRIGGER: &str = "-1";

/// Supplies authentication headers for a request.
///
/// `request_path` includes the query string; `body` is the exact JSON sent.
pub trait RequestSigner: Send + Sync {
    fn sign(
        &self,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> Result<Vec<(String, String)>, PlacementError>;
}

/// Arc wrapper for RequestSigner trait objects.
pub type DynRequestSigner = Arc<dyn RequestSigner>;

/// Signer that adds nothing (public or simulated endpoints).
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsignedRequests;

impl RequestSigner for UnsignedRequests {
    fn sign(
        &self,
        _method: &str,
        _request_path: &str,
        _body: &str,
    ) -> Result<Vec<(String, String)>, PlacementError> {
        Ok(Vec::new())
    }
}

/// Request body for both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderBody {
    inst_id: String,
    td_mode: &'static str,
    side: &'static str,
    ord_type: &'static str,
    sz: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    px: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pos_side: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cl_ord_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    algo_cl_ord_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tp_trigger_px: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tp_ord_px: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sl_trigger_px: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sl_ord_px: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AckData {
    ord_id: String,
    algo_id: String,
    s_code: String,
    s_msg: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AccountConfig {
    pos_mode: String,
}

/// Order placer speaking the v5 REST API.
pub struct RestOrderPlacer {
    client: Client,
    rest_url: String,
    timeout: Duration,
    trade_mode: TradeMode,
    position_mode: PositionMode,
    signer: DynRequestSigner,
}

impl RestOrderPlacer {
    /// Create a placer sharing the transport's proxy and timeout settings.
    pub fn new(rest_url: impl Into<String>, transport: &TransportConfig) -> ExecutorResult<Self> {
        let client = transport.build_http_client()?;
        Ok(Self::with_client(client, rest_url, transport.timeout()))
    }

    pub fn with_client(client: Client, rest_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            rest_url: rest_url.into().trim_end_matches('/').to_string(),
            timeout,
            trade_mode: TradeMode::default(),
            position_mode: PositionMode::default(),
            signer: Arc::new(UnsignedRequests),
        }
    }

    #[must_use]
    pub fn with_trade_mode(mut self, trade_mode: TradeMode) -> Self {
        self.trade_mode = trade_mode;
        self
    }

    #[must_use]
    pub fn with_position_mode(mut self, position_mode: PositionMode) -> Self {
        self.position_mode = position_mode;
        self
    }

    #[must_use]
    pub fn with_signer(mut self, signer: DynRequestSigner) -> Self {
        self.signer = signer;
        self
    }

    /// Replace the configured position mode with the account's own.
    pub async fn with_detected_position_mode(self) -> Self {
        let mode = self.detect_position_mode().await;
        self.with_position_mode(mode)
    }

    pub fn position_mode(&self) -> PositionMode {
        self.position_mode
    }

    /// Account position mode from `/api/v5/account/config`.
    ///
    /// Falls back to the configured mode when the query fails or the
    /// account reports a mode this placer does not know.
    pub async fn detect_position_mode(&self) -> PositionMode {
        match self.fetch_position_mode().await {
            Ok(mode) => {
                info!(position_mode = ?mode, "Account position mode detected");
                mode
            }
            Err(err) => {
                warn!(
                    error = %err,
                    fallback = ?self.position_mode,
                    "Position mode detection failed"
                );
                self.position_mode
            }
        }
    }

    async fn fetch_position_mode(&self) -> Result<PositionMode, PlacementError> {
        let (status, text) = self.get_signed(ACCOUNT_CONFIG_PATH).await?;
        if !(200..300).contains(&status) {
            return Err(PlacementError::Http { status, body: text });
        }
        let envelope: Envelope<AccountConfig> = serde_json::from_str(&text)
            .map_err(|e| PlacementError::Transport(format!("Malformed response: {e}")))?;
        if envelope.code != "0" {
            return Err(PlacementError::Exchange {
                code: envelope.code,
                message: envelope.msg,
            });
        }
        let config = envelope.data.into_iter().next().unwrap_or_default();
        match config.pos_mode.as_str() {
            "net_mode" => Ok(PositionMode::Net),
            "long_short_mode" => Ok(PositionMode::LongShort),
            other => Err(PlacementError::Transport(format!(
                "Unrecognised position mode {other:?}"
            ))),
        }
    }

    fn path_for(kind: OrderKind) -> &'static str {
        if kind.is_conditional() {
            ALGO_ORDER_PATH
        } else {
            ORDER_PATH
        }
    }

    fn body_for(&self, request: &OrderRequest) -> OrderBody {
        let mut body = OrderBody {
            inst_id: request.symbol.to_string(),
            td_mode: self.trade_mode.as_str(),
            side: request.side.as_str(),
            ord_type: "market",
            sz: request.quantity_text.clone(),
            px: None,
            pos_side: match self.position_mode {
                PositionMode::LongShort => Some(request.position_side.position_side()),
                PositionMode::Net => None,
            },
            cl_ord_id: None,
            algo_cl_ord_id: None,
            tp_trigger_px: None,
            tp_ord_px: None,
            sl_trigger_px: None,
            sl_ord_px: None,
        };

        let client_id = request.client_order_id.to_string();
        let trigger = request.trigger_price.map(|p| p.to_wire());
        match request.kind {
            OrderKind::Market => body.cl_ord_id = Some(client_id),
            OrderKind::Limit => {
                body.ord_type = "limit";
                body.px = request.limit_price.map(|p| p.to_wire());
                body.cl_ord_id = Some(client_id);
            }
            OrderKind::TakeProfit => {
                body.ord_type = "conditional";
                body.algo_cl_ord_id = Some(client_id);
                body.tp_trigger_px = trigger;
                body.tp_ord_px = Some(MARKET_ON_TRIGGER);
            }
            OrderKind::StopLoss => {
                body.ord_type = "conditional";
                body.algo_cl_ord_id = Some(client_id);
                body.sl_trigger_px = trigger;
                body.sl_ord_px = Some(MARKET_ON_TRIGGER);
            }
        }
        body
    }

    async fn submit(&self, request: &OrderRequest) -> Result<OrderAck, PlacementError> {
        let path = Self::path_for(request.kind);
        let body = serde_json::to_string(&self.body_for(request))
            .map_err(|e| PlacementError::Transport(format!("Failed to encode order: {e}")))?;
        let headers = self.signer.sign("POST", path, &body)?;

        debug!(
            symbol = %request.symbol,
            leg = %request.leg(),
            client_order_id = %request.client_order_id,
            sz = %request.quantity_text,
            "Submitting order"
        );

        let mut builder = self
            .client
            .post(format!("{}{path}", self.rest_url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let (status, text) = self.read(builder).await?;
        let mut result = parse_response(status, &text);
        if is_duplicate_client_id(&result) {
            result = self.recover_duplicate(request, result).await;
        }
        if let Err(err) = &result {
            warn!(symbol = %request.symbol, leg = %request.leg(), error = %err, "Order rejected");
        }
        result
    }

    /// Look up the order an earlier attempt placed under the same client id.
    async fn recover_duplicate(
        &self,
        request: &OrderRequest,
        rejection: Result<OrderAck, PlacementError>,
    ) -> Result<OrderAck, PlacementError> {
        let client_id = request.client_order_id.as_str();
        let lookup = if request.kind.is_conditional() {
            format!("{ALGO_ORDER_PATH}?algoClOrdId={client_id}")
        } else {
            format!("{ORDER_PATH}?instId={}&clOrdId={client_id}", request.symbol)
        };

        match self.get_signed(&lookup).await {
            Ok((status, text)) => match parse_response(status, &text) {
                Ok(ack) => {
                    info!(
                        symbol = %request.symbol,
                        leg = %request.leg(),
                        %client_id,
                        order_id = %ack.order_id,
                        "Client order id already accepted"
                    );
                    Ok(ack)
                }
                Err(err) => {
                    debug!(%client_id, error = %err, "Duplicate client id lookup failed");
                    rejection
                }
            },
            Err(err) => {
                debug!(%client_id, error = %err, "Duplicate client id lookup failed");
                rejection
            }
        }
    }

    async fn get_signed(&self, request_path: &str) -> Result<(u16, String), PlacementError> {
        let headers = self.signer.sign("GET", request_path, "")?;
        let mut builder = self.client.get(format!("{}{request_path}", self.rest_url));
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        self.read(builder).await
    }

    async fn read(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<(u16, String), PlacementError> {
        let response = builder.send().await.map_err(|e| self.send_error(&e))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| PlacementError::Transport(format!("Failed to read response: {e}")))?;
        Ok((status, text))
    }

    fn send_error(&self, err: &reqwest::Error) -> PlacementError {
        if err.is_timeout() {
            PlacementError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else {
            PlacementError::Transport(err.to_string())
        }
    }
}

fn is_duplicate_client_id(result: &Result<OrderAck, PlacementError>) -> bool {
    matches!(
        result,
        Err(PlacementError::Exchange { code, .. }) if code == DUPLICATE_CLIENT_ORDER_ID_CODE
    )
}

/// Map an HTTP response onto an ack or a raw placement failure.
///
/// Client-error bodies are read as envelopes so the exchange code survives.
/// 429 and 5xx stay HTTP failures, as do bodies that are not envelopes. An
/// unreadable success body is reported as a transport failure.
fn parse_response(status: u16, body: &str) -> Result<OrderAck, PlacementError> {
    let success = (200..300).contains(&status);
    let http_failure = || PlacementError::Http {
        status,
        body: body.to_string(),
    };
    if status == 429 || status >= 500 {
        return Err(http_failure());
    }

    let envelope: Envelope<AckData> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if success => {
            return Err(PlacementError::Transport(format!("Malformed response: {e}")))
        }
        Err(_) => return Err(http_failure()),
    };
    let first = envelope.data.into_iter().next().unwrap_or_default();

    if envelope.code == "0" {
        if !success {
            return Err(http_failure());
        }
        let order_id = if first.ord_id.is_empty() {
            first.algo_id
        } else {
            first.ord_id
        };
        if order_id.is_empty() {
            return Err(PlacementError::Transport(
                "Accepted response without an order id".to_string(),
            ));
        }
        return Ok(OrderAck::new(order_id));
    }

    if !first.s_code.is_empty() && first.s_code != "0" {
        Err(PlacementError::Exchange {
            code: first.s_code,
            message: first.s_msg,
        })
    } else {
        Err(PlacementError::Exchange {
            code: envelope.code,
            message: envelope.msg,
        })
    }
}

impl OrderPlacer for RestOrderPlacer {
    fn place_order<'a>(
        &'a self,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, Result<OrderAck, PlacementError>> {
        Box::pin(self.submit(request))
    }
}
