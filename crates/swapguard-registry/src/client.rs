//! REST client for the exchange's public instruments endpoint.
//!
//! `GET {rest_url}/api/v5/public/instruments?instType=SWAP&instId={symbol}`
//! answers with string-encoded decimals; empty strings mean "not published".

use crate::error::{RegistryError, RegistryResult};
use crate::source::InstrumentSource;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use swapguard_core::{BoxFuture, InstId, Instrument};
use swapguard_transport::TransportConfig;
use tracing::{debug, info, warn};

const INSTRUMENTS_PATH: &str = "/api/v5/public/instruments";

/// Response envelope shared by the v5 REST API.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Raw instrument entry.
#[derive(Debug, Deserialize)]
struct RawInstrument {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "lotSz", default, deserialize_with = "optional_decimal")]
    lot_sz: Option<Decimal>,
    #[serde(rename = "minSz", default, deserialize_with = "optional_decimal")]
    min_sz: Option<Decimal>,
    #[serde(rename = "ctVal", default, deserialize_with = "optional_decimal")]
    ct_val: Option<Decimal>,
}

fn optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Decimal::from_str(s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Client for fetching instrument metadata.
pub struct MetaClient {
    /// HTTP client (proxy and timeout already applied).
    client: Client,
    /// REST base URL (e.g., "https://www.okx.com").
    rest_url: String,
}

impl MetaClient {
    /// Create a client that shares the transport's proxy and timeout settings.
    pub fn new(rest_url: impl Into<String>, transport: &TransportConfig) -> RegistryResult<Self> {
        let client = transport
            .build_http_client()
            .map_err(|e| RegistryError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, rest_url))
    }

    pub fn with_client(client: Client, rest_url: impl Into<String>) -> Self {
        Self {
            client,
            rest_url: rest_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch one swap instrument definition.
    pub async fn fetch(&self, symbol: &InstId) -> RegistryResult<Instrument> {
        let url = format!("{}{INSTRUMENTS_PATH}", self.rest_url);
        info!(%symbol, "Fetching instrument definition");

        let response = self
            .client
            .get(&url)
            .query(&[("instType", "SWAP"), ("instId", symbol.as_str())])
            .send()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%symbol, %status, "Instrument request rejected");
            return Err(RegistryError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("Failed to read response: {e}")))?;
        let envelope: Envelope<RawInstrument> = serde_json::from_str(&body)
            .map_err(|e| RegistryError::ParseError(format!("instruments response: {e}")))?;

        if envelope.code != "0" {
            return Err(RegistryError::Exchange {
                code: envelope.code,
                message: envelope.msg,
            });
        }

        let raw = envelope
            .data
            .into_iter()
            .find(|d| d.inst_id.eq_ignore_ascii_case(symbol.as_str()))
            .ok_or_else(|| RegistryError::InstrumentNotFound(symbol.to_string()))?;

        debug!(
            %symbol,
            lot_sz = ?raw.lot_sz,
            min_sz = ?raw.min_sz,
            ct_val = ?raw.ct_val,
            "Instrument definition received"
        );

        Ok(Instrument::from_definition(
            symbol.clone(),
            raw.lot_sz,
            raw.min_sz,
            raw.ct_val,
        ))
    }
}

impl InstrumentSource for MetaClient {
    fn fetch_instrument<'a>(
        &'a self,
        symbol: &'a InstId,
    ) -> BoxFuture<'a, RegistryResult<Instrument>> {
        Box::pin(self.fetch(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use swapguard_core::LotSizeSource;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn eth() -> InstId {
        InstId::new("ETH-USDT-SWAP").unwrap()
    }

    async fn client_for(server: &MockServer) -> MetaClient {
        MetaClient::new(server.uri(), &TransportConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_instrument() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INSTRUMENTS_PATH))
            .and(query_param("instType", "SWAP"))
            .and(query_param("instId", "ETH-USDT-SWAP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "msg": "",
                "data": [{
                    "instId": "ETH-USDT-SWAP",
                    "lotSz": "1",
                    "minSz": "1",
                    "ctVal": "0.1",
                    "tickSz": "0.01"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let inst = client_for(&server).await.fetch(&eth()).await.unwrap();

        assert_eq!(inst.lot_size.inner(), dec!(1));
        assert_eq!(inst.lot_size_source, LotSizeSource::Precision);
        assert_eq!(inst.contract_size.inner(), dec!(0.1));
    }

    #[tokio::test]
    async fn test_empty_lot_size_falls_back_to_min_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INSTRUMENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "data": [{ "instId": "ETH-USDT-SWAP", "lotSz": "", "minSz": "0.1", "ctVal": "" }]
            })))
            .mount(&server)
            .await;

        let inst = client_for(&server).await.fetch(&eth()).await.unwrap();

        assert_eq!(inst.lot_size.inner(), dec!(0.1));
        assert_eq!(inst.lot_size_source, LotSizeSource::MinQuantity);
    }

    #[tokio::test]
    async fn test_empty_data_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INSTRUMENTS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "code": "0", "data": [] })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch(&eth()).await.unwrap_err();
        assert!(matches!(err, RegistryError::InstrumentNotFound(_)));
    }

    #[tokio::test]
    async fn test_exchange_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INSTRUMENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "51001",
                "msg": "Instrument ID does not exist",
                "data": []
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch(&eth()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Exchange { ref code, .. } if code == "51001"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INSTRUMENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch(&eth()).await.unwrap_err();
        assert!(matches!(err, RegistryError::ParseError(ref msg) if msg.contains("instruments response")));
    }

    #[tokio::test]
    async fn test_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch(&eth()).await.unwrap_err();
        assert!(matches!(err, RegistryError::HttpClient(ref msg) if msg.contains("503")));
    }
}
