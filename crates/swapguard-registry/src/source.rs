//! Instrument metadata sources.

use crate::error::{RegistryError, RegistryResult};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use swapguard_core::{BoxFuture, InstId, Instrument};

/// Collaborator that fetches an instrument definition by symbol.
pub trait InstrumentSource: Send + Sync {
    fn fetch_instrument<'a>(&'a self, symbol: &'a InstId)
        -> BoxFuture<'a, RegistryResult<Instrument>>;
}

/// Arc wrapper for InstrumentSource trait objects.
pub type DynInstrumentSource = Arc<dyn InstrumentSource>;

/// Instrument definition as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentDefinition {
    /// Instrument id or bare asset name (`"ETH"` means `ETH-USDT-SWAP`).
    pub symbol: String,
    #[serde(default)]
    pub lot_size: Option<Decimal>,
    #[serde(default)]
    pub min_size: Option<Decimal>,
    #[serde(default)]
    pub contract_size: Option<Decimal>,
}

impl InstrumentDefinition {
    pub fn to_instrument(&self) -> RegistryResult<Instrument> {
        let symbol = InstId::from_asset(&self.symbol)?;
        Ok(Instrument::from_definition(
            symbol,
            self.lot_size,
            self.min_size,
            self.contract_size,
        ))
    }
}

/// In-memory instrument table, typically filled from configuration.
///
/// Unknown symbols fail with `InstrumentNotFound`, the same way the REST
/// source reports an empty result.
#[derive(Debug, Default)]
pub struct StaticInstrumentTable {
    instruments: RwLock<HashMap<InstId, Instrument>>,
    fetches: AtomicU64,
}

impl StaticInstrumentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions<'a>(
        definitions: impl IntoIterator<Item = &'a InstrumentDefinition>,
    ) -> RegistryResult<Self> {
        let table = Self::new();
        for definition in definitions {
            table.insert(definition.to_instrument()?);
        }
        Ok(table)
    }

    /// Add or replace an instrument.
    pub fn insert(&self, instrument: Instrument) {
        self.instruments
            .write()
            .insert(instrument.symbol.clone(), instrument);
    }

    pub fn remove(&self, symbol: &InstId) -> Option<Instrument> {
        self.instruments.write().remove(symbol)
    }

    pub fn len(&self) -> usize {
        self.instruments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.read().is_empty()
    }

    /// Number of fetches served so far, found or not.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl InstrumentSource for StaticInstrumentTable {
    fn fetch_instrument<'a>(
        &'a self,
        symbol: &'a InstId,
    ) -> BoxFuture<'a, RegistryResult<Instrument>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            self.instruments
                .read()
                .get(symbol)
                .cloned()
                .ok_or_else(|| RegistryError::InstrumentNotFound(symbol.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use swapguard_core::LotSizeSource;

    #[tokio::test]
    async fn test_table_from_definitions() {
        let definitions = vec![
            InstrumentDefinition {
                symbol: "eth".to_string(),
                lot_size: Some(dec!(1)),
                min_size: Some(dec!(1)),
                contract_size: Some(dec!(0.1)),
            },
            InstrumentDefinition {
                symbol: "BTC-USDT-SWAP".to_string(),
                lot_size: None,
                min_size: Some(dec!(0.01)),
                contract_size: None,
            },
        ];
        let table = StaticInstrumentTable::from_definitions(&definitions).unwrap();
        assert_eq!(table.len(), 2);

        let eth = table
            .fetch_instrument(&InstId::new("ETH-USDT-SWAP").unwrap())
            .await
            .unwrap();
        assert_eq!(eth.lot_size.inner(), dec!(1));

        let btc = table
            .fetch_instrument(&InstId::new("BTC-USDT-SWAP").unwrap())
            .await
            .unwrap();
        assert_eq!(btc.lot_size_source, LotSizeSource::MinQuantity);
        assert_eq!(table.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let table = StaticInstrumentTable::new();
        let err = table
            .fetch_instrument(&InstId::new("XRP-USDT-SWAP").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InstrumentNotFound(_)));
        assert_eq!(table.fetch_count(), 1);
    }

    #[test]
    fn test_definition_parses_string_decimals() {
        let definition: InstrumentDefinition =
            serde_json::from_str(r#"{"symbol":"SOL","lot_size":"0.01"}"#).unwrap();
        let inst = definition.to_instrument().unwrap();
        assert_eq!(inst.symbol.as_str(), "SOL-USDT-SWAP");
        assert_eq!(inst.amount_precision, 2);
    }
}
