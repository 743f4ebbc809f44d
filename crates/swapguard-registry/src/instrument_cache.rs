//! Per-symbol instrument metadata cache.
//!
//! Lookups hit the cache first; a miss fetches from the configured
//! `InstrumentSource` with at most one fetch in flight per symbol.
//! Entries never expire unless a TTL is configured or the caller
//! invalidates them (e.g., after a lot-size rejection).
//!
//! Invalidation marks an entry stale instead of removing it, so a failed
//! refetch can still serve the last known value.

use crate::error::{RegistryError, RegistryResult};
use crate::source::DynInstrumentSource;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use swapguard_core::{DynEventSink, InstId, Instrument, PipelineEvent, Size};
use tokio::sync::OnceCell;

/// Result of one fetch, handed to every caller that joined it.
type FlightOutcome = Result<Instrument, String>;

/// Cache behaviour knobs.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Maximum entry age. `None` keeps entries until invalidated.
    pub ttl: Option<Duration>,
    /// Lot sizes used when a symbol was never fetched successfully.
    pub fallback_lot_sizes: HashMap<InstId, Decimal>,
}

/// Cache entry with change tracking.
#[derive(Debug, Clone)]
pub struct InstrumentCacheEntry {
    pub instrument: Instrument,
    pub last_update: DateTime<Utc>,
    pub version: u64,
    /// Set by `invalidate`; the next lookup refetches.
    pub stale: bool,
}

/// Shared instrument cache.
pub struct InstrumentCache {
    source: DynInstrumentSource,
    entries: DashMap<InstId, InstrumentCacheEntry>,
    /// Per-symbol in-flight fetches.
    inflight: DashMap<InstId, Arc<OnceCell<FlightOutcome>>>,
    config: CacheConfig,
    events: DynEventSink,
}

impl InstrumentCache {
    pub fn new(source: DynInstrumentSource, config: CacheConfig, events: DynEventSink) -> Self {
        Self {
            source,
            entries: DashMap::new(),
            inflight: DashMap::new(),
            config,
            events,
        }
    }

    /// Lot size for `symbol`, fetching on miss.
    ///
    /// Fails with `MetadataUnavailable` only when the fetch fails and there is
    /// neither a cached value nor a configured fallback.
    pub async fn lot_size_of(&self, symbol: &InstId) -> RegistryResult<Size> {
        Ok(self.instrument(symbol).await?.lot_size)
    }

    /// Full instrument constraints for `symbol`, fetching on miss.
    pub async fn instrument(&self, symbol: &InstId) -> RegistryResult<Instrument> {
        if let Some(instrument) = self.fresh(symbol) {
            return Ok(instrument);
        }

        let flight = self
            .inflight
            .entry(symbol.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let outcome = flight.get_or_init(|| self.resolve(symbol)).await.clone();
        self.inflight
            .remove_if(symbol, |_, current| Arc::ptr_eq(current, &flight));

        outcome.map_err(|reason| RegistryError::MetadataUnavailable {
            symbol: symbol.to_string(),
            reason,
        })
    }

    /// Mark the cached entry stale. Returns false if nothing was cached.
    pub fn invalidate(&self, symbol: &InstId, reason: &str) -> bool {
        let found = match self.entries.get_mut(symbol) {
            Some(mut entry) => {
                entry.stale = true;
                true
            }
            None => false,
        };
        if found {
            self.events.emit(PipelineEvent::InstrumentInvalidated {
                symbol: symbol.clone(),
                reason: reason.to_string(),
            });
        }
        found
    }

    /// Insert an instrument directly, bypassing the source.
    pub fn insert(&self, instrument: Instrument) {
        self.store(instrument);
    }

    /// Cached instrument, stale or not, without fetching.
    pub fn get(&self, symbol: &InstId) -> Option<Instrument> {
        self.entries.get(symbol).map(|e| e.instrument.clone())
    }

    pub fn entry(&self, symbol: &InstId) -> Option<InstrumentCacheEntry> {
        self.entries.get(symbol).map(|e| e.clone())
    }

    pub fn version(&self, symbol: &InstId) -> u64 {
        self.entries.get(symbol).map(|e| e.version).unwrap_or(0)
    }

    pub fn contains(&self, symbol: &InstId) -> bool {
        self.entries.contains_key(symbol)
    }

    pub fn symbols(&self) -> Vec<InstId> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn fresh(&self, symbol: &InstId) -> Option<Instrument> {
        let entry = self.entries.get(symbol)?;
        if entry.stale || self.is_expired(&entry) {
            return None;
        }
        Some(entry.instrument.clone())
    }

    fn is_expired(&self, entry: &InstrumentCacheEntry) -> bool {
        let Some(ttl) = self.config.ttl else {
            return false;
        };
        (Utc::now() - entry.last_update)
            .to_std()
            .map_or(false, |age| age >= ttl)
    }

    fn store(&self, instrument: Instrument) -> Instrument {
        let symbol = instrument.symbol.clone();
        let version = self.version(&symbol) + 1;
        self.entries.insert(
            symbol.clone(),
            InstrumentCacheEntry {
                instrument: instrument.clone(),
                last_update: Utc::now(),
                version,
                stale: false,
            },
        );
        self.events.emit(PipelineEvent::InstrumentCached {
            symbol,
            lot_size: instrument.lot_size,
            source: instrument.lot_size_source,
            version,
        });
        instrument
    }

    async fn resolve(&self, symbol: &InstId) -> FlightOutcome {
        // An earlier flight may have stored the value after our first check.
        if let Some(instrument) = self.fresh(symbol) {
            return Ok(instrument);
        }

        match self.source.fetch_instrument(symbol).await {
            Ok(instrument) => Ok(self.store(instrument)),
            Err(err) => self.recover(symbol, err),
        }
    }

    fn recover(&self, symbol: &InstId, err: RegistryError) -> FlightOutcome {
        let reason = err.to_string();

        if let Some(previous) = self.get(symbol) {
            self.emit_fetch_failed(symbol, &reason, true);
            return Ok(previous);
        }

        self.emit_fetch_failed(symbol, &reason, false);

        match self.config.fallback_lot_sizes.get(symbol) {
            Some(lot) => Instrument::fallback(symbol.clone(), *lot).map_err(|e| e.to_string()),
            None => Err(reason),
        }
    }

    fn emit_fetch_failed(&self, symbol: &InstId, reason: &str, served_stale: bool) {
        self.events.emit(PipelineEvent::InstrumentFetchFailed {
            symbol: symbol.clone(),
            reason: reason.to_string(),
            served_stale,
        });
    }
}
