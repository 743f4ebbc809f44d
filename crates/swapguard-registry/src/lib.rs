//! Instrument metadata for swapguard.
//!
//! Resolves per-symbol trading constraints (lot size, minimum quantity,
//! contract value) from a metadata source and caches them for the lifetime
//! of the pipeline.
//!
//! - `source`: the `InstrumentSource` port and a configuration-backed table
//! - `client`: REST source for the exchange's public instruments endpoint
//! - `instrument_cache`: single-flight cache with explicit invalidation

pub mod client;
pub mod error;
pub mod instrument_cache;
pub mod source;

pub use client::MetaClient;
pub use error::{RegistryError, RegistryResult};
pub use instrument_cache::{CacheConfig, InstrumentCache, InstrumentCacheEntry};
pub use source::{DynInstrumentSource, InstrumentDefinition, InstrumentSource, StaticInstrumentTable};
