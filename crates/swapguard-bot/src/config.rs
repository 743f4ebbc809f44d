//! Application configuration.
//!
//! Loaded from a TOML file layered with `SWAPGUARD__`-prefixed environment
//! variables (`SWAPGUARD__TRANSPORT__PROXY_URL=socks5h://127.0.0.1:1080`).
//! Every field has a default, so an empty file is a valid configuration.

use crate::error::{AppError, AppResult};
use config::{Config, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use swapguard_core::{InstId, PositionMode, TradeMode};
use swapguard_executor::PipelineConfig;
use swapguard_registry::{CacheConfig, InstrumentDefinition};
use swapguard_transport::TransportConfig;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "SWAPGUARD_CONFIG";
const ENV_PREFIX: &str = "SWAPGUARD";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub exchange: ExchangeConfig,
}

/// Instrument metadata configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// REST base URL for instrument definitions. When unset, only the
    /// static `instruments` table is consulted.
    #[serde(default)]
    pub rest_url: Option<String>,
    /// Maximum age of a cached instrument (seconds). Unset: no expiry.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    /// Lot sizes used when metadata cannot be fetched, keyed by symbol.
    #[serde(default)]
    pub fallback_lot_sizes: HashMap<String, Decimal>,
    /// Static instrument table.
    #[serde(default)]
    pub instruments: Vec<InstrumentDefinition>,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_refresh_on_lot_size_violation")]
    pub refresh_on_lot_size_violation: bool,
    /// Margin mode for every order. Default: cross.
    #[serde(default)]
    pub trade_mode: TradeMode,
    /// Account position mode. Default: net.
    #[serde(default)]
    pub position_mode: PositionMode,
    /// Ask the account for its position mode at startup, keeping
    /// `position_mode` if the query fails. Live placement only.
    #[serde(default = "default_detect_position_mode")]
    pub detect_position_mode: bool,
}

fn default_refresh_on_lot_size_violation() -> bool {
    true
}

fn default_detect_position_mode() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            refresh_on_lot_size_violation: default_refresh_on_lot_size_violation(),
            trade_mode: TradeMode::default(),
            position_mode: PositionMode::default(),
            detect_position_mode: default_detect_position_mode(),
        }
    }
}

/// Exchange endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// REST base URL for order placement.
    #[serde(default = "default_exchange_rest_url")]
    pub rest_url: String,
}

fn default_exchange_rest_url() -> String {
    "https://www.okx.com".to_string()
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: default_exchange_rest_url(),
        }
    }
}

impl AppConfig {
    /// Load from `path` (or the default location) plus environment overrides.
    ///
    /// A missing file is not an error; the defaults apply.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let path = path
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        if !Path::new(&path).exists() {
            tracing::warn!(%path, "Config file not found, using defaults");
        }

        let config: Self = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file without environment overrides.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.transport.validate()?;
        if self.exchange.rest_url.trim().is_empty() {
            return Err(AppError::Config("exchange.rest_url must not be empty".to_string()));
        }
        for (symbol, lot) in &self.registry.fallback_lot_sizes {
            if *lot <= Decimal::ZERO {
                return Err(AppError::Config(format!(
                    "fallback lot size for {symbol} must be positive, got {lot}"
                )));
            }
        }
        Ok(())
    }

    /// Cache settings with symbols resolved to instrument ids.
    pub fn cache_config(&self) -> AppResult<CacheConfig> {
        let fallback_lot_sizes = self
            .registry
            .fallback_lot_sizes
            .iter()
            .map(|(symbol, lot)| -> AppResult<(InstId, Decimal)> {
                Ok((InstId::from_asset(symbol)?, *lot))
            })
            .collect::<AppResult<HashMap<_, _>>>()?;

        Ok(CacheConfig {
            ttl: self.registry.cache_ttl_secs.map(Duration::from_secs),
            fallback_lot_sizes,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            refresh_on_lot_size_violation: self.pipeline.refresh_on_lot_size_violation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_file_is_valid() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.pipeline.refresh_on_lot_size_violation);
        assert_eq!(config.pipeline.trade_mode, TradeMode::Cross);
        assert_eq!(config.pipeline.position_mode, PositionMode::Net);
        assert!(config.pipeline.detect_position_mode);
        assert!(config.registry.cache_ttl_secs.is_none());
    }

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml(
            r#"
            [transport]
            proxy_url = "socks5h://127.0.0.1:1080"
            timeout_secs = 10
            retryable_codes = ["50001"]

            [registry]
            cache_ttl_secs = 3600

            [registry.fallback_lot_sizes]
            ETH = "1"

            [[registry.instruments]]
            symbol = "BTC-USDT-SWAP"
            lot_size = "0.01"
            contract_size = "0.01"

            [pipeline]
            refresh_on_lot_size_violation = false
            trade_mode = "isolated"
            position_mode = "long_short_mode"
            detect_position_mode = false
            "#,
        )
        .unwrap();

        assert_eq!(config.transport.proxy(), Some("socks5h://127.0.0.1:1080"));
        assert_eq!(config.transport.timeout_secs, 10);
        assert_eq!(config.transport.max_attempts, 3);
        assert_eq!(config.registry.instruments[0].lot_size, Some(dec!(0.01)));
        assert!(!config.pipeline_config().refresh_on_lot_size_violation);
        assert_eq!(config.pipeline.trade_mode, TradeMode::Isolated);
        assert_eq!(config.pipeline.position_mode, PositionMode::LongShort);
        assert!(!config.pipeline.detect_position_mode);

        let cache = config.cache_config().unwrap();
        assert_eq!(cache.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(
            cache
                .fallback_lot_sizes
                .get(&InstId::new("ETH-USDT-SWAP").unwrap()),
            Some(&dec!(1))
        );
    }

    #[test]
    fn test_rejects_unsupported_proxy() {
        let err = AppConfig::from_toml(
            r#"
            [transport]
            proxy_url = "ftp://127.0.0.1:21"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    #[test]
    fn test_rejects_non_positive_fallback() {
        let err = AppConfig::from_toml(
            r#"
            [registry.fallback_lot_sizes]
            ETH = "0"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load(Some("does/not/exist.toml")).unwrap();
        assert_eq!(config.exchange.rest_url, "https://www.okx.com");
    }
}
