//! Transport configuration.
//!
//! Consumed, not owned: every value arrives from the application's config
//! file or environment, with the defaults below.

use crate::error::{TransportError, TransportResult};
use crate::retry::RetryPolicy;
use reqwest::{Client, Proxy, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Supported proxy URL schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    Http,
    Https,
    Socks5,
    /// SOCKS5 with hostname resolution on the proxy side.
    Socks5h,
}

impl ProxyScheme {
    /// Parse and validate a proxy URL.
    pub fn parse(proxy_url: &str) -> TransportResult<Self> {
        let url = Url::parse(proxy_url)
            .map_err(|e| TransportError::InvalidProxy(format!("{proxy_url}: {e}")))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(TransportError::InvalidProxy(format!(
                "{proxy_url}: missing host"
            )));
        }
        match url.scheme() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "socks5" => Ok(Self::Socks5),
            "socks5h" => Ok(Self::Socks5h),
            other => Err(TransportError::InvalidProxy(format!(
                "{proxy_url}: unsupported scheme '{other}'"
            ))),
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Outbound proxy (`http://`, `https://`, `socks5://`, `socks5h://`).
    /// None means a direct connection.
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// Per-attempt timeout (seconds). Default: 30.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts for retryable failures. Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failure (ms). Default: 5000.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Growth factor between consecutive delays. Default: 2.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    /// Exchange error codes that may be retried like transport failures.
    /// Default: none.
    #[serde(default)]
    pub retryable_codes: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> u32 {
    2
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            retryable_codes: Vec::new(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.backoff_multiplier,
        )
    }

    /// Proxy URL with surrounding whitespace removed; blank counts as unset.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy_url
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Reject configurations that would make the retry loop meaningless.
    pub fn validate(&self) -> TransportResult<()> {
        if self.timeout_secs == 0 {
            return Err(TransportError::InvalidConfig(
                "timeout_secs must be > 0".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(TransportError::InvalidConfig(
                "max_attempts must be >= 1".to_string(),
            ));
        }
        if self.backoff_multiplier == 0 {
            return Err(TransportError::InvalidConfig(
                "backoff_multiplier must be >= 1".to_string(),
            ));
        }
        if let Some(proxy) = self.proxy() {
            ProxyScheme::parse(proxy)?;
        }
        Ok(())
    }

    /// Build the HTTP client every exchange call goes through.
    ///
    /// Without a configured proxy the client ignores `HTTP(S)_PROXY`
    /// environment variables, so routing is decided by configuration alone.
    pub fn build_http_client(&self) -> TransportResult<Client> {
        self.validate()?;

        let mut builder = Client::builder()
            .timeout(self.timeout())
            .connect_timeout(self.timeout())
            .tcp_nodelay(true)
            .user_agent(concat!("swapguard/", env!("CARGO_PKG_VERSION")));

        builder = match self.proxy() {
            Some(proxy_url) => {
                let proxy = Proxy::all(proxy_url)
                    .map_err(|e| TransportError::InvalidProxy(format!("{proxy_url}: {e}")))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        builder
            .build()
            .map_err(|e| TransportError::HttpClient(format!("Failed to create HTTP client: {e}")))
    }
}
