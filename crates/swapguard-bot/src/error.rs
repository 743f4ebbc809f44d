//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] swapguard_transport::TransportError),

    #[error("Registry error: {0}")]
    Registry(#[from] swapguard_registry::RegistryError),

    #[error("Executor error: {0}")]
    Executor(#[from] swapguard_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] swapguard_telemetry::TelemetryError),

    #[error("Core error: {0}")]
    Core(#[from] swapguard_core::CoreError),
}

pub type AppResult<T> = Result<T, AppError>;
