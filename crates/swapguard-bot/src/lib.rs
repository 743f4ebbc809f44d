//! swapguard application.
//!
//! Wires configuration, instrument metadata, transport and the submission
//! pipeline together:
//! - Instrument metadata from the REST endpoint or a static table
//! - Proxy-aware transport with bounded retry
//! - Entry, take-profit and stop-loss placement (paper by default)

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
