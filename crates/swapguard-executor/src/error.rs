//! Executor error types.

use swapguard_transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
