use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigurationError;
use crate::orchestration::types::{RepositoryError, SinkError};

/// Hard errors surfaced to the caller of the inbound operations.
///
/// Per-item generation failures never appear here; they are captured in
/// [`crate::models::ItemOutcome`] and reported through the batch summary.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Target not found: {0}")]
    TargetNotFound(Uuid),

    #[error("Invalid batch request: {0}")]
    InvalidRequest(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Progress sink error: {0}")]
    ProgressSink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Unknown batch: {0}")]
    UnknownBatch(Uuid),
}

impl BatchError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
