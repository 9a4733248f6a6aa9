//! # Provider Failure Classification
//!
//! Decides, for each failed provider call, which failure bucket it belongs to
//! and whether the generation task may try again.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Provider error  │────▶│ ErrorClassifier │────▶│ Classification  │
//! │ + attempt info  │     │                 │     │ (kind, retry?)  │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Retry delays are fixed: every retryable failure waits the batch's
//! configured delay, independent of the attempt number.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::constants::error_codes;
use crate::models::FailureKind;
use crate::orchestration::types::{LifecycleState, ProviderError};

/// Context information for error classification
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub item_id: Uuid,
    pub slide_number: u32,
    /// Current attempt number (1-based)
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl ErrorContext {
    fn attempts_remain(&self) -> bool {
        self.attempt_number < self.max_attempts
    }
}

/// Result of error classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub category: FailureKind,
    /// Whether another attempt should be made
    pub is_retryable: bool,
    pub retry_delay: Option<Duration>,
    pub error_code: String,
    pub error_message: String,
    pub is_final_attempt: bool,
}

/// Trait for error classification strategies
pub trait ErrorClassifier: Send + Sync {
    fn classify_error(&self, error: &ProviderError, context: &ErrorContext)
        -> ErrorClassification;

    /// Classify a submission the provider accepted with a state that does not
    /// count as initiated
    fn classify_lifecycle(
        &self,
        state: &LifecycleState,
        context: &ErrorContext,
    ) -> ErrorClassification;

    fn classifier_name(&self) -> &'static str;
}

/// Default classifier used by generation tasks
#[derive(Debug, Clone, Default)]
pub struct StandardErrorClassifier;

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    fn retryable(
        &self,
        error_code: &str,
        error_message: String,
        context: &ErrorContext,
    ) -> ErrorClassification {
        let is_retryable = context.attempts_remain();
        ErrorClassification {
            category: FailureKind::ProviderTransient,
            is_retryable,
            retry_delay: is_retryable.then_some(context.retry_delay),
            error_code: error_code.to_string(),
            error_message,
            is_final_attempt: !is_retryable,
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify_error(
        &self,
        error: &ProviderError,
        context: &ErrorContext,
    ) -> ErrorClassification {
        match error {
            ProviderError::Transient(_) => {
                self.retryable(error_codes::PROVIDER_TRANSIENT, error.to_string(), context)
            }
            ProviderError::Timeout(_) => {
                self.retryable(error_codes::PROVIDER_TIMEOUT, error.to_string(), context)
            }
            ProviderError::Rejected(_) => ErrorClassification {
                category: FailureKind::ProviderRejection,
                is_retryable: false,
                retry_delay: None,
                error_code: error_codes::PROVIDER_REJECTED.to_string(),
                error_message: error.to_string(),
                is_final_attempt: true,
            },
        }
    }

    fn classify_lifecycle(
        &self,
        state: &LifecycleState,
        context: &ErrorContext,
    ) -> ErrorClassification {
        self.retryable(
            error_codes::UNEXPECTED_LIFECYCLE_STATE,
            format!("provider returned unexpected lifecycle state '{state}'"),
            context,
        )
    }

    fn classifier_name(&self) -> &'static str {
        "standard"
    }
}
