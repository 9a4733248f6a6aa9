use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

use crate::constants::policy_defaults;
use crate::error::{BatchError, Result};
use crate::models::work_item::PrerequisiteKind;

/// Which items of the target collection a batch covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "type", content = "item_ids")]
pub enum Selection {
    #[default]
    All,
    /// Explicit subset; ordering still follows the collection
    Items(Vec<Uuid>),
}

impl Selection {
    pub fn includes(&self, item_id: &Uuid) -> bool {
        match self {
            Self::All => true,
            Self::Items(ids) => ids.contains(item_id),
        }
    }
}

/// Rendering options forwarded untouched to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutputOptions {
    pub resolution: Option<String>,
    pub background: Option<String>,
    pub caption: bool,
}

/// Provider-facing parameters shared by every item of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderParams {
    /// Avatar variant to render
    pub variant_id: String,
    pub style: Option<String>,
    pub output: OutputOptions,
}

/// Concurrency, timeout and retry knobs for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPolicy {
    pub max_concurrent: usize,
    pub per_item_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl BatchPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent < 1 {
            return Err(BatchError::invalid_request("max_concurrent must be at least 1"));
        }
        if self.retry_attempts < 1 {
            return Err(BatchError::invalid_request("retry_attempts must be at least 1"));
        }
        if self.per_item_timeout.is_zero() {
            return Err(BatchError::invalid_request("per_item_timeout must be non-zero"));
        }
        if self.per_item_timeout > Self::max_per_item_timeout() {
            return Err(BatchError::invalid_request(format!(
                "per_item_timeout must not exceed {}s",
                policy_defaults::MAX_PER_ITEM_TIMEOUT_SECONDS
            )));
        }
        Ok(())
    }

    pub fn max_per_item_timeout() -> Duration {
        Duration::from_secs(policy_defaults::MAX_PER_ITEM_TIMEOUT_SECONDS)
    }

    /// Pessimistic bound for the whole run: every item serialized through the gate.
    pub fn aggregate_deadline(&self, item_count: usize) -> Duration {
        let count = u32::try_from(item_count).unwrap_or(u32::MAX);
        self.per_item_timeout.saturating_mul(count)
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_concurrent: policy_defaults::MAX_CONCURRENT,
            per_item_timeout: Duration::from_secs(policy_defaults::PER_ITEM_TIMEOUT_SECONDS),
            retry_attempts: policy_defaults::RETRY_ATTEMPTS,
            retry_delay: Duration::from_millis(policy_defaults::RETRY_DELAY_MS),
        }
    }
}

/// Immutable input to a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Presentation whose slides are processed
    pub target_id: Uuid,
    pub selection: Selection,
    pub regenerate_existing: bool,
    pub params: ProviderParams,
    pub policy: BatchPolicy,
    /// Upstream artifacts every item must have before the provider is called
    pub required_prerequisites: Vec<PrerequisiteKind>,
}

impl BatchRequest {
    pub fn new(target_id: Uuid, params: ProviderParams) -> Self {
        Self {
            target_id,
            selection: Selection::All,
            regenerate_existing: false,
            params,
            policy: BatchPolicy::default(),
            required_prerequisites: vec![PrerequisiteKind::Audio],
        }
    }

    pub fn with_selection(mut self, item_ids: Vec<Uuid>) -> Self {
        self.selection = Selection::Items(item_ids);
        self
    }

    pub fn with_regenerate_existing(mut self, regenerate: bool) -> Self {
        self.regenerate_existing = regenerate;
        self
    }

    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_required_prerequisites(mut self, kinds: Vec<PrerequisiteKind>) -> Self {
        self.required_prerequisites = kinds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;

        if self.params.variant_id.trim().is_empty() {
            return Err(BatchError::invalid_request("variant_id is required"));
        }

        if let Selection::Items(ids) = &self.selection {
            let unique: HashSet<&Uuid> = ids.iter().collect();
            if unique.len() != ids.len() {
                return Err(BatchError::invalid_request(
                    "selection contains duplicate item ids",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ProviderParams {
        ProviderParams {
            variant_id: "presenter-a".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_policy_rejects_zero_concurrency() {
        let policy = BatchPolicy {
            max_concurrent: 0,
            ..Default::default()
        };
        assert!(matches!(policy.validate(), Err(BatchError::InvalidRequest(_))));
    }

    #[test]
    fn test_policy_rejects_zero_retry_attempts() {
        let policy = BatchPolicy {
            retry_attempts: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_rejects_unbounded_timeout() {
        let policy = BatchPolicy {
            per_item_timeout: Duration::from_secs(u64::MAX / 2),
            ..Default::default()
        };
        assert!(matches!(policy.validate(), Err(BatchError::InvalidRequest(_))));

        let at_limit = BatchPolicy {
            per_item_timeout: BatchPolicy::max_per_item_timeout(),
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_aggregate_deadline_scales_with_item_count() {
        let policy = BatchPolicy {
            per_item_timeout: Duration::from_secs(90),
            ..Default::default()
        };
        assert_eq!(policy.aggregate_deadline(4), Duration::from_secs(360));
        assert_eq!(policy.aggregate_deadline(0), Duration::ZERO);
    }

    #[test]
    fn test_request_requires_variant() {
        let request = BatchRequest::new(Uuid::new_v4(), ProviderParams::default());
        assert!(request.validate().is_err());
        assert!(BatchRequest::new(Uuid::new_v4(), params()).validate().is_ok());
    }

    #[test]
    fn test_request_rejects_duplicate_selection() {
        let id = Uuid::new_v4();
        let request = BatchRequest::new(Uuid::new_v4(), params()).with_selection(vec![id, id]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_selection_serializes_with_tag() {
        let json = serde_json::to_value(Selection::All).unwrap();
        assert_eq!(json, serde_json::json!({"type": "all"}));
    }
}
