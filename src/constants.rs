//! # System Constants
//!
//! Defaults and stable identifiers shared by the orchestrator, its
//! configuration and the progress sink.

/// Default policy knobs used when configuration does not override them
pub mod policy_defaults {
    pub const MAX_CONCURRENT: usize = 3;
    pub const PER_ITEM_TIMEOUT_SECONDS: u64 = 120;
    pub const RETRY_ATTEMPTS: u32 = 2;
    pub const RETRY_DELAY_MS: u64 = 2_000;
    /// Upper bound accepted for a per-item timeout (one day)
    pub const MAX_PER_ITEM_TIMEOUT_SECONDS: u64 = 86_400;
    /// How long the orchestrator waits on the progress sink after a run
    pub const SINK_TIMEOUT_MS: u64 = 5_000;
}

/// Status kinds registered with the progress sink
pub mod status_kinds {
    pub const AVATAR_VIDEO_BATCH: &str = "avatar_video_batch";
}

/// Stable error codes attached to classified item failures
pub mod error_codes {
    pub const MISSING_PREREQUISITE: &str = "MISSING_PREREQUISITE";
    pub const PROVIDER_TRANSIENT: &str = "PROVIDER_TRANSIENT";
    pub const PROVIDER_TIMEOUT: &str = "PROVIDER_TIMEOUT";
    pub const PROVIDER_REJECTED: &str = "PROVIDER_REJECTED";
    pub const UNEXPECTED_LIFECYCLE_STATE: &str = "UNEXPECTED_LIFECYCLE_STATE";
    pub const INTERRUPTED_DURING_RETRY: &str = "INTERRUPTED_DURING_RETRY";
    pub const TASK_ABORTED: &str = "TASK_ABORTED";
    pub const BATCH_RUN_ABORTED: &str = "BATCH_RUN_ABORTED";
}

/// Messages recorded on item outcomes
pub mod messages {
    pub const MISSING_PREREQUISITE: &str = "missing prerequisite";
    pub const CANCELLED_BEFORE_CALL: &str = "cancelled before provider call";
    pub const TASK_ABORTED: &str = "generation task aborted before reporting an outcome";
}

/// Environment variables consulted at startup
pub mod env {
    pub const ENVIRONMENT: &str = "AVATAR_BATCH_ENV";
    pub const FALLBACK_ENVIRONMENT: &str = "APP_ENV";
    pub const CONFIG_PREFIX: &str = "AVATAR_BATCH";
    pub const DEFAULT_ENVIRONMENT: &str = "development";
}
