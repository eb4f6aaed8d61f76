//! Domain core for platform connections and extraction monitoring.
//!
//! Everything here is synchronous and free of I/O apart from the config and
//! onboarding-flag loaders; the async runtime lives in `twinlink-monitor`.

pub mod app_config;
pub mod config;
pub mod connection;
pub mod error;
pub mod expiry;
pub mod jobs;
pub mod onboarding;
pub mod platforms;
pub mod progress;
pub mod status;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use connection::{ConnectionEvent, ConnectionState, PlatformConnection};
pub use error::{ConfigError, InvalidTransition, OnboardingError};
pub use expiry::{
    ExpiryFilter, ExpiryView, JustConnected, Notification, NotificationKind, PlatformStatus,
    Priority,
};
pub use jobs::{
    Applied, ExtractionEvent, ExtractionJob, JobStatus, JobTracker, PlatformSummary,
    VisibilityPolicy,
};
pub use onboarding::{OnboardingOutcome, OnboardingRecord, OnboardingStore};
pub use platforms::{load_platforms, parse_platforms, Cluster, PlatformConfig, PlatformsFile};
pub use progress::{estimate, format_minutes_seconds, Estimate, Remaining};
pub use status::{StatusBoard, StatusJobRow, StatusJobState};
