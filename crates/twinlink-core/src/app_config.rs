use std::path::PathBuf;
use std::time::Duration;

use crate::jobs::VisibilityPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub user_id: String,
    pub env: Environment,
    pub api_url: String,
    pub ws_url: String,
    pub log_level: String,
    pub platforms_path: PathBuf,
    pub state_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub status_poll_interval_ms: u64,
    pub notification_poll_interval_secs: u64,
    pub job_retention_secs: u64,
    pub max_visible_jobs: usize,
    pub show_finished_jobs: bool,
}

impl AppConfig {
    #[must_use]
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    #[must_use]
    pub fn notification_poll_interval(&self) -> Duration {
        Duration::from_secs(self.notification_poll_interval_secs)
    }

    #[must_use]
    pub fn visibility_policy(&self) -> VisibilityPolicy {
        VisibilityPolicy {
            show_finished: self.show_finished_jobs,
            max_visible: self.max_visible_jobs,
            retention: Duration::from_secs(self.job_retention_secs),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("user_id", &"[redacted]")
            .field("env", &self.env)
            .field("api_url", &self.api_url)
            .field("ws_url", &self.ws_url)
            .field("log_level", &self.log_level)
            .field("platforms_path", &self.platforms_path)
            .field("state_dir", &self.state_dir)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("status_poll_interval_ms", &self.status_poll_interval_ms)
            .field(
                "notification_poll_interval_secs",
                &self.notification_poll_interval_secs,
            )
            .field("job_retention_secs", &self.job_retention_secs)
            .field("max_visible_jobs", &self.max_visible_jobs)
            .field("show_finished_jobs", &self.show_finished_jobs)
            .finish()
    }
}
