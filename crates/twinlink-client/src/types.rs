//! Backend response envelopes.
//!
//! Every endpoint wraps its payload in `{"success": bool, ...}`; failures
//! carry a human-readable `error` or `message`. Domain payloads reuse the
//! `twinlink-core` types directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use twinlink_core::{Notification, PlatformStatus, StatusJobRow};

/// Request body shared by every write endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserBody<'a> {
    pub user_id: &'a str,
}

// ---------------------------------------------------------------------------
// GET /soul-data/extraction-status
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStatusResponse {
    #[serde(default)]
    pub recent_jobs: Vec<StatusJobRow>,
}

// ---------------------------------------------------------------------------
// GET /notifications/unread
// ---------------------------------------------------------------------------

/// Entries are kept raw so one unreadable notification does not sink the
/// whole batch; see [`NotificationsResponse::into_notifications`].
#[derive(Debug, Deserialize)]
pub struct NotificationsResponse {
    #[serde(default)]
    pub notifications: Vec<serde_json::Value>,
}

impl NotificationsResponse {
    /// Decodes each entry on its own, skipping the ones that do not parse.
    #[must_use]
    pub fn into_notifications(self) -> Vec<Notification> {
        self.notifications
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Notification>(raw) {
                Ok(note) => Some(note),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable notification");
                    None
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// GET /platforms/status
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PlatformStatusResponse {
    #[serde(default)]
    pub platforms: HashMap<String, PlatformStatus>,
}

// ---------------------------------------------------------------------------
// POST /entertainment/connect/{platform}
// ---------------------------------------------------------------------------

/// Result of starting an authorization with the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    /// Redirect target for browser-based OAuth, when the platform needs one.
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// POST /soul-data/extract/{platform}
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub items_extracted: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    /// Machine code such as `TOKEN_EXPIRED` or `TOKEN_REFRESH_FAILED`.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub requires_reauth: bool,
}
