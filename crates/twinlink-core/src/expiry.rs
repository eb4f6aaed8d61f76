//! Token expiry notification filtering.
//!
//! The remote notification store is refreshed by polling; [`ExpiryFilter`]
//! keeps the session-local dismissed set authoritative over it. The visible
//! set is always `remote - dismissed - suppressed`, never a remote overwrite.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TokenExpiring,
    TokenExpired,
    /// Any kind this subsystem does not handle.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub platform: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub days_until_expiry: Option<i64>,
}

/// Connection status for one platform as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub token_expired: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

impl PlatformStatus {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.connected && !self.token_expired
    }
}

/// Marker handed over after a redirect-based OAuth completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JustConnected {
    pub platform: String,
    pub connected: bool,
}

/// Filtered notifications plus the single item to surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryView {
    pub visible: Vec<Notification>,
    pub most_urgent: Option<Notification>,
}

#[derive(Debug, Default)]
pub struct ExpiryFilter {
    remote: Vec<Notification>,
    dismissed: HashSet<String>,
    just_connected: Option<String>,
    statuses: HashMap<String, PlatformStatus>,
}

impl ExpiryFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the remote view with the token-related subset of `notifications`.
    ///
    /// A pending just-connected marker drops that platform's entries from this
    /// batch and is then consumed.
    pub fn replace_remote(&mut self, notifications: Vec<Notification>) {
        let suppressed = self.just_connected.take();
        self.remote = notifications
            .into_iter()
            .filter(|n| n.kind != NotificationKind::Other)
            .filter(|n| suppressed.as_deref() != Some(n.platform.as_str()))
            .collect();
    }

    /// Records a completed connect flow. Ignored unless `marker.connected`.
    pub fn set_just_connected(&mut self, marker: JustConnected) {
        if marker.connected {
            self.just_connected = Some(marker.platform);
        }
    }

    /// Replaces the fresher per-platform connection status.
    pub fn update_statuses(&mut self, statuses: HashMap<String, PlatformStatus>) {
        self.statuses = statuses;
    }

    /// Dismisses `id` for the rest of the session. Returns `true` when the id
    /// was not already dismissed.
    pub fn dismiss(&mut self, id: &str) -> bool {
        self.dismissed.insert(id.to_string())
    }

    #[must_use]
    pub fn is_dismissed(&self, id: &str) -> bool {
        self.dismissed.contains(id)
    }

    #[must_use]
    pub fn visible(&self) -> Vec<Notification> {
        self.remote
            .iter()
            .filter(|n| !self.dismissed.contains(&n.id))
            .filter(|n| self.just_connected.as_deref() != Some(n.platform.as_str()))
            .filter(|n| !self.statuses.get(&n.platform).is_some_and(PlatformStatus::is_healthy))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn view(&self) -> ExpiryView {
        let visible = self.visible();
        let most_urgent = most_urgent(&visible).cloned();
        ExpiryView {
            visible,
            most_urgent,
        }
    }
}

/// Any expired entry wins over expiring ones; otherwise the first entry.
#[must_use]
pub fn most_urgent(visible: &[Notification]) -> Option<&Notification> {
    visible
        .iter()
        .find(|n| n.kind == NotificationKind::TokenExpired)
        .or_else(|| visible.first())
}
