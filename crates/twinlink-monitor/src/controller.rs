//! Async driver for one platform's connection lifecycle.
//!
//! The record lives in a `watch` channel. Every mutation goes through
//! `send_if_modified`, which checks and applies a transition under the
//! channel's lock, so two concurrent operations can never both claim the
//! platform. The lock is never held across a backend call.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use twinlink_core::{ConnectionEvent, ConnectionState, InvalidTransition, PlatformConnection};

use crate::error::OperationError;
use crate::sources::PlatformConnector;

/// Whether a call changed the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Not valid from the current state (including "already in flight").
    Ignored,
}

/// Result of a successful `extract()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    Extracted { items: u64 },
    /// The backend asked for a fresh grant; the platform is now `needs_reauth`.
    NeedsReauth,
    Ignored,
}

pub struct ConnectionController<C: ?Sized> {
    platform: String,
    connector: Arc<C>,
    state: watch::Sender<PlatformConnection>,
}

impl<C: PlatformConnector + ?Sized> ConnectionController<C> {
    /// Starts `platform` disconnected.
    pub fn new(platform: impl Into<String>, connector: Arc<C>) -> Self {
        Self::with_record(PlatformConnection::new(platform), connector)
    }

    /// Resumes from a known record, e.g. rebuilt from backend status.
    pub fn with_record(record: PlatformConnection, connector: Arc<C>) -> Self {
        let (state, _) = watch::channel(record.clone());
        Self {
            platform: record.platform,
            connector,
            state,
        }
    }

    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlatformConnection> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> PlatformConnection {
        self.state.borrow().clone()
    }

    /// Connects from `disconnected` or `error`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Backend`] if authorization fails; the
    /// connection is then in `error` carrying the failure message.
    pub async fn connect(&self) -> Result<Outcome, OperationError> {
        if !self.claim(|_| true, &ConnectionEvent::Begin) {
            return Ok(Outcome::Ignored);
        }
        self.authorize("connect").await
    }

    /// Explicit retry after a failed attempt. Only valid from `error`.
    ///
    /// # Errors
    ///
    /// Same as [`ConnectionController::connect`].
    pub async fn retry(&self) -> Result<Outcome, OperationError> {
        let from_error = |s: &ConnectionState| matches!(s, ConnectionState::Error { .. });
        if !self.claim(from_error, &ConnectionEvent::Begin) {
            return Ok(Outcome::Ignored);
        }
        self.authorize("retry").await
    }

    /// Re-authorizes from `token_expired` or `needs_reauth`, keeping the
    /// item count. The stale grant is revoked first on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Same as [`ConnectionController::connect`].
    pub async fn reconnect(&self) -> Result<Outcome, OperationError> {
        if !self.claim(|_| true, &ConnectionEvent::BeginReconnect) {
            return Ok(Outcome::Ignored);
        }
        if let Err(e) = self.connector.revoke(&self.platform).await {
            tracing::warn!(platform = %self.platform, error = %e, "revoking stale grant failed, continuing");
        }
        self.authorize("reconnect").await
    }

    /// Revokes the grant and disconnects locally. Revocation failures are
    /// logged; the local state is cleared regardless.
    pub async fn disconnect(&self) -> Outcome {
        let allowed = self
            .state
            .borrow()
            .state
            .next(&ConnectionEvent::Disconnect)
            .is_ok();
        if !allowed {
            tracing::debug!(platform = %self.platform, "disconnect ignored in current state");
            return Outcome::Ignored;
        }

        if let Err(e) = self.connector.revoke(&self.platform).await {
            tracing::warn!(platform = %self.platform, error = %e, "revoke failed, disconnecting locally");
        }

        match self.transition(&ConnectionEvent::Disconnect) {
            Ok(()) => {
                tracing::info!(platform = %self.platform, "disconnected");
                Outcome::Applied
            }
            Err(e) => {
                tracing::debug!(platform = %self.platform, error = %e, "state changed during revoke");
                Outcome::Ignored
            }
        }
    }

    /// Runs an extraction. Valid only while `connected` and idle; the stored
    /// state stays `connected` and is displayed as `extracting` meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Backend`] on a failed call; the connection
    /// stays `connected`.
    pub async fn extract(&self) -> Result<Extraction, OperationError> {
        if !self.state.send_if_modified(PlatformConnection::begin_extraction) {
            tracing::debug!(platform = %self.platform, "extract ignored in current state");
            return Ok(Extraction::Ignored);
        }

        match self.connector.extract(&self.platform).await {
            Ok(response) if response.requires_reauth => {
                self.state.send_modify(|conn| {
                    conn.finish_extraction(None, Utc::now());
                });
                tracing::warn!(
                    platform = %self.platform,
                    code = response.error.as_deref().unwrap_or_default(),
                    "extraction needs a fresh grant"
                );
                if let Err(e) = self.transition(&ConnectionEvent::RequireReauth) {
                    tracing::debug!(platform = %self.platform, error = %e, "reauth edge not applied");
                }
                Ok(Extraction::NeedsReauth)
            }
            Ok(response) => {
                let items = response.items_extracted.unwrap_or(0);
                let mut folded = false;
                self.state.send_modify(|conn| {
                    folded = conn.finish_extraction(Some(items), Utc::now());
                });
                if folded {
                    tracing::info!(platform = %self.platform, items, "extraction finished");
                } else {
                    tracing::info!(
                        platform = %self.platform,
                        items,
                        "extraction finished after the connection changed, record left as is"
                    );
                }
                Ok(Extraction::Extracted { items })
            }
            Err(e) => {
                self.state.send_modify(|conn| {
                    conn.finish_extraction(None, Utc::now());
                });
                tracing::warn!(platform = %self.platform, error = %e, "extraction failed");
                Err(OperationError::backend("extract", &self.platform, e))
            }
        }
    }

    /// External signal: the access token lapsed.
    pub fn mark_token_expired(&self) -> Outcome {
        self.external(&ConnectionEvent::TokenExpired)
    }

    /// External signal: the platform needs a fresh grant.
    pub fn mark_needs_reauth(&self) -> Outcome {
        self.external(&ConnectionEvent::RequireReauth)
    }

    fn external(&self, event: &ConnectionEvent) -> Outcome {
        match self.transition(event) {
            Ok(()) => {
                tracing::info!(platform = %self.platform, %event, "external signal applied");
                Outcome::Applied
            }
            Err(e) => {
                tracing::debug!(platform = %self.platform, error = %e, "external signal ignored");
                Outcome::Ignored
            }
        }
    }

    /// Atomically applies a begin edge if `allowed` accepts the current state.
    fn claim(&self, allowed: impl Fn(&ConnectionState) -> bool, begin: &ConnectionEvent) -> bool {
        let mut rejected = None;
        let claimed = self.state.send_if_modified(|conn| {
            if !allowed(&conn.state) {
                rejected = Some(conn.state.clone());
                return false;
            }
            match conn.apply(begin, Utc::now()) {
                Ok(()) => true,
                Err(e) => {
                    rejected = Some(e.from);
                    false
                }
            }
        });
        if let Some(state) = rejected {
            tracing::debug!(platform = %self.platform, %state, event = %begin, "ignored");
        }
        claimed
    }

    /// Walks the claimed attempt through authorization and settles it.
    async fn authorize(&self, operation: &'static str) -> Result<Outcome, OperationError> {
        for step in [ConnectionEvent::Authenticate, ConnectionEvent::Authorize] {
            if let Err(e) = self.transition(&step) {
                tracing::warn!(platform = %self.platform, error = %e, "attempt lost its claim");
                return Ok(Outcome::Ignored);
            }
        }

        match self.connector.authorize(&self.platform).await {
            Ok(response) => {
                if let Some(url) = &response.auth_url {
                    tracing::info!(platform = %self.platform, auth_url = %url, "browser authorization issued");
                }
                let succeed = ConnectionEvent::Succeed {
                    expires_at: response.expires_at,
                };
                if let Err(e) = self.transition(&succeed) {
                    tracing::warn!(platform = %self.platform, error = %e, "attempt lost its claim");
                    return Ok(Outcome::Ignored);
                }
                tracing::info!(platform = %self.platform, operation, "connected");
                Ok(Outcome::Applied)
            }
            Err(e) => {
                let fail = ConnectionEvent::Fail {
                    message: e.to_string(),
                };
                if let Err(te) = self.transition(&fail) {
                    tracing::warn!(platform = %self.platform, error = %te, "attempt lost its claim");
                }
                tracing::warn!(platform = %self.platform, operation, error = %e, "connection attempt failed");
                Err(OperationError::backend(operation, &self.platform, e))
            }
        }
    }

    fn transition(&self, event: &ConnectionEvent) -> Result<(), InvalidTransition> {
        let mut result = Ok(());
        self.state.send_if_modified(|conn| match conn.apply(event, Utc::now()) {
            Ok(()) => true,
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }
}
