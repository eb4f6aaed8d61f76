//! HTTP client for the extraction backend.
//!
//! Wraps `reqwest` with the backend's `{"success": ..}` envelope handling,
//! user-id plumbing, and typed response deserialization.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use twinlink_core::{Notification, PlatformStatus, StatusJobRow};

use crate::error::ClientError;
use crate::types::{
    AuthorizeResponse, ExtractResponse, ExtractionStatusResponse, NotificationsResponse,
    PlatformStatusResponse, UserBody,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001/api";

/// Client for the extraction backend, bound to one user.
#[derive(Debug, Clone)]
pub struct TwinClient {
    client: Client,
    base_url: Url,
    user_id: String,
}

impl TwinClient {
    /// Creates a client for `base_url` (e.g. `http://localhost:3001/api`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ClientError::InvalidBaseUrl`] if
    /// `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str, user_id: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("twinlink/0.1")
            .build()?;

        let base_url = parse_base_url(base_url)?;

        Ok(Self {
            client,
            base_url,
            user_id: user_id.to_owned(),
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Fetches the user's recent extraction jobs.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Api`] if the backend reports `success: false`.
    /// - [`ClientError::Http`] / [`ClientError::UnexpectedStatus`] on transport failure.
    /// - [`ClientError::Deserialize`] if the response shape is unexpected.
    pub async fn extraction_status(&self) -> Result<Vec<StatusJobRow>, ClientError> {
        let url = self.user_query(&["soul-data", "extraction-status"]);
        let envelope: ExtractionStatusResponse = self
            .request_envelope(Method::GET, url, "extraction-status")
            .await?;
        Ok(envelope.recent_jobs)
    }

    /// Fetches unread notifications of every kind.
    ///
    /// # Errors
    ///
    /// Same as [`TwinClient::extraction_status`].
    pub async fn unread_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        let url = self.user_query(&["notifications", "unread"]);
        let envelope: NotificationsResponse = self
            .request_envelope(Method::GET, url, "notifications/unread")
            .await?;
        Ok(envelope.into_notifications())
    }

    /// Persists a dismiss for notification `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] or [`ClientError::UnexpectedStatus`] on
    /// transport failure. The response body is not inspected.
    pub async fn dismiss_notification(&self, id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["notifications", id, "dismiss"]);
        self.send(Method::POST, url).await.map(drop)
    }

    /// Per-platform connection status keyed by platform id.
    ///
    /// # Errors
    ///
    /// Same as [`TwinClient::extraction_status`].
    pub async fn platform_status(&self) -> Result<HashMap<String, PlatformStatus>, ClientError> {
        let url = self.user_query(&["platforms", "status"]);
        let envelope: PlatformStatusResponse = self
            .request_envelope(Method::GET, url, "platforms/status")
            .await?;
        Ok(envelope.platforms)
    }

    /// Starts authorization for `platform`.
    ///
    /// # Errors
    ///
    /// Same as [`TwinClient::extraction_status`].
    pub async fn authorize(&self, platform: &str) -> Result<AuthorizeResponse, ClientError> {
        let url = self.endpoint(&["entertainment", "connect", platform]);
        self.request_envelope(Method::POST, url, &format!("connect({platform})"))
            .await
    }

    /// Revokes the stored grant for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] or [`ClientError::UnexpectedStatus`] on
    /// transport failure.
    pub async fn revoke(&self, platform: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["oauth", "disconnect", platform]);
        self.send(Method::DELETE, url).await.map(drop)
    }

    /// Runs an extraction for `platform`.
    ///
    /// A `requiresReauth` answer is returned as `Ok` so the caller can move
    /// the connection to re-authorization; any other `success: false` is an
    /// [`ClientError::Api`].
    ///
    /// # Errors
    ///
    /// Same as [`TwinClient::extraction_status`].
    pub async fn extract(&self, platform: &str) -> Result<ExtractResponse, ClientError> {
        let url = self.endpoint(&["soul-data", "extract", platform]);
        let context = format!("extract({platform})");
        let body = self.send(Method::POST, url).await?;
        let value = parse_json(&body, &context)?;
        let response: ExtractResponse =
            serde_json::from_value(value).map_err(|e| ClientError::Deserialize {
                context: context.clone(),
                source: e,
            })?;
        if !response.success && !response.requires_reauth {
            let msg = response
                .message
                .clone()
                .or_else(|| response.error.clone())
                .unwrap_or_else(|| "extraction failed".to_string());
            return Err(ClientError::Api(msg));
        }
        Ok(response)
    }

    /// Builds `{base}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn user_query(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint(segments);
        url.query_pairs_mut().append_pair("userId", &self.user_id);
        url
    }

    /// Sends a request (with the `{userId}` body for writes), asserts a 2xx
    /// status, and returns the body text.
    async fn send(&self, method: Method, url: Url) -> Result<String, ClientError> {
        let mut request = self.client.request(method.clone(), url.clone());
        if method != Method::GET {
            request = request.json(&UserBody {
                user_id: &self.user_id,
            });
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    async fn request_envelope<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        context: &str,
    ) -> Result<T, ClientError> {
        let body = self.send(method, url).await?;
        let value = parse_json(&body, context)?;
        check_api_error(&value)?;
        serde_json::from_value(value).map_err(|e| ClientError::Deserialize {
            context: context.to_string(),
            source: e,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be a base".to_string()));
    }
    Ok(url)
}

fn parse_json(body: &str, context: &str) -> Result<serde_json::Value, ClientError> {
    serde_json::from_str(body).map_err(|e| ClientError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}

/// Checks the top-level `"success"` flag and surfaces the backend's message.
fn check_api_error(body: &serde_json::Value) -> Result<(), ClientError> {
    if body.get("success").and_then(serde_json::Value::as_bool) == Some(false) {
        let msg = body
            .get("error")
            .or_else(|| body.get("message"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(ClientError::Api(msg));
    }
    Ok(())
}
