//! Seams between the runtime layer and the backend.
//!
//! The controller and the polling tasks only see these traits; the HTTP
//! client implements all of them, and tests substitute in-memory fakes.

use std::collections::HashMap;

use async_trait::async_trait;
use twinlink_client::{AuthorizeResponse, ClientError, ExtractResponse, TwinClient};
use twinlink_core::{Notification, PlatformStatus, StatusJobRow};

/// Connection operations for one platform.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    async fn authorize(&self, platform: &str) -> Result<AuthorizeResponse, ClientError>;

    async fn revoke(&self, platform: &str) -> Result<(), ClientError>;

    async fn extract(&self, platform: &str) -> Result<ExtractResponse, ClientError>;
}

/// Source of the extraction-status rows polled by the status board.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn extraction_status(&self) -> Result<Vec<StatusJobRow>, ClientError>;
}

/// Source of token notifications and the per-platform status signal.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn unread_notifications(&self) -> Result<Vec<Notification>, ClientError>;

    async fn platform_status(&self) -> Result<HashMap<String, PlatformStatus>, ClientError>;

    async fn dismiss_notification(&self, id: &str) -> Result<(), ClientError>;
}

#[async_trait]
impl PlatformConnector for TwinClient {
    async fn authorize(&self, platform: &str) -> Result<AuthorizeResponse, ClientError> {
        TwinClient::authorize(self, platform).await
    }

    async fn revoke(&self, platform: &str) -> Result<(), ClientError> {
        TwinClient::revoke(self, platform).await
    }

    async fn extract(&self, platform: &str) -> Result<ExtractResponse, ClientError> {
        TwinClient::extract(self, platform).await
    }
}

#[async_trait]
impl StatusSource for TwinClient {
    async fn extraction_status(&self) -> Result<Vec<StatusJobRow>, ClientError> {
        TwinClient::extraction_status(self).await
    }
}

#[async_trait]
impl NotificationSource for TwinClient {
    async fn unread_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        TwinClient::unread_notifications(self).await
    }

    async fn platform_status(&self) -> Result<HashMap<String, PlatformStatus>, ClientError> {
        TwinClient::platform_status(self).await
    }

    async fn dismiss_notification(&self, id: &str) -> Result<(), ClientError> {
        TwinClient::dismiss_notification(self, id).await
    }
}
