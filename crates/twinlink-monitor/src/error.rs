use thiserror::Error;
use twinlink_client::ClientError;

/// Failure of a user-initiated connection operation.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{operation} failed for {platform}: {source}")]
    Backend {
        operation: &'static str,
        platform: String,
        #[source]
        source: ClientError,
    },
}

impl OperationError {
    pub(crate) fn backend(operation: &'static str, platform: &str, source: ClientError) -> Self {
        Self::Backend {
            operation,
            platform: platform.to_string(),
            source,
        }
    }

    #[must_use]
    pub fn client_error(&self) -> &ClientError {
        match self {
            Self::Backend { source, .. } => source,
        }
    }
}
