use thiserror::Error;

/// Errors returned by the backend HTTP client and the push-channel reader.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with `"success": false`.
    #[error("API error: {0}")]
    Api(String),

    /// Non-2xx status from an endpoint.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl ClientError {
    /// True for failures that a later poll may not hit again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            ClientError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            ClientError::WebSocket(_) => true,
            ClientError::Api(_)
            | ClientError::Deserialize { .. }
            | ClientError::InvalidBaseUrl { .. } => false,
        }
    }
}
