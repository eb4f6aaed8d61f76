//! Push-channel reader for extraction events.

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use twinlink_core::ExtractionEvent;

use crate::error::ClientError;

/// Live WebSocket subscription to the user's extraction events.
pub struct EventSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl EventSocket {
    /// Opens `{ws_url}?userId={user_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] for a non-ws(s) URL and
    /// [`ClientError::WebSocket`] if the handshake fails.
    pub async fn connect(ws_url: &str, user_id: &str) -> Result<Self, ClientError> {
        let url = build_socket_url(ws_url, user_id)?;
        let (stream, _response) = connect_async(url.as_str()).await?;
        tracing::info!(url = %redacted(&url), "push channel connected");
        Ok(Self { stream })
    }

    /// Waits for the next extraction event.
    ///
    /// Returns `Ok(None)` once the server closes the channel. Frames that are
    /// not extraction events are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::WebSocket`] on a protocol or transport error.
    pub async fn next_event(&mut self) -> Result<Option<ExtractionEvent>, ClientError> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Text(text) => {
                    if let Some(event) = decode_frame(&text) {
                        return Ok(Some(event));
                    }
                }
                Message::Ping(payload) => {
                    self.stream.send(Message::Pong(payload)).await?;
                }
                Message::Close(_) => break,
                Message::Binary(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    /// Sends a close frame; errors on an already-closed socket are ignored.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "push channel close failed");
        }
    }
}

/// Decodes one text frame, logging and discarding anything that is not a
/// known extraction event.
#[must_use]
pub fn decode_frame(text: &str) -> Option<ExtractionEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable push frame");
            return None;
        }
    };
    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    if !kind.starts_with("extraction_") {
        tracing::debug!(kind = %kind, "ignoring push frame");
        return None;
    }
    match serde_json::from_value(value) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(kind = %kind, error = %e, "malformed extraction frame");
            None
        }
    }
}

fn build_socket_url(ws_url: &str, user_id: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidBaseUrl {
        url: ws_url.to_string(),
        reason,
    };
    let mut url = Url::parse(ws_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    url.query_pairs_mut().append_pair("userId", user_id);
    Ok(url)
}

fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_frames() {
        let event = decode_frame(
            r#"{"type":"extraction_update","jobId":"j1","itemsProcessed":10,"totalItems":40}"#,
        )
        .expect("update frame");
        assert_eq!(event.job_id(), "j1");

        let event = decode_frame(
            r#"{"type":"extraction_completed","jobId":"j1","itemsExtracted":40}"#,
        )
        .expect("completed frame");
        assert!(matches!(event, ExtractionEvent::Completed { items_extracted: Some(40), .. }));
    }

    #[test]
    fn skips_unknown_and_garbage_frames() {
        assert!(decode_frame(r#"{"type":"presence","userId":"u"}"#).is_none());
        assert!(decode_frame(r#"{"type":"extraction_rewound","jobId":"j1"}"#).is_none());
        assert!(decode_frame("not json").is_none());
        assert!(decode_frame(r#"{"jobId":"j1"}"#).is_none());
    }

    #[test]
    fn socket_url_carries_user_id() {
        let url = build_socket_url("ws://localhost:3001/ws", "user-1").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3001/ws?userId=user-1");
        assert_eq!(redacted(&url), "ws://localhost:3001/ws");
    }

    #[test]
    fn socket_url_rejects_http() {
        let err = build_socket_url("http://localhost:3001/ws", "u").unwrap_err();
        assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));
    }
}
