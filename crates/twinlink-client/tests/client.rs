//! Integration tests for `TwinClient` using wiremock HTTP mocks.

use twinlink_client::{ClientError, TwinClient};
use twinlink_core::{NotificationKind, StatusJobState};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> TwinClient {
    TwinClient::new(&format!("{base_url}/api"), "user-1", 30)
        .expect("client construction should not fail")
}

#[tokio::test]
async fn extraction_status_returns_recent_jobs() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "success": true,
        "recentJobs": [
            { "platform": "spotify", "status": "completed", "processed_items": 120, "total_items": 120 },
            { "platform": "github", "status": "running", "processed_items": 5, "total_items": 40 },
            { "platform": "discord", "status": "failed", "error_message": "rate limited" }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/api/soul-data/extraction-status"))
        .and(query_param("userId", "user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let rows = client.extraction_status().await.expect("should parse rows");

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].platform, "spotify");
    assert_eq!(rows[0].status, StatusJobState::Completed);
    assert_eq!(rows[1].processed_items, Some(5));
    assert_eq!(rows[2].error_message.as_deref(), Some("rate limited"));
}

#[tokio::test]
async fn unread_notifications_keeps_unknown_kinds_as_other() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "success": true,
        "notifications": [
            { "id": "n1", "type": "token_expiring", "platform": "spotify", "priority": "medium",
              "message": "Spotify expires in 3 days", "daysUntilExpiry": 3 },
            { "id": "n2", "type": "token_expired", "platform": "github", "priority": "high",
              "message": "GitHub expired" },
            { "id": "n3", "type": "weekly_digest", "platform": "none", "message": "hi" }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread"))
        .and(query_param("userId", "user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let notes = client.unread_notifications().await.expect("should parse");

    assert_eq!(notes.len(), 3);
    assert_eq!(notes[0].kind, NotificationKind::TokenExpiring);
    assert_eq!(notes[0].days_until_expiry, Some(3));
    assert_eq!(notes[1].kind, NotificationKind::TokenExpired);
    assert_eq!(notes[2].kind, NotificationKind::Other);
}

#[tokio::test]
async fn unread_notifications_skips_entries_it_cannot_read() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "success": true,
        "notifications": [
            { "id": "x", "type": "weekly_digest", "message": "hi" },
            { "id": "n2", "type": "token_expired", "platform": "github", "priority": "high",
              "message": "GitHub expired" },
            { "type": "token_expiring", "platform": "spotify" }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let notes = client
        .unread_notifications()
        .await
        .expect("a bad entry should not fail the batch");

    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, "n2");
    assert_eq!(notes[0].kind, NotificationKind::TokenExpired);
}

#[tokio::test]
async fn dismiss_posts_user_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/notifications/n1/dismiss"))
        .and(body_json(serde_json::json!({ "userId": "user-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    client.dismiss_notification("n1").await.expect("dismiss should succeed");
}

#[tokio::test]
async fn authorize_returns_expiry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/entertainment/connect/spotify"))
        .and(body_json(serde_json::json!({ "userId": "user-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "authUrl": "https://accounts.spotify.com/authorize?x=1",
            "expiresAt": "2026-11-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let response = client.authorize("spotify").await.expect("authorize");

    assert!(response.auth_url.is_some());
    assert_eq!(
        response.expires_at.map(|t| t.to_rfc3339()),
        Some("2026-11-01T00:00:00+00:00".to_string())
    );
}

#[tokio::test]
async fn authorize_failure_surfaces_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/entertainment/connect/spotify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "error": "OAuth not configured"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.authorize("spotify").await.unwrap_err();

    assert!(
        matches!(err, ClientError::Api(ref m) if m == "OAuth not configured"),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn revoke_uses_delete() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/oauth/disconnect/github"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    client.revoke("github").await.expect("revoke");
}

#[tokio::test]
async fn extract_returns_item_count() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/soul-data/extract/spotify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "platform": "spotify",
            "itemsExtracted": 250,
            "message": "done"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let response = client.extract("spotify").await.expect("extract");

    assert!(response.success);
    assert_eq!(response.items_extracted, Some(250));
    assert!(!response.requires_reauth);
}

#[tokio::test]
async fn extract_requires_reauth_is_ok() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/soul-data/extract/spotify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "platform": "spotify",
            "error": "TOKEN_EXPIRED",
            "requiresReauth": true,
            "message": "Please reconnect Spotify"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let response = client.extract("spotify").await.expect("reauth answer is not an error");

    assert!(response.requires_reauth);
    assert_eq!(response.error.as_deref(), Some("TOKEN_EXPIRED"));
}

#[tokio::test]
async fn extract_failure_surfaces_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/soul-data/extract/spotify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "message": "Extraction service unavailable"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.extract("spotify").await.unwrap_err();

    assert!(matches!(err, ClientError::Api(ref m) if m == "Extraction service unavailable"));
}

#[tokio::test]
async fn platform_status_parses_map() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/platforms/status"))
        .and(query_param("userId", "user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "platforms": {
                "spotify": { "connected": true, "tokenExpired": false, "expiresAt": "2026-11-01T00:00:00Z" },
                "github": { "connected": true, "tokenExpired": true }
            }
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let statuses = client.platform_status().await.expect("status");

    assert!(statuses["spotify"].is_healthy());
    assert!(!statuses["github"].is_healthy());
}

#[tokio::test]
async fn server_error_is_unexpected_status_and_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications/unread"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.unread_notifications().await.unwrap_err();

    assert!(matches!(err, ClientError::UnexpectedStatus { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_body_is_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/soul-data/extraction-status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.extraction_status().await.unwrap_err();

    assert!(matches!(err, ClientError::Deserialize { .. }));
    assert!(!err.is_transient());
}
