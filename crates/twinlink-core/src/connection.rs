//! Connection lifecycle for a single external platform.
//!
//! [`ConnectionState::next`] is the complete transition table; every edge not
//! listed there is rejected with [`InvalidTransition`]. [`PlatformConnection`]
//! wraps a state with the bookkeeping (sync time, token expiry, item count)
//! that changes alongside particular edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvalidTransition;

/// Lifecycle state of one platform connection.
///
/// The failure message lives inside [`ConnectionState::Error`], so a message
/// exists exactly when the connection is in the error state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Authorizing,
    /// Display-only: reported while an extraction call is in flight on a
    /// connected platform. Never stored as the machine state.
    Extracting,
    Connected,
    Error { message: String },
    TokenExpired,
    NeedsReauth,
}

impl ConnectionState {
    /// True while a connect or reconnect attempt owns the platform.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Authenticating | Self::Authorizing
        )
    }

    /// Returns the state reached by applying `event`, or the rejected edge.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when `event` has no edge from `self`.
    pub fn next(&self, event: &ConnectionEvent) -> Result<ConnectionState, InvalidTransition> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        let next = match (self, event) {
            (S::Disconnected | S::Error { .. }, E::Begin)
            | (S::TokenExpired | S::NeedsReauth, E::BeginReconnect) => S::Connecting,
            (S::Connecting, E::Authenticate) => S::Authenticating,
            (S::Authenticating, E::Authorize) => S::Authorizing,
            (S::Authorizing, E::Succeed { .. }) => S::Connected,
            (S::Connecting | S::Authenticating | S::Authorizing, E::Fail { message }) => S::Error {
                message: message.clone(),
            },
            (S::Connected, E::TokenExpired) => S::TokenExpired,
            (S::Connected, E::RequireReauth) => S::NeedsReauth,
            (S::Connected | S::TokenExpired | S::NeedsReauth, E::Disconnect) => S::Disconnected,
            _ => {
                return Err(InvalidTransition {
                    from: self.clone(),
                    event: event.clone(),
                })
            }
        };
        Ok(next)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Authorizing => write!(f, "authorizing"),
            Self::Extracting => write!(f, "extracting"),
            Self::Connected => write!(f, "connected"),
            Self::Error { .. } => write!(f, "error"),
            Self::TokenExpired => write!(f, "token_expired"),
            Self::NeedsReauth => write!(f, "needs_reauth"),
        }
    }
}

/// Inputs to the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// User-initiated connect or retry.
    Begin,
    /// User-initiated reconnect after the token lapsed.
    BeginReconnect,
    Authenticate,
    Authorize,
    Succeed {
        expires_at: Option<DateTime<Utc>>,
    },
    Fail {
        message: String,
    },
    /// External signal: the access token has expired.
    TokenExpired,
    /// External signal: the platform requires a fresh grant.
    RequireReauth,
    Disconnect,
}

impl std::fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::BeginReconnect => write!(f, "begin_reconnect"),
            Self::Authenticate => write!(f, "authenticate"),
            Self::Authorize => write!(f, "authorize"),
            Self::Succeed { .. } => write!(f, "succeed"),
            Self::Fail { .. } => write!(f, "fail"),
            Self::TokenExpired => write!(f, "token_expired"),
            Self::RequireReauth => write!(f, "require_reauth"),
            Self::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// One platform's connection record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformConnection {
    pub platform: String,
    #[serde(flatten)]
    pub state: ConnectionState,
    pub last_sync: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    pub data_count: u64,
    #[serde(skip)]
    extraction_in_flight: bool,
}

impl PlatformConnection {
    #[must_use]
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            state: ConnectionState::Disconnected,
            last_sync: None,
            expires_at: None,
            data_count: 0,
            extraction_in_flight: false,
        }
    }

    /// Rebuilds a connected record from backend status, e.g. at startup.
    #[must_use]
    pub fn connected(
        platform: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        last_sync: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            state: ConnectionState::Connected,
            expires_at,
            last_sync,
            ..Self::new(platform)
        }
    }

    /// Applies `event` at time `now`, updating the fields tied to the edge.
    ///
    /// `Succeed` stamps `last_sync` and records the token expiry; `Disconnect`
    /// clears the item count and expiry. A rejected event leaves the record
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when `event` has no edge from the
    /// current state.
    pub fn apply(
        &mut self,
        event: &ConnectionEvent,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        let next = self.state.next(event)?;
        match event {
            ConnectionEvent::Succeed { expires_at } => {
                self.last_sync = Some(now);
                self.expires_at = *expires_at;
            }
            ConnectionEvent::Disconnect => {
                self.data_count = 0;
                self.expires_at = None;
                self.extraction_in_flight = false;
            }
            ConnectionEvent::Fail { .. } => {
                self.expires_at = None;
            }
            _ => {}
        }
        self.state = next;
        Ok(())
    }

    /// Token expiry, reported only for states where it means something.
    #[must_use]
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        match self.state {
            ConnectionState::Connected
            | ConnectionState::TokenExpired
            | ConnectionState::NeedsReauth => self.expires_at,
            _ => None,
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// State to show the user, folding an in-flight extraction into
    /// [`ConnectionState::Extracting`].
    #[must_use]
    pub fn display_state(&self) -> ConnectionState {
        if self.extraction_in_flight && self.state == ConnectionState::Connected {
            ConnectionState::Extracting
        } else {
            self.state.clone()
        }
    }

    #[must_use]
    pub fn is_extracting(&self) -> bool {
        self.extraction_in_flight
    }

    /// Marks an extraction as started. Returns `false` unless the platform is
    /// connected and idle.
    pub fn begin_extraction(&mut self) -> bool {
        if self.state != ConnectionState::Connected || self.extraction_in_flight {
            return false;
        }
        self.extraction_in_flight = true;
        true
    }

    /// Clears the in-flight flag and folds a successful run's item count in.
    ///
    /// Returns `false` when the run no longer belongs to this record: the
    /// flag was already cleared or the platform left `connected` meanwhile.
    /// Nothing is folded in that case.
    pub fn finish_extraction(&mut self, items_extracted: Option<u64>, now: DateTime<Utc>) -> bool {
        let current = self.extraction_in_flight && self.state == ConnectionState::Connected;
        self.extraction_in_flight = false;
        if !current {
            return false;
        }
        if let Some(items) = items_extracted {
            self.data_count = self.data_count.saturating_add(items);
            self.last_sync = Some(now);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn fail(msg: &str) -> ConnectionEvent {
        ConnectionEvent::Fail {
            message: msg.to_string(),
        }
    }

    fn connected_record() -> PlatformConnection {
        let mut conn = PlatformConnection::new("spotify");
        for event in [
            ConnectionEvent::Begin,
            ConnectionEvent::Authenticate,
            ConnectionEvent::Authorize,
            ConnectionEvent::Succeed {
                expires_at: Some(now() + Duration::hours(1)),
            },
        ] {
            conn.apply(&event, now()).unwrap();
        }
        conn
    }

    #[test]
    fn happy_path_reaches_connected_and_stamps_sync() {
        let conn = connected_record();
        assert_eq!(conn.state, ConnectionState::Connected);
        assert_eq!(conn.last_sync, Some(now()));
        assert_eq!(conn.token_expiry(), Some(now() + Duration::hours(1)));
        assert!(conn.error_message().is_none());
    }

    #[test]
    fn each_in_flight_state_can_fail() {
        for prefix in [
            vec![ConnectionEvent::Begin],
            vec![ConnectionEvent::Begin, ConnectionEvent::Authenticate],
            vec![
                ConnectionEvent::Begin,
                ConnectionEvent::Authenticate,
                ConnectionEvent::Authorize,
            ],
        ] {
            let mut conn = PlatformConnection::new("github");
            for event in &prefix {
                conn.apply(event, now()).unwrap();
            }
            conn.apply(&fail("denied"), now()).unwrap();
            assert_eq!(conn.error_message(), Some("denied"));
        }
    }

    #[test]
    fn error_message_only_in_error_state() {
        let mut conn = PlatformConnection::new("github");
        conn.apply(&ConnectionEvent::Begin, now()).unwrap();
        conn.apply(&fail("boom"), now()).unwrap();
        assert!(conn.error_message().is_some());
        conn.apply(&ConnectionEvent::Begin, now()).unwrap();
        assert_eq!(conn.state, ConnectionState::Connecting);
        assert!(conn.error_message().is_none());
    }

    #[test]
    fn connect_is_rejected_while_in_flight() {
        let mut conn = PlatformConnection::new("github");
        conn.apply(&ConnectionEvent::Begin, now()).unwrap();
        let err = conn.apply(&ConnectionEvent::Begin, now()).unwrap_err();
        assert_eq!(err.from, ConnectionState::Connecting);
        assert_eq!(conn.state, ConnectionState::Connecting);
    }

    #[test]
    fn disconnect_clears_count_and_expiry() {
        let mut conn = connected_record();
        conn.data_count = 42;
        conn.apply(&ConnectionEvent::Disconnect, now()).unwrap();
        assert_eq!(conn.state, ConnectionState::Disconnected);
        assert_eq!(conn.data_count, 0);
        assert!(conn.token_expiry().is_none());
    }

    #[test]
    fn disconnect_rejected_from_disconnected_and_error() {
        let mut conn = PlatformConnection::new("spotify");
        assert!(conn.apply(&ConnectionEvent::Disconnect, now()).is_err());
        conn.apply(&ConnectionEvent::Begin, now()).unwrap();
        conn.apply(&fail("x"), now()).unwrap();
        assert!(conn.apply(&ConnectionEvent::Disconnect, now()).is_err());
    }

    #[test]
    fn reconnect_preserves_data_count() {
        let mut conn = connected_record();
        conn.data_count = 7;
        conn.apply(&ConnectionEvent::TokenExpired, now()).unwrap();
        assert_eq!(conn.state, ConnectionState::TokenExpired);
        conn.apply(&ConnectionEvent::BeginReconnect, now()).unwrap();
        assert_eq!(conn.state, ConnectionState::Connecting);
        assert_eq!(conn.data_count, 7);
    }

    #[test]
    fn reconnect_only_from_lapsed_token_states() {
        let mut conn = PlatformConnection::new("spotify");
        assert!(conn.apply(&ConnectionEvent::BeginReconnect, now()).is_err());
        let mut conn = connected_record();
        assert!(conn.apply(&ConnectionEvent::BeginReconnect, now()).is_err());
        conn.apply(&ConnectionEvent::RequireReauth, now()).unwrap();
        assert!(conn.apply(&ConnectionEvent::BeginReconnect, now()).is_ok());
    }

    #[test]
    fn connect_not_allowed_from_connected() {
        let mut conn = connected_record();
        assert!(conn.apply(&ConnectionEvent::Begin, now()).is_err());
        assert_eq!(conn.state, ConnectionState::Connected);
    }

    #[test]
    fn token_expiry_hidden_outside_meaningful_states() {
        let mut conn = connected_record();
        conn.apply(&ConnectionEvent::TokenExpired, now()).unwrap();
        assert!(conn.token_expiry().is_some());
        conn.apply(&ConnectionEvent::BeginReconnect, now()).unwrap();
        assert!(conn.token_expiry().is_none());
    }

    #[test]
    fn extracting_is_display_only() {
        let mut conn = connected_record();
        assert!(conn.begin_extraction());
        assert!(!conn.begin_extraction());
        assert_eq!(conn.state, ConnectionState::Connected);
        assert_eq!(conn.display_state(), ConnectionState::Extracting);
        assert!(conn.finish_extraction(Some(12), now()));
        assert_eq!(conn.display_state(), ConnectionState::Connected);
        assert_eq!(conn.data_count, 12);
    }

    #[test]
    fn late_extraction_result_is_not_folded_after_disconnect() {
        let mut conn = connected_record();
        let synced = conn.last_sync;
        assert!(conn.begin_extraction());
        conn.apply(&ConnectionEvent::Disconnect, now()).unwrap();

        assert!(!conn.finish_extraction(Some(30), now() + Duration::minutes(1)));
        assert_eq!(conn.state, ConnectionState::Disconnected);
        assert_eq!(conn.data_count, 0);
        assert_eq!(conn.last_sync, synced);
    }

    #[test]
    fn reauth_only_from_connected() {
        let mut conn = connected_record();
        conn.apply(&ConnectionEvent::TokenExpired, now()).unwrap();
        assert!(ConnectionState::TokenExpired
            .next(&ConnectionEvent::RequireReauth)
            .is_err());
        assert!(conn.apply(&ConnectionEvent::RequireReauth, now()).is_err());
        assert_eq!(conn.state, ConnectionState::TokenExpired);
        assert_eq!(
            ConnectionState::Connected.next(&ConnectionEvent::RequireReauth),
            Ok(ConnectionState::NeedsReauth)
        );
    }

    #[test]
    fn extraction_requires_connected() {
        let mut conn = PlatformConnection::new("spotify");
        assert!(!conn.begin_extraction());
    }

    #[test]
    fn extracting_state_has_no_outgoing_edges() {
        let state = ConnectionState::Extracting;
        assert!(state.next(&ConnectionEvent::Disconnect).is_err());
        assert!(state.next(&ConnectionEvent::Begin).is_err());
    }

    #[test]
    fn serializes_error_message_with_state_tag() {
        let mut conn = PlatformConnection::new("github");
        conn.apply(&ConnectionEvent::Begin, now()).unwrap();
        conn.apply(&fail("denied"), now()).unwrap();
        let json = serde_json::to_value(&conn).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["message"], "denied");
        assert_eq!(json["platform"], "github");
    }
}
