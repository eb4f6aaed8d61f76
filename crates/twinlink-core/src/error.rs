use thiserror::Error;

use crate::connection::{ConnectionEvent, ConnectionState};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read platforms file {path}: {source}")]
    PlatformsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse platforms file: {0}")]
    PlatformsFileParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// A connection event that has no edge from the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no transition for {event} from {from}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub event: ConnectionEvent,
}

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("failed to write onboarding flag {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode onboarding flag: {0}")]
    Encode(#[from] serde_json::Error),
}
