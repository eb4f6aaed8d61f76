//! Durable "onboarding tour completed" flag.
//!
//! Stored as a small JSON file in the state directory. A missing or
//! unreadable file reads as "not completed".

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OnboardingError;

const FILE_NAME: &str = "onboarding.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnboardingOutcome {
    Completed,
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingRecord {
    pub completed: bool,
    #[serde(default)]
    pub outcome: Option<OnboardingOutcome>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct OnboardingStore {
    path: PathBuf,
}

impl OnboardingStore {
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn load(&self) -> OnboardingRecord {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return OnboardingRecord::default();
        };
        match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "unreadable onboarding flag, treating as not completed");
                OnboardingRecord::default()
            }
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.load().completed
    }

    /// Marks the tour as finished, either completed or skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError`] if the state directory or file cannot be written.
    pub fn finish(
        &self,
        outcome: OnboardingOutcome,
        now: DateTime<Utc>,
    ) -> Result<OnboardingRecord, OnboardingError> {
        let record = OnboardingRecord {
            completed: true,
            outcome: Some(outcome),
            updated_at: Some(now),
        };
        self.write(&record)?;
        Ok(record)
    }

    /// Clears the flag so the tour shows again.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::Io`] if the file exists and cannot be removed.
    pub fn reset(&self) -> Result<(), OnboardingError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write(&self, record: &OnboardingRecord) -> Result<(), OnboardingError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let body = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.path, body).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> OnboardingError {
        OnboardingError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_not_completed() {
        let dir = tempfile::tempdir().unwrap();
        let store = OnboardingStore::new(dir.path());
        assert!(!store.is_completed());
    }

    #[test]
    fn finish_persists_and_reset_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = OnboardingStore::new(&dir.path().join("nested"));
        let now = Utc::now();
        let record = store.finish(OnboardingOutcome::Skipped, now).unwrap();
        assert!(record.completed);

        let reloaded = OnboardingStore::new(&dir.path().join("nested")).load();
        assert_eq!(reloaded.outcome, Some(OnboardingOutcome::Skipped));
        assert!(reloaded.completed);

        store.reset().unwrap();
        assert!(!store.is_completed());
        store.reset().unwrap();
    }

    #[test]
    fn corrupt_file_reads_as_not_completed() {
        let dir = tempfile::tempdir().unwrap();
        let store = OnboardingStore::new(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(!store.is_completed());
    }
}
