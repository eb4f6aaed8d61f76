use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Personal,
    Professional,
    Creative,
}

impl std::fmt::Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cluster::Personal => write!(f, "personal"),
            Cluster::Professional => write!(f, "professional"),
            Cluster::Creative => write!(f, "creative"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Identifier used on the wire, e.g. `spotify`.
    pub key: String,
    pub name: String,
    pub cluster: Cluster,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct PlatformsFile {
    pub platforms: Vec<PlatformConfig>,
}

impl PlatformsFile {
    /// Keys of enabled platforms, in file order.
    #[must_use]
    pub fn enabled_keys(&self) -> Vec<String> {
        self.platforms
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.key.clone())
            .collect()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PlatformConfig> {
        self.platforms.iter().find(|p| p.key == key)
    }
}

/// Load and validate the platform catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_platforms(path: &Path) -> Result<PlatformsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PlatformsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_platforms(&content)
}

/// Parse and validate catalog YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_platforms(content: &str) -> Result<PlatformsFile, ConfigError> {
    let file: PlatformsFile = serde_yaml::from_str(content)?;
    validate_platforms(&file)?;
    Ok(file)
}

fn validate_platforms(file: &PlatformsFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for platform in &file.platforms {
        if platform.key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "platform key must be non-empty".to_string(),
            ));
        }

        if !platform
            .key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "platform key '{}' must be lowercase ascii",
                platform.key
            )));
        }

        if platform.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "platform '{}' has an empty name",
                platform.key
            )));
        }

        if !seen.insert(platform.key.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate platform key: '{}'",
                platform.key
            )));
        }
    }

    Ok(())
}
