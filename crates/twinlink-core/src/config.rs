use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can use a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected a boolean, got '{other}'"),
            }),
        }
    };

    let user_id = require("TWINLINK_USER_ID")?;
    let env = parse_environment(&or_default("TWINLINK_ENV", "development"))?;

    let api_url = or_default("TWINLINK_API_URL", "http://localhost:3001/api");
    let ws_url = or_default("TWINLINK_WS_URL", "ws://localhost:3001/ws");
    let log_level = or_default("TWINLINK_LOG_LEVEL", "info");
    let platforms_path = PathBuf::from(or_default(
        "TWINLINK_PLATFORMS_PATH",
        "./config/platforms.yaml",
    ));
    let state_dir = PathBuf::from(or_default("TWINLINK_STATE_DIR", "./.twinlink"));

    let request_timeout_secs = parse_u64("TWINLINK_REQUEST_TIMEOUT_SECS", "30")?;
    let status_poll_interval_ms = parse_u64("TWINLINK_STATUS_POLL_INTERVAL_MS", "2000")?;
    let notification_poll_interval_secs =
        parse_u64("TWINLINK_NOTIFICATION_POLL_INTERVAL_SECS", "300")?;
    let job_retention_secs = parse_u64("TWINLINK_JOB_RETENTION_SECS", "10")?;
    let max_visible_jobs = parse_usize("TWINLINK_MAX_VISIBLE_JOBS", "5")?;
    let show_finished_jobs = parse_bool("TWINLINK_SHOW_FINISHED_JOBS", "false")?;

    if status_poll_interval_ms == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "TWINLINK_STATUS_POLL_INTERVAL_MS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    if notification_poll_interval_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "TWINLINK_NOTIFICATION_POLL_INTERVAL_SECS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(AppConfig {
        user_id,
        env,
        api_url,
        ws_url,
        log_level,
        platforms_path,
        state_dir,
        request_timeout_secs,
        status_poll_interval_ms,
        notification_poll_interval_secs,
        job_retention_secs,
        max_visible_jobs,
        show_finished_jobs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TWINLINK_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    /// Returns a map with all required env vars populated.
    fn full_env<'a>() -> HashMap<&'a str, &'a str> {
        let mut m = HashMap::new();
        m.insert("TWINLINK_USER_ID", "user-123");
        m
    }

    #[test]
    fn parse_environment_known_values() {
        assert_eq!(
            parse_environment("development").unwrap(),
            Environment::Development
        );
        assert_eq!(parse_environment("test").unwrap(), Environment::Test);
        assert_eq!(
            parse_environment("production").unwrap(),
            Environment::Production
        );
    }

    #[test]
    fn parse_environment_unknown_fails() {
        let err = parse_environment("staging").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "TWINLINK_ENV"));
    }

    #[test]
    fn build_app_config_fails_without_user_id() {
        let map: HashMap<&str, &str> = HashMap::new();
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "TWINLINK_USER_ID"),
            "expected MissingEnvVar(TWINLINK_USER_ID), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_rejects_blank_user_id() {
        let mut map = HashMap::new();
        map.insert("TWINLINK_USER_ID", "   ");
        let result = build_app_config(lookup_from_map(&map));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn build_app_config_succeeds_with_defaults() {
        let map = full_env();
        let cfg = build_app_config(lookup_from_map(&map)).expect("defaults should be valid");
        assert_eq!(cfg.user_id, "user-123");
        assert_eq!(cfg.env, Environment::Development);
        assert_eq!(cfg.api_url, "http://localhost:3001/api");
        assert_eq!(cfg.ws_url, "ws://localhost:3001/ws");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.request_timeout_secs, 30);
        assert_eq!(cfg.status_poll_interval_ms, 2000);
        assert_eq!(cfg.notification_poll_interval_secs, 300);
        assert_eq!(cfg.job_retention_secs, 10);
        assert_eq!(cfg.max_visible_jobs, 5);
        assert!(!cfg.show_finished_jobs);
    }

    #[test]
    fn visibility_policy_reflects_config() {
        let mut map = full_env();
        map.insert("TWINLINK_SHOW_FINISHED_JOBS", "true");
        map.insert("TWINLINK_MAX_VISIBLE_JOBS", "3");
        map.insert("TWINLINK_JOB_RETENTION_SECS", "30");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        let policy = cfg.visibility_policy();
        assert!(policy.show_finished);
        assert_eq!(policy.max_visible, 3);
        assert_eq!(policy.retention.as_secs(), 30);
    }

    #[test]
    fn invalid_poll_interval_is_rejected() {
        let mut map = full_env();
        map.insert("TWINLINK_STATUS_POLL_INTERVAL_MS", "soon");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "TWINLINK_STATUS_POLL_INTERVAL_MS"),
            "got: {result:?}"
        );
    }

    #[test]
    fn zero_notification_interval_is_rejected() {
        let mut map = full_env();
        map.insert("TWINLINK_NOTIFICATION_POLL_INTERVAL_SECS", "0");
        let result = build_app_config(lookup_from_map(&map));
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let mut map = full_env();
        map.insert("TWINLINK_SHOW_FINISHED_JOBS", "maybe");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "TWINLINK_SHOW_FINISHED_JOBS")
        );
    }

    #[test]
    fn debug_redacts_user_id() {
        let map = full_env();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("user-123"));
        assert!(rendered.contains("[redacted]"));
    }
}
