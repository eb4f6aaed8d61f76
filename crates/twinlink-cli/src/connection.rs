//! Connection command handlers.
//!
//! Each command rebuilds the platform's record from the backend's status
//! endpoint, then drives one controller operation and prints the result.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use twinlink_client::TwinClient;
use twinlink_core::{
    AppConfig, OnboardingStore, PlatformConnection, PlatformStatus, PlatformsFile,
};
use twinlink_monitor::{ConnectionController, Extraction, Outcome};

/// Builds a record that mirrors what the backend reports for `platform`.
///
/// An expired token counts as `token_expired` even when the backend no longer
/// reports the platform as connected, so `reconnect` stays available.
pub(crate) fn record_from_status(platform: &str, status: Option<&PlatformStatus>) -> PlatformConnection {
    let Some(status) = status.filter(|s| s.connected || s.token_expired) else {
        return PlatformConnection::new(platform);
    };
    let mut record = PlatformConnection::connected(platform, status.expires_at, status.last_sync);
    if status.token_expired {
        if let Err(e) = record.apply(&twinlink_core::ConnectionEvent::TokenExpired, Utc::now()) {
            tracing::debug!(platform, error = %e, "could not mark token expired");
        }
    }
    record
}

async fn resume(client: &Arc<TwinClient>, platform: &str) -> ConnectionController<TwinClient> {
    let statuses = match client.platform_status().await {
        Ok(statuses) => statuses,
        Err(e) => {
            tracing::warn!(platform, error = %e, "platform status unavailable, assuming disconnected");
            HashMap::new()
        }
    };
    let record = record_from_status(platform, statuses.get(platform));
    ConnectionController::with_record(record, Arc::clone(client))
}

pub(crate) async fn run_connect(client: &Arc<TwinClient>, platform: &str) -> anyhow::Result<()> {
    let controller = resume(client, platform).await;
    let outcome = controller
        .connect()
        .await
        .with_context(|| format!("could not connect {platform}"))?;
    report(&controller.snapshot(), outcome);
    Ok(())
}

pub(crate) async fn run_reconnect(client: &Arc<TwinClient>, platform: &str) -> anyhow::Result<()> {
    let controller = resume(client, platform).await;
    let outcome = controller
        .reconnect()
        .await
        .with_context(|| format!("could not reconnect {platform}"))?;
    report(&controller.snapshot(), outcome);
    Ok(())
}

pub(crate) async fn run_disconnect(client: &Arc<TwinClient>, platform: &str) -> anyhow::Result<()> {
    let controller = resume(client, platform).await;
    let outcome = controller.disconnect().await;
    report(&controller.snapshot(), outcome);
    Ok(())
}

pub(crate) async fn run_extract(client: &Arc<TwinClient>, platform: &str) -> anyhow::Result<()> {
    let controller = resume(client, platform).await;
    let result = controller
        .extract()
        .await
        .with_context(|| format!("extraction failed for {platform}"))?;
    match result {
        Extraction::Extracted { items } => {
            println!("{platform}: extracted {items} items");
        }
        Extraction::NeedsReauth => {
            println!("{platform}: authorization lapsed, run `twinlink reconnect {platform}`");
        }
        Extraction::Ignored => {
            println!("{}", format_connection(&controller.snapshot()));
            println!("{platform}: not connected, nothing extracted");
        }
    }
    Ok(())
}

pub(crate) async fn run_status(
    config: &AppConfig,
    client: &Arc<TwinClient>,
    catalog: &PlatformsFile,
    json: bool,
) -> anyhow::Result<()> {
    let statuses = client
        .platform_status()
        .await
        .context("failed to fetch platform status")?;

    let records: Vec<PlatformConnection> = catalog
        .enabled_keys()
        .iter()
        .map(|key| record_from_status(key, statuses.get(key)))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for record in &records {
        let name = catalog
            .get(&record.platform)
            .map_or(record.platform.as_str(), |p| p.name.as_str());
        println!("{name:<18} {}", format_connection(record));
    }

    let onboarding = OnboardingStore::new(&config.state_dir);
    let tour = if onboarding.is_completed() { "done" } else { "pending" };
    println!("\nonboarding tour: {tour}");
    Ok(())
}

fn report(record: &PlatformConnection, outcome: Outcome) {
    if outcome == Outcome::Ignored {
        println!("{}: nothing to do while {}", record.platform, record.state);
    }
    println!("{}", format_connection(record));
}

/// One-line summary such as `spotify: connected, 120 items, synced 2026-10-01 12:00 UTC`.
pub(crate) fn format_connection(record: &PlatformConnection) -> String {
    let mut line = format!("{}: {}", record.platform, record.display_state());
    if let Some(message) = record.error_message() {
        let _ = write!(line, " ({message})");
    }
    if record.data_count > 0 {
        let _ = write!(line, ", {} items", record.data_count);
    }
    if let Some(synced) = record.last_sync {
        let _ = write!(line, ", synced {}", fmt_time(synced));
    }
    if let Some(expiry) = record.token_expiry() {
        let _ = write!(line, ", token expires {}", fmt_time(expiry));
    }
    line
}

fn fmt_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}
