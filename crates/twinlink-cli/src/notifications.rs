//! Token expiry notification commands.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Context;
use twinlink_client::TwinClient;
use twinlink_core::{AppConfig, ExpiryFilter, ExpiryView, JustConnected, NotificationKind};
use twinlink_monitor::{ExpiryMonitor, MonitorHandle, PollSchedule};

use crate::shutdown_signal;

/// Single fetch of notifications and platform status, filtered and printed.
pub(crate) async fn run_once(
    client: &Arc<TwinClient>,
    just_connected: Option<String>,
) -> anyhow::Result<()> {
    let notifications = client
        .unread_notifications()
        .await
        .context("failed to fetch notifications")?;

    let mut filter = ExpiryFilter::new();
    match client.platform_status().await {
        Ok(statuses) => filter.update_statuses(statuses),
        Err(e) => tracing::warn!(error = %e, "platform status unavailable"),
    }
    if let Some(platform) = just_connected {
        filter.set_just_connected(JustConnected {
            platform,
            connected: true,
        });
    }
    filter.replace_remote(notifications);

    print!("{}", render_view(&filter.view()));
    Ok(())
}

/// Keeps the expiry monitor running and prints the view on every change.
pub(crate) async fn run_follow(
    config: &AppConfig,
    client: Arc<TwinClient>,
    just_connected: Option<String>,
) -> anyhow::Result<()> {
    let mut handle = MonitorHandle::new();
    let (monitor, task) = ExpiryMonitor::new(
        client,
        PollSchedule::every(config.notification_poll_interval()),
        handle.token(),
    );
    if let Some(platform) = just_connected {
        monitor
            .just_connected(JustConnected {
                platform,
                connected: true,
            })
            .await;
    }
    handle.spawn("expiry-monitor", task);

    let mut views = monitor.subscribe();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                print!("{}", render_view(&view));
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

pub(crate) async fn run_dismiss(client: &Arc<TwinClient>, id: &str) -> anyhow::Result<()> {
    client
        .dismiss_notification(id)
        .await
        .with_context(|| format!("failed to dismiss notification {id}"))?;
    println!("dismissed {id}");
    Ok(())
}

pub(crate) fn render_view(view: &ExpiryView) -> String {
    let Some(urgent) = &view.most_urgent else {
        return "no token warnings\n".to_string();
    };

    let label = match urgent.kind {
        NotificationKind::TokenExpired => "EXPIRED",
        _ => "expiring",
    };
    let mut out = format!("[{label}] {}: {}", urgent.platform, urgent.message);
    if let Some(days) = urgent.days_until_expiry {
        let _ = write!(out, " ({days}d left)");
    }
    let _ = writeln!(out, "  (dismiss with `twinlink dismiss {}`)", urgent.id);

    let others = view.visible.len().saturating_sub(1);
    if others > 0 {
        let _ = writeln!(out, "{others} more warning(s)");
    }
    out
}
