//! Token-expiry monitor task.
//!
//! Owns an [`ExpiryFilter`] and feeds it from two independent polls: unread
//! notifications and per-platform connection status. Dismissals take effect
//! locally at once; the remote dismiss is fire-and-forget.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use twinlink_core::{ExpiryFilter, ExpiryView, JustConnected};

use crate::poller::{PollSchedule, Poller};
use crate::sources::NotificationSource;

#[derive(Debug)]
enum Command {
    Dismiss(String),
    JustConnected(JustConnected),
}

/// Cloneable handle for talking to a running expiry monitor.
#[derive(Debug, Clone)]
pub struct ExpiryMonitor {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ExpiryView>,
}

impl ExpiryMonitor {
    /// Builds the handle and the task future; the caller spawns the latter.
    pub fn new<S>(
        source: Arc<S>,
        schedule: PollSchedule,
        cancel: CancellationToken,
    ) -> (Self, impl std::future::Future<Output = ()> + Send + 'static)
    where
        S: NotificationSource + ?Sized + 'static,
    {
        let (commands, rx) = mpsc::channel(32);
        let (publish, view) = watch::channel(ExpiryView::default());
        let task = run(source, schedule, rx, publish, cancel);
        (Self { commands, view }, task)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ExpiryView> {
        self.view.clone()
    }

    #[must_use]
    pub fn view(&self) -> ExpiryView {
        self.view.borrow().clone()
    }

    /// Hides `id` for the rest of the session. Returns `false` if the monitor
    /// has stopped.
    pub async fn dismiss(&self, id: impl Into<String>) -> bool {
        self.commands.send(Command::Dismiss(id.into())).await.is_ok()
    }

    /// Suppresses `marker.platform` for the next notification refresh.
    pub async fn just_connected(&self, marker: JustConnected) -> bool {
        self.commands
            .send(Command::JustConnected(marker))
            .await
            .is_ok()
    }
}

async fn run<S>(
    source: Arc<S>,
    schedule: PollSchedule,
    mut commands: mpsc::Receiver<Command>,
    publish: watch::Sender<ExpiryView>,
    cancel: CancellationToken,
) where
    S: NotificationSource + ?Sized + 'static,
{
    let mut filter = ExpiryFilter::new();
    let mut notifications = Poller::new("notifications", schedule);
    let mut statuses = Poller::new("platform-status", schedule);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            Some(command) = commands.recv() => match command {
                Command::Dismiss(id) => {
                    if filter.dismiss(&id) {
                        tracing::info!(notification_id = %id, "notification dismissed");
                        let source = Arc::clone(&source);
                        tokio::spawn(async move {
                            if let Err(e) = source.dismiss_notification(&id).await {
                                tracing::warn!(notification_id = %id, error = %e, "remote dismiss failed");
                            }
                        });
                    }
                }
                Command::JustConnected(marker) => {
                    tracing::debug!(platform = %marker.platform, "just-connected marker set");
                    filter.set_just_connected(marker);
                }
            },
            result = notifications.next(|| {
                let source = Arc::clone(&source);
                async move { source.unread_notifications().await }
            }) => match result {
                Ok(batch) => filter.replace_remote(batch),
                Err(e) => {
                    tracing::warn!(error = %e, "notification poll failed");
                    continue;
                }
            },
            result = statuses.next(|| {
                let source = Arc::clone(&source);
                async move { source.platform_status().await }
            }) => match result {
                Ok(map) => filter.update_statuses(map),
                Err(e) => {
                    tracing::warn!(error = %e, "platform status poll failed");
                    continue;
                }
            },
        }

        publish.send_if_modified(|current| {
            let next = filter.view();
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
