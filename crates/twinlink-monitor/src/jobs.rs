//! Task owning the [`JobTracker`]: applies push-channel events in arrival
//! order, sweeps expired jobs on a fixed cadence and publishes snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use twinlink_client::EventSocket;
use twinlink_core::{Applied, ExtractionEvent, ExtractionJob, JobTracker, PlatformSummary};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// What observers see after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobsSnapshot {
    pub visible: Vec<ExtractionJob>,
    pub overall_progress: u8,
    pub platforms: Vec<(String, PlatformSummary)>,
}

impl JobsSnapshot {
    fn capture(tracker: &JobTracker, platforms: &[String], now: DateTime<Utc>) -> Self {
        Self {
            visible: tracker.visible_jobs(now).into_iter().cloned().collect(),
            overall_progress: tracker.overall_progress(platforms),
            platforms: tracker.platform_summaries(platforms),
        }
    }
}

/// Consumes `events` until the sender side closes or `cancel` fires.
pub async fn run_job_tracker(
    mut tracker: JobTracker,
    platforms: Vec<String>,
    mut events: mpsc::Receiver<ExtractionEvent>,
    publish: watch::Sender<JobsSnapshot>,
    cancel: CancellationToken,
) {
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("extraction event stream closed");
                    break;
                };
                let job_id = event.job_id().to_string();
                let now = Utc::now();
                match tracker.apply(event, now) {
                    Applied::Dropped => {
                        tracing::debug!(job_id = %job_id, "event for unknown or finished job dropped");
                    }
                    Applied::Inserted | Applied::Updated => {
                        publish.send_replace(JobsSnapshot::capture(&tracker, &platforms, now));
                    }
                }
            }
            _ = sweep.tick() => {
                let now = Utc::now();
                let evicted = tracker.sweep(now);
                if evicted > 0 {
                    tracing::debug!(evicted, "expired jobs evicted");
                    publish.send_replace(JobsSnapshot::capture(&tracker, &platforms, now));
                }
            }
        }
    }
}

/// Forwards events from the push channel into the tracker's queue.
///
/// Ends when the server closes the channel, the socket errors, the tracker
/// goes away or `cancel` fires. There is no automatic reconnect.
pub async fn pump_events(
    mut socket: EventSocket,
    tx: mpsc::Sender<ExtractionEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                socket.close().await;
                return;
            }
            next = socket.next_event() => match next {
                Ok(Some(event)) => {
                    if tx.send(event).await.is_err() {
                        tracing::debug!("job tracker gone, stopping push channel");
                        socket.close().await;
                        return;
                    }
                }
                Ok(None) => {
                    tracing::info!("push channel closed by server");
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "push channel failed");
                    return;
                }
            },
        }
    }
}
