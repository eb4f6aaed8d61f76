//! `watch`: follows extraction progress from status polls and, when the
//! push channel is reachable, live job events.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use twinlink_client::{EventSocket, TwinClient};
use twinlink_core::{estimate, format_minutes_seconds, AppConfig, JobTracker, StatusBoard};
use twinlink_monitor::{
    pump_events, run_job_tracker, run_status_board, JobsSnapshot, MonitorHandle, PollSchedule,
};

use crate::shutdown_signal;

pub(crate) async fn run_watch(
    config: &AppConfig,
    client: Arc<TwinClient>,
    platforms: Vec<String>,
    with_events: bool,
) -> anyhow::Result<()> {
    if platforms.is_empty() {
        anyhow::bail!("no platforms to watch");
    }

    let mut handle = MonitorHandle::new();
    let started = Utc::now();

    let (board_tx, mut boards) = watch::channel(None);
    handle.spawn(
        "status-board",
        run_status_board(
            client,
            platforms.clone(),
            PollSchedule::every(config.status_poll_interval()),
            board_tx,
            handle.token(),
        ),
    );

    let (jobs_tx, mut jobs) = watch::channel(JobsSnapshot::default());
    let mut jobs_live = false;
    if with_events {
        match EventSocket::connect(&config.ws_url, &config.user_id).await {
            Ok(socket) => {
                let (tx, rx) = mpsc::channel(64);
                handle.spawn(
                    "job-tracker",
                    run_job_tracker(
                        JobTracker::new(config.visibility_policy()),
                        platforms.clone(),
                        rx,
                        jobs_tx,
                        handle.token(),
                    ),
                );
                handle.spawn("push-channel", pump_events(socket, tx, handle.token()));
                jobs_live = true;
            }
            Err(e) => {
                tracing::warn!(error = %e, "push channel unavailable, following status polls only");
            }
        }
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            changed = boards.changed() => {
                if changed.is_err() {
                    break;
                }
                let board = boards.borrow_and_update().clone();
                if let Some(board) = board {
                    print!("{}", render_board(&board, started, Utc::now()));
                    if board.is_complete() {
                        println!("all platforms extracted");
                        break;
                    }
                }
            }
            changed = jobs.changed(), if jobs_live => {
                if changed.is_err() {
                    jobs_live = false;
                    continue;
                }
                print!("{}", render_jobs(&jobs.borrow_and_update()));
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Overall line with elapsed and remaining time, then one row per platform.
pub(crate) fn render_board(board: &StatusBoard, started: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let completed = u32::try_from(board.completed_platforms()).unwrap_or(u32::MAX);
    let total = u32::try_from(board.platforms().len()).unwrap_or(u32::MAX);
    let est = estimate(started, now, completed, total);

    let mut out = format!(
        "overall {}% | elapsed {} | remaining {}\n",
        board.overall_progress(),
        format_minutes_seconds(est.elapsed),
        est.remaining,
    );
    for (platform, summary) in board.summaries() {
        let _ = writeln!(out, "  {platform:<18} {summary}");
    }
    out
}

pub(crate) fn render_jobs(snapshot: &JobsSnapshot) -> String {
    let mut out = String::new();
    for job in &snapshot.visible {
        let _ = write!(out, "  job {} {:<12} {}", job.job_id, job.platform, job.status);
        match (job.items_processed, job.progress_bar()) {
            (Some(done), Some(pct)) => {
                let _ = write!(out, " {done}/{} ({pct}%)", job.total_items.unwrap_or(done));
            }
            (Some(done), None) => {
                let _ = write!(out, " {done} items");
            }
            _ => {}
        }
        if let Some(error) = &job.error {
            let _ = write!(out, " error: {error}");
        } else if let Some(message) = &job.message {
            let _ = write!(out, " {message}");
        }
        out.push('\n');
    }
    out
}
