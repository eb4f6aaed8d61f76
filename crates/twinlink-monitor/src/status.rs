//! Polls extraction status until every platform has a completed job.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use twinlink_core::StatusBoard;

use crate::poller::{PollSchedule, Poller};
use crate::sources::StatusSource;

/// Publishes a fresh [`StatusBoard`] after every successful poll and returns
/// once the board reports complete or `cancel` fires. Failed polls are
/// logged and leave the last board in place.
pub async fn run_status_board<S>(
    source: Arc<S>,
    platforms: Vec<String>,
    schedule: PollSchedule,
    publish: watch::Sender<Option<StatusBoard>>,
    cancel: CancellationToken,
) where
    S: StatusSource + ?Sized + 'static,
{
    let mut poller = Poller::new("extraction-status", schedule);
    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => return,
            result = poller.next(|| {
                let source = Arc::clone(&source);
                async move { source.extraction_status().await }
            }) => result,
        };

        match result {
            Ok(rows) => {
                let board = StatusBoard::new(&platforms, rows);
                let complete = board.is_complete();
                tracing::debug!(progress = board.overall_progress(), "extraction status refreshed");
                publish.send_replace(Some(board));
                if complete {
                    tracing::info!("all platforms extracted, status polling stopped");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "extraction status poll failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use twinlink_client::ClientError;
    use twinlink_core::{StatusJobRow, StatusJobState};

    use super::*;

    /// Reports one more completed platform per call, failing on the second.
    struct ScriptedStatus {
        calls: AtomicUsize,
    }

    fn row(platform: &str, status: StatusJobState) -> StatusJobRow {
        StatusJobRow {
            platform: platform.to_string(),
            status,
            processed_items: None,
            total_items: None,
            error_message: None,
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedStatus {
        async fn extraction_status(&self) -> Result<Vec<StatusJobRow>, ClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match call {
                0 => Ok(vec![
                    row("spotify", StatusJobState::Completed),
                    row("github", StatusJobState::Running),
                ]),
                1 => Err(ClientError::UnexpectedStatus {
                    status: 502,
                    url: "http://backend/status".to_string(),
                }),
                _ => Ok(vec![
                    row("spotify", StatusJobState::Completed),
                    row("github", StatusJobState::Completed),
                ]),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_complete_and_survives_failures() {
        let source = Arc::new(ScriptedStatus {
            calls: AtomicUsize::new(0),
        });
        let (publish, boards) = watch::channel(None);

        run_status_board(
            Arc::clone(&source),
            vec!["spotify".to_string(), "github".to_string()],
            PollSchedule::every(Duration::from_secs(2)),
            publish,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        let board = boards.borrow().clone().expect("board published");
        assert!(board.is_complete());
        assert_eq!(board.overall_progress(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let source = Arc::new(ScriptedStatus {
            calls: AtomicUsize::new(0),
        });
        let (publish, _boards) = watch::channel(None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        run_status_board(
            source,
            vec!["spotify".to_string()],
            PollSchedule::every(Duration::from_secs(2)),
            publish,
            cancel,
        )
        .await;
    }
}
