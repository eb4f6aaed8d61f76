//! Per-platform progress derived from the extraction-status poll.

use serde::{Deserialize, Serialize};

use crate::jobs::{overall_percent, PlatformSummary};
use crate::progress::percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusJobState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One entry of `recentJobs` in the extraction-status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusJobRow {
    pub platform: String,
    pub status: StatusJobState,
    #[serde(default)]
    pub processed_items: Option<u64>,
    #[serde(default)]
    pub total_items: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Snapshot of extraction progress across a platform set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBoard {
    platforms: Vec<String>,
    rows: Vec<StatusJobRow>,
}

impl StatusBoard {
    /// Builds a board for `platforms`. An empty platform list means "every
    /// platform that appears in `rows`", in first-seen order.
    #[must_use]
    pub fn new(platforms: &[String], rows: Vec<StatusJobRow>) -> Self {
        let platforms = if platforms.is_empty() {
            let mut seen = Vec::new();
            for row in &rows {
                if !seen.contains(&row.platform) {
                    seen.push(row.platform.clone());
                }
            }
            seen
        } else {
            platforms.to_vec()
        };
        Self { platforms, rows }
    }

    #[must_use]
    pub fn platforms(&self) -> &[String] {
        &self.platforms
    }

    #[must_use]
    pub fn completed_platforms(&self) -> usize {
        self.platforms
            .iter()
            .filter(|p| {
                self.rows
                    .iter()
                    .any(|r| &r.platform == *p && r.status == StatusJobState::Completed)
            })
            .count()
    }

    #[must_use]
    pub fn overall_progress(&self) -> u8 {
        overall_percent(self.completed_platforms(), self.platforms.len())
    }

    /// True once every platform has a completed job. An empty board is
    /// never complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.platforms.is_empty() && self.completed_platforms() == self.platforms.len()
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<(String, PlatformSummary)> {
        self.platforms
            .iter()
            .map(|p| (p.clone(), self.summarize(p)))
            .collect()
    }

    fn summarize(&self, platform: &str) -> PlatformSummary {
        let rows: Vec<&StatusJobRow> = self.rows.iter().filter(|r| r.platform == platform).collect();

        let completed: Vec<&&StatusJobRow> = rows
            .iter()
            .filter(|r| r.status == StatusJobState::Completed)
            .collect();
        if !completed.is_empty() {
            return PlatformSummary::Completed {
                jobs: completed.len(),
                items: completed.iter().filter_map(|r| r.processed_items).sum(),
            };
        }

        // recentJobs is newest-first, so the first running row is current.
        if let Some(running) = rows.iter().find(|r| r.status == StatusJobState::Running) {
            let done = running
                .processed_items
                .map(|d| running.total_items.map_or(d, |t| d.min(t)));
            return PlatformSummary::Running {
                items_processed: done,
                total_items: running.total_items,
                progress_bar: running
                    .total_items
                    .map(|total| percent(done.unwrap_or(0), total)),
            };
        }

        if let Some(failed) = rows.iter().find(|r| r.status == StatusJobState::Failed) {
            return PlatformSummary::Failed {
                error: failed.error_message.clone(),
            };
        }

        PlatformSummary::Pending
    }
}
