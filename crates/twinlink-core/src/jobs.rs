//! Extraction job tracking driven by push-channel lifecycle events.
//!
//! [`JobTracker`] is an arena of jobs addressed by id. Finished jobs that the
//! [`VisibilityPolicy`] hides carry an eviction deadline and are removed by
//! [`JobTracker::sweep`], which the owner calls on a fixed cadence. Eviction
//! only affects the job list: per-platform completions and failures are kept
//! in a separate history that progress and summaries are computed from.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::percent;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_VISIBLE: usize = 5;

/// Lifecycle events carried over the push channel, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtractionEvent {
    #[serde(rename = "extraction_started", rename_all = "camelCase")]
    Started {
        job_id: String,
        platform: String,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "extraction_update", rename_all = "camelCase")]
    Update {
        job_id: String,
        #[serde(default)]
        items_processed: Option<u64>,
        #[serde(default)]
        total_items: Option<u64>,
        #[serde(default)]
        progress: Option<f64>,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "extraction_completed", rename_all = "camelCase")]
    Completed {
        job_id: String,
        #[serde(default)]
        items_extracted: Option<u64>,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "extraction_failed", rename_all = "camelCase")]
    Failed {
        job_id: String,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl ExtractionEvent {
    #[must_use]
    pub fn job_id(&self) -> &str {
        match self {
            Self::Started { job_id, .. }
            | Self::Update { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => job_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Started,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionJob {
    pub job_id: String,
    pub platform: String,
    pub status: JobStatus,
    pub items_processed: Option<u64>,
    pub total_items: Option<u64>,
    pub progress_percent: u8,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub error: Option<String>,
    /// Eviction deadline; set only for finished jobs the policy hides.
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ExtractionJob {
    /// Progress bar percentage, available only when the total is known.
    #[must_use]
    pub fn progress_bar(&self) -> Option<u8> {
        self.total_items.map(|_| self.progress_percent)
    }

    fn set_counters(&mut self, processed: Option<u64>, total: Option<u64>, progress: Option<f64>) {
        if total.is_some() {
            self.total_items = total;
        }
        if processed.is_some() {
            self.items_processed = processed;
        }
        if let (Some(done), Some(total)) = (self.items_processed, self.total_items) {
            let done = done.min(total);
            self.items_processed = Some(done);
            self.progress_percent = percent(done, total);
        } else if let Some(p) = progress {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let p = p.round().clamp(0.0, 100.0) as u8;
            self.progress_percent = p;
        }
    }
}

/// Caller preference for finished jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityPolicy {
    /// Keep completed and failed jobs visible indefinitely.
    pub show_finished: bool,
    pub max_visible: usize,
    /// How long a hidden finished job lingers before eviction.
    pub retention: Duration,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self {
            show_finished: false,
            max_visible: DEFAULT_MAX_VISIBLE,
            retention: DEFAULT_RETENTION,
        }
    }
}

/// What [`JobTracker::apply`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Updated,
    /// Unknown id, duplicate start, or an event for a finished job.
    Dropped,
}

/// Per-platform roll-up for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformSummary {
    Pending,
    Running {
        items_processed: Option<u64>,
        total_items: Option<u64>,
        progress_bar: Option<u8>,
    },
    Completed {
        jobs: usize,
        items: u64,
    },
    Failed {
        error: Option<String>,
    },
}

impl std::fmt::Display for PlatformSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running {
                items_processed,
                total_items,
                progress_bar,
            } => match (items_processed, total_items, progress_bar) {
                (Some(done), Some(total), Some(pct)) => {
                    write!(f, "{done}/{total} items ({pct}%)")
                }
                (Some(done), _, _) => write!(f, "{done} items"),
                _ => write!(f, "running"),
            },
            Self::Completed { items, .. } => write!(f, "\u{2713} {items} items"),
            Self::Failed { error } => match error {
                Some(e) => write!(f, "failed: {e}"),
                None => write!(f, "failed"),
            },
        }
    }
}

/// Finished-job outcomes for one platform.
#[derive(Debug, Clone, Default)]
struct PlatformHistory {
    completed_jobs: usize,
    items: u64,
    /// Error of the most recent failed job, if any job failed.
    last_failure: Option<Option<String>>,
}

#[derive(Debug, Default)]
pub struct JobTracker {
    jobs: HashMap<String, ExtractionJob>,
    history: HashMap<String, PlatformHistory>,
    policy: VisibilityPolicy,
}

impl JobTracker {
    #[must_use]
    pub fn new(policy: VisibilityPolicy) -> Self {
        Self {
            jobs: HashMap::new(),
            history: HashMap::new(),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> VisibilityPolicy {
        self.policy
    }

    #[must_use]
    pub fn get(&self, job_id: &str) -> Option<&ExtractionJob> {
        self.jobs.get(job_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Applies one lifecycle event at time `now`.
    pub fn apply(&mut self, event: ExtractionEvent, now: DateTime<Utc>) -> Applied {
        match event {
            ExtractionEvent::Started {
                job_id,
                platform,
                message,
            } => {
                if self.jobs.contains_key(&job_id) {
                    tracing::debug!(job_id = %job_id, "duplicate extraction_started dropped");
                    return Applied::Dropped;
                }
                let job = ExtractionJob {
                    job_id: job_id.clone(),
                    platform,
                    status: JobStatus::Started,
                    items_processed: None,
                    total_items: None,
                    progress_percent: 0,
                    started_at: now,
                    completed_at: None,
                    message,
                    error: None,
                    expires_at: None,
                };
                self.jobs.insert(job_id, job);
                Applied::Inserted
            }
            ExtractionEvent::Update {
                job_id,
                items_processed,
                total_items,
                progress,
                message,
            } => {
                let Some(job) = self.live_job(&job_id) else {
                    return Applied::Dropped;
                };
                job.status = JobStatus::Running;
                job.set_counters(items_processed, total_items, progress);
                if message.is_some() {
                    job.message = message;
                }
                Applied::Updated
            }
            ExtractionEvent::Completed {
                job_id,
                items_extracted,
                message,
            } => {
                let policy = self.policy;
                let Some(job) = self.live_job(&job_id) else {
                    return Applied::Dropped;
                };
                job.status = JobStatus::Completed;
                if let Some(items) = items_extracted {
                    job.items_processed = Some(items);
                }
                job.progress_percent = 100;
                job.completed_at = Some(now);
                if message.is_some() {
                    job.message = message;
                }
                job.expires_at = eviction_deadline(policy, now);
                let (platform, items) = (job.platform.clone(), job.items_processed.unwrap_or(0));
                let history = self.history.entry(platform).or_default();
                history.completed_jobs += 1;
                history.items = history.items.saturating_add(items);
                Applied::Updated
            }
            ExtractionEvent::Failed {
                job_id,
                error,
                message,
            } => {
                let policy = self.policy;
                let Some(job) = self.live_job(&job_id) else {
                    return Applied::Dropped;
                };
                job.status = JobStatus::Failed;
                job.error = error;
                job.completed_at = Some(now);
                if message.is_some() {
                    job.message = message;
                }
                job.expires_at = eviction_deadline(policy, now);
                let (platform, error) = (job.platform.clone(), job.error.clone());
                self.history.entry(platform).or_default().last_failure = Some(error);
                Applied::Updated
            }
        }
    }

    /// Evicts finished jobs whose retention window has passed. Returns the
    /// number of jobs removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| match job.expires_at {
            Some(deadline) => !(job.status.is_finished() && deadline <= now),
            None => true,
        });
        before - self.jobs.len()
    }

    /// Jobs to display at `now`: policy filter first, then newest first, then
    /// the cap. A finished job the policy hides stays visible only until its
    /// retention deadline, even if it has not been swept yet.
    #[must_use]
    pub fn visible_jobs(&self, now: DateTime<Utc>) -> Vec<&ExtractionJob> {
        let show_finished = self.policy.show_finished;
        let mut visible: Vec<&ExtractionJob> = self
            .jobs
            .values()
            .filter(|job| {
                !job.status.is_finished()
                    || show_finished
                    || job.expires_at.is_some_and(|deadline| deadline > now)
            })
            .collect();
        visible.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        visible.truncate(self.policy.max_visible);
        visible
    }

    /// Percentage of `platforms` with at least one completed job.
    #[must_use]
    pub fn overall_progress(&self, platforms: &[String]) -> u8 {
        let completed = platforms
            .iter()
            .filter(|p| self.platform_completed(p))
            .count();
        overall_percent(completed, platforms.len())
    }

    #[must_use]
    pub fn platform_completed(&self, platform: &str) -> bool {
        self.history
            .get(platform)
            .is_some_and(|history| history.completed_jobs > 0)
    }

    /// One summary row per requested platform, in the given order.
    #[must_use]
    pub fn platform_summaries(&self, platforms: &[String]) -> Vec<(String, PlatformSummary)> {
        platforms
            .iter()
            .map(|p| (p.clone(), self.summarize(p)))
            .collect()
    }

    fn summarize(&self, platform: &str) -> PlatformSummary {
        let history = self.history.get(platform);
        if let Some(history) = history.filter(|h| h.completed_jobs > 0) {
            return PlatformSummary::Completed {
                jobs: history.completed_jobs,
                items: history.items,
            };
        }

        if let Some(active) = self
            .jobs
            .values()
            .filter(|job| job.platform == platform && !job.status.is_finished())
            .max_by_key(|job| job.started_at)
        {
            return PlatformSummary::Running {
                items_processed: active.items_processed,
                total_items: active.total_items,
                progress_bar: active.progress_bar(),
            };
        }

        match history.and_then(|h| h.last_failure.clone()) {
            Some(error) => PlatformSummary::Failed { error },
            None => PlatformSummary::Pending,
        }
    }

    fn live_job(&mut self, job_id: &str) -> Option<&mut ExtractionJob> {
        match self.jobs.get_mut(job_id) {
            Some(job) if job.status.is_finished() => {
                tracing::debug!(job_id = %job_id, "event for finished job dropped");
                None
            }
            Some(job) => Some(job),
            None => {
                tracing::debug!(job_id = %job_id, "event for untracked job dropped");
                None
            }
        }
    }
}

/// `100 * completed / total`, rounded; 0 for an empty platform set.
#[must_use]
pub fn overall_percent(completed: usize, total: usize) -> u8 {
    percent(
        u64::try_from(completed).unwrap_or(u64::MAX),
        u64::try_from(total).unwrap_or(u64::MAX),
    )
}

fn eviction_deadline(policy: VisibilityPolicy, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if policy.show_finished {
        return None;
    }
    chrono::Duration::from_std(policy.retention)
        .ok()
        .and_then(|retention| now.checked_add_signed(retention))
}
