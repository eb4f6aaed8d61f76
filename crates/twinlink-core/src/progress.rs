//! Elapsed-time and time-remaining estimates for a multi-platform extraction.
//!
//! Pure functions: callers pass `now` so results are deterministic.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Remaining-time estimate shown before any platform has completed.
pub const PLACEHOLDER_REMAINING: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    /// Nothing has completed yet, so there is no rate to extrapolate from.
    Placeholder(Duration),
    Estimated(Duration),
}

impl Remaining {
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::Placeholder(d) | Self::Estimated(d) => d,
        }
    }
}

impl std::fmt::Display for Remaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Placeholder(d) => write!(f, "~{}", format_minutes_seconds(*d)),
            Self::Estimated(d) => f.write_str(&format_minutes_seconds(*d)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    pub elapsed: Duration,
    pub remaining: Remaining,
}

/// Estimates time remaining from the average time per completed unit.
///
/// A `start` in the future counts as zero elapsed time. `completed` larger
/// than `total` yields zero remaining.
#[must_use]
pub fn estimate(start: DateTime<Utc>, now: DateTime<Utc>, completed: u32, total: u32) -> Estimate {
    let elapsed = (now - start).to_std().unwrap_or(Duration::ZERO);
    if completed == 0 {
        return Estimate {
            elapsed,
            remaining: Remaining::Placeholder(PLACEHOLDER_REMAINING),
        };
    }
    let per_unit = elapsed / completed;
    let pending = total.saturating_sub(completed);
    Estimate {
        elapsed,
        remaining: Remaining::Estimated(per_unit.saturating_mul(pending)),
    }
}

/// Formats a duration as whole minutes and seconds, e.g. `"3m 07s"`.
#[must_use]
pub fn format_minutes_seconds(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}m {:02}s", secs / 60, secs % 60)
}

/// Percentage of `done` over `total`, rounded and clamped to `0..=100`.
///
/// Returns 0 for an empty total.
#[must_use]
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let pct = ((done as f64 / total as f64) * 100.0).round() as u8;
    pct.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn placeholder_when_nothing_completed() {
        let est = estimate(at(0), at(45), 0, 3);
        assert_eq!(est.elapsed, Duration::from_secs(45));
        assert_eq!(est.remaining, Remaining::Placeholder(PLACEHOLDER_REMAINING));
        assert_eq!(est.remaining.to_string(), "~2m 00s");
    }

    #[test]
    fn extrapolates_from_average_per_completed_platform() {
        // 2 of 5 done in 60s -> 30s each -> 90s for the remaining 3.
        let est = estimate(at(0), at(60), 2, 5);
        assert_eq!(est.remaining, Remaining::Estimated(Duration::from_secs(90)));
        assert_eq!(est.remaining.to_string(), "1m 30s");
    }

    #[test]
    fn all_done_means_zero_remaining() {
        let est = estimate(at(0), at(200), 4, 4);
        assert_eq!(est.remaining.duration(), Duration::ZERO);
    }

    #[test]
    fn over_completion_saturates() {
        let est = estimate(at(0), at(10), 5, 3);
        assert_eq!(est.remaining.duration(), Duration::ZERO);
    }

    #[test]
    fn clock_skew_counts_as_zero_elapsed() {
        let est = estimate(at(100), at(0), 1, 2);
        assert_eq!(est.elapsed, Duration::ZERO);
        assert_eq!(est.remaining.duration(), Duration::ZERO);
    }

    #[test]
    fn formats_whole_minutes_and_seconds() {
        assert_eq!(format_minutes_seconds(Duration::from_millis(187_900)), "3m 07s");
        assert_eq!(format_minutes_seconds(Duration::ZERO), "0m 00s");
    }

    #[test]
    fn percent_rounds_and_clamps() {
        assert_eq!(percent(40, 100), 40);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(150, 100), 100);
        assert_eq!(percent(5, 0), 0);
    }
}
