//! Fixed-cadence polling with in-flight tracking and sequence gating.
//!
//! Each tick launches the fetch as its own task, so a slow network call never
//! delays the timer. While a fetch is outstanding further ticks are skipped;
//! once it has been outstanding for longer than `stale_after` a new fetch is
//! started anyway. Responses are numbered in launch order and a
//! [`SequenceGate`] drops any that arrive after a newer one was applied, so
//! the newest-started fetch always wins.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Admits strictly increasing sequence numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceGate {
    last_applied: Option<u64>,
}

impl SequenceGate {
    /// Returns `true` (and records `seq`) if it is newer than anything applied.
    pub fn admit(&mut self, seq: u64) -> bool {
        if self.last_applied.is_some_and(|last| seq <= last) {
            return false;
        }
        self.last_applied = Some(seq);
        true
    }

    #[must_use]
    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    /// How long an outstanding fetch suppresses new ticks.
    pub stale_after: Duration,
}

impl PollSchedule {
    /// `interval` cadence; a fetch is considered stalled after three intervals.
    #[must_use]
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            stale_after: interval.saturating_mul(3),
        }
    }
}

/// Drives one polled resource.
///
/// [`Poller::next`] is cancel-safe: it may be used as a `tokio::select!`
/// branch and dropped at any await point without losing a response.
pub struct Poller<T> {
    name: &'static str,
    schedule: PollSchedule,
    ticker: Interval,
    tx: mpsc::UnboundedSender<(u64, T)>,
    rx: mpsc::UnboundedReceiver<(u64, T)>,
    next_seq: u64,
    in_flight: Option<(u64, Instant)>,
    gate: SequenceGate,
}

impl<T: Send + 'static> Poller<T> {
    /// The first tick fires immediately.
    #[must_use]
    pub fn new(name: &'static str, schedule: PollSchedule) -> Self {
        let mut ticker = tokio::time::interval(schedule.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name,
            schedule,
            ticker,
            tx,
            rx,
            next_seq: 0,
            in_flight: None,
            gate: SequenceGate::default(),
        }
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Launches fetches on the cadence and returns the next admitted response.
    pub async fn next<F, Fut>(&mut self, mut fetch: F) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        loop {
            tokio::select! {
                _ = self.ticker.tick() => {
                    if let Some((seq, started)) = self.in_flight {
                        if started.elapsed() < self.schedule.stale_after {
                            tracing::debug!(poller = self.name, seq, "fetch in flight, skipping tick");
                            continue;
                        }
                        tracing::warn!(poller = self.name, seq, "fetch stalled, starting another");
                    }
                    self.launch(fetch());
                }
                Some((seq, value)) = self.rx.recv() => {
                    if self.in_flight.is_some_and(|(current, _)| current == seq) {
                        self.in_flight = None;
                    }
                    if self.gate.admit(seq) {
                        return value;
                    }
                    tracing::debug!(poller = self.name, seq, "dropping out-of-sequence response");
                }
            }
        }
    }

    fn launch<Fut>(&mut self, fut: Fut)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.in_flight = Some((seq, Instant::now()));
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let value = fut.await;
            // The receiver is gone only when the poller itself was dropped.
            let _ = tx.send((seq, value));
        });
    }
}
