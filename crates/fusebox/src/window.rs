//! Sliding windows over recent call outcomes.
//!
//! Two variants: [`CountWindow`] keeps the last N outcomes in a ring with
//! running sums, [`TimeWindow`] keeps one-second buckets covering the last N
//! seconds. Both record and aggregate in constant time (the time window
//! amortized: recycling stale buckets touches at most N buckets after a long
//! silence).

use crate::outcome::{Metric, Outcome};
use std::collections::VecDeque;

/// A sliding window over recent outcomes, either count- or time-bounded.
#[derive(Debug, Clone)]
pub enum SlidingWindow {
    /// Last N outcomes.
    Count(CountWindow),
    /// Last N seconds, bucketed per second.
    Time(TimeWindow),
}

impl SlidingWindow {
    /// A window over the last `size` outcomes.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn count(size: usize) -> Self {
        SlidingWindow::Count(CountWindow::new(size))
    }

    /// A window over the last `seconds` seconds.
    ///
    /// # Panics
    ///
    /// Panics if `seconds` is zero.
    pub fn time(seconds: u64) -> Self {
        SlidingWindow::Time(TimeWindow::new(seconds))
    }

    /// Adds an outcome to the window.
    pub fn record(&mut self, outcome: Outcome) {
        match self {
            SlidingWindow::Count(w) => w.record(outcome),
            SlidingWindow::Time(w) => w.record(outcome),
        }
    }

    /// Aggregates the currently-held outcomes, as seen at `now` (seconds
    /// since the epoch; only the time variant looks at it).
    pub fn metric(&self, now: f64) -> Metric {
        match self {
            SlidingWindow::Count(w) => w.metric(),
            SlidingWindow::Time(w) => w.metric(now),
        }
    }

    /// Drops every held outcome and zeroes the running sums.
    pub fn reset(&mut self) {
        match self {
            SlidingWindow::Count(w) => w.reset(),
            SlidingWindow::Time(w) => w.reset(),
        }
    }
}

impl From<CountWindow> for SlidingWindow {
    fn from(w: CountWindow) -> Self {
        SlidingWindow::Count(w)
    }
}

impl From<TimeWindow> for SlidingWindow {
    fn from(w: TimeWindow) -> Self {
        SlidingWindow::Time(w)
    }
}

/// Fixed-capacity ring over the last N outcomes with running sums.
///
/// Recording at capacity evicts exactly the oldest outcome, subtracting its
/// contribution from the sums before the new outcome is added. The sums
/// always equal the aggregate of the held outcomes.
#[derive(Debug, Clone)]
pub struct CountWindow {
    capacity: usize,
    records: VecDeque<Outcome>,
    sums: Metric,
}

impl CountWindow {
    /// Creates a window holding the last `capacity` outcomes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "CountWindow capacity must be greater than zero");
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
            sums: Metric::default(),
        }
    }

    /// Adds an outcome, evicting the oldest if the window is full.
    pub fn record(&mut self, outcome: Outcome) {
        if self.records.len() == self.capacity {
            if let Some(evicted) = self.records.pop_front() {
                self.sums.subtract(&evicted);
            }
        }
        self.sums.add(&outcome);
        self.records.push_back(outcome);
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The aggregate over the held outcomes.
    pub fn metric(&self) -> Metric {
        self.sums
    }

    /// Drops every held outcome.
    pub fn reset(&mut self) {
        self.records.clear();
        self.sums = Metric::default();
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    epoch: u64,
    total: u64,
    failure: u64,
    slow: u64,
    duration: f64,
}

impl Bucket {
    fn clear_for(&mut self, epoch: u64) {
        *self = Bucket {
            epoch,
            ..Bucket::default()
        };
    }
}

/// Ring of one-second buckets covering the last N seconds.
///
/// Each bucket aggregates the outcomes whose timestamp floors to its epoch
/// second. Recording into a fresh second recycles whatever stale bucket
/// occupies its slot; outcomes older than the window are dropped silently.
#[derive(Debug, Clone)]
pub struct TimeWindow {
    size: u64,
    buckets: Vec<Bucket>,
    latest_epoch: u64,
}

impl TimeWindow {
    /// Creates a window covering the last `seconds` seconds.
    ///
    /// # Panics
    ///
    /// Panics if `seconds` is zero.
    pub fn new(seconds: u64) -> Self {
        assert!(seconds > 0, "TimeWindow span must be greater than zero");
        Self {
            size: seconds,
            buckets: vec![Bucket::default(); seconds as usize],
            latest_epoch: 0,
        }
    }

    /// Adds an outcome, bucketed by the floor of its own timestamp.
    pub fn record(&mut self, outcome: Outcome) {
        let epoch = outcome.timestamp.max(0.0) as u64;
        if epoch + self.size <= self.latest_epoch {
            // Older than anything the window can still represent.
            return;
        }
        self.latest_epoch = self.latest_epoch.max(epoch);

        let index = (epoch % self.size) as usize;
        let bucket = &mut self.buckets[index];
        if bucket.epoch < epoch {
            bucket.clear_for(epoch);
        } else if bucket.epoch > epoch {
            return;
        }

        bucket.total += 1;
        if !outcome.success {
            bucket.failure += 1;
        }
        if outcome.slow {
            bucket.slow += 1;
        }
        bucket.duration += outcome.duration;
    }

    /// The configured span in seconds.
    pub fn span_secs(&self) -> u64 {
        self.size
    }

    /// Aggregates the buckets whose epoch lies in `[now - N + 1, now]`.
    pub fn metric(&self, now: f64) -> Metric {
        let now_sec = now.max(0.0) as u64;
        let oldest = now_sec.saturating_sub(self.size - 1);

        let mut metric = Metric::default();
        for bucket in &self.buckets {
            if bucket.total == 0 || bucket.epoch < oldest || bucket.epoch > now_sec {
                continue;
            }
            metric.total_count += bucket.total;
            metric.failure_count += bucket.failure;
            metric.slow_count += bucket.slow;
            metric.total_duration += bucket.duration;
        }
        metric
    }

    /// Clears every bucket.
    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Bucket::default();
        }
        self.latest_epoch = 0;
    }
}
