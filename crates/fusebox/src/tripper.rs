//! Transition predicates.
//!
//! A [`Tripper`] looks at the current state and the window aggregate and
//! decides whether the breaker should transition. Leaves test one quantity
//! each; `and`/`or` (also the `&` and `|` operators) compose them,
//! short-circuiting left to right.
//!
//! A tripper that evaluates to true in `Closed` opens the circuit; one that
//! evaluates to true in `HalfOpen` re-opens it. A non-tripping outcome in
//! `HalfOpen` closes the circuit once the window holds at least as many
//! outcomes as the largest `MinRequests` threshold anywhere in the tree
//! (immediately, if the tree has none).
//!
//! ```rust
//! use fusebox::Tripper;
//! use std::time::Duration;
//!
//! let tripper = (Tripper::min_requests(10) & Tripper::failure_rate(0.5))
//!     | (Tripper::half_opened() & Tripper::failure_rate(0.5))
//!     | Tripper::avg_latency(Duration::from_secs(2));
//! # let _ = tripper;
//! ```

use crate::outcome::Metric;
use crate::state::CircuitState;
use std::ops;
use std::time::Duration;

/// Predicate over `(state, metric)` deciding automatic transitions.
#[derive(Debug, Clone)]
pub enum Tripper {
    /// The breaker is currently `Closed`.
    Closed,
    /// The breaker is currently `HalfOpen`.
    HalfOpened,
    /// The window holds at least this many outcomes.
    MinRequests(u64),
    /// The failure rate is at least this threshold.
    FailureRate(f64),
    /// The mean call duration is at least this threshold.
    AvgLatency(Duration),
    /// The slow-call rate is at least this threshold.
    SlowRate(f64),
    /// Both operands hold; the right side is skipped when the left is false.
    And(Box<Tripper>, Box<Tripper>),
    /// Either operand holds; the right side is skipped when the left is true.
    Or(Box<Tripper>, Box<Tripper>),
}

impl Tripper {
    /// Holds while the breaker is `Closed`.
    pub fn closed() -> Self {
        Tripper::Closed
    }

    /// Holds while the breaker is `HalfOpen`.
    pub fn half_opened() -> Self {
        Tripper::HalfOpened
    }

    /// Holds once the window holds at least `n` outcomes.
    pub fn min_requests(n: u64) -> Self {
        Tripper::MinRequests(n)
    }

    /// Holds once the failure rate reaches `threshold`.
    pub fn failure_rate(threshold: f64) -> Self {
        Tripper::FailureRate(threshold)
    }

    /// Holds once the mean call duration reaches `threshold`.
    pub fn avg_latency(threshold: Duration) -> Self {
        Tripper::AvgLatency(threshold)
    }

    /// Holds once the slow-call rate reaches `threshold`.
    pub fn slow_rate(threshold: f64) -> Self {
        Tripper::SlowRate(threshold)
    }

    /// Both `self` and `other` hold.
    pub fn and(self, other: Tripper) -> Self {
        Tripper::And(Box::new(self), Box::new(other))
    }

    /// Either `self` or `other` holds.
    pub fn or(self, other: Tripper) -> Self {
        Tripper::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates the tripper. Pure and idempotent: the verdict depends only
    /// on `(state, metric)`.
    pub fn eval(&self, state: CircuitState, metric: &Metric) -> bool {
        match self {
            Tripper::Closed => state == CircuitState::Closed,
            Tripper::HalfOpened => state == CircuitState::HalfOpen,
            Tripper::MinRequests(n) => metric.total_count >= *n,
            Tripper::FailureRate(threshold) => metric.failure_rate() >= *threshold,
            Tripper::AvgLatency(threshold) => metric.avg_duration() >= threshold.as_secs_f64(),
            Tripper::SlowRate(threshold) => metric.slow_rate() >= *threshold,
            Tripper::And(left, right) => left.eval(state, metric) && right.eval(state, metric),
            Tripper::Or(left, right) => left.eval(state, metric) || right.eval(state, metric),
        }
    }

    /// The largest `MinRequests` threshold anywhere in the tree, 0 when the
    /// tree has none. Gates the half-open success transition.
    pub(crate) fn min_requests_hint(&self) -> u64 {
        match self {
            Tripper::MinRequests(n) => *n,
            Tripper::And(left, right) | Tripper::Or(left, right) => {
                left.min_requests_hint().max(right.min_requests_hint())
            }
            _ => 0,
        }
    }
}

impl ops::BitAnd for Tripper {
    type Output = Tripper;

    fn bitand(self, rhs: Tripper) -> Tripper {
        self.and(rhs)
    }
}

impl ops::BitOr for Tripper {
    type Output = Tripper;

    fn bitor(self, rhs: Tripper) -> Tripper {
        self.or(rhs)
    }
}
