//! Half-open admission policies.
//!
//! While the circuit is half-open, a [`Permit`] decides per call whether the
//! call may probe the downstream. Admission is probabilistic: the permit
//! computes a probability from the time spent in half-open, and the call is
//! admitted iff an independent uniform sample falls below it.

use rand::Rng;
use std::time::Duration;

/// Per-call admission policy for the half-open state.
#[derive(Debug, Clone)]
pub enum Permit {
    /// Admit each call with a fixed probability.
    Random {
        /// Admission probability in `[0, 1]`.
        ratio: f64,
    },
    /// Admission probability ramps linearly from `initial` to `target` over
    /// `duration`, measured from half-open entry.
    RampUp {
        /// Probability at half-open entry.
        initial: f64,
        /// Probability once the ramp completes.
        target: f64,
        /// Ramp length.
        duration: Duration,
    },
}

impl Permit {
    /// Admit every call.
    pub fn always() -> Self {
        Self::random(1.0)
    }

    /// Admit each call with probability `ratio`.
    ///
    /// # Panics
    ///
    /// Panics if `ratio` is outside `[0, 1]`.
    pub fn random(ratio: f64) -> Self {
        assert_ratio(ratio, "admission ratio");
        Permit::Random { ratio }
    }

    /// Ramp the admission probability from `initial` to `target` over
    /// `duration`.
    ///
    /// # Panics
    ///
    /// Panics if either probability is outside `[0, 1]` or `duration` is
    /// zero.
    pub fn ramp_up(initial: f64, target: f64, duration: Duration) -> Self {
        assert_ratio(initial, "initial admission ratio");
        assert_ratio(target, "target admission ratio");
        assert!(
            duration > Duration::ZERO,
            "ramp-up duration must be positive"
        );
        Permit::RampUp {
            initial,
            target,
            duration,
        }
    }

    /// The admission probability at `now` for a circuit that entered
    /// half-open at `entered_at` (both seconds since the epoch).
    ///
    /// A `now` before `entered_at` clamps to the start of the ramp.
    pub fn probability(&self, now: f64, entered_at: f64) -> f64 {
        match self {
            Permit::Random { ratio } => *ratio,
            Permit::RampUp {
                initial,
                target,
                duration,
            } => {
                let progress = ((now - entered_at) / duration.as_secs_f64()).clamp(0.0, 1.0);
                initial + (target - initial) * progress
            }
        }
    }

    /// Samples admission for one call.
    pub fn admits<R: Rng>(&self, now: f64, entered_at: f64, rng: &mut R) -> bool {
        rng.random::<f64>() < self.probability(now, entered_at)
    }
}

fn assert_ratio(ratio: f64, what: &str) {
    assert!(
        (0.0..=1.0).contains(&ratio),
        "{what} must lie in [0, 1], got {ratio}"
    );
}
