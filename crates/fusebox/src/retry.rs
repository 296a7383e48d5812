//! Clocks gating the OPEN → HALF_OPEN transition.
//!
//! A [`RetryClock`] computes, from the time the circuit opened and the number
//! of previous reopens, the earliest wall-clock time at which a recovery
//! probe may be admitted. The jittered variants spread probes of many
//! breakers apart so they do not stampede a recovering dependency.

use rand::Rng;
use std::time::Duration;

/// Computes the next half-open attempt time for an open circuit.
#[derive(Debug, Clone)]
pub enum RetryClock {
    /// Never probe; the circuit stays open until a manual transition.
    Never,
    /// Probe immediately on the next call.
    Always,
    /// Probe after a fixed wait, optionally jittered.
    Cooldown {
        /// Base wait after opening.
        wait: Duration,
        /// Symmetric jitter ratio in `[0, 1]`.
        jitter: f64,
    },
    /// Probe after an exponentially growing wait, optionally jittered.
    Backoff {
        /// Wait after the first opening.
        initial: Duration,
        /// Growth factor per reopen.
        multiplier: f64,
        /// Upper bound on the un-jittered wait.
        cap: Duration,
        /// Symmetric jitter ratio in `[0, 1]`.
        jitter: f64,
    },
}

impl RetryClock {
    /// The circuit never probes on its own.
    pub fn never() -> Self {
        RetryClock::Never
    }

    /// The next call after opening is always a probe.
    pub fn always() -> Self {
        RetryClock::Always
    }

    /// A fixed wait with no jitter.
    pub fn cooldown(wait: Duration) -> Self {
        Self::cooldown_jittered(wait, 0.0)
    }

    /// A fixed wait, scaled per sample by `1 + U(-jitter, +jitter)`.
    ///
    /// # Panics
    ///
    /// Panics if `jitter` is outside `[0, 1]`.
    pub fn cooldown_jittered(wait: Duration, jitter: f64) -> Self {
        assert_jitter(jitter);
        RetryClock::Cooldown { wait, jitter }
    }

    /// Exponential backoff `initial * multiplier^reopens`, capped, no jitter.
    pub fn backoff(initial: Duration, multiplier: f64, cap: Duration) -> Self {
        Self::backoff_jittered(initial, multiplier, cap, 0.0)
    }

    /// Exponential backoff with a per-sample jitter factor.
    ///
    /// # Panics
    ///
    /// Panics if `jitter` is outside `[0, 1]`.
    pub fn backoff_jittered(initial: Duration, multiplier: f64, cap: Duration, jitter: f64) -> Self {
        assert_jitter(jitter);
        RetryClock::Backoff {
            initial,
            multiplier,
            cap,
            jitter,
        }
    }

    /// The earliest wall-clock time (seconds since the epoch) at which a
    /// probe may be admitted for a circuit that opened at `opened_at` after
    /// `reopens` previous openings.
    ///
    /// Jitter is sampled fresh on every call. `Never` returns infinity.
    pub fn next_attempt_time<R: Rng>(&self, opened_at: f64, reopens: u32, rng: &mut R) -> f64 {
        match self {
            RetryClock::Never => f64::INFINITY,
            RetryClock::Always => opened_at,
            RetryClock::Cooldown { wait, jitter } => {
                opened_at + wait.as_secs_f64() * jitter_factor(*jitter, rng)
            }
            RetryClock::Backoff {
                initial,
                multiplier,
                cap,
                jitter,
            } => {
                let grown = initial.as_secs_f64() * multiplier.powi(reopens as i32);
                let capped = grown.min(cap.as_secs_f64());
                opened_at + capped * jitter_factor(*jitter, rng)
            }
        }
    }
}

fn jitter_factor<R: Rng>(jitter: f64, rng: &mut R) -> f64 {
    if jitter == 0.0 {
        1.0
    } else {
        1.0 + rng.random_range(-jitter..=jitter)
    }
}

fn assert_jitter(jitter: f64) {
    assert!(
        (0.0..=1.0).contains(&jitter),
        "jitter ratio must lie in [0, 1], got {jitter}"
    );
}
