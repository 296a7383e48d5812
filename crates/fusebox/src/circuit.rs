use crate::config::BreakerConfig;
use crate::error::BreakerError;
use crate::outcome::{Metric, Outcome};
use crate::signal::Signal;
use crate::state::{BreakerInfo, CircuitState};
use crate::window::SlidingWindow;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// How an admitted call should be handled by the engine.
#[derive(Clone, Copy)]
pub(crate) enum Admission {
    /// Invoke and record the outcome.
    Track,
    /// Invoke and record; this is a half-open probe (the cooperative engine
    /// additionally charges it against the probe bound).
    Probe,
    /// Invoke without touching the window (disabled state).
    Bypass,
}

/// The state machine shared by both engines.
///
/// The engine wrapper owns synchronization; everything here runs inside a
/// bounded, non-yielding critical section. Transitions append to the caller's
/// signal buffer so dispatch happens after the lock is released.
pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    changed_at: f64,
    opened_at: f64,
    half_open_entered_at: f64,
    reopens: u32,
    window: SlidingWindow,
    rng: StdRng,
}

impl Circuit {
    pub(crate) fn new(
        config: &BreakerConfig,
        window: SlidingWindow,
        state_atomic: Arc<AtomicU8>,
        now: f64,
    ) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            changed_at: now,
            opened_at: now,
            half_open_entered_at: now,
            reopens: 0,
            window,
            rng: config.create_rng(),
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn metric(&self, now: f64) -> Metric {
        self.window.metric(now)
    }

    pub(crate) fn info(&self, config: &BreakerConfig, now: f64) -> BreakerInfo {
        BreakerInfo {
            name: config.name.clone(),
            state: self.state,
            changed_at: self.changed_at,
            reopens: self.reopens,
            metric: self.window.metric(now),
        }
    }

    /// Decides whether a call may proceed, transitioning OPEN → HALF_OPEN
    /// when the retry clock has fired.
    pub(crate) fn try_acquire(
        &mut self,
        config: &BreakerConfig,
        now: f64,
        signals: &mut Vec<Signal>,
    ) -> Result<Admission, BreakerError> {
        match self.state {
            CircuitState::Closed | CircuitState::MetricsOnly => Ok(Admission::Track),
            CircuitState::Disabled => Ok(Admission::Bypass),
            CircuitState::ForcedOpen => {
                self.note_rejection(config);
                Err(BreakerError::not_permitted(&config.name, self.state))
            }
            CircuitState::Open => {
                // The clock counts previous reopens, so the first opening
                // waits the initial interval.
                let previous_reopens = self.reopens.saturating_sub(1);
                let next_attempt =
                    config
                        .retry
                        .next_attempt_time(self.opened_at, previous_reopens, &mut self.rng);
                if now >= next_attempt {
                    self.transition_to(CircuitState::HalfOpen, config, now, true, signals);
                    self.check_permit(config, now)
                } else {
                    self.note_rejection(config);
                    Err(BreakerError::not_permitted(&config.name, CircuitState::Open))
                }
            }
            CircuitState::HalfOpen => self.check_permit(config, now),
        }
    }

    fn check_permit(
        &mut self,
        config: &BreakerConfig,
        now: f64,
    ) -> Result<Admission, BreakerError> {
        if config
            .permit
            .admits(now, self.half_open_entered_at, &mut self.rng)
        {
            Ok(Admission::Probe)
        } else {
            self.note_rejection(config);
            Err(BreakerError::not_permitted_because(
                &config.name,
                CircuitState::HalfOpen,
                "half-open admission rejected",
            ))
        }
    }

    /// Records a completed outcome and applies any automatic transition.
    pub(crate) fn record(
        &mut self,
        config: &BreakerConfig,
        outcome: Outcome,
        now: f64,
        signals: &mut Vec<Signal>,
    ) {
        self.window.record(outcome);

        #[cfg(feature = "metrics")]
        counter!(
            "fusebox_calls_total",
            "circuit" => config.name.clone(),
            "outcome" => if outcome.success { "success" } else { "failure" }
        )
        .increment(1);

        match self.state {
            CircuitState::Closed => {
                let metric = self.window.metric(now);
                if config.tripper.eval(CircuitState::Closed, &metric) {
                    self.transition_to(CircuitState::Open, config, now, true, signals);
                }
            }
            CircuitState::HalfOpen => {
                let metric = self.window.metric(now);
                if config.tripper.eval(CircuitState::HalfOpen, &metric) {
                    self.transition_to(CircuitState::Open, config, now, true, signals);
                } else if metric.total_count >= config.tripper.min_requests_hint() {
                    self.transition_to(CircuitState::Closed, config, now, true, signals);
                }
            }
            // Metrics-only never transitions; completions that land after a
            // manual or concurrent transition are kept without re-evaluating.
            CircuitState::MetricsOnly
            | CircuitState::Open
            | CircuitState::Disabled
            | CircuitState::ForcedOpen => {}
        }
    }

    pub(crate) fn reset(
        &mut self,
        config: &BreakerConfig,
        now: f64,
        notify: bool,
        signals: &mut Vec<Signal>,
    ) {
        self.window.reset();
        self.reopens = 0;
        self.transition_to(CircuitState::Closed, config, now, notify, signals);
    }

    pub(crate) fn metrics_only(
        &mut self,
        config: &BreakerConfig,
        now: f64,
        notify: bool,
        signals: &mut Vec<Signal>,
    ) {
        self.window.reset();
        self.transition_to(CircuitState::MetricsOnly, config, now, notify, signals);
    }

    pub(crate) fn disable(
        &mut self,
        config: &BreakerConfig,
        now: f64,
        notify: bool,
        signals: &mut Vec<Signal>,
    ) {
        self.window.reset();
        self.transition_to(CircuitState::Disabled, config, now, notify, signals);
    }

    pub(crate) fn force_open(
        &mut self,
        config: &BreakerConfig,
        now: f64,
        notify: bool,
        signals: &mut Vec<Signal>,
    ) {
        self.window.reset();
        self.transition_to(CircuitState::ForcedOpen, config, now, notify, signals);
    }

    fn transition_to(
        &mut self,
        to: CircuitState,
        config: &BreakerConfig,
        now: f64,
        notify: bool,
        signals: &mut Vec<Signal>,
    ) {
        if self.state == to {
            return;
        }

        let from = self.state;
        self.state = to;
        self.state_atomic.store(to as u8, Ordering::Release);
        self.changed_at = now;
        self.window.reset();

        match to {
            CircuitState::Open => {
                self.opened_at = now;
                self.reopens += 1;
            }
            CircuitState::HalfOpen => {
                self.half_open_entered_at = now;
            }
            _ => {}
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            circuit = %config.name,
            from = %from,
            to = %to,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "fusebox_transitions_total",
                "circuit" => config.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);

            gauge!("fusebox_state", "circuit" => config.name.clone()).set(to as u8 as f64);
        }

        if notify {
            signals.push(Signal {
                circuit_name: config.name.clone(),
                old_state: from,
                new_state: to,
                timestamp: now,
            });
        }
    }

    fn note_rejection(&self, config: &BreakerConfig) {
        #[cfg(feature = "metrics")]
        counter!(
            "fusebox_calls_total",
            "circuit" => config.name.clone(),
            "outcome" => "rejected"
        )
        .increment(1);

        #[cfg(feature = "tracing")]
        tracing::trace!(circuit = %config.name, state = %self.state, "call rejected");

        #[cfg(not(any(feature = "metrics", feature = "tracing")))]
        let _ = config;
    }
}
