use crate::async_breaker::AsyncCircuitBreaker;
use crate::breaker::CircuitBreaker;
use crate::permit::Permit;
use crate::retry::RetryClock;
use crate::signal::Signal;
use crate::state::CircuitState;
use crate::tracker::Tracker;
use crate::tripper::Tripper;
use crate::window::SlidingWindow;
use fusebox_core::{AsyncSignalListener, FnListener, SignalBus, SignalListener};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;

/// Configuration shared by both engines.
pub struct BreakerConfig {
    pub(crate) name: String,
    pub(crate) tracker: Tracker,
    pub(crate) tripper: Tripper,
    pub(crate) retry: RetryClock,
    pub(crate) permit: Permit,
    pub(crate) slow_threshold: Duration,
    pub(crate) signals: SignalBus<Signal>,
    pub(crate) max_half_open_calls: usize,
    pub(crate) rng_seed: Option<u64>,
}

impl BreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }

    pub(crate) fn create_rng(&self) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// Builder for configuring and constructing a breaker.
pub struct BreakerConfigBuilder {
    name: String,
    window: SlidingWindow,
    tracker: Tracker,
    tripper: Option<Tripper>,
    retry: RetryClock,
    permit: Permit,
    slow_threshold: Duration,
    signals: SignalBus<Signal>,
    max_half_open_calls: usize,
    rng_seed: Option<u64>,
}

impl BreakerConfigBuilder {
    /// Creates a builder with default values.
    ///
    /// Defaults:
    /// - window: count-based over the last 100 outcomes
    /// - tracker: every error is a failure
    /// - tripper: `MinRequests(window capacity) & FailureRate(0.5)` for a
    ///   count window, `MinRequests(100) & FailureRate(0.5)` otherwise
    /// - retry: 30 second cooldown, no jitter
    /// - permit: admit every half-open call
    /// - slow threshold: effectively disabled (`Duration::MAX`)
    /// - max half-open calls (cooperative engine): 10
    /// - name: `<unnamed>`
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            window: SlidingWindow::count(100),
            tracker: Tracker::All,
            tripper: None,
            retry: RetryClock::cooldown(Duration::from_secs(30)),
            permit: Permit::always(),
            slow_threshold: Duration::MAX,
            signals: SignalBus::new(),
            max_half_open_calls: 10,
            rng_seed: None,
        }
    }

    /// Give this breaker a human-readable name, surfaced in signals and
    /// rejection errors.
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the sliding window tracking recent outcomes.
    pub fn window<W: Into<SlidingWindow>>(mut self, window: W) -> Self {
        self.window = window.into();
        self
    }

    /// Sets the failure classifier.
    pub fn tracker(mut self, tracker: Tracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Sets the transition predicate.
    pub fn tripper(mut self, tripper: Tripper) -> Self {
        self.tripper = Some(tripper);
        self
    }

    /// Sets the clock gating OPEN → HALF_OPEN.
    pub fn retry(mut self, retry: RetryClock) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the half-open admission policy.
    pub fn permit(mut self, permit: Permit) -> Self {
        self.permit = permit;
        self
    }

    /// Sets the duration at or above which a call counts as slow.
    ///
    /// Use `Duration::MAX` to disable slow tracking.
    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Bounds concurrent half-open probes in the cooperative engine.
    ///
    /// Ignored by the single-threaded engine, which can only have one call
    /// in flight.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn max_half_open_calls(mut self, n: usize) -> Self {
        assert!(n > 0, "max_half_open_calls must be greater than zero");
        self.max_half_open_calls = n;
        self
    }

    /// Seeds the breaker's RNG for deterministic jitter and admission.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Registers a synchronous signal listener.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: SignalListener<Signal> + 'static,
    {
        self.signals.add(listener);
        self
    }

    /// Registers an asynchronous signal listener (awaited by the cooperative
    /// engine; the single-threaded engine dispatches sync listeners only).
    pub fn async_listener<L>(mut self, listener: L) -> Self
    where
        L: AsyncSignalListener<Signal> + 'static,
    {
        self.signals.add_async(listener);
        self
    }

    /// Register a callback for state transitions.
    pub fn on_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.signals.add(FnListener::new(move |signal: &Signal| {
            f(signal.old_state, signal.new_state)
        }));
        self
    }

    fn into_parts(self) -> (BreakerConfig, SlidingWindow) {
        let tripper = self.tripper.unwrap_or_else(|| {
            let min = match &self.window {
                SlidingWindow::Count(w) => w.capacity() as u64,
                SlidingWindow::Time(_) => 100,
            };
            Tripper::min_requests(min) & Tripper::failure_rate(0.5)
        });

        let config = BreakerConfig {
            name: self.name,
            tracker: self.tracker,
            tripper,
            retry: self.retry,
            permit: self.permit,
            slow_threshold: self.slow_threshold,
            signals: self.signals,
            max_half_open_calls: self.max_half_open_calls,
            rng_seed: self.rng_seed,
        };
        (config, self.window)
    }

    /// Builds the single-threaded breaker.
    pub fn build(self) -> CircuitBreaker {
        let (config, window) = self.into_parts();
        CircuitBreaker::new(config, window)
    }

    /// Builds the cooperative (async) breaker.
    pub fn build_async(self) -> AsyncCircuitBreaker {
        let (config, window) = self.into_parts();
        AsyncCircuitBreaker::new(config, window)
    }
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
