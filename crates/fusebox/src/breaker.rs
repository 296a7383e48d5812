use crate::circuit::{Admission, Circuit};
use crate::clock::unix_now;
use crate::config::{BreakerConfig, BreakerConfigBuilder};
use crate::error::{BoxError, BreakerError};
use crate::outcome::{Metric, Outcome};
use crate::signal::Signal;
use crate::state::{BreakerInfo, CircuitState};
use crate::window::SlidingWindow;
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::AtomicU8;

/// Single-threaded circuit breaker.
///
/// Wraps fallible closures, tracks their outcomes in a sliding window, and
/// short-circuits once the configured tripper fires. Intended for a
/// single-threaded caller: interior mutability is a plain [`RefCell`], so the
/// type is deliberately not `Sync`. Concurrent callers belong on
/// [`AsyncCircuitBreaker`](crate::AsyncCircuitBreaker).
///
/// ```rust
/// use fusebox::{BreakerError, CircuitBreaker, Permit, RetryClock, SlidingWindow, Tracker, Tripper};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::builder()
///     .name("db")
///     .window(SlidingWindow::count(10))
///     .tracker(Tracker::all())
///     .tripper(Tripper::min_requests(5) & Tripper::failure_rate(0.5))
///     .retry(RetryClock::cooldown(Duration::from_secs(30)))
///     .permit(Permit::always())
///     .build();
///
/// let answer: Result<u32, BreakerError> = breaker.call(|| Ok(42));
/// assert_eq!(answer.unwrap(), 42);
/// ```
pub struct CircuitBreaker {
    config: BreakerConfig,
    circuit: RefCell<Circuit>,
}

impl CircuitBreaker {
    /// Returns a configuration builder.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }

    pub(crate) fn new(config: BreakerConfig, window: SlidingWindow) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let circuit = Circuit::new(&config, window, state_atomic, unix_now());
        Self {
            config,
            circuit: RefCell::new(circuit),
        }
    }

    /// Invokes `f` under the breaker.
    ///
    /// Short-circuits with [`BreakerError::NotPermitted`] when the circuit is
    /// open before its retry time, a half-open permit rejects the call, or
    /// the breaker is forced open. Errors from `f` are classified by the
    /// tracker, recorded, and propagated as [`BreakerError::Inner`].
    pub fn call<R, F>(&self, f: F) -> Result<R, BreakerError>
    where
        F: FnOnce() -> Result<R, BoxError>,
    {
        let now = unix_now();
        let mut signals = Vec::new();
        let admission = self
            .circuit
            .borrow_mut()
            .try_acquire(&self.config, now, &mut signals);
        self.dispatch(&signals);
        let admission = admission?;

        let started = unix_now();
        let result = f();
        let completed = unix_now();

        if let Admission::Bypass = admission {
            return result.map_err(BreakerError::Inner);
        }

        let (success, result) = match result {
            Ok(value) => (true, Ok(value)),
            Err(error) => {
                let is_failure = self.config.tracker.eval(&error);
                (!is_failure, Err(error))
            }
        };

        let outcome = Outcome::new(
            success,
            completed - started,
            completed,
            self.config.slow_threshold,
        );
        let mut signals = Vec::new();
        self.circuit
            .borrow_mut()
            .record(&self.config, outcome, completed, &mut signals);
        self.dispatch(&signals);

        result.map_err(BreakerError::Inner)
    }

    /// Invokes `f`; on any error (short-circuit or inner) diverts to
    /// `fallback` and returns its result. Never invoked on success.
    pub fn call_with_fallback<R, F, FB>(&self, f: F, fallback: FB) -> R
    where
        F: FnOnce() -> Result<R, BoxError>,
        FB: FnOnce(BreakerError) -> R,
    {
        match self.call(f) {
            Ok(value) => value,
            Err(error) => fallback(error),
        }
    }

    /// Returns a closure applying this breaker's semantics to every
    /// invocation of `f`.
    pub fn wrap<'a, R, F>(&'a self, mut f: F) -> impl FnMut() -> Result<R, BreakerError> + 'a
    where
        F: FnMut() -> Result<R, BoxError> + 'a,
    {
        move || self.call(&mut f)
    }

    /// Like [`wrap`](Self::wrap), with errors diverted to `fallback`.
    pub fn wrap_with_fallback<'a, R, F, FB>(
        &'a self,
        mut f: F,
        mut fallback: FB,
    ) -> impl FnMut() -> R + 'a
    where
        F: FnMut() -> Result<R, BoxError> + 'a,
        FB: FnMut(BreakerError) -> R + 'a,
    {
        move || match self.call(&mut f) {
            Ok(value) => value,
            Err(error) => fallback(error),
        }
    }

    /// A point-in-time snapshot of the breaker.
    pub fn info(&self) -> BreakerInfo {
        self.circuit.borrow().info(&self.config, unix_now())
    }

    /// The current state.
    pub fn state(&self) -> CircuitState {
        self.circuit.borrow().state()
    }

    /// The aggregate over the current window.
    pub fn metric(&self) -> Metric {
        self.circuit.borrow().metric(unix_now())
    }

    /// Moves to `Closed` with a fresh window and `reopens = 0`.
    pub fn reset(&self, notify: bool) {
        self.manual(|circuit, config, now, signals| {
            circuit.reset(config, now, notify, signals)
        });
    }

    /// Moves to `MetricsOnly`: outcomes are tracked, transitions never fire.
    pub fn metrics_only(&self, notify: bool) {
        self.manual(|circuit, config, now, signals| {
            circuit.metrics_only(config, now, notify, signals)
        });
    }

    /// Moves to `Disabled`: calls bypass the breaker entirely.
    pub fn disable(&self, notify: bool) {
        self.manual(|circuit, config, now, signals| {
            circuit.disable(config, now, notify, signals)
        });
    }

    /// Moves to `ForcedOpen`: every call is rejected until a manual change.
    pub fn force_open(&self, notify: bool) {
        self.manual(|circuit, config, now, signals| {
            circuit.force_open(config, now, notify, signals)
        });
    }

    fn manual<F>(&self, op: F)
    where
        F: FnOnce(&mut Circuit, &BreakerConfig, f64, &mut Vec<Signal>),
    {
        let now = unix_now();
        let mut signals = Vec::new();
        op(
            &mut self.circuit.borrow_mut(),
            &self.config,
            now,
            &mut signals,
        );
        self.dispatch(&signals);
    }

    fn dispatch(&self, signals: &[Signal]) {
        for signal in signals {
            self.config.signals.emit(signal);
        }
    }
}
