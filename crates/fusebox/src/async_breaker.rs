use crate::circuit::{Admission, Circuit};
use crate::clock::unix_now;
use crate::config::{BreakerConfig, BreakerConfigBuilder};
use crate::error::{BoxError, BreakerError};
use crate::outcome::{Metric, Outcome};
use crate::signal::Signal;
use crate::state::{BreakerInfo, CircuitState};
use crate::window::SlidingWindow;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::{Mutex, Semaphore};

/// Cooperative (async) circuit breaker.
///
/// Same semantics as [`CircuitBreaker`](crate::CircuitBreaker), safe to share
/// across tasks on a cooperative scheduler. Cloning is cheap and every clone
/// drives the same circuit.
///
/// Beyond the single-threaded engine it bounds concurrent half-open probes
/// with a counting semaphore (capacity `max_half_open_calls`): admission goes
/// permit first, probe slot second, so a permit-rejected call never consumes
/// a slot. The slot is released on every exit path, including cancellation.
///
/// The circuit lock is never held across the wrapped call or listener
/// dispatch; transitions happen between suspension points, so no task ever
/// observes a half-applied transition.
///
/// ```rust
/// use fusebox::{AsyncCircuitBreaker, BoxError, Permit, RetryClock, SlidingWindow, Tripper};
/// use std::time::Duration;
///
/// # async fn example() {
/// let breaker = AsyncCircuitBreaker::builder()
///     .name("api")
///     .window(SlidingWindow::time(60))
///     .tripper(Tripper::min_requests(20) & Tripper::failure_rate(0.5))
///     .retry(RetryClock::backoff(
///         Duration::from_secs(1),
///         2.0,
///         Duration::from_secs(60),
///     ))
///     .permit(Permit::ramp_up(0.1, 1.0, Duration::from_secs(30)))
///     .max_half_open_calls(2)
///     .build_async();
///
/// let reply: Result<String, _> = breaker
///     .call(|| async { Ok::<_, BoxError>("pong".to_string()) })
///     .await;
/// assert_eq!(reply.unwrap(), "pong");
/// # }
/// ```
#[derive(Clone)]
pub struct AsyncCircuitBreaker {
    shared: Arc<Shared>,
}

struct Shared {
    config: BreakerConfig,
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
    probes: Arc<Semaphore>,
}

impl AsyncCircuitBreaker {
    /// Returns a configuration builder.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }

    pub(crate) fn new(config: BreakerConfig, window: SlidingWindow) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let circuit = Circuit::new(&config, window, Arc::clone(&state_atomic), unix_now());
        let probes = Arc::new(Semaphore::new(config.max_half_open_calls));
        Self {
            shared: Arc::new(Shared {
                config,
                circuit: Mutex::new(circuit),
                state_atomic,
                probes,
            }),
        }
    }

    /// Invokes the future produced by `f` under the breaker.
    ///
    /// Short-circuits with [`BreakerError::NotPermitted`] when the circuit is
    /// open before its retry time, the half-open permit or probe bound
    /// rejects the call, or the breaker is forced open. If the returned
    /// future is dropped before completion, no outcome is recorded and any
    /// held probe slot is released.
    pub async fn call<R, F, Fut>(&self, f: F) -> Result<R, BreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, BoxError>>,
    {
        let now = unix_now();
        let mut signals = Vec::new();
        let admission = {
            let mut circuit = self.shared.circuit.lock().await;
            circuit.try_acquire(&self.shared.config, now, &mut signals)
        };
        self.dispatch(signals).await;
        let admission = admission?;

        // Probe slot, released on drop on every exit path.
        let _slot = match admission {
            Admission::Probe => match Arc::clone(&self.shared.probes).try_acquire_owned() {
                Ok(slot) => Some(slot),
                Err(_) => {
                    return Err(BreakerError::not_permitted_because(
                        &self.shared.config.name,
                        CircuitState::HalfOpen,
                        "half-open probe limit reached",
                    ));
                }
            },
            _ => None,
        };

        let started = unix_now();
        let result = f().await;
        let completed = unix_now();

        if let Admission::Bypass = admission {
            return result.map_err(BreakerError::Inner);
        }

        let (success, result) = match result {
            Ok(value) => (true, Ok(value)),
            Err(error) => {
                let is_failure = self.shared.config.tracker.eval(&error);
                (!is_failure, Err(error))
            }
        };

        let outcome = Outcome::new(
            success,
            completed - started,
            completed,
            self.shared.config.slow_threshold,
        );
        let mut signals = Vec::new();
        {
            let mut circuit = self.shared.circuit.lock().await;
            circuit.record(&self.shared.config, outcome, completed, &mut signals);
        }
        self.dispatch(signals).await;

        result.map_err(BreakerError::Inner)
    }

    /// Invokes the future produced by `f`; on any error (short-circuit or
    /// inner) diverts to `fallback` and returns its result. Never invoked on
    /// success.
    pub async fn call_with_fallback<R, F, Fut, FB>(&self, f: F, fallback: FB) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, BoxError>>,
        FB: FnOnce(BreakerError) -> R,
    {
        match self.call(f).await {
            Ok(value) => value,
            Err(error) => fallback(error),
        }
    }

    /// Returns a closure applying this breaker's semantics to every
    /// invocation of `f`.
    ///
    /// The produced future is constructed per invocation but only polled if
    /// the breaker admits the call.
    pub fn wrap<R, F, Fut>(
        &self,
        mut f: F,
    ) -> impl FnMut() -> BoxFuture<'static, Result<R, BreakerError>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: Send + 'static,
    {
        let breaker = self.clone();
        move || {
            let breaker = breaker.clone();
            let fut = f();
            async move { breaker.call(move || fut).await }.boxed()
        }
    }

    /// Like [`wrap`](Self::wrap), with errors diverted to `fallback`.
    pub fn wrap_with_fallback<R, F, Fut, FB>(
        &self,
        mut f: F,
        fallback: FB,
    ) -> impl FnMut() -> BoxFuture<'static, R>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        FB: Fn(BreakerError) -> R + Send + Sync + 'static,
        R: Send + 'static,
    {
        let breaker = self.clone();
        let fallback = Arc::new(fallback);
        move || {
            let breaker = breaker.clone();
            let fallback = Arc::clone(&fallback);
            let fut = f();
            async move {
                match breaker.call(move || fut).await {
                    Ok(value) => value,
                    Err(error) => (*fallback)(error),
                }
            }
            .boxed()
        }
    }

    /// A point-in-time snapshot of the breaker.
    pub async fn info(&self) -> BreakerInfo {
        self.shared
            .circuit
            .lock()
            .await
            .info(&self.shared.config, unix_now())
    }

    /// The current state.
    pub async fn state(&self) -> CircuitState {
        self.shared.circuit.lock().await.state()
    }

    /// The current state, readable without awaiting.
    ///
    /// Backed by an atomic kept in step with the circuit; useful from sync
    /// code such as health checks.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state_atomic.load(Ordering::Acquire))
    }

    /// The aggregate over the current window.
    pub async fn metric(&self) -> Metric {
        self.shared.circuit.lock().await.metric(unix_now())
    }

    /// Moves to `Closed` with a fresh window and `reopens = 0`.
    pub async fn reset(&self, notify: bool) {
        let mut signals = Vec::new();
        {
            let mut circuit = self.shared.circuit.lock().await;
            circuit.reset(&self.shared.config, unix_now(), notify, &mut signals);
        }
        self.dispatch(signals).await;
    }

    /// Moves to `MetricsOnly`: outcomes are tracked, transitions never fire.
    pub async fn metrics_only(&self, notify: bool) {
        let mut signals = Vec::new();
        {
            let mut circuit = self.shared.circuit.lock().await;
            circuit.metrics_only(&self.shared.config, unix_now(), notify, &mut signals);
        }
        self.dispatch(signals).await;
    }

    /// Moves to `Disabled`: calls bypass the breaker entirely.
    pub async fn disable(&self, notify: bool) {
        let mut signals = Vec::new();
        {
            let mut circuit = self.shared.circuit.lock().await;
            circuit.disable(&self.shared.config, unix_now(), notify, &mut signals);
        }
        self.dispatch(signals).await;
    }

    /// Moves to `ForcedOpen`: every call is rejected until a manual change.
    pub async fn force_open(&self, notify: bool) {
        let mut signals = Vec::new();
        {
            let mut circuit = self.shared.circuit.lock().await;
            circuit.force_open(&self.shared.config, unix_now(), notify, &mut signals);
        }
        self.dispatch(signals).await;
    }

    async fn dispatch(&self, signals: Vec<Signal>) {
        for signal in &signals {
            self.shared.config.signals.emit_async(signal).await;
        }
    }
}
