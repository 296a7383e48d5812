//! Signal dispatch for breaker state transitions.
//!
//! A breaker emits one signal per state transition. Listeners are registered
//! on a [`SignalBus`] and invoked in registration order; a panicking listener
//! is isolated so the remaining listeners still run and the breaker itself is
//! never affected.

#[cfg(feature = "tracing")]
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

/// Trait for signals emitted by a breaker.
pub trait BreakerSignal: Send + Sync + fmt::Debug {
    /// Returns the kind of signal (e.g. "state_transition").
    fn kind(&self) -> &'static str;

    /// Returns the name of the breaker that emitted this signal.
    fn circuit_name(&self) -> &str;

    /// Returns when this signal occurred, in seconds since the Unix epoch.
    fn timestamp(&self) -> f64;
}

/// Trait for synchronous signal listeners.
pub trait SignalListener<S: BreakerSignal>: Send + Sync {
    /// Called when a signal is dispatched.
    fn on_signal(&self, signal: &S);
}

/// Trait for asynchronous signal listeners.
///
/// Awaited sequentially by the cooperative engine. Blocking work belongs in a
/// sync [`SignalListener`] only if it is genuinely cheap; anything that can
/// stall should implement this trait instead.
pub trait AsyncSignalListener<S: BreakerSignal>: Send + Sync {
    /// Called when a signal is dispatched; the returned future is awaited
    /// before the next listener runs.
    fn on_signal<'a>(&'a self, signal: &'a S) -> BoxFuture<'a, ()>;
}

/// A simple function-based listener.
pub struct FnListener<S, F>
where
    F: Fn(&S) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&S)>,
}

impl<S, F> FnListener<S, F>
where
    F: Fn(&S) + Send + Sync,
{
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<S, F> SignalListener<S> for FnListener<S, F>
where
    S: BreakerSignal,
    F: Fn(&S) + Send + Sync,
{
    fn on_signal(&self, signal: &S) {
        (self.f)(signal)
    }
}

/// A function-based async listener.
///
/// The closure receives the signal and returns a boxed future; clone out of
/// the signal whatever the future needs.
pub struct AsyncFnListener<S, F>
where
    F: Fn(&S) -> BoxFuture<'static, ()> + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&S)>,
}

impl<S, F> AsyncFnListener<S, F>
where
    F: Fn(&S) -> BoxFuture<'static, ()> + Send + Sync,
{
    /// Creates a new function-based async listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<S, F> AsyncSignalListener<S> for AsyncFnListener<S, F>
where
    S: BreakerSignal,
    F: Fn(&S) -> BoxFuture<'static, ()> + Send + Sync,
{
    fn on_signal<'a>(&'a self, signal: &'a S) -> BoxFuture<'a, ()> {
        (self.f)(signal)
    }
}

/// A collection of listeners with panic-isolating dispatch.
pub struct SignalBus<S: BreakerSignal> {
    listeners: Vec<Arc<dyn SignalListener<S>>>,
    async_listeners: Vec<Arc<dyn AsyncSignalListener<S>>>,
}

impl<S: BreakerSignal> Clone for SignalBus<S> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
            async_listeners: self.async_listeners.clone(),
        }
    }
}

impl<S: BreakerSignal> SignalBus<S> {
    /// Creates a new empty bus.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            async_listeners: Vec::new(),
        }
    }

    /// Adds a synchronous listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: SignalListener<S> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Adds an asynchronous listener.
    pub fn add_async<L>(&mut self, listener: L)
    where
        L: AsyncSignalListener<S> + 'static,
    {
        self.async_listeners.push(Arc::new(listener));
    }

    /// Dispatches a signal to all synchronous listeners in registration order.
    ///
    /// If a listener panics, the panic is caught and the remaining listeners
    /// still run. With the `tracing` feature the panic is logged as a warning;
    /// with the `metrics` feature a counter is incremented.
    pub fn emit(&self, signal: &S) {
        for (index, listener) in self.listeners.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_signal(signal);
            }));

            if let Err(_panic_payload) = result {
                #[cfg(feature = "tracing")]
                log_listener_panic(index, signal, _panic_payload.as_ref());

                #[cfg(feature = "metrics")]
                record_listener_panic_metric(signal);

                #[cfg(not(feature = "tracing"))]
                let _ = index;
            }
        }
    }

    /// Dispatches a signal to all synchronous listeners, then awaits each
    /// asynchronous listener sequentially.
    ///
    /// A panic in an async listener's synchronous prefix (before its first
    /// await) is caught like a sync listener panic; panics across an await
    /// unwind into the calling task as usual, which is why async listeners
    /// should not panic.
    pub async fn emit_async(&self, signal: &S) {
        self.emit(signal);
        for listener in &self.async_listeners {
            listener.on_signal(signal).await;
        }
    }

    /// Returns true if no listeners of either kind are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty() && self.async_listeners.is_empty()
    }

    /// Returns the number of registered listeners of both kinds.
    pub fn len(&self) -> usize {
        self.listeners.len() + self.async_listeners.len()
    }
}

impl<S: BreakerSignal> Default for SignalBus<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BreakerSignal> fmt::Debug for SignalBus<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus")
            .field("listeners", &self.listeners.len())
            .field("async_listeners", &self.async_listeners.len())
            .finish()
    }
}

#[cfg(feature = "tracing")]
fn log_listener_panic<S: BreakerSignal>(
    index: usize,
    signal: &S,
    panic_payload: &(dyn Any + Send),
) {
    let panic_message = panic_payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic_payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    tracing::warn!(
        listener_index = index,
        circuit = signal.circuit_name(),
        kind = signal.kind(),
        panic_message = %panic_message,
        "signal listener panicked"
    );
}

#[cfg(feature = "metrics")]
fn record_listener_panic_metric<S: BreakerSignal>(signal: &S) {
    metrics::counter!(
        "fusebox_listener_panics_total",
        "circuit" => signal.circuit_name().to_string(),
        "kind" => signal.kind().to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestSignal {
        name: String,
        timestamp: f64,
    }

    impl BreakerSignal for TestSignal {
        fn kind(&self) -> &'static str {
            "test"
        }

        fn circuit_name(&self) -> &str {
            &self.name
        }

        fn timestamp(&self) -> f64 {
            self.timestamp
        }
    }

    fn signal() -> TestSignal {
        TestSignal {
            name: "test".to_string(),
            timestamp: 0.0,
        }
    }

    #[test]
    fn listeners_receive_every_emit() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut bus = SignalBus::new();
        bus.add(FnListener::new(move |_: &TestSignal| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }));

        bus.emit(&signal());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        bus.emit(&signal());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut bus = SignalBus::new();
        for id in 0..3 {
            let order = Arc::clone(&order);
            bus.add(FnListener::new(move |_: &TestSignal| {
                order.lock().unwrap().push(id);
            }));
        }

        bus.emit(&signal());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn panicking_listener_does_not_halt_dispatch() {
        let reached = Arc::new(AtomicUsize::new(0));
        let reached_clone = Arc::clone(&reached);

        let mut bus = SignalBus::new();
        bus.add(FnListener::new(|_: &TestSignal| panic!("boom")));
        bus.add(FnListener::new(move |_: &TestSignal| {
            reached_clone.fetch_add(1, Ordering::SeqCst);
        }));

        bus.emit(&signal());
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_listeners_awaited_after_sync() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut bus = SignalBus::new();
        let o = Arc::clone(&order);
        bus.add(FnListener::new(move |_: &TestSignal| {
            o.lock().unwrap().push("sync");
        }));
        let o = Arc::clone(&order);
        bus.add_async(AsyncFnListener::new(move |_: &TestSignal| {
            let o = Arc::clone(&o);
            async move {
                o.lock().unwrap().push("async");
            }
            .boxed()
        }));

        bus.emit_async(&signal()).await;
        assert_eq!(*order.lock().unwrap(), vec!["sync", "async"]);
    }

    #[test]
    fn bus_reports_len_and_empty() {
        let mut bus: SignalBus<TestSignal> = SignalBus::new();
        assert!(bus.is_empty());
        bus.add(FnListener::new(|_: &TestSignal| {}));
        bus.add_async(AsyncFnListener::new(|_: &TestSignal| async {}.boxed()));
        assert_eq!(bus.len(), 2);
        assert!(!bus.is_empty());
    }
}
