//! Sliding-window circuit breaker with composable trip and track predicates.
//!
//! A circuit breaker protects callers of unreliable collaborators (HTTP
//! services, databases, message brokers) against cascading failure: it
//! observes call outcomes in a sliding window and short-circuits once a
//! configurable predicate trips.
//!
//! ## States
//! - **Closed**: normal operation, outcomes are tracked
//! - **Open**: tripped; calls are rejected until the retry clock fires
//! - **HalfOpen**: recovery probing, admission throttled by a [`Permit`]
//! - **MetricsOnly**: outcomes are tracked but transitions never fire
//! - **Disabled**: calls bypass the breaker entirely
//! - **ForcedOpen**: calls are rejected until a manual transition
//!
//! ## Basic example
//!
//! ```rust
//! use fusebox::{CircuitBreaker, Permit, RetryClock, SlidingWindow, Tracker, Tripper};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::builder()
//!     .name("orders-db")
//!     .window(SlidingWindow::count(100))
//!     .tracker(Tracker::all())
//!     .tripper(Tripper::min_requests(20) & Tripper::failure_rate(0.5))
//!     .retry(RetryClock::cooldown(Duration::from_secs(30)))
//!     .permit(Permit::always())
//!     .build();
//!
//! let result = breaker.call(|| {
//!     // talk to the database here
//!     Ok::<_, fusebox::BoxError>("row")
//! });
//! assert_eq!(result.unwrap(), "row");
//! ```
//!
//! ## Time-based window and slow calls
//!
//! ```rust
//! use fusebox::{CircuitBreaker, SlidingWindow, Tripper};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::builder()
//!     .window(SlidingWindow::time(60)) // last 60 seconds
//!     .tripper(
//!         (Tripper::min_requests(10) & Tripper::failure_rate(0.5))
//!             | (Tripper::min_requests(10) & Tripper::slow_rate(0.8)),
//!     )
//!     .slow_threshold(Duration::from_secs(2))
//!     .build();
//! # let _ = breaker;
//! ```
//!
//! ## Tracking only some errors
//!
//! ```rust
//! use fusebox::Tracker;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("connection refused")]
//! struct ConnectionError;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("bad request")]
//! struct BadRequest;
//!
//! // Connection problems trip the breaker; caller mistakes never do.
//! let tracker = Tracker::type_of::<ConnectionError>() & !Tracker::type_of::<BadRequest>();
//! # let _ = tracker;
//! ```
//!
//! ## Cooperative engine
//!
//! [`AsyncCircuitBreaker`] shares the semantics of [`CircuitBreaker`] and
//! additionally bounds concurrent half-open probes with a counting semaphore
//! (`max_half_open_calls`, default 10). See its docs for an example.
//!
//! ## Signals
//!
//! Every state transition dispatches a [`Signal`] to the registered
//! listeners, in registration order; a panicking listener is isolated and
//! logged. The cooperative engine also awaits
//! [`AsyncSignalListener`]s sequentially — blocking work inside a *sync*
//! listener will stall the scheduler, so keep those cheap.
//!
//! ```rust
//! use fusebox::CircuitBreaker;
//!
//! let breaker = CircuitBreaker::builder()
//!     .on_transition(|from, to| println!("circuit: {from} -> {to}"))
//!     .build();
//! # let _ = breaker;
//! ```
//!
//! ## Feature flags
//! - `tracing`: log transitions and swallowed panics via the `tracing` crate
//! - `metrics`: emit call/transition counters and a state gauge via the
//!   `metrics` crate

mod async_breaker;
mod breaker;
mod circuit;
mod clock;
mod config;
mod error;
mod outcome;
mod permit;
mod retry;
mod signal;
mod state;
mod tracker;
mod tripper;
mod window;

pub use async_breaker::AsyncCircuitBreaker;
pub use breaker::CircuitBreaker;
pub use config::{BreakerConfig, BreakerConfigBuilder};
pub use error::{BoxError, BreakerError};
pub use outcome::{Metric, Outcome};
pub use permit::Permit;
pub use retry::RetryClock;
pub use signal::Signal;
pub use state::{BreakerInfo, CircuitState};
pub use tracker::{Tracker, TypeMatcher};
pub use tripper::Tripper;
pub use window::{CountWindow, SlidingWindow, TimeWindow};

pub use fusebox_core::{
    AsyncFnListener, AsyncSignalListener, BreakerSignal, FnListener, SignalBus, SignalListener,
};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// Returns a new configuration builder.
///
/// Convenience for [`CircuitBreaker::builder`] /
/// [`AsyncCircuitBreaker::builder`]; with the `metrics` feature enabled it
/// also registers metric descriptions once per process.
pub fn breaker_builder() -> BreakerConfigBuilder {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        metrics::describe_counter!(
            "fusebox_calls_total",
            "Calls through the breaker, by outcome"
        );
        metrics::describe_counter!(
            "fusebox_transitions_total",
            "Breaker state transitions, by from/to state"
        );
        metrics::describe_gauge!("fusebox_state", "Current breaker state discriminant");
    });
    BreakerConfigBuilder::new()
}
