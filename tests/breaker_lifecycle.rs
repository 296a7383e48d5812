//! End-to-end lifecycle tests for the single-threaded breaker: trip,
//! recovery probing, re-trip, tracker filtering, slow-call tripping, and the
//! disabled bypass.

use fusebox::{
    BoxError, BreakerError, CircuitBreaker, CircuitState, Permit, RetryClock, SlidingWindow,
    Tracker, Tripper,
};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

#[derive(Debug)]
struct ConnectionError;

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection refused")
    }
}

impl std::error::Error for ConnectionError {}

#[derive(Debug)]
struct ValueError;

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad value")
    }
}

impl std::error::Error for ValueError {}

fn fail() -> Result<(), BoxError> {
    Err(Box::new(ConnectionError))
}

fn succeed() -> Result<(), BoxError> {
    Ok(())
}

/// Trip on five failures, wait out the cooldown, recover through half-open.
#[test]
fn trip_and_recover() {
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&transitions);

    let breaker = CircuitBreaker::builder()
        .name("trip-and-recover")
        .window(SlidingWindow::count(10))
        .tracker(Tracker::all())
        .tripper(Tripper::min_requests(5) & Tripper::failure_rate(0.5))
        .retry(RetryClock::cooldown(Duration::from_millis(50)))
        .permit(Permit::random(1.0))
        .on_transition(move |from, to| seen.lock().unwrap().push((from, to)))
        .build();

    for _ in 0..5 {
        let _ = breaker.call(fail);
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    // Rejected while the cooldown is running.
    let err = breaker.call(succeed).unwrap_err();
    assert!(err.is_not_permitted());

    sleep(Duration::from_millis(80));

    // Admitted as probes; five clean probes satisfy the min-requests gate.
    for _ in 0..5 {
        breaker.call(succeed).unwrap();
    }
    assert_eq!(breaker.state(), CircuitState::Closed);

    let transitions = transitions.lock().unwrap();
    assert_eq!(
        *transitions,
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

/// Errors the tracker does not match are recorded as successes.
#[test]
fn tracker_filters_untracked_errors() {
    let breaker = CircuitBreaker::builder()
        .name("tracker-filter")
        .window(SlidingWindow::count(10))
        .tracker(Tracker::type_of::<ConnectionError>())
        .tripper(Tripper::min_requests(5) & Tripper::failure_rate(0.5))
        .retry(RetryClock::cooldown(Duration::from_secs(1)))
        .permit(Permit::random(1.0))
        .build();

    for _ in 0..5 {
        let err = breaker
            .call(|| Err::<(), BoxError>(Box::new(ValueError)))
            .unwrap_err();
        // The error still propagates to the caller.
        assert!(matches!(err, BreakerError::Inner(_)));
    }

    let info = breaker.info();
    assert_eq!(info.state, CircuitState::Closed);
    assert_eq!(info.metric.total_count, 5);
    assert_eq!(info.metric.failure_count, 0);
}

/// The same config trips normally when the tracked error type is thrown.
#[test]
fn tracker_counts_matching_errors() {
    let breaker = CircuitBreaker::builder()
        .window(SlidingWindow::count(10))
        .tracker(Tracker::type_of::<ConnectionError>())
        .tripper(Tripper::min_requests(5) & Tripper::failure_rate(0.5))
        .retry(RetryClock::cooldown(Duration::from_secs(1)))
        .permit(Permit::random(1.0))
        .build();

    for _ in 0..5 {
        let _ = breaker.call(fail);
    }
    assert_eq!(breaker.state(), CircuitState::Open);
}

/// A failing probe re-trips and restarts the retry clock from the new
/// opening.
#[test]
fn half_open_failure_reopens() {
    let breaker = CircuitBreaker::builder()
        .name("re-trip")
        .window(SlidingWindow::count(10))
        .tracker(Tracker::all())
        .tripper(
            (Tripper::min_requests(5) & Tripper::failure_rate(0.5))
                | (Tripper::half_opened() & Tripper::failure_rate(0.5)),
        )
        .retry(RetryClock::cooldown(Duration::from_millis(50)))
        .permit(Permit::random(1.0))
        .build();

    for _ in 0..5 {
        let _ = breaker.call(fail);
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.info().reopens, 1);

    sleep(Duration::from_millis(80));

    // Probe admitted, fails, re-trips immediately via the half-open arm.
    let _ = breaker.call(fail);
    let info = breaker.info();
    assert_eq!(info.state, CircuitState::Open);
    assert_eq!(info.reopens, 2);

    // The clock restarted at the new opening: still rejected right away...
    assert!(breaker.call(succeed).unwrap_err().is_not_permitted());

    // ...but admitted once the new cooldown has elapsed.
    sleep(Duration::from_millis(80));
    breaker.call(succeed).unwrap();
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

/// Slow successes alone trip the breaker through the slow-rate leaf.
#[test]
fn slow_rate_trips() {
    let breaker = CircuitBreaker::builder()
        .name("slow-rate")
        .window(SlidingWindow::count(10))
        .tracker(Tracker::all())
        .tripper(Tripper::min_requests(10) & Tripper::slow_rate(0.6))
        .retry(RetryClock::cooldown(Duration::from_secs(5)))
        .permit(Permit::random(1.0))
        .slow_threshold(Duration::from_millis(20))
        .build();

    // Four fast calls, then six slow ones: the slow rate only reaches 0.6
    // at the tenth record.
    for _ in 0..4 {
        breaker.call(succeed).unwrap();
    }
    for i in 0..6 {
        breaker
            .call(|| {
                sleep(Duration::from_millis(35));
                Ok::<_, BoxError>(())
            })
            .unwrap();
        if i < 5 {
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
    }
    assert_eq!(breaker.state(), CircuitState::Open);
}

/// Disabled bypasses the window entirely; errors still propagate.
#[test]
fn disabled_bypass() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let breaker = CircuitBreaker::builder()
        .name("disabled")
        .window(SlidingWindow::count(10))
        .tripper(Tripper::min_requests(1) & Tripper::failure_rate(0.0))
        .build();
    breaker.disable(false);

    for _ in 0..10 {
        let err = breaker
            .call(|| {
                counted.fetch_add(1, Ordering::SeqCst);
                fail()
            })
            .unwrap_err();
        assert!(matches!(err, BreakerError::Inner(_)));
    }

    // Every call went through, nothing was tracked, no transition happened.
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(breaker.metric().total_count, 0);
    assert_eq!(breaker.state(), CircuitState::Disabled);
}

/// An average-latency tripper fires on the mean, not on individual calls.
#[test]
fn avg_latency_trips_on_the_mean() {
    let breaker = CircuitBreaker::builder()
        .window(SlidingWindow::count(10))
        .tripper(Tripper::min_requests(4) & Tripper::avg_latency(Duration::from_millis(15)))
        .retry(RetryClock::cooldown(Duration::from_secs(5)))
        .build();

    // Two fast and two slow calls: mean sits around 20ms, above the bar.
    for _ in 0..2 {
        breaker.call(succeed).unwrap();
    }
    for _ in 0..2 {
        breaker
            .call(|| {
                sleep(Duration::from_millis(40));
                Ok::<_, BoxError>(())
            })
            .unwrap();
    }
    assert_eq!(breaker.state(), CircuitState::Open);
}
