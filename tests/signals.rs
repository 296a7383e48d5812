//! Signal dispatch through the engine: payload contents, listener ordering,
//! and panic isolation.

use fusebox::{
    BoxError, CircuitBreaker, CircuitState, FnListener, Permit, RetryClock, Signal, SlidingWindow,
    Tracker, Tripper,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn tripping_breaker_with<L>(listener: L) -> CircuitBreaker
where
    L: fusebox::SignalListener<Signal> + 'static,
{
    CircuitBreaker::builder()
        .name("signals")
        .window(SlidingWindow::count(10))
        .tracker(Tracker::all())
        .tripper(Tripper::min_requests(3) & Tripper::failure_rate(0.5))
        .retry(RetryClock::cooldown(Duration::from_secs(60)))
        .permit(Permit::random(1.0))
        .listener(listener)
        .build()
}

#[test]
fn trip_signal_carries_the_full_payload() {
    let captured: Arc<Mutex<Vec<Signal>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);

    let breaker = tripping_breaker_with(FnListener::new(move |signal: &Signal| {
        sink.lock().unwrap().push(signal.clone());
    }));

    for _ in 0..3 {
        let _ = breaker.call(|| Err::<(), BoxError>("boom".into()));
    }

    let signals = captured.lock().unwrap();
    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.circuit_name, "signals");
    assert_eq!(signal.old_state, CircuitState::Closed);
    assert_eq!(signal.new_state, CircuitState::Open);
    assert!(signal.timestamp > 0.0);
}

#[test]
fn listeners_run_in_registration_order() {
    let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    let second = Arc::clone(&order);
    let breaker = CircuitBreaker::builder()
        .window(SlidingWindow::count(10))
        .listener(FnListener::new(move |_: &Signal| {
            first.lock().unwrap().push(1);
        }))
        .listener(FnListener::new(move |_: &Signal| {
            second.lock().unwrap().push(2);
        }))
        .build();

    breaker.force_open(true);
    assert_eq!(*order.lock().unwrap(), vec![1, 2]);
}

#[test]
fn panicking_listener_does_not_poison_the_breaker() {
    let reached: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reached);

    let breaker = CircuitBreaker::builder()
        .window(SlidingWindow::count(10))
        .tripper(Tripper::min_requests(3) & Tripper::failure_rate(0.5))
        .retry(RetryClock::cooldown(Duration::from_secs(60)))
        .listener(FnListener::new(|_: &Signal| panic!("listener bug")))
        .listener(FnListener::new(move |_: &Signal| {
            sink.lock().unwrap().push("reached");
        }))
        .build();

    for _ in 0..3 {
        let _ = breaker.call(|| Err::<(), BoxError>("boom".into()));
    }

    // The panic was swallowed, the second listener ran, and the breaker
    // still transitioned.
    assert_eq!(*reached.lock().unwrap(), vec!["reached"]);
    assert_eq!(breaker.state(), CircuitState::Open);

    // The breaker keeps working afterwards.
    assert!(
        breaker
            .call(|| Ok::<_, BoxError>(()))
            .unwrap_err()
            .is_not_permitted()
    );
}

#[test]
fn every_transition_in_a_recovery_cycle_is_signalled() {
    let transitions: Arc<Mutex<Vec<(CircuitState, CircuitState)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&transitions);

    let breaker = CircuitBreaker::builder()
        .name("cycle")
        .window(SlidingWindow::count(10))
        .tripper(Tripper::min_requests(3) & Tripper::failure_rate(0.5))
        .retry(RetryClock::always())
        .permit(Permit::random(1.0))
        .on_transition(move |from, to| sink.lock().unwrap().push((from, to)))
        .build();

    for _ in 0..3 {
        let _ = breaker.call(|| Err::<(), BoxError>("boom".into()));
    }
    for _ in 0..3 {
        breaker.call(|| Ok::<_, BoxError>(())).unwrap();
    }

    assert_eq!(
        *transitions.lock().unwrap(),
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}
