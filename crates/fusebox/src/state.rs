use crate::outcome::Metric;
use std::fmt;

/// Represents the state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// Normal operation; calls are allowed and outcomes are tracked.
    Closed = 0,
    /// The circuit is tripped; calls are rejected until the retry clock fires.
    Open = 1,
    /// Recovery probing; a limited number of calls are admitted.
    HalfOpen = 2,
    /// Calls proceed and are tracked, but no automatic transition ever occurs.
    MetricsOnly = 3,
    /// The breaker is bypassed entirely; nothing is tracked.
    Disabled = 4,
    /// Calls are rejected unconditionally until a manual transition.
    ForcedOpen = 5,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            3 => CircuitState::MetricsOnly,
            4 => CircuitState::Disabled,
            5 => CircuitState::ForcedOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Short lowercase label, used in error messages and signal logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
            CircuitState::MetricsOnly => "metrics_only",
            CircuitState::Disabled => "disabled",
            CircuitState::ForcedOpen => "forced_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker, returned by `info()`.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerInfo {
    /// The breaker's configured name.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Wall-clock time of the last state transition, seconds since the epoch.
    pub changed_at: f64,
    /// Number of times the circuit has opened since the last `reset`.
    pub reopens: u32,
    /// Aggregate over the current window.
    pub metric: Metric,
}
