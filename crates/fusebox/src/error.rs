use crate::state::CircuitState;
use thiserror::Error;

/// Boxed error type for wrapped calls, tracker matching, and propagation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by a breaker call.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// The engine short-circuited: the circuit is open before its retry
    /// time, the half-open permit or probe bound rejected the call, or the
    /// breaker is forced open.
    #[error("circuit `{circuit_name}` is {state}: {}", .message.as_deref().unwrap_or("call not permitted"))]
    NotPermitted {
        /// Name of the rejecting breaker.
        circuit_name: String,
        /// State at rejection time.
        state: CircuitState,
        /// Optional detail (e.g. which admission mechanism rejected).
        message: Option<String>,
    },

    /// The wrapped call failed; the inner error is propagated unchanged.
    #[error("wrapped call failed: {0}")]
    Inner(#[source] BoxError),
}

impl BreakerError {
    pub(crate) fn not_permitted(circuit_name: &str, state: CircuitState) -> Self {
        BreakerError::NotPermitted {
            circuit_name: circuit_name.to_string(),
            state,
            message: None,
        }
    }

    pub(crate) fn not_permitted_because(
        circuit_name: &str,
        state: CircuitState,
        message: &str,
    ) -> Self {
        BreakerError::NotPermitted {
            circuit_name: circuit_name.to_string(),
            state,
            message: Some(message.to_string()),
        }
    }

    /// Returns true if the engine refused to invoke the wrapped call.
    pub fn is_not_permitted(&self) -> bool {
        matches!(self, BreakerError::NotPermitted { .. })
    }

    /// Returns the wrapped call's error, if any.
    pub fn into_inner(self) -> Option<BoxError> {
        match self {
            BreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BoxError> for BreakerError {
    fn from(err: BoxError) -> Self {
        BreakerError::Inner(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_distinguish_the_variants() {
        let rejected = BreakerError::not_permitted("api", CircuitState::Open);
        assert!(rejected.is_not_permitted());
        assert!(rejected.into_inner().is_none());

        let inner = BreakerError::Inner("boom".into());
        assert!(!inner.is_not_permitted());
        assert_eq!(inner.into_inner().unwrap().to_string(), "boom");
    }

    #[test]
    fn rejection_message_shows_up_in_display() {
        let plain = BreakerError::not_permitted("api", CircuitState::ForcedOpen);
        assert_eq!(
            plain.to_string(),
            "circuit `api` is forced_open: call not permitted"
        );

        let detailed =
            BreakerError::not_permitted_because("api", CircuitState::HalfOpen, "probe limit reached");
        assert_eq!(
            detailed.to_string(),
            "circuit `api` is half_open: probe limit reached"
        );
    }
}
