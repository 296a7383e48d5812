//! Failure classification for breaker decisions.
//!
//! A [`Tracker`] decides whether an error returned by the wrapped call counts
//! as a failure. Trackers form a small predicate algebra: the leaves are
//! [`Tracker::all`], [`Tracker::type_of`], and [`Tracker::custom`], closed
//! under `and`/`or`/`not` (also available as the `&`, `|`, and `!` operators).
//!
//! ```rust
//! use fusebox::Tracker;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("connection refused")]
//! struct ConnectionError;
//!
//! // Count connection errors, except those a custom rule excuses.
//! let tracker = Tracker::type_of::<ConnectionError>()
//!     & !Tracker::custom(|err| err.to_string().contains("shutting down"));
//! # let _ = tracker;
//! ```

use crate::error::BoxError;
use std::fmt;
use std::ops;
use std::sync::Arc;

/// Matches one concrete error type behind a [`BoxError`].
#[derive(Clone, Copy)]
pub struct TypeMatcher {
    name: &'static str,
    matches: fn(&BoxError) -> bool,
}

impl TypeMatcher {
    /// Creates a matcher for the concrete error type `T`.
    pub fn of<T: std::error::Error + Send + Sync + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            matches: matches_type::<T>,
        }
    }

    fn is_match(&self, error: &BoxError) -> bool {
        (self.matches)(error)
    }
}

fn matches_type<T: std::error::Error + Send + Sync + 'static>(error: &BoxError) -> bool {
    error.downcast_ref::<T>().is_some()
}

impl fmt::Debug for TypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeMatcher").field(&self.name).finish()
    }
}

/// Predicate deciding whether an error counts as a failure.
#[derive(Clone)]
pub enum Tracker {
    /// Every error is a failure.
    All,
    /// The error is a failure iff it downcasts to one of the listed types.
    TypeOf(Vec<TypeMatcher>),
    /// Delegates to a user-supplied predicate. A panicking predicate is
    /// caught and the outcome counted as a success.
    Custom(Arc<dyn Fn(&BoxError) -> bool + Send + Sync>),
    /// Both operands hold; the right side is skipped when the left is false.
    And(Box<Tracker>, Box<Tracker>),
    /// Either operand holds; the right side is skipped when the left is true.
    Or(Box<Tracker>, Box<Tracker>),
    /// The operand does not hold.
    Not(Box<Tracker>),
}

impl Tracker {
    /// A tracker counting every error as a failure.
    pub fn all() -> Self {
        Tracker::All
    }

    /// A tracker counting only errors of type `T` as failures.
    pub fn type_of<T: std::error::Error + Send + Sync + 'static>() -> Self {
        Tracker::TypeOf(vec![TypeMatcher::of::<T>()])
    }

    /// A tracker counting errors of any of the given types as failures.
    pub fn any_type_of(matchers: Vec<TypeMatcher>) -> Self {
        Tracker::TypeOf(matchers)
    }

    /// A tracker delegating to `f`.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&BoxError) -> bool + Send + Sync + 'static,
    {
        Tracker::Custom(Arc::new(f))
    }

    /// Both `self` and `other` hold.
    pub fn and(self, other: Tracker) -> Self {
        Tracker::And(Box::new(self), Box::new(other))
    }

    /// Either `self` or `other` holds.
    pub fn or(self, other: Tracker) -> Self {
        Tracker::Or(Box::new(self), Box::new(other))
    }

    /// `self` does not hold.
    pub fn negate(self) -> Self {
        Tracker::Not(Box::new(self))
    }

    /// Evaluates the tracker against an error.
    ///
    /// Pure: the verdict depends only on `error`. Custom predicates that
    /// panic evaluate to `false` (the outcome is counted as a success) and
    /// are logged under the `tracing` feature.
    pub fn eval(&self, error: &BoxError) -> bool {
        match self {
            Tracker::All => true,
            Tracker::TypeOf(matchers) => matchers.iter().any(|m| m.is_match(error)),
            Tracker::Custom(f) => {
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(error))) {
                    Ok(verdict) => verdict,
                    Err(_) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            error = %error,
                            "tracker predicate panicked; outcome counted as success"
                        );
                        false
                    }
                }
            }
            Tracker::And(left, right) => left.eval(error) && right.eval(error),
            Tracker::Or(left, right) => left.eval(error) || right.eval(error),
            Tracker::Not(inner) => !inner.eval(error),
        }
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Tracker::All
    }
}

impl ops::BitAnd for Tracker {
    type Output = Tracker;

    fn bitand(self, rhs: Tracker) -> Tracker {
        self.and(rhs)
    }
}

impl ops::BitOr for Tracker {
    type Output = Tracker;

    fn bitor(self, rhs: Tracker) -> Tracker {
        self.or(rhs)
    }
}

impl ops::Not for Tracker {
    type Output = Tracker;

    fn not(self) -> Tracker {
        self.negate()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tracker::All => f.write_str("All"),
            Tracker::TypeOf(matchers) => f.debug_tuple("TypeOf").field(matchers).finish(),
            Tracker::Custom(_) => f.debug_tuple("Custom").field(&"<closure>").finish(),
            Tracker::And(l, r) => f.debug_tuple("And").field(l).field(r).finish(),
            Tracker::Or(l, r) => f.debug_tuple("Or").field(l).field(r).finish(),
            Tracker::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
        }
    }
}
