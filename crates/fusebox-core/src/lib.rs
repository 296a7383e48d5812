//! Core infrastructure for fusebox.
//!
//! This crate provides the signal system shared by the fusebox engines:
//! - Signal and listener traits
//! - A dispatch bus that isolates listener panics

pub mod signal;

pub use signal::{
    AsyncFnListener, AsyncSignalListener, BreakerSignal, FnListener, SignalBus, SignalListener,
};
