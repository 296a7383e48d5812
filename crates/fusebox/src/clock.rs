use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in seconds since the Unix epoch.
///
/// All breaker bookkeeping uses wall-clock seconds; minor clock regressions
/// are tolerated by the window and state machine.
pub(crate) fn unix_now() -> f64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        // Clock before the epoch; treat as zero rather than panic.
        Err(_) => 0.0,
    }
}
