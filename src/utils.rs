/// Utility functions for timestamps and loop pacing
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Longest uninterrupted sleep inside a backoff wait
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Format a timestamp as RFC 3339 for API responses
///
/// Falls back to the default string representation if formatting fails.
pub fn format_timestamp(dt: &OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string())
}

/// Sleep for `duration` while `running` stays set
///
/// The wait is split into short slices so a cleared flag is noticed quickly.
/// Returns `false` if the flag was cleared before the full duration elapsed.
pub fn sleep_while_running(running: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
