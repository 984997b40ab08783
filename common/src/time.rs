use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch.
pub type Timestamp = u64;

/// Current wall-clock time in milliseconds.
pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

static LAST_TIMEPOINT: AtomicU64 = AtomicU64::new(0);

/// Mint a strictly increasing millisecond timepoint.
///
/// Activity ids are ordered by `(timepoint, eid)`; commands issued within the
/// same millisecond must still receive distinct, increasing timepoints, so
/// the mint never returns a value twice within a process lifetime.
pub fn next_timepoint() -> Timestamp {
    let now = now_ms();
    let mut last = LAST_TIMEPOINT.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_TIMEPOINT.compare_exchange_weak(
            last,
            candidate,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(observed) => last = observed,
        }
    }
}
