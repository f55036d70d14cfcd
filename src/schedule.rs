//! # Flush scheduling
//!
//! Detection runs every few frames while reporting runs on a fixed wall-clock period. The
//! [Scheduler] tracks the reporting period so that sinks see one summary per interval.

/// Millisecond instant of the monotonic clock driving the control loop.
pub type Instant = fugit::Instant<u64, 1, 1_000>;

/// Millisecond duration matching [Instant].
pub type Duration = fugit::Duration<u64, 1, 1_000>;

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Whether at least `interval` has passed between `last` and `now`.
///
/// A `now` earlier than `last` never flushes.
pub fn should_flush(now: Instant, last: Instant, interval: Duration) -> bool {
    now.checked_duration_since(last)
        .is_some_and(|elapsed| elapsed >= interval)
}

/// Convert a period in seconds to a [Duration], truncating to milliseconds.
pub fn period(seconds: f32) -> Duration {
    Duration::millis((seconds * 1000.0) as u64)
}

#[derive(Copy, Clone, Debug)]
pub struct Scheduler {
    interval: Duration,
    last_flush: Instant,
}

impl Scheduler {
    /// Construct a scheduler whose first period starts at `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_flush: now,
        }
    }

    /// Whether the current flush period has elapsed at `now`.
    pub fn due(&self, now: Instant) -> bool {
        should_flush(now, self.last_flush, self.interval)
    }

    /// Start a new flush period at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.last_flush = now;
    }

    pub fn last_flush(&self) -> Instant {
        self.last_flush
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
