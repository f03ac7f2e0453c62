//! Rolling-window throughput estimator.
//!
//! [`SpeedStat`] counts received bytes and recomputes the average speed at
//! most once per [`SPEED_WINDOW`]. ETA and progress are derived from those two
//! numbers and a caller-supplied target size.

use std::time::{Duration, Instant};

/// Minimum elapsed time before the average speed is recomputed.
pub const SPEED_WINDOW: Duration = Duration::from_millis(1000);

/// Byte counter with a windowed average speed.
///
/// Not synchronized; owners that share it across tasks wrap it in a mutex.
#[derive(Debug, Clone)]
pub struct SpeedStat {
    total_bytes: i64,
    average_speed: i64,
    window_start: Instant,
    bytes_at_window_start: i64,
}

impl Default for SpeedStat {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedStat {
    /// Creates a counter whose first window starts now.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a counter whose first window starts at `now`.
    #[must_use]
    pub fn starting_at(now: Instant) -> Self {
        Self {
            total_bytes: 0,
            average_speed: 0,
            window_start: now,
            bytes_at_window_start: 0,
        }
    }

    /// Records `num_bytes` received at the current instant.
    pub fn update(&mut self, num_bytes: u32) {
        self.update_at(num_bytes, Instant::now());
    }

    /// Records `num_bytes` received at `now`.
    ///
    /// The window only closes once strictly more than [`SPEED_WINDOW`] has
    /// elapsed; the average is then replaced by the rate over that window.
    pub fn update_at(&mut self, num_bytes: u32, now: Instant) {
        self.total_bytes = self.total_bytes.saturating_add(i64::from(num_bytes));

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed > SPEED_WINDOW {
            let elapsed_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
            let window_bytes = self.total_bytes - self.bytes_at_window_start;
            self.average_speed = window_bytes.saturating_mul(1000) / elapsed_ms;
            self.window_start = now;
            self.bytes_at_window_start = self.total_bytes;
        }
    }

    /// Total bytes recorded so far.
    #[must_use]
    pub fn total_bytes(&self) -> i64 {
        self.total_bytes
    }

    /// Average speed in bytes per second; 0 until the first window closes.
    #[must_use]
    pub fn average_speed(&self) -> i64 {
        self.average_speed
    }

    /// Estimated seconds remaining to reach `target_size`.
    ///
    /// Returns 0 when nothing remains and -1 when the speed is still unknown.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn eta(&self, target_size: f64) -> i64 {
        let remaining = target_size - self.total_bytes as f64;
        if remaining <= 0.0 {
            return 0;
        }
        if self.average_speed <= 0 {
            return -1;
        }
        (remaining / self.average_speed as f64) as i64
    }

    /// Percentage of `target_size` received. Not clamped above 100.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn progress(&self, target_size: f64) -> i32 {
        if target_size > 0.0 {
            ((self.total_bytes as f64 * 100.0) / target_size) as i32
        } else {
            0
        }
    }
}
