//! The attenuated time source.
//!
//! Snaps never see the host's raw clock. [`SnapClock`] adds sub-millisecond
//! random noise to each reading and clamps the result to never move
//! backward, blunting the timing side-channels a high-resolution monotone
//! clock would otherwise offer.

use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;

/// A jittered, monotonically non-decreasing wall-clock source.
#[derive(Debug)]
pub struct SnapClock {
    /// High-water mark of values already handed out, in milliseconds.
    watermark: Mutex<f64>,
}

impl SnapClock {
    /// Create a clock with no readings handed out yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            watermark: Mutex::new(0.0),
        }
    }

    /// Current time in milliseconds since the Unix epoch, jittered.
    ///
    /// Successive calls never return a smaller value.
    #[allow(clippy::cast_precision_loss)]
    pub fn now_ms(&self) -> f64 {
        let raw = Utc::now().timestamp_millis() as f64;
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let candidate = raw + jitter;

        let mut watermark = self.watermark.lock().unwrap_or_else(|e| e.into_inner());
        if candidate > *watermark {
            *watermark = candidate;
        }
        *watermark
    }
}

impl Default for SnapClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_moves_backward() {
        let clock = SnapClock::new();
        let mut last = clock.now_ms();
        for _ in 0..1000 {
            let next = clock.now_ms();
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn tracks_wall_clock_roughly() {
        let clock = SnapClock::new();
        let reading = clock.now_ms();
        #[allow(clippy::cast_precision_loss)]
        let wall = Utc::now().timestamp_millis() as f64;
        // Jitter is sub-millisecond, so the reading stays within a small
        // window of the real clock.
        assert!((reading - wall).abs() < 10.0);
    }
}
