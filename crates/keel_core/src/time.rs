//! Frame pacing and timing

use keel_metrics::FrameTimer;
use std::time::{Duration, Instant};

/// Drives per-frame delta/total time and a rolling frame-time average.
pub struct FrameClock {
    started: Instant,
    last_tick: Instant,
    timer: FrameTimer,
    delta: Duration,
}

impl FrameClock {
    /// `window` is the number of frames the rolling average covers.
    pub fn new(window: usize) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_tick: now,
            timer: FrameTimer::new(window),
            delta: Duration::ZERO,
        }
    }

    /// Advance to the next frame, returning the delta since the last tick.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        self.delta = now - self.last_tick;
        self.last_tick = now;
        self.timer.end();
        self.timer.begin();
        self.delta
    }

    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn average_frame_ms(&self) -> f64 {
        self.timer.average_frame_ms()
    }

    pub fn fps(&self) -> f64 {
        self.timer.fps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_advance_time() {
        let mut clock = FrameClock::new(8);
        std::thread::sleep(Duration::from_millis(2));
        let delta = clock.tick();
        assert!(delta >= Duration::from_millis(1));
        assert!(clock.total() >= delta);
    }
}
