//! Time management utilities
//!
//! [`FixedStepClock`] turns variable frame times into a whole number of
//! fixed simulation steps. [`Stopwatch`] measures wall time spent stepping.

use std::time::{Duration, Instant};

/// Accumulator that converts frame time into fixed steps
#[derive(Debug, Clone, Default)]
pub struct FixedStepClock {
    accumulator: f32,
    dropped_time: f32,
}

impl FixedStepClock {
    /// Create an empty clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed `frame_dt` seconds and return how many steps of `step_interval`
    /// seconds to run, never more than `max_steps`.
    ///
    /// Time that would require more than `max_steps` steps is discarded so the
    /// simulation slows down instead of spiralling.
    pub fn advance(&mut self, frame_dt: f32, step_interval: f32, max_steps: u32) -> u32 {
        if !(frame_dt.is_finite() && frame_dt > 0.0) || !(step_interval > 0.0) {
            return 0;
        }
        self.accumulator += frame_dt;

        let mut steps = 0;
        while self.accumulator >= step_interval && steps < max_steps {
            self.accumulator -= step_interval;
            steps += 1;
        }

        if self.accumulator >= step_interval {
            let dropped = self.accumulator - self.accumulator % step_interval;
            self.dropped_time += dropped;
            self.accumulator -= dropped;
            log::warn!(
                "Physics fell behind: dropped {:.4}s of simulation time (max {} steps per update)",
                dropped,
                max_steps
            );
        }
        steps
    }

    /// Fraction of a step currently buffered, in `[0, 1)`
    pub fn alpha(&self, step_interval: f32) -> f32 {
        if step_interval > 0.0 {
            (self.accumulator / step_interval).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Seconds waiting in the accumulator
    pub fn accumulated(&self) -> f32 {
        self.accumulator
    }

    /// Total seconds discarded because of the step cap
    pub fn dropped_time(&self) -> f32 {
        self.dropped_time
    }

    /// Forget buffered time
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

/// Simple stopwatch for measuring elapsed time
#[derive(Debug, Clone)]
pub struct Stopwatch {
    start_time: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start_new()
    }
}

impl Stopwatch {
    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Time since the stopwatch was started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
