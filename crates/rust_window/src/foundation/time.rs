//! Time management utilities

use std::time::{Duration, Instant};

/// Length of the window over which the frame rate is measured
const SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Frame clock for measuring the rendered frame rate
///
/// Ticked once per rendered frame on the main thread. The frame rate is the
/// number of frames rendered over the most recent complete sample window, so
/// it only changes about once per second, which keeps the title stable.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_frame: Instant,
    delta_time: f64,
    frame_count: u64,
    window_start: Instant,
    window_frames: u32,
    frame_rate: f64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a new clock starting now
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a new clock starting at `start`
    pub fn starting_at(start: Instant) -> Self {
        Self {
            last_frame: start,
            delta_time: 0.0,
            frame_count: 0,
            window_start: start,
            window_frames: 0,
            frame_rate: 0.0,
        }
    }

    /// Record a rendered frame
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Record a rendered frame that completed at `now`
    pub fn tick_at(&mut self, now: Instant) {
        self.delta_time = now.saturating_duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;
        self.frame_count += 1;
        self.window_frames += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= SAMPLE_WINDOW {
            self.frame_rate = f64::from(self.window_frames) / elapsed.as_secs_f64();
            self.window_start = now;
            self.window_frames = 0;
        }
    }

    /// Time between the last two frames in seconds
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Total frames recorded
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second over the last complete sample window
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}
