//! Frame timing statistics for the headless run.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling frame-time statistics.
#[derive(Debug)]
pub struct FrameStats {
    /// Frames recorded
    frames: u64,
    /// Sum of all frame times
    total: Duration,
    /// Slowest frame
    max: Duration,
    /// Start of the frame in progress
    frame_start: Option<Instant>,
    /// Recent frame times in seconds for averaging
    recent: VecDeque<f32>,
    /// Maximum samples kept in `recent`
    max_samples: usize,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(120)
    }
}

impl FrameStats {
    /// Creates empty stats averaging over `max_samples` recent frames.
    #[must_use]
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            frames: 0,
            total: Duration::ZERO,
            max: Duration::ZERO,
            frame_start: None,
            recent: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Marks the start of a frame.
    pub fn begin_frame(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    /// Marks the end of the frame started by `begin_frame`.
    ///
    /// Does nothing without a matching `begin_frame`.
    pub fn end_frame(&mut self) {
        if let Some(start) = self.frame_start.take() {
            self.record(start.elapsed());
        }
    }

    /// Records one frame duration.
    pub fn record(&mut self, elapsed: Duration) {
        self.frames += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);

        self.recent.push_back(elapsed.as_secs_f32());
        if self.recent.len() > self.max_samples {
            self.recent.pop_front();
        }
    }

    /// Frames recorded.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Mean frame time over the whole run in milliseconds.
    #[must_use]
    pub fn mean_frame_ms(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.total.as_secs_f64() * 1000.0 / self.frames as f64
    }

    /// Slowest frame in milliseconds.
    #[must_use]
    pub fn max_frame_ms(&self) -> f64 {
        self.max.as_secs_f64() * 1000.0
    }

    /// Frames per second averaged over recent frames.
    #[must_use]
    pub fn current_fps(&self) -> f32 {
        if self.recent.is_empty() {
            return 0.0;
        }

        let avg = self.recent.iter().sum::<f32>() / self.recent.len() as f32;
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }
}
