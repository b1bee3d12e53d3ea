use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use super::FrameRateLimit;

impl FrameRateLimit {
    /// Create a new frame rate limit for a given target fps.
    ///
    /// A target of zero is treated as one frame per second.
    pub fn new(target_fps: u32, frames_to_track: usize) -> Self {
        let frames_to_track = frames_to_track.max(1);
        Self {
            frames_to_track,
            frame_starts: VecDeque::with_capacity(frames_to_track + 1),
            target_duration: Duration::from_secs(1) / target_fps.max(1),
        }
    }

    pub fn target_duration(&self) -> Duration {
        self.target_duration
    }

    /// Call at the beginning of each frame to establish the start-point when
    /// computing elapsed time.
    pub fn start_frame(&mut self) {
        if self.frame_starts.len() > self.frames_to_track {
            self.frame_starts.pop_back();
        }
        self.frame_starts.push_front(Instant::now());
    }

    /// Sleep for any remaining time in the target fps.
    pub fn sleep_to_limit(&self) {
        let Some(frame_start) = self.frame_starts.front() else {
            return;
        };
        let elapsed = frame_start.elapsed();
        if elapsed < self.target_duration {
            spin_sleep::sleep(self.target_duration - elapsed);
        }
    }

    /// Return the average amount of time spent on the last n frames.
    /// N is the value given for `frames_to_track` when creating the frame
    /// rate limit.
    pub fn avg_frame_time(&self) -> Duration {
        match self.frame_starts.back() {
            Some(oldest_frame) => {
                oldest_frame.elapsed() / self.frame_starts.len() as u32
            }
            None => Duration::ZERO,
        }
    }
}
