mod frame_clock;
mod frame_rate_limit;

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

pub use self::frame_clock::{FrameClock, FrameTime};

/// The simulation will run as fast as it possibly can. When workloads are low
/// this causes unreasonably high frame-rates and therefore unexpectedly high
/// CPU/GPU utilization. A frame rate limit sleeps for a bit of time each
/// frame to prevent it.
pub struct FrameRateLimit {
    frames_to_track: usize,
    frame_starts: VecDeque<Instant>,
    target_duration: Duration,
}
