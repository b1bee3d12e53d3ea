use std::time::{Duration, Instant};

/// The time values handed to every pass for one frame.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct FrameTime {
    /// Milliseconds since the clock's first tick.
    pub time_ms: f32,

    /// Milliseconds since the previous tick. Zero on the first tick.
    pub delta_ms: f32,
}

/// Produces per-frame time and delta, and reports the frame rate once per
/// second.
pub struct FrameClock {
    start: Option<Instant>,
    last_tick: Option<Instant>,
    window_start: Option<Instant>,
    frames_in_window: u32,
    last_fps: Option<f32>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: None,
            last_tick: None,
            window_start: None,
            frames_in_window: 0,
            last_fps: None,
        }
    }

    /// Advance the clock to now.
    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advance the clock to `now`.
    ///
    /// An instant earlier than the previous tick yields a zero delta.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let start = *self.start.get_or_insert(now);
        let delta = match self.last_tick {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        self.last_tick = Some(self.last_tick.map_or(now, |last| last.max(now)));
        self.count_frame(now);

        FrameTime {
            time_ms: as_millis(now.saturating_duration_since(start)),
            delta_ms: as_millis(delta),
        }
    }

    /// The frame rate measured over the last full second, if one has
    /// passed.
    pub fn last_fps(&self) -> Option<f32> {
        self.last_fps
    }

    fn count_frame(&mut self, now: Instant) {
        let window_start = *self.window_start.get_or_insert(now);
        self.frames_in_window += 1;

        let window = now.saturating_duration_since(window_start);
        if window >= Duration::from_secs(1) {
            let fps = self.frames_in_window as f32 / window.as_secs_f32();
            log::debug!("FPS: {:.1}", fps);
            self.last_fps = Some(fps);
            self.frames_in_window = 0;
            self.window_start = Some(now);
        }
    }
}

fn as_millis(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn the_first_tick_is_time_zero() {
        let mut clock = FrameClock::new();
        let frame = clock.tick_at(Instant::now());
        assert_eq!(frame, FrameTime::default());
    }

    #[test]
    fn deltas_measure_time_between_ticks() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick_at(start);
        let frame = clock.tick_at(start + Duration::from_millis(16));
        assert!((frame.delta_ms - 16.0).abs() < 1e-3);
        assert!((frame.time_ms - 16.0).abs() < 1e-3);

        let frame = clock.tick_at(start + Duration::from_millis(40));
        assert!((frame.delta_ms - 24.0).abs() < 1e-3);
        assert!((frame.time_ms - 40.0).abs() < 1e-3);
    }

    #[test]
    fn going_backwards_gives_a_zero_delta() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick_at(start + Duration::from_millis(100));
        let frame = clock.tick_at(start + Duration::from_millis(50));
        assert_eq!(frame.delta_ms, 0.0);
        assert!(frame.time_ms >= 0.0);
    }

    #[test]
    fn fps_is_reported_after_a_second() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        for frame in 0..=60 {
            clock.tick_at(start + Duration::from_millis(frame * 1000 / 60));
        }
        let fps = clock.last_fps().unwrap();
        assert!((fps - 61.0).abs() < 1.0, "fps was {}", fps);
    }
}
