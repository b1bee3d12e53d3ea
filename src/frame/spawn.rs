use crate::{
    config::SpawnConfig, emission::EmitRequest, timing::FrameTime,
};

/// Decides whether anything is emitted on a frame.
pub trait SpawnPolicy {
    /// The emission to run this frame, if any.
    fn next_emission(&mut self, time: FrameTime) -> Option<EmitRequest<'_>>;
}

/// Never emits.
#[derive(Debug, Copy, Clone, Default)]
pub struct Idle;

impl SpawnPolicy for Idle {
    fn next_emission(&mut self, _time: FrameTime) -> Option<EmitRequest<'_>> {
        None
    }
}

/// Emits a fixed-size burst every `interval_ms` until `until_ms` has
/// elapsed.
///
/// At most one burst is emitted per frame. Frames slower than the interval
/// skip the missed bursts instead of catching up. Schedule arithmetic runs in
/// f64 so long runs keep their resolution.
#[derive(Debug, Clone)]
pub struct TimedBurst {
    count: u32,
    interval_ms: f64,
    until_ms: f64,
    radius: f32,
    point_size: f32,
    phase_rate: f32,
    glyphs: Vec<i32>,
    next_burst_ms: f64,
}

impl TimedBurst {
    pub fn new(
        count: u32,
        interval_ms: f32,
        until_ms: f32,
        radius: f32,
        point_size: f32,
        phase_rate: f32,
        glyphs: Vec<i32>,
    ) -> Self {
        Self {
            count,
            interval_ms: f64::from(interval_ms.max(f32::EPSILON)),
            until_ms: f64::from(until_ms),
            radius,
            point_size,
            phase_rate,
            glyphs,
            next_burst_ms: 0.0,
        }
    }
}

impl SpawnPolicy for TimedBurst {
    fn next_emission(&mut self, time: FrameTime) -> Option<EmitRequest<'_>> {
        let now = f64::from(time.time_ms);
        if now >= self.until_ms || now < self.next_burst_ms {
            return None;
        }
        self.next_burst_ms = next_burst_after(now, self.interval_ms);
        Some(EmitRequest {
            count: self.count,
            radius: self.radius,
            point_size: self.point_size,
            glyphs: &self.glyphs,
            phase_offset: time.time_ms * self.phase_rate,
        })
    }
}

/// The first interval boundary strictly after `now`.
fn next_burst_after(now: f64, interval_ms: f64) -> f64 {
    let next = (now / interval_ms).floor() * interval_ms + interval_ms;
    if next > now {
        next
    } else {
        // the interval is below the resolution of `now`
        now + interval_ms.max(now * f64::EPSILON)
    }
}

impl SpawnConfig {
    /// Build the configured policy. Bursts cycle through `glyphs`.
    pub fn build_policy(&self, glyphs: Vec<i32>) -> Box<dyn SpawnPolicy> {
        match *self {
            SpawnConfig::Idle => Box::new(Idle),
            SpawnConfig::TimedBurst {
                count,
                interval_ms,
                until_ms,
                radius,
                point_size,
                phase_rate,
            } => Box::new(TimedBurst::new(
                count,
                interval_ms,
                until_ms,
                radius,
                point_size,
                phase_rate,
                glyphs,
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    fn at(time_ms: f32) -> FrameTime {
        FrameTime {
            time_ms,
            delta_ms: 16.0,
        }
    }

    fn burst() -> TimedBurst {
        TimedBurst::new(12, 100.0, 1000.0, 0.25, 4.0, 0.001, vec![0, 1])
    }

    #[test]
    fn idle_never_emits() {
        let mut idle = Idle;
        assert!(idle.next_emission(at(0.0)).is_none());
        assert!(idle.next_emission(at(5000.0)).is_none());
    }

    #[test]
    fn bursts_fire_once_per_interval() {
        let mut policy = burst();
        let fired: Vec<f32> = [0.0, 16.0, 99.0, 100.0, 150.0, 230.0]
            .into_iter()
            .filter(|&time| policy.next_emission(at(time)).is_some())
            .collect();
        assert_eq!(fired, vec![0.0, 100.0, 230.0]);
    }

    #[test]
    fn bursts_stop_after_the_deadline() {
        let mut policy = burst();
        assert!(policy.next_emission(at(999.0)).is_some());
        assert!(policy.next_emission(at(1000.0)).is_none());
        assert!(policy.next_emission(at(2000.0)).is_none());
    }

    #[test]
    fn burst_phase_turns_with_time() {
        let mut policy = burst();
        let request = policy.next_emission(at(500.0)).unwrap();
        assert_eq!(request.count, 12);
        assert_eq!(request.radius, 0.25);
        assert_eq!(request.point_size, 4.0);
        assert_eq!(request.glyphs, &[0, 1]);
        assert!((request.phase_offset - 0.5).abs() < 1e-6);
    }

    #[test]
    fn config_builds_the_matching_policy() {
        let mut idle = SpawnConfig::Idle.build_policy(vec![]);
        assert!(idle.next_emission(at(0.0)).is_none());

        let mut timed = SpawnConfig::TimedBurst {
            count: 3,
            interval_ms: 10.0,
            until_ms: 100.0,
            radius: 0.1,
            point_size: 2.0,
            phase_rate: 0.0,
        }
        .build_policy(vec![5]);
        assert_eq!(timed.next_emission(at(0.0)).map(|r| r.count), Some(3));
    }

    #[test]
    fn tiny_intervals_fire_once_per_frame() {
        let mut policy =
            TimedBurst::new(1, 0.0001, 1e9, 0.25, 4.0, 0.0, vec![0]);
        assert!(policy.next_emission(at(5000.0)).is_some());
        assert!(policy.next_emission(at(5000.0)).is_none());
        assert!(policy.next_emission(at(5016.0)).is_some());
    }

    #[test]
    fn late_frames_skip_the_missed_bursts() {
        let mut policy = burst();
        policy.until_ms = f64::from(f32::MAX);
        assert!(policy.next_emission(at(0.0)).is_some());
        assert!(policy.next_emission(at(10_000.5)).is_some());
        assert!(policy.next_emission(at(10_050.0)).is_none());
        assert!(policy.next_emission(at(10_100.0)).is_some());
    }

    #[test]
    fn long_runs_keep_their_schedule() {
        let mut policy =
            TimedBurst::new(1, 0.5, f32::MAX, 0.25, 4.0, 0.0, vec![]);
        assert!(policy.next_emission(at(1.7e7)).is_some());
        assert!(policy.next_emission(at(1.7e7)).is_none());
        assert!(policy.next_emission(at(1.7e7 + 2.0)).is_some());
    }

    #[test]
    fn the_next_burst_is_always_in_the_future() {
        for (now, interval) in [
            (0.0, 100.0),
            (250.0, 100.0),
            (5000.0, 0.0001),
            (1e30, f64::from(f32::EPSILON)),
        ] {
            assert!(next_burst_after(now, interval) > now, "{} {}", now, interval);
        }
        assert_eq!(next_burst_after(250.0, 100.0), 300.0);
    }
}
