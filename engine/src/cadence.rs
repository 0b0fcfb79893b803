use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What drives the tick chain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum FrameCadence {
    /// One tick per display refresh.
    #[default]
    VSync,
    /// Fixed-rate timer; bounds readback cost while painting.
    FixedInterval { hz: f32 },
}

impl FrameCadence {
    pub const DEFAULT_FIXED_HZ: f32 = 30.0;
    pub const MIN_FIXED_HZ: f32 = 1.0;
    pub const MAX_FIXED_HZ: f32 = 240.0;

    pub fn default_fixed() -> Self {
        FrameCadence::FixedInterval { hz: Self::DEFAULT_FIXED_HZ }
    }

    /// Rate clamped to `MIN_FIXED_HZ..=MAX_FIXED_HZ`; NaN, infinite and non-positive rates become the default.
    pub fn sanitized(self) -> Self {
        match self {
            FrameCadence::VSync => FrameCadence::VSync,
            FrameCadence::FixedInterval { hz } => FrameCadence::FixedInterval { hz: clamp_hz(hz) },
        }
    }

    fn interval(self) -> Option<Duration> {
        match self {
            FrameCadence::VSync => None,
            FrameCadence::FixedInterval { hz } => {
                let nanos = (1e9 / clamp_hz(hz) as f64).round() as u64;
                Some(Duration::from_nanos(nanos.max(1)))
            }
        }
    }
}

fn clamp_hz(hz: f32) -> f32 {
    if hz.is_finite() && hz > 0.0 {
        hz.clamp(FrameCadence::MIN_FIXED_HZ, FrameCadence::MAX_FIXED_HZ)
    } else {
        FrameCadence::DEFAULT_FIXED_HZ
    }
}

/// Decides, per display frame, whether a tick is due.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    cadence: FrameCadence,
    accumulator: Duration,
    running: bool,
    ticks: u64,
}

impl TickScheduler {
    pub fn new(cadence: FrameCadence) -> Self {
        Self { cadence, accumulator: Duration::ZERO, running: true, ticks: 0 }
    }

    pub fn cadence(&self) -> FrameCadence {
        self.cadence
    }

    pub fn set_cadence(&mut self, cadence: FrameCadence) {
        if cadence != self.cadence {
            self.cadence = cadence;
            self.accumulator = Duration::ZERO;
        }
    }

    /// Advance by one display frame of length `dt`. Returns true when a tick should run.
    ///
    /// At most one tick per display frame; a fixed-interval backlog is dropped rather than replayed.
    pub fn advance(&mut self, dt: Duration) -> bool {
        if !self.running {
            return false;
        }
        let due = match self.cadence.interval() {
            None => true,
            Some(interval) => {
                self.accumulator = self.accumulator.saturating_add(dt);
                if self.accumulator >= interval {
                    // 一帧超过整个间隔时清零，不把积压带到下一帧
                    self.accumulator = if dt >= interval { Duration::ZERO } else { self.accumulator - interval };
                    true
                } else {
                    false
                }
            }
        };
        if due {
            self.ticks += 1;
        }
        due
    }

    /// Stop scheduling further ticks.
    pub fn cancel(&mut self) {
        self.running = false;
        self.accumulator = Duration::ZERO;
    }

    pub fn resume(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_60: Duration = Duration::from_micros(16_667);

    #[test]
    fn vsync_ticks_every_frame() {
        let mut s = TickScheduler::new(FrameCadence::VSync);
        assert!((0..10).all(|_| s.advance(FRAME_60)));
        assert_eq!(s.ticks(), 10);
    }

    #[test]
    fn fixed_interval_ticks_at_its_own_rate() {
        let mut s = TickScheduler::new(FrameCadence::default_fixed());
        let ticks = (0..60).filter(|_| s.advance(FRAME_60)).count();
        assert!((29..=30).contains(&ticks), "{ticks}");
    }

    #[test]
    fn long_frame_yields_a_single_tick() {
        let mut s = TickScheduler::new(FrameCadence::FixedInterval { hz: 10.0 });
        assert!(s.advance(Duration::from_secs(1)));
        assert!(!s.advance(Duration::from_millis(10)));
    }

    #[test]
    fn long_frame_at_an_uneven_rate_leaves_no_backlog() {
        let mut s = TickScheduler::new(FrameCadence::FixedInterval { hz: 7.0 });
        assert!(s.advance(Duration::from_secs(1)));
        assert!(!s.advance(Duration::from_millis(10)));
        assert!(!s.advance(Duration::from_millis(100)));
        assert!(s.advance(Duration::from_millis(50)));
    }

    #[test]
    fn extreme_rates_are_clamped() {
        let mut fast = TickScheduler::new(FrameCadence::FixedInterval { hz: 1e10 });
        assert!(fast.advance(FRAME_60));
        assert!(!fast.advance(Duration::from_nanos(1)));
        assert!(fast.advance(Duration::from_millis(5)));

        let mut slow = TickScheduler::new(FrameCadence::FixedInterval { hz: 1e-30 });
        assert!(!slow.advance(Duration::from_millis(999)));
        assert!(slow.advance(Duration::from_millis(1)));
    }

    #[test]
    fn sanitized_clamps_the_rate() {
        assert_eq!(FrameCadence::FixedInterval { hz: 1e10 }.sanitized(), FrameCadence::FixedInterval { hz: 240.0 });
        assert_eq!(FrameCadence::FixedInterval { hz: 1e-30 }.sanitized(), FrameCadence::FixedInterval { hz: 1.0 });
        assert_eq!(FrameCadence::FixedInterval { hz: f32::NAN }.sanitized(), FrameCadence::default_fixed());
        assert_eq!(FrameCadence::VSync.sanitized(), FrameCadence::VSync);
    }

    #[test]
    fn cancel_stops_the_chain_until_resumed() {
        let mut s = TickScheduler::new(FrameCadence::VSync);
        s.cancel();
        assert!(!s.advance(FRAME_60));
        assert!(!s.is_running());
        s.resume();
        assert!(s.advance(FRAME_60));
    }

    #[test]
    fn bad_rate_falls_back_to_default() {
        let mut s = TickScheduler::new(FrameCadence::FixedInterval { hz: 0.0 });
        assert!(!s.advance(Duration::from_millis(20)));
        assert!(s.advance(Duration::from_millis(20)));
    }
}
