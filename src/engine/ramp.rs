//! Hold acceleration for repeating actions (wheel, cursor increments).

use crate::binding::{RampSpec, MAX_RAMP_MS, MAX_RAMP_RATE};
use std::time::{Duration, Instant};

pub const DEFAULT_INIT_RATE: u32 = 5;
pub const DEFAULT_MAX_RATE: u32 = 30;
pub const DEFAULT_RAMP_MS: u64 = 1000;

/// Upper bound on ticks released by one `due_ticks` call.
pub const MAX_TICKS_PER_UPDATE: u32 = 32;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Linear rate curve from `init_rate` to `max_rate` ticks per second over
/// `ramp`, flat afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ramp {
    init_rate: f64,
    max_rate: f64,
    ramp: Duration,
}

impl Ramp {
    /// Zero fields take the defaults; `max_rate` never drops below
    /// `init_rate`. Rates are capped at `MAX_RAMP_RATE`.
    pub fn from_spec(spec: &RampSpec) -> Self {
        let init = if spec.init_rate == 0 {
            DEFAULT_INIT_RATE
        } else {
            spec.init_rate.min(MAX_RAMP_RATE)
        };
        let max = if spec.max_rate == 0 {
            DEFAULT_MAX_RATE
        } else {
            spec.max_rate.min(MAX_RAMP_RATE)
        }
        .max(init);
        let ramp_ms = if spec.ramp_ms == 0 {
            DEFAULT_RAMP_MS
        } else {
            spec.ramp_ms.min(MAX_RAMP_MS)
        };

        Self {
            init_rate: init as f64,
            max_rate: max as f64,
            ramp: Duration::from_millis(ramp_ms),
        }
    }

    /// Ticks per second after `elapsed` of holding.
    pub fn rate_at(&self, elapsed: Duration) -> f64 {
        if elapsed >= self.ramp {
            return self.max_rate;
        }
        let progress = elapsed.as_secs_f64() / self.ramp.as_secs_f64();
        self.init_rate + (self.max_rate - self.init_rate) * progress
    }

    /// Never shorter than one millisecond.
    pub fn interval_at(&self, elapsed: Duration) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_at(elapsed)).max(MIN_INTERVAL)
    }
}

/// Running ramp of one held action.
///
/// The emission timestamp advances by whole intervals, never to `now`, so
/// ticks are neither dropped nor doubled across frame boundaries. After a
/// stall longer than `MAX_TICKS_PER_UPDATE` intervals the backlog is dropped
/// and the timer resumes from `now`.
#[derive(Clone, Copy, Debug)]
pub struct RampTimer {
    ramp: Ramp,
    started: Instant,
    last: Instant,
}

impl RampTimer {
    pub fn start(ramp: Ramp, now: Instant) -> Self {
        Self {
            ramp,
            started: now,
            last: now,
        }
    }

    /// Number of ticks due at `now`.
    pub fn due_ticks(&mut self, now: Instant) -> u32 {
        let mut ticks = 0;
        while ticks < MAX_TICKS_PER_UPDATE {
            let interval = self.ramp.interval_at(self.last.duration_since(self.started));
            if now.saturating_duration_since(self.last) < interval {
                return ticks;
            }
            self.last += interval;
            ticks += 1;
        }
        self.last = self.last.max(now);
        ticks
    }

    pub fn current_rate(&self, now: Instant) -> f64 {
        self.ramp.rate_at(now.saturating_duration_since(self.started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(init: u32, max: u32, ms: u64) -> Ramp {
        Ramp::from_spec(&RampSpec {
            init_rate: init,
            max_rate: max,
            ramp_ms: ms,
        })
    }

    #[test]
    fn test_rate_curve_is_clamped() {
        let r = ramp(5, 30, 1000);
        assert!((r.rate_at(Duration::ZERO) - 5.0).abs() < 1e-9);
        assert!((r.rate_at(Duration::from_millis(500)) - 17.5).abs() < 1e-9);
        assert!((r.rate_at(Duration::from_millis(1000)) - 30.0).abs() < 1e-9);
        assert!((r.rate_at(Duration::from_millis(2000)) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_defaults_and_normalization() {
        assert_eq!(ramp(0, 0, 0), ramp(5, 30, 1000));
        // max below init is raised to init
        let flat = ramp(20, 10, 500);
        assert!((flat.rate_at(Duration::from_millis(250)) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_ticks_do_not_drift_across_frames() {
        let start = Instant::now();
        let flat = ramp(10, 10, 1000);

        // one frame covering a whole second
        let mut whole = RampTimer::start(flat, start);
        let in_one = whole.due_ticks(start + Duration::from_secs(1));

        // same second in 4ms frames
        let mut framed = RampTimer::start(flat, start);
        let mut in_frames = 0;
        for frame in 1..=250 {
            in_frames += framed.due_ticks(start + Duration::from_millis(4 * frame));
        }

        assert_eq!(in_one, 10);
        assert_eq!(in_frames, 10);
    }

    #[test]
    fn test_extreme_rates_are_capped() {
        let start = Instant::now();
        let fast = ramp(4_000_000_000, 4_000_000_000, 1000);
        assert!((fast.rate_at(Duration::ZERO) - MAX_RAMP_RATE as f64).abs() < 1e-9);
        assert!(fast.interval_at(Duration::ZERO) >= Duration::from_millis(1));

        let mut timer = RampTimer::start(fast, start);
        assert_eq!(timer.due_ticks(start + Duration::from_millis(10)), 10);
    }

    #[test]
    fn test_long_stall_releases_bounded_burst() {
        let start = Instant::now();
        let mut timer = RampTimer::start(ramp(1000, 1000, 1000), start);

        let after_stall = start + Duration::from_secs(60);
        assert_eq!(timer.due_ticks(after_stall), MAX_TICKS_PER_UPDATE);
        // the backlog is gone, not replayed
        assert_eq!(timer.due_ticks(after_stall), 0);
        assert_eq!(timer.due_ticks(after_stall + Duration::from_millis(3)), 3);
    }

    #[test]
    fn test_nothing_due_right_after_start() {
        let start = Instant::now();
        let mut timer = RampTimer::start(ramp(5, 30, 1000), start);
        assert_eq!(timer.due_ticks(start), 0);
        assert_eq!(timer.due_ticks(start + Duration::from_millis(199)), 0);
        assert_eq!(timer.due_ticks(start + Duration::from_millis(200)), 1);
    }
}
