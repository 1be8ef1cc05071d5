//! Pacers: the pure half of the rate scheduler.
//!
//! A [`Pacer`] maps a hit count to the offset, relative to the start of the
//! attack, at which that hit is authorized. The ticker in
//! [`crate::executor::rate`] turns those offsets into wall-clock instants.
//!
//! Offsets are always derived from the fixed start and the hit number, never
//! from the previous fire time, so late wake-ups do not accumulate:
//!
//! ```text
//! due(n) = start + n * per / freq
//! ```
//!
//! If the process falls behind, the next due offset is already in the past and
//! the ticker fires immediately until it has caught up with the schedule.
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Schedules hits relative to the start of an attack.
pub trait Pacer: Send + Sync + Clone + 'static {
    /// Offset from the start of the attack at which hit number `hits` (0-based)
    /// is authorized. `None` means the pacer will never fire again.
    fn due(&self, hits: u64) -> Option<Duration>;

    /// Configured hits per second at `elapsed`.
    fn rate(&self, elapsed: Duration) -> f64;
}

/// A constant rate of `freq` hits every `per`.
///
/// `Rate::per_second(100)` authorizes 100 evenly spaced hits each second.
/// A zero `freq` or zero `per` never fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub freq: u64,
    pub per: Duration,
}

impl Rate {
    pub fn new(freq: u64, per: Duration) -> Self {
        Self { freq, per }
    }

    pub fn per_second(freq: u64) -> Self {
        Self::new(freq, Duration::from_secs(1))
    }

    pub fn is_zero(&self) -> bool {
        self.freq == 0 || self.per.is_zero()
    }

    /// Number of hits this rate authorizes within `duration`.
    pub fn hits_within(&self, duration: Duration) -> u64 {
        if self.is_zero() {
            return 0;
        }
        // smallest n with n * per / freq >= duration
        let num = duration.as_nanos() * self.freq as u128;
        let per = self.per.as_nanos();
        saturate_u64(num.div_ceil(per))
    }
}

impl Pacer for Rate {
    fn due(&self, hits: u64) -> Option<Duration> {
        if self.is_zero() {
            return None;
        }
        let nanos = self.per.as_nanos() * hits as u128 / self.freq as u128;
        Some(Duration::from_nanos(saturate_u64(nanos)))
    }

    fn rate(&self, _elapsed: Duration) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        self.freq as f64 / self.per.as_secs_f64()
    }
}

/// A rate that starts at `start` and changes by `slope` hits per second, every
/// second.
///
/// A positive slope ramps up, a negative slope ramps down until the rate reaches
/// zero, after which the pacer stops firing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearPacer {
    pub start: Rate,
    pub slope: f64,
}

impl LinearPacer {
    pub fn new(start: Rate, slope: f64) -> Self {
        Self { start, slope }
    }
}

impl Pacer for LinearPacer {
    fn due(&self, hits: u64) -> Option<Duration> {
        if hits == 0 {
            return Some(Duration::ZERO);
        }
        let t = linear_due_secs(self.start.rate(Duration::ZERO), self.slope, hits as f64)?;
        Duration::try_from_secs_f64(t).ok()
    }

    fn rate(&self, elapsed: Duration) -> f64 {
        let r = self.start.rate(Duration::ZERO) + self.slope * elapsed.as_secs_f64();
        r.max(0.0)
    }
}

/// Smallest `t` (seconds) such that `r0 * t + slope * t^2 / 2 >= n`.
///
/// Uses the rationalized root `2n / (r0 + sqrt(r0^2 + 2 * slope * n))`, which is
/// stable as `slope` approaches zero and degenerates to `n / r0` when it is zero.
pub(crate) fn linear_due_secs(r0: f64, slope: f64, n: f64) -> Option<f64> {
    let discriminant = r0 * r0 + 2.0 * slope * n;
    if discriminant < 0.0 {
        return None;
    }
    let denominator = r0 + discriminant.sqrt();
    if denominator <= 0.0 {
        return None;
    }
    let t = 2.0 * n / denominator;
    t.is_finite().then_some(t)
}

fn saturate_u64(v: u128) -> u64 {
    v.min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    mod rate {
        use super::*;

        #[test]
        fn first_hit_is_due_at_start() {
            assert_eq!(Rate::per_second(50).due(0), Some(Duration::ZERO));
        }

        #[test]
        fn hits_are_evenly_spaced() {
            let rate = Rate::per_second(10);
            for n in 0..100u64 {
                assert_eq!(rate.due(n), Some(Duration::from_millis(100 * n)));
            }
        }

        #[test]
        fn offsets_do_not_drift_with_uneven_intervals() {
            // 1s / 3 cannot be represented exactly, but hit 3000 must still land
            // on exactly 1000s.
            let rate = Rate::per_second(3);
            assert_eq!(rate.due(1), Some(Duration::from_nanos(333_333_333)));
            assert_eq!(rate.due(2), Some(Duration::from_nanos(666_666_666)));
            assert_eq!(rate.due(3000), Some(Duration::from_secs(1000)));
        }

        #[test]
        fn custom_period() {
            let rate = Rate::new(5, Duration::from_secs(10));
            assert_eq!(rate.due(1), Some(Duration::from_secs(2)));
            assert_eq!(rate.rate(Duration::ZERO), 0.5);
        }

        #[test]
        fn zero_rate_never_fires() {
            assert_eq!(Rate::per_second(0).due(0), None);
            assert_eq!(Rate::new(10, Duration::ZERO).due(0), None);
            assert_eq!(Rate::per_second(0).hits_within(Duration::from_secs(5)), 0);
        }

        #[test]
        fn hits_within_duration() {
            assert_eq!(Rate::per_second(10).hits_within(Duration::from_secs(3)), 30);
            assert_eq!(Rate::per_second(3).hits_within(Duration::from_secs(1)), 3);
            assert_eq!(Rate::per_second(10).hits_within(Duration::ZERO), 0);
            // 250ms of 10/s authorizes hits at 0, 100 and 200ms
            assert_eq!(
                Rate::per_second(10).hits_within(Duration::from_millis(250)),
                3
            );
        }

        #[test]
        fn hits_within_matches_due() {
            for (freq, millis) in [(7u64, 1_000u64), (100, 2_500), (1, 10_000), (13, 333)] {
                let rate = Rate::per_second(freq);
                let duration = Duration::from_millis(millis);
                let counted = (0..)
                    .take_while(|n| rate.due(*n).is_some_and(|d| d < duration))
                    .count() as u64;
                assert_eq!(rate.hits_within(duration), counted, "{freq}/s for {millis}ms");
            }
        }
    }

    mod linear {
        use super::*;

        #[test]
        fn zero_slope_behaves_like_constant_rate() {
            let pacer = LinearPacer::new(Rate::per_second(10), 0.0);
            for n in 0..50u64 {
                let due = pacer.due(n).unwrap();
                let expected = Duration::from_millis(100 * n);
                let diff = due.abs_diff(expected);
                assert!(diff < Duration::from_micros(1), "hit {n}: {due:?}");
            }
        }

        #[test]
        fn ramp_up_reaches_expected_hit_count() {
            // r(t) = 10 + 10t, hits(1s) = 10 + 5 = 15
            let pacer = LinearPacer::new(Rate::per_second(10), 10.0);
            let due = pacer.due(15).unwrap();
            assert!(due.abs_diff(Duration::from_secs(1)) < Duration::from_micros(1));
            assert_eq!(pacer.rate(Duration::from_secs(2)), 30.0);
        }

        #[test]
        fn ramp_up_from_zero() {
            // hits(t) = t^2 / 2 * 8 = 4t^2, so hit 16 is due at 2s
            let pacer = LinearPacer::new(Rate::per_second(0), 8.0);
            assert_eq!(pacer.due(0), Some(Duration::ZERO));
            let due = pacer.due(16).unwrap();
            assert!(due.abs_diff(Duration::from_secs(2)) < Duration::from_micros(1));
        }

        #[test]
        fn ramp_down_stops_when_rate_is_exhausted() {
            // r(t) = 10 - 10t reaches zero at 1s after 5 hits
            let pacer = LinearPacer::new(Rate::per_second(10), -10.0);
            assert!(pacer.due(5).is_some());
            assert_eq!(pacer.due(6), None);
            assert_eq!(pacer.rate(Duration::from_secs(3)), 0.0);
        }

        #[test]
        fn due_offsets_are_monotonic() {
            let pacer = LinearPacer::new(Rate::per_second(5), 3.5);
            let mut last = Duration::ZERO;
            for n in 0..500 {
                let due = pacer.due(n).unwrap();
                assert!(due >= last);
                last = due;
            }
        }
    }
}
