// SPDX-License-Identifier: MIT
//! Exponential backoff arithmetic for the probe interval.
//!
//! The monitor widens its probe interval while offline and snaps back to the
//! base on any status flip. Both helpers here are pure so the schedule can be
//! reasoned about (and tested) without a running monitor. No jitter: the
//! interval sequence is part of the observable contract.

use std::time::Duration;

/// Next interval after a failed check: `current * factor`, capped at `max`.
pub fn grow(current: Duration, factor: f64, max: Duration) -> Duration {
    let next = (current.as_secs_f64() * factor).min(max.as_secs_f64());
    // A cap near Duration::MAX rounds past what from_secs_f64 accepts.
    Duration::try_from_secs_f64(next).unwrap_or(max)
}

/// Interval in force after `k` consecutive failures: `base * factor^k`,
/// capped at `max`.
pub fn nth_interval(base: Duration, factor: f64, max: Duration, k: u32) -> Duration {
    let scaled = (base.as_secs_f64() * factor.powi(k as i32)).min(max.as_secs_f64());
    Duration::try_from_secs_f64(scaled).unwrap_or(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn grow_doubles_until_capped() {
        let max = Duration::from_millis(4000);
        let mut interval = Duration::from_millis(1000);

        interval = grow(interval, 2.0, max);
        assert_eq!(interval, Duration::from_millis(2000));
        interval = grow(interval, 2.0, max);
        assert_eq!(interval, Duration::from_millis(4000));
        interval = grow(interval, 2.0, max);
        assert_eq!(interval, Duration::from_millis(4000));
    }

    #[test]
    fn grow_caps_mid_step() {
        // 10s * 2 = 20s, but max is 15s.
        let next = grow(Duration::from_secs(10), 2.0, Duration::from_secs(15));
        assert_eq!(next, Duration::from_secs(15));
    }

    #[test]
    fn grow_tolerates_an_unbounded_cap() {
        // Doubling from 10s crosses Duration's representable range well
        // before 80 steps; growth must saturate at the cap, not panic.
        let max = Duration::MAX;
        let mut interval = Duration::from_secs(10);
        for _ in 0..80 {
            let next = grow(interval, 2.0, max);
            assert!(next >= interval);
            interval = next;
        }
        assert_eq!(interval, Duration::MAX);
    }

    #[test]
    fn nth_interval_tolerates_exponent_overflow() {
        // factor^k overflows f64 to infinity; the cap still wins.
        let base = Duration::from_secs(10);
        assert_eq!(nth_interval(base, 2.0, Duration::MAX, 4096), Duration::MAX);
        assert_eq!(
            nth_interval(base, 2.0, Duration::from_secs(60), 4096),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn nth_interval_matches_hand_computed_schedule() {
        let base = Duration::from_secs(10);
        let max = Duration::from_secs(60);
        assert_eq!(nth_interval(base, 2.0, max, 0), Duration::from_secs(10));
        assert_eq!(nth_interval(base, 2.0, max, 1), Duration::from_secs(20));
        assert_eq!(nth_interval(base, 2.0, max, 2), Duration::from_secs(40));
        assert_eq!(nth_interval(base, 2.0, max, 3), Duration::from_secs(60));
        assert_eq!(nth_interval(base, 2.0, max, 10), Duration::from_secs(60));
    }

    proptest! {
        #[test]
        fn nth_interval_stays_within_bounds(
            base_ms in 1u64..60_000,
            factor in 1.01f64..8.0,
            cap_mult in 1u64..64,
            k in 0u32..32,
        ) {
            let base = Duration::from_millis(base_ms);
            let max = base * cap_mult as u32;
            let interval = nth_interval(base, factor, max, k);
            prop_assert!(interval >= base);
            prop_assert!(interval <= max);
        }

        #[test]
        fn nth_interval_is_monotone_in_failures(
            base_ms in 1u64..60_000,
            factor in 1.01f64..8.0,
            cap_mult in 1u64..64,
            k in 0u32..31,
        ) {
            let base = Duration::from_millis(base_ms);
            let max = base * cap_mult as u32;
            prop_assert!(
                nth_interval(base, factor, max, k) <= nth_interval(base, factor, max, k + 1)
            );
        }

        #[test]
        fn stepping_agrees_with_closed_form(
            base_ms in 1u64..60_000,
            factor in 1.01f64..4.0,
            cap_mult in 1u64..64,
            steps in 0u32..16,
        ) {
            let base = Duration::from_millis(base_ms);
            let max = base * cap_mult as u32;
            let mut stepped = base;
            for _ in 0..steps {
                stepped = grow(stepped, factor, max);
            }
            let closed = nth_interval(base, factor, max, steps);
            // Repeated multiplication and powi round differently; allow 1ms.
            let diff = stepped.abs_diff(closed);
            prop_assert!(diff <= Duration::from_millis(1), "stepped {stepped:?} vs closed {closed:?}");
        }
    }
}
