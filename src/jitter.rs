//! Timer jitter so independently-running confirmers do not poll in lockstep.

use std::time::Duration;

use rand::Rng;

/// Symmetric jitter applied to the confirmer poll period.
pub const DEFAULT_JITTER_PERCENT: u8 = 25;

/// Uniform sample in `[base·(1−pct/100), base·(1+pct/100)]`, recomputed on
/// every call so the deviation differs tick to tick.
pub fn jittered(base: Duration, percent: u8) -> Duration {
    if base.is_zero() || percent == 0 {
        return base;
    }
    let base_ms = base.as_millis();
    let spread = base_ms
        .saturating_mul(u128::from(percent))
        .checked_div(100)
        .unwrap_or(0);
    let low = base_ms.saturating_sub(spread);
    let high = base_ms.saturating_add(spread);
    let sampled = rand::thread_rng().gen_range(low..=high);
    Duration::from_millis(u64::try_from(sampled).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_bounds() {
        let base = Duration::from_secs(10);
        for _ in 0..1_000 {
            let sampled = jittered(base, 25);
            assert!(sampled >= Duration::from_millis(7_500), "{sampled:?}");
            assert!(sampled <= Duration::from_millis(12_500), "{sampled:?}");
        }
    }

    #[test]
    fn varies_between_calls() {
        let base = Duration::from_secs(10);
        let samples: Vec<_> = (0..100).map(|_| jittered(base, 25)).collect();
        let first = samples[0];
        assert!(
            samples.iter().any(|sample| *sample != first),
            "a hundred identical samples is not jitter"
        );
    }

    #[test]
    fn zero_percent_is_identity() {
        let base = Duration::from_secs(10);
        assert_eq!(jittered(base, 0), base);
        assert_eq!(jittered(Duration::ZERO, 25), Duration::ZERO);
    }
}
