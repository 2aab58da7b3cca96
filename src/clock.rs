/// Session clock shared by every analytics component.
///
/// Time is never sampled from the wall clock inside the hot path. The caller
/// drives it forward with explicit deltas (live mode) or absolute log
/// timestamps (replay). All components hold a clone of the same handle, so a
/// single advance is visible everywhere.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CombatClock {
    now_ms: Arc<AtomicU64>,
}

impl CombatClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at an arbitrary origin (e.g. the first log timestamp).
    pub fn starting_at(ms: u64) -> Self {
        Self { now_ms: Arc::new(AtomicU64::new(ms)) }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Relaxed)
    }

    pub fn now_secs(&self) -> f64 {
        self.now_ms() as f64 / 1_000.0
    }

    /// Advance by `delta_secs`. Non-finite and non-positive deltas are ignored
    /// so the clock stays monotonic.
    pub fn advance(&self, delta_secs: f64) {
        let delta_ms = secs_to_ms(delta_secs);
        if delta_ms > 0 {
            self.now_ms.fetch_add(delta_ms, Ordering::Relaxed);
        }
    }

    /// Jump forward to an absolute timestamp. Earlier timestamps are ignored.
    pub fn advance_to(&self, ms: u64) {
        self.now_ms.fetch_max(ms, Ordering::Relaxed);
    }
}

/// Convert a seconds value (window, timeout, delta) into whole milliseconds.
/// Returns 0 for non-finite or non-positive input.
pub fn secs_to_ms(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * 1_000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_and_shares_time() {
        let clock = CombatClock::new();
        let other = clock.clone();
        clock.advance(1.5);
        assert_eq!(other.now_ms(), 1_500);
        assert!((other.now_secs() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn ignores_bad_deltas() {
        let clock = CombatClock::starting_at(10_000);
        clock.advance(-3.0);
        clock.advance(0.0);
        clock.advance(f64::NAN);
        clock.advance(f64::INFINITY);
        assert_eq!(clock.now_ms(), 10_000);
    }

    #[test]
    fn advance_to_is_monotonic() {
        let clock = CombatClock::starting_at(5_000);
        clock.advance_to(4_000);
        assert_eq!(clock.now_ms(), 5_000);
        clock.advance_to(7_250);
        assert_eq!(clock.now_ms(), 7_250);
    }
}
