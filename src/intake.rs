/// Windowed intake tracking per entity.
///
/// One aggregator instance per metric kind: the engine owns a damage
/// aggregator and a healing aggregator with identical behaviour.
///
/// Each entity keeps a fixed-capacity FIFO log of samples. Recording past the
/// cap evicts the oldest sample first, regardless of query activity. Window
/// queries are inclusive at the boundary: a sample recorded exactly
/// `window` seconds ago still counts.
use crate::{
    clock::{secs_to_ms, CombatClock},
    config::IntakeConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntakeKind {
    Damage,
    Healing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntakeSample {
    pub timestamp_ms: u64,
    pub amount:       f64,
}

/// Read side of an intake aggregator.
///
/// The trend/spike predictor only ever reads through this trait, so it can be
/// driven by a scripted source in tests.
pub trait IntakeSource {
    /// Sum of samples for `entity_id` recorded within the last `window_secs`.
    fn recent_intake(&self, entity_id: &str, window_secs: f64) -> f64;

    /// Sum of samples across all tracked entities within the window.
    fn party_intake(&self, window_secs: f64) -> f64;

    /// Amount per second over the window; 0 for non-positive windows.
    fn rate(&self, entity_id: &str, window_secs: f64) -> f64 {
        if !is_valid_window(window_secs) {
            return 0.0;
        }
        self.recent_intake(entity_id, window_secs) / window_secs
    }

    fn party_rate(&self, window_secs: f64) -> f64 {
        if !is_valid_window(window_secs) {
            return 0.0;
        }
        self.party_intake(window_secs) / window_secs
    }
}

/// Windows must be finite and strictly positive to select anything.
pub fn is_valid_window(window_secs: f64) -> bool {
    window_secs.is_finite() && window_secs > 0.0
}

#[derive(Debug)]
pub struct IntakeAggregator {
    kind:        IntakeKind,
    clock:       CombatClock,
    max_entries: usize,
    logs:        HashMap<String, VecDeque<IntakeSample>>,
}

impl IntakeAggregator {
    pub fn new(kind: IntakeKind, clock: CombatClock, config: &IntakeConfig) -> Self {
        Self {
            kind,
            clock,
            max_entries: config.max_entries_per_entity.max(1),
            logs:        HashMap::new(),
        }
    }

    pub fn kind(&self) -> IntakeKind {
        self.kind
    }

    /// Append `amount` for `entity_id` at the current clock time.
    /// Zero, negative and NaN amounts are ignored.
    pub fn record_intake(&mut self, entity_id: &str, amount: f64) {
        if !amount.is_finite() || amount <= 0.0 {
            return;
        }

        let sample = IntakeSample { timestamp_ms: self.clock.now_ms(), amount };
        let max_entries = self.max_entries;
        let log = self
            .logs
            .entry(entity_id.to_owned())
            .or_insert_with(|| VecDeque::with_capacity(max_entries));

        while log.len() >= max_entries {
            log.pop_front();
        }
        log.push_back(sample);
    }

    pub fn clear_entity(&mut self, entity_id: &str) {
        if self.logs.remove(entity_id).is_some() {
            tracing::debug!("{:?} intake cleared for {}", self.kind, entity_id);
        }
    }

    pub fn clear_all(&mut self) {
        self.logs.clear();
        tracing::debug!("{:?} intake cleared for all entities", self.kind);
    }

    /// Number of entities with at least one recorded sample.
    pub fn entity_count(&self) -> usize {
        self.logs.len()
    }

    /// Number of samples currently retained for one entity.
    pub fn sample_count(&self, entity_id: &str) -> usize {
        self.logs.get(entity_id).map(VecDeque::len).unwrap_or(0)
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.logs.keys().map(String::as_str)
    }

    fn window_sum(&self, log: &VecDeque<IntakeSample>, cutoff_ms: u64) -> f64 {
        // Logs are time-ordered because the clock never runs backwards.
        log.iter()
            .rev()
            .take_while(|s| s.timestamp_ms >= cutoff_ms)
            .map(|s| s.amount)
            .sum()
    }

    fn cutoff_ms(&self, window_secs: f64) -> u64 {
        self.clock.now_ms().saturating_sub(secs_to_ms(window_secs))
    }
}

impl IntakeSource for IntakeAggregator {
    fn recent_intake(&self, entity_id: &str, window_secs: f64) -> f64 {
        if !is_valid_window(window_secs) {
            return 0.0;
        }
        let Some(log) = self.logs.get(entity_id) else {
            return 0.0;
        };
        self.window_sum(log, self.cutoff_ms(window_secs))
    }

    fn party_intake(&self, window_secs: f64) -> f64 {
        if !is_valid_window(window_secs) {
            return 0.0;
        }
        let cutoff = self.cutoff_ms(window_secs);
        self.logs.values().map(|log| self.window_sum(log, cutoff)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn damage(clock: &CombatClock) -> IntakeAggregator {
        IntakeAggregator::new(IntakeKind::Damage, clock.clone(), &IntakeConfig::default())
    }

    #[test]
    fn sums_two_hits_inside_window() {
        let clock = CombatClock::new();
        let mut agg = damage(&clock);
        agg.record_intake("Player-1", 1000.0);
        clock.advance(1.0);
        agg.record_intake("Player-1", 1000.0);

        assert_eq!(agg.recent_intake("Player-1", 5.0), 2000.0);
        assert_eq!(agg.rate("Player-1", 5.0), 400.0);
    }

    #[test]
    fn window_excludes_old_samples_and_includes_boundary() {
        let clock = CombatClock::new();
        let mut agg = damage(&clock);
        agg.record_intake("Player-1", 500.0); // t=0
        clock.advance(2.0);
        agg.record_intake("Player-1", 300.0); // t=2
        clock.advance(3.0);
        agg.record_intake("Player-1", 200.0); // t=5

        // cutoff = 0 -> boundary sample at t=0 is included
        assert_eq!(agg.recent_intake("Player-1", 5.0), 1000.0);
        // cutoff = 2
        assert_eq!(agg.recent_intake("Player-1", 3.0), 500.0);
        // cutoff = 4
        assert_eq!(agg.recent_intake("Player-1", 1.0), 200.0);
    }

    #[test]
    fn fifo_cap_evicts_oldest() {
        let clock = CombatClock::new();
        let mut agg = damage(&clock);
        for _ in 0..150 {
            agg.record_intake("Player-1", 100.0);
        }
        assert_eq!(agg.sample_count("Player-1"), 100);
        assert_eq!(agg.recent_intake("Player-1", 60.0), 10_000.0);
    }

    #[test]
    fn fifo_cap_drops_the_earliest_samples() {
        let clock = CombatClock::new();
        let config = IntakeConfig { max_entries_per_entity: 3 };
        let mut agg = IntakeAggregator::new(IntakeKind::Healing, clock.clone(), &config);
        for amount in [1.0, 2.0, 3.0, 4.0] {
            agg.record_intake("Player-1", amount);
            clock.advance(1.0);
        }
        assert_eq!(agg.recent_intake("Player-1", 100.0), 9.0);
    }

    #[test]
    fn ignores_non_positive_amounts() {
        let clock = CombatClock::new();
        let mut agg = damage(&clock);
        agg.record_intake("Player-1", 0.0);
        agg.record_intake("Player-1", -500.0);
        agg.record_intake("Player-1", f64::NAN);
        assert_eq!(agg.recent_intake("Player-1", 5.0), 0.0);
        assert_eq!(agg.entity_count(), 0);
    }

    #[test]
    fn invalid_windows_and_unknown_entities_are_zero() {
        let clock = CombatClock::new();
        let mut agg = damage(&clock);
        agg.record_intake("Player-1", 1000.0);
        assert_eq!(agg.recent_intake("Player-1", 0.0), 0.0);
        assert_eq!(agg.recent_intake("Player-1", -1.0), 0.0);
        assert_eq!(agg.rate("Player-1", 0.0), 0.0);
        assert_eq!(agg.recent_intake("Player-2", 5.0), 0.0);
        assert_eq!(agg.party_rate(-2.0), 0.0);
    }

    #[test]
    fn party_totals_span_entities() {
        let clock = CombatClock::new();
        let mut agg = damage(&clock);
        agg.record_intake("Player-1", 1000.0);
        agg.record_intake("Player-2", 3000.0);
        clock.advance(1.0);
        agg.record_intake("Player-3", 1000.0);

        assert_eq!(agg.party_intake(5.0), 5000.0);
        assert_eq!(agg.party_rate(5.0), 1000.0);
        assert_eq!(agg.party_intake(0.5), 1000.0);
    }

    #[test]
    fn clear_entity_and_all() {
        let clock = CombatClock::new();
        let mut agg = damage(&clock);
        agg.record_intake("Player-1", 1000.0);
        agg.record_intake("Player-2", 1000.0);

        agg.clear_entity("Player-1");
        assert_eq!(agg.recent_intake("Player-1", 5.0), 0.0);
        assert_eq!(agg.party_intake(5.0), 1000.0);

        agg.clear_all();
        assert_eq!(agg.entity_count(), 0);
        assert_eq!(agg.party_intake(5.0), 0.0);
    }
}
