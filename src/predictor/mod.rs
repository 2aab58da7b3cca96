/// Trend & spike predictor.
///
/// Reads damage intake through [`IntakeSource`] and owns two pieces of state:
/// per-entity spike history and the party-wide high-damage phase. Both are
/// advanced by [`DamagePredictor::update`], which is called once per tick by
/// the engine and is also what moves the shared session clock forward.
///
/// Every query degrades to a conservative answer (`Stable`, `0`,
/// [`SpikeForecast::none`]) when there is not enough history.
use crate::{
    clock::{secs_to_ms, CombatClock},
    config::TrendConfig,
    intake::IntakeSource,
    planner::DamageSignals,
};

pub mod phase;
pub mod spike;
pub mod trend;

pub use phase::{HighDamagePhase, PhaseTransition};
pub use spike::{SpikeEvent, SpikeForecast, SpikeHistory};
pub use trend::{classify_trend, DamageTrend, RatePair};

/// Windows probed when reconstructing a phase duration for a threshold the
/// live tracker was not primed for.
const PHASE_PROBE_WINDOWS: [f64; 5] = [1.0, 1.5, 2.0, 3.0, 5.0];

/// Contributions to [`DamagePredictor::spike_severity`].
const SEVERITY_SPIKING:    f64 = 0.5;
const SEVERITY_INCREASING: f64 = 0.25;
const SEVERITY_HP_WEIGHT:  f64 = 0.4;
const SEVERITY_RATE_BONUS: f64 = 0.2;

#[derive(Debug)]
pub struct DamagePredictor {
    clock:  CombatClock,
    config: TrendConfig,
    spikes: SpikeHistory,
    phase:  HighDamagePhase,
}

impl DamagePredictor {
    pub fn new(clock: CombatClock, config: TrendConfig) -> Self {
        Self {
            clock,
            config,
            spikes: SpikeHistory::default(),
            phase:  HighDamagePhase::default(),
        }
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the clock, age spike history, run automatic spike detection for
    /// `affected` entities, and refresh the high-damage phase.
    pub fn update<S: AsRef<str>>(&mut self, intake: &dyn IntakeSource, delta_secs: f64, affected: &[S]) {
        self.update_time(delta_secs);

        for entity_id in affected {
            self.detect_spike(intake, entity_id.as_ref());
        }

        let now_ms = self.clock.now_ms();
        let rate = intake.party_rate(self.config.phase_window_secs);
        match self.phase.observe(rate, self.config.high_damage_threshold, now_ms) {
            PhaseTransition::Entered => {
                tracing::info!("High-damage phase started ({:.0}/s)", rate);
            }
            PhaseTransition::Exited { duration_ms } => {
                tracing::info!("High-damage phase ended after {:.1}s", duration_ms as f64 / 1_000.0);
            }
            PhaseTransition::Unchanged => {}
        }
    }

    /// Advance the clock and age spike history only.
    pub fn update_time(&mut self, delta_secs: f64) {
        self.clock.advance(delta_secs);
        self.spikes.prune(self.clock.now_ms(), secs_to_ms(self.config.spike_retention_secs));
    }

    fn detect_spike(&mut self, intake: &dyn IntakeSource, entity_id: &str) {
        let short  = self.config.auto_spike_short_window;
        let medium = self.config.auto_spike_medium_window;

        let short_rate  = intake.rate(entity_id, short);
        let medium_rate = intake.rate(entity_id, medium);

        if short_rate >= self.config.auto_spike_min_rate
            && short_rate > self.config.auto_spike_ratio * medium_rate
        {
            self.record_spike_event(entity_id, intake.recent_intake(entity_id, short));
        }
    }

    // -----------------------------------------------------------------------
    // Trends
    // -----------------------------------------------------------------------

    pub fn classify_trend(&self, current_rate: f64, previous_rate: f64) -> DamageTrend {
        classify_trend(current_rate, previous_rate, &self.config)
    }

    pub fn party_damage_trend(&self, intake: &dyn IntakeSource, window_secs: f64) -> DamageTrend {
        trend::party_rates(intake, window_secs)
            .map(|r| self.classify_trend(r.current, r.previous))
            .unwrap_or(DamageTrend::Stable)
    }

    pub fn entity_damage_trend(
        &self,
        intake:      &dyn IntakeSource,
        entity_id:   &str,
        window_secs: f64,
    ) -> DamageTrend {
        trend::entity_rates(intake, entity_id, window_secs)
            .map(|r| self.classify_trend(r.current, r.previous))
            .unwrap_or(DamageTrend::Stable)
    }

    /// Rate change per second between the two halves of the window.
    /// Positive means damage intake is accelerating.
    pub fn damage_acceleration(&self, intake: &dyn IntakeSource, entity_id: &str, window_secs: f64) -> f64 {
        trend::entity_rates(intake, entity_id, window_secs)
            .map(|r| r.acceleration(window_secs / 2.0))
            .unwrap_or(0.0)
    }

    // -----------------------------------------------------------------------
    // Spikes
    // -----------------------------------------------------------------------

    /// Record a spike unless one was recorded for this entity within the
    /// spike cooldown. Returns whether it was recorded.
    pub fn record_spike_event(&mut self, entity_id: &str, amount: f64) -> bool {
        let now_ms   = self.clock.now_ms();
        let cooldown = secs_to_ms(self.config.spike_cooldown_secs);
        let recorded = self.spikes.record(entity_id, amount, now_ms, cooldown);
        if recorded {
            tracing::debug!(
                "Spike on {}: {:.0} (history {})",
                entity_id, amount, self.spikes.count(entity_id)
            );
        }
        recorded
    }

    pub fn spike_count(&self, entity_id: &str) -> usize {
        self.spikes.count(entity_id)
    }

    pub fn predict_next_spike(&self, entity_id: &str) -> SpikeForecast {
        self.spikes.forecast(entity_id, self.clock.now_ms())
    }

    /// Forecasts for every entity with spike history that yields one.
    pub fn forecasts(&self) -> Vec<(String, SpikeForecast)> {
        let mut out: Vec<(String, SpikeForecast)> = self
            .spikes
            .entities()
            .map(|id| (id.to_owned(), self.predict_next_spike(id)))
            .filter(|(_, f)| f.is_known())
            .collect();
        out.sort_by(|a, b| a.1.seconds_until_next.total_cmp(&b.1.seconds_until_next));
        out
    }

    pub fn is_damage_spike_imminent(&self, intake: &dyn IntakeSource, hp_percent: f64) -> bool {
        let cfg = &self.config;
        let trend = self.party_damage_trend(intake, cfg.imminent_window_secs);

        if trend == DamageTrend::Spiking {
            return true;
        }
        if self.is_in_high_damage_phase(intake, cfg.high_damage_threshold, cfg.imminent_sustain_secs) {
            return true;
        }
        if hp_percent < cfg.imminent_low_hp && trend == DamageTrend::Increasing {
            return true;
        }
        self.forecasts().iter().any(|(_, f)| {
            f.is_confident(cfg.forecast_min_confidence)
                && f.seconds_until_next <= cfg.imminent_horizon_secs
        })
    }

    /// 0 (calm) to 1 (dangerous). Lower party HP raises severity.
    pub fn spike_severity(&self, intake: &dyn IntakeSource, party_hp_percent: f64) -> f64 {
        let cfg = &self.config;
        let hp = if party_hp_percent.is_finite() { party_hp_percent.clamp(0.0, 1.0) } else { 1.0 };

        let mut severity = match self.party_damage_trend(intake, cfg.imminent_window_secs) {
            DamageTrend::Spiking    => SEVERITY_SPIKING,
            DamageTrend::Increasing => SEVERITY_INCREASING,
            _ => 0.0,
        };
        severity += SEVERITY_HP_WEIGHT * (1.0 - hp);
        if intake.party_rate(cfg.imminent_window_secs) >= cfg.very_high_rate {
            severity += SEVERITY_RATE_BONUS;
        }
        severity.clamp(0.0, 1.0)
    }

    // -----------------------------------------------------------------------
    // High-damage phase
    // -----------------------------------------------------------------------

    pub fn is_in_high_damage_phase(
        &self,
        intake:           &dyn IntakeSource,
        threshold:        f64,
        min_duration_secs: f64,
    ) -> bool {
        if intake.party_rate(self.config.phase_window_secs) <= threshold {
            return false;
        }
        self.high_damage_phase_duration(intake, threshold) >= min_duration_secs
    }

    /// Seconds the party has been above `threshold`. Exact when the live
    /// tracker runs at this threshold; otherwise the largest probe window
    /// whose rate still exceeds it.
    pub fn high_damage_phase_duration(&self, intake: &dyn IntakeSource, threshold: f64) -> f64 {
        if self.phase.is_active && self.tracks_threshold(threshold) {
            return self.phase.elapsed_secs(self.clock.now_ms());
        }
        PHASE_PROBE_WINDOWS
            .iter()
            .copied()
            .filter(|&w| intake.party_rate(w) > threshold)
            .fold(0.0, f64::max)
    }

    pub fn phase(&self) -> HighDamagePhase {
        self.phase
    }

    fn tracks_threshold(&self, threshold: f64) -> bool {
        (threshold - self.config.high_damage_threshold).abs() < f64::EPSILON * threshold.abs().max(1.0)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn clear_entity(&mut self, entity_id: &str) {
        self.spikes.clear_entity(entity_id);
    }

    pub fn clear_all(&mut self) {
        self.spikes.clear();
        self.phase.reset();
    }

    /// Read-only pairing of this predictor with a damage source, as consumed
    /// by the planner.
    pub fn view<'a>(&'a self, intake: &'a dyn IntakeSource) -> DamageView<'a> {
        DamageView { predictor: self, intake }
    }
}

/// [`DamageSignals`] backed by a live predictor and damage aggregator.
pub struct DamageView<'a> {
    predictor: &'a DamagePredictor,
    intake:    &'a dyn IntakeSource,
}

impl DamageSignals for DamageView<'_> {
    fn party_trend(&self, window_secs: f64) -> DamageTrend {
        self.predictor.party_damage_trend(self.intake, window_secs)
    }

    fn party_rate(&self, window_secs: f64) -> f64 {
        self.intake.party_rate(window_secs)
    }

    fn spike_imminent(&self, hp_percent: f64) -> bool {
        self.predictor.is_damage_spike_imminent(self.intake, hp_percent)
    }

    fn spike_severity(&self, hp_percent: f64) -> f64 {
        self.predictor.spike_severity(self.intake, hp_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::IntakeConfig,
        intake::{IntakeAggregator, IntakeKind},
    };

    const NO_ENTITIES: &[&str] = &[];

    fn setup() -> (CombatClock, IntakeAggregator, DamagePredictor) {
        let clock = CombatClock::new();
        let agg = IntakeAggregator::new(IntakeKind::Damage, clock.clone(), &IntakeConfig::default());
        let predictor = DamagePredictor::new(clock.clone(), TrendConfig::default());
        (clock, agg, predictor)
    }

    #[test]
    fn update_advances_shared_clock() {
        let (clock, _agg, mut predictor) = setup();
        predictor.update_time(1.25);
        assert_eq!(clock.now_ms(), 1_250);
        assert_eq!(predictor.now_ms(), 1_250);
    }

    #[test]
    fn forecast_from_regular_spikes() {
        let (_clock, _agg, mut predictor) = setup();
        assert_eq!(predictor.predict_next_spike("Player-1"), SpikeForecast::none());

        for i in 0..4 {
            if i > 0 {
                predictor.update_time(10.0);
            }
            assert!(predictor.record_spike_event("Player-1", 20_000.0));
            if i < 2 {
                assert_eq!(predictor.predict_next_spike("Player-1"), SpikeForecast::none());
            }
        }
        predictor.update_time(2.0);

        let f = predictor.predict_next_spike("Player-1");
        assert!(f.confidence >= 0.5);
        assert!(f.seconds_until_next > 0.0 && f.seconds_until_next < 10.0);
        assert_eq!(predictor.forecasts().len(), 1);
    }

    #[test]
    fn automatic_detection_respects_cooldown() {
        let (_clock, mut agg, mut predictor) = setup();
        agg.record_intake("Player-1", 5_000.0);

        for _ in 0..6 {
            predictor.update(&agg, 0.1, &["Player-1"]);
        }
        assert_eq!(predictor.spike_count("Player-1"), 1);

        predictor.update(&agg, 2.4, NO_ENTITIES); // t = 3.0
        agg.record_intake("Player-1", 8_000.0);
        predictor.update(&agg, 0.1, &["Player-1"]);
        assert_eq!(predictor.spike_count("Player-1"), 2);
    }

    #[test]
    fn steady_damage_is_not_a_spike() {
        let (clock, mut agg, mut predictor) = setup();
        for i in 0..10 {
            if i > 0 {
                clock.advance(1.0);
            }
            agg.record_intake("Player-1", 1_000.0);
        }
        predictor.update(&agg, 0.0, &["Player-1"]);
        assert_eq!(predictor.spike_count("Player-1"), 0);
    }

    #[test]
    fn spike_history_ages_out() {
        let (_clock, _agg, mut predictor) = setup();
        predictor.record_spike_event("Player-1", 1.0);
        predictor.update_time(61.0);
        assert_eq!(predictor.spike_count("Player-1"), 0);
    }

    #[test]
    fn high_damage_phase_lifecycle() {
        let (_clock, mut agg, mut predictor) = setup();
        agg.record_intake("Player-1", 20_000.0); // 6.7k/s over the 3s phase window

        predictor.update(&agg, 0.5, NO_ENTITIES);
        assert!(predictor.phase().is_active);
        assert_eq!(predictor.phase().phase_start_ms, 500);

        predictor.update(&agg, 1.5, NO_ENTITIES); // t = 2.0
        assert!(predictor.is_in_high_damage_phase(&agg, 5_000.0, 1.0));
        assert!(!predictor.is_in_high_damage_phase(&agg, 5_000.0, 2.0));
        assert_eq!(predictor.high_damage_phase_duration(&agg, 5_000.0), 1.5);

        predictor.update(&agg, 1.5, NO_ENTITIES); // t = 3.5, hit leaves the window
        assert!(!predictor.phase().is_active);
        assert!(!predictor.is_in_high_damage_phase(&agg, 5_000.0, 0.0));
    }

    #[test]
    fn phase_duration_probes_for_other_thresholds() {
        let (_clock, mut agg, mut predictor) = setup();
        agg.record_intake("Player-1", 3_000.0);
        predictor.update_time(0.5);

        // 1s: 3000/s, 1.5s: 2000/s, 2s: 1500/s, 3s: 1000/s (not above), 5s: 600/s
        assert_eq!(predictor.high_damage_phase_duration(&agg, 1_000.0), 2.0);
        assert_eq!(predictor.high_damage_phase_duration(&agg, 50_000.0), 0.0);
    }

    #[test]
    fn first_damage_is_an_imminent_spike() {
        let (_clock, mut agg, predictor) = setup();
        assert!(!predictor.is_damage_spike_imminent(&agg, 1.0));
        agg.record_intake("Player-1", 2_000.0);
        assert_eq!(predictor.party_damage_trend(&agg, 3.0), DamageTrend::Spiking);
        assert!(predictor.is_damage_spike_imminent(&agg, 1.0));
    }

    #[test]
    fn rising_damage_is_imminent_only_at_low_hp() {
        let (clock, mut agg, predictor) = setup();
        for i in 0..=12 {
            if i > 0 {
                clock.advance(0.5);
            }
            agg.record_intake("Player-1", 1_000.0);
        }
        assert_eq!(predictor.party_damage_trend(&agg, 3.0), DamageTrend::Increasing);
        assert!(!predictor.is_damage_spike_imminent(&agg, 0.9));
        assert!(predictor.is_damage_spike_imminent(&agg, 0.3));
    }

    #[test]
    fn confident_forecast_due_soon_is_imminent() {
        let (_clock, agg, mut predictor) = setup();
        for i in 0..3 {
            if i > 0 {
                predictor.update_time(10.0);
            }
            predictor.record_spike_event("Player-1", 10_000.0);
        }
        predictor.update_time(5.0);
        assert!(!predictor.is_damage_spike_imminent(&agg, 1.0));
        predictor.update_time(4.0); // 1s until the next expected spike
        assert!(predictor.is_damage_spike_imminent(&agg, 1.0));
    }

    #[test]
    fn severity_scales_with_hp_and_rate() {
        let (_clock, mut agg, predictor) = setup();
        assert_eq!(predictor.spike_severity(&agg, 1.0), 0.0);
        assert!((predictor.spike_severity(&agg, 0.5) - 0.2).abs() < 1e-9);

        agg.record_intake("Player-1", 60_000.0);
        assert_eq!(predictor.spike_severity(&agg, 0.2), 1.0);
        let high_hp = predictor.spike_severity(&agg, 1.0);
        assert!((high_hp - 0.7).abs() < 1e-9);
    }

    #[test]
    fn acceleration_and_entity_trend() {
        let (clock, mut agg, predictor) = setup();
        agg.record_intake("Player-1", 1_000.0);
        clock.advance(3.0);
        agg.record_intake("Player-1", 3_000.0);

        assert_eq!(predictor.damage_acceleration(&agg, "Player-1", 4.0), 500.0);
        assert_eq!(predictor.entity_damage_trend(&agg, "Player-1", 4.0), DamageTrend::Spiking);
        assert_eq!(predictor.entity_damage_trend(&agg, "Player-2", 4.0), DamageTrend::Stable);
        assert_eq!(predictor.damage_acceleration(&agg, "Player-1", 0.0), 0.0);
    }

    #[test]
    fn view_exposes_signals() {
        let (_clock, mut agg, predictor) = setup();
        agg.record_intake("Player-1", 9_000.0);
        let view = predictor.view(&agg);
        assert_eq!(view.party_rate(3.0), 3_000.0);
        assert_eq!(view.party_trend(3.0), DamageTrend::Spiking);
        assert!(view.spike_imminent(1.0));
    }

    #[test]
    fn clear_all_resets_spikes_and_phase() {
        let (_clock, mut agg, mut predictor) = setup();
        agg.record_intake("Player-1", 50_000.0);
        predictor.update(&agg, 0.1, &["Player-1"]);
        assert!(predictor.phase().is_active);
        assert_eq!(predictor.spike_count("Player-1"), 1);

        predictor.clear_all();
        assert!(!predictor.phase().is_active);
        assert_eq!(predictor.spike_count("Player-1"), 0);
    }
}
