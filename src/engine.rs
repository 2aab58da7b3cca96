/// Healer advisor: the orchestrator of the pipeline.
///
/// Receives typed `CombatEvent`s and `AdvisorCommand`s via channels, feeds
/// the analytics components, evaluates rules, deduplicates advice, and
/// forwards `AdviceEvent`s and `AdvisorSnapshot`s to the report layer.
///
/// Per-key advice cooldowns prevent spam:
///   bad    → 8s minimum between firings of the same key
///   warn   → 12s
///   good   → 20s
use crate::{
    catalog::CooldownCatalog,
    clock::CombatClock,
    config::AdvisorConfig,
    hp::{HealLanded, HpPredictor},
    intake::{IntakeAggregator, IntakeKind, IntakeSource},
    parser::CombatEvent,
    party::{MemberHealth, PartyHealthMetrics},
    planner::{CooldownPlanner, DamageSignals},
    predictor::{DamagePredictor, DamageView},
    report::{AdvisorSnapshot, ForecastEntry},
    rules::{self, RuleContext},
    shadow::{ShadowHpSource, ShadowHpTable},
    state::{is_party_guid, EncounterOutcome, SessionState},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc::{Receiver, Sender};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Warn,
    Bad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceEvent {
    pub key:          String,
    pub title:        String,
    pub message:      String,
    pub severity:     Severity,
    pub kv:           Vec<(String, String)>,
    pub timestamp_ms: u64,
}

/// Inputs that do not come from the combat log.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvisorCommand {
    /// A heal was committed on `target_id` and has not landed yet.
    RegisterHeal { target_id: String, amount: i64 },
    RegisterAoEHeal { target_ids: Vec<String>, amount: i64 },
    /// New party roster; departed members are forgotten.
    PartyChanged { members: Vec<String> },
    /// Authoritative HP read for one member.
    SetHp { entity_id: String, hp: u64, max_hp: u64 },
    /// Let time pass without a combat event.
    Tick { delta_secs: f64 },
}

// ---------------------------------------------------------------------------
// Advice dedup / cooldown
// ---------------------------------------------------------------------------

/// Log timestamps are milliseconds since midnight.
const DAY_MS: u64 = 86_400_000;

/// A timestamp this far behind the clock is the log crossing midnight, not a
/// late line.
const DAY_WRAP_THRESHOLD_MS: u64 = DAY_MS / 2;

fn advice_cooldown_ms(severity: Severity) -> u64 {
    match severity {
        Severity::Bad  =>  8_000,
        Severity::Warn => 12_000,
        Severity::Good => 20_000,
    }
}

#[derive(Debug, Default)]
struct AdviceGate {
    last_fired_ms: HashMap<String, u64>,
}

impl AdviceGate {
    fn can_fire(&self, key: &str, severity: Severity, now_ms: u64) -> bool {
        match self.last_fired_ms.get(key) {
            Some(&last) => now_ms.saturating_sub(last) >= advice_cooldown_ms(severity),
            None => true,
        }
    }

    fn mark_fired(&mut self, key: &str, now_ms: u64) {
        self.last_fired_ms.insert(key.to_owned(), now_ms);
    }

    fn clear(&mut self) {
        self.last_fired_ms.clear();
    }
}

// ---------------------------------------------------------------------------
// HealerAdvisor
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct HealerAdvisor {
    config:        AdvisorConfig,
    clock:         CombatClock,
    damage:        IntakeAggregator,
    healing:       IntakeAggregator,
    predictor:     DamagePredictor,
    hp:            HpPredictor,
    shadow:        ShadowHpTable,
    planner:       CooldownPlanner,
    session:       SessionState,
    gate:          AdviceGate,
    /// Set once the clock has been anchored to the first event timestamp.
    anchored:      bool,
    /// Added to raw log timestamps; grows by a day at each midnight rollover.
    day_offset_ms: u64,
}

impl HealerAdvisor {
    pub fn new(config: AdvisorConfig) -> Self {
        let clock   = CombatClock::new();
        let catalog = CooldownCatalog::for_profile(&config.session.profile);
        Self {
            damage:        IntakeAggregator::new(IntakeKind::Damage, clock.clone(), &config.intake),
            healing:       IntakeAggregator::new(IntakeKind::Healing, clock.clone(), &config.intake),
            predictor:     DamagePredictor::new(clock.clone(), config.trend.clone()),
            hp:            HpPredictor::new(clock.clone(), config.hp.clone()),
            shadow:        ShadowHpTable::new(config.session.default_max_hp),
            planner:       CooldownPlanner::new(config.planner.clone(), catalog),
            session:       SessionState::new(),
            gate:          AdviceGate::default(),
            anchored:      false,
            day_offset_ms: 0,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn damage(&self) -> &IntakeAggregator {
        &self.damage
    }

    pub fn healing(&self) -> &IntakeAggregator {
        &self.healing
    }

    pub fn predictor(&self) -> &DamagePredictor {
        &self.predictor
    }

    pub fn hp_predictor(&self) -> &HpPredictor {
        &self.hp
    }

    pub fn shadow(&self) -> &ShadowHpTable {
        &self.shadow
    }

    pub fn planner(&self) -> &CooldownPlanner {
        &self.planner
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn signals(&self) -> DamageView<'_> {
        self.predictor.view(&self.damage)
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Run one predictor update covering everything that took damage since
    /// the previous update.
    pub fn advance(&mut self, delta_secs: f64) {
        let affected = self.session.drain_affected();
        self.predictor.update(&self.damage, delta_secs, &affected);
    }

    /// Move the clock to a log timestamp and return the session time the
    /// event is recorded at.
    ///
    /// The first event anchors the clock. A timestamp more than half a day
    /// behind the clock means the log crossed midnight: the day offset grows
    /// and time keeps moving forward. Smaller backward steps (out-of-order
    /// lines) are recorded at the current time.
    fn advance_to(&mut self, timestamp_ms: u64) -> u64 {
        let mut session_ms = timestamp_ms + self.day_offset_ms;
        if !self.anchored {
            self.clock.advance_to(session_ms);
            self.anchored = true;
            return session_ms;
        }

        let now_ms = self.clock.now_ms();
        if now_ms.saturating_sub(session_ms) > DAY_WRAP_THRESHOLD_MS {
            self.day_offset_ms += DAY_MS;
            session_ms += DAY_MS;
            tracing::info!("Combat log crossed midnight, day offset now {} ms", self.day_offset_ms);
        }

        let delta_ms = session_ms.saturating_sub(now_ms);
        if delta_ms > 0 {
            self.advance(delta_ms as f64 / 1_000.0);
        }
        session_ms.max(now_ms)
    }

    // -----------------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------------

    pub fn ingest(&mut self, event: &CombatEvent) {
        let event_ms = self.advance_to(event.timestamp_ms());

        match event {
            CombatEvent::Damage { dest_guid, amount, .. } if is_party_guid(dest_guid) => {
                self.track_member(dest_guid);
                self.damage.record_intake(dest_guid, *amount as f64);
                self.shadow.apply_damage(dest_guid, *amount);
                self.session.mark_affected(dest_guid);
            }

            CombatEvent::Heal { source_guid, dest_guid, amount, overhealing, .. } if is_party_guid(dest_guid) => {
                self.track_member(dest_guid);
                let effective = amount.saturating_sub(*overhealing);
                self.healing.record_intake(dest_guid, effective as f64);
                self.shadow.apply_heal(dest_guid, effective);
                self.hp.apply_heal_landed(&HealLanded {
                    healer_id: source_guid.clone(),
                    target_id: dest_guid.clone(),
                    amount:    effective,
                });
            }

            CombatEvent::UnitDied { dest_guid, dest_name, .. } if is_party_guid(dest_guid) => {
                self.shadow.mark_dead(dest_guid);
                self.hp.clear_pending_heals_for(dest_guid);
                tracing::debug!("Party member '{}' died", dest_name);
            }

            CombatEvent::ZoneChange { zone_name, zone_id, .. } => {
                tracing::info!("Zone change → {} ({}), resetting session", zone_name, zone_id);
                self.reset(Some(zone_name.clone()));
            }

            CombatEvent::EncounterStart { encounter_id, encounter_name, .. } => {
                self.session.start_encounter(*encounter_id, encounter_name, event_ms);
            }

            CombatEvent::EncounterEnd { success, .. } => {
                let outcome = if *success { EncounterOutcome::Kill } else { EncounterOutcome::Wipe };
                self.session.end_encounter(event_ms, outcome);
            }

            _ => {}
        }
    }

    pub fn handle(&mut self, command: AdvisorCommand) {
        match command {
            AdvisorCommand::RegisterHeal { target_id, amount } => {
                self.hp.register_pending_heal(&target_id, amount);
            }
            AdvisorCommand::RegisterAoEHeal { target_ids, amount } => {
                self.hp.register_pending_aoe_heal(&target_ids, amount);
            }
            AdvisorCommand::PartyChanged { members } => {
                let departed = self.session.set_roster(members);
                for id in &departed {
                    self.forget_member(id);
                }
                let roster: Vec<String> = self.session.roster.iter().cloned().collect();
                for id in &roster {
                    self.shadow.track(id);
                }
                tracing::info!("Party changed: {} members, {} departed", roster.len(), departed.len());
            }
            AdvisorCommand::SetHp { entity_id, hp, max_hp } => {
                self.track_member(&entity_id);
                self.shadow.set(&entity_id, hp, max_hp);
            }
            AdvisorCommand::Tick { delta_secs } => self.advance(delta_secs),
        }
    }

    fn track_member(&mut self, guid: &str) {
        if self.session.add_member(guid) {
            self.shadow.track(guid);
            tracing::debug!("Tracking party member {}", guid);
        }
    }

    fn forget_member(&mut self, guid: &str) {
        self.damage.clear_entity(guid);
        self.healing.clear_entity(guid);
        self.predictor.clear_entity(guid);
        self.hp.clear_pending_heals_for(guid);
        self.shadow.remove(guid);
    }

    /// Forget everything session-scoped. The clock keeps running.
    pub fn reset(&mut self, zone_name: Option<String>) {
        self.damage.clear_all();
        self.healing.clear_all();
        self.predictor.clear_all();
        self.hp.clear_pending_heals();
        self.shadow.clear();
        self.session.reset(zone_name);
        self.gate.clear();
        self.planner.update_metrics(PartyHealthMetrics::healthy());
    }

    // -----------------------------------------------------------------------
    // Outputs
    // -----------------------------------------------------------------------

    /// Predicted HP of every roster member.
    pub fn member_health(&mut self) -> Vec<MemberHealth> {
        let default_max = self.config.session.default_max_hp;
        let mut out = Vec::with_capacity(self.session.roster.len());
        for id in &self.session.roster {
            let max_hp  = self.shadow.get(id).map(|e| e.max_hp).unwrap_or(default_max);
            let current = self.shadow.shadow_hp(id, max_hp);
            let hp_percent = self.hp.predicted_hp_percent(&self.shadow, id, current, max_hp);
            out.push(MemberHealth { entity_id: id.clone(), hp_percent });
        }
        out
    }

    /// Recompute party metrics from predicted HP and push them to the planner.
    pub fn refresh_metrics(&mut self) -> PartyHealthMetrics {
        let members = self.member_health();
        let metrics = PartyHealthMetrics::from_members(&members, &self.config.party);
        self.planner.update_metrics(metrics);
        metrics
    }

    /// Refresh metrics, run every rule, and return advice that passed dedup.
    pub fn evaluate(&mut self) -> Vec<AdviceEvent> {
        self.refresh_metrics();
        let now_ms = self.clock.now_ms();

        let candidates = {
            let signals   = self.predictor.view(&self.damage);
            let forecasts = self.predictor.forecasts();
            let ctx = RuleContext {
                planner:        &self.planner,
                signals:        &signals,
                forecasts:      &forecasts,
                min_confidence: self.config.trend.forecast_min_confidence,
                intensity:      self.config.intensity,
                now_ms,
            };
            rules::evaluate_all(&ctx)
        };

        let mut fired = Vec::new();
        for advice in candidates {
            if self.gate.can_fire(&advice.key, advice.severity, now_ms) {
                self.gate.mark_fired(&advice.key, now_ms);
                tracing::debug!("Advice fired: {} ({:?})", advice.key, advice.severity);
                fired.push(advice);
            }
        }
        fired
    }

    /// Current state for display. Uses the metrics from the last refresh.
    pub fn snapshot(&self) -> AdvisorSnapshot {
        let now_ms  = self.clock.now_ms();
        let window  = self.config.planner.trend_window_secs;
        let signals = self.signals();
        let metrics = self.planner.metrics();

        AdvisorSnapshot {
            timestamp_ms:           now_ms,
            in_combat:              self.session.in_combat(),
            encounter_name:         self.session.encounter_name().map(str::to_owned),
            encounter_elapsed_ms:   self.session.encounter_elapsed_ms(now_ms),
            party_size:             self.session.roster.len(),
            metrics,
            damage_trend:           signals.party_trend(window),
            party_damage_rate:      self.damage.party_rate(window),
            party_healing_rate:     self.healing.party_rate(window),
            spike_imminent:         signals.spike_imminent(metrics.avg_hp_percent),
            spike_severity:         signals.spike_severity(metrics.avg_hp_percent),
            healing_urgency:        self.planner.healing_urgency(&signals),
            emergency:              self.planner.is_in_emergency_mode(&signals),
            conserve:               self.planner.should_conserve_resources(&signals),
            high_damage_phase_secs: self.predictor.high_damage_phase_duration(
                &self.damage,
                self.config.trend.high_damage_threshold,
            ),
            pending_heals:          self.hp.all_pending_heals().len(),
            forecasts:              self
                .predictor
                .forecasts()
                .into_iter()
                .map(|(entity_id, f)| ForecastEntry {
                    entity_id,
                    seconds_until_next: f.seconds_until_next,
                    confidence:         f.confidence,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Main engine task
// ---------------------------------------------------------------------------

pub async fn run(
    mut event_rx: Receiver<CombatEvent>,
    mut cmd_rx:   Receiver<AdvisorCommand>,
    advice_tx:    Sender<AdviceEvent>,
    snap_tx:      Sender<AdvisorSnapshot>,
    config:       AdvisorConfig,
) -> Result<()> {
    let mut advisor = HealerAdvisor::new(config);
    let mut events_seen = 0u64;

    loop {
        tokio::select! {
            Some(command) = cmd_rx.recv() => {
                advisor.handle(command);
            }

            // Combat log events: the hot path
            Some(event) = event_rx.recv() => {
                advisor.ingest(&event);
                events_seen += 1;
            }

            else => break,
        }

        for advice in advisor.evaluate() {
            if advice_tx.send(advice).await.is_err() {
                return Ok(());
            }
        }
        // Drop the snapshot if the consumer is slow
        let _ = snap_tx.try_send(advisor.snapshot());
    }

    tracing::info!("Engine finished after {} events", events_seen);
    Ok(())
}
