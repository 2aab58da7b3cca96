/// Cooldown / healing decision planner.
///
/// Combines the latest [`PartyHealthMetrics`] snapshot with live damage
/// signals into go/no-go answers and priorities. It never picks an ability:
/// callers ask about a cooldown by name and decide for themselves.
use crate::{
    catalog::{CooldownCatalog, CooldownRole},
    config::PlannerConfig,
    party::PartyHealthMetrics,
    predictor::DamageTrend,
};
use serde::{Deserialize, Serialize};

/// Healing urgency weights: avg HP, lowest HP, injured ratio, critical ratio.
const URGENCY_AVG_WEIGHT:      f64 = 0.35;
const URGENCY_LOWEST_WEIGHT:   f64 = 0.35;
const URGENCY_INJURED_WEIGHT:  f64 = 0.15;
const URGENCY_CRITICAL_WEIGHT: f64 = 0.15;

/// Damage signals the planner consumes.
///
/// Implemented by `predictor::DamageView` in production; tests script it.
pub trait DamageSignals {
    fn party_trend(&self, window_secs: f64) -> DamageTrend;
    fn party_rate(&self, window_secs: f64) -> f64;
    fn spike_imminent(&self, hp_percent: f64) -> bool;
    fn spike_severity(&self, hp_percent: f64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooldownPriority {
    Low,
    Medium,
    High,
    Emergency,
}

fn trend_factor(trend: DamageTrend) -> f64 {
    match trend {
        DamageTrend::Spiking    => 1.5,
        DamageTrend::Increasing => 1.2,
        DamageTrend::Decreasing => 0.9,
        DamageTrend::Stable     => 1.0,
    }
}

#[derive(Debug)]
pub struct CooldownPlanner {
    config:  PlannerConfig,
    catalog: CooldownCatalog,
    metrics: PartyHealthMetrics,
}

impl CooldownPlanner {
    /// `config.cooldowns` are merged over `catalog`.
    pub fn new(config: PlannerConfig, mut catalog: CooldownCatalog) -> Self {
        catalog.extend(config.cooldowns.iter().cloned());
        Self {
            config,
            catalog,
            metrics: PartyHealthMetrics::healthy(),
        }
    }

    pub fn update(&mut self, avg_hp_percent: f64, lowest_hp_percent: f64, injured_count: u32, critical_count: u32) {
        self.update_metrics(PartyHealthMetrics {
            avg_hp_percent,
            lowest_hp_percent,
            injured_count,
            critical_count,
        });
    }

    pub fn update_metrics(&mut self, metrics: PartyHealthMetrics) {
        self.metrics = metrics;
    }

    pub fn metrics(&self) -> PartyHealthMetrics {
        self.metrics
    }

    pub fn catalog(&self) -> &CooldownCatalog {
        &self.catalog
    }

    fn trend(&self, signals: &dyn DamageSignals) -> DamageTrend {
        signals.party_trend(self.config.trend_window_secs)
    }

    fn too_many_critical(&self) -> bool {
        self.metrics.critical_count >= self.config.critical_members
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    pub fn should_use_major_defensive(&self, signals: &dyn DamageSignals) -> bool {
        self.too_many_critical()
            || self.metrics.avg_hp_percent < self.config.major_avg_hp
            || signals.spike_imminent(self.metrics.avg_hp_percent)
    }

    pub fn should_use_minor_defensive(&self, signals: &dyn DamageSignals) -> bool {
        self.trend(signals) == DamageTrend::Increasing
            || signals.party_rate(self.config.trend_window_secs) > self.config.proactive_damage_rate
    }

    pub fn is_in_emergency_mode(&self, signals: &dyn DamageSignals) -> bool {
        if self.too_many_critical() || self.metrics.lowest_hp_percent < self.config.emergency_lowest_hp {
            return true;
        }
        self.metrics.avg_hp_percent < self.config.emergency_avg_hp
            && self.trend(signals) == DamageTrend::Spiking
    }

    pub fn is_damage_spike_expected(&self, signals: &dyn DamageSignals) -> bool {
        self.trend(signals) == DamageTrend::Spiking
            || signals.spike_imminent(self.metrics.avg_hp_percent)
    }

    /// 0 (nothing to heal) to 1 (heal now).
    pub fn healing_urgency(&self, signals: &dyn DamageSignals) -> f64 {
        let m = &self.metrics;
        let party = self.config.party_size.max(1) as f64;
        let avg    = m.avg_hp_percent.clamp(0.0, 1.0);
        let lowest = m.lowest_hp_percent.clamp(0.0, 1.0);
        let injured_ratio  = (m.injured_count as f64 / party).min(1.0);
        let critical_ratio = (m.critical_count as f64 / party).min(1.0);

        let base = URGENCY_AVG_WEIGHT * (1.0 - avg)
            + URGENCY_LOWEST_WEIGHT * (1.0 - lowest)
            + URGENCY_INJURED_WEIGHT * injured_ratio
            + URGENCY_CRITICAL_WEIGHT * critical_ratio;

        (base * trend_factor(self.trend(signals))).clamp(0.0, 1.0)
    }

    /// Bank resources only when a spike is coming and nobody is hurting yet.
    pub fn should_conserve_resources(&self, signals: &dyn DamageSignals) -> bool {
        self.metrics.avg_hp_percent > self.config.conserve_avg_hp
            && self.metrics.lowest_hp_percent > self.config.conserve_lowest_hp
            && self.is_damage_spike_expected(signals)
    }

    pub fn cooldown_priority(&self, name: &str, signals: &dyn DamageSignals) -> CooldownPriority {
        let Some(role) = self.catalog.role(name) else {
            return CooldownPriority::Medium;
        };

        let high = match role {
            CooldownRole::Emergency => {
                if self.is_in_emergency_mode(signals) {
                    return CooldownPriority::Emergency;
                }
                self.metrics.lowest_hp_percent < self.config.save_lowest_hp
            }
            CooldownRole::MajorDefensive => self.should_use_major_defensive(signals),
            CooldownRole::MinorDefensive => self.should_use_minor_defensive(signals),
            CooldownRole::HealingBurst => {
                self.healing_urgency(signals) >= self.config.healing_burst_urgency
                    || self.trend(signals) == DamageTrend::Spiking
            }
        };

        if high {
            CooldownPriority::High
        } else {
            CooldownPriority::Low
        }
    }
}
