pub mod conserve;
pub mod defensive;
pub mod emergency;
pub mod spike_forecast;

use crate::{
    catalog::CooldownRole,
    engine::{AdviceEvent, Severity},
    planner::{CooldownPlanner, CooldownPriority, DamageSignals},
    predictor::SpikeForecast,
};

/// Read-only context passed to every rule evaluator.
pub struct RuleContext<'a> {
    pub planner:        &'a CooldownPlanner,
    pub signals:        &'a dyn DamageSignals,
    /// Known spike forecasts, soonest first.
    pub forecasts:      &'a [(String, SpikeForecast)],
    pub min_confidence: f64,
    /// Advice intensity from user settings (1 = quiet, 5 = aggressive)
    pub intensity:      u8,
    pub now_ms:         u64,
}

/// Rules return zero or more advice events.
/// Zero means the rule did not fire this evaluation.
pub type RuleOutput = Vec<AdviceEvent>;

/// Every rule, in evaluation order.
pub fn evaluate_all(ctx: &RuleContext) -> RuleOutput {
    emergency::evaluate(ctx)
        .into_iter()
        .chain(defensive::evaluate(ctx))
        .chain(spike_forecast::evaluate(ctx))
        .chain(conserve::evaluate(ctx))
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers shared by rules
// ---------------------------------------------------------------------------

pub fn advice(
    key:      &str,
    title:    &str,
    message:  String,
    severity: Severity,
    kv:       Vec<(String, String)>,
    now_ms:   u64,
) -> AdviceEvent {
    AdviceEvent {
        key:          key.to_owned(),
        title:        title.to_owned(),
        message,
        severity,
        kv,
        timestamp_ms: now_ms,
    }
}

/// Catalog cooldowns of `role` currently ranked at least `min`, sorted by name.
pub fn ranked_cooldowns(ctx: &RuleContext, role: CooldownRole, min: CooldownPriority) -> Vec<String> {
    let mut names: Vec<String> = ctx
        .planner
        .catalog()
        .entries()
        .filter(|e| e.role == role)
        .filter(|e| ctx.planner.cooldown_priority(&e.name, ctx.signals) >= min)
        .map(|e| e.name.clone())
        .collect();
    names.sort();
    names
}

pub fn percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::predictor::DamageTrend;
    use crate::planner::DamageSignals;

    /// Signals with fixed answers.
    #[derive(Debug, Clone, Copy)]
    pub struct FixedSignals {
        pub trend:    DamageTrend,
        pub rate:     f64,
        pub imminent: bool,
    }

    impl FixedSignals {
        pub fn calm() -> Self {
            Self { trend: DamageTrend::Stable, rate: 0.0, imminent: false }
        }
    }

    impl DamageSignals for FixedSignals {
        fn party_trend(&self, _window_secs: f64) -> DamageTrend {
            self.trend
        }
        fn party_rate(&self, _window_secs: f64) -> f64 {
            self.rate
        }
        fn spike_imminent(&self, _hp_percent: f64) -> bool {
            self.imminent
        }
        fn spike_severity(&self, _hp_percent: f64) -> f64 {
            0.0
        }
    }
}
