/// Fires Bad when the party is in emergency mode.
///
/// "Emergency" names the emergency-class cooldowns from the catalog so the
/// healer can pick one without scanning their bars.
///
/// Fires when:
///   - Two or more members are critical, or
///   - The lowest member is below the emergency threshold, or
///   - Average HP is low while damage is spiking
///
/// Always fires regardless of intensity.
use super::{advice, percent, ranked_cooldowns, RuleContext, RuleOutput};
use crate::{catalog::CooldownRole, engine::Severity, planner::CooldownPriority};

pub const KEY: &str = "emergency";

pub fn evaluate(ctx: &RuleContext) -> RuleOutput {
    if !ctx.planner.is_in_emergency_mode(ctx.signals) {
        return vec![];
    }

    let m = ctx.planner.metrics();
    let tools = ranked_cooldowns(ctx, CooldownRole::Emergency, CooldownPriority::Emergency);

    let message = if tools.is_empty() {
        format!(
            "Lowest member at {} with {} critical. Stabilise now.",
            percent(m.lowest_hp_percent), m.critical_count
        )
    } else {
        format!(
            "Lowest member at {} with {} critical. Use {}.",
            percent(m.lowest_hp_percent), m.critical_count, tools.join(" / ")
        )
    };

    let mut kv = vec![
        ("lowest".to_owned(),   percent(m.lowest_hp_percent)),
        ("average".to_owned(),  percent(m.avg_hp_percent)),
        ("critical".to_owned(), m.critical_count.to_string()),
    ];
    if !tools.is_empty() {
        kv.push(("cooldowns".to_owned(), tools.join(", ")));
    }

    vec![advice(KEY, "Emergency", message, Severity::Bad, kv, ctx.now_ms)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::CooldownCatalog,
        config::PlannerConfig,
        planner::CooldownPlanner,
        rules::testing::FixedSignals,
    };

    fn ctx<'a>(planner: &'a CooldownPlanner, signals: &'a FixedSignals) -> RuleContext<'a> {
        RuleContext {
            planner,
            signals,
            forecasts:      &[],
            min_confidence: 0.6,
            intensity:      1,
            now_ms:         10_000,
        }
    }

    #[test]
    fn silent_when_party_is_stable() {
        let mut planner = CooldownPlanner::new(PlannerConfig::default(), CooldownCatalog::for_profile("PRIEST/Holy"));
        planner.update(0.8, 0.6, 3, 0);
        let signals = FixedSignals::calm();
        assert!(evaluate(&ctx(&planner, &signals)).is_empty());
    }

    #[test]
    fn names_emergency_cooldowns() {
        let mut planner = CooldownPlanner::new(PlannerConfig::default(), CooldownCatalog::for_profile("PRIEST/Holy"));
        planner.update(0.7, 0.15, 4, 1);
        let signals = FixedSignals::calm();

        let out = evaluate(&ctx(&planner, &signals));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, KEY);
        assert!(matches!(out[0].severity, Severity::Bad));
        assert!(out[0].message.contains("Guardian Spirit"), "{}", out[0].message);
        assert!(out[0].message.contains("15%"));
    }

    #[test]
    fn fires_without_catalog_entries() {
        let mut planner = CooldownPlanner::new(PlannerConfig::default(), CooldownCatalog::new());
        planner.update(0.6, 0.25, 5, 2);
        let signals = FixedSignals::calm();

        let out = evaluate(&ctx(&planner, &signals));
        assert_eq!(out.len(), 1);
        assert!(out[0].message.contains("Stabilise"));
    }
}
