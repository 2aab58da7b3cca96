/// Fires Warn when the planner wants a defensive or a throughput cooldown.
///
/// Three independent advisories:
///   "Major Defensive": party-wide mitigation (intensity >= 1)
///   "Minor Defensive": proactive mitigation, suppressed while a major
///                      defensive is already recommended (intensity >= 3)
///   "Healing Burst":   throughput cooldown while urgency is high or damage
///                      is spiking (intensity >= 2)
///
/// Advice names the catalog cooldowns of the matching role ranked `High` or
/// better, so nothing fires for a role the catalog has no tools for.
use super::{advice, percent, ranked_cooldowns, RuleContext, RuleOutput};
use crate::{catalog::CooldownRole, engine::Severity, planner::CooldownPriority};

pub const MAJOR_KEY: &str = "major_defensive";
pub const MINOR_KEY: &str = "minor_defensive";
pub const BURST_KEY: &str = "healing_burst";

const MIN_INTENSITY_MAJOR: u8 = 1;
const MIN_INTENSITY_BURST: u8 = 2;
const MIN_INTENSITY_MINOR: u8 = 3;

/// Party damage over this window is quoted in the advice.
const RATE_WINDOW_SECS: f64 = 5.0;

pub fn evaluate(ctx: &RuleContext) -> RuleOutput {
    let mut out = Vec::new();
    let planner = ctx.planner;
    let rate = ctx.signals.party_rate(RATE_WINDOW_SECS);

    let major = planner.should_use_major_defensive(ctx.signals);
    if major && ctx.intensity >= MIN_INTENSITY_MAJOR {
        let tools = ranked_cooldowns(ctx, CooldownRole::MajorDefensive, CooldownPriority::High);
        if !tools.is_empty() {
            let m = planner.metrics();
            out.push(advice(
                MAJOR_KEY,
                "Major Defensive",
                format!("Party average at {}. Use {}.", percent(m.avg_hp_percent), tools.join(" / ")),
                Severity::Warn,
                vec![
                    ("average".to_owned(),   percent(m.avg_hp_percent)),
                    ("dps_taken".to_owned(), format!("{:.0}", rate)),
                    ("cooldowns".to_owned(), tools.join(", ")),
                ],
                ctx.now_ms,
            ));
        }
    }

    if !major && ctx.intensity >= MIN_INTENSITY_MINOR && planner.should_use_minor_defensive(ctx.signals) {
        let tools = ranked_cooldowns(ctx, CooldownRole::MinorDefensive, CooldownPriority::High);
        if !tools.is_empty() {
            out.push(advice(
                MINOR_KEY,
                "Minor Defensive",
                format!("Damage is climbing ({:.0}/s). Consider {}.", rate, tools.join(" / ")),
                Severity::Warn,
                vec![
                    ("dps_taken".to_owned(), format!("{:.0}", rate)),
                    ("cooldowns".to_owned(), tools.join(", ")),
                ],
                ctx.now_ms,
            ));
        }
    }

    if ctx.intensity >= MIN_INTENSITY_BURST {
        let tools = ranked_cooldowns(ctx, CooldownRole::HealingBurst, CooldownPriority::High);
        if !tools.is_empty() {
            let urgency = planner.healing_urgency(ctx.signals);
            out.push(advice(
                BURST_KEY,
                "Healing Burst",
                format!("Healing urgency {}. Use {}.", percent(urgency), tools.join(" / ")),
                Severity::Warn,
                vec![
                    ("urgency".to_owned(),   percent(urgency)),
                    ("cooldowns".to_owned(), tools.join(", ")),
                ],
                ctx.now_ms,
            ));
        }
    }

    out
}
