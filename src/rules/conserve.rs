/// Fires Good when the healer should bank resources for an incoming spike.
///
/// "Bank Mana": the party is healthy and damage is about to rise, so
/// spending throughput cooldowns now would waste them.
///
/// Fires when:
///   - Planner says conserve (healthy party, spike expected)
///   - Intensity >= 3
use super::{advice, percent, RuleContext, RuleOutput};
use crate::engine::Severity;

pub const KEY: &str = "conserve";

const MIN_INTENSITY: u8 = 3;

pub fn evaluate(ctx: &RuleContext) -> RuleOutput {
    if ctx.intensity < MIN_INTENSITY || !ctx.planner.should_conserve_resources(ctx.signals) {
        return vec![];
    }

    let m = ctx.planner.metrics();
    vec![advice(
        KEY,
        "Bank Mana",
        format!(
            "Party is topped ({} average). Hold cooldowns for the incoming spike.",
            percent(m.avg_hp_percent)
        ),
        Severity::Good,
        vec![("average".to_owned(), percent(m.avg_hp_percent))],
        ctx.now_ms,
    )]
}
