/// Fires Warn when a confident spike forecast is about to come due.
///
/// "Spike Incoming" gives the healer a short lead to pre-shield or pre-HoT
/// the member whose damage has been arriving at regular intervals.
///
/// Fires when:
///   - A forecast has confidence >= the configured minimum
///   - The next spike is due within LEAD_SECS
///   - Intensity >= 2
///
/// Keyed per entity so two members on different timers both get called out.
use super::{advice, percent, RuleContext, RuleOutput};
use crate::engine::Severity;

const LEAD_SECS:     f64 = 3.0;
const MIN_INTENSITY: u8  = 2;

pub fn key(entity_id: &str) -> String {
    format!("spike_forecast_{}", entity_id)
}

pub fn evaluate(ctx: &RuleContext) -> RuleOutput {
    if ctx.intensity < MIN_INTENSITY {
        return vec![];
    }

    ctx.forecasts
        .iter()
        .filter(|(_, f)| f.is_confident(ctx.min_confidence) && f.seconds_until_next <= LEAD_SECS)
        .map(|(entity_id, f)| {
            advice(
                &key(entity_id),
                "Spike Incoming",
                format!(
                    "{} expected to take a spike in {:.1}s ({} confidence).",
                    entity_id, f.seconds_until_next, percent(f.confidence)
                ),
                Severity::Warn,
                vec![
                    ("target".to_owned(),     entity_id.clone()),
                    ("in_secs".to_owned(),    format!("{:.1}", f.seconds_until_next)),
                    ("confidence".to_owned(), percent(f.confidence)),
                ],
                ctx.now_ms,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::CooldownCatalog,
        config::PlannerConfig,
        planner::CooldownPlanner,
        predictor::SpikeForecast,
        rules::testing::FixedSignals,
    };

    fn run(forecasts: &[(String, SpikeForecast)], intensity: u8) -> RuleOutput {
        let planner = CooldownPlanner::new(PlannerConfig::default(), CooldownCatalog::new());
        let signals = FixedSignals::calm();
        evaluate(&RuleContext {
            planner:        &planner,
            signals:        &signals,
            forecasts,
            min_confidence: 0.6,
            intensity,
            now_ms:         42_000,
        })
    }

    fn forecast(id: &str, secs: f64, confidence: f64) -> (String, SpikeForecast) {
        (id.to_owned(), SpikeForecast { seconds_until_next: secs, confidence })
    }

    #[test]
    fn fires_for_confident_near_forecasts_only() {
        let forecasts = vec![
            forecast("Player-1", 1.5, 0.9),
            forecast("Player-2", 1.0, 0.3),
            forecast("Player-3", 8.0, 0.95),
        ];
        let out = run(&forecasts, 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, key("Player-1"));
        assert_eq!(out[0].timestamp_ms, 42_000);
        assert!(out[0].message.contains("1.5s"));
    }

    #[test]
    fn respects_intensity() {
        let forecasts = vec![forecast("Player-1", 0.0, 1.0)];
        assert!(run(&forecasts, 1).is_empty());
        assert_eq!(run(&forecasts, 2).len(), 1);
    }
}
