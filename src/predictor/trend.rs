/// Damage trend classification over half-window rate comparisons.
///
/// A window of `w` seconds is split into a recent half and an older half.
/// The recent half's rate is "current", the older half's is "previous", and
/// the relative change between them decides the trend.
use crate::{
    config::TrendConfig,
    intake::{is_valid_window, IntakeSource},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageTrend {
    Stable,
    Increasing,
    Decreasing,
    Spiking,
}

/// Rates of the recent and older half of a window, amount per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePair {
    pub current:  f64,
    pub previous: f64,
}

impl RatePair {
    /// Change in rate per second across the half-window gap.
    pub fn acceleration(&self, half_window_secs: f64) -> f64 {
        if !is_valid_window(half_window_secs) {
            return 0.0;
        }
        (self.current - self.previous) / half_window_secs
    }
}

fn sanitize(rate: f64) -> f64 {
    if rate.is_finite() { rate.max(0.0) } else { 0.0 }
}

pub fn classify_trend(current: f64, previous: f64, config: &TrendConfig) -> DamageTrend {
    let current  = sanitize(current);
    let previous = sanitize(previous);

    // Going from nothing to real damage is a spike by definition.
    if previous < config.min_rate {
        return if current >= config.min_rate {
            DamageTrend::Spiking
        } else {
            DamageTrend::Stable
        };
    }

    let percent_change = (current - previous) / previous;
    if percent_change >= config.spike_threshold {
        DamageTrend::Spiking
    } else if percent_change >= config.increase_threshold {
        DamageTrend::Increasing
    } else if percent_change <= -config.increase_threshold {
        DamageTrend::Decreasing
    } else {
        DamageTrend::Stable
    }
}

/// Party-wide split: the full window's average rate is the mean of its two
/// half-window rates, so `previous = 2 * blended - current`.
pub fn party_rates(intake: &dyn IntakeSource, window_secs: f64) -> Option<RatePair> {
    if !is_valid_window(window_secs) {
        return None;
    }
    let current = intake.party_rate(window_secs / 2.0);
    let blended = intake.party_rate(window_secs);
    Some(RatePair {
        current,
        previous: (2.0 * blended - current).max(0.0),
    })
}

pub fn entity_rates(intake: &dyn IntakeSource, entity_id: &str, window_secs: f64) -> Option<RatePair> {
    if !is_valid_window(window_secs) {
        return None;
    }
    let half = window_secs / 2.0;
    let current = intake.rate(entity_id, half);
    let older = intake.recent_intake(entity_id, window_secs) - intake.recent_intake(entity_id, half);
    Some(RatePair {
        current,
        previous: (older / half).max(0.0),
    })
}
