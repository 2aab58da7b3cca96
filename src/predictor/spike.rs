/// Spike history per entity and next-spike forecasting.
///
/// Forecasts assume boss mechanics recur on a rhythm: the mean inter-spike
/// interval predicts the next one, and the interval spread (coefficient of
/// variation) decides how much to trust it.
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Fewer recorded spikes than this never produce a forecast.
pub const MIN_SPIKES_FOR_FORECAST: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeEvent {
    pub timestamp_ms: u64,
    pub amount:       f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeForecast {
    /// Seconds until the next expected spike; `f64::MAX` when unknown.
    pub seconds_until_next: f64,
    /// 0 (no idea) to 1 (perfectly regular history).
    pub confidence:         f64,
}

impl SpikeForecast {
    pub fn none() -> Self {
        Self { seconds_until_next: f64::MAX, confidence: 0.0 }
    }

    pub fn is_known(&self) -> bool {
        self.confidence > 0.0
    }

    pub fn is_confident(&self, min_confidence: f64) -> bool {
        self.is_known() && self.confidence >= min_confidence
    }
}

#[derive(Debug, Default)]
pub struct SpikeHistory {
    events: HashMap<String, VecDeque<SpikeEvent>>,
}

impl SpikeHistory {
    /// Append a spike unless one was recorded for this entity less than
    /// `cooldown_ms` ago. Returns whether the spike was recorded.
    pub fn record(&mut self, entity_id: &str, amount: f64, now_ms: u64, cooldown_ms: u64) -> bool {
        let log = self.events.entry(entity_id.to_owned()).or_default();
        if let Some(last) = log.back() {
            if now_ms.saturating_sub(last.timestamp_ms) < cooldown_ms {
                return false;
            }
        }
        log.push_back(SpikeEvent { timestamp_ms: now_ms, amount });
        true
    }

    /// Drop spikes older than the retention horizon, and entities left empty.
    pub fn prune(&mut self, now_ms: u64, retention_ms: u64) {
        let cutoff = now_ms.saturating_sub(retention_ms);
        self.events.retain(|_, log| {
            while log.front().is_some_and(|e| e.timestamp_ms < cutoff) {
                log.pop_front();
            }
            !log.is_empty()
        });
    }

    pub fn count(&self, entity_id: &str) -> usize {
        self.events.get(entity_id).map(VecDeque::len).unwrap_or(0)
    }

    pub fn last(&self, entity_id: &str) -> Option<SpikeEvent> {
        self.events.get(entity_id)?.back().copied()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn clear_entity(&mut self, entity_id: &str) {
        self.events.remove(entity_id);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn forecast(&self, entity_id: &str, now_ms: u64) -> SpikeForecast {
        let Some(log) = self.events.get(entity_id) else {
            return SpikeForecast::none();
        };
        if log.len() < MIN_SPIKES_FOR_FORECAST {
            return SpikeForecast::none();
        }

        let intervals: Vec<f64> = log
            .iter()
            .zip(log.iter().skip(1))
            .map(|(a, b)| b.timestamp_ms.saturating_sub(a.timestamp_ms) as f64 / 1_000.0)
            .collect();

        let n = intervals.len() as f64;
        let mean = intervals.iter().sum::<f64>() / n;
        if mean <= 0.0 {
            return SpikeForecast::none();
        }

        let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / n;
        let cv = variance.sqrt() / mean;
        let confidence = (1.0 - cv).clamp(0.0, 1.0);
        if confidence <= 0.0 {
            return SpikeForecast::none();
        }

        let Some(last) = self.last(entity_id) else {
            return SpikeForecast::none();
        };
        let since_last = now_ms.saturating_sub(last.timestamp_ms) as f64 / 1_000.0;

        SpikeForecast {
            seconds_until_next: (mean - since_last).max(0.0),
            confidence,
        }
    }
}
