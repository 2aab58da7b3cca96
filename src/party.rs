/// Party health snapshot fed to the planner each tick.
use crate::config::PartyConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberHealth {
    pub entity_id:  String,
    /// Predicted HP fraction, 0.0 to 1.0.
    pub hp_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartyHealthMetrics {
    pub avg_hp_percent:    f64,
    pub lowest_hp_percent: f64,
    pub injured_count:     u32,
    pub critical_count:    u32,
}

impl Default for PartyHealthMetrics {
    fn default() -> Self {
        Self::healthy()
    }
}

impl PartyHealthMetrics {
    /// Everyone at full HP; also what an empty party reports.
    pub fn healthy() -> Self {
        Self {
            avg_hp_percent:    1.0,
            lowest_hp_percent: 1.0,
            injured_count:     0,
            critical_count:    0,
        }
    }

    pub fn from_members(members: &[MemberHealth], thresholds: &PartyConfig) -> Self {
        if members.is_empty() {
            return Self::healthy();
        }

        let mut sum     = 0.0;
        let mut lowest  = f64::MAX;
        let mut injured = 0;
        let mut critical = 0;

        for member in members {
            let pct = if member.hp_percent.is_finite() {
                member.hp_percent.clamp(0.0, 1.0)
            } else {
                0.0
            };
            sum += pct;
            lowest = lowest.min(pct);
            if pct < thresholds.injured_below {
                injured += 1;
            }
            if pct < thresholds.critical_below {
                critical += 1;
            }
        }

        Self {
            avg_hp_percent:    sum / members.len() as f64,
            lowest_hp_percent: lowest,
            injured_count:     injured,
            critical_count:    critical,
        }
    }
}
