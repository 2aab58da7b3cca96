#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransition {
    Entered,
    Exited { duration_ms: u64 },
    Unchanged,
}

/// Edge-triggered tracking of sustained high party damage.
///
/// The phase opens the first time the observed rate crosses the threshold and
/// is not re-armed until the rate drops back below it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighDamagePhase {
    pub is_active:      bool,
    pub phase_start_ms: u64,
}

impl HighDamagePhase {
    pub fn observe(&mut self, rate: f64, threshold: f64, now_ms: u64) -> PhaseTransition {
        let above = rate > threshold;
        match (self.is_active, above) {
            (false, true) => {
                self.is_active      = true;
                self.phase_start_ms = now_ms;
                PhaseTransition::Entered
            }
            (true, false) => {
                self.is_active = false;
                PhaseTransition::Exited {
                    duration_ms: now_ms.saturating_sub(self.phase_start_ms),
                }
            }
            _ => PhaseTransition::Unchanged,
        }
    }

    /// Seconds since the phase opened; 0 while inactive.
    pub fn elapsed_secs(&self, now_ms: u64) -> f64 {
        if !self.is_active {
            return 0.0;
        }
        now_ms.saturating_sub(self.phase_start_ms) as f64 / 1_000.0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enters_once_and_exits_on_drop() {
        let mut phase = HighDamagePhase::default();
        assert_eq!(phase.observe(6_000.0, 5_000.0, 1_000), PhaseTransition::Entered);
        assert_eq!(phase.observe(7_000.0, 5_000.0, 2_000), PhaseTransition::Unchanged);
        assert_eq!(phase.phase_start_ms, 1_000, "staying active must not re-arm");
        assert_eq!(phase.elapsed_secs(3_500), 2.5);

        assert_eq!(
            phase.observe(1_000.0, 5_000.0, 4_000),
            PhaseTransition::Exited { duration_ms: 3_000 }
        );
        assert!(!phase.is_active);
        assert_eq!(phase.elapsed_secs(5_000), 0.0);
    }

    #[test]
    fn threshold_itself_is_not_above() {
        let mut phase = HighDamagePhase::default();
        assert_eq!(phase.observe(5_000.0, 5_000.0, 0), PhaseTransition::Unchanged);
        assert!(!phase.is_active);
    }
}
