/// Near-future HP prediction.
///
/// Visible HP lags behind ability resolution. Prediction starts from shadow
/// HP and adds a ledger of heals that were committed (cast issued) but have
/// not landed yet. Ledger entries expire after `pending_heal_timeout_secs` so
/// a heal that never lands is not trusted forever.
///
/// Expired entries are removed lazily, on the first prediction that reads
/// them. Raw accessors (`pending_heal_amount`, `all_pending_heals`) ignore
/// expiry.
use crate::{
    clock::{secs_to_ms, CombatClock},
    config::HpConfig,
    shadow::ShadowHpSource,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingHealEntry {
    /// May be negative: expected incoming damage lowers the prediction.
    pub accumulated_amount: i64,
    pub last_update_ms:     u64,
}

/// A heal landed on `target_id`. Shadow HP already includes it, so the
/// ledger entry for that target is redundant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealLanded {
    pub healer_id: String,
    pub target_id: String,
    pub amount:    u64,
}

#[derive(Debug)]
pub struct HpPredictor {
    clock:  CombatClock,
    config: HpConfig,
    ledger: HashMap<String, PendingHealEntry>,
}

impl HpPredictor {
    pub fn new(clock: CombatClock, config: HpConfig) -> Self {
        Self { clock, config, ledger: HashMap::new() }
    }

    pub fn config(&self) -> &HpConfig {
        &self.config
    }

    pub fn set_crit_variance_reduction(&mut self, enabled: bool) {
        self.config.crit_variance_reduction = enabled;
    }

    fn is_stale(&self, entry: &PendingHealEntry) -> bool {
        let timeout = secs_to_ms(self.config.pending_heal_timeout_secs);
        self.clock.now_ms().saturating_sub(entry.last_update_ms) > timeout
    }

    /// Pending amount that counts toward prediction, after variance reduction.
    fn effective_pending(&self, accumulated: i64) -> f64 {
        let amount = accumulated as f64;
        if self.config.crit_variance_reduction {
            amount * (1.0 - self.config.crit_variance_factor.clamp(0.0, 1.0))
        } else {
            amount
        }
    }

    pub fn predicted_hp(
        &mut self,
        shadow:     &dyn ShadowHpSource,
        entity_id:  &str,
        current_hp: u64,
        max_hp:     u64,
    ) -> u64 {
        let base = shadow.shadow_hp(entity_id, current_hp) as f64;

        let pending = match self.ledger.get(entity_id).copied() {
            Some(entry) if self.is_stale(&entry) => {
                tracing::trace!("Pending heal on {} expired ({})", entity_id, entry.accumulated_amount);
                self.ledger.remove(entity_id);
                0.0
            }
            Some(entry) => self.effective_pending(entry.accumulated_amount),
            None => 0.0,
        };

        (base + pending).clamp(0.0, max_hp as f64).round() as u64
    }

    pub fn predicted_hp_percent(
        &mut self,
        shadow:     &dyn ShadowHpSource,
        entity_id:  &str,
        current_hp: u64,
        max_hp:     u64,
    ) -> f64 {
        if max_hp == 0 {
            return 0.0;
        }
        self.predicted_hp(shadow, entity_id, current_hp, max_hp) as f64 / max_hp as f64
    }

    /// Add `amount` to the entity's ledger and restart its timeout.
    pub fn register_pending_heal(&mut self, entity_id: &str, amount: i64) {
        let now_ms = self.clock.now_ms();
        let entry = self
            .ledger
            .entry(entity_id.to_owned())
            .or_insert(PendingHealEntry { accumulated_amount: 0, last_update_ms: now_ms });
        entry.accumulated_amount = entry.accumulated_amount.saturating_add(amount);
        entry.last_update_ms     = now_ms;
        tracing::debug!("Pending heal on {}: {:+} (total {})", entity_id, amount, entry.accumulated_amount);
    }

    pub fn register_pending_aoe_heal<S: AsRef<str>>(&mut self, target_ids: &[S], amount: i64) {
        for id in target_ids {
            self.register_pending_heal(id.as_ref(), amount);
        }
    }

    /// Raw accumulated amount, ignoring expiry.
    pub fn pending_heal_amount(&self, entity_id: &str) -> i64 {
        self.ledger.get(entity_id).map(|e| e.accumulated_amount).unwrap_or(0)
    }

    /// Snapshot of every non-zero ledger entry, ignoring expiry.
    pub fn all_pending_heals(&self) -> HashMap<String, i64> {
        self.ledger
            .iter()
            .filter(|(_, e)| e.accumulated_amount != 0)
            .map(|(id, e)| (id.clone(), e.accumulated_amount))
            .collect()
    }

    pub fn has_pending_heals(&self) -> bool {
        self.ledger.values().any(|e| e.accumulated_amount != 0)
    }

    pub fn clear_pending_heals(&mut self) {
        self.ledger.clear();
    }

    pub fn clear_pending_heals_for(&mut self, entity_id: &str) {
        self.ledger.remove(entity_id);
    }

    pub fn apply_heal_landed(&mut self, notice: &HealLanded) {
        if self.ledger.remove(&notice.target_id).is_some() {
            tracing::debug!(
                "Heal from {} landed on {} ({}), pending entry cleared",
                notice.healer_id, notice.target_id, notice.amount
            );
        }
    }
}
