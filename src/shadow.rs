/// Shadow HP: a locally maintained running HP total per entity.
///
/// Updated synchronously from combat events the moment they resolve, so it
/// runs ahead of the game's visible HP. The HP predictor only reads it via
/// [`ShadowHpSource`], with a fallback for entities it has never seen.
use std::collections::HashMap;

pub trait ShadowHpSource {
    /// Shadow HP for `entity_id`, or `fallback` when it is not tracked.
    fn shadow_hp(&self, entity_id: &str, fallback: u64) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowEntry {
    pub hp:     u64,
    pub max_hp: u64,
}

impl ShadowEntry {
    pub fn percent(&self) -> f64 {
        if self.max_hp == 0 {
            return 0.0;
        }
        self.hp as f64 / self.max_hp as f64
    }
}

#[derive(Debug)]
pub struct ShadowHpTable {
    default_max_hp: u64,
    entries:        HashMap<String, ShadowEntry>,
}

impl ShadowHpTable {
    pub fn new(default_max_hp: u64) -> Self {
        Self { default_max_hp, entries: HashMap::new() }
    }

    fn entry_mut(&mut self, entity_id: &str) -> &mut ShadowEntry {
        let max_hp = self.default_max_hp;
        self.entries
            .entry(entity_id.to_owned())
            .or_insert(ShadowEntry { hp: max_hp, max_hp })
    }

    /// Start tracking at full HP if not already tracked.
    pub fn track(&mut self, entity_id: &str) {
        self.entry_mut(entity_id);
    }

    /// Authoritative correction (e.g. an HP read from the game client).
    pub fn set(&mut self, entity_id: &str, hp: u64, max_hp: u64) {
        let max_hp = max_hp.max(1);
        self.entries
            .insert(entity_id.to_owned(), ShadowEntry { hp: hp.min(max_hp), max_hp });
    }

    pub fn apply_damage(&mut self, entity_id: &str, amount: u64) {
        let entry = self.entry_mut(entity_id);
        entry.hp = entry.hp.saturating_sub(amount);
    }

    pub fn apply_heal(&mut self, entity_id: &str, amount: u64) {
        let entry = self.entry_mut(entity_id);
        entry.hp = entry.hp.saturating_add(amount).min(entry.max_hp);
    }

    pub fn mark_dead(&mut self, entity_id: &str) {
        if let Some(entry) = self.entries.get_mut(entity_id) {
            entry.hp = 0;
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<ShadowEntry> {
        self.entries.get(entity_id).copied()
    }

    pub fn remove(&mut self, entity_id: &str) {
        self.entries.remove(entity_id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl ShadowHpSource for ShadowHpTable {
    fn shadow_hp(&self, entity_id: &str, fallback: u64) -> u64 {
        self.entries.get(entity_id).map(|e| e.hp).unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_damage_and_healing_within_bounds() {
        let mut table = ShadowHpTable::new(10_000);
        table.apply_damage("Player-1", 4_000);
        assert_eq!(table.shadow_hp("Player-1", 0), 6_000);

        table.apply_heal("Player-1", 9_000);
        assert_eq!(table.shadow_hp("Player-1", 0), 10_000);

        table.apply_damage("Player-1", 50_000);
        assert_eq!(table.shadow_hp("Player-1", 0), 0);
    }

    #[test]
    fn unknown_entities_use_fallback() {
        let table = ShadowHpTable::new(10_000);
        assert_eq!(table.shadow_hp("Player-9", 4_321), 4_321);
    }

    #[test]
    fn set_overrides_and_clamps() {
        let mut table = ShadowHpTable::new(10_000);
        table.set("Player-1", 80_000, 50_000);
        assert_eq!(table.get("Player-1"), Some(ShadowEntry { hp: 50_000, max_hp: 50_000 }));
        table.mark_dead("Player-1");
        assert_eq!(table.get("Player-1").map(|e| e.percent()), Some(0.0));
    }
}
