/// Session model maintained by the engine: who is in the party, which
/// encounter is running, and which entities took damage since the last
/// predictor update.
///
/// Owned by the engine task; no locking needed.
use std::collections::{BTreeSet, HashSet};

// ---------------------------------------------------------------------------
// Encounter tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncounterOutcome {
    Kill,
    Wipe,
}

#[derive(Debug, Clone)]
pub struct Encounter {
    pub encounter_id: u32,
    pub name:         String,
    pub start_ms:     u64,
    pub end_ms:       Option<u64>,
    pub outcome:      Option<EncounterOutcome>,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// GUID prefix of player characters; only these count as party members.
pub const PLAYER_GUID_PREFIX: &str = "Player-";

pub fn is_party_guid(guid: &str) -> bool {
    guid.starts_with(PLAYER_GUID_PREFIX)
}

#[derive(Debug, Default)]
pub struct SessionState {
    /// Party roster, ordered for stable snapshots.
    pub roster:            BTreeSet<String>,
    pub current_encounter: Option<Encounter>,
    pub encounter_history: Vec<Encounter>,
    pub zone_name:         Option<String>,
    /// Entities that took damage since the last predictor update.
    affected:              HashSet<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_combat(&self) -> bool {
        self.current_encounter.is_some()
    }

    pub fn encounter_name(&self) -> Option<&str> {
        self.current_encounter.as_ref().map(|e| e.name.as_str())
    }

    /// Returns true when the member was not already on the roster.
    pub fn add_member(&mut self, guid: &str) -> bool {
        if self.roster.contains(guid) {
            return false;
        }
        self.roster.insert(guid.to_owned());
        true
    }

    /// Replace the roster; returns the members that left.
    pub fn set_roster(&mut self, members: impl IntoIterator<Item = String>) -> Vec<String> {
        let next: BTreeSet<String> = members.into_iter().collect();
        let departed = self.roster.difference(&next).cloned().collect();
        self.roster = next;
        departed
    }

    pub fn mark_affected(&mut self, guid: &str) {
        if !self.affected.contains(guid) {
            self.affected.insert(guid.to_owned());
        }
    }

    pub fn drain_affected(&mut self) -> Vec<String> {
        self.affected.drain().collect()
    }

    pub fn start_encounter(&mut self, encounter_id: u32, name: &str, timestamp_ms: u64) {
        if let Some(open) = self.current_encounter.take() {
            tracing::warn!("Encounter '{}' never ended, replaced by '{}'", open.name, name);
        }
        self.current_encounter = Some(Encounter {
            encounter_id,
            name:     name.to_owned(),
            start_ms: timestamp_ms,
            end_ms:   None,
            outcome:  None,
        });
        tracing::info!("Encounter '{}' ({}) started at {}ms", name, encounter_id, timestamp_ms);
    }

    pub fn end_encounter(&mut self, timestamp_ms: u64, outcome: EncounterOutcome) {
        if let Some(mut encounter) = self.current_encounter.take() {
            encounter.end_ms  = Some(timestamp_ms);
            encounter.outcome = Some(outcome.clone());
            tracing::info!(
                "Encounter '{}' ended: {:?} after {}ms",
                encounter.name, outcome, timestamp_ms.saturating_sub(encounter.start_ms)
            );
            self.encounter_history.push(encounter);
        }
    }

    /// Milliseconds since encounter start. 0 outside an encounter.
    pub fn encounter_elapsed_ms(&self, now_ms: u64) -> u64 {
        self.current_encounter
            .as_ref()
            .map(|e| now_ms.saturating_sub(e.start_ms))
            .unwrap_or(0)
    }

    /// Zone change: forget the party and any open encounter.
    pub fn reset(&mut self, zone_name: Option<String>) {
        self.roster.clear();
        self.affected.clear();
        self.current_encounter = None;
        self.zone_name = zone_name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encounter_lifecycle() {
        let mut state = SessionState::new();
        assert!(!state.in_combat());

        state.start_encounter(2902, "Ulgrax", 1000);
        assert!(state.in_combat());
        assert_eq!(state.encounter_name(), Some("Ulgrax"));
        assert_eq!(state.encounter_elapsed_ms(3000), 2000);

        state.end_encounter(5000, EncounterOutcome::Wipe);
        assert!(!state.in_combat());
        assert_eq!(state.encounter_history.len(), 1);
        assert_eq!(state.encounter_history[0].outcome, Some(EncounterOutcome::Wipe));
        assert_eq!(state.encounter_elapsed_ms(9000), 0);
    }

    #[test]
    fn roster_changes_report_departures() {
        let mut state = SessionState::new();
        assert!(state.add_member("Player-1"));
        assert!(!state.add_member("Player-1"));
        state.add_member("Player-2");

        let departed = state.set_roster(vec!["Player-2".to_owned(), "Player-3".to_owned()]);
        assert_eq!(departed, vec!["Player-1".to_owned()]);
        assert_eq!(state.roster.len(), 2);
    }

    #[test]
    fn affected_set_drains_once() {
        let mut state = SessionState::new();
        state.mark_affected("Player-1");
        state.mark_affected("Player-1");
        state.mark_affected("Player-2");

        let mut drained = state.drain_affected();
        drained.sort();
        assert_eq!(drained, vec!["Player-1", "Player-2"]);
        assert!(state.drain_affected().is_empty());
    }

    #[test]
    fn reset_clears_party_and_encounter() {
        let mut state = SessionState::new();
        state.add_member("Player-1");
        state.mark_affected("Player-1");
        state.start_encounter(1, "Boss", 0);

        state.reset(Some("Dornogal".to_owned()));
        assert!(state.roster.is_empty());
        assert!(state.drain_affected().is_empty());
        assert!(!state.in_combat());
        assert_eq!(state.zone_name.as_deref(), Some("Dornogal"));
    }

    #[test]
    fn only_player_guids_are_party() {
        assert!(is_party_guid("Player-1234-ABCDEF"));
        assert!(!is_party_guid("Creature-0-4372-ABCD-000"));
        assert!(!is_party_guid("Pet-0-1"));
    }
}
