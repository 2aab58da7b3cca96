/// Cooldown catalog, embedded at compile time from `data/cooldowns/*.toml`.
///
/// Each healer profile names its throughput and defensive cooldowns and the
/// role each one plays. The planner only ever sees names and roles: it answers
/// "how urgent is *Tranquility* right now", never "cast Tranquility".
///
/// Users can add or re-role cooldowns via `[[planner.cooldowns]]` in the
/// config; those entries are merged over the embedded set.
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Embedded TOML data
// ---------------------------------------------------------------------------

const DRUID_RESTORATION:  &str = include_str!("../data/cooldowns/druid_restoration.toml");
const PALADIN_HOLY:       &str = include_str!("../data/cooldowns/paladin_holy.toml");
const PRIEST_DISCIPLINE:  &str = include_str!("../data/cooldowns/priest_discipline.toml");
const PRIEST_HOLY:        &str = include_str!("../data/cooldowns/priest_holy.toml");
const SHAMAN_RESTORATION: &str = include_str!("../data/cooldowns/shaman_restoration.toml");

static ALL_PROFILE_DATA: &[&str] = &[
    DRUID_RESTORATION,
    PALADIN_HOLY,
    PRIEST_DISCIPLINE,
    PRIEST_HOLY,
    SHAMAN_RESTORATION,
];

static PROFILES: Lazy<Vec<CooldownProfile>> = Lazy::new(parse_all);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownRole {
    /// Single-target saves used when someone is about to die.
    Emergency,
    /// Party-wide damage reduction for predicted spikes.
    MajorDefensive,
    /// Smaller mitigation used proactively under rising damage.
    MinorDefensive,
    /// Throughput cooldowns for recovering party HP.
    HealingBurst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub name: String,
    pub role: CooldownRole,
}

#[derive(Debug, Clone)]
pub struct CooldownProfile {
    pub class:       String,
    pub spec_name:   String,
    pub description: String,
    pub cooldowns:   Vec<CooldownEntry>,
}

impl CooldownProfile {
    /// Canonical "CLASS/Spec" key used for config storage and display.
    pub fn key(&self) -> String {
        format!("{}/{}", self.class, self.spec_name)
    }
}

// ---------------------------------------------------------------------------
// TOML deserialization structs (private)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TomlFile {
    profile: TomlProfile,
}

#[derive(Deserialize)]
struct TomlProfile {
    class:       String,
    spec:        String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    cooldowns:   Vec<CooldownEntry>,
}

fn parse_all() -> Vec<CooldownProfile> {
    ALL_PROFILE_DATA
        .iter()
        .filter_map(|toml_str| {
            let file: TomlFile = toml::from_str(toml_str)
                .map_err(|e| tracing::warn!("Failed to parse cooldown profile TOML: {}", e))
                .ok()?;
            Some(CooldownProfile {
                class:       file.profile.class,
                spec_name:   file.profile.spec,
                description: file.profile.description,
                cooldowns:   file.profile.cooldowns,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Profile lookup
// ---------------------------------------------------------------------------

pub fn list_all() -> &'static [CooldownProfile] {
    &PROFILES
}

/// Load a profile by class and spec name (case-insensitive).
pub fn load_profile(class: &str, spec_name: &str) -> Option<&'static CooldownProfile> {
    PROFILES.iter().find(|p| {
        p.class.eq_ignore_ascii_case(class) && p.spec_name.eq_ignore_ascii_case(spec_name)
    })
}

/// Load a profile by its canonical "CLASS/Spec" key.
pub fn load_by_key(key: &str) -> Option<&'static CooldownProfile> {
    let (class, spec) = key.split_once('/')?;
    load_profile(class, spec)
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Name -> role lookup used by the planner. Names match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct CooldownCatalog {
    by_name: HashMap<String, CooldownEntry>,
}

impl CooldownCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every cooldown from every embedded profile.
    pub fn embedded() -> Self {
        let mut catalog = Self::new();
        for profile in list_all() {
            catalog.extend(profile.cooldowns.iter().cloned());
        }
        catalog
    }

    /// Cooldowns of a single profile, or every embedded profile when the key
    /// is empty or unknown.
    pub fn for_profile(key: &str) -> Self {
        if key.is_empty() {
            return Self::embedded();
        }
        match load_by_key(key) {
            Some(profile) => {
                let mut catalog = Self::new();
                catalog.extend(profile.cooldowns.iter().cloned());
                catalog
            }
            None => {
                tracing::warn!("Unknown cooldown profile '{}', using all embedded profiles", key);
                Self::embedded()
            }
        }
    }

    /// Insert or replace entries (later entries win).
    pub fn extend(&mut self, entries: impl IntoIterator<Item = CooldownEntry>) {
        for entry in entries {
            self.by_name.insert(entry.name.to_lowercase(), entry);
        }
    }

    pub fn role(&self, name: &str) -> Option<CooldownRole> {
        self.by_name.get(&name.to_lowercase()).map(|e| e.role)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CooldownEntry> {
        self.by_name.values()
    }
}
