/// Advisor configuration, persisted as TOML.
///
/// Every threshold the analytics core uses lives here so the decision surface
/// can be tuned without touching code. All sections and fields default, so a
/// partial file (or no file at all) is valid:
///
/// ```toml
/// intensity = 4
///
/// [hp]
/// crit_variance_reduction = true
///
/// [[planner.cooldowns]]
/// name = "Spirit Link Totem"
/// role = "major_defensive"
/// ```
use crate::catalog::CooldownEntry;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "advisor.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// FIFO cap of samples kept per entity.
    pub max_entries_per_entity: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self { max_entries_per_entity: 100 }
    }
}

/// Trend classification, spike detection and high-damage phase tuning.
/// Rates are amount per second, durations are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Relative increase at or above which a trend is `Spiking`.
    pub spike_threshold:          f64,
    /// Relative change at or beyond which a trend is `Increasing`/`Decreasing`.
    pub increase_threshold:       f64,
    /// Rates below this are treated as "no damage" by the classifier.
    pub min_rate:                 f64,
    pub spike_cooldown_secs:      f64,
    pub spike_retention_secs:     f64,
    pub auto_spike_short_window:  f64,
    pub auto_spike_medium_window: f64,
    /// Short-window rate must exceed this multiple of the medium-window rate.
    pub auto_spike_ratio:         f64,
    pub auto_spike_min_rate:      f64,
    /// Party damage rate that opens a high-damage phase.
    pub high_damage_threshold:    f64,
    pub phase_window_secs:        f64,
    pub imminent_window_secs:     f64,
    pub imminent_sustain_secs:    f64,
    pub imminent_low_hp:          f64,
    pub imminent_horizon_secs:    f64,
    pub forecast_min_confidence:  f64,
    /// Party damage rate considered extreme regardless of trend.
    pub very_high_rate:           f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            spike_threshold:          0.5,
            increase_threshold:       0.15,
            min_rate:                 1.0,
            spike_cooldown_secs:      2.0,
            spike_retention_secs:     60.0,
            auto_spike_short_window:  1.0,
            auto_spike_medium_window: 5.0,
            auto_spike_ratio:         2.0,
            auto_spike_min_rate:      1.0,
            high_damage_threshold:    5_000.0,
            phase_window_secs:        3.0,
            imminent_window_secs:     3.0,
            imminent_sustain_secs:    1.5,
            imminent_low_hp:          0.5,
            imminent_horizon_secs:    2.0,
            forecast_min_confidence:  0.6,
            very_high_rate:           10_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HpConfig {
    pub pending_heal_timeout_secs: f64,
    pub crit_variance_reduction:   bool,
    /// Fraction shaved off pending heals when `crit_variance_reduction` is on.
    pub crit_variance_factor:      f64,
}

impl Default for HpConfig {
    fn default() -> Self {
        Self {
            pending_heal_timeout_secs: 3.0,
            crit_variance_reduction:   false,
            crit_variance_factor:      0.08,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub trend_window_secs:     f64,
    pub major_avg_hp:          f64,
    pub emergency_lowest_hp:   f64,
    pub emergency_avg_hp:      f64,
    pub proactive_damage_rate: f64,
    pub conserve_avg_hp:       f64,
    pub conserve_lowest_hp:    f64,
    pub healing_burst_urgency: f64,
    /// Lowest HP under which emergency-class cooldowns rank `High`.
    pub save_lowest_hp:        f64,
    /// Critical members that on their own force major-defensive/emergency.
    pub critical_members:      u32,
    pub party_size:            u32,
    /// Extra named cooldowns, merged over the embedded catalog.
    pub cooldowns:             Vec<CooldownEntry>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            trend_window_secs:     5.0,
            major_avg_hp:          0.40,
            emergency_lowest_hp:   0.30,
            emergency_avg_hp:      0.50,
            proactive_damage_rate: 3_000.0,
            conserve_avg_hp:       0.85,
            conserve_lowest_hp:    0.70,
            healing_burst_urgency: 0.6,
            save_lowest_hp:        0.5,
            critical_members:      2,
            party_size:            8,
            cooldowns:             Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyConfig {
    pub injured_below:  f64,
    pub critical_below: f64,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self { injured_below: 0.90, critical_below: 0.30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Max HP assumed for a party member the first time it is seen.
    pub default_max_hp:   u64,
    /// Cooldown profile key ("CLASS/Spec"); empty = every embedded profile.
    pub profile:          String,
    /// How often the engine re-evaluates without new events.
    pub tick_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_max_hp:   100_000,
            profile:          String::new(),
            tick_interval_ms: 250,
        }
    }
}

// ---------------------------------------------------------------------------
// AdvisorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Combat log file to read (CLI `--log` overrides).
    pub log_path:  PathBuf,
    /// Advice intensity 1 (quiet) to 5 (aggressive)
    pub intensity: u8,
    pub intake:    IntakeConfig,
    pub trend:     TrendConfig,
    pub hp:        HpConfig,
    pub planner:   PlannerConfig,
    pub party:     PartyConfig,
    pub session:   SessionConfig,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            log_path:  PathBuf::new(),
            intensity: 3,
            intake:    IntakeConfig::default(),
            trend:     TrendConfig::default(),
            hp:        HpConfig::default(),
            planner:   PlannerConfig::default(),
            party:     PartyConfig::default(),
            session:   SessionConfig::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min:   f64,
        max:   f64,
    },
    #[error("trend.spike_threshold ({spike}) must be greater than trend.increase_threshold ({increase})")]
    ThresholdOrder { spike: f64, increase: f64 },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, min, max })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Zero(field))
    }
}

impl AdvisorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("intensity", self.intensity as f64, 1.0, 5.0)?;

        if self.intake.max_entries_per_entity == 0 {
            return Err(ConfigError::Zero("intake.max_entries_per_entity"));
        }

        let t = &self.trend;
        check_positive("trend.increase_threshold", t.increase_threshold)?;
        if t.spike_threshold <= t.increase_threshold {
            return Err(ConfigError::ThresholdOrder {
                spike:    t.spike_threshold,
                increase: t.increase_threshold,
            });
        }
        check_positive("trend.min_rate", t.min_rate)?;
        check_range("trend.spike_cooldown_secs", t.spike_cooldown_secs, 0.0, 60.0)?;
        check_positive("trend.spike_retention_secs", t.spike_retention_secs)?;
        check_positive("trend.auto_spike_short_window", t.auto_spike_short_window)?;
        check_positive("trend.auto_spike_medium_window", t.auto_spike_medium_window)?;
        check_positive("trend.auto_spike_ratio", t.auto_spike_ratio)?;
        check_positive("trend.high_damage_threshold", t.high_damage_threshold)?;
        check_positive("trend.phase_window_secs", t.phase_window_secs)?;
        check_positive("trend.imminent_window_secs", t.imminent_window_secs)?;
        check_range("trend.imminent_low_hp", t.imminent_low_hp, 0.0, 1.0)?;
        check_range("trend.forecast_min_confidence", t.forecast_min_confidence, 0.0, 1.0)?;

        check_positive("hp.pending_heal_timeout_secs", self.hp.pending_heal_timeout_secs)?;
        check_range("hp.crit_variance_factor", self.hp.crit_variance_factor, 0.0, 1.0)?;

        let p = &self.planner;
        check_positive("planner.trend_window_secs", p.trend_window_secs)?;
        check_range("planner.major_avg_hp", p.major_avg_hp, 0.0, 1.0)?;
        check_range("planner.emergency_lowest_hp", p.emergency_lowest_hp, 0.0, 1.0)?;
        check_range("planner.emergency_avg_hp", p.emergency_avg_hp, 0.0, 1.0)?;
        check_range("planner.conserve_avg_hp", p.conserve_avg_hp, 0.0, 1.0)?;
        check_range("planner.conserve_lowest_hp", p.conserve_lowest_hp, 0.0, 1.0)?;
        check_range("planner.healing_burst_urgency", p.healing_burst_urgency, 0.0, 1.0)?;
        check_range("planner.save_lowest_hp", p.save_lowest_hp, 0.0, 1.0)?;
        if p.critical_members == 0 {
            return Err(ConfigError::Zero("planner.critical_members"));
        }
        if p.party_size == 0 {
            return Err(ConfigError::Zero("planner.party_size"));
        }

        check_range("party.injured_below", self.party.injured_below, 0.0, 1.0)?;
        check_range("party.critical_below", self.party.critical_below, 0.0, 1.0)?;

        if self.session.default_max_hp == 0 {
            return Err(ConfigError::Zero("session.default_max_hp"));
        }
        if self.session.tick_interval_ms == 0 {
            return Err(ConfigError::Zero("session.tick_interval_ms"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load and validate a config file at an explicit path.
pub fn load(path: &Path) -> Result<AdvisorConfig> {
    let raw = std::fs::read_to_string(path)?;
    let cfg: AdvisorConfig = toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Config parse error in {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load `advisor.toml` from `config_dir`, or defaults when it does not exist.
pub fn load_or_default(config_dir: &Path) -> Result<AdvisorConfig> {
    let path = config_dir.join(CONFIG_FILE);
    if path.exists() {
        load(&path)
    } else {
        tracing::info!("No {} in {:?}, using defaults", CONFIG_FILE, config_dir);
        Ok(AdvisorConfig::default())
    }
}

pub fn save(config: &AdvisorConfig, config_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(config_dir)?;
    let raw = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("Config serialize error: {}", e))?;
    std::fs::write(config_dir.join(CONFIG_FILE), raw)?;
    Ok(())
}
