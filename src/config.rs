//! Calculator configuration: every formula constant, overridable from YAML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calc::constants::*;
use crate::data::error::DataError;

pub const DEFAULT_CONFIG_PATH: &str = "data/teamcalc.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExceedRange {
    pub min: f64,
    pub max: f64,
}

impl ExceedRange {
    pub fn average(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalcConfig {
    pub levels_per_limit_break: u32,
    pub crit_scale: f64,
    pub atk_scale: f64,
    pub base_crit_multiplier: f64,
    /// Indexed by limit-break tier; tiers past the end use the last entry.
    pub exceed: Vec<ExceedRange>,
    pub interval_slope: f64,
    pub interval_intercept: f64,
    pub min_attack_interval: f64,
    pub shield_cap: f64,
    pub defense_cap: f64,
    pub normal_damage_cap: f64,
    pub skill_damage_cap: f64,
    pub race_leader_bonus: f64,
    pub race_member_bonus: f64,
    pub race_bonus_cap: f64,
    pub healers_deal_damage: bool,
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            levels_per_limit_break: LEVELS_PER_LIMIT_BREAK,
            crit_scale: CRIT_SCALE,
            atk_scale: ATK_SCALE,
            base_crit_multiplier: BASE_CRIT_MULTIPLIER,
            exceed: EXCEED_RANGES
                .iter()
                .map(|&(min, max)| ExceedRange { min, max })
                .collect(),
            interval_slope: INTERVAL_SLOPE,
            interval_intercept: INTERVAL_INTERCEPT,
            min_attack_interval: MIN_ATTACK_INTERVAL,
            shield_cap: SHIELD_CAP,
            defense_cap: DEFENSE_CAP,
            normal_damage_cap: NORMAL_DAMAGE_CAP,
            skill_damage_cap: SKILL_DAMAGE_CAP,
            race_leader_bonus: RACE_LEADER_BONUS,
            race_member_bonus: RACE_MEMBER_BONUS,
            race_bonus_cap: RACE_BONUS_CAP,
            healers_deal_damage: true,
        }
    }
}

impl CalcConfig {
    pub fn exceed_for(&self, limit_break: u8) -> ExceedRange {
        self.exceed
            .get(limit_break as usize)
            .or_else(|| self.exceed.last())
            .copied()
            .unwrap_or(ExceedRange { min: 1.0, max: 1.0 })
    }
}

/// Load config from YAML. Missing keys fall back to the built-in defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<CalcConfig, DataError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| DataError::Yaml {
        path: path.display().to_string(),
        source,
    })
}

/// Like [load_config] but returns the defaults when the file does not exist.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<CalcConfig, DataError> {
    if !path.as_ref().exists() {
        return Ok(CalcConfig::default());
    }
    load_config(path)
}
