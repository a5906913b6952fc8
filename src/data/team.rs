//! Team and enemy inputs, plus the scenario file format the CLI and server use
//! to describe a team by card id.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calc::constants::TEAM_SLOTS;
use crate::calc::RandomTargetMode;
use crate::data::card::{Attribute, BondKind, Card, SkillEffect};
use crate::data::error::DataError;

/// Bond choices for a slot. Which form applies depends on the build mode the
/// UI is in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondBuild {
    /// Up to three bond-slot selections.
    Slots(Vec<BondKind>),
    Single(BondKind),
}

impl Default for BondBuild {
    fn default() -> Self {
        Self::Slots(Vec::new())
    }
}

impl BondBuild {
    /// Selected kinds, truncated to the three available slots.
    pub fn selections(&self) -> Vec<BondKind> {
        match self {
            Self::Slots(kinds) => kinds.iter().take(3).copied().collect(),
            Self::Single(kind) => vec![*kind],
        }
    }
}

/// One of the seven ordered team slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamMemberState {
    pub card: Option<Card>,
    pub assist: Option<Card>,
    pub limit_break: u8,
    pub level_bonus: u32,
    pub bonds: BondBuild,
    pub skill_active: bool,
    pub skill_effect: Option<SkillEffect>,
}

impl TeamMemberState {
    pub fn with_card(card: Card) -> Self {
        Self {
            card: Some(card),
            ..Self::default()
        }
    }

    pub fn has_card(&self) -> bool {
        self.card.is_some()
    }
}

/// Attacker-facing enemy profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyState {
    /// Damage reduction (positive) or amplification (negative), as a fraction.
    pub shield: f64,
    pub defense: f64,
    /// `None` disables the attribute matchup.
    pub attribute: Option<Attribute>,
    pub wave_count: u32,
    pub final_wave: bool,
    pub world_boss_multiplier: Option<f64>,
    pub bypass_shield_cap: bool,
}

impl Default for EnemyState {
    fn default() -> Self {
        Self {
            shield: 0.0,
            defense: 0.0,
            attribute: None,
            wave_count: 1,
            final_wave: false,
            world_boss_multiplier: None,
            bypass_shield_cap: false,
        }
    }
}

/// A slot as written in a scenario file: cards are referenced by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberSpec {
    pub card: Option<String>,
    pub assist: Option<String>,
    pub limit_break: u8,
    pub level_bonus: u32,
    pub bonds: BondBuild,
    pub skill_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub members: Vec<MemberSpec>,
    #[serde(default)]
    pub enemy: EnemyState,
    #[serde(default)]
    pub random_target_mode: RandomTargetMode,
    #[serde(default)]
    pub manual_targets: BTreeMap<String, Vec<usize>>,
}

pub fn index_cards_by_id(cards: &[Card]) -> HashMap<&str, &Card> {
    cards.iter().map(|card| (card.id.as_str(), card)).collect()
}

/// Resolve a scenario's member specs into the seven slot states. Missing
/// trailing slots are empty; an active skill picks up its card's buff.
pub fn build_members(
    specs: &[MemberSpec],
    cards: &[Card],
) -> Result<[TeamMemberState; TEAM_SLOTS], DataError> {
    if specs.len() > TEAM_SLOTS {
        return Err(DataError::TooManyMembers(specs.len()));
    }
    let index = index_cards_by_id(cards);
    let lookup = |id: &Option<String>| -> Result<Option<Card>, DataError> {
        match id.as_deref() {
            None => Ok(None),
            Some(id) => index
                .get(id)
                .map(|card| Some((*card).clone()))
                .ok_or_else(|| DataError::UnknownCard(id.to_string())),
        }
    };

    let mut members: [TeamMemberState; TEAM_SLOTS] = Default::default();
    for (slot, spec) in specs.iter().enumerate() {
        let card = lookup(&spec.card)?;
        let assist = lookup(&spec.assist)?;
        let skill_effect = if spec.skill_active {
            card.as_ref()
                .and_then(|card| card.skill.as_ref())
                .and_then(|skill| skill.buff.clone())
        } else {
            None
        };
        members[slot] = TeamMemberState {
            card,
            assist,
            limit_break: spec.limit_break,
            level_bonus: spec.level_bonus,
            bonds: spec.bonds.clone(),
            skill_active: spec.skill_active,
            skill_effect,
        };
    }
    Ok(members)
}

pub fn parse_scenario(raw: &str) -> Result<Scenario, serde_json::Error> {
    serde_json::from_str(raw)
}

pub fn load_scenario(path: impl AsRef<Path>) -> Result<Scenario, DataError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_scenario(&raw).map_err(|source| DataError::Json {
        path: path.display().to_string(),
        source,
    })
}
