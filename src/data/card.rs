//! Upstream card records: stats, skill, abilities and bonds as produced by the
//! data pipeline. Read-only for the calculator.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::error::DataError;

/// Elemental attribute of a card or enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Anima,
    Divina,
    Phantasma,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Self::Anima, Self::Divina, Self::Phantasma];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anima => "anima",
            Self::Divina => "divina",
            Self::Phantasma => "phantasma",
        }
    }

    /// Case-insensitive lookup used by tag fallback and validation.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "anima" => Some(Self::Anima),
            "divina" => Some(Self::Divina),
            "phantasma" => Some(Self::Phantasma),
            _ => None,
        }
    }

    /// The attribute this one deals bonus damage to.
    pub const fn strong_against(self) -> Attribute {
        match self {
            Self::Anima => Self::Divina,
            Self::Divina => Self::Phantasma,
            Self::Phantasma => Self::Anima,
        }
    }

    /// +1 advantage, -1 disadvantage, 0 neutral.
    pub fn matchup(self, enemy: Attribute) -> i8 {
        if self.strong_against() == enemy {
            1
        } else if enemy.strong_against() == self {
            -1
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Attacker,
    Defender,
    Healer,
    Support,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackType {
    #[default]
    Melee,
    Ranged,
    Magic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondKind {
    #[default]
    None,
    Atk,
    SkillDamage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    #[serde(default)]
    pub id: Option<String>,
    pub kind: BondKind,
    /// Fractional bonus, e.g. 0.05 for +5%.
    pub value: f64,
}

/// A card as shipped by the data pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub attribute: Attribute,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub attack_type: AttackType,
    #[serde(default)]
    pub rarity: u8,
    #[serde(default = "default_min_level")]
    pub min_level: u32,
    pub max_level: u32,
    /// Raw speed stat. Higher means a longer attack interval.
    #[serde(default)]
    pub speed: f64,
    pub base_atk: f64,
    pub max_atk: f64,
    #[serde(default)]
    pub base_hp: f64,
    #[serde(default)]
    pub max_hp: f64,
    /// Fixed-point crit rate (10000 = 100%).
    #[serde(default)]
    pub crit: f64,
    #[serde(default)]
    pub skill: Option<Skill>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    #[serde(default)]
    pub bonds: Vec<Bond>,
    /// Bond granted to the host when this card is equipped as an assist.
    #[serde(default)]
    pub assist_bond: Option<Bond>,
}

fn default_min_level() -> u32 {
    1
}

impl Card {
    /// Magnitude of the first bond of `kind` this card offers, or 0.
    pub fn bond_value(&self, kind: BondKind) -> f64 {
        if kind == BondKind::None {
            return 0.0;
        }
        self.bonds
            .iter()
            .find(|bond| bond.kind == kind)
            .map(|bond| bond.value)
            .unwrap_or(0.0)
    }

    pub fn is_healer(&self) -> bool {
        self.role == Role::Healer
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Skill damage at level 1.
    #[serde(default)]
    pub slv1: f64,
    /// Skill damage gained per level.
    #[serde(default)]
    pub slvup: f64,
    /// Ally buff / enemy debuff applied while the skill is toggled on.
    #[serde(default)]
    pub buff: Option<SkillEffect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unlock_level: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Pure on-skill triggers are handled as skill buffs, not passives.
    #[serde(default)]
    pub on_skill: bool,
    #[serde(default)]
    pub parsed: Option<StructuredAbilityData>,
}

/// Structured target/effect/trigger data attached upstream. Unknown strings are
/// preserved here and skipped when the ability is normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAbilityData {
    pub target: RawTarget,
    #[serde(default)]
    pub effects: Vec<RawEffect>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub stackable: Option<bool>,
    #[serde(default)]
    pub synergy: Vec<String>,
    #[serde(default)]
    pub requires_leader: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTarget {
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub sort_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEffect {
    pub stat: String,
    pub value: f64,
    #[serde(default)]
    pub debuff: bool,
}

/// Who an active skill's buff lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkillTarget {
    #[serde(rename = "self")]
    SelfOnly,
    /// `count` allies by ATK; 5 or more (or the sentinel) means the whole team.
    Allies { count: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEffect {
    pub target: SkillTarget,
    #[serde(default)]
    pub effects: Vec<RawEffect>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CardsFile {
    Wrapped { cards: Vec<Card> },
    Bare(Vec<Card>),
}

/// Parse a card dataset: either a top-level array or `{ "cards": [...] }`.
pub fn parse_cards(raw: &str) -> Result<Vec<Card>, serde_json::Error> {
    let parsed: CardsFile = serde_json::from_str(raw)?;
    Ok(match parsed {
        CardsFile::Wrapped { cards } => cards,
        CardsFile::Bare(cards) => cards,
    })
}

pub fn load_cards(path: impl AsRef<Path>) -> Result<Vec<Card>, DataError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_cards(&raw).map_err(|source| DataError::Json {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_triangle_is_cyclic() {
        for attribute in Attribute::ALL {
            let beaten = attribute.strong_against();
            assert_eq!(attribute.matchup(beaten), 1);
            assert_eq!(beaten.matchup(attribute), -1);
            assert_eq!(attribute.matchup(attribute), 0);
        }
    }

    #[test]
    fn parse_cards_accepts_bare_and_wrapped_lists() {
        let card = r#"{"id":"c1","name":"One","attribute":"divina","max_level":80,"base_atk":300,"max_atk":3000}"#;
        let bare = parse_cards(&format!("[{card}]")).unwrap();
        let wrapped = parse_cards(&format!("{{\"cards\":[{card}]}}")).unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare[0].min_level, 1);
        assert_eq!(bare[0].role, Role::Attacker);
        assert!(bare[0].skill.is_none());
    }

    #[test]
    fn skill_target_deserializes_tagged_forms() {
        let self_target: SkillTarget = serde_json::from_str(r#"{"type":"self"}"#).unwrap();
        assert_eq!(self_target, SkillTarget::SelfOnly);
        let allies: SkillTarget = serde_json::from_str(r#"{"type":"allies","count":3}"#).unwrap();
        assert_eq!(allies, SkillTarget::Allies { count: 3 });
    }

    #[test]
    fn bond_value_ignores_none_kind() {
        let card: Card = serde_json::from_str(
            r#"{"id":"c","name":"C","attribute":"anima","max_level":60,"base_atk":1,"max_atk":2,
                "bonds":[{"kind":"atk","value":0.05},{"kind":"atk","value":0.09}]}"#,
        )
        .unwrap();
        assert_eq!(card.bond_value(BondKind::Atk), 0.05);
        assert_eq!(card.bond_value(BondKind::SkillDamage), 0.0);
        assert_eq!(card.bond_value(BondKind::None), 0.0);
    }
}
