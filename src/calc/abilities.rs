//! Normalizes raw abilities into [ParsedAbility] descriptors and collects the
//! abilities each slot has unlocked.
//!
//! Structured data is mapped string-by-string into typed enums; unknown
//! stats and triggers are skipped (graceful degradation). An ability without
//! structured data falls back to a tag-based target guess and contributes no
//! numeric effect.

use tracing::{debug, warn};

use crate::calc::constants::TEAM_SLOTS;
use crate::calc::stats::Phase1Result;
use crate::data::card::{Ability, Attribute, Card, RawEffect, RawTarget};
use crate::data::team::TeamMemberState;

/// Context-ordering key for `ranked` targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankKey {
    /// Highest bond-adjusted ATK first.
    Atk,
    /// Highest HP first.
    Hp,
    /// Shortest attack interval first, i.e. the lowest speed stat.
    Fastest,
    /// Highest speed stat first.
    Slowest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDescriptor {
    SelfOnly,
    /// Every main-team slot with a card.
    Team,
    /// Main-team slots of one attribute, optionally "N random" of them.
    Attribute {
        attribute: Attribute,
        count: Option<usize>,
    },
    Ranked {
        count: usize,
        key: RankKey,
    },
    Enemy,
    CurrentTarget,
}

impl TargetDescriptor {
    pub fn targets_enemy(&self) -> bool {
        matches!(self, Self::Enemy | Self::CurrentTarget)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityTiming {
    Passive,
    /// Triggers once per wave; magnitude scales with the wave count.
    WaveStart,
    /// Only active on the final wave.
    FinalWave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EffectStat {
    Damage,
    CritRate,
    CritDamage,
    SkillDamage,
    Speed,
    Level,
    Hp,
    NormalAttackDamage,
    Atk,
    Shield,
    Defense,
}

impl EffectStat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "damage" | "damage_pct" | "dmg" => Some(Self::Damage),
            "crit_rate" | "crit" | "crit_chance" => Some(Self::CritRate),
            "crit_damage" | "crit_dmg" => Some(Self::CritDamage),
            "skill_damage" | "skill_dmg" => Some(Self::SkillDamage),
            "speed" | "attack_speed" => Some(Self::Speed),
            "level" => Some(Self::Level),
            "hp" => Some(Self::Hp),
            "normal_attack_damage" | "normal_damage" => Some(Self::NormalAttackDamage),
            "atk" | "attack" => Some(Self::Atk),
            "shield" => Some(Self::Shield),
            "defense" | "def" => Some(Self::Defense),
            _ => None,
        }
    }

    /// Stats that live on the enemy rather than on a team member.
    pub fn is_enemy_stat(self) -> bool {
        matches!(self, Self::Shield | Self::Defense)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedEffect {
    pub stat: EffectStat,
    pub value: f64,
    pub debuff: bool,
}

impl ParsedEffect {
    /// Shield/defense reductions feed the team-wide debuff pool. An
    /// enemy-targeting ability's shield/defense effect is a debuff even when
    /// the flag was not set upstream.
    pub fn is_enemy_debuff(&self, targets_enemy: bool) -> bool {
        self.stat.is_enemy_stat() && (self.debuff || targets_enemy)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAbility {
    pub id: String,
    pub source_card_id: String,
    pub from_assist: bool,
    pub slot: usize,
    pub target: TargetDescriptor,
    pub effects: Vec<ParsedEffect>,
    pub timing: AbilityTiming,
    pub stackable: bool,
    pub synergy: Vec<String>,
    pub requires_leader: bool,
    /// False when built from tags only.
    pub structured: bool,
}

pub fn parse_effect(raw: &RawEffect) -> Option<ParsedEffect> {
    match EffectStat::from_name(&raw.stat) {
        Some(stat) => Some(ParsedEffect {
            stat,
            value: raw.value,
            debuff: raw.debuff,
        }),
        None => {
            debug!(stat = %raw.stat, "skipping effect with unknown stat");
            None
        }
    }
}

pub fn parse_effects(raw: &[RawEffect]) -> Vec<ParsedEffect> {
    raw.iter().filter_map(parse_effect).collect()
}

/// Map a trigger string to a timing class. `None`/empty means passive;
/// unknown triggers return `None` and the ability is dropped.
pub fn parse_timing(trigger: Option<&str>) -> Option<AbilityTiming> {
    match trigger.map(str::trim) {
        None | Some("") | Some("passive") | Some("battle_start") => Some(AbilityTiming::Passive),
        Some("wave_start") | Some("on_wave_start") => Some(AbilityTiming::WaveStart),
        Some("final_wave") | Some("on_final_wave") => Some(AbilityTiming::FinalWave),
        _ => None,
    }
}

fn is_skill_trigger(trigger: Option<&str>) -> bool {
    matches!(trigger.map(str::trim), Some("on_skill") | Some("skill"))
}

fn parse_rank_key(sort_by: Option<&str>) -> RankKey {
    match sort_by.map(str::trim) {
        Some("hp") => RankKey::Hp,
        Some("speed") | Some("fastest") => RankKey::Fastest,
        Some("slowest") => RankKey::Slowest,
        _ => RankKey::Atk,
    }
}

pub fn parse_target(raw: &RawTarget) -> Option<TargetDescriptor> {
    let count = raw.count.map(|count| count as usize);
    match raw.target_type.trim() {
        "self" => Some(TargetDescriptor::SelfOnly),
        "team" | "all_allies" | "allies" => Some(TargetDescriptor::Team),
        "attribute" => {
            let attribute = raw.attribute.as_deref().and_then(Attribute::from_name)?;
            Some(TargetDescriptor::Attribute {
                attribute,
                count: count.filter(|&count| count > 0),
            })
        }
        "ranked" => Some(TargetDescriptor::Ranked {
            count: count.unwrap_or(1),
            key: parse_rank_key(raw.sort_by.as_deref()),
        }),
        "enemy" | "all_enemies" => Some(TargetDescriptor::Enemy),
        "current_target" => Some(TargetDescriptor::CurrentTarget),
        _ => None,
    }
}

/// Coarse target guess from free-form tags. Never yields effects.
pub fn tag_fallback_target(tags: &[String]) -> TargetDescriptor {
    let lowered: Vec<String> = tags.iter().map(|tag| tag.trim().to_lowercase()).collect();
    let has = |needle: &str| lowered.iter().any(|tag| tag == needle);

    if has("enemy") || has("debuff") {
        TargetDescriptor::Enemy
    } else if has("team") || has("all") || has("allies") {
        TargetDescriptor::Team
    } else if let Some(attribute) = lowered.iter().find_map(|tag| Attribute::from_name(tag)) {
        TargetDescriptor::Attribute {
            attribute,
            count: None,
        }
    } else {
        TargetDescriptor::SelfOnly
    }
}

fn fallback_ability(ability: &Ability, source: &Card, slot: usize, from_assist: bool) -> ParsedAbility {
    warn!(
        ability = %ability.id,
        card = %source.id,
        "ability has no structured data; using tag-based targeting with no effect"
    );
    ParsedAbility {
        id: ability.id.clone(),
        source_card_id: source.id.clone(),
        from_assist,
        slot,
        target: tag_fallback_target(&ability.tags),
        effects: Vec::new(),
        timing: AbilityTiming::Passive,
        stackable: true,
        synergy: Vec::new(),
        requires_leader: false,
        structured: false,
    }
}

pub fn parse_ability(ability: &Ability, source: &Card, slot: usize, from_assist: bool) -> ParsedAbility {
    let Some(parsed) = ability.parsed.as_ref() else {
        return fallback_ability(ability, source, slot, from_assist);
    };
    let Some(target) = parse_target(&parsed.target) else {
        debug!(ability = %ability.id, target = %parsed.target.target_type, "unrecognized target");
        return fallback_ability(ability, source, slot, from_assist);
    };

    let (timing, effects) = match parse_timing(parsed.trigger.as_deref()) {
        Some(timing) => (timing, parse_effects(&parsed.effects)),
        None => {
            debug!(
                ability = %ability.id,
                trigger = ?parsed.trigger,
                "unsupported trigger; ability contributes nothing"
            );
            (AbilityTiming::Passive, Vec::new())
        }
    };

    ParsedAbility {
        id: ability.id.clone(),
        source_card_id: source.id.clone(),
        from_assist,
        slot,
        target,
        effects,
        timing,
        stackable: parsed.stackable.unwrap_or(true),
        synergy: parsed.synergy.clone(),
        requires_leader: parsed.requires_leader,
        structured: true,
    }
}

/// Pure on-skill triggers are applied as skill buffs, never as passives.
pub fn is_on_skill_ability(ability: &Ability) -> bool {
    ability.on_skill
        || ability
            .parsed
            .as_ref()
            .is_some_and(|parsed| is_skill_trigger(parsed.trigger.as_deref()))
}

/// Every unlocked ability across all seven slots, in slot order: card
/// abilities first (unlock level <= effective level), then assist abilities
/// (always unlocked).
pub fn collect_abilities(
    members: &[TeamMemberState; TEAM_SLOTS],
    phase1: &[Phase1Result; TEAM_SLOTS],
) -> Vec<ParsedAbility> {
    let mut collected = Vec::new();
    for (slot, member) in members.iter().enumerate() {
        let Some(card) = member.card.as_ref() else {
            continue;
        };
        let level = phase1[slot].effective_level;
        collected.extend(
            card.abilities
                .iter()
                .filter(|ability| ability.unlock_level <= level && !is_on_skill_ability(ability))
                .map(|ability| parse_ability(ability, card, slot, false)),
        );
        if let Some(assist) = member.assist.as_ref() {
            collected.extend(
                assist
                    .abilities
                    .iter()
                    .filter(|ability| !is_on_skill_ability(ability))
                    .map(|ability| parse_ability(ability, assist, slot, true)),
            );
        }
    }
    collected
}
