//! Phase 3: applies unlocked abilities and active-skill buffs.
//!
//! Per-calculation bookkeeping (non-stackable abilities already applied,
//! debuffs already pooled) lives in an [ApplicationLedger] owned by the
//! [Phase3Result], so nothing leaks between calls.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::calc::abilities::{
    collect_abilities, parse_effects, AbilityTiming, EffectStat, ParsedAbility, ParsedEffect,
};
use crate::calc::constants::{
    ALL_ALLIES_SENTINEL, AOE_TARGET_THRESHOLD, LEADER_SLOT, MAIN_SLOTS, TEAM_SLOTS,
};
use crate::calc::context::TeamContext;
use crate::calc::stacking::{ContributionSource, StackContribution, StatStacking};
use crate::calc::stats::Phase1Result;
use crate::calc::targeting::{resolve_ability_targets, ManualTargets, RandomTargetMode};
use crate::data::card::SkillTarget;
use crate::data::team::{EnemyState, TeamMemberState};

/// Per-member stats abilities and skills can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusStat {
    Level,
    Atk,
    Hp,
    CritRate,
    CritDamage,
    Damage,
    SkillDamage,
    NormalAttackDamage,
    Speed,
}

impl BonusStat {
    fn from_effect(stat: EffectStat) -> Option<Self> {
        match stat {
            EffectStat::Level => Some(Self::Level),
            EffectStat::Atk => Some(Self::Atk),
            EffectStat::Hp => Some(Self::Hp),
            EffectStat::CritRate => Some(Self::CritRate),
            EffectStat::CritDamage => Some(Self::CritDamage),
            EffectStat::Damage => Some(Self::Damage),
            EffectStat::SkillDamage => Some(Self::SkillDamage),
            EffectStat::NormalAttackDamage => Some(Self::NormalAttackDamage),
            EffectStat::Speed => Some(Self::Speed),
            EffectStat::Shield | EffectStat::Defense => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebuffStat {
    Shield,
    Defense,
}

/// Team-wide enemy debuffs. One bucket for the whole team, not per target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebuffPool {
    pub totals: StatStacking<DebuffStat>,
}

impl DebuffPool {
    pub fn shield(&self) -> f64 {
        self.totals.total_for(&DebuffStat::Shield)
    }

    pub fn defense(&self) -> f64 {
        self.totals.total_for(&DebuffStat::Defense)
    }

    fn add(&mut self, effect: &ParsedEffect, source: ContributionSource, value: f64) {
        let stat = match effect.stat {
            EffectStat::Shield => DebuffStat::Shield,
            EffectStat::Defense => DebuffStat::Defense,
            _ => return,
        };
        self.totals.add(StackContribution::new(stat, source, value));
    }
}

/// Explicit per-calculation dedup state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationLedger {
    non_stackable_seen: BTreeSet<String>,
    debuffs_applied: BTreeSet<String>,
}

impl ApplicationLedger {
    /// True the first time a non-stackable ability id is claimed.
    pub fn claim_non_stackable(&mut self, ability_id: &str) -> bool {
        self.non_stackable_seen.insert(ability_id.to_string())
    }

    /// True the first time a debuff key is claimed.
    pub fn claim_debuff(&mut self, key: &str) -> bool {
        self.debuffs_applied.insert(key.to_string())
    }

    pub fn non_stackable_applied(&self) -> impl Iterator<Item = &String> {
        self.non_stackable_seen.iter()
    }

    pub fn debuffs_applied(&self) -> impl Iterator<Item = &String> {
        self.debuffs_applied.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplicationOutcome {
    Applied {
        targets: Vec<usize>,
        scale: f64,
        wave_multiplier: f64,
        debuff_applied: bool,
    },
    MissingSynergy,
    NotLeader,
    NotFinalWave,
    DuplicateNonStackable,
}

/// Trace of what each collected ability (or active skill) did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbilityApplication {
    pub ability_id: String,
    pub source_card_id: String,
    pub slot: usize,
    pub from_assist: bool,
    pub from_skill: bool,
    pub structured: bool,
    pub outcome: ApplicationOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Phase3Result {
    pub bonuses: [StatStacking<BonusStat>; TEAM_SLOTS],
    pub debuffs: DebuffPool,
    pub ledger: ApplicationLedger,
    pub applications: Vec<AbilityApplication>,
}

impl Phase3Result {
    pub fn bonus(&self, slot: usize, stat: BonusStat) -> f64 {
        self.bonuses
            .get(slot)
            .map(|bonuses| bonuses.total_for(&stat))
            .unwrap_or(0.0)
    }
}

/// Gating and timing checks that run before any bookkeeping is claimed.
fn gate(ability: &ParsedAbility, context: &TeamContext, enemy: &EnemyState) -> Option<ApplicationOutcome> {
    if !ability.synergy.is_empty() && !context.any_present(&ability.synergy) {
        return Some(ApplicationOutcome::MissingSynergy);
    }
    // The owning card itself must be the leader; an assist on slot 0 is not.
    if ability.requires_leader && (ability.slot != LEADER_SLOT || ability.from_assist) {
        return Some(ApplicationOutcome::NotLeader);
    }
    if ability.timing == AbilityTiming::FinalWave && !enemy.final_wave {
        return Some(ApplicationOutcome::NotFinalWave);
    }
    None
}

fn wave_multiplier(timing: AbilityTiming, enemy: &EnemyState) -> f64 {
    match timing {
        AbilityTiming::WaveStart => f64::from(enemy.wave_count.max(1)),
        AbilityTiming::Passive | AbilityTiming::FinalWave => 1.0,
    }
}

fn apply_ability(
    ability: &ParsedAbility,
    context: &TeamContext,
    enemy: &EnemyState,
    mode: RandomTargetMode,
    manual: &ManualTargets,
    result: &mut Phase3Result,
) -> ApplicationOutcome {
    if let Some(skipped) = gate(ability, context, enemy) {
        return skipped;
    }
    if !ability.stackable && !result.ledger.claim_non_stackable(&ability.id) {
        return ApplicationOutcome::DuplicateNonStackable;
    }

    let multiplier = wave_multiplier(ability.timing, enemy);
    let resolution = resolve_ability_targets(ability, context, mode, manual);
    let targets_enemy = ability.target.targets_enemy();
    let source = if ability.from_assist {
        ContributionSource::Assist
    } else {
        ContributionSource::Ability
    };

    let (debuffs, buffs): (Vec<&ParsedEffect>, Vec<&ParsedEffect>) = ability
        .effects
        .iter()
        .partition(|effect| effect.is_enemy_debuff(targets_enemy));

    if !targets_enemy {
        for effect in buffs {
            let Some(stat) = BonusStat::from_effect(effect.stat) else {
                debug!(ability = %ability.id, stat = ?effect.stat, "enemy stat without debuff flag ignored");
                continue;
            };
            let value = effect.value * multiplier * resolution.scale;
            for &slot in &resolution.slots {
                result.bonuses[slot].add(StackContribution::new(stat, source, value));
            }
        }
    }

    let debuff_applied = !debuffs.is_empty() && result.ledger.claim_debuff(&ability.id);
    if debuff_applied {
        for effect in debuffs {
            result.debuffs.add(effect, source, effect.value * multiplier);
        }
    }

    ApplicationOutcome::Applied {
        targets: resolution.slots,
        scale: resolution.scale,
        wave_multiplier: multiplier,
        debuff_applied,
    }
}

/// Slots an active skill buffs: self, top-N allies by ATK, or the whole team.
pub fn skill_targets(target: SkillTarget, caster: usize, context: &TeamContext) -> Vec<usize> {
    match target {
        SkillTarget::SelfOnly => vec![caster],
        SkillTarget::Allies { count } if count >= AOE_TARGET_THRESHOLD || count == ALL_ALLIES_SENTINEL => {
            context.main_slots()
        }
        SkillTarget::Allies { count } => {
            let mut slots: Vec<usize> = context
                .by_atk
                .iter()
                .copied()
                .filter(|&slot| slot < MAIN_SLOTS)
                .take(count as usize)
                .collect();
            slots.sort_unstable();
            slots
        }
    }
}

/// Fold in buffs from main-team members whose active skill is toggled on.
pub fn apply_skill_buffs(
    members: &[TeamMemberState; TEAM_SLOTS],
    context: &TeamContext,
    result: &mut Phase3Result,
) {
    for (slot, member) in members.iter().enumerate().take(MAIN_SLOTS) {
        let (Some(card), Some(effect)) = (member.card.as_ref(), member.skill_effect.as_ref()) else {
            continue;
        };
        if !member.skill_active {
            continue;
        }

        let targets = skill_targets(effect.target, slot, context);
        let effects = parse_effects(&effect.effects);
        let skill_id = card
            .skill
            .as_ref()
            .map(|skill| skill.id.clone())
            .unwrap_or_else(|| format!("{}:skill", card.id));

        let mut debuff_applied = false;
        let debuff_key = format!("skill:{slot}:{skill_id}");
        for parsed in &effects {
            if parsed.is_enemy_debuff(false) {
                if debuff_applied || result.ledger.claim_debuff(&debuff_key) {
                    debuff_applied = true;
                    result.debuffs.add(parsed, ContributionSource::Skill, parsed.value);
                }
                continue;
            }
            let Some(stat) = BonusStat::from_effect(parsed.stat) else {
                continue;
            };
            for &target in &targets {
                result.bonuses[target].add(StackContribution::new(
                    stat,
                    ContributionSource::Skill,
                    parsed.value,
                ));
            }
        }

        result.applications.push(AbilityApplication {
            ability_id: skill_id,
            source_card_id: card.id.clone(),
            slot,
            from_assist: false,
            from_skill: true,
            structured: true,
            outcome: ApplicationOutcome::Applied {
                targets,
                scale: 1.0,
                wave_multiplier: 1.0,
                debuff_applied,
            },
        });
    }
}

/// Run Phase 3 over every unlocked ability, then active skills.
pub fn apply_abilities(
    members: &[TeamMemberState; TEAM_SLOTS],
    phase1: &[Phase1Result; TEAM_SLOTS],
    context: &TeamContext,
    enemy: &EnemyState,
    mode: RandomTargetMode,
    manual: &ManualTargets,
) -> Phase3Result {
    let mut result = Phase3Result::default();

    for ability in collect_abilities(members, phase1) {
        let outcome = apply_ability(&ability, context, enemy, mode, manual, &mut result);
        debug!(ability = %ability.id, slot = ability.slot, ?outcome, "ability resolved");
        result.applications.push(AbilityApplication {
            ability_id: ability.id,
            source_card_id: ability.source_card_id,
            slot: ability.slot,
            from_assist: ability.from_assist,
            from_skill: false,
            structured: ability.structured,
            outcome,
        });
    }

    apply_skill_buffs(members, context, &mut result);
    result
}
