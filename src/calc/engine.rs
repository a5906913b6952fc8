//! Runs the four phases for one team and assembles the result.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::calc::buffs::{apply_abilities, AbilityApplication, BonusStat};
use crate::calc::constants::TEAM_SLOTS;
use crate::calc::context::build_team_context;
use crate::calc::damage::{
    effective_enemy_stats, race_bonus, resolve_member_damage, DamageResult, MemberStats,
};
use crate::calc::stacking::SourceTotals;
use crate::calc::stats::resolve_base_stats;
use crate::calc::targeting::{ManualTargets, RandomTargetMode};
use crate::config::CalcConfig;
use crate::data::card::Card;
use crate::data::error::DataError;
use crate::data::team::{build_members, EnemyState, Scenario, TeamMemberState};

#[derive(Debug, Clone, Default)]
pub struct CalcOptions {
    pub manual_targets: ManualTargets,
    pub random_target_mode: RandomTargetMode,
    pub config: CalcConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberResult {
    pub slot: usize,
    pub card_id: Option<String>,
    pub assist_id: Option<String>,
    pub stats: MemberStats,
    pub breakdown: BTreeMap<BonusStat, SourceTotals>,
    /// Only main-team slots with a card deal damage.
    pub damage: Option<DamageResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TeamTotals {
    pub total_dps: f64,
    pub total_skill_damage: f64,
    /// Pooled shield debuff before the enemy cap.
    pub net_shield_debuff: f64,
    pub net_defense_debuff: f64,
    pub effective_shield: f64,
    pub effective_defense: f64,
    pub race_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamCalculationResult {
    pub members: Vec<MemberResult>,
    pub totals: TeamTotals,
    pub abilities: Vec<AbilityApplication>,
    /// Non-stackable ability ids that took effect, sorted.
    pub non_stackable_applied: Vec<String>,
    /// Debuff keys pooled into the enemy stats, sorted.
    pub debuffs_applied: Vec<String>,
}

impl TeamCalculationResult {
    pub fn member(&self, slot: usize) -> Option<&MemberResult> {
        self.members.get(slot)
    }
}

pub fn calculate_team(
    members: &[TeamMemberState; TEAM_SLOTS],
    enemy: &EnemyState,
    options: &CalcOptions,
) -> TeamCalculationResult {
    let config = &options.config;

    let phase1 = resolve_base_stats(members, config);
    let context = build_team_context(members, &phase1);
    let phase3 = apply_abilities(
        members,
        &phase1,
        &context,
        enemy,
        options.random_target_mode,
        &options.manual_targets,
    );

    let effective_enemy = effective_enemy_stats(enemy, &phase3.debuffs, config);
    let race = race_bonus(members, enemy, config);
    debug!(
        abilities = phase3.applications.len(),
        shield = effective_enemy.shield,
        defense = effective_enemy.defense,
        race,
        "team phases resolved"
    );

    let mut totals = TeamTotals {
        net_shield_debuff: phase3.debuffs.shield(),
        net_defense_debuff: phase3.debuffs.defense(),
        effective_shield: effective_enemy.shield,
        effective_defense: effective_enemy.defense,
        race_bonus: race,
        ..TeamTotals::default()
    };

    let mut results = Vec::with_capacity(TEAM_SLOTS);
    for (slot, member) in members.iter().enumerate() {
        let phase4 = resolve_member_damage(
            slot,
            member,
            &phase1[slot],
            &phase3.bonuses[slot],
            effective_enemy,
            race,
            config,
        );
        if let Some(damage) = &phase4.damage {
            totals.total_dps += damage.dps;
            totals.total_skill_damage += damage.skill.expected;
        }
        results.push(MemberResult {
            slot,
            card_id: member.card.as_ref().map(|card| card.id.clone()),
            assist_id: member.assist.as_ref().map(|card| card.id.clone()),
            stats: phase4.stats,
            breakdown: phase4
                .breakdown
                .iter()
                .map(|(stat, sources)| (*stat, *sources))
                .collect(),
            damage: phase4.damage,
        });
    }

    TeamCalculationResult {
        members: results,
        totals,
        non_stackable_applied: phase3.ledger.non_stackable_applied().cloned().collect(),
        debuffs_applied: phase3.ledger.debuffs_applied().cloned().collect(),
        abilities: phase3.applications,
    }
}

/// Resolve a scenario against a card dataset and calculate it.
pub fn calculate_scenario(
    scenario: &Scenario,
    cards: &[Card],
    config: &CalcConfig,
) -> Result<TeamCalculationResult, DataError> {
    let members = build_members(&scenario.members, cards)?;
    let options = CalcOptions {
        manual_targets: scenario.manual_targets.clone(),
        random_target_mode: scenario.random_target_mode,
        config: config.clone(),
    };
    Ok(calculate_team(&members, &scenario.enemy, &options))
}
