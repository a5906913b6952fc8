//! Phase 4: final member stats and the damage chain.
//!
//! Randomness never enters here. Crits collapse to an expected multiplier and
//! the limit-break exceed roll to its tier average, with the tier endpoints
//! kept as the min/max spread.

use serde::Serialize;

use crate::calc::buffs::{BonusStat, DebuffPool};
use crate::calc::constants::{LEADER_SLOT, MAIN_SLOTS, TEAM_SLOTS};
use crate::calc::stacking::{ContributionSource, SourceTotals, StackContribution, StatStacking};
use crate::calc::stats::{per_level, Phase1Result};
use crate::config::{CalcConfig, ExceedRange};
use crate::data::card::{Card, Skill};
use crate::data::team::{EnemyState, TeamMemberState};

/// Sources an ability-granted bonus can carry.
const BONUS_SOURCES: [ContributionSource; 3] = [
    ContributionSource::Assist,
    ContributionSource::Ability,
    ContributionSource::Skill,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemberStats {
    /// May be fractional when an averaged level bonus lands on the slot.
    pub level: f64,
    /// Displayed ATK (bond and ATK% applied).
    pub atk: f64,
    /// ATK used in damage math.
    pub internal_atk: f64,
    pub hp: f64,
    pub crit_rate: f64,
    pub crit_damage: f64,
    pub expected_crit_multiplier: f64,
    pub damage_pct: f64,
    pub skill_damage_pct: f64,
    pub normal_attack_damage_pct: f64,
    pub speed_pct: f64,
    /// Seconds between normal attacks.
    pub attack_interval: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DamageValues {
    /// Pre-crit damage with the average exceed multiplier.
    pub base: f64,
    pub crit: f64,
    pub expected: f64,
    /// Expected damage at the low end of the exceed range.
    pub min: f64,
    /// Expected damage at the high end of the exceed range.
    pub max: f64,
    /// The crit value hit the ceiling.
    pub capped: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DamageResult {
    pub normal: DamageValues,
    pub skill: DamageValues,
    pub dps: f64,
}

/// Enemy stats after pooled debuffs and caps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EffectiveEnemy {
    pub shield: f64,
    pub defense: f64,
    pub world_boss_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Phase4Result {
    pub stats: MemberStats,
    pub breakdown: StatStacking<BonusStat>,
    pub damage: Option<DamageResult>,
}

/// Leader-attribute advantage over the enemy, signed.
pub fn race_bonus(
    members: &[TeamMemberState; TEAM_SLOTS],
    enemy: &EnemyState,
    config: &CalcConfig,
) -> f64 {
    let (Some(enemy_attribute), Some(leader)) =
        (enemy.attribute, members[LEADER_SLOT].card.as_ref())
    else {
        return 0.0;
    };
    let sign = f64::from(leader.attribute.matchup(enemy_attribute));
    if sign == 0.0 {
        return 0.0;
    }

    let same_attribute = members
        .iter()
        .flat_map(|member| [member.card.as_ref(), member.assist.as_ref()])
        .flatten()
        .filter(|card| card.attribute == leader.attribute)
        .count();
    let magnitude =
        config.race_leader_bonus + config.race_member_bonus * same_attribute as f64;
    sign * magnitude.min(config.race_bonus_cap)
}

pub fn effective_enemy_stats(
    enemy: &EnemyState,
    debuffs: &DebuffPool,
    config: &CalcConfig,
) -> EffectiveEnemy {
    let defense = (enemy.defense - debuffs.defense()).clamp(-config.defense_cap, config.defense_cap);
    let mut shield = enemy.shield - debuffs.shield();
    if !enemy.bypass_shield_cap {
        shield = shield.clamp(-config.shield_cap, config.shield_cap);
    }
    EffectiveEnemy {
        shield,
        defense,
        world_boss_multiplier: enemy.world_boss_multiplier.unwrap_or(1.0),
    }
}

pub fn expected_crit_multiplier(crit_rate: f64, crit_damage: f64) -> f64 {
    1.0 + crit_rate * (crit_damage - 1.0)
}

/// A higher speed stat is a longer interval. Positive speed bonuses count
/// half; penalties count in full.
pub fn attack_interval(speed_stat: f64, speed_bonus: f64, config: &CalcConfig) -> f64 {
    let base = speed_stat * config.interval_slope + config.interval_intercept;
    let adjusted = if speed_bonus > 0.0 { speed_bonus / 2.0 } else { speed_bonus };
    (base * (1.0 - adjusted)).max(config.min_attack_interval)
}

pub fn skill_base_damage(skill: &Skill, level: f64) -> f64 {
    skill.slv1 + (level - 1.0) * skill.slvup
}

/// Everything between raw power and the exceed roll.
#[derive(Debug, Clone, Copy)]
struct Multipliers {
    damage_pct: f64,
    type_pct: f64,
    race: f64,
    enemy: EffectiveEnemy,
}

impl Multipliers {
    fn product(&self) -> f64 {
        (1.0 + self.damage_pct)
            * (1.0 + self.type_pct)
            * (1.0 + self.race)
            * (1.0 - self.enemy.defense)
            * (1.0 - self.enemy.shield)
            * self.enemy.world_boss_multiplier
    }
}

fn damage_values(
    raw_power: f64,
    exceed: ExceedRange,
    multipliers: Multipliers,
    stats: &MemberStats,
    cap: f64,
) -> DamageValues {
    let chain = multipliers.product();
    let base_at = |exceed: f64| (raw_power * exceed * chain).max(0.0);
    let expected_at =
        |exceed: f64| (base_at(exceed) * stats.expected_crit_multiplier).round().min(cap);

    let base = base_at(exceed.average());
    let uncapped_crit = (base * stats.crit_damage).round();
    DamageValues {
        base,
        crit: uncapped_crit.min(cap),
        expected: expected_at(exceed.average()),
        min: expected_at(exceed.min),
        max: expected_at(exceed.max),
        capped: uncapped_crit > cap,
    }
}

fn add_bonus_sources(
    breakdown: &mut StatStacking<BonusStat>,
    stat: BonusStat,
    totals: SourceTotals,
    scale: f64,
) {
    for source in BONUS_SOURCES {
        let value = match source {
            ContributionSource::Assist => totals.assist,
            ContributionSource::Ability => totals.ability,
            ContributionSource::Skill => totals.skill,
            ContributionSource::Base | ContributionSource::Bond => 0.0,
        };
        if value != 0.0 {
            breakdown.add(StackContribution::new(stat, source, value * scale));
        }
    }
}

/// Per-source breakdown of every final stat. Totals equal the final values:
/// level deltas are converted to ATK/HP through the card's level slope, and
/// percent bonuses are expanded against the level-adjusted stat.
pub fn build_breakdown(
    card: &Card,
    phase1: &Phase1Result,
    bonuses: &StatStacking<BonusStat>,
    config: &CalcConfig,
) -> StatStacking<BonusStat> {
    let mut breakdown = StatStacking::new();
    let level = bonuses.totals_for(&BonusStat::Level);

    breakdown.add(StackContribution::base(BonusStat::Level, f64::from(phase1.effective_level)));
    add_bonus_sources(&mut breakdown, BonusStat::Level, level, 1.0);

    let atk_slope = per_level(card.base_atk, card.max_atk, card.min_level, card.max_level);
    let atk_final = phase1.atk + atk_slope * level.bonus();
    let atk_pct = bonuses.totals_for(&BonusStat::Atk);
    breakdown.add(StackContribution::base(BonusStat::Atk, phase1.atk));
    add_bonus_sources(&mut breakdown, BonusStat::Atk, level, atk_slope);
    breakdown.add(StackContribution::new(
        BonusStat::Atk,
        ContributionSource::Bond,
        atk_final * phase1.bond_atk_pct,
    ));
    breakdown.add(StackContribution::new(
        BonusStat::Atk,
        ContributionSource::Assist,
        atk_final * phase1.assist_atk_pct,
    ));
    add_bonus_sources(&mut breakdown, BonusStat::Atk, atk_pct, atk_final);

    let hp_slope = per_level(card.base_hp, card.max_hp, card.min_level, card.max_level);
    let hp_final = phase1.hp + hp_slope * level.bonus();
    breakdown.add(StackContribution::base(BonusStat::Hp, phase1.hp));
    add_bonus_sources(&mut breakdown, BonusStat::Hp, level, hp_slope);
    add_bonus_sources(
        &mut breakdown,
        BonusStat::Hp,
        bonuses.totals_for(&BonusStat::Hp),
        hp_final,
    );

    breakdown.add(StackContribution::base(BonusStat::CritRate, phase1.crit_rate));
    breakdown.add(StackContribution::base(BonusStat::CritDamage, config.base_crit_multiplier));
    breakdown.add(StackContribution::new(
        BonusStat::SkillDamage,
        ContributionSource::Bond,
        phase1.bond_skill_damage_pct,
    ));
    breakdown.add(StackContribution::new(
        BonusStat::SkillDamage,
        ContributionSource::Assist,
        phase1.assist_skill_damage_pct,
    ));
    for stat in [
        BonusStat::CritRate,
        BonusStat::CritDamage,
        BonusStat::Damage,
        BonusStat::SkillDamage,
        BonusStat::NormalAttackDamage,
        BonusStat::Speed,
    ] {
        add_bonus_sources(&mut breakdown, stat, bonuses.totals_for(&stat), 1.0);
    }
    breakdown
}

fn stats_from_breakdown(
    card: &Card,
    breakdown: &StatStacking<BonusStat>,
    config: &CalcConfig,
) -> MemberStats {
    let atk = breakdown.total_for(&BonusStat::Atk);
    let crit_rate = breakdown.total_for(&BonusStat::CritRate).clamp(0.0, 1.0);
    let crit_damage = breakdown.total_for(&BonusStat::CritDamage);
    let speed_pct = breakdown.total_for(&BonusStat::Speed);
    MemberStats {
        level: breakdown.total_for(&BonusStat::Level),
        atk,
        internal_atk: atk / config.atk_scale,
        hp: breakdown.total_for(&BonusStat::Hp),
        crit_rate,
        crit_damage,
        expected_crit_multiplier: expected_crit_multiplier(crit_rate, crit_damage),
        damage_pct: breakdown.total_for(&BonusStat::Damage),
        skill_damage_pct: breakdown.total_for(&BonusStat::SkillDamage),
        normal_attack_damage_pct: breakdown.total_for(&BonusStat::NormalAttackDamage),
        speed_pct,
        attack_interval: attack_interval(card.speed, speed_pct, config),
    }
}

fn member_damage(
    card: &Card,
    limit_break: u8,
    stats: &MemberStats,
    enemy: EffectiveEnemy,
    race: f64,
    config: &CalcConfig,
) -> DamageResult {
    if card.is_healer() && !config.healers_deal_damage {
        return DamageResult::default();
    }
    let exceed = config.exceed_for(limit_break);
    let normal = damage_values(
        stats.internal_atk,
        exceed,
        Multipliers {
            damage_pct: stats.damage_pct,
            type_pct: stats.normal_attack_damage_pct,
            race,
            enemy,
        },
        stats,
        config.normal_damage_cap,
    );
    let skill = card
        .skill
        .as_ref()
        .map(|skill| {
            damage_values(
                skill_base_damage(skill, stats.level),
                exceed,
                Multipliers {
                    damage_pct: stats.damage_pct,
                    type_pct: stats.skill_damage_pct,
                    race,
                    enemy,
                },
                stats,
                config.skill_damage_cap,
            )
        })
        .unwrap_or_default();
    let dps = if stats.attack_interval > 0.0 {
        normal.expected / stats.attack_interval
    } else {
        0.0
    };
    DamageResult { normal, skill, dps }
}

/// Phase 4 for one slot. Empty slots yield an empty result; reserve slots get
/// stats but never a damage result.
pub fn resolve_member_damage(
    slot: usize,
    member: &TeamMemberState,
    phase1: &Phase1Result,
    bonuses: &StatStacking<BonusStat>,
    enemy: EffectiveEnemy,
    race: f64,
    config: &CalcConfig,
) -> Phase4Result {
    let Some(card) = member.card.as_ref() else {
        return Phase4Result {
            stats: MemberStats::default(),
            breakdown: StatStacking::new(),
            damage: None,
        };
    };
    let breakdown = build_breakdown(card, phase1, bonuses, config);
    let stats = stats_from_breakdown(card, &breakdown, config);
    let damage = (slot < MAIN_SLOTS)
        .then(|| member_damage(card, member.limit_break, &stats, enemy, race, config));
    Phase4Result {
        stats,
        breakdown,
        damage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::stats::resolve_member_stats;
    use crate::data::card::{parse_cards, Attribute, Role};

    fn card(json: &str) -> Card {
        parse_cards(&format!("[{json}]")).unwrap().remove(0)
    }

    fn striker() -> Card {
        card(
            r#"{"id":"s","name":"Striker","attribute":"divina","min_level":1,"max_level":80,
                "base_atk":300,"max_atk":3000,"base_hp":100,"max_hp":1000,"crit":1000,"speed":1200,
                "skill":{"id":"sk","slv1":1000,"slvup":10}}"#,
        )
    }

    fn resolve(member: &TeamMemberState, bonuses: &StatStacking<BonusStat>, slot: usize) -> Phase4Result {
        let config = CalcConfig::default();
        let phase1 = resolve_member_stats(member, &config);
        let enemy = effective_enemy_stats(&EnemyState::default(), &DebuffPool::default(), &config);
        resolve_member_damage(slot, member, &phase1, bonuses, enemy, 0.0, &config)
    }

    fn close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "expected {expected}, got {actual}");
    }

    #[test]
    fn plain_striker_damage() {
        let result = resolve(&TeamMemberState::with_card(striker()), &StatStacking::new(), 0);
        close(result.stats.internal_atk, 300.0);
        close(result.stats.expected_crit_multiplier, 1.1);
        let damage = result.damage.unwrap();
        assert_eq!(damage.normal.expected, 330.0);
        assert_eq!(damage.normal.crit, 600.0);
        assert!(!damage.normal.capped);
        // Skill at level 80: 1000 + 79 * 10.
        close(damage.skill.base, 1790.0);
        // Interval: 1200 * 0.001 + 0.3.
        close(result.stats.attack_interval, 1.5);
        close(damage.dps, 220.0);
    }

    #[test]
    fn level_bonus_extrapolates_atk_and_skill() {
        let mut bonuses = StatStacking::new();
        bonuses.add(StackContribution::ability(BonusStat::Level, 10.0));
        bonuses.add(StackContribution::ability(BonusStat::Atk, 0.5));
        let result = resolve(&TeamMemberState::with_card(striker()), &bonuses, 0);
        close(result.stats.level, 90.0);
        // 3000 + 10 * (2700 / 79), then +50%.
        let atk_final = 3000.0 + 10.0 * 2700.0 / 79.0;
        close(result.stats.atk, atk_final * 1.5);
        let atk = result.breakdown.totals_for(&BonusStat::Atk);
        close(atk.base, 3000.0);
        close(atk.ability, atk_final * 1.5 - 3000.0);
        close(result.damage.unwrap().skill.base, 1000.0 + 89.0 * 10.0);
    }

    #[test]
    fn damage_caps_and_capped_flag() {
        let mut bonuses = StatStacking::new();
        bonuses.add(StackContribution::ability(BonusStat::Damage, 1000.0));
        let result = resolve(&TeamMemberState::with_card(striker()), &bonuses, 0);
        let damage = result.damage.unwrap();
        assert_eq!(damage.normal.crit, 99_999.0);
        assert_eq!(damage.normal.expected, 99_999.0);
        assert!(damage.normal.capped);
        assert!(damage.skill.crit <= 999_999.0);
    }

    #[test]
    fn crit_rate_is_clamped_to_one() {
        let mut bonuses = StatStacking::new();
        bonuses.add(StackContribution::ability(BonusStat::CritRate, 5.0));
        let result = resolve(&TeamMemberState::with_card(striker()), &bonuses, 0);
        assert_eq!(result.stats.crit_rate, 1.0);
        close(result.stats.expected_crit_multiplier, 2.0);
    }

    #[test]
    fn reserve_slot_has_stats_but_no_damage() {
        let result = resolve(&TeamMemberState::with_card(striker()), &StatStacking::new(), 5);
        assert!(result.damage.is_none());
        close(result.stats.atk, 3000.0);
    }

    #[test]
    fn card_without_skill_has_zero_skill_damage() {
        let mut no_skill = striker();
        no_skill.skill = None;
        let result = resolve(&TeamMemberState::with_card(no_skill), &StatStacking::new(), 0);
        assert_eq!(result.damage.unwrap().skill, DamageValues::default());
    }

    #[test]
    fn healers_can_be_silenced() {
        let mut healer = striker();
        healer.role = Role::Healer;
        let member = TeamMemberState::with_card(healer);
        let config = CalcConfig {
            healers_deal_damage: false,
            ..CalcConfig::default()
        };
        let phase1 = resolve_member_stats(&member, &config);
        let enemy = effective_enemy_stats(&EnemyState::default(), &DebuffPool::default(), &config);
        let result =
            resolve_member_damage(0, &member, &phase1, &StatStacking::new(), enemy, 0.0, &config);
        assert_eq!(result.damage, Some(DamageResult::default()));
        assert!(resolve(&member, &StatStacking::new(), 0).damage.unwrap().dps > 0.0);
    }

    #[test]
    fn speed_bonus_is_halved_and_penalty_is_not() {
        let config = CalcConfig::default();
        close(attack_interval(1200.0, 0.2, &config), 1.5 * 0.9);
        close(attack_interval(1200.0, -0.2, &config), 1.5 * 1.2);
        close(attack_interval(0.0, 0.9, &config), 0.5);
    }

    #[test]
    fn enemy_caps_unless_bypassed() {
        let config = CalcConfig::default();
        let enemy = EnemyState {
            shield: 0.9,
            defense: -0.9,
            ..EnemyState::default()
        };
        let effective = effective_enemy_stats(&enemy, &DebuffPool::default(), &config);
        close(effective.shield, 0.5);
        close(effective.defense, -0.5);

        let bypass = EnemyState {
            bypass_shield_cap: true,
            ..enemy
        };
        close(effective_enemy_stats(&bypass, &DebuffPool::default(), &config).shield, 0.9);
    }

    #[test]
    fn race_bonus_counts_same_attribute_units_and_caps() {
        let config = CalcConfig::default();
        let mut members: [TeamMemberState; TEAM_SLOTS] = Default::default();
        members[0] = TeamMemberState::with_card(striker());
        members[5] = TeamMemberState::with_card(striker());
        let mut advantaged = EnemyState {
            attribute: Some(Attribute::Phantasma),
            ..EnemyState::default()
        };
        close(race_bonus(&members, &advantaged, &config), 0.10 + 0.02 * 2.0);

        advantaged.attribute = Some(Attribute::Anima);
        close(race_bonus(&members, &advantaged, &config), -(0.10 + 0.02 * 2.0));

        advantaged.attribute = Some(Attribute::Divina);
        close(race_bonus(&members, &advantaged, &config), 0.0);

        for slot in 1..TEAM_SLOTS {
            members[slot] = TeamMemberState::with_card(striker());
            members[slot].assist = Some(striker());
        }
        advantaged.attribute = Some(Attribute::Phantasma);
        close(race_bonus(&members, &advantaged, &config), 0.30);
        close(race_bonus(&members, &EnemyState::default(), &config), 0.0);
    }

    #[test]
    fn exceed_spread_brackets_expected() {
        let member = TeamMemberState {
            limit_break: 5,
            ..TeamMemberState::with_card(striker())
        };
        let damage = resolve(&member, &StatStacking::new(), 0).damage.unwrap();
        assert!(damage.normal.min < damage.normal.expected);
        assert!(damage.normal.expected < damage.normal.max);
    }
}
