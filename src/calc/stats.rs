//! Phase 1: base level, ATK, HP, crit and bond bonuses per slot.

use serde::Serialize;

use crate::calc::constants::{MAX_LIMIT_BREAK, TEAM_SLOTS};
use crate::config::CalcConfig;
use crate::data::card::{BondKind, Card};
use crate::data::team::TeamMemberState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Phase1Result {
    pub has_card: bool,
    pub effective_level: u32,
    pub atk: f64,
    pub hp: f64,
    pub crit_rate: f64,
    /// Raw speed stat (not yet an interval).
    pub speed: f64,
    pub bond_atk_pct: f64,
    pub bond_skill_damage_pct: f64,
    pub assist_atk_pct: f64,
    pub assist_skill_damage_pct: f64,
}

impl Phase1Result {
    /// ATK with bond and assist ATK% applied. Used for ranking allies.
    pub fn bond_adjusted_atk(&self) -> f64 {
        self.atk * (1.0 + self.bond_atk_pct + self.assist_atk_pct)
    }
}

/// Linear interpolation of a stat along the card's level curve. Levels past
/// `max_level` continue on the same line; limit breaks rely on that.
pub fn stat_at_level(base: f64, max: f64, min_level: u32, max_level: u32, level: u32) -> f64 {
    if max_level <= min_level {
        return max;
    }
    base + per_level(base, max, min_level, max_level) * (f64::from(level) - f64::from(min_level))
}

/// Slope of the level curve; 0 for a degenerate single-level card.
pub fn per_level(base: f64, max: f64, min_level: u32, max_level: u32) -> f64 {
    if max_level <= min_level {
        return 0.0;
    }
    (max - base) / f64::from(max_level - min_level)
}

pub fn atk_at_level(card: &Card, level: u32) -> f64 {
    stat_at_level(card.base_atk, card.max_atk, card.min_level, card.max_level, level)
}

pub fn hp_at_level(card: &Card, level: u32) -> f64 {
    stat_at_level(card.base_hp, card.max_hp, card.min_level, card.max_level, level)
}

pub fn effective_level(card: &Card, limit_break: u8, level_bonus: u32, config: &CalcConfig) -> u32 {
    let tier = u32::from(limit_break.min(MAX_LIMIT_BREAK));
    card.max_level
        .saturating_add(tier.saturating_mul(config.levels_per_limit_break))
        .saturating_add(level_bonus)
}

pub fn resolve_member_stats(member: &TeamMemberState, config: &CalcConfig) -> Phase1Result {
    let Some(card) = member.card.as_ref() else {
        return Phase1Result::default();
    };
    let level = effective_level(card, member.limit_break, member.level_bonus, config);

    let mut bond_atk_pct = 0.0;
    let mut bond_skill_damage_pct = 0.0;
    for kind in member.bonds.selections() {
        match kind {
            BondKind::Atk => bond_atk_pct += card.bond_value(kind),
            BondKind::SkillDamage => bond_skill_damage_pct += card.bond_value(kind),
            BondKind::None => {}
        }
    }

    let (assist_atk_pct, assist_skill_damage_pct) = match member
        .assist
        .as_ref()
        .and_then(|assist| assist.assist_bond.as_ref())
    {
        Some(bond) if bond.kind == BondKind::Atk => (bond.value, 0.0),
        Some(bond) if bond.kind == BondKind::SkillDamage => (0.0, bond.value),
        _ => (0.0, 0.0),
    };

    Phase1Result {
        has_card: true,
        effective_level: level,
        atk: atk_at_level(card, level),
        hp: hp_at_level(card, level),
        crit_rate: card.crit / config.crit_scale,
        speed: card.speed,
        bond_atk_pct,
        bond_skill_damage_pct,
        assist_atk_pct,
        assist_skill_damage_pct,
    }
}

pub fn resolve_base_stats(
    members: &[TeamMemberState; TEAM_SLOTS],
    config: &CalcConfig,
) -> [Phase1Result; TEAM_SLOTS] {
    std::array::from_fn(|slot| resolve_member_stats(&members[slot], config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::card::{Attribute, AttackType, Bond, Role};
    use crate::data::team::BondBuild;

    fn card() -> Card {
        Card {
            id: "c".into(),
            name: "C".into(),
            attribute: Attribute::Divina,
            role: Role::Attacker,
            attack_type: AttackType::Melee,
            rarity: 5,
            min_level: 1,
            max_level: 81,
            speed: 1200.0,
            base_atk: 200.0,
            max_atk: 1800.0,
            base_hp: 1000.0,
            max_hp: 9000.0,
            crit: 1500.0,
            skill: None,
            abilities: Vec::new(),
            bonds: vec![
                Bond { id: None, kind: BondKind::Atk, value: 0.05 },
                Bond { id: None, kind: BondKind::SkillDamage, value: 0.08 },
            ],
            assist_bond: None,
        }
    }

    #[test]
    fn stat_interpolates_and_extrapolates_linearly() {
        // 20 ATK per level.
        assert_eq!(stat_at_level(200.0, 1800.0, 1, 81, 1), 200.0);
        assert_eq!(stat_at_level(200.0, 1800.0, 1, 81, 41), 1000.0);
        assert_eq!(stat_at_level(200.0, 1800.0, 1, 81, 81), 1800.0);
        assert_eq!(stat_at_level(200.0, 1800.0, 1, 81, 91), 2000.0);
        assert_eq!(stat_at_level(200.0, 1800.0, 80, 80, 95), 1800.0);
        assert_eq!(per_level(200.0, 1800.0, 1, 81), 20.0);
        assert_eq!(per_level(200.0, 1800.0, 80, 80), 0.0);
    }

    #[test]
    fn limit_break_and_level_bonus_raise_level_past_cap() {
        let config = CalcConfig::default();
        let member = TeamMemberState {
            limit_break: 2,
            level_bonus: 3,
            ..TeamMemberState::with_card(card())
        };
        let stats = resolve_member_stats(&member, &config);
        assert_eq!(stats.effective_level, 81 + 2 * 5 + 3);
        assert_eq!(stats.atk, 1800.0 + 13.0 * 20.0);
        assert_eq!(stats.hp, 9000.0 + 13.0 * 100.0);
        assert!((stats.crit_rate - 0.15).abs() < 1e-12);
    }

    #[test]
    fn huge_level_bonus_saturates_instead_of_overflowing() {
        let config = CalcConfig::default();
        let member = TeamMemberState {
            limit_break: 5,
            level_bonus: u32::MAX,
            ..TeamMemberState::with_card(card())
        };
        let stats = resolve_member_stats(&member, &config);
        assert_eq!(stats.effective_level, u32::MAX);
        assert!(stats.atk.is_finite());
    }

    #[test]
    fn limit_break_above_five_is_clamped() {
        let config = CalcConfig::default();
        let member = TeamMemberState {
            limit_break: 9,
            ..TeamMemberState::with_card(card())
        };
        assert_eq!(resolve_member_stats(&member, &config).effective_level, 81 + 25);
    }

    #[test]
    fn bonds_sum_selections_and_assist_bond() {
        let config = CalcConfig::default();
        let mut assist = card();
        assist.id = "assist".into();
        assist.assist_bond = Some(Bond {
            id: None,
            kind: BondKind::Atk,
            value: 0.1,
        });
        let member = TeamMemberState {
            assist: Some(assist),
            bonds: BondBuild::Slots(vec![BondKind::Atk, BondKind::SkillDamage, BondKind::Atk]),
            ..TeamMemberState::with_card(card())
        };
        let stats = resolve_member_stats(&member, &config);
        assert!((stats.bond_atk_pct - 0.10).abs() < 1e-12);
        assert!((stats.bond_skill_damage_pct - 0.08).abs() < 1e-12);
        assert!((stats.assist_atk_pct - 0.10).abs() < 1e-12);
        assert!((stats.bond_adjusted_atk() - stats.atk * 1.2).abs() < 1e-9);
    }

    #[test]
    fn empty_slot_is_all_zero() {
        let stats = resolve_member_stats(&TeamMemberState::default(), &CalcConfig::default());
        assert_eq!(stats, Phase1Result::default());
        assert!(!stats.has_card);
    }
}
