//! Resolves an ability's target descriptor into concrete slots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calc::abilities::{ParsedAbility, RankKey, TargetDescriptor};
use crate::calc::constants::MAIN_SLOTS;
use crate::calc::context::{ranked_asc, ranked_desc, TeamContext};
use crate::data::card::Attribute;

/// Ability id -> user-chosen target slots for `ranked` abilities.
pub type ManualTargets = BTreeMap<String, Vec<usize>>;

/// How "N random allies" abilities are evaluated deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RandomTargetMode {
    /// Top N by bond-adjusted ATK.
    #[default]
    Best,
    /// Bottom N by bond-adjusted ATK.
    Worst,
    /// First N by slot order.
    First,
    /// Last N by slot order.
    Last,
    /// Every eligible slot, with the effect scaled by N / eligible.
    Average,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetResolution {
    pub slots: Vec<usize>,
    pub scale: f64,
}

impl TargetResolution {
    fn all(slots: Vec<usize>) -> Self {
        Self { slots, scale: 1.0 }
    }

    fn none() -> Self {
        Self::all(Vec::new())
    }
}

fn main_only(order: &[usize]) -> impl Iterator<Item = usize> + '_ {
    order.iter().copied().filter(|&slot| slot < MAIN_SLOTS)
}

fn sorted(mut slots: Vec<usize>) -> Vec<usize> {
    slots.sort_unstable();
    slots
}

fn resolve_attribute(
    attribute: Attribute,
    count: Option<usize>,
    context: &TeamContext,
    mode: RandomTargetMode,
    main_cards: &[usize],
) -> TargetResolution {
    let eligible: Vec<usize> = main_cards
        .iter()
        .copied()
        .filter(|&slot| context.attribute_of(slot) == Some(attribute))
        .collect();

    let Some(count) = count.filter(|&count| count < eligible.len()) else {
        return TargetResolution::all(eligible);
    };

    match mode {
        RandomTargetMode::Best => TargetResolution::all(sorted(
            ranked_desc(&eligible, |slot| context.atk_of(slot))
                .into_iter()
                .take(count)
                .collect(),
        )),
        RandomTargetMode::Worst => TargetResolution::all(sorted(
            ranked_asc(&eligible, |slot| context.atk_of(slot))
                .into_iter()
                .take(count)
                .collect(),
        )),
        RandomTargetMode::First => TargetResolution::all(eligible[..count].to_vec()),
        RandomTargetMode::Last => TargetResolution::all(eligible[eligible.len() - count..].to_vec()),
        RandomTargetMode::Average => {
            let scale = count as f64 / eligible.len() as f64;
            TargetResolution {
                slots: eligible,
                scale,
            }
        }
    }
}

/// Validated manual override: in range, populated, deduplicated, at most `count`.
fn manual_override(
    requested: &[usize],
    count: usize,
    context: &TeamContext,
) -> Option<Vec<usize>> {
    let mut slots: Vec<usize> = Vec::new();
    for &slot in requested {
        if slot < MAIN_SLOTS && context.has_card(slot) && !slots.contains(&slot) {
            slots.push(slot);
        }
    }
    slots.truncate(count);
    if slots.is_empty() {
        None
    } else {
        Some(sorted(slots))
    }
}

fn resolve_ranked(
    ability_id: &str,
    count: usize,
    key: RankKey,
    context: &TeamContext,
    manual: &ManualTargets,
) -> TargetResolution {
    if let Some(slots) = manual
        .get(ability_id)
        .and_then(|requested| manual_override(requested, count, context))
    {
        return TargetResolution::all(slots);
    }

    let main_cards = context.main_slots();
    let order = match key {
        RankKey::Atk => context.by_atk.clone(),
        RankKey::Hp => context.by_hp.clone(),
        RankKey::Slowest => context.by_speed.clone(),
        // A higher speed stat is a longer interval, so fastest is the lowest stat.
        RankKey::Fastest => ranked_asc(&main_cards, |slot| context.speed_of(slot)),
    };
    TargetResolution::all(sorted(main_only(&order).take(count).collect()))
}

/// Resolve which slots a target descriptor hits. Enemy-facing descriptors
/// resolve like `Team`; callers only apply their debuff side.
pub fn resolve_targets(
    target: &TargetDescriptor,
    ability_id: &str,
    source_slot: usize,
    context: &TeamContext,
    mode: RandomTargetMode,
    manual: &ManualTargets,
) -> TargetResolution {
    let main_cards = context.main_slots();
    match *target {
        TargetDescriptor::SelfOnly => {
            if context.has_card(source_slot) {
                TargetResolution::all(vec![source_slot])
            } else {
                TargetResolution::none()
            }
        }
        TargetDescriptor::Team | TargetDescriptor::Enemy | TargetDescriptor::CurrentTarget => {
            TargetResolution::all(main_cards)
        }
        TargetDescriptor::Attribute { attribute, count } => {
            resolve_attribute(attribute, count, context, mode, &main_cards)
        }
        TargetDescriptor::Ranked { count, key } => {
            resolve_ranked(ability_id, count, key, context, manual)
        }
    }
}

pub fn resolve_ability_targets(
    ability: &ParsedAbility,
    context: &TeamContext,
    mode: RandomTargetMode,
    manual: &ManualTargets,
) -> TargetResolution {
    resolve_targets(&ability.target, &ability.id, ability.slot, context, mode, manual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::constants::TEAM_SLOTS;
    use crate::calc::context::build_team_context;
    use crate::calc::stats::resolve_base_stats;
    use crate::config::CalcConfig;
    use crate::data::card::parse_cards;
    use crate::data::team::TeamMemberState;

    /// Slots: 0 divina 300, 1 divina 500, 2 anima 400, 3 divina 500, 5 divina 900 (reserve).
    fn context() -> TeamContext {
        let cards = parse_cards(
            r#"[
                {"id":"d300","name":"x","attribute":"divina","max_level":10,"base_atk":300,"max_atk":300,"speed":1000,"max_hp":10},
                {"id":"d500a","name":"x","attribute":"divina","max_level":10,"base_atk":500,"max_atk":500,"speed":800,"max_hp":30},
                {"id":"a400","name":"x","attribute":"anima","max_level":10,"base_atk":400,"max_atk":400,"speed":800,"max_hp":20},
                {"id":"d500b","name":"x","attribute":"divina","max_level":10,"base_atk":500,"max_atk":500,"speed":1200,"max_hp":40},
                {"id":"d900","name":"x","attribute":"divina","max_level":10,"base_atk":900,"max_atk":900,"speed":100,"max_hp":99}
            ]"#,
        )
        .unwrap();
        let mut members: [TeamMemberState; TEAM_SLOTS] = Default::default();
        for (slot, card) in [0, 1, 2, 3, 5].into_iter().zip(cards) {
            members[slot] = TeamMemberState::with_card(card);
        }
        let phase1 = resolve_base_stats(&members, &CalcConfig::default());
        build_team_context(&members, &phase1)
    }

    fn divina(count: Option<usize>) -> TargetDescriptor {
        TargetDescriptor::Attribute {
            attribute: Attribute::Divina,
            count,
        }
    }

    fn resolve(target: TargetDescriptor, mode: RandomTargetMode) -> TargetResolution {
        resolve_targets(&target, "ab", 0, &context(), mode, &ManualTargets::new())
    }

    #[test]
    fn team_and_enemy_cover_main_slots_only() {
        assert_eq!(resolve(TargetDescriptor::Team, RandomTargetMode::Best).slots, vec![0, 1, 2, 3]);
        assert_eq!(resolve(TargetDescriptor::Enemy, RandomTargetMode::Best).slots, vec![0, 1, 2, 3]);
    }

    #[test]
    fn self_target_on_reserve_slot_hits_itself() {
        let resolution = resolve_targets(
            &TargetDescriptor::SelfOnly,
            "ab",
            5,
            &context(),
            RandomTargetMode::Best,
            &ManualTargets::new(),
        );
        assert_eq!(resolution.slots, vec![5]);
    }

    #[test]
    fn attribute_without_narrowing_takes_all_eligible() {
        let resolution = resolve(divina(None), RandomTargetMode::Best);
        assert_eq!(resolution.slots, vec![0, 1, 3]);
        assert_eq!(resolution.scale, 1.0);
        assert_eq!(resolve(divina(Some(3)), RandomTargetMode::First).slots, vec![0, 1, 3]);
    }

    #[test]
    fn random_target_modes_narrow_attribute_targets() {
        // Ties at 500 between slots 1 and 3 resolve by slot order.
        assert_eq!(resolve(divina(Some(1)), RandomTargetMode::Best).slots, vec![1]);
        assert_eq!(resolve(divina(Some(2)), RandomTargetMode::Best).slots, vec![1, 3]);
        assert_eq!(resolve(divina(Some(2)), RandomTargetMode::Worst).slots, vec![0, 1]);
        assert_eq!(resolve(divina(Some(2)), RandomTargetMode::First).slots, vec![0, 1]);
        assert_eq!(resolve(divina(Some(2)), RandomTargetMode::Last).slots, vec![1, 3]);

        let average = resolve(divina(Some(2)), RandomTargetMode::Average);
        assert_eq!(average.slots, vec![0, 1, 3]);
        assert!((average.scale - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn ranked_uses_context_orderings() {
        let top_atk = resolve(TargetDescriptor::Ranked { count: 2, key: RankKey::Atk }, RandomTargetMode::Best);
        assert_eq!(top_atk.slots, vec![1, 3]);
        let top_hp = resolve(TargetDescriptor::Ranked { count: 1, key: RankKey::Hp }, RandomTargetMode::Best);
        assert_eq!(top_hp.slots, vec![3]);
        // Lowest speed stat acts first; slots 1 and 2 tie at 800.
        let fastest = resolve(TargetDescriptor::Ranked { count: 2, key: RankKey::Fastest }, RandomTargetMode::Best);
        assert_eq!(fastest.slots, vec![1, 2]);
        let slowest = resolve(TargetDescriptor::Ranked { count: 1, key: RankKey::Slowest }, RandomTargetMode::Best);
        assert_eq!(slowest.slots, vec![3]);
    }

    #[test]
    fn manual_override_wins_when_valid() {
        let mut manual = ManualTargets::new();
        manual.insert("ab".into(), vec![4, 2, 2, 9, 0]);
        let resolution = resolve_targets(
            &TargetDescriptor::Ranked { count: 2, key: RankKey::Atk },
            "ab",
            0,
            &context(),
            RandomTargetMode::Best,
            &manual,
        );
        assert_eq!(resolution.slots, vec![0, 2]);

        manual.insert("ab".into(), vec![4, 6]);
        let fallback = resolve_targets(
            &TargetDescriptor::Ranked { count: 1, key: RankKey::Atk },
            "ab",
            0,
            &context(),
            RandomTargetMode::Best,
            &manual,
        );
        assert_eq!(fallback.slots, vec![1]);
    }
}
