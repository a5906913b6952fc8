//! Phase 2: team-wide indices consumed by ability targeting.

use std::collections::{BTreeMap, BTreeSet};

use crate::calc::constants::{LEADER_SLOT, MAIN_SLOTS, TEAM_SLOTS};
use crate::calc::stats::Phase1Result;
use crate::data::card::Attribute;
use crate::data::team::TeamMemberState;

/// Read-only snapshot built fresh for every calculation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamContext {
    /// Slots with a card, bond-adjusted ATK descending.
    pub by_atk: Vec<usize>,
    /// Slots with a card, raw speed stat descending (slowest first).
    pub by_speed: Vec<usize>,
    /// Slots with a card, HP descending.
    pub by_hp: Vec<usize>,
    pub attribute_counts: BTreeMap<Attribute, usize>,
    pub card_ids: BTreeSet<String>,
    pub assist_ids: BTreeSet<String>,
    pub leader_card_id: Option<String>,
    populated: [bool; TEAM_SLOTS],
    atk: [f64; TEAM_SLOTS],
    speed: [f64; TEAM_SLOTS],
    attributes: [Option<Attribute>; TEAM_SLOTS],
}

impl TeamContext {
    pub fn has_card(&self, slot: usize) -> bool {
        self.populated.get(slot).copied().unwrap_or(false)
    }

    /// Main-team slots (0..5) with a card, in slot order.
    pub fn main_slots(&self) -> Vec<usize> {
        (0..MAIN_SLOTS).filter(|&slot| self.has_card(slot)).collect()
    }

    /// True if any of `ids` is present as a card or an assist.
    pub fn any_present(&self, ids: &[String]) -> bool {
        ids.iter()
            .any(|id| self.card_ids.contains(id) || self.assist_ids.contains(id))
    }

    pub fn attribute_count(&self, attribute: Attribute) -> usize {
        self.attribute_counts.get(&attribute).copied().unwrap_or(0)
    }

    /// Bond-adjusted ATK of a slot (0 for empty slots).
    pub fn atk_of(&self, slot: usize) -> f64 {
        self.atk.get(slot).copied().unwrap_or(0.0)
    }

    pub fn speed_of(&self, slot: usize) -> f64 {
        self.speed.get(slot).copied().unwrap_or(0.0)
    }

    pub fn attribute_of(&self, slot: usize) -> Option<Attribute> {
        self.attributes.get(slot).copied().flatten()
    }
}

/// Sort slots by `key` descending. Equal keys keep slot order so selection is
/// deterministic.
pub fn ranked_desc(slots: &[usize], key: impl Fn(usize) -> f64) -> Vec<usize> {
    let mut ranked = slots.to_vec();
    ranked.sort_by(|&left, &right| {
        key(right)
            .total_cmp(&key(left))
            .then_with(|| left.cmp(&right))
    });
    ranked
}

/// Ascending counterpart of [ranked_desc]; ties still go to the lower slot.
pub fn ranked_asc(slots: &[usize], key: impl Fn(usize) -> f64) -> Vec<usize> {
    let mut ranked = slots.to_vec();
    ranked.sort_by(|&left, &right| {
        key(left)
            .total_cmp(&key(right))
            .then_with(|| left.cmp(&right))
    });
    ranked
}

pub fn build_team_context(
    members: &[TeamMemberState; TEAM_SLOTS],
    phase1: &[Phase1Result; TEAM_SLOTS],
) -> TeamContext {
    let populated: [bool; TEAM_SLOTS] = std::array::from_fn(|slot| members[slot].has_card());
    let slots: Vec<usize> = (0..TEAM_SLOTS).filter(|&slot| populated[slot]).collect();

    let mut attribute_counts = BTreeMap::new();
    let mut card_ids = BTreeSet::new();
    let mut assist_ids = BTreeSet::new();
    for member in members {
        if let Some(card) = &member.card {
            *attribute_counts.entry(card.attribute).or_insert(0) += 1;
            card_ids.insert(card.id.clone());
        }
        if let Some(assist) = &member.assist {
            assist_ids.insert(assist.id.clone());
        }
    }

    TeamContext {
        by_atk: ranked_desc(&slots, |slot| phase1[slot].bond_adjusted_atk()),
        by_speed: ranked_desc(&slots, |slot| phase1[slot].speed),
        by_hp: ranked_desc(&slots, |slot| phase1[slot].hp),
        attribute_counts,
        card_ids,
        assist_ids,
        leader_card_id: members[LEADER_SLOT].card.as_ref().map(|card| card.id.clone()),
        populated,
        atk: std::array::from_fn(|slot| phase1[slot].bond_adjusted_atk()),
        speed: std::array::from_fn(|slot| phase1[slot].speed),
        attributes: std::array::from_fn(|slot| {
            members[slot].card.as_ref().map(|card| card.attribute)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::stats::resolve_base_stats;
    use crate::config::CalcConfig;
    use crate::data::card::parse_cards;

    fn members() -> [TeamMemberState; TEAM_SLOTS] {
        let cards = parse_cards(
            r#"[
                {"id":"low","name":"Low","attribute":"divina","max_level":10,"base_atk":100,"max_atk":100,"speed":900,"max_hp":500},
                {"id":"high","name":"High","attribute":"anima","max_level":10,"base_atk":500,"max_atk":500,"speed":1500,"max_hp":100},
                {"id":"tie","name":"Tie","attribute":"divina","max_level":10,"base_atk":100,"max_atk":100,"speed":900,"max_hp":300},
                {"id":"helper","name":"Helper","attribute":"phantasma","max_level":10,"base_atk":1,"max_atk":1}
            ]"#,
        )
        .unwrap();
        let mut members: [TeamMemberState; TEAM_SLOTS] = Default::default();
        members[0] = TeamMemberState::with_card(cards[0].clone());
        members[1] = TeamMemberState::with_card(cards[1].clone());
        members[3] = TeamMemberState::with_card(cards[2].clone());
        members[3].assist = Some(cards[3].clone());
        members[5] = TeamMemberState::with_card(cards[3].clone());
        members
    }

    #[test]
    fn orderings_are_descending_with_slot_order_ties() {
        let members = members();
        let phase1 = resolve_base_stats(&members, &CalcConfig::default());
        let context = build_team_context(&members, &phase1);
        assert_eq!(context.by_atk, vec![1, 0, 3, 5]);
        assert_eq!(context.by_speed, vec![1, 0, 3, 5]);
        assert_eq!(context.by_hp, vec![0, 3, 1, 5]);
        assert_eq!(context.main_slots(), vec![0, 1, 3]);
    }

    #[test]
    fn ids_counts_and_leader() {
        let members = members();
        let phase1 = resolve_base_stats(&members, &CalcConfig::default());
        let context = build_team_context(&members, &phase1);
        assert_eq!(context.attribute_count(Attribute::Divina), 2);
        assert_eq!(context.attribute_count(Attribute::Phantasma), 1);
        assert_eq!(context.leader_card_id.as_deref(), Some("low"));
        assert!(context.assist_ids.contains("helper"));
        assert!(context.any_present(&["helper".to_string()]));
        assert!(!context.any_present(&["missing".to_string()]));
        assert!(context.has_card(5));
        assert!(!context.has_card(2));
        assert_eq!(context.atk_of(1), 500.0);
        assert_eq!(context.atk_of(2), 0.0);
        assert_eq!(context.attribute_of(1), Some(Attribute::Anima));
        assert_eq!(context.attribute_of(2), None);
    }

    #[test]
    fn ascending_rank_breaks_ties_by_slot() {
        let values = [3.0, 1.0, 1.0, 2.0];
        assert_eq!(ranked_asc(&[0, 1, 2, 3], |slot| values[slot]), vec![1, 2, 3, 0]);
        assert_eq!(ranked_desc(&[0, 1, 2, 3], |slot| values[slot]), vec![0, 3, 1, 2]);
    }
}
