use std::collections::BTreeMap;

use serde::Serialize;

/// Where a stat contribution came from. Drives the per-stat breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionSource {
    /// Card base value (level curve, raw crit, etc.)
    Base,
    /// Bond-slot selections on the member itself
    Bond,
    /// Assist card: its bond and its abilities
    Assist,
    /// Unlocked card abilities (own or other members')
    Ability,
    /// Active-skill buffs
    Skill,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackContribution<K> {
    pub key: K,
    pub source: ContributionSource,
    pub value: f64,
}

impl<K> StackContribution<K> {
    pub fn new(key: K, source: ContributionSource, value: f64) -> Self {
        Self { key, source, value }
    }

    pub fn base(key: K, value: f64) -> Self {
        Self::new(key, ContributionSource::Base, value)
    }

    pub fn ability(key: K, value: f64) -> Self {
        Self::new(key, ContributionSource::Ability, value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SourceTotals {
    pub base: f64,
    pub bond: f64,
    pub assist: f64,
    pub ability: f64,
    pub skill: f64,
}

impl SourceTotals {
    pub fn apply(&mut self, source: ContributionSource, value: f64) {
        match source {
            ContributionSource::Base => self.base += value,
            ContributionSource::Bond => self.bond += value,
            ContributionSource::Assist => self.assist += value,
            ContributionSource::Ability => self.ability += value,
            ContributionSource::Skill => self.skill += value,
        }
    }

    pub fn total(self) -> f64 {
        self.base + self.bond + self.assist + self.ability + self.skill
    }

    /// Everything except the base value.
    pub fn bonus(self) -> f64 {
        self.total() - self.base
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatStacking<K: Ord> {
    totals: BTreeMap<K, SourceTotals>,
}

impl<K: Ord> Default for StatStacking<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> StatStacking<K> {
    pub fn new() -> Self {
        Self {
            totals: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, contribution: StackContribution<K>) {
        self.totals
            .entry(contribution.key)
            .or_default()
            .apply(contribution.source, contribution.value);
    }

    pub fn add_many<I>(&mut self, contributions: I)
    where
        I: IntoIterator<Item = StackContribution<K>>,
    {
        for contribution in contributions {
            self.add(contribution);
        }
    }

    pub fn totals_for(&self, key: &K) -> SourceTotals {
        self.totals.get(key).copied().unwrap_or_default()
    }

    pub fn total_for(&self, key: &K) -> f64 {
        self.totals_for(key).total()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &SourceTotals)> {
        self.totals.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_split_by_source_and_sum() {
        let mut stacking = StatStacking::new();
        stacking.add_many([
            StackContribution::base("atk", 100.0),
            StackContribution::new("atk", ContributionSource::Bond, 5.0),
            StackContribution::ability("atk", 10.0),
            StackContribution::ability("atk", 2.5),
        ]);
        let atk = stacking.totals_for(&"atk");
        assert_eq!(atk.base, 100.0);
        assert_eq!(atk.ability, 12.5);
        assert_eq!(atk.total(), 117.5);
        assert_eq!(atk.bonus(), 17.5);
        assert_eq!(stacking.total_for(&"hp"), 0.0);
    }

    #[test]
    fn sources_stay_separate_per_key() {
        let mut stacking = StatStacking::new();
        stacking.add(StackContribution::ability("crit", 0.1));
        stacking.add(StackContribution::new("crit", ContributionSource::Skill, 0.2));
        stacking.add(StackContribution::base("speed", 1.0));
        let crit = stacking.totals_for(&"crit");
        assert_eq!(crit.ability, 0.1);
        assert_eq!(crit.skill, 0.2);
        assert_eq!(crit.base, 0.0);
        assert!((crit.bonus() - 0.3).abs() < 1e-12);
        let keys: Vec<&&str> = stacking.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![&"crit", &"speed"]);
    }
}
