//! The team damage pipeline: base stats, team context, ability application
//! and damage resolution.

pub mod abilities;
pub mod buffs;
pub mod constants;
pub mod context;
pub mod damage;
pub mod engine;
pub mod stacking;
pub mod stats;
pub mod targeting;

pub use buffs::BonusStat;
pub use constants::{MAIN_SLOTS, TEAM_SLOTS};
pub use damage::{DamageResult, DamageValues, MemberStats};
pub use engine::{
    calculate_scenario, calculate_team, CalcOptions, MemberResult, TeamCalculationResult,
    TeamTotals,
};
pub use targeting::{ManualTargets, RandomTargetMode};
