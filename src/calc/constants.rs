//! Built-in combat constants. [crate::config::CalcConfig::default] is assembled
//! from these; a config file may override any of them.

/// Total slots in a team configuration.
pub const TEAM_SLOTS: usize = 7;
/// Slots 0..MAIN_SLOTS deal damage; the rest are reserve.
pub const MAIN_SLOTS: usize = 5;
pub const LEADER_SLOT: usize = 0;

pub const MAX_LIMIT_BREAK: u8 = 5;
pub const LEVELS_PER_LIMIT_BREAK: u32 = 5;

/// Fixed-point scale of the raw crit stat.
pub const CRIT_SCALE: f64 = 10_000.0;
/// Displayed ATK divided by this gives the ATK used in damage math.
pub const ATK_SCALE: f64 = 10.0;
pub const BASE_CRIT_MULTIPLIER: f64 = 2.0;

/// Limit-break exceed bonus range per tier (min, max). The damage chain uses
/// the midpoint.
pub const EXCEED_RANGES: [(f64, f64); 6] = [
    (1.0, 1.0),
    (1.01, 1.03),
    (1.02, 1.06),
    (1.03, 1.09),
    (1.04, 1.12),
    (1.05, 1.15),
];

/// Attack interval in seconds = speed * slope + intercept.
pub const INTERVAL_SLOPE: f64 = 0.001;
pub const INTERVAL_INTERCEPT: f64 = 0.3;
pub const MIN_ATTACK_INTERVAL: f64 = 0.5;

pub const SHIELD_CAP: f64 = 0.5;
pub const DEFENSE_CAP: f64 = 0.5;

pub const NORMAL_DAMAGE_CAP: f64 = 99_999.0;
pub const SKILL_DAMAGE_CAP: f64 = 999_999.0;

pub const RACE_LEADER_BONUS: f64 = 0.10;
pub const RACE_MEMBER_BONUS: f64 = 0.02;
pub const RACE_BONUS_CAP: f64 = 0.30;

/// Active skills whose ally count reaches this hit the whole team.
pub const AOE_TARGET_THRESHOLD: u32 = 5;
/// Upstream marker for "all allies".
pub const ALL_ALLIES_SENTINEL: u32 = 99;

