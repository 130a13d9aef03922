//! Tuning configuration for the Encore engine.
//!
//! Maps directly to `encore.toml`. Every table the reward and progression
//! rules read (house multipliers, streak steps, tier caps, decay rates) lives
//! here so tuning never requires touching call sites.

use serde::{Deserialize, Serialize};

use crate::error::{EncoreError, Result};

/// Top-level engine configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EncoreConfig {
    /// Currency, experience and level curve.
    #[serde(default)]
    pub economy: EconomyConfig,
    /// House-level multiplier table.
    #[serde(default)]
    pub house: HouseConfig,
    /// Streak bonus steps.
    #[serde(default)]
    pub streak: StreakConfig,
    /// NPC relationship tuning.
    #[serde(default)]
    pub relationship: RelationshipConfig,
    /// Companion decay and leveling.
    #[serde(default)]
    pub companion: CompanionConfig,
    /// Mission cadence and slots.
    #[serde(default)]
    pub missions: MissionConfig,
    /// Persistence / save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl EncoreConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `EncoreError::Config` if the TOML is invalid or a table fails
    /// validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| EncoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject tables the engine cannot evaluate.
    ///
    /// # Errors
    /// Returns `EncoreError::Config` describing the first bad table.
    pub fn validate(&self) -> Result<()> {
        if self.economy.base_level_xp == 0 {
            return Err(EncoreError::Config("economy.base_level_xp must be > 0".into()));
        }
        if self.economy.max_level == 0 {
            return Err(EncoreError::Config("economy.max_level must be > 0".into()));
        }
        if self.house.tiers.is_empty() {
            return Err(EncoreError::Config("house.tiers must not be empty".into()));
        }
        if self.house.tiers.len() > usize::from(u8::MAX) {
            return Err(EncoreError::Config("house.tiers has too many levels".into()));
        }
        for (level, tier) in self.house.tiers.iter().enumerate() {
            if !(tier.xp_multiplier > 0.0 && tier.currency_multiplier > 0.0) {
                return Err(EncoreError::Config(format!(
                    "house tier {level} has a non-positive multiplier"
                )));
            }
        }
        for step in &self.streak.steps {
            if step.xp_bonus < 0.0 || step.currency_bonus < 0.0 {
                return Err(EncoreError::Config(format!(
                    "streak step at {} has a negative bonus",
                    step.min_streak
                )));
            }
        }
        let rel = &self.relationship;
        if rel.friend_cap == 0 || rel.dating_cap == 0 || rel.married_cap == 0 {
            return Err(EncoreError::Config("relationship caps must be > 0".into()));
        }
        if rel
            .checkpoints
            .windows(2)
            .any(|w| w[0] >= w[1])
            || rel.checkpoints.iter().any(|c| !(*c > 0.0 && *c <= 1.0))
        {
            return Err(EncoreError::Config(
                "relationship.checkpoints must be strictly increasing within (0, 1]".into(),
            ));
        }
        if !(rel.marriage_decay_per_day.is_finite() && rel.marriage_decay_per_day >= 0.0) {
            return Err(EncoreError::Config(
                "relationship.marriage_decay_per_day must be finite and >= 0".into(),
            ));
        }
        let companion = &self.companion;
        for (name, rate) in [
            ("hunger_per_hour", companion.hunger_per_hour),
            ("happiness_decay_per_hour", companion.happiness_decay_per_hour),
        ] {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(EncoreError::Config(format!(
                    "companion.{name} must be finite and >= 0"
                )));
            }
        }
        if !(0.0..=1.0).contains(&companion.request_chance) {
            return Err(EncoreError::Config(
                "companion.request_chance must be within [0, 1]".into(),
            ));
        }
        if self.companion.xp_per_level == 0 {
            return Err(EncoreError::Config("companion.xp_per_level must be > 0".into()));
        }
        if self.missions.daily_reset_hour > 23 {
            return Err(EncoreError::Config("missions.daily_reset_hour must be 0..=23".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Currency, experience and level curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// XP step of the triangular level curve.
    #[serde(default = "default_100_u64")]
    pub base_level_xp: u64,
    /// Highest reachable player level.
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    /// Base XP for one correct answer.
    #[serde(default = "default_10_u64")]
    pub answer_xp: u64,
    /// Base currency for one correct answer.
    #[serde(default = "default_5_u64")]
    pub answer_currency: u64,
    /// Base XP for a finished practice session.
    #[serde(default = "default_25_u64")]
    pub practice_xp: u64,
    /// Companion XP granted by a finished practice session.
    #[serde(default = "default_15_u64")]
    pub practice_companion_xp: u64,
    /// Base currency earned by busking.
    #[serde(default = "default_40_u64")]
    pub busking_currency: u64,
    /// Minutes between busking sessions.
    #[serde(default = "default_60_i64")]
    pub busking_cooldown_minutes: i64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            base_level_xp: 100,
            max_level: 99,
            answer_xp: 10,
            answer_currency: 5,
            practice_xp: 25,
            practice_companion_xp: 15,
            busking_currency: 40,
            busking_cooldown_minutes: 60,
        }
    }
}

/// One row of the house table; the row index is the house level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HouseTier {
    /// XP multiplier applied at this level.
    pub xp_multiplier: f64,
    /// Currency multiplier applied at this level.
    pub currency_multiplier: f64,
    /// Cost of upgrading *into* this level (ignored for level 0).
    pub upgrade_cost: u64,
}

/// House-level multiplier table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseConfig {
    /// Tier rows indexed by house level; max level is `tiers.len() - 1`.
    #[serde(default = "default_house_tiers")]
    pub tiers: Vec<HouseTier>,
}

impl HouseConfig {
    /// Highest house level the table supports.
    #[must_use]
    pub fn max_level(&self) -> u8 {
        u8::try_from(self.tiers.len().saturating_sub(1)).unwrap_or(u8::MAX)
    }

    /// Tier row for a level, clamped to the top of the table.
    #[must_use]
    pub fn tier(&self, level: u8) -> Option<&HouseTier> {
        let idx = usize::from(level).min(self.tiers.len().saturating_sub(1));
        self.tiers.get(idx)
    }
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            tiers: default_house_tiers(),
        }
    }
}

/// A streak bonus step: applies once the streak reaches `min_streak`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreakStep {
    /// Streak length at which this step starts applying.
    pub min_streak: u32,
    /// Fractional XP bonus (0.10 = +10%).
    pub xp_bonus: f64,
    /// Fractional currency bonus.
    pub currency_bonus: f64,
}

/// Streak bonus table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakConfig {
    /// Steps; the highest qualifying step wins.
    #[serde(default = "default_streak_steps")]
    pub steps: Vec<StreakStep>,
}

impl StreakConfig {
    /// The highest step whose `min_streak` is reached, if any.
    #[must_use]
    pub fn step_for(&self, streak: u32) -> Option<&StreakStep> {
        self.steps
            .iter()
            .filter(|s| s.min_streak <= streak)
            .max_by_key(|s| s.min_streak)
    }
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            steps: default_streak_steps(),
        }
    }
}

/// NPC relationship tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipConfig {
    /// RP cap while Neutral or Friendly.
    #[serde(default = "default_100_u32")]
    pub friend_cap: u32,
    /// RP cap while Dating.
    #[serde(default = "default_150_u32")]
    pub dating_cap: u32,
    /// RP cap once Married.
    #[serde(default = "default_150_u32")]
    pub married_cap: u32,
    /// Fractions of the tier cap that fire one-shot story events.
    #[serde(default = "default_checkpoints")]
    pub checkpoints: Vec<f64>,
    /// Fraction of the friend cap at which Neutral becomes Friendly.
    #[serde(default = "default_0_25")]
    pub friendly_threshold: f64,
    /// RP granted for a conversation.
    #[serde(default = "default_5_u32")]
    pub talk_rp: u32,
    /// Conversations per NPC per day that grant RP.
    #[serde(default = "default_3_u32")]
    pub talks_per_day: u32,
    /// Days without a positive interaction before an NPC reads as distant.
    #[serde(default = "default_7_i64")]
    pub distant_after_days: i64,
    /// Below this fraction of the tier cap an NPC reads as distant.
    #[serde(default = "default_0_1")]
    pub low_rp_fraction: f64,
    /// Minimum house level for a proposal.
    #[serde(default = "default_2_u8")]
    pub propose_min_house_level: u8,
    /// Marriage happiness right after the wedding.
    #[serde(default = "default_100_f64")]
    pub marriage_start_happiness: f64,
    /// Happiness lost per day without attention.
    #[serde(default = "default_5_f64")]
    pub marriage_decay_per_day: f64,
    /// Happiness gained by talking to the spouse.
    #[serde(default = "default_10_f64")]
    pub spouse_talk_happiness: f64,
    /// Minimum marriage happiness to raise a child.
    #[serde(default = "default_60_f64")]
    pub child_min_happiness: f64,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            friend_cap: 100,
            dating_cap: 150,
            married_cap: 150,
            checkpoints: default_checkpoints(),
            friendly_threshold: 0.25,
            talk_rp: 5,
            talks_per_day: 3,
            distant_after_days: 7,
            low_rp_fraction: 0.1,
            propose_min_house_level: 2,
            marriage_start_happiness: 100.0,
            marriage_decay_per_day: 5.0,
            spouse_talk_happiness: 10.0,
            child_min_happiness: 60.0,
        }
    }
}

/// Companion decay and leveling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    /// Satiety lost per hour.
    #[serde(default = "default_2_f64")]
    pub hunger_per_hour: f64,
    /// Happiness lost per hour.
    #[serde(default = "default_1_f64")]
    pub happiness_decay_per_hour: f64,
    /// Satiety restored by one feeding.
    #[serde(default = "default_30_f64")]
    pub feed_satiety: f64,
    /// Happiness gained by one feeding.
    #[serde(default = "default_5_f64")]
    pub feed_happiness: f64,
    /// Happiness gained by one play session.
    #[serde(default = "default_15_f64")]
    pub play_happiness: f64,
    /// Extra happiness for fulfilling a special request.
    #[serde(default = "default_20_f64")]
    pub request_bonus_happiness: f64,
    /// XP per level step (level L→L+1 costs `xp_per_level * L`).
    #[serde(default = "default_50_u64")]
    pub xp_per_level: u64,
    /// Companion level cap.
    #[serde(default = "default_20_u32")]
    pub max_level: u32,
    /// Companion XP for one play session.
    #[serde(default = "default_5_u64")]
    pub play_xp: u64,
    /// Minimum hours between special requests.
    #[serde(default = "default_6_i64")]
    pub request_interval_hours: i64,
    /// Chance a request is raised once the interval has elapsed.
    #[serde(default = "default_0_5")]
    pub request_chance: f64,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            hunger_per_hour: 2.0,
            happiness_decay_per_hour: 1.0,
            feed_satiety: 30.0,
            feed_happiness: 5.0,
            play_happiness: 15.0,
            request_bonus_happiness: 20.0,
            xp_per_level: 50,
            max_level: 20,
            play_xp: 5,
            request_interval_hours: 6,
            request_chance: 0.5,
        }
    }
}

/// Mission cadence and slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionConfig {
    /// Daily missions drawn per day.
    #[serde(default = "default_3_usize")]
    pub daily_slots: usize,
    /// Weekly missions drawn per ISO week.
    #[serde(default = "default_2_usize")]
    pub weekly_slots: usize,
    /// UTC hour at which the daily cycle rolls over.
    #[serde(default)]
    pub daily_reset_hour: u32,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            daily_slots: 3,
            weekly_slots: 2,
            daily_reset_hour: 0,
        }
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Use WAL mode for the SQLite provider.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Number of save backups to keep.
    #[serde(default = "default_3_u32")]
    pub backup_count: u32,
    /// Detect save corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            wal_mode: true,
            backup_count: 3,
            checksum_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_house_tiers() -> Vec<HouseTier> {
    vec![
        HouseTier { xp_multiplier: 1.00, currency_multiplier: 1.00, upgrade_cost: 0 },
        HouseTier { xp_multiplier: 1.10, currency_multiplier: 1.05, upgrade_cost: 500 },
        HouseTier { xp_multiplier: 1.20, currency_multiplier: 1.10, upgrade_cost: 1_500 },
        HouseTier { xp_multiplier: 1.30, currency_multiplier: 1.15, upgrade_cost: 4_000 },
        HouseTier { xp_multiplier: 1.50, currency_multiplier: 1.25, upgrade_cost: 10_000 },
    ]
}

fn default_streak_steps() -> Vec<StreakStep> {
    vec![
        StreakStep { min_streak: 5, xp_bonus: 0.10, currency_bonus: 0.05 },
        StreakStep { min_streak: 10, xp_bonus: 0.25, currency_bonus: 0.10 },
        StreakStep { min_streak: 20, xp_bonus: 0.50, currency_bonus: 0.25 },
    ]
}

fn default_checkpoints() -> Vec<f64> { vec![0.25, 0.50, 0.75, 1.0] }
fn default_true() -> bool { true }
fn default_0_1() -> f64 { 0.1 }
fn default_0_25() -> f64 { 0.25 }
fn default_0_5() -> f64 { 0.5 }
fn default_1_f64() -> f64 { 1.0 }
fn default_2_f64() -> f64 { 2.0 }
fn default_5_f64() -> f64 { 5.0 }
fn default_10_f64() -> f64 { 10.0 }
fn default_15_f64() -> f64 { 15.0 }
fn default_20_f64() -> f64 { 20.0 }
fn default_30_f64() -> f64 { 30.0 }
fn default_60_f64() -> f64 { 60.0 }
fn default_100_f64() -> f64 { 100.0 }
fn default_2_u8() -> u8 { 2 }
fn default_3_u32() -> u32 { 3 }
fn default_5_u32() -> u32 { 5 }
fn default_20_u32() -> u32 { 20 }
fn default_100_u32() -> u32 { 100 }
fn default_150_u32() -> u32 { 150 }
fn default_max_level() -> u32 { 99 }
fn default_5_u64() -> u64 { 5 }
fn default_10_u64() -> u64 { 10 }
fn default_15_u64() -> u64 { 15 }
fn default_25_u64() -> u64 { 25 }
fn default_40_u64() -> u64 { 40 }
fn default_50_u64() -> u64 { 50 }
fn default_100_u64() -> u64 { 100 }
fn default_6_i64() -> i64 { 6 }
fn default_7_i64() -> i64 { 7 }
fn default_60_i64() -> i64 { 60 }
fn default_2_usize() -> usize { 2 }
fn default_3_usize() -> usize { 3 }
