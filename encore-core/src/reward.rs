//! Reward pipeline: turns base amounts into final XP and currency.
//!
//! The multiplier order is fixed so rewards are reproducible:
//!
//! 1. house-level multiplier (from the house table),
//! 2. active-companion ability multiplier (`XpBoost` / `CoinBoost`),
//! 3. streak step factor (from the streak table).
//!
//! Multipliers compose multiplicatively; XP and currency are floored
//! independently at the end. Computing a reward never mutates anything;
//! crediting it is the store's job.

use serde::{Deserialize, Serialize};

use crate::companion::{AbilityKind, ability_multiplier};
use crate::config::EncoreConfig;
use crate::content::ContentCatalog;
use crate::error::{EncoreError, Result};
use crate::profile::PlayerProfile;
use crate::types::GameMode;

/// Absorbs binary representation error before flooring (e.g. `0.29 * 100`).
const FLOOR_EPSILON: f64 = 1e-9;

/// One configured reward line of a mission or quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum RewardLine {
    /// Currency credited to the wallet.
    Currency(u64),
    /// Player experience.
    Xp(u64),
    /// Experience for the active companion.
    CompanionXp(u64),
}

/// What produced the reward, for streak and per-item tuning.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RewardContext {
    /// Mini-game the reward came from, if any.
    pub mode: Option<GameMode>,
    /// Current consecutive-correct streak.
    pub streak: u32,
    /// Trained item (e.g. `"P5"`); advisory only.
    pub item_id: Option<String>,
}

impl RewardContext {
    /// Context for a quiz answer.
    #[must_use]
    pub fn answer(mode: GameMode, streak: u32, item_id: Option<String>) -> Self {
        Self {
            mode: Some(mode),
            streak,
            item_id,
        }
    }
}

/// Which stage of the pipeline produced a factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplierSource {
    /// House table.
    House,
    /// Active companion ability.
    Companion,
    /// Streak table.
    Streak,
}

/// One applied factor pair, recorded in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiplierStep {
    /// Stage that produced the factors.
    pub source: MultiplierSource,
    /// Factor applied to XP.
    pub xp: f64,
    /// Factor applied to currency.
    pub currency: f64,
}

/// Final reward after all multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    /// Final XP.
    pub xp: u64,
    /// Final currency.
    pub currency: u64,
    /// Factors applied, in order.
    pub steps: Vec<MultiplierStep>,
}

impl Reward {
    /// Product of all XP factors.
    #[must_use]
    pub fn xp_multiplier(&self) -> f64 {
        self.steps.iter().map(|s| s.xp).product()
    }

    /// Product of all currency factors.
    #[must_use]
    pub fn currency_multiplier(&self) -> f64 {
        self.steps.iter().map(|s| s.currency).product()
    }
}

/// Compute the final reward for base amounts under the player's current
/// multipliers.
///
/// # Errors
/// Returns [`EncoreError::Invariant`] when the house table has no row for
/// the player's level or a factor is not a positive finite number.
pub fn compute_reward(
    base_xp: u64,
    base_currency: u64,
    context: &RewardContext,
    profile: &PlayerProfile,
    config: &EncoreConfig,
    catalog: &ContentCatalog,
) -> Result<Reward> {
    let house = config
        .house
        .tier(profile.house_level())
        .ok_or_else(|| EncoreError::invariant("house table is empty"))?;

    let streak = config.streak.step_for(context.streak);

    let steps = vec![
        MultiplierStep {
            source: MultiplierSource::House,
            xp: house.xp_multiplier,
            currency: house.currency_multiplier,
        },
        MultiplierStep {
            source: MultiplierSource::Companion,
            xp: ability_multiplier(profile, catalog, AbilityKind::XpBoost),
            currency: ability_multiplier(profile, catalog, AbilityKind::CoinBoost),
        },
        MultiplierStep {
            source: MultiplierSource::Streak,
            xp: streak.map_or(1.0, |s| 1.0 + s.xp_bonus),
            currency: streak.map_or(1.0, |s| 1.0 + s.currency_bonus),
        },
    ];

    if let Some(bad) = steps
        .iter()
        .find(|s| !(s.xp.is_finite() && s.xp > 0.0 && s.currency.is_finite() && s.currency > 0.0))
    {
        return Err(EncoreError::invariant(format!(
            "{:?} multiplier is not a positive finite number",
            bad.source
        )));
    }

    let mut reward = Reward {
        xp: 0,
        currency: 0,
        steps,
    };
    reward.xp = apply(base_xp, reward.xp_multiplier());
    reward.currency = apply(base_currency, reward.currency_multiplier());
    Ok(reward)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn apply(base: u64, multiplier: f64) -> u64 {
    let scaled = (base as f64 * multiplier + FLOOR_EPSILON).floor();
    if scaled >= u64::MAX as f64 {
        u64::MAX
    } else {
        scaled as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companion::CompanionInstance;
    use crate::types::CompanionId;
    use chrono::Utc;

    fn profile_with(house_level: u8, companion: Option<(&str, u32)>) -> PlayerProfile {
        let config = EncoreConfig::default();
        let mut profile = PlayerProfile::new(Utc::now(), 42);
        profile.set_house_level(house_level, &config.house);
        if let Some((species, level)) = companion {
            let mut c = CompanionInstance::new(CompanionId::from(species), Utc::now());
            c.level = level;
            c.active = true;
            profile.companions.insert(c.companion_id.clone(), c);
        }
        profile
    }

    #[test]
    fn no_multipliers_is_identity() {
        let config = EncoreConfig::default();
        let catalog = ContentCatalog::default();
        let profile = profile_with(0, None);
        let r = compute_reward(10, 5, &RewardContext::default(), &profile, &config, &catalog)
            .expect("reward");
        assert_eq!((r.xp, r.currency), (10, 5));
        assert_eq!(r.steps.len(), 3);
    }

    #[test]
    fn multipliers_apply_in_fixed_order() {
        let config = EncoreConfig::default();
        let catalog = ContentCatalog::default();
        // "metronome_cat" carries a level-1 XP boost of 10%.
        let profile = profile_with(2, Some(("metronome_cat", 1)));
        let ctx = RewardContext::answer(GameMode::Intervals, 5, None);
        let r = compute_reward(10, 0, &ctx, &profile, &config, &catalog).expect("reward");

        let sources: Vec<_> = r.steps.iter().map(|s| s.source).collect();
        assert_eq!(
            sources,
            vec![MultiplierSource::House, MultiplierSource::Companion, MultiplierSource::Streak]
        );
        // floor(10 * 1.20 * 1.10 * 1.10) = floor(14.52)
        assert_eq!(r.xp, 14);
    }

    #[test]
    fn currency_and_xp_floor_independently() {
        let config = EncoreConfig::default();
        let catalog = ContentCatalog::default();
        let profile = profile_with(1, None);
        let r = compute_reward(15, 15, &RewardContext::default(), &profile, &config, &catalog)
            .expect("reward");
        // 15 * 1.10 = 16.5, 15 * 1.05 = 15.75
        assert_eq!(r.xp, 16);
        assert_eq!(r.currency, 15);
    }

    #[test]
    fn pure_for_identical_inputs() {
        let config = EncoreConfig::default();
        let catalog = ContentCatalog::default();
        let profile = profile_with(3, Some(("metronome_cat", 4)));
        let ctx = RewardContext::answer(GameMode::Chords, 12, Some("maj7".into()));
        let a = compute_reward(37, 11, &ctx, &profile, &config, &catalog).expect("a");
        let b = compute_reward(37, 11, &ctx, &profile, &config, &catalog).expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn bad_table_is_an_invariant_violation() {
        let mut config = EncoreConfig::default();
        config.house.tiers[0].xp_multiplier = 0.0;
        let catalog = ContentCatalog::default();
        let profile = profile_with(0, None);
        let err = compute_reward(1, 1, &RewardContext::default(), &profile, &config, &catalog)
            .expect_err("must fail");
        assert!(matches!(err, EncoreError::Invariant { .. }));
    }

    #[test]
    fn floor_tolerates_float_noise() {
        assert_eq!(apply(100, 0.29), 29);
        assert_eq!(apply(3, 1.1), 3);
    }
}
