//! Companion (pet) subsystem: adoption, care, leveling, passive decay and
//! the ability multipliers consumed by the reward pipeline.
//!
//! Decay is the only passive, time-driven mutation in the engine. It is a
//! pure function of the time elapsed since `last_decay`, so it can run lazily
//! on the next event and is idempotent for a repeated `now`.

use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompanionConfig;
use crate::content::ContentCatalog;
use crate::error::Rejection;
use crate::profile::PlayerProfile;
use crate::types::{CompanionId, Timestamp, mix_seed};

const STAT_MAX: f64 = 100.0;

/// Which resource a companion ability boosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    /// Multiplies player XP rewards.
    XpBoost,
    /// Multiplies currency rewards.
    CoinBoost,
}

/// A level-scaled ability carried by a species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    /// Resource boosted.
    pub kind: AbilityKind,
    /// Bonus at level 1 (0.10 = +10%).
    pub base_bonus: f64,
    /// Extra bonus per level above 1.
    pub per_level_bonus: f64,
    /// Upper bound on the bonus.
    pub max_bonus: f64,
}

impl Ability {
    /// Multiplier at the given companion level.
    #[must_use]
    pub fn multiplier_at(&self, level: u32) -> f64 {
        let scaled = self.base_bonus + self.per_level_bonus * f64::from(level.saturating_sub(1));
        1.0 + scaled.min(self.max_bonus).max(0.0)
    }
}

/// Static definition of an adoptable companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionSpecies {
    /// Species id; also the key of the adopted instance.
    pub id: CompanionId,
    /// Display name.
    pub name: String,
    /// Adoption price.
    pub cost: u64,
    /// Optional reward ability.
    #[serde(default)]
    pub ability: Option<Ability>,
}

/// Optional visual attributes chosen by the player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customization {
    /// Player-chosen name.
    pub nickname: Option<String>,
    /// Coat / feather color.
    pub color: Option<String>,
    /// Worn accessory id.
    pub accessory: Option<String>,
}

/// Something the companion is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Wants to be fed.
    Treat,
    /// Wants to play.
    Play,
    /// Wants to listen to a practice session.
    Practice,
}

const REQUEST_KINDS: [RequestKind; 3] = [RequestKind::Treat, RequestKind::Play, RequestKind::Practice];

/// An outstanding special request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// What is being asked for.
    pub kind: RequestKind,
    /// When it was raised.
    pub raised_at: Timestamp,
}

/// An adopted companion. Never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionInstance {
    /// Species id.
    pub companion_id: CompanionId,
    /// Current level (starts at 1).
    pub level: u32,
    /// XP accumulated inside the current level.
    pub experience: u64,
    /// Happiness, 0–100.
    pub happiness: f64,
    /// Satiety, 0–100 (0 = starving).
    pub satiety: f64,
    /// Visual attributes.
    #[serde(default)]
    pub customization: Option<Customization>,
    /// Adoption time.
    pub adopted_at: Timestamp,
    /// Last feed/play/practice.
    pub last_interaction: Timestamp,
    /// Time up to which decay has been applied.
    pub last_decay: Timestamp,
    /// Last request time-bucket that was rolled.
    #[serde(default)]
    pub last_request_bucket: Option<i64>,
    /// Outstanding special request.
    #[serde(default)]
    pub pending_request: Option<PendingRequest>,
    /// Whether this is the player's active companion.
    pub active: bool,
}

impl CompanionInstance {
    /// Fresh companion at level 1 with full stats.
    #[must_use]
    pub fn new(companion_id: CompanionId, now: Timestamp) -> Self {
        Self {
            companion_id,
            level: 1,
            experience: 0,
            happiness: STAT_MAX,
            satiety: STAT_MAX,
            customization: None,
            adopted_at: now,
            last_interaction: now,
            last_decay: now,
            last_request_bucket: None,
            pending_request: None,
            active: false,
        }
    }

    /// Display name: nickname if set, else the species id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.customization
            .as_ref()
            .and_then(|c| c.nickname.as_deref())
            .unwrap_or(self.companion_id.as_str())
    }

    /// Raise satiety and happiness. Returns a fulfilled request, if any.
    pub fn feed(&mut self, now: Timestamp, config: &CompanionConfig) -> Option<RequestKind> {
        self.satiety = (self.satiety + config.feed_satiety).min(STAT_MAX);
        self.add_happiness(config.feed_happiness);
        self.last_interaction = now;
        self.fulfil(RequestKind::Treat, config)
    }

    /// Raise happiness. Returns a fulfilled request, if any.
    pub fn play(&mut self, now: Timestamp, config: &CompanionConfig) -> Option<RequestKind> {
        self.add_happiness(config.play_happiness);
        self.last_interaction = now;
        self.fulfil(RequestKind::Play, config)
    }

    /// Companion listened to a practice session.
    pub fn practiced(&mut self, now: Timestamp, config: &CompanionConfig) -> Option<RequestKind> {
        self.last_interaction = now;
        self.fulfil(RequestKind::Practice, config)
    }

    /// Add XP and level up. Returns the number of levels gained.
    pub fn grant_xp(&mut self, amount: u64, config: &CompanionConfig) -> u32 {
        let start = self.level;
        self.experience = self.experience.saturating_add(amount);
        while self.level < config.max_level {
            let cost = config.xp_per_level.saturating_mul(u64::from(self.level));
            if self.experience < cost {
                break;
            }
            self.experience -= cost;
            self.level += 1;
        }
        self.level - start
    }

    /// Apply decay for the time elapsed since the last update and possibly
    /// raise a special request. Returns a newly raised request.
    ///
    /// Calling this again with the same `now` changes nothing.
    pub fn periodic_update(
        &mut self,
        now: Timestamp,
        config: &CompanionConfig,
        seed: u64,
    ) -> Option<RequestKind> {
        if now > self.last_decay {
            let hours = hours_between(self.last_decay, now);
            self.satiety = (self.satiety - config.hunger_per_hour * hours).clamp(0.0, STAT_MAX);
            self.happiness =
                (self.happiness - config.happiness_decay_per_hour * hours).clamp(0.0, STAT_MAX);
            self.last_decay = now;
        }
        self.roll_request(now, config, seed)
    }

    fn roll_request(
        &mut self,
        now: Timestamp,
        config: &CompanionConfig,
        seed: u64,
    ) -> Option<RequestKind> {
        if self.pending_request.is_some() || config.request_interval_hours <= 0 {
            return None;
        }
        let bucket_secs = Duration::hours(config.request_interval_hours).num_seconds();
        let bucket = now.timestamp().div_euclid(bucket_secs);
        if self.last_request_bucket.is_some_and(|last| bucket <= last) {
            return None;
        }
        // The first bucket after adoption is skipped so a new pet does not
        // demand something immediately.
        let adopted_bucket = self.adopted_at.timestamp().div_euclid(bucket_secs);
        self.last_request_bucket = Some(bucket);
        if bucket <= adopted_bucket {
            return None;
        }

        let salt = format!("{}:{bucket}", self.companion_id);
        let mut rng = StdRng::seed_from_u64(mix_seed(seed, &salt));
        let chance = if config.request_chance.is_nan() {
            0.0
        } else {
            config.request_chance.clamp(0.0, 1.0)
        };
        if !rng.gen_bool(chance) {
            return None;
        }
        let kind = REQUEST_KINDS[rng.gen_range(0..REQUEST_KINDS.len())];
        self.pending_request = Some(PendingRequest {
            kind,
            raised_at: now,
        });
        debug!(companion = %self.companion_id, ?kind, "Companion raised a special request");
        Some(kind)
    }

    fn add_happiness(&mut self, amount: f64) {
        self.happiness = (self.happiness + amount).clamp(0.0, STAT_MAX);
    }

    fn fulfil(&mut self, kind: RequestKind, config: &CompanionConfig) -> Option<RequestKind> {
        match self.pending_request {
            Some(req) if req.kind == kind => {
                self.pending_request = None;
                self.add_happiness(config.request_bonus_happiness);
                Some(kind)
            }
            _ => None,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn hours_between(from: Timestamp, to: Timestamp) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

// ---------------------------------------------------------------------------
// Profile-level operations
// ---------------------------------------------------------------------------

/// Adopt a companion: charge its cost and add it; the first companion
/// becomes active.
///
/// # Errors
/// [`Rejection::AlreadyOwned`] or [`Rejection::InsufficientFunds`]; the
/// profile is untouched in both cases.
pub fn adopt(
    profile: &mut PlayerProfile,
    species: &CompanionSpecies,
    now: Timestamp,
) -> Result<(), Rejection> {
    if profile.companions.contains_key(&species.id) {
        return Err(Rejection::AlreadyOwned);
    }
    profile.wallet.debit(species.cost)?;

    let mut instance = CompanionInstance::new(species.id.clone(), now);
    instance.active = profile.companions.is_empty();
    profile.companions.insert(species.id.clone(), instance);
    Ok(())
}

/// Make `id` the only active companion.
///
/// # Errors
/// [`Rejection::CompanionNotOwned`] if the companion was never adopted.
pub fn set_active(profile: &mut PlayerProfile, id: &CompanionId) -> Result<(), Rejection> {
    if !profile.companions.contains_key(id) {
        return Err(Rejection::CompanionNotOwned);
    }
    for (key, companion) in &mut profile.companions {
        companion.active = key == id;
    }
    Ok(())
}

/// Replace a companion's visual attributes.
///
/// # Errors
/// [`Rejection::CompanionNotOwned`], or [`Rejection::InvalidName`] for a
/// blank nickname.
pub fn customize(
    profile: &mut PlayerProfile,
    id: &CompanionId,
    customization: Customization,
) -> Result<(), Rejection> {
    let companion = profile
        .companions
        .get_mut(id)
        .ok_or(Rejection::CompanionNotOwned)?;
    if customization.nickname.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(Rejection::InvalidName);
    }
    companion.customization = Some(customization);
    Ok(())
}

/// The active companion, if any.
#[must_use]
pub fn active_companion(profile: &PlayerProfile) -> Option<&CompanionInstance> {
    profile.companions.values().find(|c| c.active)
}

/// Mutable access to the active companion, if any.
pub fn active_companion_mut(profile: &mut PlayerProfile) -> Option<&mut CompanionInstance> {
    profile.companions.values_mut().find(|c| c.active)
}

/// Ability multiplier of the active companion for `kind`; `1.0` when there
/// is no active companion or its species has no matching ability.
#[must_use]
pub fn ability_multiplier(profile: &PlayerProfile, catalog: &ContentCatalog, kind: AbilityKind) -> f64 {
    active_companion(profile)
        .and_then(|c| {
            catalog
                .companion(&c.companion_id)
                .and_then(|s| s.ability)
                .filter(|a| a.kind == kind)
                .map(|a| a.multiplier_at(c.level))
        })
        .unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid time")
    }

    fn species(id: &str, cost: u64) -> CompanionSpecies {
        CompanionSpecies {
            id: CompanionId::from(id),
            name: id.to_string(),
            cost,
            ability: None,
        }
    }

    #[test]
    fn adopt_rejects_insufficient_funds() {
        let mut profile = PlayerProfile::new(t0(), 1);
        let result = adopt(&mut profile, &species("owl", 100), t0());
        assert_eq!(
            result,
            Err(Rejection::InsufficientFunds {
                required: 100,
                available: 0
            })
        );
        assert_eq!(profile.wallet.currency(), 0);
        assert!(profile.companions.is_empty());
    }

    #[test]
    fn first_adoption_becomes_active() {
        let mut profile = PlayerProfile::new(t0(), 1);
        profile.wallet.credit(500);
        adopt(&mut profile, &species("owl", 100), t0()).expect("adopt owl");
        adopt(&mut profile, &species("fox", 100), t0()).expect("adopt fox");
        assert_eq!(profile.wallet.currency(), 300);
        assert_eq!(active_companion(&profile).map(|c| c.companion_id.as_str()), Some("owl"));
        assert_eq!(
            adopt(&mut profile, &species("owl", 100), t0()),
            Err(Rejection::AlreadyOwned)
        );
    }

    #[test]
    fn set_active_keeps_single_active() {
        let mut profile = PlayerProfile::new(t0(), 1);
        profile.wallet.credit(500);
        adopt(&mut profile, &species("owl", 10), t0()).expect("owl");
        adopt(&mut profile, &species("fox", 10), t0()).expect("fox");
        set_active(&mut profile, &CompanionId::from("fox")).expect("activate");
        assert_eq!(profile.companions.values().filter(|c| c.active).count(), 1);
        assert_eq!(
            set_active(&mut profile, &CompanionId::from("cat")),
            Err(Rejection::CompanionNotOwned)
        );
    }

    #[test]
    fn customize_sets_nickname() {
        let mut profile = PlayerProfile::new(t0(), 1);
        profile.wallet.credit(10);
        adopt(&mut profile, &species("owl", 10), t0()).expect("owl");
        let owl = CompanionId::from("owl");
        let blank = Customization {
            nickname: Some("  ".into()),
            ..Customization::default()
        };
        assert_eq!(customize(&mut profile, &owl, blank), Err(Rejection::InvalidName));
        let named = Customization {
            nickname: Some("Hoot".into()),
            ..Customization::default()
        };
        customize(&mut profile, &owl, named).expect("customize");
        assert_eq!(profile.companions[&owl].display_name(), "Hoot");
        assert_eq!(
            customize(&mut profile, &CompanionId::from("cat"), Customization::default()),
            Err(Rejection::CompanionNotOwned)
        );
    }

    #[test]
    fn decay_is_idempotent_for_same_now() {
        let config = CompanionConfig::default();
        let mut once = CompanionInstance::new(CompanionId::from("owl"), t0());
        let later = t0() + Duration::hours(10);
        once.periodic_update(later, &config, 9);
        let mut twice = CompanionInstance::new(CompanionId::from("owl"), t0());
        twice.periodic_update(later, &config, 9);
        twice.periodic_update(later, &config, 9);
        assert_eq!(once, twice);
        assert!((once.satiety - 80.0).abs() < 1e-9);
        assert!((once.happiness - 90.0).abs() < 1e-9);
    }

    #[test]
    fn split_decay_matches_single_decay() {
        let config = CompanionConfig::default();
        let mut split = CompanionInstance::new(CompanionId::from("owl"), t0());
        split.periodic_update(t0() + Duration::hours(3), &config, 9);
        split.periodic_update(t0() + Duration::hours(70), &config, 9);
        let mut single = CompanionInstance::new(CompanionId::from("owl"), t0());
        single.periodic_update(t0() + Duration::hours(70), &config, 9);
        assert!((split.satiety - single.satiety).abs() < 1e-9);
        assert!((split.happiness - single.happiness).abs() < 1e-9);
        assert!(single.satiety.abs() < 1e-9, "70h of hunger empties satiety");
    }

    #[test]
    fn requests_are_time_gated() {
        let config = CompanionConfig {
            request_chance: 1.0,
            ..CompanionConfig::default()
        };
        let mut pet = CompanionInstance::new(CompanionId::from("owl"), t0());
        assert!(pet.periodic_update(t0(), &config, 3).is_none());
        let raised = pet.periodic_update(t0() + Duration::hours(7), &config, 3);
        assert!(raised.is_some());
        assert!(pet.periodic_update(t0() + Duration::hours(20), &config, 3).is_none());

        let kind = pet.pending_request.expect("pending").kind;
        let fulfilled = match kind {
            RequestKind::Treat => pet.feed(t0() + Duration::hours(21), &config),
            RequestKind::Play => pet.play(t0() + Duration::hours(21), &config),
            RequestKind::Practice => pet.practiced(t0() + Duration::hours(21), &config),
        };
        assert_eq!(fulfilled, Some(kind));
        assert!(pet.pending_request.is_none());
    }

    #[test]
    fn grant_xp_levels_up_and_caps() {
        let config = CompanionConfig {
            max_level: 3,
            ..CompanionConfig::default()
        };
        let mut pet = CompanionInstance::new(CompanionId::from("owl"), t0());
        // 50 for 1→2, 100 for 2→3
        assert_eq!(pet.grant_xp(49, &config), 0);
        assert_eq!(pet.grant_xp(1, &config), 1);
        assert_eq!(pet.grant_xp(10_000, &config), 1);
        assert_eq!(pet.level, 3);
    }

    #[test]
    fn ability_multiplier_neutral_without_match() {
        let catalog = ContentCatalog::default();
        let mut profile = PlayerProfile::new(t0(), 1);
        assert!((ability_multiplier(&profile, &catalog, AbilityKind::XpBoost) - 1.0).abs() < f64::EPSILON);

        let mut cat = CompanionInstance::new(CompanionId::from("metronome_cat"), t0());
        cat.active = true;
        cat.level = 3;
        profile.companions.insert(cat.companion_id.clone(), cat);
        let xp = ability_multiplier(&profile, &catalog, AbilityKind::XpBoost);
        let coins = ability_multiplier(&profile, &catalog, AbilityKind::CoinBoost);
        assert!(xp > 1.10);
        assert!((coins - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ability_bonus_is_capped() {
        let ability = Ability {
            kind: AbilityKind::CoinBoost,
            base_bonus: 0.1,
            per_level_bonus: 0.05,
            max_bonus: 0.3,
        };
        assert!((ability.multiplier_at(1) - 1.1).abs() < 1e-9);
        assert!((ability.multiplier_at(50) - 1.3).abs() < 1e-9);
    }
}
