//! The player's persistent record.
//!
//! [`PlayerProfile`] is the single aggregate the store owns and persists.
//! Derived values (player level, relationship distance) are never stored.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::companion::CompanionInstance;
use crate::config::{EconomyConfig, HouseConfig, RelationshipConfig};
use crate::error::{Failure, Rejection};
use crate::level::level_for_xp;
use crate::mission::MissionBoard;
use crate::quest::QuestLog;
use crate::relationship::{ChildRecord, Marriage, RelationshipRecord};
use crate::types::{
    CompanionId, GameMode, KeyItems, NpcId, PlayerId, ShopItemKey, Timestamp, UnlockKey,
};

/// Longest accepted player name, in characters.
pub const MAX_NAME_LEN: usize = 24;

/// Currency and experience balances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    currency: u64,
    experience: u64,
}

/// Player level before and after an XP grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    /// Level before.
    pub from: u32,
    /// Level after.
    pub to: u32,
}

impl LevelChange {
    /// Whether at least one level was gained.
    #[must_use]
    pub fn leveled_up(&self) -> bool {
        self.to > self.from
    }
}

impl Wallet {
    /// Currency balance.
    #[must_use]
    pub fn currency(&self) -> u64 {
        self.currency
    }

    /// Total experience.
    #[must_use]
    pub fn experience(&self) -> u64 {
        self.experience
    }

    /// Level derived from total experience.
    #[must_use]
    pub fn level(&self, economy: &EconomyConfig) -> u32 {
        level_for_xp(self.experience, economy)
    }

    /// Add currency.
    pub fn credit(&mut self, amount: u64) {
        self.currency = self.currency.saturating_add(amount);
    }

    /// Remove currency, refusing to go negative.
    ///
    /// # Errors
    /// [`Rejection::InsufficientFunds`]; the balance is unchanged.
    pub fn debit(&mut self, amount: u64) -> Result<(), Rejection> {
        if amount > self.currency {
            return Err(Rejection::InsufficientFunds {
                required: amount,
                available: self.currency,
            });
        }
        self.currency -= amount;
        Ok(())
    }

    /// Add experience and report the level change.
    pub fn grant_xp(&mut self, amount: u64, economy: &EconomyConfig) -> LevelChange {
        let from = self.level(economy);
        self.experience = self.experience.saturating_add(amount);
        LevelChange {
            from,
            to: self.level(economy),
        }
    }
}

/// Everything the engine persists for one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Stable id.
    pub id: PlayerId,
    name: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Currency and XP.
    pub wallet: Wallet,
    /// Best streak ever reached per mode.
    #[serde(default)]
    pub highest_streaks: BTreeMap<GameMode, u32>,
    /// Unlocked training items.
    #[serde(default)]
    pub unlocked_items: BTreeSet<UnlockKey>,
    /// Bought shop items.
    #[serde(default)]
    pub purchases: BTreeSet<ShopItemKey>,
    /// Owned furniture ids.
    #[serde(default)]
    pub furniture: BTreeSet<String>,
    house_level: u8,
    /// Adopted companions by species.
    #[serde(default)]
    pub companions: BTreeMap<CompanionId, CompanionInstance>,
    /// Relationships by NPC; created on first interaction.
    #[serde(default)]
    pub relationships: BTreeMap<NpcId, RelationshipRecord>,
    /// Daily and weekly missions.
    #[serde(default)]
    pub missions: MissionBoard,
    /// Story quests.
    #[serde(default)]
    pub quests: QuestLog,
    /// Monster ids defeated at least once.
    #[serde(default)]
    pub defeated_monsters: BTreeSet<String>,
    /// Collected memento ids.
    #[serde(default)]
    pub mementos: BTreeSet<String>,
    /// Held romance key items.
    #[serde(default)]
    pub key_items: KeyItems,
    /// The one marriage, if any.
    #[serde(default)]
    pub marriage: Option<Marriage>,
    /// Child record, if any.
    #[serde(default)]
    pub child: Option<ChildRecord>,
    /// Last login.
    #[serde(default)]
    pub last_login: Option<Timestamp>,
    /// Last completed practice session.
    #[serde(default)]
    pub last_practice: Option<Timestamp>,
    /// Last busking session; drives the cooldown.
    #[serde(default)]
    pub last_busking: Option<Timestamp>,
    /// Seed for mission draws and companion requests.
    pub rng_seed: u64,
}

impl PlayerProfile {
    /// Fresh profile at house level 0 with empty balances.
    #[must_use]
    pub fn new(now: Timestamp, rng_seed: u64) -> Self {
        Self {
            id: PlayerId::new(),
            name: None,
            created_at: now,
            wallet: Wallet::default(),
            highest_streaks: BTreeMap::new(),
            unlocked_items: BTreeSet::new(),
            purchases: BTreeSet::new(),
            furniture: BTreeSet::new(),
            house_level: 0,
            companions: BTreeMap::new(),
            relationships: BTreeMap::new(),
            missions: MissionBoard::default(),
            quests: QuestLog::default(),
            defeated_monsters: BTreeSet::new(),
            mementos: BTreeSet::new(),
            key_items: KeyItems::default(),
            marriage: None,
            child: None,
            last_login: None,
            last_practice: None,
            last_busking: None,
            rng_seed,
        }
    }

    /// Chosen player name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the player name once.
    ///
    /// # Errors
    /// [`Rejection::NameAlreadySet`] or [`Rejection::InvalidName`] for an
    /// empty or overlong name.
    pub fn set_name(&mut self, name: &str) -> Result<(), Rejection> {
        if self.name.is_some() {
            return Err(Rejection::NameAlreadySet);
        }
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LEN {
            return Err(Rejection::InvalidName);
        }
        self.name = Some(trimmed.to_string());
        Ok(())
    }

    /// Current house level.
    #[must_use]
    pub fn house_level(&self) -> u8 {
        self.house_level
    }

    /// Set the house level, clamped to the table.
    pub fn set_house_level(&mut self, level: u8, house: &HouseConfig) {
        self.house_level = level.min(house.max_level());
    }

    /// Level derived from XP.
    #[must_use]
    pub fn level(&self, economy: &EconomyConfig) -> u32 {
        self.wallet.level(economy)
    }

    /// Remember the highest streak per mode. Returns `true` on a new best.
    pub fn record_streak(&mut self, mode: GameMode, streak: u32) -> bool {
        let best = self.highest_streaks.entry(mode).or_insert(0);
        if streak > *best {
            *best = streak;
            true
        } else {
            false
        }
    }

    /// Spouse id, if married.
    #[must_use]
    pub fn spouse(&self) -> Option<&NpcId> {
        self.marriage.as_ref().map(|m| &m.spouse)
    }

    /// Relationship with `npc`, creating a Neutral one on first contact.
    ///
    /// # Errors
    /// [`Failure::Internal`] when the configured friend cap is zero.
    pub fn relationship_mut(
        &mut self,
        npc: &NpcId,
        config: &RelationshipConfig,
    ) -> Result<&mut RelationshipRecord, Failure> {
        if !self.relationships.contains_key(npc) {
            let record = RelationshipRecord::new(npc.clone(), config)?;
            self.relationships.insert(npc.clone(), record);
        }
        self.relationships
            .get_mut(npc)
            .ok_or_else(|| crate::error::EncoreError::invariant("relationship vanished").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn debit_never_goes_negative() {
        let mut wallet = Wallet::default();
        wallet.credit(30);
        assert_eq!(
            wallet.debit(31),
            Err(Rejection::InsufficientFunds {
                required: 31,
                available: 30
            })
        );
        assert_eq!(wallet.currency(), 30);
        wallet.debit(30).expect("exact balance");
        assert_eq!(wallet.currency(), 0);
    }

    #[test]
    fn level_is_derived_from_xp() {
        let economy = EconomyConfig::default();
        let mut wallet = Wallet::default();
        assert_eq!(wallet.level(&economy), 1);
        let change = wallet.grant_xp(100, &economy);
        assert!(change.leveled_up());
        assert_eq!(change, LevelChange { from: 1, to: 2 });
        assert!(!wallet.grant_xp(10, &economy).leveled_up());
    }

    #[test]
    fn name_is_set_once() {
        let mut profile = PlayerProfile::new(Utc::now(), 0);
        assert_eq!(profile.set_name("   "), Err(Rejection::InvalidName));
        assert_eq!(profile.set_name(&"x".repeat(MAX_NAME_LEN + 1)), Err(Rejection::InvalidName));
        profile.set_name("  Aria ").expect("name");
        assert_eq!(profile.name(), Some("Aria"));
        assert_eq!(profile.set_name("Bea"), Err(Rejection::NameAlreadySet));
    }

    #[test]
    fn house_level_is_clamped() {
        let house = HouseConfig::default();
        let mut profile = PlayerProfile::new(Utc::now(), 0);
        profile.set_house_level(200, &house);
        assert_eq!(profile.house_level(), house.max_level());
    }

    #[test]
    fn streaks_keep_the_best() {
        let mut profile = PlayerProfile::new(Utc::now(), 0);
        assert!(profile.record_streak(GameMode::Notes, 7));
        assert!(!profile.record_streak(GameMode::Notes, 3));
        assert_eq!(profile.highest_streaks.get(&GameMode::Notes), Some(&7));
    }

    #[test]
    fn relationships_are_created_lazily() {
        let config = RelationshipConfig::default();
        let mut profile = PlayerProfile::new(Utc::now(), 0);
        let npc = NpcId::from("mira");
        assert!(profile.relationships.is_empty());
        profile.relationship_mut(&npc, &config).expect("record").gain_rp(
            5,
            crate::relationship::RpSource::Talk,
            Utc::now(),
            &config,
        );
        assert_eq!(profile.relationships.get(&npc).map(RelationshipRecord::rp), Some(5));
    }
}
