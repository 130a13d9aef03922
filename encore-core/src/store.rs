//! The player state store: the only writer of [`PlayerProfile`].
//!
//! Every mutation goes through [`PlayerStateStore::apply_event`], which
//!
//! 1. clones the profile into a draft,
//! 2. catches up lazy time effects (mission rotation, companion decay and
//!    requests, marriage decay),
//! 3. applies the event in a fixed order (reward, then progress fan-out,
//!    then companion and relationship effects, then notifications),
//! 4. swaps the draft in and writes it through to the provider.
//!
//! A rejected event leaves the profile exactly as it was. An internal
//! error does the same and surfaces as `Err`. A failed save keeps the
//! in-memory mutation, marks persistence stale and logs a warning; the
//! next successful save clears the flag.

use chrono::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::companion::{self, Customization, active_companion_mut};
use crate::config::EncoreConfig;
use crate::content::ContentCatalog;
use crate::error::{EncoreError, Failure, Rejection, Result};
use crate::event::GameEvent;
use crate::level;
use crate::mission::{self, MissionEvent};
use crate::notification::{Notification, NotificationId, NotificationKind, NotificationQueue};
use crate::persistence::PersistenceProvider;
use crate::profile::PlayerProfile;
use crate::quest::QuestTrigger;
use crate::relationship::{
    ChildRecord, RelationshipStatus, RelationshipView, RpChange, RpSource, check_child_gates,
};
use crate::reward::{Reward, RewardContext, RewardLine, compute_reward};
use crate::types::{
    CompanionId, GameMode, KeyItem, MissionId, NpcId, QuestId, Timestamp,
};

/// Result of an accepted or rejected event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outcome {
    /// Why the event was refused; `None` when it was applied.
    pub rejection: Option<Rejection>,
    /// Notifications queued by the event.
    pub notifications: Vec<NotificationId>,
    /// Whether the write-through save succeeded.
    pub persisted: bool,
}

impl Outcome {
    fn rejected(rejection: Rejection) -> Self {
        Self {
            rejection: Some(rejection),
            ..Self::default()
        }
    }

    /// Whether the event was applied.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Owns the profile, its notification queue and the persistence handle.
pub struct PlayerStateStore<P: PersistenceProvider, C: Clock> {
    provider: P,
    clock: C,
    config: EncoreConfig,
    catalog: ContentCatalog,
    profile: PlayerProfile,
    notifications: NotificationQueue,
    persistence_stale: bool,
}

impl<P: PersistenceProvider, C: Clock> std::fmt::Debug for PlayerStateStore<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerStateStore")
            .field("player", &self.profile.id)
            .field("pending_notifications", &self.notifications.len())
            .field("persistence_stale", &self.persistence_stale)
            .finish_non_exhaustive()
    }
}

impl<P: PersistenceProvider, C: Clock> PlayerStateStore<P, C> {
    /// Validate the tables, load the saved profile (or start a fresh one)
    /// and return a ready store.
    ///
    /// # Errors
    /// Invalid config or content, or a storage fault while loading.
    pub fn open(provider: P, clock: C, config: EncoreConfig, catalog: ContentCatalog) -> Result<Self> {
        config.validate()?;
        catalog.validate()?;
        let now = clock.now();
        let (profile, fresh) = match provider.load()? {
            Some(profile) => (profile, false),
            None => (PlayerProfile::new(now, rand::random()), true),
        };
        info!(player = %profile.id, fresh, "Player state store opened");

        let mut store = Self {
            provider,
            clock,
            config,
            catalog,
            profile,
            notifications: NotificationQueue::new(),
            persistence_stale: false,
        };
        if fresh {
            store.persist();
        }
        Ok(store)
    }

    /// Read-only view of the profile.
    #[must_use]
    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }

    /// Tuning in use.
    #[must_use]
    pub fn config(&self) -> &EncoreConfig {
        &self.config
    }

    /// Content in use.
    #[must_use]
    pub fn catalog(&self) -> &ContentCatalog {
        &self.catalog
    }

    /// Pending notifications, oldest first.
    pub fn notifications(&self) -> impl Iterator<Item = &Notification> + '_ {
        self.notifications.pending()
    }

    /// Dismiss a notification. Returns `false` for an unknown id.
    pub fn dismiss_notification(&mut self, id: NotificationId) -> bool {
        self.notifications.dismiss(id)
    }

    /// Whether the last save failed and storage is behind memory.
    #[must_use]
    pub fn is_persistence_stale(&self) -> bool {
        self.persistence_stale
    }

    /// Presentation view of a relationship, if the player has met the NPC.
    #[must_use]
    pub fn relationship_view(&self, npc: &NpcId) -> Option<RelationshipView> {
        let now = self.clock.now();
        self.profile
            .relationships
            .get(npc)
            .map(|r| r.view(now, &self.config.relationship))
    }

    /// Retry the save; useful after a stale write.
    ///
    /// # Errors
    /// The provider's error, with the stale flag left set.
    pub fn flush(&mut self) -> Result<()> {
        match self.provider.save(&self.profile) {
            Ok(()) => {
                self.persistence_stale = false;
                Ok(())
            }
            Err(e) => {
                self.persistence_stale = true;
                Err(e)
            }
        }
    }

    /// Apply one event atomically.
    ///
    /// # Errors
    /// Internal errors only; rejections are reported inside [`Outcome`].
    pub fn apply_event(&mut self, event: GameEvent) -> Result<Outcome> {
        let now = self.clock.now();
        let name = event.name();
        let mut txn = Txn {
            profile: self.profile.clone(),
            config: &self.config,
            catalog: &self.catalog,
            now,
            notes: Vec::new(),
        };

        let applied = txn.catch_up().and_then(|()| txn.apply(event));
        match applied {
            Ok(()) => {}
            Err(Failure::Rejected(rejection)) => {
                debug!(event = name, %rejection, "Event rejected");
                return Ok(Outcome::rejected(rejection));
            }
            Err(Failure::Internal(e)) => {
                error!(event = name, error = %e, "Event aborted; profile unchanged");
                return Err(e);
            }
        }

        let Txn { profile, notes, .. } = txn;
        self.profile = profile;
        let notifications = notes
            .into_iter()
            .map(|kind| self.notifications.push(kind, now))
            .collect();
        let persisted = self.persist();
        debug!(event = name, persisted, "Event applied");
        Ok(Outcome {
            rejection: None,
            notifications,
            persisted,
        })
    }

    fn persist(&mut self) -> bool {
        match self.provider.save(&self.profile) {
            Ok(()) => {
                if self.persistence_stale {
                    info!(player = %self.profile.id, "Persistence caught up");
                }
                self.persistence_stale = false;
                true
            }
            Err(e) => {
                warn!(player = %self.profile.id, error = %e, "Save failed; keeping in-memory state");
                self.persistence_stale = true;
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Convenience wrappers
    // ------------------------------------------------------------------

    /// Record a graded answer.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn record_answer(
        &mut self,
        mode: GameMode,
        correct: bool,
        streak: u32,
        item_id: Option<String>,
    ) -> Result<Outcome> {
        self.apply_event(GameEvent::AnswerRecorded {
            mode,
            correct,
            streak,
            item_id,
        })
    }

    /// Record a finished practice session.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn complete_practice(&mut self, mode: Option<GameMode>) -> Result<Outcome> {
        self.apply_event(GameEvent::PracticeCompleted { mode })
    }

    /// Busk for coins.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn busk(&mut self) -> Result<Outcome> {
        self.apply_event(GameEvent::Busk)
    }

    /// Claim a completed mission.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn claim_mission_reward(&mut self, mission: MissionId) -> Result<Outcome> {
        self.apply_event(GameEvent::ClaimMission { mission })
    }

    /// Adopt a companion.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn adopt(&mut self, companion: CompanionId) -> Result<Outcome> {
        self.apply_event(GameEvent::AdoptCompanion { companion })
    }

    /// Feed the active companion.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn feed_companion(&mut self) -> Result<Outcome> {
        self.apply_event(GameEvent::FeedCompanion)
    }

    /// Play with the active companion.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn play_with_companion(&mut self) -> Result<Outcome> {
        self.apply_event(GameEvent::PlayWithCompanion)
    }

    /// Change a companion's looks.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn customize_companion(&mut self, companion: CompanionId, customization: Customization) -> Result<Outcome> {
        self.apply_event(GameEvent::CustomizeCompanion {
            companion,
            customization,
        })
    }

    /// Talk to an NPC.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn talk_to(&mut self, npc: NpcId) -> Result<Outcome> {
        self.apply_event(GameEvent::TalkToNpc { npc })
    }

    /// Give a gift.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn give_gift(&mut self, npc: NpcId, gift: impl Into<String>) -> Result<Outcome> {
        self.apply_event(GameEvent::GiveGift {
            npc,
            gift: gift.into(),
        })
    }

    /// Change RP directly.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn gain_rp(&mut self, npc: NpcId, amount: i64, source: RpSource) -> Result<Outcome> {
        self.apply_event(GameEvent::GainRp { npc, amount, source })
    }

    /// Confess to an NPC.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn confess(&mut self, npc: NpcId) -> Result<Outcome> {
        self.apply_event(GameEvent::Confess { npc })
    }

    /// Propose to an NPC.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn propose(&mut self, npc: NpcId) -> Result<Outcome> {
        self.apply_event(GameEvent::Propose { npc })
    }

    /// Start a quest.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn start_quest(&mut self, quest: QuestId) -> Result<Outcome> {
        self.apply_event(GameEvent::StartQuest { quest })
    }

    /// Claim a completed quest.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn complete_quest(&mut self, quest: QuestId) -> Result<Outcome> {
        self.apply_event(GameEvent::CompleteQuest { quest })
    }

    /// Apply catch-up effects only.
    ///
    /// # Errors
    /// See [`apply_event`](Self::apply_event).
    pub fn tick(&mut self) -> Result<Outcome> {
        self.apply_event(GameEvent::Tick)
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A draft profile plus the notifications it has produced so far.
struct Txn<'a> {
    profile: PlayerProfile,
    config: &'a EncoreConfig,
    catalog: &'a ContentCatalog,
    now: Timestamp,
    notes: Vec<NotificationKind>,
}

type Step = std::result::Result<(), Failure>;

impl Txn<'_> {
    fn catch_up(&mut self) -> Step {
        let report = mission::refresh_missions(
            &mut self.profile.missions,
            self.now,
            &self.catalog.missions,
            &self.config.missions,
            self.profile.rng_seed,
        )?;
        for rotated in report.rotated {
            self.notes.push(NotificationKind::MissionsRefreshed {
                cadence: rotated.cadence,
                cycle: rotated.cycle,
            });
        }

        let seed = self.profile.rng_seed;
        for pet in self.profile.companions.values_mut() {
            if let Some(request) = pet.periodic_update(self.now, &self.config.companion, seed) {
                self.notes.push(NotificationKind::CompanionRequest {
                    companion: pet.companion_id.clone(),
                    request,
                });
            }
        }

        if let Some(marriage) = self.profile.marriage.as_mut() {
            marriage.decay(self.now, &self.config.relationship);
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn apply(&mut self, event: GameEvent) -> Step {
        let catalog = self.catalog;
        let config = self.config;
        match event {
            GameEvent::SetName { name } => self.profile.set_name(&name)?,
            GameEvent::Login => self.profile.last_login = Some(self.now),
            GameEvent::AnswerRecorded {
                mode,
                correct,
                streak,
                item_id,
            } => {
                self.profile.record_streak(mode, streak);
                if correct {
                    let context = RewardContext::answer(mode, streak, item_id);
                    self.grant(config.economy.answer_xp, config.economy.answer_currency, &context)?;
                    self.missions(MissionEvent::CorrectAnswer(mode), 1);
                    self.missions(MissionEvent::Streak(mode), streak);
                    self.quests(&QuestTrigger::AnswerCorrectly { mode: Some(mode) }, 1);
                }
            }
            GameEvent::PracticeCompleted { mode } => {
                let context = RewardContext {
                    mode,
                    ..RewardContext::default()
                };
                self.grant(config.economy.practice_xp, 0, &context)?;
                self.profile.last_practice = Some(self.now);
                self.missions(MissionEvent::Practice, 1);
                if let Some(pet) = active_companion_mut(&mut self.profile) {
                    let fulfilled = pet.practiced(self.now, &config.companion);
                    let id = pet.companion_id.clone();
                    self.request_fulfilled(&id, fulfilled);
                    self.companion_xp(config.economy.practice_companion_xp);
                }
            }
            GameEvent::Busk => {
                let cooldown = Duration::minutes(config.economy.busking_cooldown_minutes);
                if let Some(ready_at) = self
                    .profile
                    .last_busking
                    .map(|last| last + cooldown)
                    .filter(|ready_at| self.now < *ready_at)
                {
                    return Err(Rejection::OnCooldown { ready_at }.into());
                }
                self.grant(0, config.economy.busking_currency, &RewardContext::default())?;
                self.profile.last_busking = Some(self.now);
                self.missions(MissionEvent::Busked, 1);
            }
            GameEvent::MonsterDefeated {
                monster,
                base_xp,
                base_currency,
            } => {
                self.grant(base_xp, base_currency, &RewardContext::default())?;
                self.profile.defeated_monsters.insert(monster.clone());
                self.missions(MissionEvent::MonsterDefeated, 1);
                self.quests(&QuestTrigger::Defeat { monster }, 1);
            }
            GameEvent::MementoCollected { memento } => {
                if !self.profile.mementos.insert(memento.clone()) {
                    return Err(Rejection::AlreadyOwned.into());
                }
                self.quests(&QuestTrigger::Collect { memento }, 1);
            }
            GameEvent::KeyItemAcquired { item } => {
                if self.profile.key_items.has(item) {
                    return Err(Rejection::AlreadyOwned.into());
                }
                self.profile.key_items.set(item, true);
            }
            GameEvent::UnlockTrainingItem { key, cost } => {
                if self.profile.unlocked_items.contains(&key) {
                    return Err(Rejection::AlreadyOwned.into());
                }
                self.profile.wallet.debit(cost)?;
                self.profile.unlocked_items.insert(key);
            }
            GameEvent::PurchaseShopItem { key, price } => {
                if self.profile.purchases.contains(&key) {
                    return Err(Rejection::AlreadyOwned.into());
                }
                self.profile.wallet.debit(price)?;
                self.profile.purchases.insert(key);
            }
            GameEvent::BuyFurniture { id, price } => {
                if self.profile.furniture.contains(&id) {
                    return Err(Rejection::AlreadyOwned.into());
                }
                self.profile.wallet.debit(price)?;
                self.profile.furniture.insert(id);
            }
            GameEvent::UpgradeHouse => {
                let current = self.profile.house_level();
                if current >= config.house.max_level() {
                    return Err(Rejection::HouseAtMaxLevel.into());
                }
                let next = current + 1;
                let cost = config
                    .house
                    .tier(next)
                    .map(|t| t.upgrade_cost)
                    .ok_or_else(|| EncoreError::invariant("house tier missing"))?;
                self.profile.wallet.debit(cost)?;
                self.profile.set_house_level(next, &config.house);
                info!(level = next, "House upgraded");
                self.notes.push(NotificationKind::HouseUpgraded { level: next });
            }
            GameEvent::AdoptCompanion { companion } => {
                let species = catalog
                    .companion(&companion)
                    .ok_or_else(|| Rejection::UnknownContent(companion.to_string()))?;
                companion::adopt(&mut self.profile, species, self.now)?;
                info!(%companion, "Companion adopted");
                self.notes.push(NotificationKind::CompanionAdopted { companion });
            }
            GameEvent::SetActiveCompanion { companion } => {
                companion::set_active(&mut self.profile, &companion)?;
            }
            GameEvent::FeedCompanion => {
                let pet = active_companion_mut(&mut self.profile).ok_or(Rejection::NoActiveCompanion)?;
                let fulfilled = pet.feed(self.now, &config.companion);
                let id = pet.companion_id.clone();
                self.request_fulfilled(&id, fulfilled);
                self.missions(MissionEvent::CompanionFed, 1);
            }
            GameEvent::PlayWithCompanion => {
                let pet = active_companion_mut(&mut self.profile).ok_or(Rejection::NoActiveCompanion)?;
                let fulfilled = pet.play(self.now, &config.companion);
                let id = pet.companion_id.clone();
                self.request_fulfilled(&id, fulfilled);
                self.companion_xp(config.companion.play_xp);
                self.missions(MissionEvent::CompanionPlayed, 1);
            }
            GameEvent::CustomizeCompanion {
                companion,
                customization,
            } => companion::customize(&mut self.profile, &companion, customization)?,
            GameEvent::TalkToNpc { npc } => {
                catalog.npc(&npc).ok_or(Rejection::UnknownNpc)?;
                self.missions(MissionEvent::NpcTalk, 1);
                self.quests(&QuestTrigger::TalkTo { npc: npc.clone() }, 1);
                let change = self
                    .profile
                    .relationship_mut(&npc, &config.relationship)?
                    .talk(self.now, &config.relationship)?;
                self.cheer_spouse(&npc, config.relationship.spouse_talk_happiness);
                self.rp_notes(&npc, &change);
            }
            GameEvent::GiveGift { npc, gift } => {
                let def = catalog.npc(&npc).ok_or(Rejection::UnknownNpc)?;
                let item = catalog.gift(&gift).ok_or(Rejection::UnknownContent(gift))?;
                self.profile.wallet.debit(item.price)?;
                let change = self.profile.relationship_mut(&npc, &config.relationship)?.gain_rp(
                    i64::from(def.gift_rp(item)),
                    RpSource::Gift,
                    self.now,
                    &config.relationship,
                );
                self.cheer_spouse(&npc, config.relationship.spouse_talk_happiness);
                self.rp_notes(&npc, &change);
            }
            GameEvent::GainRp { npc, amount, source } => {
                catalog.npc(&npc).ok_or(Rejection::UnknownNpc)?;
                let change = self
                    .profile
                    .relationship_mut(&npc, &config.relationship)?
                    .gain_rp(amount, source, self.now, &config.relationship);
                self.rp_notes(&npc, &change);
            }
            GameEvent::MarkEventViewed { npc, event } => {
                self.profile
                    .relationships
                    .get_mut(&npc)
                    .ok_or(Rejection::UnknownNpc)?
                    .mark_viewed(event)?;
            }
            GameEvent::Confess { npc } => {
                let def = catalog.npc(&npc).ok_or(Rejection::UnknownNpc)?;
                let has_locket = self.profile.key_items.has(KeyItem::Locket);
                self.profile
                    .relationship_mut(&npc, &config.relationship)?
                    .confess(def, has_locket, &config.relationship)?;
                self.profile.key_items.set(KeyItem::Locket, false);
                self.notes.push(NotificationKind::StatusChanged {
                    npc,
                    status: RelationshipStatus::Dating,
                });
            }
            GameEvent::Propose { npc } => {
                catalog.npc(&npc).ok_or(Rejection::UnknownNpc)?;
                let has_ring = self.profile.key_items.has(KeyItem::Ring);
                let house_level = self.profile.house_level();
                let already_married = self.profile.marriage.is_some();
                let marriage = self
                    .profile
                    .relationship_mut(&npc, &config.relationship)?
                    .propose(has_ring, house_level, already_married, self.now, &config.relationship)?;
                self.profile.marriage = Some(marriage);
                self.profile.key_items.set(KeyItem::Ring, false);
                self.notes.push(NotificationKind::StatusChanged {
                    npc: npc.clone(),
                    status: RelationshipStatus::Married,
                });
                self.notes.push(NotificationKind::Married { spouse: npc });
            }
            GameEvent::HaveChild { name } => {
                check_child_gates(
                    self.profile.marriage.as_ref(),
                    self.profile.key_items.has(KeyItem::Crib),
                    self.profile.child.is_some(),
                    &config.relationship,
                )?;
                self.profile.key_items.set(KeyItem::Crib, false);
                self.profile.child = Some(ChildRecord {
                    born_at: self.now,
                    name: name.clone(),
                });
                info!("Child born");
                self.notes.push(NotificationKind::ChildBorn { name });
            }
            // Rotation already happened in catch-up.
            GameEvent::RefreshMissions | GameEvent::Tick => {}
            GameEvent::ClaimMission { mission } => {
                let lines = mission::claim_mission(&mut self.profile.missions, &mission)?;
                self.grant_lines(&lines);
                self.notes.push(NotificationKind::MissionClaimed { mission });
            }
            GameEvent::StartQuest { quest } => {
                let def = catalog.quest(&quest).ok_or(Rejection::UnknownQuest)?;
                self.profile.quests.start_quest(def)?;
                self.notes.push(NotificationKind::QuestStarted { quest });
            }
            GameEvent::ProgressQuest {
                quest,
                objective,
                amount,
            } => {
                let def = catalog.quest(&quest).ok_or(Rejection::UnknownQuest)?;
                let step = self.profile.quests.progress_quest(def, objective, amount)?;
                self.quest_notes(std::iter::once(step));
            }
            GameEvent::CompleteQuest { quest } => {
                let def = catalog.quest(&quest).ok_or(Rejection::UnknownQuest)?;
                let lines = self.profile.quests.complete_quest(def)?;
                self.grant_lines(&lines);
                self.notes.push(NotificationKind::QuestClaimed { quest });
            }
        }
        Ok(())
    }

    /// Run base amounts through the multiplier pipeline and credit them.
    fn grant(&mut self, base_xp: u64, base_currency: u64, context: &RewardContext) -> std::result::Result<Reward, Failure> {
        let reward = compute_reward(base_xp, base_currency, context, &self.profile, self.config, self.catalog)?;
        self.credit(reward.xp, reward.currency);
        Ok(reward)
    }

    /// Credit fixed claim rewards (no multipliers).
    fn grant_lines(&mut self, lines: &[RewardLine]) {
        let mut xp = 0u64;
        let mut currency = 0u64;
        for line in lines {
            match *line {
                RewardLine::Xp(amount) => xp = xp.saturating_add(amount),
                RewardLine::Currency(amount) => currency = currency.saturating_add(amount),
                RewardLine::CompanionXp(amount) => self.companion_xp(amount),
            }
        }
        self.credit(xp, currency);
    }

    fn credit(&mut self, xp: u64, currency: u64) {
        if xp == 0 && currency == 0 {
            return;
        }
        self.profile.wallet.credit(currency);
        let change = self.profile.wallet.grant_xp(xp, &self.config.economy);
        self.notes.push(NotificationKind::RewardEarned { xp, currency });
        if change.leveled_up() {
            let (into_level, span) =
                level::progress_to_next(self.profile.wallet.experience(), &self.config.economy);
            let xp_to_next = span.saturating_sub(into_level);
            info!(from = change.from, to = change.to, xp_to_next, "Player levelled up");
            self.notes.push(NotificationKind::LevelUp {
                from: change.from,
                to: change.to,
                xp_to_next,
            });
        }
        if currency > 0 {
            self.missions(MissionEvent::CurrencyEarned, u32::try_from(currency).unwrap_or(u32::MAX));
        }
    }

    fn companion_xp(&mut self, amount: u64) {
        let config = &self.config.companion;
        let Some(pet) = active_companion_mut(&mut self.profile) else {
            warn!(amount, "No active companion; companion XP dropped");
            return;
        };
        if pet.grant_xp(amount, config) > 0 {
            self.notes.push(NotificationKind::CompanionLevelUp {
                companion: pet.companion_id.clone(),
                level: pet.level,
            });
        }
    }

    fn request_fulfilled(&mut self, companion: &CompanionId, fulfilled: Option<companion::RequestKind>) {
        if let Some(request) = fulfilled {
            self.notes.push(NotificationKind::CompanionRequestFulfilled {
                companion: companion.clone(),
                request,
            });
        }
    }

    fn missions(&mut self, event: MissionEvent, amount: u32) {
        for mission in mission::update_mission_progress(&mut self.profile.missions, event, amount) {
            self.notes.push(NotificationKind::MissionCompleted { mission });
        }
    }

    fn quests(&mut self, occurrence: &QuestTrigger, amount: u32) {
        let steps = self.profile.quests.progress_matching(self.catalog, occurrence, amount);
        self.quest_notes(steps);
    }

    fn quest_notes(&mut self, steps: impl IntoIterator<Item = crate::quest::QuestStep>) {
        for step in steps {
            if step.objective_completed {
                self.notes.push(NotificationKind::QuestObjectiveCompleted {
                    quest: step.quest_id.clone(),
                    objective: step.objective,
                });
            }
            if step.quest_completed {
                self.notes.push(NotificationKind::QuestCompleted { quest: step.quest_id });
            }
        }
    }

    fn rp_notes(&mut self, npc: &NpcId, change: &RpChange) {
        for event in &change.fired {
            self.notes.push(NotificationKind::RelationshipEvent {
                npc: npc.clone(),
                event: *event,
            });
        }
        if let Some(status) = change.promoted_to {
            self.notes.push(NotificationKind::StatusChanged {
                npc: npc.clone(),
                status,
            });
        }
    }

    fn cheer_spouse(&mut self, npc: &NpcId, amount: f64) {
        if let Some(marriage) = self.profile.marriage.as_mut().filter(|m| &m.spouse == npc) {
            marriage.cheer(amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::persistence::MemoryProvider;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).single().expect("valid time")
    }

    fn store() -> (PlayerStateStore<MemoryProvider, ManualClock>, MemoryProvider, ManualClock) {
        let provider = MemoryProvider::new();
        let clock = ManualClock::new(t0());
        let store = PlayerStateStore::open(
            provider.clone(),
            clock.clone(),
            EncoreConfig::default(),
            ContentCatalog::default(),
        )
        .expect("open");
        (store, provider, clock)
    }

    #[test]
    fn fresh_store_saves_immediately() {
        let (store, provider, _) = store();
        assert_eq!(provider.save_count(), 1);
        assert!(!store.is_persistence_stale());
        assert_eq!(store.profile().wallet.currency(), 0);
    }

    #[test]
    fn reopening_loads_the_saved_profile() {
        let (mut store, provider, clock) = store();
        store.apply_event(GameEvent::SetName { name: "Aria".into() }).expect("name");
        let id = store.profile().id;
        let reopened = PlayerStateStore::open(provider, clock, EncoreConfig::default(), ContentCatalog::default())
            .expect("reopen");
        assert_eq!(reopened.profile().id, id);
        assert_eq!(reopened.profile().name(), Some("Aria"));
    }

    #[test]
    fn rejection_leaves_profile_untouched() {
        let (mut store, provider, _) = store();
        let before = store.profile().clone();
        let outcome = store.apply_event(GameEvent::UpgradeHouse).expect("apply");
        assert_eq!(
            outcome.rejection,
            Some(Rejection::InsufficientFunds {
                required: 500,
                available: 0
            })
        );
        assert_eq!(store.profile(), &before);
        assert_eq!(provider.save_count(), 1, "rejections are not saved");
    }

    #[test]
    fn catch_up_rotates_missions_on_first_event() {
        let (mut store, _, _) = store();
        let outcome = store.apply_event(GameEvent::Login).expect("login");
        assert!(outcome.is_accepted());
        assert_eq!(store.profile().missions.missions.len(), 5);
        assert!(
            store
                .notifications()
                .any(|n| matches!(n.kind, NotificationKind::MissionsRefreshed { .. }))
        );
    }

    #[test]
    fn busking_has_a_cooldown() {
        let (mut store, _, clock) = store();
        assert!(store.busk().expect("busk").is_accepted());
        assert_eq!(store.profile().wallet.currency(), 40);
        let outcome = store.busk().expect("busk again");
        assert!(matches!(outcome.rejection, Some(Rejection::OnCooldown { .. })));
        clock.advance(Duration::minutes(60));
        assert!(store.busk().expect("after cooldown").is_accepted());
    }

    #[test]
    fn save_failure_marks_stale_and_recovers() {
        let (mut store, provider, _) = store();
        provider.set_fail_saves(true);
        let outcome = store.busk().expect("busk");
        assert!(outcome.is_accepted());
        assert!(!outcome.persisted);
        assert!(store.is_persistence_stale());
        assert_eq!(store.profile().wallet.currency(), 40, "mutation is kept");

        provider.set_fail_saves(false);
        let outcome = store.tick().expect("tick");
        assert!(outcome.persisted);
        assert!(!store.is_persistence_stale());
    }

    #[test]
    fn notifications_can_be_dismissed() {
        let (mut store, _, _) = store();
        let outcome = store.busk().expect("busk");
        let first = outcome.notifications[0];
        assert!(store.dismiss_notification(first));
        assert!(!store.dismiss_notification(first));
    }

    #[test]
    fn upgrade_house_until_max() {
        let (mut store, _, _) = store();
        store.profile.wallet.credit(1_000_000);
        for level in 1..=4 {
            let outcome = store.apply_event(GameEvent::UpgradeHouse).expect("upgrade");
            assert!(outcome.is_accepted());
            assert_eq!(store.profile().house_level(), level);
        }
        let outcome = store.apply_event(GameEvent::UpgradeHouse).expect("upgrade");
        assert_eq!(outcome.rejection, Some(Rejection::HouseAtMaxLevel));
    }

    #[test]
    fn purchases_are_unique_per_type() {
        let (mut store, _, _) = store();
        store.profile.wallet.credit(100);
        let key = crate::types::ShopItemKey {
            item_type: "instrument".into(),
            id: "lute".into(),
        };
        let buy = |key: &crate::types::ShopItemKey| GameEvent::PurchaseShopItem {
            key: key.clone(),
            price: 30,
        };
        assert!(store.apply_event(buy(&key)).expect("buy").is_accepted());
        assert_eq!(store.apply_event(buy(&key)).expect("again").rejection, Some(Rejection::AlreadyOwned));
        let outfit = crate::types::ShopItemKey {
            item_type: "outfit".into(),
            id: "lute".into(),
        };
        assert!(store.apply_event(buy(&outfit)).expect("other type").is_accepted());
        assert_eq!(store.profile().wallet.currency(), 40);
    }
}
