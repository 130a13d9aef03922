//! NPC relationships: RP accumulation, story checkpoints, and the
//! Neutral → Friendly → Dating → Married progression.
//!
//! RP rides on the generic [`Progress`] counter with the cap of the current
//! tier as its target. Reaching the cap never changes status on its own:
//! Friendly → Dating needs a confession and Dating → Married a proposal,
//! each consuming a key item. The only automatic step is Neutral →
//! Friendly, which never leads past friendship.
//!
//! "Distant" is a derived read for presentation. It never mutates status or
//! RP.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RelationshipConfig;
use crate::error::{Failure, Rejection};
use crate::progress::{Lifecycle, Progress, Tracked, checkpoint_value, crossed_checkpoints};
use crate::types::{KeyItem, NpcId, Timestamp};

/// Relationship status; only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    /// Acquaintance.
    Neutral,
    /// Friend.
    Friendly,
    /// Dating.
    Dating,
    /// Married.
    Married,
}

impl RelationshipStatus {
    /// RP tier this status accumulates in.
    #[must_use]
    pub fn tier(self) -> RpTier {
        match self {
            Self::Neutral | Self::Friendly => RpTier::Friend,
            Self::Dating => RpTier::Dating,
            Self::Married => RpTier::Married,
        }
    }
}

/// RP tier; each has its own cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpTier {
    /// Neutral and Friendly.
    Friend,
    /// Dating.
    Dating,
    /// Married.
    Married,
}

impl RpTier {
    /// Cap for the tier.
    #[must_use]
    pub fn cap(self, config: &RelationshipConfig) -> u32 {
        match self {
            Self::Friend => config.friend_cap,
            Self::Dating => config.dating_cap,
            Self::Married => config.married_cap,
        }
    }
}

/// Identifies one story checkpoint of one tier, e.g. `friend_50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    /// Tier the checkpoint belongs to.
    pub tier: RpTier,
    /// Checkpoint as a percentage of the tier cap.
    pub percent: u8,
}

impl EventKey {
    /// Key for a checkpoint fraction.
    #[must_use]
    pub fn new(tier: RpTier, fraction: f64) -> Self {
        // fraction is validated to (0, 1]
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = (fraction * 100.0).round().clamp(0.0, 100.0) as u8;
        Self { tier, percent }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tier = match self.tier {
            RpTier::Friend => "friend",
            RpTier::Dating => "dating",
            RpTier::Married => "married",
        };
        write!(f, "{tier}_{}", self.percent)
    }
}

/// What produced an RP change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpSource {
    /// Conversation.
    Talk,
    /// Gift.
    Gift,
    /// Quest reward or story beat.
    Story,
    /// Busking or performance attended by the NPC.
    Performance,
    /// Anything else reported by the host.
    Other,
}

/// Static NPC definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcDef {
    /// NPC id.
    pub id: NpcId,
    /// Display name.
    pub name: String,
    /// Whether the NPC can be dated and married.
    #[serde(default)]
    pub romanceable: bool,
    /// Gift ids the NPC loves (double RP).
    #[serde(default)]
    pub loved_gifts: Vec<String>,
    /// Gift ids the NPC likes (one and a half RP).
    #[serde(default)]
    pub liked_gifts: Vec<String>,
}

impl NpcDef {
    /// RP a gift yields for this NPC.
    #[must_use]
    pub fn gift_rp(&self, gift: &GiftItem) -> u32 {
        if self.loved_gifts.contains(&gift.id) {
            gift.base_rp.saturating_mul(2)
        } else if self.liked_gifts.contains(&gift.id) {
            gift.base_rp.saturating_mul(3) / 2
        } else {
            gift.base_rp
        }
    }
}

/// A purchasable gift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftItem {
    /// Gift id.
    pub id: String,
    /// Price in currency.
    pub price: u64,
    /// RP for an NPC with no preference.
    pub base_rp: u32,
}

/// Outcome of an RP change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpChange {
    /// Change actually applied after clamping.
    pub applied: i64,
    /// RP after the change.
    pub rp: u32,
    /// Cap of the current tier.
    pub cap: u32,
    /// The change reached the tier cap.
    pub reached_cap: bool,
    /// Checkpoint events that fired for the first time.
    pub fired: Vec<EventKey>,
    /// Status reached automatically (Neutral → Friendly only).
    pub promoted_to: Option<RelationshipStatus>,
}

/// The player's bond with one NPC. Created lazily, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    /// NPC id.
    pub npc_id: NpcId,
    points: Progress,
    status: RelationshipStatus,
    /// Last interaction that added RP.
    pub last_positive_interaction: Option<Timestamp>,
    /// Checkpoint events that have fired.
    pub fired_events: BTreeSet<EventKey>,
    /// Fired events whose dialogue the player has seen.
    pub viewed_events: BTreeSet<EventKey>,
    talk_day: Option<NaiveDate>,
    talks_today: u32,
}

impl RelationshipRecord {
    /// New Neutral relationship at 0 RP.
    ///
    /// # Errors
    /// [`Failure::Internal`] if the friend cap is zero.
    pub fn new(npc_id: NpcId, config: &RelationshipConfig) -> Result<Self, Failure> {
        Ok(Self {
            npc_id,
            points: Progress::new(config.friend_cap)?,
            status: RelationshipStatus::Neutral,
            last_positive_interaction: None,
            fired_events: BTreeSet::new(),
            viewed_events: BTreeSet::new(),
            talk_day: None,
            talks_today: 0,
        })
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RelationshipStatus {
        self.status
    }

    /// Current RP.
    #[must_use]
    pub fn rp(&self) -> u32 {
        self.points.current()
    }

    /// Cap of the current tier.
    #[must_use]
    pub fn cap(&self) -> u32 {
        self.points.target()
    }

    /// Whether RP sits at the current tier cap.
    #[must_use]
    pub fn at_cap(&self) -> bool {
        self.points.is_complete()
    }

    /// Add (or remove, for negative `amount`) RP within `[0, cap]`.
    pub fn gain_rp(
        &mut self,
        amount: i64,
        source: RpSource,
        now: Timestamp,
        config: &RelationshipConfig,
    ) -> RpChange {
        let step = self.points.advance(amount);
        if step.applied() > 0 {
            self.last_positive_interaction = Some(now);
        }

        let tier = self.status.tier();
        let fired: Vec<EventKey> =
            crossed_checkpoints(step.before, step.after, self.points.target(), &config.checkpoints)
                .into_iter()
                .map(|idx| EventKey::new(tier, config.checkpoints[idx]))
                .filter(|key| self.fired_events.insert(*key))
                .collect();

        let mut promoted_to = None;
        if self.status == RelationshipStatus::Neutral
            && self.points.current()
                >= checkpoint_value(config.friendly_threshold, self.points.target()).max(1)
        {
            self.status = RelationshipStatus::Friendly;
            promoted_to = Some(RelationshipStatus::Friendly);
            info!(npc = %self.npc_id, "Relationship became friendly");
        }

        debug!(
            npc = %self.npc_id,
            ?source,
            applied = step.applied(),
            rp = step.after,
            cap = self.points.target(),
            "RP changed"
        );

        RpChange {
            applied: step.applied(),
            rp: step.after,
            cap: self.points.target(),
            reached_cap: step.crossed,
            fired,
            promoted_to,
        }
    }

    /// A conversation: grants talk RP up to the daily limit.
    ///
    /// # Errors
    /// [`Rejection::DailyLimitReached`] once the limit for today is used up.
    pub fn talk(&mut self, now: Timestamp, config: &RelationshipConfig) -> Result<RpChange, Rejection> {
        let today = now.date_naive();
        if self.talk_day != Some(today) {
            self.talk_day = Some(today);
            self.talks_today = 0;
        }
        if self.talks_today >= config.talks_per_day {
            return Err(Rejection::DailyLimitReached);
        }
        self.talks_today += 1;
        Ok(self.gain_rp(i64::from(config.talk_rp), RpSource::Talk, now, config))
    }

    /// Record that the player has seen a fired event's dialogue.
    ///
    /// # Errors
    /// [`Rejection::EventNotFired`] or [`Rejection::AlreadyViewed`].
    pub fn mark_viewed(&mut self, key: EventKey) -> Result<(), Rejection> {
        if !self.fired_events.contains(&key) {
            return Err(Rejection::EventNotFired);
        }
        if !self.viewed_events.insert(key) {
            return Err(Rejection::AlreadyViewed);
        }
        Ok(())
    }

    /// Fired events not yet viewed, in key order.
    pub fn pending_events(&self) -> impl Iterator<Item = &EventKey> + '_ {
        self.fired_events.difference(&self.viewed_events)
    }

    /// Friendly → Dating. Requires the friend-tier cap and a locket; RP
    /// restarts at 0 under the dating cap. The caller consumes the locket.
    ///
    /// # Errors
    /// [`Rejection`]s for a non-romanceable NPC, wrong status, low RP or a
    /// missing locket; [`Failure::Internal`] for a zero dating cap.
    pub fn confess(
        &mut self,
        npc: &NpcDef,
        has_locket: bool,
        config: &RelationshipConfig,
    ) -> Result<(), Failure> {
        if !npc.romanceable {
            return Err(Rejection::NotEligible.into());
        }
        if !matches!(self.status, RelationshipStatus::Neutral | RelationshipStatus::Friendly) {
            return Err(Rejection::WrongStatus.into());
        }
        self.require_cap()?;
        if !has_locket {
            return Err(Rejection::MissingKeyItem(KeyItem::Locket.name()).into());
        }
        self.points.retarget(config.dating_cap)?;
        self.status = RelationshipStatus::Dating;
        info!(npc = %self.npc_id, "Relationship moved to dating");
        Ok(())
    }

    /// Dating → Married. Requires the dating-tier cap, a ring, a minimum
    /// house level and no existing spouse. Returns the new marriage record;
    /// the caller consumes the ring.
    ///
    /// # Errors
    /// [`Rejection`]s for each unmet gate; [`Failure::Internal`] for a zero
    /// married cap.
    pub fn propose(
        &mut self,
        has_ring: bool,
        house_level: u8,
        already_married: bool,
        now: Timestamp,
        config: &RelationshipConfig,
    ) -> Result<Marriage, Failure> {
        if self.status != RelationshipStatus::Dating {
            return Err(Rejection::WrongStatus.into());
        }
        if already_married {
            return Err(Rejection::AlreadyMarried.into());
        }
        self.require_cap()?;
        if !has_ring {
            return Err(Rejection::MissingKeyItem(KeyItem::Ring.name()).into());
        }
        if house_level < config.propose_min_house_level {
            return Err(Rejection::HouseLevelTooLow {
                current: house_level,
                required: config.propose_min_house_level,
            }
            .into());
        }
        self.points.retarget(config.married_cap)?;
        self.status = RelationshipStatus::Married;
        info!(npc = %self.npc_id, "Married");
        Ok(Marriage::new(self.npc_id.clone(), now, config))
    }

    fn require_cap(&self) -> Result<(), Rejection> {
        if self.lifecycle() == Lifecycle::Completed {
            Ok(())
        } else {
            Err(Rejection::RelationshipTooLow {
                current: self.rp(),
                required: self.cap(),
            })
        }
    }

    /// Derived "distant" flag: no positive interaction within the configured
    /// window, or a friend whose RP has sunk below the low-RP fraction.
    #[must_use]
    pub fn is_distant(&self, now: Timestamp, config: &RelationshipConfig) -> bool {
        let window = Duration::days(config.distant_after_days);
        let stale = self
            .last_positive_interaction
            .is_none_or(|last| now - last > window);
        let low = self.status == RelationshipStatus::Friendly
            && self.points.fraction() < config.low_rp_fraction;
        stale || low
    }

    /// Read model for presentation.
    #[must_use]
    pub fn view(&self, now: Timestamp, config: &RelationshipConfig) -> RelationshipView {
        RelationshipView {
            npc_id: self.npc_id.clone(),
            status: self.status,
            rp: self.rp(),
            cap: self.cap(),
            distant: self.is_distant(now, config),
            pending_events: self.pending_events().copied().collect(),
        }
    }
}

/// A relationship "completes" when RP reaches the tier cap, which only makes
/// the next status eligible. It never reaches `Claimed`.
impl Tracked for RelationshipRecord {
    fn lifecycle(&self) -> Lifecycle {
        if self.at_cap() {
            Lifecycle::Completed
        } else {
            Lifecycle::Active
        }
    }
}

/// Presentation snapshot of one relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipView {
    /// NPC id.
    pub npc_id: NpcId,
    /// Stored status (distance never changes it).
    pub status: RelationshipStatus,
    /// Current RP.
    pub rp: u32,
    /// Tier cap.
    pub cap: u32,
    /// Derived distance flag.
    pub distant: bool,
    /// Fired but unviewed events.
    pub pending_events: Vec<EventKey>,
}

// ---------------------------------------------------------------------------
// Marriage and family
// ---------------------------------------------------------------------------

/// The single global marriage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marriage {
    /// Spouse NPC id.
    pub spouse: NpcId,
    /// Wedding time.
    pub married_at: Timestamp,
    /// Happiness, 0–100; decays daily.
    pub happiness: f64,
    /// Time up to which decay has been applied.
    pub last_decay: Timestamp,
}

impl Marriage {
    /// Fresh marriage at the configured starting happiness.
    #[must_use]
    pub fn new(spouse: NpcId, now: Timestamp, config: &RelationshipConfig) -> Self {
        Self {
            spouse,
            married_at: now,
            happiness: config.marriage_start_happiness.clamp(0.0, 100.0),
            last_decay: now,
        }
    }

    /// Apply decay for the time elapsed since the last update; idempotent
    /// for a repeated `now`.
    #[allow(clippy::cast_precision_loss)]
    pub fn decay(&mut self, now: Timestamp, config: &RelationshipConfig) {
        if now <= self.last_decay {
            return;
        }
        let days = (now - self.last_decay).num_milliseconds() as f64 / 86_400_000.0;
        self.happiness = (self.happiness - config.marriage_decay_per_day * days).clamp(0.0, 100.0);
        self.last_decay = now;
    }

    /// Raise happiness (spouse conversation, gifts).
    pub fn cheer(&mut self, amount: f64) {
        self.happiness = (self.happiness + amount).clamp(0.0, 100.0);
    }
}

/// Optional child-rearing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRecord {
    /// Birth time.
    pub born_at: Timestamp,
    /// Name chosen by the player.
    pub name: Option<String>,
}

/// Check the gates for starting a family.
///
/// # Errors
/// [`Rejection::WrongStatus`] when unmarried, [`Rejection::ChildAlreadyBorn`],
/// [`Rejection::MissingKeyItem`] without a crib, or
/// [`Rejection::MarriageTooUnhappy`].
pub fn check_child_gates(
    marriage: Option<&Marriage>,
    has_crib: bool,
    child_exists: bool,
    config: &RelationshipConfig,
) -> Result<(), Rejection> {
    let marriage = marriage.ok_or(Rejection::WrongStatus)?;
    if child_exists {
        return Err(Rejection::ChildAlreadyBorn);
    }
    if !has_crib {
        return Err(Rejection::MissingKeyItem(KeyItem::Crib.name()));
    }
    if marriage.happiness < config.child_min_happiness {
        return Err(Rejection::MarriageTooUnhappy);
    }
    Ok(())
}
