//! Inputs to the engine.
//!
//! Every player-state mutation is expressed as a [`GameEvent`] and applied
//! through [`PlayerStateStore::apply_event`](crate::store::PlayerStateStore::apply_event).
//! Hosts report what happened; the engine decides what it is worth.

use serde::{Deserialize, Serialize};

use crate::companion::Customization;
use crate::relationship::{EventKey, RpSource};
use crate::types::{
    CompanionId, GameMode, KeyItem, MissionId, NpcId, QuestId, ShopItemKey, UnlockKey,
};

/// Something that happened in the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Choose the player name (once).
    SetName {
        /// Requested name.
        name: String,
    },
    /// The player opened the game.
    Login,
    /// A quiz answer was graded.
    AnswerRecorded {
        /// Mini-game.
        mode: GameMode,
        /// Whether it was right.
        correct: bool,
        /// Consecutive-correct streak including this answer.
        streak: u32,
        /// Trained item, e.g. `"P5"`.
        #[serde(default)]
        item_id: Option<String>,
    },
    /// A practice session finished.
    PracticeCompleted {
        /// Mode practiced, if a single one.
        #[serde(default)]
        mode: Option<GameMode>,
    },
    /// A busking session finished.
    Busk,
    /// A monster was defeated.
    MonsterDefeated {
        /// Monster id.
        monster: String,
        /// Base XP before multipliers.
        base_xp: u64,
        /// Base currency before multipliers.
        base_currency: u64,
    },
    /// A memento was picked up.
    MementoCollected {
        /// Memento id.
        memento: String,
    },
    /// A romance key item was obtained.
    KeyItemAcquired {
        /// Item.
        item: KeyItem,
    },
    /// Unlock a training item for a price.
    UnlockTrainingItem {
        /// Item.
        key: UnlockKey,
        /// Price.
        cost: u64,
    },
    /// Buy a shop item.
    PurchaseShopItem {
        /// Item.
        key: ShopItemKey,
        /// Price.
        price: u64,
    },
    /// Buy a piece of furniture.
    BuyFurniture {
        /// Furniture id.
        id: String,
        /// Price.
        price: u64,
    },
    /// Upgrade the house one level.
    UpgradeHouse,
    /// Adopt a companion species from the catalog.
    AdoptCompanion {
        /// Species.
        companion: CompanionId,
    },
    /// Switch the active companion.
    SetActiveCompanion {
        /// Species.
        companion: CompanionId,
    },
    /// Feed the active companion.
    FeedCompanion,
    /// Play with the active companion.
    PlayWithCompanion,
    /// Change a companion's looks.
    CustomizeCompanion {
        /// Species.
        companion: CompanionId,
        /// New attributes.
        customization: Customization,
    },
    /// Talk to an NPC.
    TalkToNpc {
        /// NPC.
        npc: NpcId,
    },
    /// Buy a gift and give it to an NPC.
    GiveGift {
        /// NPC.
        npc: NpcId,
        /// Gift id.
        gift: String,
    },
    /// Direct RP change reported by the host (story beats, performances).
    GainRp {
        /// NPC.
        npc: NpcId,
        /// Signed RP change.
        amount: i64,
        /// Origin.
        source: RpSource,
    },
    /// The player watched a relationship event.
    MarkEventViewed {
        /// NPC.
        npc: NpcId,
        /// Event.
        event: EventKey,
    },
    /// Confess to an NPC (Friendly → Dating).
    Confess {
        /// NPC.
        npc: NpcId,
    },
    /// Propose to an NPC (Dating → Married).
    Propose {
        /// NPC.
        npc: NpcId,
    },
    /// Start a family.
    HaveChild {
        /// Chosen name.
        #[serde(default)]
        name: Option<String>,
    },
    /// Roll missions over if a cycle has ended.
    RefreshMissions,
    /// Claim a completed mission.
    ClaimMission {
        /// Mission.
        mission: MissionId,
    },
    /// Start a quest.
    StartQuest {
        /// Quest.
        quest: QuestId,
    },
    /// Progress one quest objective explicitly.
    ProgressQuest {
        /// Quest.
        quest: QuestId,
        /// Objective index.
        objective: usize,
        /// Amount.
        amount: u32,
    },
    /// Claim a completed quest.
    CompleteQuest {
        /// Quest.
        quest: QuestId,
    },
    /// Let time pass: catch-up only.
    Tick,
}

impl GameEvent {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetName { .. } => "set_name",
            Self::Login => "login",
            Self::AnswerRecorded { .. } => "answer_recorded",
            Self::PracticeCompleted { .. } => "practice_completed",
            Self::Busk => "busk",
            Self::MonsterDefeated { .. } => "monster_defeated",
            Self::MementoCollected { .. } => "memento_collected",
            Self::KeyItemAcquired { .. } => "key_item_acquired",
            Self::UnlockTrainingItem { .. } => "unlock_training_item",
            Self::PurchaseShopItem { .. } => "purchase_shop_item",
            Self::BuyFurniture { .. } => "buy_furniture",
            Self::UpgradeHouse => "upgrade_house",
            Self::AdoptCompanion { .. } => "adopt_companion",
            Self::SetActiveCompanion { .. } => "set_active_companion",
            Self::FeedCompanion => "feed_companion",
            Self::PlayWithCompanion => "play_with_companion",
            Self::CustomizeCompanion { .. } => "customize_companion",
            Self::TalkToNpc { .. } => "talk_to_npc",
            Self::GiveGift { .. } => "give_gift",
            Self::GainRp { .. } => "gain_rp",
            Self::MarkEventViewed { .. } => "mark_event_viewed",
            Self::Confess { .. } => "confess",
            Self::Propose { .. } => "propose",
            Self::HaveChild { .. } => "have_child",
            Self::RefreshMissions => "refresh_missions",
            Self::ClaimMission { .. } => "claim_mission",
            Self::StartQuest { .. } => "start_quest",
            Self::ProgressQuest { .. } => "progress_quest",
            Self::CompleteQuest { .. } => "complete_quest",
            Self::Tick => "tick",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_round_trip_through_json() {
        let event = GameEvent::AnswerRecorded {
            mode: GameMode::Intervals,
            correct: true,
            streak: 4,
            item_id: Some("P5".into()),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"type\":\"answer_recorded\""));
        let back: GameEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn host_json_with_defaults() {
        let event: GameEvent =
            serde_json::from_str(r#"{"type":"practice_completed"}"#).expect("deserialize");
        assert_eq!(event, GameEvent::PracticeCompleted { mode: None });
        assert_eq!(event.name(), "practice_completed");
    }

    #[test]
    fn mark_event_viewed_keeps_its_event_key() {
        let event = GameEvent::MarkEventViewed {
            npc: NpcId::from("mira"),
            event: EventKey {
                tier: crate::relationship::RpTier::Friend,
                percent: 50,
            },
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"type\":\"mark_event_viewed\""));
        assert!(json.contains("\"event\":{"));
        let back: GameEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
    }
}
