//! Player-facing notifications produced by engine operations.
//!
//! The queue lives in the store; the presentation layer reads pending
//! entries and dismisses them by id.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::companion::RequestKind;
use crate::mission::Cadence;
use crate::relationship::{EventKey, RelationshipStatus};
use crate::types::{CompanionId, MissionId, NpcId, QuestId, Timestamp};

/// Monotonically increasing notification id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    /// The player gained one or more levels.
    LevelUp {
        /// Level before.
        from: u32,
        /// Level after.
        to: u32,
        /// XP still needed for the next level; 0 at the cap.
        xp_to_next: u64,
    },
    /// A mission reached its target.
    MissionCompleted {
        /// Mission.
        mission: MissionId,
    },
    /// A mission reward was claimed.
    MissionClaimed {
        /// Mission.
        mission: MissionId,
    },
    /// A cadence rotated to a new cycle.
    MissionsRefreshed {
        /// Rotation.
        cadence: Cadence,
        /// New cycle key.
        cycle: String,
    },
    /// A quest was started.
    QuestStarted {
        /// Quest.
        quest: QuestId,
    },
    /// A quest objective was completed.
    QuestObjectiveCompleted {
        /// Quest.
        quest: QuestId,
        /// Objective index.
        objective: usize,
    },
    /// Every objective of a quest is complete.
    QuestCompleted {
        /// Quest.
        quest: QuestId,
    },
    /// A quest reward was claimed.
    QuestClaimed {
        /// Quest.
        quest: QuestId,
    },
    /// A relationship checkpoint fired.
    RelationshipEvent {
        /// NPC.
        npc: NpcId,
        /// Checkpoint.
        event: EventKey,
    },
    /// A relationship status changed.
    StatusChanged {
        /// NPC.
        npc: NpcId,
        /// New status.
        status: RelationshipStatus,
    },
    /// The player married.
    Married {
        /// Spouse.
        spouse: NpcId,
    },
    /// A child was born.
    ChildBorn {
        /// Chosen name.
        name: Option<String>,
    },
    /// A companion was adopted.
    CompanionAdopted {
        /// Species.
        companion: CompanionId,
    },
    /// A companion levelled up.
    CompanionLevelUp {
        /// Species.
        companion: CompanionId,
        /// New level.
        level: u32,
    },
    /// A companion asked for something.
    CompanionRequest {
        /// Species.
        companion: CompanionId,
        /// Request.
        request: RequestKind,
    },
    /// A companion request was met.
    CompanionRequestFulfilled {
        /// Species.
        companion: CompanionId,
        /// Request.
        request: RequestKind,
    },
    /// XP and currency were credited.
    RewardEarned {
        /// XP credited.
        xp: u64,
        /// Currency credited.
        currency: u64,
    },
    /// The house was upgraded.
    HouseUpgraded {
        /// New level.
        level: u8,
    },
}

/// A queued notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Id.
    pub id: NotificationId,
    /// Creation time.
    pub created_at: Timestamp,
    /// Payload.
    pub kind: NotificationKind,
}

/// FIFO of undismissed notifications.
#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    next_id: u64,
    entries: VecDeque<Notification>,
}

impl NotificationQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append and return the new id.
    pub fn push(&mut self, kind: NotificationKind, now: Timestamp) -> NotificationId {
        self.next_id += 1;
        let id = NotificationId(self.next_id);
        self.entries.push_back(Notification {
            id,
            created_at: now,
            kind,
        });
        id
    }

    /// Remove by id. Returns `false` for an unknown id.
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        match self.entries.iter().position(|n| n.id == id) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Pending notifications, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &Notification> + '_ {
        self.entries.iter()
    }

    /// Number pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
