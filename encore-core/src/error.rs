//! Error and rejection types for the Encore engine.
//!
//! Two families live here:
//!
//! - [`EncoreError`]: internal failures (broken content tables, storage
//!   faults). An operation that hits one aborts and leaves the profile as it
//!   was.
//! - [`Rejection`]: expected, player-triggered validation failures
//!   ("not enough coins"). These are never errors; they travel inside an
//!   [`Outcome`](crate::store::Outcome) so the UI can show a toast.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Top-level error type for all Encore operations.
#[derive(Error, Debug)]
pub enum EncoreError {
    /// A programming or content-authoring error, such as a zero progress
    /// target or a reward table that cannot be evaluated.
    #[error("Invariant violated: {context}")]
    Invariant {
        /// What was being checked when the violation was detected.
        context: String,
    },

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration or content-table error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A persistence provider failed for a reason other than SQLite or I/O.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncoreError {
    /// Shorthand for building an [`EncoreError::Invariant`].
    pub fn invariant(context: impl Into<String>) -> Self {
        Self::Invariant {
            context: context.into(),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, EncoreError>;

/// Why a player action was refused.
///
/// Rejections leave the profile untouched and are surfaced to the caller
/// instead of a notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Not enough currency for the purchase.
    #[error("not enough coins: need {required}, have {available}")]
    InsufficientFunds {
        /// Price of the action.
        required: u64,
        /// Balance at the time of the attempt.
        available: u64,
    },
    /// The item, companion or unlock is already owned.
    #[error("already owned")]
    AlreadyOwned,
    /// The referenced companion has not been adopted.
    #[error("companion not owned")]
    CompanionNotOwned,
    /// The action needs an active companion and there is none.
    #[error("no active companion")]
    NoActiveCompanion,
    /// Mission or quest is not completed yet.
    #[error("not completed yet")]
    NotCompleted,
    /// Reward was already claimed.
    #[error("reward already claimed")]
    AlreadyClaimed,
    /// No active mission with that id.
    #[error("unknown mission")]
    UnknownMission,
    /// No quest with that id in the catalog.
    #[error("unknown quest")]
    UnknownQuest,
    /// Quest prerequisites are not satisfied.
    #[error("quest is locked")]
    QuestLocked,
    /// Quest is already active or finished.
    #[error("quest already started")]
    QuestAlreadyStarted,
    /// Quest has not been started.
    #[error("quest is not active")]
    QuestNotActive,
    /// Sequential objective addressed before the ones preceding it.
    #[error("objective {requested} is not current (current is {current})")]
    ObjectiveOutOfOrder {
        /// Index the caller tried to progress.
        requested: usize,
        /// Index the quest is waiting on.
        current: usize,
    },
    /// Objective index does not exist on the quest.
    #[error("objective {0} does not exist")]
    ObjectiveOutOfRange(usize),
    /// No NPC with that id in the catalog.
    #[error("unknown npc")]
    UnknownNpc,
    /// The NPC cannot take part in this kind of interaction.
    #[error("not eligible")]
    NotEligible,
    /// Relationship points have not reached the tier cap.
    #[error("relationship too low: {current}/{required}")]
    RelationshipTooLow {
        /// Current points.
        current: u32,
        /// Points needed.
        required: u32,
    },
    /// Relationship status does not allow this transition.
    #[error("relationship status does not allow this")]
    WrongStatus,
    /// A consumable key item is missing.
    #[error("missing key item: {0}")]
    MissingKeyItem(&'static str),
    /// House level is below the required minimum.
    #[error("house level {current} is below required {required}")]
    HouseLevelTooLow {
        /// Current house level.
        current: u8,
        /// Minimum house level.
        required: u8,
    },
    /// The player is already married.
    #[error("already married")]
    AlreadyMarried,
    /// Marriage happiness is below the threshold for the action.
    #[error("marriage happiness too low")]
    MarriageTooUnhappy,
    /// A child record already exists.
    #[error("child already born")]
    ChildAlreadyBorn,
    /// The house cannot be upgraded any further.
    #[error("house already at max level")]
    HouseAtMaxLevel,
    /// The action is on cooldown.
    #[error("on cooldown until {ready_at}")]
    OnCooldown {
        /// When the action becomes available again.
        ready_at: DateTime<Utc>,
    },
    /// The player's name was already chosen.
    #[error("name already set")]
    NameAlreadySet,
    /// Name is empty or too long.
    #[error("invalid name")]
    InvalidName,
    /// Content id not present in the catalog.
    #[error("unknown content id: {0}")]
    UnknownContent(String),
    /// Relationship event has not fired.
    #[error("event has not fired")]
    EventNotFired,
    /// Relationship event was already viewed.
    #[error("event already viewed")]
    AlreadyViewed,
    /// Daily limit reached for this interaction.
    #[error("daily limit reached")]
    DailyLimitReached,
}

/// Either side of an operation that can be refused or can fail internally.
///
/// Lets subsystem code use `?` on both [`Rejection`] and [`EncoreError`]
/// results; the store splits them apart again at the boundary.
#[derive(Error, Debug)]
pub enum Failure {
    /// Expected validation failure.
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// Internal error.
    #[error(transparent)]
    Internal(#[from] EncoreError),
}
