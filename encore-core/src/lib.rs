//! # Encore Core Library
//!
//! Progression and reward engine for a music ear-training RPG.
//!
//! A single player's long-lived state lives in a [`PlayerProfile`] owned by a
//! [`PlayerStateStore`]. Hosts describe what happened as [`GameEvent`]s; the
//! store turns them into:
//!
//! - **Rewards**: base XP and coins through the house, companion and streak
//!   multipliers ([`reward`])
//! - **Missions**: daily and weekly objectives drawn per cycle ([`mission`])
//! - **Quests**: prerequisite-gated objective chains ([`quest`])
//! - **Companions**: pets that get hungry, level up and boost rewards
//!   ([`companion`])
//! - **Relationships**: tiered RP with NPCs, dating, marriage and family
//!   ([`relationship`])
//!
//! Every event is atomic: a rejected event leaves the profile untouched, an
//! accepted one is written through to a [`PersistenceProvider`].

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod companion;
pub mod config;
pub mod content;
pub mod error;
pub mod event;
pub mod level;
pub mod mission;
pub mod notification;
pub mod persistence;
pub mod profile;
pub mod progress;
pub mod quest;
pub mod relationship;
pub mod reward;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EncoreConfig;
pub use content::ContentCatalog;
pub use error::{EncoreError, Failure, Rejection};
pub use event::GameEvent;
pub use persistence::{MemoryProvider, PersistenceProvider, SqliteProvider};
pub use profile::PlayerProfile;
pub use store::{Outcome, PlayerStateStore};
pub use types::*;
