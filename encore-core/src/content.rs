//! Authored content: companion species, mission templates, quests, NPCs
//! and gifts.
//!
//! Loaded from TOML like [`EncoreConfig`](crate::config::EncoreConfig).
//! [`ContentCatalog::default`] carries a small built-in set so a host can
//! run without shipping any content files.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::companion::{Ability, AbilityKind, CompanionSpecies};
use crate::error::{EncoreError, Result};
use crate::mission::{Cadence, MissionObjective, MissionTemplate};
use crate::quest::{ObjectiveDef, ObjectiveOrdering, QuestDefinition, QuestTrigger};
use crate::relationship::{GiftItem, NpcDef};
use crate::reward::RewardLine;
use crate::types::{CompanionId, GameMode, MissionTemplateId, NpcId, QuestId};

/// Everything authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCatalog {
    /// Adoptable species.
    #[serde(default)]
    pub companions: Vec<CompanionSpecies>,
    /// Mission template pool.
    #[serde(default)]
    pub missions: Vec<MissionTemplate>,
    /// Story quests.
    #[serde(default)]
    pub quests: Vec<QuestDefinition>,
    /// NPCs.
    #[serde(default)]
    pub npcs: Vec<NpcDef>,
    /// Gifts.
    #[serde(default)]
    pub gifts: Vec<GiftItem>,
}

impl ContentCatalog {
    /// Parse and validate a catalog from TOML.
    ///
    /// # Errors
    /// `EncoreError::Config` for malformed TOML or content that fails
    /// [`validate`](Self::validate).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(toml_str).map_err(|e| EncoreError::Config(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a TOML file.
    ///
    /// # Errors
    /// I/O errors, or anything [`from_toml`](Self::from_toml) rejects.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject content the engine cannot run: duplicate ids, zero targets,
    /// dangling references.
    ///
    /// # Errors
    /// `EncoreError::Config` naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        unique("companion", self.companions.iter().map(|c| c.id.as_str()))?;
        unique("mission", self.missions.iter().map(|m| m.id.as_str()))?;
        unique("quest", self.quests.iter().map(|q| q.id.as_str()))?;
        unique("npc", self.npcs.iter().map(|n| n.id.as_str()))?;
        unique("gift", self.gifts.iter().map(|g| g.id.as_str()))?;

        if let Some(species) = self.companions.iter().find(|s| {
            s.ability
                .is_some_and(|a| !(a.base_bonus >= 0.0 && a.max_bonus >= a.base_bonus))
        }) {
            return Err(EncoreError::Config(format!(
                "companion {} has an inconsistent ability",
                species.id
            )));
        }
        for template in &self.missions {
            if template.target == 0 {
                return Err(EncoreError::Config(format!("mission {} has a zero target", template.id)));
            }
        }
        for quest in &self.quests {
            if quest.objectives.is_empty() {
                return Err(EncoreError::Config(format!("quest {} has no objectives", quest.id)));
            }
            if quest.objectives.iter().any(|o| o.target == 0) {
                return Err(EncoreError::Config(format!(
                    "quest {} has an objective with a zero target",
                    quest.id
                )));
            }
            if let Some(missing) = quest.prerequisites.iter().find(|p| self.quest(p).is_none()) {
                return Err(EncoreError::Config(format!(
                    "quest {} requires unknown quest {missing}",
                    quest.id
                )));
            }
        }
        Ok(())
    }

    /// Species by id.
    #[must_use]
    pub fn companion(&self, id: &CompanionId) -> Option<&CompanionSpecies> {
        self.companions.iter().find(|c| &c.id == id)
    }

    /// Quest by id.
    #[must_use]
    pub fn quest(&self, id: &QuestId) -> Option<&QuestDefinition> {
        self.quests.iter().find(|q| &q.id == id)
    }

    /// NPC by id.
    #[must_use]
    pub fn npc(&self, id: &NpcId) -> Option<&NpcDef> {
        self.npcs.iter().find(|n| &n.id == id)
    }

    /// Gift by id.
    #[must_use]
    pub fn gift(&self, id: &str) -> Option<&GiftItem> {
        self.gifts.iter().find(|g| g.id == id)
    }
}

fn unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(EncoreError::Config(format!("duplicate {kind} id {id}")));
        }
    }
    Ok(())
}

impl Default for ContentCatalog {
    fn default() -> Self {
        Self {
            companions: default_companions(),
            missions: default_missions(),
            quests: default_quests(),
            npcs: default_npcs(),
            gifts: default_gifts(),
        }
    }
}

fn default_companions() -> Vec<CompanionSpecies> {
    vec![
        CompanionSpecies {
            id: CompanionId::from("metronome_cat"),
            name: "Metronome Cat".into(),
            cost: 100,
            ability: Some(Ability {
                kind: AbilityKind::XpBoost,
                base_bonus: 0.10,
                per_level_bonus: 0.02,
                max_bonus: 0.30,
            }),
        },
        CompanionSpecies {
            id: CompanionId::from("golden_finch"),
            name: "Golden Finch".into(),
            cost: 250,
            ability: Some(Ability {
                kind: AbilityKind::CoinBoost,
                base_bonus: 0.05,
                per_level_bonus: 0.01,
                max_bonus: 0.20,
            }),
        },
        CompanionSpecies {
            id: CompanionId::from("bass_frog"),
            name: "Bass Frog".into(),
            cost: 60,
            ability: None,
        },
    ]
}

fn mission(
    id: &str,
    title: &str,
    cadence: Cadence,
    objective: MissionObjective,
    target: u32,
    rewards: Vec<RewardLine>,
) -> MissionTemplate {
    MissionTemplate {
        id: MissionTemplateId::from(id),
        title: title.into(),
        cadence,
        objective,
        target,
        rewards,
    }
}

fn default_missions() -> Vec<MissionTemplate> {
    use Cadence::{Daily, Weekly};
    use RewardLine::{CompanionXp, Currency, Xp};
    vec![
        mission("daily_answers", "Warm-up", Daily, MissionObjective::AnswerCorrectly { mode: None }, 20, vec![Currency(50), Xp(30)]),
        mission("daily_intervals", "Interval Drill", Daily, MissionObjective::AnswerCorrectly { mode: Some(GameMode::Intervals) }, 10, vec![Currency(40)]),
        mission("daily_streak", "On a Roll", Daily, MissionObjective::ReachStreak { mode: None }, 10, vec![Xp(50)]),
        mission("daily_feed", "Snack Time", Daily, MissionObjective::FeedCompanion, 1, vec![CompanionXp(20)]),
        mission("daily_play", "Play Date", Daily, MissionObjective::PlayWithCompanion, 2, vec![CompanionXp(20)]),
        mission("daily_talk", "Small Talk", Daily, MissionObjective::TalkToNpcs, 3, vec![Currency(30)]),
        mission("daily_busk", "Street Performer", Daily, MissionObjective::Busk, 1, vec![Xp(25)]),
        mission("weekly_monsters", "Silence the Dissonance", Weekly, MissionObjective::DefeatMonsters, 15, vec![Currency(300), Xp(200)]),
        mission("weekly_practice", "Dedicated Musician", Weekly, MissionObjective::PracticeSessions, 5, vec![Currency(200)]),
        mission("weekly_earn", "Savings Jar", Weekly, MissionObjective::EarnCurrency, 1_000, vec![Xp(250)]),
    ]
}

fn default_quests() -> Vec<QuestDefinition> {
    vec![
        QuestDefinition {
            id: QuestId::from("overture"),
            title: "Overture".into(),
            prerequisites: Vec::new(),
            objectives: vec![
                ObjectiveDef {
                    description: "Introduce yourself to Mira at the music shop".into(),
                    trigger: QuestTrigger::TalkTo { npc: NpcId::from("mira") },
                    target: 1,
                    ordering: ObjectiveOrdering::Sequential,
                },
                ObjectiveDef {
                    description: "Answer ten questions correctly".into(),
                    trigger: QuestTrigger::AnswerCorrectly { mode: None },
                    target: 10,
                    ordering: ObjectiveOrdering::Sequential,
                },
            ],
            rewards: vec![RewardLine::Currency(150), RewardLine::Xp(100)],
        },
        QuestDefinition {
            id: QuestId::from("sour_notes"),
            title: "Sour Notes".into(),
            prerequisites: vec![QuestId::from("overture")],
            objectives: vec![
                ObjectiveDef {
                    description: "Defeat the dissonance in the old theatre".into(),
                    trigger: QuestTrigger::Defeat { monster: "dissonance".into() },
                    target: 1,
                    ordering: ObjectiveOrdering::Sequential,
                },
                ObjectiveDef {
                    description: "Recover the conductor's baton".into(),
                    trigger: QuestTrigger::Collect { memento: "baton".into() },
                    target: 1,
                    ordering: ObjectiveOrdering::Parallel,
                },
            ],
            rewards: vec![RewardLine::Currency(400), RewardLine::Xp(300)],
        },
    ]
}

fn default_npcs() -> Vec<NpcDef> {
    vec![
        NpcDef {
            id: NpcId::from("mira"),
            name: "Mira".into(),
            romanceable: true,
            loved_gifts: vec!["violin_strings".into()],
            liked_gifts: vec!["sheet_music".into()],
        },
        NpcDef {
            id: NpcId::from("bram"),
            name: "Bram".into(),
            romanceable: true,
            loved_gifts: vec!["vinyl_record".into()],
            liked_gifts: vec!["coffee".into()],
        },
        NpcDef {
            id: NpcId::from("old_tomas"),
            name: "Old Tomas".into(),
            romanceable: false,
            loved_gifts: vec!["coffee".into()],
            liked_gifts: Vec::new(),
        },
    ]
}

fn default_gifts() -> Vec<GiftItem> {
    vec![
        GiftItem { id: "coffee".into(), price: 10, base_rp: 4 },
        GiftItem { id: "sheet_music".into(), price: 30, base_rp: 8 },
        GiftItem { id: "violin_strings".into(), price: 60, base_rp: 10 },
        GiftItem { id: "vinyl_record".into(), price: 80, base_rp: 12 },
    ]
}
