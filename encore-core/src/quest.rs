//! Story quests with prerequisites and ordered objectives.
//!
//! A quest is Locked until all of its prerequisites are claimed. Objectives
//! are either sequential (only the current one accepts progress) or
//! parallel (a passive counter that accepts progress at any time). The
//! current index always points at the first incomplete sequential
//! objective, and the quest completes once every objective does. Rewards come only from
//! [`QuestLog::complete_quest`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::content::ContentCatalog;
use crate::error::{Failure, Rejection};
use crate::progress::{Eligibility, Lifecycle, Progress, Tracked};
use crate::reward::RewardLine;
use crate::types::{GameMode, NpcId, QuestId};

/// What moves an objective forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestTrigger {
    /// Talk to an NPC.
    TalkTo {
        /// NPC id.
        npc: NpcId,
    },
    /// Defeat a monster.
    Defeat {
        /// Monster id.
        monster: String,
    },
    /// Collect a memento.
    Collect {
        /// Memento id.
        memento: String,
    },
    /// Answer correctly, optionally in one mode.
    AnswerCorrectly {
        /// Restrict to this mode; `None` accepts any.
        #[serde(default)]
        mode: Option<GameMode>,
    },
    /// Only moved by explicit progress calls.
    Manual,
}

impl QuestTrigger {
    /// Whether an occurrence `event` satisfies this authored trigger.
    #[must_use]
    pub fn matches(&self, event: &QuestTrigger) -> bool {
        match (self, event) {
            (Self::Manual, _) => false,
            (Self::AnswerCorrectly { mode: None }, Self::AnswerCorrectly { .. }) => true,
            _ => self == event,
        }
    }
}

/// How an objective accepts progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveOrdering {
    /// Only while it is the current objective.
    #[default]
    Sequential,
    /// At any time.
    Parallel,
}

/// One authored objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveDef {
    /// Shown to the player.
    pub description: String,
    /// What counts.
    pub trigger: QuestTrigger,
    /// Count needed.
    pub target: u32,
    /// Ordering mode.
    #[serde(default)]
    pub ordering: ObjectiveOrdering,
}

/// An authored quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestDefinition {
    /// Quest id.
    pub id: QuestId,
    /// Display title.
    pub title: String,
    /// Quests that must be claimed first.
    #[serde(default)]
    pub prerequisites: Vec<QuestId>,
    /// Objectives in order.
    pub objectives: Vec<ObjectiveDef>,
    /// Granted on completion claim.
    #[serde(default)]
    pub rewards: Vec<RewardLine>,
}

impl Eligibility for QuestDefinition {
    type Context = QuestLog;

    fn is_eligible(&self, log: &QuestLog) -> bool {
        self.prerequisites
            .iter()
            .all(|p| log.quests.get(p).is_some_and(|q| q.reward_claimed))
    }
}

/// A started quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveQuest {
    /// Quest id.
    pub quest_id: QuestId,
    /// Per-objective progress.
    pub objectives: Vec<Progress>,
    /// First incomplete sequential objective; `objectives.len()` when none.
    pub current_objective: usize,
    /// Every objective complete.
    pub completed: bool,
    /// Reward taken.
    pub reward_claimed: bool,
}

impl Tracked for ActiveQuest {
    fn lifecycle(&self) -> Lifecycle {
        if self.reward_claimed {
            Lifecycle::Claimed
        } else if self.completed {
            Lifecycle::Completed
        } else {
            Lifecycle::Active
        }
    }
}

impl ActiveQuest {
    fn settle(&mut self, def: &QuestDefinition) {
        self.current_objective = self
            .objectives
            .iter()
            .zip(&def.objectives)
            .position(|(p, o)| o.ordering == ObjectiveOrdering::Sequential && !p.is_complete())
            .unwrap_or(self.objectives.len());
        self.completed = self.objectives.iter().all(Progress::is_complete);
    }
}

/// Effect of one objective step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestStep {
    /// Quest.
    pub quest_id: QuestId,
    /// Objective index.
    pub objective: usize,
    /// The step completed the objective.
    pub objective_completed: bool,
    /// The step completed the quest.
    pub quest_completed: bool,
}

/// The player's quests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestLog {
    /// Started quests by id.
    pub quests: BTreeMap<QuestId, ActiveQuest>,
}

impl QuestLog {
    /// Started quest by id.
    #[must_use]
    pub fn get(&self, id: &QuestId) -> Option<&ActiveQuest> {
        self.quests.get(id)
    }

    /// Lifecycle of `def` for this player.
    #[must_use]
    pub fn lifecycle(&self, def: &QuestDefinition) -> Lifecycle {
        match self.quests.get(&def.id) {
            Some(quest) => quest.lifecycle(),
            None if def.is_eligible(self) => Lifecycle::Available,
            None => Lifecycle::Locked,
        }
    }

    /// Start an available quest.
    ///
    /// # Errors
    /// [`Rejection::QuestAlreadyStarted`] or [`Rejection::QuestLocked`];
    /// [`Failure::Internal`] for an objective with a zero target.
    pub fn start_quest(&mut self, def: &QuestDefinition) -> Result<(), Failure> {
        match self.lifecycle(def) {
            Lifecycle::Available => {}
            Lifecycle::Locked => return Err(Rejection::QuestLocked.into()),
            _ => return Err(Rejection::QuestAlreadyStarted.into()),
        }
        let objectives = def
            .objectives
            .iter()
            .map(|o| Progress::new(o.target))
            .collect::<crate::error::Result<Vec<_>>>()?;
        let mut quest = ActiveQuest {
            quest_id: def.id.clone(),
            objectives,
            current_objective: 0,
            completed: false,
            reward_claimed: false,
        };
        quest.settle(def);
        self.quests.insert(def.id.clone(), quest);
        info!(quest = %def.id, "Quest started");
        Ok(())
    }

    /// Advance exactly the objective at `index`.
    ///
    /// # Errors
    /// [`Rejection::QuestNotActive`] unless the quest is in progress,
    /// [`Rejection::ObjectiveOutOfRange`], or
    /// [`Rejection::ObjectiveOutOfOrder`] for a sequential objective that is
    /// not current.
    pub fn progress_quest(
        &mut self,
        def: &QuestDefinition,
        index: usize,
        amount: u32,
    ) -> Result<QuestStep, Rejection> {
        let quest = self
            .quests
            .get_mut(&def.id)
            .filter(|q| q.accepts_progress())
            .ok_or(Rejection::QuestNotActive)?;
        let objective = def
            .objectives
            .get(index)
            .ok_or(Rejection::ObjectiveOutOfRange(index))?;
        if objective.ordering == ObjectiveOrdering::Sequential && index != quest.current_objective {
            return Err(Rejection::ObjectiveOutOfOrder {
                requested: index,
                current: quest.current_objective,
            });
        }
        let progress = quest
            .objectives
            .get_mut(index)
            .ok_or(Rejection::ObjectiveOutOfRange(index))?;
        let step = progress.advance(i64::from(amount));
        quest.settle(def);

        debug!(quest = %def.id, objective = index, progress = step.after, "Quest objective progressed");
        if quest.completed && step.crossed {
            info!(quest = %def.id, "Quest completed");
        }
        Ok(QuestStep {
            quest_id: def.id.clone(),
            objective: index,
            objective_completed: step.crossed,
            quest_completed: step.crossed && quest.completed,
        })
    }

    /// Route an occurrence to every objective it can currently address.
    ///
    /// Sequential objectives are only addressed when current at the time of
    /// the call, so one occurrence never completes two sequential steps.
    pub fn progress_matching(
        &mut self,
        catalog: &ContentCatalog,
        occurrence: &QuestTrigger,
        amount: u32,
    ) -> Vec<QuestStep> {
        let active: Vec<(QuestId, usize)> = self
            .quests
            .values()
            .filter(|q| q.accepts_progress())
            .map(|q| (q.quest_id.clone(), q.current_objective))
            .collect();

        let mut steps = Vec::new();
        for (quest_id, current) in active {
            let Some(def) = catalog.quest(&quest_id) else {
                continue;
            };
            let targets: Vec<usize> = def
                .objectives
                .iter()
                .enumerate()
                .filter(|(idx, o)| {
                    o.trigger.matches(occurrence)
                        && (o.ordering == ObjectiveOrdering::Parallel || *idx == current)
                })
                .map(|(idx, _)| idx)
                .collect();
            for idx in targets {
                if let Ok(step) = self.progress_quest(def, idx, amount) {
                    steps.push(step);
                }
            }
        }
        steps
    }

    /// Claim a completed quest's rewards, exactly once.
    ///
    /// # Errors
    /// [`Rejection::QuestNotActive`] if never started,
    /// [`Rejection::NotCompleted`] or [`Rejection::AlreadyClaimed`].
    pub fn complete_quest(&mut self, def: &QuestDefinition) -> Result<Vec<RewardLine>, Rejection> {
        let quest = self.quests.get_mut(&def.id).ok_or(Rejection::QuestNotActive)?;
        match quest.lifecycle() {
            Lifecycle::Claimed => Err(Rejection::AlreadyClaimed),
            Lifecycle::Completed => {
                quest.reward_claimed = true;
                info!(quest = %def.id, "Quest reward claimed");
                Ok(def.rewards.clone())
            }
            _ => Err(Rejection::NotCompleted),
        }
    }
}
