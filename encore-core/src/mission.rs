//! Daily and weekly missions.
//!
//! Each cadence has a cycle key (UTC date shifted by the reset hour for
//! dailies, ISO week for weeklies). When the key moves on, the board drops
//! that cadence's missions and draws a fresh set from the template pool,
//! uniformly and without replacement, with an RNG seeded from the player's
//! seed and the cycle key. Re-running a refresh inside the same cycle is a
//! no-op, so the draw is stable across restarts.
//!
//! Completing a mission grants nothing; rewards come only from
//! [`claim_mission`].

use chrono::{Datelike, Duration};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MissionConfig;
use crate::error::{Rejection, Result};
use crate::progress::{Eligibility, Lifecycle, Progress, Tracked};
use crate::reward::RewardLine;
use crate::types::{GameMode, MissionId, MissionTemplateId, Timestamp, mix_seed};

/// How often a mission rotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Resets every day at the configured hour.
    Daily,
    /// Resets every ISO week.
    Weekly,
}

/// What a mission counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionObjective {
    /// Correct answers, optionally in one mode.
    AnswerCorrectly {
        /// Restrict to this mode.
        #[serde(default)]
        mode: Option<GameMode>,
    },
    /// Reach a streak; the mission target is the streak length.
    ReachStreak {
        /// Restrict to this mode.
        #[serde(default)]
        mode: Option<GameMode>,
    },
    /// Defeat monsters.
    DefeatMonsters,
    /// Talk to NPCs.
    TalkToNpcs,
    /// Feed the active companion.
    FeedCompanion,
    /// Play with the active companion.
    PlayWithCompanion,
    /// Finish practice sessions.
    PracticeSessions,
    /// Busk.
    Busk,
    /// Earn currency from any source.
    EarnCurrency,
}

/// Something that happened which missions may count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionEvent {
    /// A correct answer in a mode.
    CorrectAnswer(GameMode),
    /// Current streak in a mode; the amount is the absolute streak.
    Streak(GameMode),
    /// A monster was defeated.
    MonsterDefeated,
    /// A conversation took place.
    NpcTalk,
    /// The active companion was fed.
    CompanionFed,
    /// The active companion was played with.
    CompanionPlayed,
    /// A practice session finished.
    Practice,
    /// A busking session finished.
    Busked,
    /// Currency was credited.
    CurrencyEarned,
}

/// How a matching event moves a mission.
enum Step {
    Add,
    AtLeast,
}

impl MissionObjective {
    fn step_for(&self, event: MissionEvent) -> Option<Step> {
        let mode_ok = |wanted: &Option<GameMode>, got: GameMode| wanted.is_none_or(|m| m == got);
        match (self, event) {
            (Self::AnswerCorrectly { mode }, MissionEvent::CorrectAnswer(got)) if mode_ok(mode, got) => {
                Some(Step::Add)
            }
            (Self::ReachStreak { mode }, MissionEvent::Streak(got)) if mode_ok(mode, got) => {
                Some(Step::AtLeast)
            }
            (Self::DefeatMonsters, MissionEvent::MonsterDefeated)
            | (Self::TalkToNpcs, MissionEvent::NpcTalk)
            | (Self::FeedCompanion, MissionEvent::CompanionFed)
            | (Self::PlayWithCompanion, MissionEvent::CompanionPlayed)
            | (Self::PracticeSessions, MissionEvent::Practice)
            | (Self::Busk, MissionEvent::Busked)
            | (Self::EarnCurrency, MissionEvent::CurrencyEarned) => Some(Step::Add),
            _ => None,
        }
    }
}

/// A mission as authored in the content catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionTemplate {
    /// Template id.
    pub id: MissionTemplateId,
    /// Display title.
    pub title: String,
    /// Rotation.
    pub cadence: Cadence,
    /// What is counted.
    pub objective: MissionObjective,
    /// Count needed.
    pub target: u32,
    /// Granted on claim.
    #[serde(default)]
    pub rewards: Vec<RewardLine>,
}

impl Eligibility for MissionTemplate {
    type Context = MissionBoard;

    /// A template can be drawn when no mission from it sits on the board.
    fn is_eligible(&self, board: &MissionBoard) -> bool {
        !board.missions.iter().any(|m| m.template_id == self.id)
    }
}

/// A drawn mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveMission {
    /// Instance id, unique across cycles.
    pub id: MissionId,
    /// Source template.
    pub template_id: MissionTemplateId,
    /// Display title.
    pub title: String,
    /// Rotation.
    pub cadence: Cadence,
    /// What is counted.
    pub objective: MissionObjective,
    /// Progress toward the target.
    pub progress: Progress,
    /// Target reached.
    pub completed: bool,
    /// Reward taken.
    pub claimed: bool,
    /// Cycle key the mission belongs to.
    pub cycle: String,
    /// Granted on claim.
    pub rewards: Vec<RewardLine>,
}

impl Tracked for ActiveMission {
    fn lifecycle(&self) -> Lifecycle {
        if self.claimed {
            Lifecycle::Claimed
        } else if self.completed {
            Lifecycle::Completed
        } else {
            Lifecycle::Active
        }
    }
}

/// The player's current missions and the cycles they were drawn for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionBoard {
    /// Missions of the current cycles.
    pub missions: Vec<ActiveMission>,
    /// Cycle key of the current dailies.
    pub daily_cycle: Option<String>,
    /// Cycle key of the current weeklies.
    pub weekly_cycle: Option<String>,
}

impl MissionBoard {
    /// Mission by instance id.
    #[must_use]
    pub fn get(&self, id: &MissionId) -> Option<&ActiveMission> {
        self.missions.iter().find(|m| &m.id == id)
    }

    /// Missions of one cadence.
    pub fn of(&self, cadence: Cadence) -> impl Iterator<Item = &ActiveMission> + '_ {
        self.missions.iter().filter(move |m| m.cadence == cadence)
    }

    fn cycle_mut(&mut self, cadence: Cadence) -> &mut Option<String> {
        match cadence {
            Cadence::Daily => &mut self.daily_cycle,
            Cadence::Weekly => &mut self.weekly_cycle,
        }
    }
}

/// Cycle key for `now`.
#[must_use]
pub fn cycle_key(cadence: Cadence, now: Timestamp, config: &MissionConfig) -> String {
    let shifted = (now - Duration::hours(i64::from(config.daily_reset_hour))).date_naive();
    match cadence {
        Cadence::Daily => shifted.format("%Y-%m-%d").to_string(),
        Cadence::Weekly => {
            let week = shifted.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
    }
}

/// What one refresh did for one cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CadenceRefresh {
    /// Rotation.
    pub cadence: Cadence,
    /// New cycle key.
    pub cycle: String,
    /// Missions dropped from the expired cycle.
    pub discarded: usize,
    /// Missions drawn.
    pub drawn: Vec<MissionId>,
}

/// Result of [`refresh_missions`]; empty when nothing rotated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// One entry per rotated cadence.
    pub rotated: Vec<CadenceRefresh>,
}

impl RefreshReport {
    /// Whether any cadence rotated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rotated.is_empty()
    }
}

/// Rotate every cadence whose cycle has moved on.
///
/// # Errors
/// [`EncoreError::Invariant`](crate::error::EncoreError::Invariant) for a
/// template with a zero target.
pub fn refresh_missions(
    board: &mut MissionBoard,
    now: Timestamp,
    pool: &[MissionTemplate],
    config: &MissionConfig,
    seed: u64,
) -> Result<RefreshReport> {
    let mut report = RefreshReport::default();
    for (cadence, slots) in [
        (Cadence::Daily, config.daily_slots),
        (Cadence::Weekly, config.weekly_slots),
    ] {
        let key = cycle_key(cadence, now, config);
        if board.cycle_mut(cadence).as_deref() == Some(key.as_str()) {
            continue;
        }

        let before = board.missions.len();
        board.missions.retain(|m| m.cadence != cadence);
        let discarded = before - board.missions.len();

        let candidates: Vec<&MissionTemplate> = pool
            .iter()
            .filter(|t| t.cadence == cadence && t.is_eligible(board))
            .collect();
        let salt = format!("{cadence:?}:{key}");
        let mut rng = StdRng::seed_from_u64(mix_seed(seed, &salt));

        let mut fresh = Vec::with_capacity(slots);
        for template in candidates.choose_multiple(&mut rng, slots) {
            fresh.push(ActiveMission {
                id: MissionId::from(format!("{key}:{}", template.id)),
                template_id: template.id.clone(),
                title: template.title.clone(),
                cadence,
                objective: template.objective.clone(),
                progress: Progress::new(template.target)?,
                completed: false,
                claimed: false,
                cycle: key.clone(),
                rewards: template.rewards.clone(),
            });
        }
        let drawn: Vec<MissionId> = fresh.iter().map(|m| m.id.clone()).collect();
        board.missions.extend(fresh);
        *board.cycle_mut(cadence) = Some(key.clone());

        info!(?cadence, cycle = %key, discarded, drawn = drawn.len(), "Missions rotated");
        report.rotated.push(CadenceRefresh {
            cadence,
            cycle: key,
            discarded,
            drawn,
        });
    }
    Ok(report)
}

/// Count `event` toward every matching active mission. Returns the ids of
/// missions that completed with this step.
pub fn update_mission_progress(board: &mut MissionBoard, event: MissionEvent, amount: u32) -> Vec<MissionId> {
    let mut completed = Vec::new();
    for mission in board.missions.iter_mut().filter(|m| m.accepts_progress()) {
        let step = match mission.objective.step_for(event) {
            Some(Step::Add) => mission.progress.advance(i64::from(amount)),
            Some(Step::AtLeast) if amount > mission.progress.current() => mission.progress.set(amount),
            _ => continue,
        };
        if step.crossed {
            mission.completed = true;
            debug!(mission = %mission.id, "Mission completed");
            completed.push(mission.id.clone());
        }
    }
    completed
}

/// Claim a completed mission's reward lines, exactly once.
///
/// # Errors
/// [`Rejection::UnknownMission`], [`Rejection::NotCompleted`] or
/// [`Rejection::AlreadyClaimed`]; the board is unchanged.
pub fn claim_mission(board: &mut MissionBoard, id: &MissionId) -> std::result::Result<Vec<RewardLine>, Rejection> {
    let mission = board
        .missions
        .iter_mut()
        .find(|m| &m.id == id)
        .ok_or(Rejection::UnknownMission)?;
    match mission.lifecycle() {
        Lifecycle::Claimed => Err(Rejection::AlreadyClaimed),
        Lifecycle::Completed => {
            mission.claimed = true;
            info!(mission = %mission.id, "Mission claimed");
            Ok(mission.rewards.clone())
        }
        _ => Err(Rejection::NotCompleted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(y: i32, m: u32, d: u32, h: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("valid time")
    }

    fn template(id: &str, cadence: Cadence, objective: MissionObjective, target: u32) -> MissionTemplate {
        MissionTemplate {
            id: MissionTemplateId::from(id),
            title: id.to_string(),
            cadence,
            objective,
            target,
            rewards: vec![RewardLine::Currency(50)],
        }
    }

    fn pool() -> Vec<MissionTemplate> {
        vec![
            template("answer_10", Cadence::Daily, MissionObjective::AnswerCorrectly { mode: None }, 10),
            template("feed", Cadence::Daily, MissionObjective::FeedCompanion, 1),
            template("talk", Cadence::Daily, MissionObjective::TalkToNpcs, 3),
            template("busk", Cadence::Daily, MissionObjective::Busk, 1),
            template("monsters", Cadence::Weekly, MissionObjective::DefeatMonsters, 20),
            template("practice", Cadence::Weekly, MissionObjective::PracticeSessions, 5),
            template("streak", Cadence::Weekly, MissionObjective::ReachStreak { mode: None }, 15),
        ]
    }

    #[test]
    fn refresh_is_idempotent_within_a_cycle() {
        let config = MissionConfig::default();
        let mut board = MissionBoard::default();
        let first = refresh_missions(&mut board, at(2026, 4, 6, 9), &pool(), &config, 7).expect("refresh");
        assert_eq!(first.rotated.len(), 2);
        assert_eq!(board.of(Cadence::Daily).count(), config.daily_slots);
        assert_eq!(board.of(Cadence::Weekly).count(), config.weekly_slots);

        let snapshot = board.clone();
        let again = refresh_missions(&mut board, at(2026, 4, 6, 23), &pool(), &config, 7).expect("refresh");
        assert!(again.is_empty());
        assert_eq!(board, snapshot);
    }

    #[test]
    fn draw_has_no_duplicates_and_is_deterministic() {
        let config = MissionConfig::default();
        let mut a = MissionBoard::default();
        let mut b = MissionBoard::default();
        refresh_missions(&mut a, at(2026, 4, 6, 9), &pool(), &config, 99).expect("a");
        refresh_missions(&mut b, at(2026, 4, 6, 9), &pool(), &config, 99).expect("b");
        assert_eq!(a, b);

        let mut ids: Vec<_> = a.missions.iter().map(|m| m.template_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), a.missions.len());
    }

    #[test]
    fn new_day_replaces_only_dailies() {
        let config = MissionConfig::default();
        let mut board = MissionBoard::default();
        // Tuesday and Wednesday of the same ISO week.
        refresh_missions(&mut board, at(2026, 4, 7, 9), &pool(), &config, 1).expect("day one");
        let weeklies: Vec<_> = board.of(Cadence::Weekly).cloned().collect();
        let report = refresh_missions(&mut board, at(2026, 4, 8, 9), &pool(), &config, 1).expect("day two");
        assert_eq!(report.rotated.len(), 1);
        assert_eq!(report.rotated[0].cadence, Cadence::Daily);
        assert_eq!(report.rotated[0].discarded, config.daily_slots);
        assert_eq!(board.of(Cadence::Weekly).cloned().collect::<Vec<_>>(), weeklies);
        assert!(board.of(Cadence::Daily).all(|m| m.cycle == "2026-04-08"));
    }

    #[test]
    fn reset_hour_shifts_the_daily_key() {
        let config = MissionConfig {
            daily_reset_hour: 6,
            ..MissionConfig::default()
        };
        assert_eq!(cycle_key(Cadence::Daily, at(2026, 4, 8, 5), &config), "2026-04-07");
        assert_eq!(cycle_key(Cadence::Daily, at(2026, 4, 8, 6), &config), "2026-04-08");
        assert_eq!(cycle_key(Cadence::Weekly, at(2026, 4, 8, 6), &config), "2026-W15");
    }

    #[test]
    fn short_pool_draws_what_it_has() {
        let config = MissionConfig {
            daily_slots: 10,
            ..MissionConfig::default()
        };
        let mut board = MissionBoard::default();
        refresh_missions(&mut board, at(2026, 4, 6, 9), &pool(), &config, 3).expect("refresh");
        assert_eq!(board.of(Cadence::Daily).count(), 4);
    }

    #[test]
    fn progress_fans_out_and_completes_once() {
        let mut board = MissionBoard::default();
        let config = MissionConfig {
            daily_slots: 4,
            ..MissionConfig::default()
        };
        refresh_missions(&mut board, at(2026, 4, 6, 9), &pool(), &config, 3).expect("refresh");
        let answer_id = MissionId::from("2026-04-06:answer_10");

        for _ in 0..9 {
            assert!(update_mission_progress(&mut board, MissionEvent::CorrectAnswer(GameMode::Notes), 1).is_empty());
        }
        let done = update_mission_progress(&mut board, MissionEvent::CorrectAnswer(GameMode::Chords), 1);
        assert_eq!(done, vec![answer_id.clone()]);
        assert!(update_mission_progress(&mut board, MissionEvent::CorrectAnswer(GameMode::Notes), 1).is_empty());
        assert_eq!(board.get(&answer_id).map(Tracked::lifecycle), Some(Lifecycle::Completed));
    }

    #[test]
    fn streak_objective_tracks_best_value() {
        let mut board = MissionBoard::default();
        refresh_missions(&mut board, at(2026, 4, 6, 9), &pool(), &MissionConfig { weekly_slots: 3, ..MissionConfig::default() }, 3)
            .expect("refresh");
        let id = MissionId::from("2026-W15:streak");
        update_mission_progress(&mut board, MissionEvent::Streak(GameMode::Rhythm), 9);
        update_mission_progress(&mut board, MissionEvent::Streak(GameMode::Rhythm), 2);
        assert_eq!(board.get(&id).map(|m| m.progress.current()), Some(9));
        let done = update_mission_progress(&mut board, MissionEvent::Streak(GameMode::Rhythm), 15);
        assert_eq!(done, vec![id]);
    }

    #[test]
    fn claim_exactly_once() {
        let mut board = MissionBoard::default();
        let config = MissionConfig {
            daily_slots: 4,
            ..MissionConfig::default()
        };
        refresh_missions(&mut board, at(2026, 4, 6, 9), &pool(), &config, 3).expect("refresh");
        let feed = MissionId::from("2026-04-06:feed");

        assert_eq!(claim_mission(&mut board, &feed), Err(Rejection::NotCompleted));
        update_mission_progress(&mut board, MissionEvent::CompanionFed, 1);
        assert_eq!(claim_mission(&mut board, &feed), Ok(vec![RewardLine::Currency(50)]));
        assert_eq!(claim_mission(&mut board, &feed), Err(Rejection::AlreadyClaimed));
        assert_eq!(
            claim_mission(&mut board, &MissionId::from("nope")),
            Err(Rejection::UnknownMission)
        );
    }

    #[test]
    fn zero_target_template_is_an_invariant_violation() {
        let bad = vec![template("broken", Cadence::Daily, MissionObjective::Busk, 0)];
        let mut board = MissionBoard::default();
        assert!(refresh_missions(&mut board, at(2026, 4, 6, 9), &bad, &MissionConfig::default(), 0).is_err());
    }
}
