//! Property-Based Tests for Encore Core
//!
//! Uses `proptest` to check the engine's invariants under random inputs:
//! bounded RP, monotonic levels, pure reward computation, idempotent decay
//! and exactly-once claims.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use encore_core::companion::CompanionInstance;
use encore_core::config::{EconomyConfig, EncoreConfig, RelationshipConfig};
use encore_core::content::ContentCatalog;
use encore_core::error::Rejection;
use encore_core::level::{level_for_xp, xp_for_level};
use encore_core::mission::{self, MissionBoard, MissionEvent};
use encore_core::profile::PlayerProfile;
use encore_core::progress::Progress;
use encore_core::relationship::{Marriage, RelationshipRecord, RpSource};
use encore_core::reward::{RewardContext, compute_reward};
use encore_core::types::{CompanionId, GameMode, NpcId, Timestamp};

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).single().expect("valid time")
}

fn arb_mode() -> impl Strategy<Value = GameMode> {
    prop_oneof![
        Just(GameMode::Notes),
        Just(GameMode::Intervals),
        Just(GameMode::Chords),
        Just(GameMode::Scales),
        Just(GameMode::Progressions),
        Just(GameMode::Rhythm),
        Just(GameMode::PerfectPitch),
    ]
}

// ---------------------------------------------------------------------------
// Property: RP always stays within [0, tier cap]
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn rp_stays_within_tier_cap(deltas in prop::collection::vec(-300i64..300, 1..60)) {
        let config = RelationshipConfig::default();
        let mut record = RelationshipRecord::new(NpcId::from("mira"), &config).expect("record");
        for delta in deltas {
            let change = record.gain_rp(delta, RpSource::Other, t0(), &config);
            prop_assert!(change.rp <= change.cap);
            prop_assert_eq!(record.rp(), change.rp);
            prop_assert!(record.rp() <= record.cap());
        }
    }
}

// ---------------------------------------------------------------------------
// Property: each checkpoint event fires at most once
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn checkpoint_events_fire_at_most_once(deltas in prop::collection::vec(-60i64..60, 1..80)) {
        let config = RelationshipConfig::default();
        let mut record = RelationshipRecord::new(NpcId::from("bram"), &config).expect("record");
        let mut seen = std::collections::BTreeSet::new();
        for delta in deltas {
            let change = record.gain_rp(delta, RpSource::Story, t0(), &config);
            for key in change.fired {
                prop_assert!(seen.insert(key), "{key} fired twice");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property: level is monotonic in XP and consistent with the thresholds
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn level_is_monotonic_in_xp(a in 0u64..2_000_000, b in 0u64..2_000_000) {
        let economy = EconomyConfig::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(level_for_xp(lo, &economy) <= level_for_xp(hi, &economy));
    }

    #[test]
    fn level_matches_its_threshold(xp in 0u64..5_000_000) {
        let economy = EconomyConfig::default();
        let level = level_for_xp(xp, &economy);
        prop_assert!((1..=economy.max_level).contains(&level));
        prop_assert!(xp_for_level(level, &economy) <= xp);
        if level < economy.max_level {
            prop_assert!(xp < xp_for_level(level + 1, &economy));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: reward computation is pure and never shrinks base amounts
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn reward_is_pure_and_at_least_base(
        base_xp in 0u64..10_000,
        base_currency in 0u64..10_000,
        streak in 0u32..50,
        house in 0u8..6,
        mode in arb_mode(),
        with_companion in any::<bool>(),
    ) {
        let config = EncoreConfig::default();
        let catalog = ContentCatalog::default();
        let mut profile = PlayerProfile::new(t0(), 7);
        profile.set_house_level(house, &config.house);
        if with_companion {
            let mut pet = CompanionInstance::new(CompanionId::from("metronome_cat"), t0());
            pet.active = true;
            profile.companions.insert(pet.companion_id.clone(), pet);
        }
        let before = profile.clone();
        let context = RewardContext::answer(mode, streak, None);

        let first = compute_reward(base_xp, base_currency, &context, &profile, &config, &catalog)
            .expect("reward");
        let second = compute_reward(base_xp, base_currency, &context, &profile, &config, &catalog)
            .expect("reward");

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&profile, &before);
        prop_assert!(first.xp >= base_xp);
        prop_assert!(first.currency >= base_currency);
    }
}

// ---------------------------------------------------------------------------
// Property: marriage decay is idempotent and path-independent
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn marriage_decay_is_idempotent(hours in 0i64..2_000) {
        let config = RelationshipConfig::default();
        let mut once = Marriage::new(NpcId::from("mira"), t0(), &config);
        let now = t0() + Duration::hours(hours);
        once.decay(now, &config);
        let mut twice = once.clone();
        twice.decay(now, &config);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn marriage_decay_splits_cleanly(first in 0i64..500, second in 0i64..500) {
        let config = RelationshipConfig::default();
        let start = t0();
        let mut stepped = Marriage::new(NpcId::from("mira"), start, &config);
        stepped.decay(start + Duration::hours(first), &config);
        stepped.decay(start + Duration::hours(first + second), &config);

        let mut direct = Marriage::new(NpcId::from("mira"), start, &config);
        direct.decay(start + Duration::hours(first + second), &config);

        prop_assert!((stepped.happiness - direct.happiness).abs() < 1e-9);
        prop_assert!(stepped.happiness >= 0.0);
    }
}

// ---------------------------------------------------------------------------
// Property: companion decay is idempotent for a repeated `now`
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn companion_decay_is_idempotent(hours in 0i64..500, seed in any::<u64>()) {
        let config = EncoreConfig::default().companion;
        let mut pet = CompanionInstance::new(CompanionId::from("bass_frog"), t0());
        let now = t0() + Duration::hours(hours);
        pet.periodic_update(now, &config, seed);
        let snapshot = pet.clone();
        let raised = pet.periodic_update(now, &config, seed);
        prop_assert!(raised.is_none());
        prop_assert_eq!(pet, snapshot);
    }
}

// ---------------------------------------------------------------------------
// Property: needs and marriage happiness stay within [0, 100]
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn companion_needs_stay_in_range(
        hunger in 0.0f64..25.0,
        sadness in 0.0f64..25.0,
        steps in prop::collection::vec((0i64..48, 0u8..3), 1..40),
        seed in any::<u64>(),
    ) {
        let config = encore_core::config::CompanionConfig {
            hunger_per_hour: hunger,
            happiness_decay_per_hour: sadness,
            ..EncoreConfig::default().companion
        };
        let mut pet = CompanionInstance::new(CompanionId::from("bass_frog"), t0());
        let mut now = t0();
        for (hours, action) in steps {
            now += Duration::hours(hours);
            pet.periodic_update(now, &config, seed);
            match action {
                0 => {}
                1 => { pet.feed(now, &config); }
                _ => { pet.play(now, &config); }
            }
            prop_assert!((0.0..=100.0).contains(&pet.satiety));
            prop_assert!((0.0..=100.0).contains(&pet.happiness));
        }
    }

    #[test]
    fn marriage_happiness_stays_in_range(
        decay in 0.0f64..50.0,
        steps in prop::collection::vec((0i64..200, 0.0f64..40.0), 1..40),
    ) {
        let config = RelationshipConfig {
            marriage_decay_per_day: decay,
            ..RelationshipConfig::default()
        };
        let mut marriage = Marriage::new(NpcId::from("mira"), t0(), &config);
        let mut now = t0();
        for (hours, cheer) in steps {
            now += Duration::hours(hours);
            marriage.decay(now, &config);
            marriage.cheer(cheer);
            prop_assert!((0.0..=100.0).contains(&marriage.happiness));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: counters never exceed targets
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn progress_stays_clamped(target in 1u32..1_000, deltas in prop::collection::vec(-2_000i64..2_000, 1..40)) {
        let mut progress = Progress::new(target).expect("progress");
        for delta in deltas {
            let step = progress.advance(delta);
            prop_assert!(progress.current() <= target);
            prop_assert!(!step.crossed || (step.before < target && progress.is_complete()));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: a mission is claimed at most once however often it is claimed
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn missions_claim_exactly_once(answers in 0u32..40, claims in 1usize..5, seed in any::<u64>()) {
        let config = EncoreConfig::default();
        let catalog = ContentCatalog::default();
        let mut board = MissionBoard::default();
        mission::refresh_missions(&mut board, t0(), &catalog.missions, &config.missions, seed)
            .expect("refresh");

        for _ in 0..answers {
            mission::update_mission_progress(&mut board, MissionEvent::CorrectAnswer(GameMode::Intervals), 1);
        }

        let ids: Vec<_> = board.missions.iter().map(|m| m.id.clone()).collect();
        for id in ids {
            let completed = board.get(&id).is_some_and(|m| m.completed);
            let mut granted = 0;
            for _ in 0..claims {
                match mission::claim_mission(&mut board, &id) {
                    Ok(_) => granted += 1,
                    Err(Rejection::AlreadyClaimed) => prop_assert!(granted == 1),
                    Err(Rejection::NotCompleted) => prop_assert!(!completed),
                    Err(other) => prop_assert!(false, "unexpected rejection {other}"),
                }
            }
            prop_assert_eq!(granted, usize::from(completed));
        }
    }
}
