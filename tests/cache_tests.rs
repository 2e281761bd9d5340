// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-disk cache lifecycle and player round trips.

use chrono::{DateTime, Utc};
use crucible_tracker::db::CacheDb;
use crucible_tracker::error::AppError;
use crucible_tracker::models::{
    ActivityMode, ActivityRecord, ActivityValues, Character, CharacterClass, ClanRef, Identity,
    MembershipType, Player,
};
use std::time::Duration;

fn at(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap()
}

fn sample_player() -> Player {
    let identity = Identity::new("4611686018400000001", MembershipType::Steam);
    let mut player = Player::new(identity, at(1_709_661_600));
    player.display_name = "Guardian".to_string();
    player.display_name_code = Some(42);
    player.linked_identities = vec![Identity::new("4611686018400000002", MembershipType::Psn)];
    player.clan = Some(ClanRef {
        group_id: "881267".to_string(),
        name: "Iron Lords".to_string(),
        call_sign: "IRON".to_string(),
    });
    player.set_characters(
        vec![Character {
            character_id: "2305843009300000001".to_string(),
            class: CharacterClass::Warlock,
            light: 1810,
            date_last_played: at(1_709_665_200),
        }],
        at(1_709_661_600),
    );
    player.log_mut("2305843009300000001").merge(vec![ActivityRecord {
        instance_id: "14000000001".to_string(),
        period: at(1_709_662_800),
        mode: ActivityMode::TRIALS_OF_OSIRIS,
        modes: vec![ActivityMode::TRIALS_OF_OSIRIS, ActivityMode::ALL_PVP],
        reference_id: 2233665874,
        duration_seconds: 610,
        values: ActivityValues {
            score: 20,
            kills: 12,
            assists: 4,
            deaths: 6,
            seconds_played: 540,
            won: true,
        },
    }]);
    player
}

#[tokio::test]
async fn test_player_round_trips_through_disk_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheDb::open(dir.path().join("cache"), Duration::from_secs(5));

    let player = sample_player();
    cache.put_player(&player).await.unwrap();
    cache.flush().await.unwrap();

    let loaded = cache.get_player(&player.player_id()).await.unwrap();
    assert_eq!(loaded, Some(player));
    assert!(cache.is_ready());
}

#[tokio::test]
async fn test_missing_player_is_a_miss() {
    let cache = CacheDb::temporary().unwrap();
    let identity = Identity::new("1", MembershipType::Xbox);

    assert!(cache.get_player(&identity.player_id()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_open_failure_is_cache_unavailable() {
    // A regular file where the store directory should be
    let file = tempfile::NamedTempFile::new().unwrap();
    let cache = CacheDb::open(file.path(), Duration::from_secs(5));

    let err = cache.get_map(1).await.unwrap_err();
    assert!(matches!(err, AppError::CacheUnavailable(_)), "got {:?}", err);
    assert!(!cache.is_ready());
}

#[tokio::test]
async fn test_disabled_cache_rejects_writes() {
    let cache = CacheDb::disabled();
    let err = cache.put_player(&sample_player()).await.unwrap_err();
    assert!(matches!(err, AppError::CacheUnavailable(_)));
}
