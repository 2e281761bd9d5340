// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Windowed stats over a log built from a mock history.

mod common;

use chrono::{DateTime, TimeZone, Utc, Weekday};
use common::{activity, history_page, history_path, test_identity, CHARACTER_ID};
use crucible_tracker::config::Config;
use crucible_tracker::db::CacheDb;
use crucible_tracker::models::{ActivityMode, StatsWindow};
use crucible_tracker::services::{StatsCalendar, Tracker, WeeklyReset};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn tracker_with_history(server: &MockServer, season_start: DateTime<Utc>) -> Tracker {
    Mock::given(method("GET"))
        .and(path(history_path()))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_page(vec![
            activity("3003", "2024-03-05T20:00:00Z", &[10, 5], 10, 5),
            activity("3002", "2024-03-05T19:00:00Z", &[10, 5], 4, 8),
            activity("3001", "2024-03-05T18:00:00Z", &[84, 5], 12, 3),
        ])))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(history_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_page(vec![])))
        .mount(server)
        .await;

    let config = Config {
        season_start,
        ..common::test_config(&server.uri())
    };
    Tracker::new(
        config.clone(),
        common::test_client(&config),
        CacheDb::temporary().unwrap(),
    )
}

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[tokio::test]
async fn test_all_time_equals_sum_of_log() {
    let server = MockServer::start().await;
    let tracker = tracker_with_history(&server, at("2025-07-15T17:00:00Z")).await;
    let identity = test_identity();

    let summary = tracker
        .get_stats(&identity, CHARACTER_ID, StatsWindow::AllTime, ActivityMode::ALL_PVP)
        .await
        .unwrap();

    assert_eq!(summary.totals.activities_entered, 3);
    assert_eq!(summary.totals.kills, 26);
    assert_eq!(summary.totals.deaths, 16);
    assert_eq!(summary.totals.assists, 6);
    assert_eq!(summary.totals.activities_won, 2);
    assert_eq!(summary.totals.seconds_played, 1800);
    assert!((summary.kd - 26.0 / 16.0).abs() < 1e-9);
    assert!((summary.win_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!((summary.hours_played - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_narrow_mode_filters_log() {
    let server = MockServer::start().await;
    let tracker = tracker_with_history(&server, at("2025-07-15T17:00:00Z")).await;

    let summary = tracker
        .get_stats(
            &test_identity(),
            CHARACTER_ID,
            StatsWindow::AllTime,
            ActivityMode::TRIALS_OF_OSIRIS,
        )
        .await
        .unwrap();

    assert_eq!(summary.totals.activities_entered, 1);
    assert_eq!(summary.kd, 4.0);
    assert_eq!(summary.kad, 14.0 / 3.0);
}

#[tokio::test]
async fn test_seasonal_window_starts_at_season_start() {
    let server = MockServer::start().await;
    let tracker = tracker_with_history(&server, at("2024-03-05T19:30:00Z")).await;

    let summary = tracker
        .get_stats(&test_identity(), CHARACTER_ID, StatsWindow::Seasonal, ActivityMode::ALL_PVP)
        .await
        .unwrap();

    assert_eq!(summary.start, at("2024-03-05T19:30:00Z"));
    assert_eq!(summary.totals.activities_entered, 1);
    assert_eq!(summary.totals.kills, 10);
}

#[tokio::test]
async fn test_weekly_window_excludes_old_matches() {
    let server = MockServer::start().await;
    let tracker = tracker_with_history(&server, at("2025-07-15T17:00:00Z")).await;

    let summary = tracker
        .get_stats(&test_identity(), CHARACTER_ID, StatsWindow::Weekly, ActivityMode::ALL_PVP)
        .await
        .unwrap();

    assert_eq!(summary.totals.activities_entered, 0);
    assert_eq!(summary.kd, 0.0);
    assert_eq!(summary.per_game.kills, 0.0);
}

#[test]
fn test_weekly_reset_boundary() {
    let reset = WeeklyReset::new(Weekday::Tue, 17, 0);
    let boundary = Utc.with_ymd_and_hms(2024, 3, 5, 17, 0, 0).unwrap();

    assert_eq!(reset.most_recent(boundary), boundary);
    assert_eq!(
        reset.most_recent(boundary - chrono::TimeDelta::seconds(1)),
        Utc.with_ymd_and_hms(2024, 2, 27, 17, 0, 0).unwrap()
    );
    assert_eq!(
        reset.most_recent(Utc.with_ymd_and_hms(2024, 3, 11, 23, 59, 59).unwrap()),
        boundary
    );
}

#[test]
fn test_calendar_windows_end_now() {
    let calendar = StatsCalendar::from_config(&Config::default());
    let now = Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap();

    let weekly = calendar.window(StatsWindow::Weekly, now);
    assert_eq!(weekly.start, Utc.with_ymd_and_hms(2025, 7, 29, 17, 0, 0).unwrap());
    assert_eq!(weekly.end, now);

    let seasonal = calendar.window(StatsWindow::Seasonal, now);
    assert_eq!(seasonal.start, Config::default().season_start);
    assert!(seasonal.contains(now));
}
