// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Time-windowed aggregation over activity logs.
//!
//! Aggregates are recomputed from the log on each call. The log is sorted
//! newest first, so a scan stops at the first record older than the window
//! and weekly or seasonal windows only touch their own records.

use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, TimeZone, Utc, Weekday};

use crate::config::Config;
use crate::models::{ActivityLog, ActivityMode, AggregateResult, Player, StatsWindow, TimeWindow};

/// Sum the records of `log` that fall in `window` and qualify under `mode`.
pub fn aggregate(log: &ActivityLog, mode: ActivityMode, window: &TimeWindow) -> AggregateResult {
    let mut result = AggregateResult::default();

    for record in log.records() {
        if record.period < window.start {
            break;
        }
        if window.contains(record.period) && record.qualifies_for(mode) {
            result.add(&record.values);
        }
    }

    result
}

/// Aggregate one character of a player. Unknown characters aggregate to zero.
pub fn aggregate_character(
    player: &Player,
    character_id: &str,
    mode: ActivityMode,
    window: &TimeWindow,
) -> AggregateResult {
    player
        .log(character_id)
        .map(|log| aggregate(log, mode, window))
        .unwrap_or_default()
}

/// The game's weekly reset: a weekday and hour in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyReset {
    weekday: Weekday,
    time: NaiveTime,
    utc_offset_hours: i32,
}

impl WeeklyReset {
    pub fn new(weekday: Weekday, hour: u32, utc_offset_hours: i32) -> Self {
        Self {
            weekday,
            time: NaiveTime::from_hms_opt(hour % 24, 0, 0).unwrap_or(NaiveTime::MIN),
            utc_offset_hours,
        }
    }

    /// Latest reset instant at or before `now`.
    ///
    /// On the reset day itself, before the reset hour, this is the previous
    /// week's reset.
    pub fn most_recent(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let offset = TimeDelta::hours(i64::from(self.utc_offset_hours));
        let local = now.naive_utc() + offset;

        let days_back = (local.weekday().num_days_from_monday() + 7
            - self.weekday.num_days_from_monday())
            % 7;
        let reset_date = local.date() - TimeDelta::days(i64::from(days_back));
        let reset_local = reset_date.and_time(self.time);

        let candidate = Utc.from_utc_datetime(&(reset_local - offset));
        if candidate > now {
            candidate - TimeDelta::weeks(1)
        } else {
            candidate
        }
    }
}

/// Calendar anchors of the three canonical windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsCalendar {
    pub all_time_start: DateTime<Utc>,
    pub season_start: DateTime<Utc>,
    pub weekly_reset: WeeklyReset,
}

impl StatsCalendar {
    pub fn from_config(config: &Config) -> Self {
        Self {
            all_time_start: config.all_time_start,
            season_start: config.season_start,
            weekly_reset: WeeklyReset::new(
                config.weekly_reset_day,
                config.weekly_reset_hour,
                config.weekly_reset_utc_offset_hours,
            ),
        }
    }

    /// Concrete bounds of `window` as of `now`.
    pub fn window(&self, window: StatsWindow, now: DateTime<Utc>) -> TimeWindow {
        let start = match window {
            StatsWindow::AllTime => self.all_time_start,
            StatsWindow::Seasonal => self.season_start,
            StatsWindow::Weekly => self.weekly_reset.most_recent(now),
        };
        TimeWindow::new(start, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityRecord, ActivityValues};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn record(id: &str, period: &str, modes: &[u32], kills: u32, deaths: u32) -> ActivityRecord {
        ActivityRecord {
            instance_id: id.to_string(),
            period: at(period),
            mode: ActivityMode(modes[0]),
            modes: modes.iter().copied().map(ActivityMode).collect(),
            reference_id: 1,
            duration_seconds: 600,
            values: ActivityValues {
                score: 1,
                kills,
                assists: 1,
                deaths,
                seconds_played: 600,
                won: kills > deaths,
            },
        }
    }

    fn tuesday_reset() -> WeeklyReset {
        WeeklyReset::new(Weekday::Tue, 17, 0)
    }

    #[test]
    fn test_weekly_reset_exact_boundary_selects_itself() {
        // 2024-03-05 is a Tuesday
        let now = at("2024-03-05T17:00:00Z");
        assert_eq!(tuesday_reset().most_recent(now), now);
    }

    #[test]
    fn test_weekly_reset_later_in_week() {
        let now = at("2024-03-08T09:30:00Z");
        assert_eq!(
            tuesday_reset().most_recent(now),
            at("2024-03-05T17:00:00Z")
        );
    }

    #[test]
    fn test_weekly_reset_day_before_hour_rolls_back() {
        let now = at("2024-03-05T16:59:59Z");
        assert_eq!(
            tuesday_reset().most_recent(now),
            at("2024-02-27T17:00:00Z")
        );
    }

    #[test]
    fn test_weekly_reset_with_offset() {
        // Tuesday 09:00 at UTC-8 is Tuesday 17:00 UTC
        let reset = WeeklyReset::new(Weekday::Tue, 9, -8);
        assert_eq!(
            reset.most_recent(at("2024-03-06T01:00:00Z")),
            at("2024-03-05T17:00:00Z")
        );
        // Wednesday 00:30 UTC is still Tuesday locally, after the reset
        assert_eq!(
            reset.most_recent(at("2024-03-06T00:30:00Z")),
            at("2024-03-05T17:00:00Z")
        );
    }

    #[test]
    fn test_all_time_matches_manual_sum() {
        let mut log = ActivityLog::new();
        log.merge(vec![
            record("1", "2024-01-01T10:00:00Z", &[70, 5], 10, 5),
            record("2", "2024-02-01T10:00:00Z", &[84, 5], 7, 7),
            record("3", "2024-03-01T10:00:00Z", &[48], 20, 2),
            record("4", "2024-03-02T10:00:00Z", &[70, 5], 3, 9),
        ]);

        let window = TimeWindow::new(at("2015-01-01T00:00:00Z"), at("2024-04-01T00:00:00Z"));
        let agg = aggregate(&log, ActivityMode::ALL_PVP, &window);

        let expected_kills: u32 = log
            .records()
            .iter()
            .filter(|r| r.qualifies_for(ActivityMode::ALL_PVP))
            .map(|r| r.values.kills)
            .sum();
        assert_eq!(agg.kills, expected_kills);
        assert_eq!(agg.activities_entered, 3);
        assert_eq!(agg.deaths, 21);
    }

    #[test]
    fn test_window_bounds() {
        let mut log = ActivityLog::new();
        log.merge(vec![
            record("old", "2024-02-20T10:00:00Z", &[5], 1, 1),
            record("in", "2024-03-06T10:00:00Z", &[5], 2, 1),
            record("future", "2024-03-20T10:00:00Z", &[5], 4, 1),
        ]);

        let window = TimeWindow::new(at("2024-03-05T17:00:00Z"), at("2024-03-10T00:00:00Z"));
        let agg = aggregate(&log, ActivityMode::ALL_PVP, &window);

        assert_eq!(agg.activities_entered, 1);
        assert_eq!(agg.kills, 2);
    }

    #[test]
    fn test_zero_deaths_kd() {
        let mut log = ActivityLog::new();
        log.merge(vec![record("1", "2024-03-06T10:00:00Z", &[5], 5, 0)]);

        let window = TimeWindow::new(at("2015-01-01T00:00:00Z"), at("2024-04-01T00:00:00Z"));
        assert_eq!(aggregate(&log, ActivityMode::ALL_PVP, &window).kd(), 5.0);
    }

    #[test]
    fn test_calendar_windows() {
        let calendar = StatsCalendar::from_config(&Config::default());
        let now = at("2025-08-01T12:00:00Z");

        assert_eq!(
            calendar.window(StatsWindow::Seasonal, now).start,
            at("2025-07-15T17:00:00Z")
        );
        assert_eq!(
            calendar.window(StatsWindow::Weekly, now).start,
            at("2025-07-29T17:00:00Z")
        );
        assert_eq!(calendar.window(StatsWindow::AllTime, now).end, now);
    }
}
