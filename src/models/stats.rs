// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Aggregate statistics over a window of an activity log.
//!
//! Aggregates are derived data: they are recomputed from the log on every
//! request and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::ActivityValues;

/// `numerator / deaths`, where zero deaths makes the numerator the ratio.
pub fn death_ratio(numerator: u32, deaths: u32) -> f64 {
    if deaths == 0 {
        f64::from(numerator)
    } else {
        f64::from(numerator) / f64::from(deaths)
    }
}

/// Fixed-schema sums over the records of one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub activities_entered: u32,
    pub activities_won: u32,
    pub kills: u32,
    pub assists: u32,
    pub deaths: u32,
    pub seconds_played: u64,
    pub score: u64,
}

impl AggregateResult {
    /// Add one match.
    pub fn add(&mut self, values: &ActivityValues) {
        self.activities_entered += 1;
        if values.won {
            self.activities_won += 1;
        }
        self.kills += values.kills;
        self.assists += values.assists;
        self.deaths += values.deaths;
        self.seconds_played += u64::from(values.seconds_played);
        self.score += u64::from(values.score);
    }

    // ─── Derived Ratios ──────────────────────────────────────────

    /// Kills per death.
    pub fn kd(&self) -> f64 {
        death_ratio(self.kills, self.deaths)
    }

    /// Kills plus assists per death.
    pub fn kad(&self) -> f64 {
        death_ratio(self.kills + self.assists, self.deaths)
    }

    /// Fraction of matches won, 0.0 with no matches.
    pub fn win_rate(&self) -> f64 {
        if self.activities_entered == 0 {
            0.0
        } else {
            f64::from(self.activities_won) / f64::from(self.activities_entered)
        }
    }

    pub fn hours_played(&self) -> f64 {
        self.seconds_played as f64 / 3600.0
    }

    /// Average of `total` per match entered.
    pub fn per_game(&self, total: f64) -> f64 {
        if self.activities_entered == 0 {
            0.0
        } else {
            total / f64::from(self.activities_entered)
        }
    }

    pub fn averages(&self) -> PerGameAverages {
        PerGameAverages {
            score: self.per_game(self.score as f64),
            kills: self.per_game(f64::from(self.kills)),
            assists: self.per_game(f64::from(self.assists)),
            deaths: self.per_game(f64::from(self.deaths)),
            hours: self.per_game(self.hours_played()),
        }
    }
}

/// Per-match averages of an aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerGameAverages {
    pub score: f64,
    pub kills: f64,
    pub assists: f64,
    pub deaths: f64,
    pub hours: f64,
}

/// The three canonical windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsWindow {
    AllTime,
    Seasonal,
    Weekly,
}

impl FromStr for StatsWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alltime" | "all_time" | "all-time" => Ok(StatsWindow::AllTime),
            "seasonal" | "season" => Ok(StatsWindow::Seasonal),
            "weekly" | "week" => Ok(StatsWindow::Weekly),
            other => Err(format!("unknown stats window '{}'", other)),
        }
    }
}

impl fmt::Display for StatsWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatsWindow::AllTime => "alltime",
            StatsWindow::Seasonal => "seasonal",
            StatsWindow::Weekly => "weekly",
        };
        f.write_str(name)
    }
}

/// Inclusive time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}
