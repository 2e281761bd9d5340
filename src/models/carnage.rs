// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Post-game carnage report, stored in the `carnageReports` collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{death_ratio, ActivityMode, Identity};

/// One team of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarnageTeam {
    pub team_id: i32,
    pub score: u32,
    pub won: bool,
}

/// One player of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarnageEntry {
    pub identity: Identity,
    pub display_name: String,
    pub character_id: String,
    /// Team id, `None` in free-for-all modes
    pub team: Option<i32>,
    pub score: u32,
    pub kills: u32,
    pub assists: u32,
    pub deaths: u32,
    pub seconds_played: u32,
    pub completed: bool,
    pub won: bool,
}

impl CarnageEntry {
    pub fn kd(&self) -> f64 {
        death_ratio(self.kills, self.deaths)
    }

    pub fn kad(&self) -> f64 {
        death_ratio(self.kills + self.assists, self.deaths)
    }
}

/// Detailed report for one match instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarnageReport {
    pub instance_id: String,
    pub period: DateTime<Utc>,
    pub mode: ActivityMode,
    pub reference_id: u32,
    pub duration_seconds: u32,
    #[serde(default)]
    pub teams: Vec<CarnageTeam>,
    #[serde(default)]
    pub entries: Vec<CarnageEntry>,
}
