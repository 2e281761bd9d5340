// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod carnage;
pub mod definition;
pub mod identity;
pub mod player;
pub mod stats;

pub use activity::{
    ActivityLog, ActivityMode, ActivityRecord, ActivityValues, LogCoverage, MergeOutcome,
};
pub use carnage::{CarnageEntry, CarnageReport, CarnageTeam};
pub use definition::MapDefinition;
pub use identity::{Identity, LinkedProfile, MembershipType, PlayerId};
pub use player::{Character, CharacterClass, ClanInfo, ClanMember, ClanRef, Player};
pub use stats::{death_ratio, AggregateResult, PerGameAverages, StatsWindow, TimeWindow};
