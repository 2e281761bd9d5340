// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod bungie;
pub mod carnage;
pub mod cross_save;
pub mod definitions;
pub mod players;
pub mod rate_limit;
pub mod stats;
pub mod tracker;

pub use activity::{ActivityLogBuilder, FetchPlan, FetchReport, FetchState, StopReason};
pub use bungie::BungieClient;
pub use carnage::CarnageService;
pub use cross_save::CrossSaveResolution;
pub use definitions::DefinitionService;
pub use players::PlayerStore;
pub use rate_limit::TokenBucket;
pub use stats::{StatsCalendar, WeeklyReset};
pub use tracker::Tracker;
