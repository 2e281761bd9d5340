// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Crucible-Tracker: PvP match history and stats for Destiny 2
//!
//! This crate fetches a player's activity history from the rate-limited
//! Bungie.net API, keeps a deduplicated, newest-first activity log per
//! character in an on-device cache, and aggregates it over all-time,
//! seasonal and weekly windows.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::Tracker;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tracker: Tracker,
}
