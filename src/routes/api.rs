// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON API consumed by the frontend.

use crate::error::{AppError, Result};
use crate::models::{
    ActivityMode, ActivityRecord, CarnageReport, Character, ClanInfo, ClanMember, ClanRef,
    Identity, LinkedProfile, MapDefinition, MembershipType, StatsWindow,
};
use crate::services::activity::FetchState;
use crate::services::bungie::{PrefixSearchPage, UpstreamStats, MAX_PAGE_SIZE};
use crate::services::cross_save::CrossSaveResolution;
use crate::services::tracker::{MatchSummary, StatsSummary};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_RECENT_COUNT: usize = 10;

/// API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/search/prefix", get(search_prefix))
        .route("/api/players/{membership_type}/{membership_id}", get(get_player))
        .route(
            "/api/players/{membership_type}/{membership_id}/clan",
            get(get_player_clan),
        )
        .route(
            "/api/players/{membership_type}/{membership_id}/characters/{character_id}/activities",
            get(get_activities),
        )
        .route(
            "/api/players/{membership_type}/{membership_id}/characters/{character_id}/stats",
            get(get_stats),
        )
        .route(
            "/api/players/{membership_type}/{membership_id}/characters/{character_id}/stats/upstream",
            get(get_upstream_stats),
        )
        .route(
            "/api/players/{membership_type}/{membership_id}/characters/{character_id}/recent",
            get(get_recent),
        )
        .route("/api/clans/{group_id}/members", get(get_clan_members))
        .route("/api/carnage/{instance_id}", get(get_carnage_report))
        .route("/api/maps/{reference_id}", get(get_map))
}

fn identity(membership_type: i32, membership_id: String) -> Result<Identity> {
    if membership_id.is_empty() || !membership_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::BadRequest(format!(
            "Invalid membership id '{}'",
            membership_id
        )));
    }
    Ok(Identity::new(
        membership_id,
        MembershipType::from(membership_type),
    ))
}

fn parse_mode(mode: Option<u32>) -> ActivityMode {
    mode.map(ActivityMode).unwrap_or(ActivityMode::ALL_PVP)
}

// ─── Search ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchQuery {
    /// `Name` or `Name#1234`
    name: String,
    code: Option<String>,
}

/// Exact search result.
#[derive(Serialize)]
pub struct SearchResponse {
    /// `canonical`, `incomplete` or `ambiguous`
    pub status: &'static str,
    pub canonical: Option<Identity>,
    pub candidates: Vec<LinkedProfile>,
}

fn split_bungie_name(query: &SearchQuery) -> Result<(String, u16)> {
    let (name, code) = match (&query.code, query.name.rsplit_once('#')) {
        (Some(code), _) => (query.name.as_str(), code.as_str()),
        (None, Some((name, code))) => (name, code),
        (None, None) => {
            return Err(AppError::BadRequest(
                "Expected a Bungie name like Name#1234".to_string(),
            ))
        }
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Empty display name".to_string()));
    }
    let code = code
        .trim()
        .parse::<u16>()
        .map_err(|_| AppError::BadRequest(format!("Invalid name code '{}'", code)))?;
    Ok((name.to_string(), code))
}

/// Search a player by exact Bungie name.
///
/// Several linked profiles without a cross-save override are reported as
/// `ambiguous` with every candidate; the caller picks one.
async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let (name, code) = split_bungie_name(&query)?;
    let outcome = state.tracker.search_by_name(&name, code).await?;

    let status = match &outcome.resolution {
        CrossSaveResolution::NotFound => {
            return Err(AppError::NotFound(format!("Player {}#{:04}", name, code)))
        }
        CrossSaveResolution::Canonical(_) => "canonical",
        CrossSaveResolution::Incomplete { .. } => "incomplete",
        CrossSaveResolution::Ambiguous(_) => "ambiguous",
    };
    // Ambiguous outcomes list the candidates instead
    let canonical = outcome.resolution.into_canonical().ok();

    Ok(Json(SearchResponse {
        status,
        canonical,
        candidates: outcome.profiles,
    }))
}

#[derive(Deserialize)]
struct PrefixQuery {
    prefix: String,
    #[serde(default)]
    page: u32,
}

async fn search_prefix(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PrefixQuery>,
) -> Result<Json<PrefixSearchPage>> {
    let prefix = query.prefix.trim();
    if prefix.is_empty() {
        return Err(AppError::BadRequest("Empty prefix".to_string()));
    }
    Ok(Json(state.tracker.search_by_prefix(prefix, query.page).await?))
}

// ─── Players ─────────────────────────────────────────────────

/// Player profile with characters, most recently played first.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    pub identity: Identity,
    pub display_name: String,
    pub display_name_code: Option<u16>,
    pub linked_identities: Vec<Identity>,
    pub characters: Vec<Character>,
    pub last_played_character: Option<String>,
    pub clan: Option<ClanRef>,
}

async fn get_player(
    State(state): State<Arc<AppState>>,
    Path((membership_type, membership_id)): Path<(i32, String)>,
) -> Result<Json<PlayerResponse>> {
    let identity = identity(membership_type, membership_id)?;
    let player = state.tracker.refresh_profile(&identity).await?;

    let characters = player
        .character_ids_by_recency()
        .iter()
        .filter_map(|id| player.characters.get(id).cloned())
        .collect();

    Ok(Json(PlayerResponse {
        last_played_character: player
            .last_played_character()
            .map(|c| c.character_id.clone()),
        identity: player.identity,
        display_name: player.display_name,
        display_name_code: player.display_name_code,
        linked_identities: player.linked_identities,
        characters,
        clan: player.clan,
    }))
}

async fn get_player_clan(
    State(state): State<Arc<AppState>>,
    Path((membership_type, membership_id)): Path<(i32, String)>,
) -> Result<Json<ClanInfo>> {
    let identity = identity(membership_type, membership_id)?;
    state
        .tracker
        .get_clan(&identity)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Clan of player {}", identity)))
}

// ─── Activities & Stats ──────────────────────────────────────

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Only return records qualifying under this mode
    mode: Option<u32>,
    /// Backfill page range upper bound
    pages: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitiesResponse {
    pub state: FetchState,
    /// Records in the stored log, before the mode filter
    pub total: usize,
    pub records: Vec<ActivityRecord>,
}

async fn get_activities(
    State(state): State<Arc<AppState>>,
    Path((membership_type, membership_id, character_id)): Path<(i32, String, String)>,
    Query(query): Query<ActivitiesQuery>,
) -> Result<Json<ActivitiesResponse>> {
    let identity = identity(membership_type, membership_id)?;

    if let Some(pages) = query.pages {
        let max = state.config.backfill_max_pages;
        if pages == 0 || pages > max {
            return Err(AppError::BadRequest(format!(
                "pages must be between 1 and {}",
                max
            )));
        }
    }

    let log = state
        .tracker
        .get_or_build_log(&identity, &character_id, query.pages)
        .await?;

    let records = match query.mode {
        Some(mode) => log
            .records()
            .iter()
            .filter(|r| r.qualifies_for(ActivityMode(mode)))
            .cloned()
            .collect(),
        None => log.records().to_vec(),
    };

    Ok(Json(ActivitiesResponse {
        state: state.tracker.fetch_state(&identity, &character_id),
        total: log.len(),
        records,
    }))
}

#[derive(Deserialize)]
struct StatsQuery {
    window: Option<String>,
    mode: Option<u32>,
}

impl StatsQuery {
    fn window(&self) -> Result<StatsWindow> {
        match &self.window {
            Some(raw) => raw.parse().map_err(AppError::BadRequest),
            None => Ok(StatsWindow::AllTime),
        }
    }
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path((membership_type, membership_id, character_id)): Path<(i32, String, String)>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsSummary>> {
    let identity = identity(membership_type, membership_id)?;
    let window = query.window()?;

    let summary = state
        .tracker
        .get_stats(&identity, &character_id, window, parse_mode(query.mode))
        .await?;
    Ok(Json(summary))
}

async fn get_upstream_stats(
    State(state): State<Arc<AppState>>,
    Path((membership_type, membership_id, character_id)): Path<(i32, String, String)>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<UpstreamStats>> {
    let identity = identity(membership_type, membership_id)?;
    let window = query.window()?;

    let stats = state
        .tracker
        .upstream_stats(&identity, &character_id, window, parse_mode(query.mode))
        .await?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
struct RecentQuery {
    mode: Option<u32>,
    count: Option<usize>,
}

async fn get_recent(
    State(state): State<Arc<AppState>>,
    Path((membership_type, membership_id, character_id)): Path<(i32, String, String)>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<MatchSummary>>> {
    let identity = identity(membership_type, membership_id)?;

    let count = query.count.unwrap_or(DEFAULT_RECENT_COUNT);
    if count == 0 || count > MAX_PAGE_SIZE as usize {
        return Err(AppError::BadRequest(format!(
            "count must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let matches = state
        .tracker
        .recent_matches(&identity, &character_id, parse_mode(query.mode), count)
        .await?;
    Ok(Json(matches))
}

// ─── Clans, Reports, Maps ────────────────────────────────────

async fn get_clan_members(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<ClanMember>>> {
    Ok(Json(state.tracker.clan_members(&group_id).await?))
}

async fn get_carnage_report(
    State(state): State<Arc<AppState>>,
    Path(instance_id): Path<String>,
) -> Result<Json<CarnageReport>> {
    Ok(Json(state.tracker.carnage_report(&instance_id).await?))
}

async fn get_map(
    State(state): State<Arc<AppState>>,
    Path(reference_id): Path<u32>,
) -> Result<Json<MapDefinition>> {
    Ok(Json(state.tracker.map(reference_id).await?))
}
