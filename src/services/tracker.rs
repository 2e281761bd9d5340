// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Match history tracker.
//!
//! Entry point for the inbound operations: resolves identities, builds
//! activity logs, aggregates them and looks up clans, reports and maps. All
//! collaborators are constructed once in `main` and injected here.

use crate::config::Config;
use crate::db::CacheDb;
use crate::error::{AppError, Result};
use crate::models::{
    death_ratio, ActivityLog, ActivityMode, AggregateResult, CarnageReport, ClanInfo,
    ClanMember, Identity, LinkedProfile, MapDefinition, PerGameAverages, Player, StatsWindow,
    TimeWindow,
};
use crate::services::activity::{ActivityLogBuilder, FetchState};
use crate::services::bungie::{BungieClient, PrefixSearchPage, StatsGranularity, UpstreamStats};
use crate::services::carnage::CarnageService;
use crate::services::cross_save::{self, CrossSaveResolution};
use crate::services::definitions::DefinitionService;
use crate::services::players::PlayerStore;
use crate::services::stats::{self, StatsCalendar};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Roster pages fetched at most (clans are capped at 100 members).
const MAX_ROSTER_PAGES: u32 = 10;

/// Result of an exact-name search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub resolution: CrossSaveResolution,
    pub profiles: Vec<LinkedProfile>,
}

/// Aggregate of one window plus its derived ratios.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub window: StatsWindow,
    pub mode: ActivityMode,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub totals: AggregateResult,
    pub kd: f64,
    pub kad: f64,
    pub win_rate: f64,
    pub hours_played: f64,
    pub per_game: PerGameAverages,
}

impl StatsSummary {
    fn new(
        window: StatsWindow,
        mode: ActivityMode,
        bounds: TimeWindow,
        totals: AggregateResult,
    ) -> Self {
        Self {
            window,
            mode,
            start: bounds.start,
            end: bounds.end,
            kd: totals.kd(),
            kad: totals.kad(),
            win_rate: totals.win_rate(),
            hours_played: totals.hours_played(),
            per_game: totals.averages(),
            totals,
        }
    }
}

/// One recent match with its map name resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub instance_id: String,
    pub period: DateTime<Utc>,
    pub mode: ActivityMode,
    pub mode_label: &'static str,
    pub reference_id: u32,
    pub map_name: String,
    pub duration_seconds: u32,
    pub kills: u32,
    pub assists: u32,
    pub deaths: u32,
    pub kd: f64,
    pub kad: f64,
    pub won: bool,
}

pub struct Tracker {
    config: Config,
    calendar: StatsCalendar,
    client: Arc<BungieClient>,
    players: Arc<PlayerStore>,
    builder: ActivityLogBuilder,
    carnage: CarnageService,
    definitions: DefinitionService,
}

impl Tracker {
    pub fn new(config: Config, client: Arc<BungieClient>, cache: CacheDb) -> Self {
        let players = Arc::new(PlayerStore::new(cache.clone()));
        Self {
            calendar: StatsCalendar::from_config(&config),
            builder: ActivityLogBuilder::new(client.clone(), players.clone(), config.clone()),
            carnage: CarnageService::new(client.clone(), cache.clone()),
            definitions: DefinitionService::new(client.clone(), cache),
            config,
            client,
            players,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn players(&self) -> &PlayerStore {
        &self.players
    }

    // ─── Search ──────────────────────────────────────────────────

    /// Exact `Name#Code` search, resolved across cross-save.
    ///
    /// The canonical player record is created (or refreshed) with the
    /// searched name and the other linked identities.
    pub async fn search_by_name(&self, name: &str, code: u16) -> Result<SearchOutcome> {
        let profiles = self.client.search_player_by_exact_name(name, code).await?;
        let resolution = cross_save::resolve(&profiles);

        tracing::info!(
            name,
            code,
            profiles = profiles.len(),
            complete = resolution.is_complete(),
            "Player search"
        );

        let canonical = match &resolution {
            CrossSaveResolution::Canonical(identity) => Some(identity),
            CrossSaveResolution::Incomplete { fallback } => Some(fallback),
            _ => None,
        };

        if let Some(identity) = canonical {
            let linked: Vec<Identity> = profiles
                .iter()
                .map(|p| p.identity.clone())
                .filter(|i| i != identity)
                .collect();
            let display_name = profiles
                .iter()
                .find(|p| &p.identity == identity)
                .map(|p| (p.display_name.clone(), p.display_name_code));

            self.players
                .update(identity, |player| {
                    player.linked_identities = linked;
                    if let Some((name, code)) = display_name {
                        player.display_name = name;
                        player.display_name_code = code;
                    }
                })
                .await;
        }

        Ok(SearchOutcome {
            resolution,
            profiles,
        })
    }

    /// Autocomplete candidates for a name prefix.
    pub async fn search_by_prefix(&self, prefix: &str, page: u32) -> Result<PrefixSearchPage> {
        self.client.search_player_by_prefix(prefix, page).await
    }

    // ─── Profile ─────────────────────────────────────────────────

    /// Refresh characters (class, light, last played) of a player.
    pub async fn refresh_profile(&self, identity: &Identity) -> Result<Player> {
        let snapshot = self.client.fetch_profile(identity).await?;
        let now = Utc::now();

        let player = self
            .players
            .update(identity, |player| {
                if let Some(user) = snapshot.user {
                    if !user.display_name.is_empty() {
                        player.display_name = user.display_name;
                    }
                    if user.display_name_code.is_some() {
                        player.display_name_code = user.display_name_code;
                    }
                }
                player.set_characters(snapshot.characters, now);
                player.clone()
            })
            .await;

        tracing::info!(
            player_id = %identity.player_id(),
            characters = player.characters.len(),
            "Profile refreshed"
        );
        Ok(player)
    }

    // ─── Activity Log & Stats ────────────────────────────────────

    pub async fn get_or_build_log(
        &self,
        identity: &Identity,
        character_id: &str,
        page_limit: Option<u32>,
    ) -> Result<ActivityLog> {
        self.builder
            .get_or_build_log(identity, character_id, page_limit)
            .await
    }

    pub fn fetch_state(&self, identity: &Identity, character_id: &str) -> FetchState {
        self.builder.state(identity, character_id)
    }

    /// Bring the log up to date, then aggregate one window of it.
    pub async fn get_stats(
        &self,
        identity: &Identity,
        character_id: &str,
        window: StatsWindow,
        mode: ActivityMode,
    ) -> Result<StatsSummary> {
        self.get_or_build_log(identity, character_id, None).await?;
        let player = self.players.load(identity).await;
        let bounds = self.calendar.window(window, Utc::now());
        let totals = stats::aggregate_character(&player, character_id, mode, &bounds);

        Ok(StatsSummary::new(window, mode, bounds, totals))
    }

    /// The `count` most recent matches under `mode`, with map names.
    ///
    /// Uses the stored log; a character without one is backfilled first.
    pub async fn recent_matches(
        &self,
        identity: &Identity,
        character_id: &str,
        mode: ActivityMode,
        count: usize,
    ) -> Result<Vec<MatchSummary>> {
        let stored = self
            .players
            .load(identity)
            .await
            .log(character_id)
            .filter(|log| !log.is_empty())
            .cloned();
        let log = match stored {
            Some(log) => log,
            None => self.get_or_build_log(identity, character_id, None).await?,
        };

        let recent = log.recent(mode, count);
        let reference_ids: BTreeSet<u32> = recent.iter().map(|r| r.reference_id).collect();
        let names: HashMap<u32, String> = join_all(reference_ids.into_iter().map(|id| async move {
            (id, self.definitions.resolve_map_name(id).await)
        }))
        .await
        .into_iter()
        .collect();

        Ok(recent
            .into_iter()
            .map(|r| MatchSummary {
                instance_id: r.instance_id.clone(),
                period: r.period,
                mode: r.mode,
                mode_label: r.mode.label(),
                reference_id: r.reference_id,
                map_name: names.get(&r.reference_id).cloned().unwrap_or_default(),
                duration_seconds: r.duration_seconds,
                kills: r.values.kills,
                assists: r.values.assists,
                deaths: r.values.deaths,
                kd: death_ratio(r.values.kills, r.values.deaths),
                kad: death_ratio(r.values.kills + r.values.assists, r.values.deaths),
                won: r.values.won,
            })
            .collect())
    }

    /// Bungie's own aggregate for the same window, for cross-checking.
    pub async fn upstream_stats(
        &self,
        identity: &Identity,
        character_id: &str,
        window: StatsWindow,
        mode: ActivityMode,
    ) -> Result<UpstreamStats> {
        let bounds = self.calendar.window(window, Utc::now());
        self.client
            .fetch_aggregate_stats(
                identity,
                character_id,
                bounds.start.date_naive(),
                bounds.end.date_naive(),
                &[mode],
                StatsGranularity::Daily,
            )
            .await
    }

    // ─── Clans ───────────────────────────────────────────────────

    /// The player's clan, also recorded on the player.
    pub async fn get_clan(&self, identity: &Identity) -> Result<Option<ClanInfo>> {
        let clan = self.client.fetch_clan_for_member(identity).await?;
        let clan_ref = clan.as_ref().map(ClanInfo::to_ref);
        self.players
            .update(identity, |player| player.clan = clan_ref)
            .await;
        Ok(clan)
    }

    /// Clan roster with every player listed once.
    pub async fn clan_members(&self, group_id: &str) -> Result<Vec<ClanMember>> {
        let mut members = Vec::new();

        for page in 1..=MAX_ROSTER_PAGES {
            let roster = self.client.fetch_clan_members(group_id, page).await?;
            members.extend(
                roster
                    .members
                    .into_iter()
                    .filter(|m| cross_save::is_canonical_profile(&m.profile))
                    .map(|m| ClanMember {
                        identity: m.profile.identity,
                        display_name: m.profile.display_name,
                        display_name_code: m.profile.display_name_code,
                        is_online: m.is_online,
                    }),
            );
            if !roster.has_more {
                break;
            }
        }

        members.sort_by_key(|m| m.display_name.to_lowercase());
        Ok(members)
    }

    // ─── Reports & Definitions ───────────────────────────────────

    pub async fn carnage_report(&self, instance_id: &str) -> Result<CarnageReport> {
        if instance_id.is_empty() || !instance_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::BadRequest(format!(
                "Invalid instance id '{}'",
                instance_id
            )));
        }
        self.carnage.get_report(instance_id).await
    }

    pub async fn map(&self, reference_id: u32) -> Result<MapDefinition> {
        self.definitions.get_map(reference_id).await
    }

    pub async fn resolve_map_name(&self, reference_id: u32) -> String {
        self.definitions.resolve_map_name(reference_id).await
    }
}
