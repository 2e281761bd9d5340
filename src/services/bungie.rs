// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bungie.net Platform API client.
//!
//! Every call takes a token from the shared [`TokenBucket`] first. Payloads
//! are decoded here into typed response schemas and converted to domain
//! models, so nothing downstream sees raw JSON.

use crate::error::AppError;
use crate::models::{
    ActivityMode, ActivityRecord, ActivityValues, CarnageEntry, CarnageReport, CarnageTeam,
    Character, CharacterClass, ClanInfo, Identity, LinkedProfile, MapDefinition,
    MembershipType,
};
use crate::services::rate_limit::TokenBucket;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Hard maximum of `count` on paginated endpoints.
pub const MAX_PAGE_SIZE: u32 = 250;

const API_KEY_HEADER: &str = "X-API-Key";
const ACTIVITY_DEFINITION: &str = "DestinyActivityDefinition";

/// `periodType` of the historical stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsGranularity {
    Daily,
    AllTime,
    Activity,
}

impl StatsGranularity {
    pub fn as_str(self) -> &'static str {
        match self {
            StatsGranularity::Daily => "Daily",
            StatsGranularity::AllTime => "AllTime",
            StatsGranularity::Activity => "Activity",
        }
    }
}

/// Bungie API client.
pub struct BungieClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    limiter: Arc<TokenBucket>,
}

impl BungieClient {
    /// Create a new client. `base_url` is the Platform root, without a
    /// trailing slash.
    pub fn new(api_key: String, base_url: String, limiter: Arc<TokenBucket>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter,
        }
    }

    // ─── Player Search ───────────────────────────────────────────

    /// Exact `Name#Code` search across all platforms.
    pub async fn search_player_by_exact_name(
        &self,
        display_name: &str,
        display_name_code: u16,
    ) -> Result<Vec<LinkedProfile>, AppError> {
        let body = serde_json::json!({
            "displayName": display_name,
            "displayNameCode": display_name_code,
        });
        let cards: Vec<UserInfoCard> = self
            .post_json("/Destiny2/SearchDestinyPlayerByBungieName/-1/", &body)
            .await?;

        Ok(cards.into_iter().map(UserInfoCard::into_profile).collect())
    }

    /// Global name prefix search (autocomplete). `page` is 0-based.
    pub async fn search_player_by_prefix(
        &self,
        prefix: &str,
        page: u32,
    ) -> Result<PrefixSearchPage, AppError> {
        let body = serde_json::json!({ "displayNamePrefix": prefix });
        let response: UserSearchResponse = self
            .post_json(&format!("/User/Search/GlobalName/{}/", page), &body)
            .await?;

        Ok(response.into_page())
    }

    // ─── Profile ─────────────────────────────────────────────────

    /// Profile and characters of one platform identity.
    pub async fn fetch_profile(&self, identity: &Identity) -> Result<ProfileSnapshot, AppError> {
        let path = format!(
            "/Destiny2/{}/Profile/{}/",
            identity.membership_type.code(),
            identity.membership_id
        );
        let response: ProfileResponse = self
            .get_json(&path, &[("components", "Profiles,Characters".to_string())])
            .await?;

        Ok(response.into_snapshot())
    }

    // ─── Activity History ────────────────────────────────────────

    /// One page of a character's activity history. An empty vector means the
    /// history is exhausted.
    pub async fn fetch_activity_page(
        &self,
        identity: &Identity,
        character_id: &str,
        mode: ActivityMode,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ActivityRecord>, AppError> {
        let count = page_size.clamp(1, MAX_PAGE_SIZE);
        let path = format!(
            "/Destiny2/{}/Account/{}/Character/{}/Stats/Activities/",
            identity.membership_type.code(),
            identity.membership_id,
            character_id
        );
        let response: ActivityHistoryResponse = self
            .get_json(
                &path,
                &[
                    ("mode", mode.to_string()),
                    ("page", page.to_string()),
                    ("count", count.to_string()),
                ],
            )
            .await?;

        Ok(response
            .activities
            .into_iter()
            .map(HistoricalActivity::into_record)
            .collect())
    }

    /// Bungie's own aggregate stats for a character over a date range.
    pub async fn fetch_aggregate_stats(
        &self,
        identity: &Identity,
        character_id: &str,
        day_start: NaiveDate,
        day_end: NaiveDate,
        modes: &[ActivityMode],
        granularity: StatsGranularity,
    ) -> Result<UpstreamStats, AppError> {
        let path = format!(
            "/Destiny2/{}/Account/{}/Character/{}/Stats/",
            identity.membership_type.code(),
            identity.membership_id,
            character_id
        );
        let modes = modes
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(",");

        self.get_json(
            &path,
            &[
                ("daystart", day_start.format("%Y-%m-%d").to_string()),
                ("dayend", day_end.format("%Y-%m-%d").to_string()),
                ("modes", modes),
                ("periodType", granularity.as_str().to_string()),
                ("groups", "General".to_string()),
            ],
        )
        .await
    }

    // ─── Carnage Reports ─────────────────────────────────────────

    pub async fn fetch_carnage_report(&self, instance_id: &str) -> Result<CarnageReport, AppError> {
        let path = format!("/Destiny2/Stats/PostGameCarnageReport/{}/", instance_id);
        let response: CarnageReportResponse = self.get_json(&path, &[]).await?;
        Ok(response.into_report())
    }

    // ─── Clans ───────────────────────────────────────────────────

    /// The clan an identity belongs to, if any.
    pub async fn fetch_clan_for_member(
        &self,
        identity: &Identity,
    ) -> Result<Option<ClanInfo>, AppError> {
        // filter=0 (all), groupType=1 (clan)
        let path = format!(
            "/GroupV2/User/{}/{}/0/1/",
            identity.membership_type.code(),
            identity.membership_id
        );
        let response: GroupMembershipResponse = self.get_json(&path, &[]).await?;

        Ok(response
            .results
            .into_iter()
            .next()
            .map(|membership| membership.group.into_clan_info()))
    }

    /// One page (1-based) of a clan roster.
    pub async fn fetch_clan_members(
        &self,
        group_id: &str,
        page: u32,
    ) -> Result<ClanRosterPage, AppError> {
        let path = format!("/GroupV2/{}/Members/", group_id);
        let response: GroupMembersResponse = self
            .get_json(&path, &[("currentpage", page.max(1).to_string())])
            .await?;

        Ok(ClanRosterPage {
            members: response
                .results
                .into_iter()
                .map(|m| RosterEntry {
                    is_online: m.is_online,
                    profile: m.destiny_user_info.into_profile(),
                })
                .collect(),
            has_more: response.has_more,
        })
    }

    // ─── Definitions ─────────────────────────────────────────────

    /// Raw manifest entity lookup.
    pub async fn fetch_entity_definition<T: DeserializeOwned>(
        &self,
        entity_type: &str,
        hash: u32,
    ) -> Result<T, AppError> {
        let path = format!("/Destiny2/Manifest/{}/{}/", entity_type, hash);
        self.get_json(&path, &[]).await
    }

    /// Activity (map) definition for a record's `reference_id`.
    pub async fn fetch_activity_definition(
        &self,
        reference_id: u32,
    ) -> Result<MapDefinition, AppError> {
        let definition: EntityDefinition = self
            .fetch_entity_definition(ACTIVITY_DEFINITION, reference_id)
            .await?;
        Ok(definition.into_map(reference_id))
    }

    // ─── Transport ───────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.get(&url).query(query);
        self.send(path, request).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.post(&url).json(body);
        self.send(path, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AppError> {
        self.limiter.acquire().await;

        tracing::debug!(path, "Bungie API request");
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(path, error = %e, "Bungie API transport failure");
                AppError::Transport(e.to_string())
            })?;

        self.check_response_json(path, response).await
    }

    /// Classify a response: non-2xx, error envelope, or typed payload.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(path, status = status.as_u16(), "Bungie API returned error status");
            return Err(AppError::upstream_status(
                status.as_u16(),
                format!("HTTP {}: {}", status, truncate(&body, 200)),
            ));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| {
                AppError::upstream_status(status.as_u16(), format!("JSON parse error: {}", e))
            })?;

        if envelope.throttle_seconds > 0 {
            tracing::warn!(
                path,
                throttle_seconds = envelope.throttle_seconds,
                "Bungie API asked us to throttle"
            );
        }

        if envelope.error_code != AppError::BUNGIE_SUCCESS {
            tracing::warn!(
                path,
                error_code = envelope.error_code,
                error_status = %envelope.error_status,
                "Bungie API returned error envelope"
            );
            return Err(AppError::upstream_code(
                envelope.error_code,
                format!("{}: {}", envelope.error_status, envelope.message),
            ));
        }

        envelope
            .response
            .ok_or_else(|| AppError::upstream_code(envelope.error_code, "missing Response"))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ─── Domain Results ──────────────────────────────────────────────

/// One global-name search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixMatch {
    pub display_name: String,
    pub display_name_code: Option<u16>,
    pub memberships: Vec<LinkedProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixSearchPage {
    pub results: Vec<PrefixMatch>,
    pub has_more: bool,
}

/// Profile component plus characters.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSnapshot {
    pub user: Option<LinkedProfile>,
    pub characters: Vec<Character>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub profile: LinkedProfile,
    pub is_online: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClanRosterPage {
    pub members: Vec<RosterEntry>,
    pub has_more: bool,
}

/// Historical stats keyed by mode name (`allPvP`, `trialsofosiris`, ...).
pub type UpstreamStats = HashMap<String, HistoricalStatsByPeriod>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalStatsByPeriod {
    #[serde(default)]
    pub all_time: HashMap<String, StatValue>,
    #[serde(default)]
    pub daily: Vec<StatsPeriod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPeriod {
    pub period: DateTime<Utc>,
    #[serde(default)]
    pub values: HashMap<String, StatValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatValue {
    pub basic: BasicValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicValue {
    pub value: f64,
    #[serde(default)]
    pub display_value: Option<String>,
}

// ─── Wire Schemas ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope<T> {
    response: Option<T>,
    error_code: i32,
    #[serde(default)]
    error_status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    throttle_seconds: i32,
}

fn stat(values: &HashMap<String, StatValue>, key: &str) -> f64 {
    values.get(key).map(|v| v.basic.value).unwrap_or(0.0)
}

/// Stat values are floats on the wire; counters are never negative.
fn stat_u32(values: &HashMap<String, StatValue>, key: &str) -> u32 {
    stat(values, key).max(0.0) as u32
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoCard {
    membership_id: String,
    membership_type: i32,
    #[serde(default)]
    cross_save_override: i32,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    bungie_global_display_name: Option<String>,
    #[serde(default)]
    bungie_global_display_name_code: Option<u16>,
    #[serde(default)]
    is_public: bool,
}

impl UserInfoCard {
    fn into_profile(self) -> LinkedProfile {
        let display_name = self
            .bungie_global_display_name
            .filter(|n| !n.is_empty())
            .unwrap_or(self.display_name);
        LinkedProfile {
            identity: Identity::new(
                self.membership_id,
                MembershipType::from(self.membership_type),
            ),
            cross_save_override: MembershipType::from(self.cross_save_override),
            display_name,
            display_name_code: self.bungie_global_display_name_code,
            is_public: self.is_public,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSearchResponse {
    #[serde(default)]
    search_results: Vec<UserSearchResult>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSearchResult {
    #[serde(default)]
    bungie_global_display_name: String,
    #[serde(default)]
    bungie_global_display_name_code: Option<u16>,
    #[serde(default)]
    destiny_memberships: Vec<UserInfoCard>,
}

impl UserSearchResponse {
    fn into_page(self) -> PrefixSearchPage {
        PrefixSearchPage {
            results: self
                .search_results
                .into_iter()
                .map(|r| PrefixMatch {
                    display_name: r.bungie_global_display_name,
                    display_name_code: r.bungie_global_display_name_code,
                    memberships: r
                        .destiny_memberships
                        .into_iter()
                        .map(UserInfoCard::into_profile)
                        .collect(),
                })
                .collect(),
            has_more: self.has_more,
        }
    }
}

#[derive(Deserialize)]
struct Component<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    profile: Option<Component<ProfileComponent>>,
    characters: Option<Component<HashMap<String, CharacterComponent>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileComponent {
    user_info: UserInfoCard,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CharacterComponent {
    character_id: String,
    date_last_played: DateTime<Utc>,
    #[serde(default)]
    light: u32,
    #[serde(default)]
    class_type: u8,
}

impl ProfileResponse {
    fn into_snapshot(self) -> ProfileSnapshot {
        let user = self
            .profile
            .and_then(|c| c.data)
            .map(|p| p.user_info.into_profile());
        let characters = self
            .characters
            .and_then(|c| c.data)
            .unwrap_or_default()
            .into_values()
            .map(|c| Character {
                character_id: c.character_id,
                class: CharacterClass::from(c.class_type),
                light: c.light,
                date_last_played: c.date_last_played,
            })
            .collect();
        ProfileSnapshot { user, characters }
    }
}

/// An exhausted history comes back as `{}`.
#[derive(Deserialize)]
struct ActivityHistoryResponse {
    #[serde(default)]
    activities: Vec<HistoricalActivity>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoricalActivity {
    period: DateTime<Utc>,
    activity_details: ActivityDetails,
    #[serde(default)]
    values: HashMap<String, StatValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityDetails {
    reference_id: u32,
    instance_id: String,
    #[serde(default)]
    mode: u32,
    #[serde(default)]
    modes: Vec<u32>,
}

impl HistoricalActivity {
    fn into_record(self) -> ActivityRecord {
        let values = &self.values;
        ActivityRecord {
            instance_id: self.activity_details.instance_id,
            period: self.period,
            mode: ActivityMode(self.activity_details.mode),
            modes: self
                .activity_details
                .modes
                .into_iter()
                .map(ActivityMode)
                .collect(),
            reference_id: self.activity_details.reference_id,
            duration_seconds: stat_u32(values, "activityDurationSeconds"),
            values: ActivityValues {
                score: stat_u32(values, "score"),
                kills: stat_u32(values, "kills"),
                assists: stat_u32(values, "assists"),
                deaths: stat_u32(values, "deaths"),
                seconds_played: stat_u32(values, "timePlayedSeconds"),
                // standing 0 is a victory
                won: values.contains_key("standing") && stat(values, "standing") == 0.0,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarnageReportResponse {
    period: DateTime<Utc>,
    activity_details: ActivityDetails,
    #[serde(default)]
    entries: Vec<CarnageEntryDto>,
    #[serde(default)]
    teams: Vec<CarnageTeamDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarnageEntryDto {
    player: CarnagePlayer,
    character_id: String,
    #[serde(default)]
    values: HashMap<String, StatValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarnagePlayer {
    destiny_user_info: UserInfoCard,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarnageTeamDto {
    team_id: i32,
    standing: StatValue,
    score: StatValue,
}

impl CarnageReportResponse {
    fn into_report(self) -> CarnageReport {
        let teams: Vec<CarnageTeam> = self
            .teams
            .into_iter()
            .map(|t| CarnageTeam {
                team_id: t.team_id,
                score: t.score.basic.value.max(0.0) as u32,
                won: t.standing.basic.value < 1.0,
            })
            .collect();
        let winner = teams.iter().find(|t| t.won).map(|t| t.team_id);

        let duration_seconds = self
            .entries
            .first()
            .map(|e| stat_u32(&e.values, "activityDurationSeconds"))
            .unwrap_or(0);

        let entries = self
            .entries
            .into_iter()
            .map(|e| {
                let v = &e.values;
                let team = v.get("team").map(|t| t.basic.value as i32);
                let won = match (team, winner) {
                    (Some(team), Some(winner)) => team == winner,
                    _ => v.contains_key("standing") && stat(v, "standing") == 0.0,
                };
                let profile = e.player.destiny_user_info.into_profile();
                CarnageEntry {
                    identity: profile.identity,
                    display_name: profile.display_name,
                    character_id: e.character_id,
                    team,
                    score: stat_u32(v, "score"),
                    kills: stat_u32(v, "kills"),
                    assists: stat_u32(v, "assists"),
                    deaths: stat_u32(v, "deaths"),
                    seconds_played: stat_u32(v, "timePlayedSeconds"),
                    completed: stat(v, "completed") == 1.0,
                    won,
                }
            })
            .collect();

        CarnageReport {
            instance_id: self.activity_details.instance_id,
            period: self.period,
            mode: ActivityMode(self.activity_details.mode),
            reference_id: self.activity_details.reference_id,
            duration_seconds,
            teams,
            entries,
        }
    }
}

#[derive(Deserialize)]
struct GroupMembershipResponse {
    #[serde(default)]
    results: Vec<GroupMembership>,
}

#[derive(Deserialize)]
struct GroupMembership {
    group: GroupDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupDto {
    group_id: String,
    name: String,
    #[serde(default)]
    motto: String,
    creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    member_count: u32,
    clan_info: Option<ClanInfoDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClanInfoDto {
    #[serde(default)]
    clan_callsign: String,
}

impl GroupDto {
    fn into_clan_info(self) -> ClanInfo {
        ClanInfo {
            group_id: self.group_id,
            name: self.name,
            call_sign: self.clan_info.map(|c| c.clan_callsign).unwrap_or_default(),
            motto: self.motto,
            creation_date: self.creation_date,
            member_count: self.member_count,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupMembersResponse {
    #[serde(default)]
    results: Vec<GroupMemberDto>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupMemberDto {
    #[serde(default)]
    is_online: bool,
    destiny_user_info: UserInfoCard,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityDefinition {
    display_properties: DisplayProperties,
    pgcr_image: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisplayProperties {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

impl EntityDefinition {
    fn into_map(self, reference_id: u32) -> MapDefinition {
        MapDefinition {
            reference_id,
            name: self.display_properties.name,
            description: self.display_properties.description,
            image: self.pgcr_image,
        }
    }
}
