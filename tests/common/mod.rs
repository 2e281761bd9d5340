// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use crucible_tracker::config::Config;
use crucible_tracker::db::CacheDb;
use crucible_tracker::models::{Identity, MembershipType};
use crucible_tracker::routes::create_router;
use crucible_tracker::services::{BungieClient, PlayerStore, TokenBucket, Tracker};
use crucible_tracker::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Character used by the activity fixtures.
#[allow(dead_code)]
pub const CHARACTER_ID: &str = "2305843009300000001";

/// Steam identity used by the activity fixtures.
#[allow(dead_code)]
pub fn test_identity() -> Identity {
    Identity::new("4611686018400000001", MembershipType::Steam)
}

/// Test configuration pointing at a mock Bungie server.
#[allow(dead_code)]
pub fn test_config(server_uri: &str) -> Config {
    Config {
        bungie_base_url: format!("{}/Platform", server_uri),
        ..Config::default()
    }
}

/// Client with a bucket large enough to never block a test.
#[allow(dead_code)]
pub fn test_client(config: &Config) -> Arc<BungieClient> {
    let limiter = Arc::new(TokenBucket::new(1000, 1000).with_poll_interval(Duration::from_millis(5)));
    Arc::new(BungieClient::new(
        config.bungie_api_key.clone(),
        config.bungie_base_url.clone(),
        limiter,
    ))
}

/// Shared player store over a cache.
#[allow(dead_code)]
pub fn test_players(cache: &CacheDb) -> Arc<PlayerStore> {
    Arc::new(PlayerStore::new(cache.clone()))
}

/// Create a test app against a mock Bungie server and an in-memory cache.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(server_uri: &str) -> (axum::Router, Arc<AppState>) {
    let config = test_config(server_uri);
    let cache = CacheDb::temporary().expect("temporary cache");
    let tracker = Tracker::new(config.clone(), test_client(&config), cache);

    let state = Arc::new(AppState { config, tracker });
    (create_router(state.clone()), state)
}

/// Wrap a payload in a successful Bungie envelope.
#[allow(dead_code)]
pub fn envelope(response: Value) -> Value {
    json!({
        "Response": response,
        "ErrorCode": 1,
        "ThrottleSeconds": 0,
        "ErrorStatus": "Success",
        "Message": "Ok",
        "MessageData": {}
    })
}

/// Bungie error envelope (HTTP 200 with a failing code).
#[allow(dead_code)]
pub fn error_envelope(code: i32, status: &str) -> Value {
    json!({
        "ErrorCode": code,
        "ThrottleSeconds": 0,
        "ErrorStatus": status,
        "Message": "Something went wrong",
        "MessageData": {}
    })
}

/// One activity history entry.
#[allow(dead_code)]
pub fn activity(instance_id: &str, period: &str, modes: &[u32], kills: u32, deaths: u32) -> Value {
    json!({
        "period": period,
        "activityDetails": {
            "referenceId": 3897312654u32,
            "directorActivityHash": 2259621230u32,
            "instanceId": instance_id,
            "mode": modes.first().copied().unwrap_or(0),
            "modes": modes,
            "isPrivate": false,
            "membershipType": 3
        },
        "values": {
            "assists": { "statId": "assists", "basic": { "value": 2.0, "displayValue": "2" } },
            "score": { "statId": "score", "basic": { "value": 10.0, "displayValue": "10" } },
            "kills": { "statId": "kills", "basic": { "value": kills as f64, "displayValue": kills.to_string() } },
            "deaths": { "statId": "deaths", "basic": { "value": deaths as f64, "displayValue": deaths.to_string() } },
            "standing": { "statId": "standing", "basic": { "value": if kills > deaths { 0.0 } else { 1.0 } } },
            "timePlayedSeconds": { "statId": "timePlayedSeconds", "basic": { "value": 600.0 } },
            "activityDurationSeconds": { "statId": "activityDurationSeconds", "basic": { "value": 615.0 } }
        }
    })
}

/// Activity history page body.
#[allow(dead_code)]
pub fn history_page(activities: Vec<Value>) -> Value {
    if activities.is_empty() {
        // An exhausted history is an empty object
        envelope(json!({}))
    } else {
        envelope(json!({ "activities": activities }))
    }
}

/// Request path of the activity history of the fixture character.
#[allow(dead_code)]
pub fn history_path() -> String {
    character_history_path(CHARACTER_ID)
}

/// Request path of the activity history of any character of the fixture player.
#[allow(dead_code)]
pub fn character_history_path(character_id: &str) -> String {
    let identity = test_identity();
    format!(
        "/Platform/Destiny2/{}/Account/{}/Character/{}/Stats/Activities/",
        identity.membership_type.code(),
        identity.membership_id,
        character_id
    )
}
