// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Map (activity definition) lookup.
//!
//! Many matches share a map, so definitions are resolved memory first, then
//! cache, then network. A per-reference lock with a double-check makes
//! concurrent requests for one map cost a single round trip.

use crate::db::cache::{log_cache_error, CacheDb};
use crate::error::Result;
use crate::models::MapDefinition;
use crate::services::bungie::BungieClient;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Name shown when a definition cannot be fetched.
pub const UNKNOWN_MAP: &str = "Unknown map";

pub struct DefinitionService {
    client: Arc<BungieClient>,
    cache: CacheDb,
    maps: DashMap<u32, MapDefinition>,
    locks: DashMap<u32, Arc<Mutex<()>>>,
}

impl DefinitionService {
    pub fn new(client: Arc<BungieClient>, cache: CacheDb) -> Self {
        Self {
            client,
            cache,
            maps: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Definition of one map.
    pub async fn get_map(&self, reference_id: u32) -> Result<MapDefinition> {
        if let Some(map) = self.maps.get(&reference_id) {
            return Ok(map.clone());
        }

        let lock = self
            .locks
            .entry(reference_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have resolved it while we waited.
        if let Some(map) = self.maps.get(&reference_id) {
            return Ok(map.clone());
        }

        match self.cache.get_map(reference_id).await {
            Ok(Some(map)) => {
                self.maps.insert(reference_id, map.clone());
                return Ok(map);
            }
            Ok(None) => {}
            Err(e) => log_cache_error("get_map", &e),
        }

        let map = self.client.fetch_activity_definition(reference_id).await?;
        tracing::debug!(reference_id, name = %map.name, "Fetched map definition");

        if let Err(e) = self.cache.put_map(&map).await {
            log_cache_error("put_map", &e);
        }
        self.maps.insert(reference_id, map.clone());
        Ok(map)
    }

    /// Display name of a map; lookup failures degrade to [`UNKNOWN_MAP`].
    pub async fn resolve_map_name(&self, reference_id: u32) -> String {
        match self.get_map(reference_id).await {
            Ok(map) => map.name,
            Err(e) => {
                tracing::warn!(reference_id, error = %e, "Map lookup failed");
                UNKNOWN_MAP.to_string()
            }
        }
    }
}
