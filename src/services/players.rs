// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory player table backed by the on-device cache.

use crate::db::cache::{log_cache_error, CacheDb};
use crate::models::{Identity, Player, PlayerId};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-player locks serializing read-modify-write of a player record.
pub type PlayerLocks = DashMap<PlayerId, Arc<Mutex<()>>>;

/// Player records shared by every service.
///
/// Reads go memory, then cache. Writes replace the whole record in memory and
/// write it back to the cache as one blob; a cache failure never fails the
/// write.
pub struct PlayerStore {
    cache: CacheDb,
    /// Every player touched since startup, logs included. Never evicted: the
    /// process serves a handful of players and the cache holds the rest.
    players: DashMap<PlayerId, Player>,
    locks: PlayerLocks,
}

impl PlayerStore {
    pub fn new(cache: CacheDb) -> Self {
        Self {
            cache,
            players: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &CacheDb {
        &self.cache
    }

    /// Known player record, if any.
    pub async fn find(&self, identity: &Identity) -> Option<Player> {
        let id = identity.player_id();
        if let Some(player) = self.players.get(&id) {
            return Some(player.clone());
        }

        match self.cache.get_player(&id).await {
            Ok(Some(player)) => {
                tracing::debug!(player_id = %id, "Player loaded from cache");
                Some(self.adopt_cached(id, player))
            }
            Ok(None) => None,
            Err(e) => {
                log_cache_error("get_player", &e);
                None
            }
        }
    }

    /// Keep a record read from the cache unless an update landed in memory
    /// while it was being read; the in-memory record is always the newer one.
    fn adopt_cached(&self, id: PlayerId, player: Player) -> Player {
        self.players.entry(id).or_insert(player).clone()
    }

    /// Known player record, or a fresh one.
    pub async fn load(&self, identity: &Identity) -> Player {
        match self.find(identity).await {
            Some(player) => player,
            None => Player::new(identity.clone(), Utc::now()),
        }
    }

    /// Mutate a player record under its lock, then write it back.
    pub async fn update<R>(&self, identity: &Identity, f: impl FnOnce(&mut Player) -> R) -> R {
        let id = identity.player_id();
        let lock = self
            .locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut player = self.load(identity).await;
        let result = f(&mut player);
        player.last_update = Utc::now();

        if let Err(e) = self.cache.put_player(&player).await {
            log_cache_error("put_player", &e);
        }
        self.players.insert(id, player);

        result
    }
}
