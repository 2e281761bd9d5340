// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-device read-through cache backed by sled.
//!
//! Provides typed operations for:
//! - Players (one blob per player, including all activity logs)
//! - Carnage reports (by instance id)
//! - Map definitions (by reference id)
//!
//! The store opens on a blocking task at startup. Operations issued before it
//! is ready wait up to the configured timeout and then fail with
//! [`AppError::CacheUnavailable`], which callers treat as a miss.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{CarnageReport, MapDefinition, Player, PlayerId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone)]
enum CacheState {
    Opening,
    Ready(sled::Db),
    Failed(String),
    Disabled,
}

/// Cache handle. Cheap to clone; all clones share one store.
#[derive(Clone)]
pub struct CacheDb {
    state: watch::Receiver<CacheState>,
    open_timeout: Duration,
}

impl CacheDb {
    /// Start opening the store at `path` and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(path: impl Into<PathBuf>, open_timeout: Duration) -> Self {
        let path = path.into();
        let (tx, rx) = watch::channel(CacheState::Opening);

        tokio::spawn(async move {
            let shown = path.display().to_string();
            let opened = tokio::task::spawn_blocking(move || sled::open(&path)).await;

            let state = match opened {
                Ok(Ok(db)) => {
                    tracing::info!(path = %shown, "Cache opened");
                    CacheState::Ready(db)
                }
                Ok(Err(e)) => {
                    tracing::error!(path = %shown, error = %e, "Failed to open cache");
                    CacheState::Failed(e.to_string())
                }
                Err(e) => {
                    tracing::error!(path = %shown, error = %e, "Cache open task failed");
                    CacheState::Failed(e.to_string())
                }
            };

            // Receivers keep the last value after the sender is dropped.
            let _ = tx.send(state);
        });

        Self {
            state: rx,
            open_timeout,
        }
    }

    /// A cache that is never available (network-only mode).
    pub fn disabled() -> Self {
        let (_tx, rx) = watch::channel(CacheState::Disabled);
        Self {
            state: rx,
            open_timeout: Duration::ZERO,
        }
    }

    /// In-memory store, discarded on drop. For tests.
    pub fn temporary() -> Result<Self, AppError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| AppError::CacheUnavailable(e.to_string()))?;
        let (_tx, rx) = watch::channel(CacheState::Ready(db));
        Ok(Self {
            state: rx,
            open_timeout: Duration::ZERO,
        })
    }

    /// Whether the store has finished opening successfully.
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), CacheState::Ready(_))
    }

    /// Wait (bounded) for the store to finish opening.
    async fn store(&self) -> Result<sled::Db, AppError> {
        let mut rx = self.state.clone();
        let waited = tokio::time::timeout(
            self.open_timeout,
            rx.wait_for(|s| !matches!(s, CacheState::Opening)),
        )
        .await;

        let state = match waited {
            Ok(Ok(state)) => state.clone(),
            Ok(Err(_)) => {
                return Err(AppError::CacheUnavailable(
                    "cache opener exited before the store was ready".to_string(),
                ))
            }
            Err(_) => {
                return Err(AppError::CacheUnavailable(format!(
                    "cache not ready after {} ms",
                    self.open_timeout.as_millis()
                )))
            }
        };

        match state {
            CacheState::Ready(db) => Ok(db),
            CacheState::Failed(msg) => Err(AppError::CacheUnavailable(msg)),
            CacheState::Disabled => Err(AppError::CacheUnavailable(
                "cache disabled".to_string(),
            )),
            CacheState::Opening => Err(AppError::CacheUnavailable(
                "cache still opening".to_string(),
            )),
        }
    }

    async fn tree(&self, collection: &str) -> Result<sled::Tree, AppError> {
        self.store()
            .await?
            .open_tree(collection)
            .map_err(|e| AppError::CacheUnavailable(e.to_string()))
    }

    // ─── Generic Operations ──────────────────────────────────────

    /// Read a value, `None` on miss.
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, AppError> {
        let tree = self.tree(collection).await?;
        let Some(bytes) = tree
            .get(key.as_bytes())
            .map_err(|e| AppError::CacheUnavailable(e.to_string()))?
        else {
            return Ok(None);
        };

        let value = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "Corrupt cache entry {}/{}: {}",
                collection,
                key,
                e
            ))
        })?;
        Ok(Some(value))
    }

    /// Insert or replace a value.
    pub async fn put<T: Serialize>(
        &self,
        collection: &str,
        key: &str,
        value: &T,
    ) -> Result<(), AppError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Serialize {}: {}", collection, e)))?;
        self.tree(collection)
            .await?
            .insert(key.as_bytes(), bytes)
            .map_err(|e| AppError::CacheUnavailable(e.to_string()))?;

        tracing::debug!(collection, key, "Cache write");
        Ok(())
    }

    /// Flush pending writes to disk.
    pub async fn flush(&self) -> Result<(), AppError> {
        self.store()
            .await?
            .flush_async()
            .await
            .map_err(|e| AppError::CacheUnavailable(e.to_string()))?;
        Ok(())
    }

    // ─── Player Operations ───────────────────────────────────────

    pub async fn get_player(&self, id: &PlayerId) -> Result<Option<Player>, AppError> {
        self.get(collections::PLAYERS, id.as_str()).await
    }

    pub async fn put_player(&self, player: &Player) -> Result<(), AppError> {
        self.put(collections::PLAYERS, player.player_id().as_str(), player)
            .await
    }

    // ─── Carnage Report Operations ───────────────────────────────

    pub async fn get_carnage_report(
        &self,
        instance_id: &str,
    ) -> Result<Option<CarnageReport>, AppError> {
        self.get(collections::CARNAGE_REPORTS, instance_id).await
    }

    pub async fn put_carnage_report(&self, report: &CarnageReport) -> Result<(), AppError> {
        self.put(collections::CARNAGE_REPORTS, &report.instance_id, report)
            .await
    }

    // ─── Map Operations ──────────────────────────────────────────

    pub async fn get_map(&self, reference_id: u32) -> Result<Option<MapDefinition>, AppError> {
        self.get(collections::MAPS, &reference_id.to_string()).await
    }

    pub async fn put_map(&self, map: &MapDefinition) -> Result<(), AppError> {
        self.put(collections::MAPS, &map.reference_id.to_string(), map)
            .await
    }
}

/// Log a failed cache read or write. Unavailability is expected in
/// network-only mode and only logged at debug level.
pub fn log_cache_error(op: &'static str, err: &AppError) {
    match err {
        AppError::CacheUnavailable(msg) => {
            tracing::debug!(op, reason = %msg, "Cache unavailable, using network only")
        }
        other => tracing::warn!(op, error = %other, "Cache operation failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_cache_is_unavailable() {
        let cache = CacheDb::disabled();
        assert!(!cache.is_ready());

        let result: Result<Option<MapDefinition>, _> = cache.get(collections::MAPS, "1").await;
        assert!(matches!(result, Err(AppError::CacheUnavailable(_))));
    }

    #[tokio::test]
    async fn test_temporary_cache_miss_then_hit() {
        let cache = CacheDb::temporary().unwrap();
        assert!(cache.get_map(42).await.unwrap().is_none());

        let map = MapDefinition {
            reference_id: 42,
            name: "Javelin-4".to_string(),
            description: String::new(),
            image: None,
        };
        cache.put_map(&map).await.unwrap();

        assert_eq!(cache.get_map(42).await.unwrap(), Some(map));
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let cache = CacheDb::temporary().unwrap();
        cache.put(collections::MAPS, "7", &"map").await.unwrap();

        let other: Option<String> = cache.get(collections::CARNAGE_REPORTS, "7").await.unwrap();
        assert!(other.is_none());
    }
}
