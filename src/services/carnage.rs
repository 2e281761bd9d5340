// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-through access to post-game carnage reports.

use crate::db::cache::{log_cache_error, CacheDb};
use crate::error::Result;
use crate::models::CarnageReport;
use crate::services::bungie::BungieClient;
use std::sync::Arc;

/// Carnage reports never change once a match is over, so a cached report is
/// always current.
pub struct CarnageService {
    client: Arc<BungieClient>,
    cache: CacheDb,
}

impl CarnageService {
    pub fn new(client: Arc<BungieClient>, cache: CacheDb) -> Self {
        Self { client, cache }
    }

    /// Cache first, then network with write-back. Network failures are
    /// surfaced to the caller, not retried.
    pub async fn get_report(&self, instance_id: &str) -> Result<CarnageReport> {
        match self.cache.get_carnage_report(instance_id).await {
            Ok(Some(report)) => {
                tracing::debug!(instance_id, "Carnage report cache hit");
                return Ok(report);
            }
            Ok(None) => {}
            Err(e) => log_cache_error("get_carnage_report", &e),
        }

        let report = self.client.fetch_carnage_report(instance_id).await?;
        tracing::info!(
            instance_id,
            entries = report.entries.len(),
            "Fetched carnage report"
        );

        if let Err(e) = self.cache.put_carnage_report(&report).await {
            log_cache_error("put_carnage_report", &e);
        }
        Ok(report)
    }
}
