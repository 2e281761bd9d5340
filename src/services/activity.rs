// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity log building.
//!
//! Handles the paginated fetch cycle for one character:
//! 1. Fetch pages from the Bungie API (concurrent batches for a backfill,
//!    strictly sequential for a top-up)
//! 2. Stop at the first empty or failed page, at the end of the range, or
//!    (top-up) at the first page reaching the log's sync point
//! 3. Merge records into the character's log (filter, dedupe, sort) and
//!    advance its coverage
//! 4. Write the player record back to the cache after every merge
//!
//! Pages of a batch are consumed in page order up to the first empty or failed
//! one. The sync point only moves once a cycle has walked from page 0 down to
//! it, so a top-up cut short by a failure or a deadline is picked up again by
//! the next one instead of leaving a gap.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ActivityLog, ActivityMode, ActivityRecord, Identity, MergeOutcome, PlayerId};
use crate::services::bungie::BungieClient;
use crate::services::players::PlayerStore;
use dashmap::DashMap;
use futures_util::future::join_all;
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Mode the activity log is fetched under. Narrower modes are filters over it.
pub const LOG_MODE: ActivityMode = ActivityMode::ALL_PVP;

/// Where a character's fetch cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FetchState {
    /// Never fetched in this process.
    Empty,
    /// Waiting on the page (or the first page of the batch) `page`.
    Fetching { page: u32 },
    Merging,
    Idle,
}

/// Why a fetch cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// A page came back with zero activities: the history is exhausted.
    EmptyPage,
    /// A page failed; records merged before it are kept.
    PageFailed,
    /// The upper bound of the page range was reached.
    RangeExhausted,
    /// A top-up page reached the log's sync point.
    NoNewRecords,
    /// The caller's deadline passed; committed merges are kept.
    DeadlineExceeded,
}

/// What one fetch cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchReport {
    pub pages_fetched: u32,
    pub added: usize,
    pub stopped: StopReason,
}

impl FetchReport {
    fn new() -> Self {
        Self {
            pages_fetched: 0,
            added: 0,
            stopped: StopReason::RangeExhausted,
        }
    }
}

/// Parameters of one fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub mode: ActivityMode,
    /// Pages to fetch, 0-based, end exclusive
    pub pages: Range<u32>,
    pub page_size: u32,
    /// Pages in flight at once (backfill only)
    pub batch_size: u32,
    /// Abort outstanding work once this passes
    pub deadline: Option<Instant>,
}

impl FetchPlan {
    /// Full history backfill with the configured bounds.
    pub fn backfill(config: &Config) -> Self {
        Self {
            mode: LOG_MODE,
            pages: 0..config.backfill_max_pages,
            page_size: config.activity_page_size,
            batch_size: config.backfill_batch_size.max(1),
            deadline: None,
        }
    }

    /// Incremental top-up from page 0, bounded like a backfill.
    pub fn top_up(config: &Config) -> Self {
        Self {
            mode: LOG_MODE,
            pages: 0..config.backfill_max_pages,
            page_size: config.activity_page_size,
            batch_size: 1,
            deadline: None,
        }
    }

    pub fn with_pages(mut self, pages: Range<u32>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// `(player, character)` key of one activity log.
type LogKey = (PlayerId, String);

/// Fetches and merges activity history, one fetch cycle per log at a time.
pub struct ActivityLogBuilder {
    client: Arc<BungieClient>,
    players: Arc<PlayerStore>,
    config: Config,
    /// Per-log mutex: one fetch cycle (and so one merge) in flight per log.
    log_locks: DashMap<LogKey, Arc<Mutex<()>>>,
    states: DashMap<LogKey, FetchState>,
}

impl ActivityLogBuilder {
    pub fn new(client: Arc<BungieClient>, players: Arc<PlayerStore>, config: Config) -> Self {
        Self {
            client,
            players,
            config,
            log_locks: DashMap::new(),
            states: DashMap::new(),
        }
    }

    /// Current state of one character's log.
    pub fn state(&self, identity: &Identity, character_id: &str) -> FetchState {
        self.states
            .get(&log_key(identity, character_id))
            .map(|s| *s)
            .unwrap_or(FetchState::Empty)
    }

    fn set_state(&self, key: &LogKey, state: FetchState) {
        self.states.insert(key.clone(), state);
    }

    fn log_lock(&self, key: &LogKey) -> Arc<Mutex<()>> {
        self.log_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// The character's log, topped up if it exists and backfilled if not.
    ///
    /// `page_limit` overrides the upper bound of the page range. A stored log
    /// whose backfill stopped short of the end of the history is resumed when
    /// the range reaches past the pages it covers.
    pub async fn get_or_build_log(
        &self,
        identity: &Identity,
        character_id: &str,
        page_limit: Option<u32>,
    ) -> Result<ActivityLog> {
        let page_end = page_limit.unwrap_or(self.config.backfill_max_pages);
        let stored = self
            .players
            .load(identity)
            .await
            .log(character_id)
            .cloned()
            .unwrap_or_default();

        let mut reports = Vec::with_capacity(2);
        if stored.is_empty() {
            let plan = FetchPlan::backfill(&self.config).with_pages(0..page_end);
            reports.push(self.backfill(identity, character_id, &plan).await?);
        } else {
            let plan = FetchPlan::top_up(&self.config).with_pages(0..page_end);
            reports.push(self.top_up(identity, character_id, &plan).await?);

            if stored.needs_backfill(page_end) {
                let resume_from = stored.coverage().backfilled_pages;
                tracing::debug!(
                    character_id,
                    resume_from,
                    page_end,
                    "Resuming incomplete backfill"
                );
                let plan = FetchPlan::backfill(&self.config).with_pages(resume_from..page_end);
                reports.push(self.backfill(identity, character_id, &plan).await?);
            }
        }

        for report in &reports {
            tracing::info!(
                membership_id = %identity.membership_id,
                character_id,
                pages = report.pages_fetched,
                added = report.added,
                stopped = ?report.stopped,
                "Activity log fetch cycle complete"
            );
        }

        Ok(self
            .players
            .load(identity)
            .await
            .log(character_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Bulk backfill: pages fired in concurrent batches, each batch merged once.
    pub async fn backfill(
        &self,
        identity: &Identity,
        character_id: &str,
        plan: &FetchPlan,
    ) -> Result<FetchReport> {
        let key = log_key(identity, character_id);
        let lock = self.log_lock(&key);
        let _guard = lock.lock().await;

        let batch_size = plan.batch_size.max(1);
        let mut report = FetchReport::new();
        let mut page = plan.pages.start;

        while page < plan.pages.end {
            if plan.expired() {
                report.stopped = StopReason::DeadlineExceeded;
                break;
            }

            let batch_end = page.saturating_add(batch_size).min(plan.pages.end);
            self.set_state(&key, FetchState::Fetching { page });

            let fetches = (page..batch_end).map(|p| {
                self.client
                    .fetch_activity_page(identity, character_id, plan.mode, p, plan.page_size)
            });
            let results = match plan.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, join_all(fetches)).await
                {
                    Ok(results) => results,
                    Err(_) => {
                        report.stopped = StopReason::DeadlineExceeded;
                        break;
                    }
                },
                None => join_all(fetches).await,
            };

            let (records, pages_used, stop) =
                collect_batch(identity, character_id, page, results)?;
            report.pages_fetched += pages_used;

            // Pages before this batch were all consumed, so the batch
            // continues the run started at `plan.pages.start`
            let from_top = plan.pages.start == 0;
            let covered = (plan.pages.start, page + pages_used);
            let complete = stop == Some(StopReason::EmptyPage);
            let outcome = self
                .commit(&key, identity, character_id, records, |log, reached| {
                    if from_top && pages_used > 0 && reached != Some(false) {
                        log.mark_synced();
                    }
                    log.record_backfill(covered.0, covered.1, complete);
                })
                .await;
            report.added += outcome.added;

            if let Some(reason) = stop {
                report.stopped = reason;
                break;
            }
            page = batch_end;
        }

        self.set_state(&key, FetchState::Idle);
        Ok(report)
    }

    /// Incremental top-up: sequential pages from the start of the range, until
    /// a page reaches the log's sync point.
    pub async fn top_up(
        &self,
        identity: &Identity,
        character_id: &str,
        plan: &FetchPlan,
    ) -> Result<FetchReport> {
        let key = log_key(identity, character_id);
        let lock = self.log_lock(&key);
        let _guard = lock.lock().await;

        let mut report = FetchReport::new();

        for page in plan.pages.clone() {
            if plan.expired() {
                report.stopped = StopReason::DeadlineExceeded;
                break;
            }
            self.set_state(&key, FetchState::Fetching { page });

            let fetch =
                self.client
                    .fetch_activity_page(identity, character_id, plan.mode, page, plan.page_size);
            let result = match plan.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, fetch).await {
                    Ok(result) => result,
                    Err(_) => {
                        report.stopped = StopReason::DeadlineExceeded;
                        break;
                    }
                },
                None => fetch.await,
            };

            let records = match result {
                Ok(records) if records.is_empty() => {
                    report.stopped = StopReason::EmptyPage;
                    break;
                }
                Ok(records) => records,
                Err(e) if e.is_soft_failure() => {
                    log_page_failure(identity, character_id, page, &e);
                    report.stopped = StopReason::PageFailed;
                    break;
                }
                Err(e) => return Err(e),
            };

            report.pages_fetched += 1;
            let from_top = plan.pages.start == 0;
            let mut reached = false;
            let outcome = self
                .commit(&key, identity, character_id, records, |log, connects| {
                    reached = connects == Some(true);
                    if from_top && connects != Some(false) {
                        log.mark_synced();
                    }
                })
                .await;
            report.added += outcome.added;
            tracing::debug!(
                character_id,
                page,
                added = outcome.added,
                duplicates = outcome.duplicates,
                reached_sync_point = reached,
                "Top-up page merged"
            );

            if reached {
                report.stopped = StopReason::NoNewRecords;
                break;
            }
        }

        self.set_state(&key, FetchState::Idle);
        Ok(report)
    }

    /// Merge one batch into the log under the player lock, then let `advance`
    /// update the log's coverage.
    ///
    /// `advance` is told whether the batch reached the sync point the log had
    /// before the merge, or `None` if the log was empty.
    async fn commit(
        &self,
        key: &LogKey,
        identity: &Identity,
        character_id: &str,
        records: Vec<ActivityRecord>,
        advance: impl FnOnce(&mut ActivityLog, Option<bool>),
    ) -> MergeOutcome {
        self.set_state(key, FetchState::Merging);

        let outcome = self
            .players
            .update(identity, |player| {
                let log = player.log_mut(character_id);
                let reached = log
                    .sync_point()
                    .map(|_| log.reaches_sync_point(&records));
                let outcome = log.merge(records);
                advance(log, reached);
                outcome
            })
            .await;

        if outcome.rejected > 0 {
            tracing::debug!(
                character_id,
                rejected = outcome.rejected,
                "Dropped misclassified activities"
            );
        }
        outcome
    }
}

fn log_key(identity: &Identity, character_id: &str) -> LogKey {
    (identity.player_id(), character_id.to_string())
}

fn log_page_failure(identity: &Identity, character_id: &str, page: u32, err: &AppError) {
    tracing::warn!(
        membership_id = %identity.membership_id,
        character_id,
        page,
        error = %err,
        "Activity page failed, keeping records fetched so far"
    );
}

/// Take the results of one batch (in page order) up to the first empty or
/// failed page.
///
/// Returns the records to merge, the pages consumed and the stop reason, if
/// any. Errors other than soft failures abort the cycle.
fn collect_batch(
    identity: &Identity,
    character_id: &str,
    first_page: u32,
    results: Vec<Result<Vec<ActivityRecord>>>,
) -> Result<(Vec<ActivityRecord>, u32, Option<StopReason>)> {
    let mut records = Vec::new();
    let mut pages_used = 0;

    for (page, result) in (first_page..).zip(results) {
        match result {
            Ok(page_records) if page_records.is_empty() => {
                return Ok((records, pages_used + 1, Some(StopReason::EmptyPage)));
            }
            Ok(page_records) => {
                pages_used += 1;
                records.extend(page_records);
            }
            Err(e) if e.is_soft_failure() => {
                log_page_failure(identity, character_id, page, &e);
                return Ok((records, pages_used, Some(StopReason::PageFailed)));
            }
            Err(e) => return Err(e),
        }
    }

    Ok((records, pages_used, None))
}
