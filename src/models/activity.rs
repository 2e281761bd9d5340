// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Match records and the per-character activity log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// Activity mode tag (`DestinyActivityModeType`).
///
/// Kept as the raw number: the API adds modes every season and a closed enum
/// would reject records we still want to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityMode(pub u32);

impl ActivityMode {
    /// Upstream classification defect; never stored.
    pub const NONE: ActivityMode = ActivityMode(0);
    pub const ALL_PVP: ActivityMode = ActivityMode(5);
    pub const CONTROL: ActivityMode = ActivityMode(10);
    pub const CLASH: ActivityMode = ActivityMode(12);
    pub const IRON_BANNER: ActivityMode = ActivityMode(19);
    pub const RUMBLE: ActivityMode = ActivityMode(48);
    pub const PVP_COMPETITIVE: ActivityMode = ActivityMode(69);
    pub const PVP_QUICKPLAY: ActivityMode = ActivityMode(70);
    pub const TRIALS_OF_OSIRIS: ActivityMode = ActivityMode(84);

    pub fn label(self) -> &'static str {
        match self.0 {
            5 => "All PvP",
            10 => "Control",
            12 => "Clash",
            19 => "Iron Banner",
            37 => "Survival",
            48 => "Rumble",
            69 => "Competitive",
            70 => "Quickplay",
            84 => "Trials of Osiris",
            _ => "Other",
        }
    }
}

impl fmt::Display for ActivityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-player values of one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityValues {
    pub score: u32,
    pub kills: u32,
    pub assists: u32,
    pub deaths: u32,
    pub seconds_played: u32,
    pub won: bool,
}

/// One completed match instance as seen by one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    /// Unique key within a character's log
    pub instance_id: String,
    /// Match start
    pub period: DateTime<Utc>,
    /// Primary mode
    pub mode: ActivityMode,
    /// Every mode the match qualifies under
    pub modes: Vec<ActivityMode>,
    /// Map (activity definition hash)
    pub reference_id: u32,
    pub duration_seconds: u32,
    pub values: ActivityValues,
}

impl ActivityRecord {
    /// Records classified as mode 0 come from an upstream defect.
    pub fn is_misclassified(&self) -> bool {
        self.mode == ActivityMode::NONE || self.modes.contains(&ActivityMode::NONE)
    }

    pub fn qualifies_for(&self, mode: ActivityMode) -> bool {
        self.modes.contains(&mode)
    }
}

/// Newest first; equal periods fall back to the instance id so the order is
/// the same on every merge.
fn newest_first(a: &ActivityRecord, b: &ActivityRecord) -> Ordering {
    b.period
        .cmp(&a.period)
        .then_with(|| b.instance_id.cmp(&a.instance_id))
}

/// Result of merging one batch of fetched records into a log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// New records inserted
    pub added: usize,
    /// Already present (by instance id)
    pub duplicates: usize,
    /// Dropped as misclassified
    pub rejected: usize,
}

/// How much of the upstream history a log is known to hold.
///
/// Pages only ever shift towards higher numbers as new matches are played, so
/// resuming a backfill at `backfilled_pages` can overlap what is known but
/// never skip a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogCoverage {
    /// Period of the newest record known to connect to the rest of the log.
    /// Records newer than this may have gaps below them.
    pub synced_to: Option<DateTime<Utc>>,
    /// Pages consumed from the start of the history by backfills
    pub backfilled_pages: u32,
    /// A backfill reached the empty page past the oldest match
    pub complete: bool,
}

/// Chronological match history of one character, most recent first.
///
/// Invariants: instance ids are unique and periods never increase along the
/// sequence. Only [`ActivityLog::merge`] mutates the records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    records: Vec<ActivityRecord>,
    #[serde(default)]
    coverage: LogCoverage,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge fetched records, skipping misclassified and already known ones.
    ///
    /// Pages fetched in parallel arrive in any order, so the log is re-sorted
    /// whenever something was added.
    pub fn merge<I>(&mut self, fetched: I) -> MergeOutcome
    where
        I: IntoIterator<Item = ActivityRecord>,
    {
        let mut outcome = MergeOutcome::default();
        let mut known: HashSet<String> = self
            .records
            .iter()
            .map(|r| r.instance_id.clone())
            .collect();

        for record in fetched {
            if record.is_misclassified() {
                outcome.rejected += 1;
                continue;
            }
            if !known.insert(record.instance_id.clone()) {
                outcome.duplicates += 1;
                continue;
            }
            self.records.push(record);
            outcome.added += 1;
        }

        if outcome.added > 0 {
            self.records.sort_by(newest_first);
        }

        outcome
    }

    pub fn records(&self) -> &[ActivityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent match, if any.
    pub fn latest(&self) -> Option<&ActivityRecord> {
        self.records.first()
    }

    pub fn coverage(&self) -> &LogCoverage {
        &self.coverage
    }

    /// Where a fetch from page 0 connects to the known history. Logs stored
    /// before coverage was tracked connect at their newest record.
    pub fn sync_point(&self) -> Option<DateTime<Utc>> {
        self.coverage
            .synced_to
            .or_else(|| self.latest().map(|r| r.period))
    }

    /// Whether a fetched page reaches the known history.
    pub fn reaches_sync_point(&self, page: &[ActivityRecord]) -> bool {
        self.sync_point()
            .is_some_and(|point| page.iter().any(|r| r.period <= point))
    }

    /// Everything from the newest record down is contiguous.
    pub fn mark_synced(&mut self) {
        self.coverage.synced_to = self.latest().map(|r| r.period);
    }

    /// Record backfill pages consumed from `start` up to `end`, only when they
    /// continue the pages already covered.
    pub fn record_backfill(&mut self, start: u32, end: u32, complete: bool) {
        if start > self.coverage.backfilled_pages {
            return;
        }
        self.coverage.backfilled_pages = self.coverage.backfilled_pages.max(end);
        self.coverage.complete |= complete;
    }

    /// Whether a backfill up to `page_end` would reach pages not yet covered.
    pub fn needs_backfill(&self, page_end: u32) -> bool {
        !self.coverage.complete && page_end > self.coverage.backfilled_pages
    }

    /// The `count` most recent matches qualifying under `mode`.
    pub fn recent(&self, mode: ActivityMode, count: usize) -> Vec<&ActivityRecord> {
        self.records
            .iter()
            .filter(|r| r.qualifies_for(mode))
            .take(count)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(id: &str, period: &str, modes: Vec<u32>) -> ActivityRecord {
        ActivityRecord {
            instance_id: id.to_string(),
            period: DateTime::parse_from_rfc3339(period)
                .unwrap()
                .with_timezone(&Utc),
            mode: ActivityMode(*modes.first().unwrap_or(&0)),
            modes: modes.into_iter().map(ActivityMode).collect(),
            reference_id: 1,
            duration_seconds: 600,
            values: ActivityValues::default(),
        }
    }

    #[test]
    fn test_merge_sorts_newest_first() {
        let mut log = ActivityLog::new();
        let outcome = log.merge(vec![
            make_record("1", "2024-01-10T10:00:00Z", vec![70, 5]),
            make_record("3", "2024-01-12T10:00:00Z", vec![70, 5]),
            make_record("2", "2024-01-11T10:00:00Z", vec![70, 5]),
        ]);

        assert_eq!(outcome.added, 3);
        let ids: Vec<&str> = log.records().iter().map(|r| r.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut log = ActivityLog::new();
        let page = vec![
            make_record("1", "2024-01-10T10:00:00Z", vec![70, 5]),
            make_record("2", "2024-01-11T10:00:00Z", vec![70, 5]),
        ];

        log.merge(page.clone());
        let again = log.merge(page);

        assert_eq!(again.added, 0);
        assert_eq!(again.duplicates, 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_merge_dedupes_within_one_batch() {
        let mut log = ActivityLog::new();
        let outcome = log.merge(vec![
            make_record("7", "2024-01-10T10:00:00Z", vec![84, 5]),
            make_record("7", "2024-01-10T10:00:00Z", vec![84, 5]),
        ]);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.duplicates, 1);
    }

    #[test]
    fn test_merge_rejects_mode_zero() {
        let mut log = ActivityLog::new();
        let mut zero_primary = make_record("1", "2024-01-10T10:00:00Z", vec![70, 5]);
        zero_primary.mode = ActivityMode::NONE;
        let zero_tag = make_record("2", "2024-01-10T11:00:00Z", vec![70, 0]);

        let outcome = log.merge(vec![zero_primary, zero_tag]);

        assert_eq!(outcome.rejected, 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_equal_periods_have_stable_order() {
        let mut a = ActivityLog::new();
        a.merge(vec![
            make_record("10", "2024-01-10T10:00:00Z", vec![5]),
            make_record("11", "2024-01-10T10:00:00Z", vec![5]),
        ]);
        let mut b = ActivityLog::new();
        b.merge(vec![make_record("11", "2024-01-10T10:00:00Z", vec![5])]);
        b.merge(vec![make_record("10", "2024-01-10T10:00:00Z", vec![5])]);

        assert_eq!(a, b);
    }

    #[test]
    fn test_sync_point_defaults_to_newest_record() {
        let mut log = ActivityLog::new();
        assert!(log.sync_point().is_none());
        assert!(!log.reaches_sync_point(&[make_record("1", "2024-01-10T10:00:00Z", vec![5])]));

        log.merge(vec![make_record("2", "2024-01-11T10:00:00Z", vec![5])]);
        log.mark_synced();
        log.merge(vec![make_record("5", "2024-01-14T10:00:00Z", vec![5])]);

        // The newer record was merged without reaching the older one
        assert_eq!(log.sync_point(), Some(log.records()[1].period));
        assert!(!log.reaches_sync_point(&[make_record("4", "2024-01-13T10:00:00Z", vec![5])]));
        assert!(log.reaches_sync_point(&[
            make_record("3", "2024-01-12T10:00:00Z", vec![5]),
            make_record("2", "2024-01-11T10:00:00Z", vec![5]),
        ]));
    }

    #[test]
    fn test_backfill_coverage_only_grows_contiguously() {
        let mut log = ActivityLog::new();
        assert!(log.needs_backfill(1));

        log.record_backfill(0, 2, false);
        // A range starting past the covered pages leaves a hole
        log.record_backfill(4, 6, false);
        assert_eq!(log.coverage().backfilled_pages, 2);
        assert!(log.needs_backfill(3));
        assert!(!log.needs_backfill(2));

        log.record_backfill(2, 3, true);
        assert!(log.coverage().complete);
        assert!(!log.needs_backfill(100));
    }

    #[test]
    fn test_recent_filters_by_mode() {
        let mut log = ActivityLog::new();
        log.merge(vec![
            make_record("1", "2024-01-10T10:00:00Z", vec![84, 5]),
            make_record("2", "2024-01-11T10:00:00Z", vec![70, 5]),
            make_record("3", "2024-01-12T10:00:00Z", vec![84, 5]),
        ]);

        let trials: Vec<&str> = log
            .recent(ActivityMode::TRIALS_OF_OSIRIS, 10)
            .iter()
            .map(|r| r.instance_id.as_str())
            .collect();
        assert_eq!(trials, vec!["3", "1"]);
        assert_eq!(log.recent(ActivityMode::ALL_PVP, 2).len(), 2);
    }
}
