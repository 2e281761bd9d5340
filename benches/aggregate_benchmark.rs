use chrono::{DateTime, TimeDelta, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use crucible_tracker::models::{ActivityLog, ActivityMode, ActivityRecord, ActivityValues, TimeWindow};
use crucible_tracker::services::stats::aggregate;
use std::hint::black_box;

/// A long-time player's history: 10,000 matches, one every two hours.
fn build_log(now: DateTime<Utc>) -> ActivityLog {
    let records = (0..10_000u32).map(|i| {
        let mode = match i % 4 {
            0 => ActivityMode::TRIALS_OF_OSIRIS,
            1 => ActivityMode::CONTROL,
            2 => ActivityMode::IRON_BANNER,
            _ => ActivityMode::RUMBLE,
        };
        ActivityRecord {
            instance_id: (14_000_000_000u64 + u64::from(i)).to_string(),
            period: now - TimeDelta::hours(2 * i64::from(i)),
            mode,
            modes: vec![mode, ActivityMode::ALL_PVP],
            reference_id: 3897312654,
            duration_seconds: 600,
            values: ActivityValues {
                score: 15,
                kills: i % 20,
                assists: i % 7,
                deaths: i % 13,
                seconds_played: 580,
                won: i % 2 == 0,
            },
        }
    });

    let mut log = ActivityLog::new();
    log.merge(records);
    log
}

fn benchmark_aggregate(c: &mut Criterion) {
    let now = DateTime::from_timestamp(1_709_661_600, 0).unwrap_or_default();
    let log = build_log(now);

    let all_time = TimeWindow::new(now - TimeDelta::days(3650), now);
    let weekly = TimeWindow::new(now - TimeDelta::days(7), now);

    let mut group = c.benchmark_group("aggregate");

    group.bench_function("all_time_all_pvp", |b| {
        b.iter(|| aggregate(black_box(&log), ActivityMode::ALL_PVP, &all_time))
    });

    group.bench_function("all_time_trials", |b| {
        b.iter(|| aggregate(black_box(&log), ActivityMode::TRIALS_OF_OSIRIS, &all_time))
    });

    // Stops at the first record older than the window
    group.bench_function("weekly_all_pvp", |b| {
        b.iter(|| aggregate(black_box(&log), ActivityMode::ALL_PVP, &weekly))
    });

    group.finish();
}

criterion_group!(benches, benchmark_aggregate);
criterion_main!(benches);
