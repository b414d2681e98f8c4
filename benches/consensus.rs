//! Benchmarks for changepoint aggregation and session classification.

use anofox_charging::consensus::{
    aggregate, group_breakpoints, sort_breakpoints, AggregationConfig, RawBreakpoint,
};
use anofox_charging::core::FeatureTable;
use anofox_charging::sessions::{detect_sessions, SessionConfig};
use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn hour(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i as i64)
}

/// Three hourly load features with a daily evening charge and some gaps.
fn generate_table(n: usize, seed: u64) -> FeatureTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut total = Vec::with_capacity(n);
    let mut peak = Vec::with_capacity(n);
    let mut range = Vec::with_capacity(n);
    for i in 0..n {
        let charging = (19..23).contains(&(i % 24));
        let base = if charging { 11.0 } else { 0.5 };
        if rng.gen_bool(0.01) {
            total.push(f64::NAN);
            peak.push(f64::NAN);
            range.push(f64::NAN);
            continue;
        }
        total.push(base + rng.gen_range(-0.2..0.2));
        peak.push(base + rng.gen_range(0.0..0.5));
        range.push(rng.gen_range(0.0..0.8));
    }

    FeatureTable::builder()
        .index((0..n).map(hour).collect())
        .column("total_kwh", total)
        .column("max_kw", peak)
        .column("range_kw", range)
        .build()
        .unwrap()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let config = AggregationConfig::default();

    for size in [168, 720, 2160].iter() {
        let table = generate_table(*size, 42);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| aggregate(black_box(&table), &config))
        });
    }

    group.finish();
}

fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_breakpoints");
    let mut rng = StdRng::seed_from_u64(3);

    for size in [100, 1000, 5000].iter() {
        let mut raw: Vec<RawBreakpoint> = (0..*size)
            .map(|_| {
                let feature = ["total_kwh", "max_kw", "range_kw"][rng.gen_range(0..3)];
                RawBreakpoint::new(hour(rng.gen_range(0..24 * 365)), feature)
            })
            .collect();
        sort_breakpoints(&mut raw);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| group_breakpoints(black_box(&raw), Duration::hours(4)))
        });
    }

    group.finish();
}

fn bench_sessions(c: &mut Criterion) {
    let table = generate_table(720, 11);
    let aggregation = aggregate(&table, &AggregationConfig::default()).unwrap();
    let config = SessionConfig::default();

    c.bench_function("detect_sessions_720h", |b| {
        b.iter(|| detect_sessions(black_box(&table), &aggregation, &config))
    });
}

criterion_group!(benches, bench_aggregate, bench_grouping, bench_sessions);
criterion_main!(benches);
