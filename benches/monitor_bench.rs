//! Criterion benchmarks for hot paths in netwatch.
//!
//! Run with:
//!   cargo bench
//!
//! Covers:
//!   - Backoff interval arithmetic (runs on every check)
//!   - Check event serialization (runs per subscriber consuming the stream)
//!   - Probe URL cache-busting (runs per probe)

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

use netwatch::backoff;
use netwatch::{CheckEvent, EffectiveType, LinkSnapshot, MonitorEvent, Status, TransportKind};

// ─── Backoff arithmetic ──────────────────────────────────────────────────────

fn bench_backoff(c: &mut Criterion) {
    let base = Duration::from_secs(10);
    let max = Duration::from_secs(60);

    c.bench_function("backoff_grow_step", |b| {
        b.iter(|| {
            let next = backoff::grow(black_box(Duration::from_secs(20)), black_box(2.0), max);
            black_box(next);
        });
    });

    c.bench_function("backoff_outage_schedule_32", |b| {
        b.iter(|| {
            let mut interval = base;
            for _ in 0..32 {
                interval = backoff::grow(black_box(interval), 2.0, max);
            }
            black_box(interval);
        });
    });

    c.bench_function("backoff_nth_interval", |b| {
        b.iter(|| {
            let interval = backoff::nth_interval(base, black_box(2.0), max, black_box(12));
            black_box(interval);
        });
    });
}

// ─── Event serialization ─────────────────────────────────────────────────────

fn sample_check() -> CheckEvent {
    CheckEvent {
        timestamp: chrono::Utc::now(),
        interval: Duration::from_secs(10),
        latency: Some(Duration::from_millis(48)),
        status: Status::Online,
        connection: Some(LinkSnapshot {
            downlink_mbps: Some(12.5),
            effective_type: Some(EffectiveType::Type4g),
            rtt_ms: Some(40),
            save_data: Some(false),
            transport: Some(TransportKind::Wifi),
        }),
    }
}

fn bench_event_serialization(c: &mut Criterion) {
    c.bench_function("serialize_check_event", |b| {
        let check = sample_check();
        b.iter(|| {
            let json = serde_json::to_string(black_box(&check)).unwrap();
            black_box(json);
        });
    });

    c.bench_function("serialize_monitor_event_tagged", |b| {
        let event = MonitorEvent::Check(sample_check());
        b.iter(|| {
            let json = serde_json::to_string(black_box(&event)).unwrap();
            black_box(json);
        });
    });
}

// ─── Probe URL cache-busting ─────────────────────────────────────────────────
//
// Mirrors what the HTTP prober does before each request: clone the target and
// append a unique query parameter.

fn bench_cache_bust(c: &mut Criterion) {
    let target = url::Url::parse("https://connectivity.example.com/ping?region=eu").unwrap();

    c.bench_function("probe_url_cache_bust", |b| {
        b.iter(|| {
            let mut url = black_box(&target).clone();
            url.query_pairs_mut()
                .append_pair("nocache", &chrono::Utc::now().timestamp_millis().to_string());
            black_box(url);
        });
    });
}

// ─── Entry point ─────────────────────────────────────────────────────────────

criterion_group!(
    benches,
    bench_backoff,
    bench_event_serialization,
    bench_cache_bust
);
criterion_main!(benches);
