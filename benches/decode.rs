/// Decode throughput and latency benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relay_feed::protocol::{encode_depth, encode_slot, DepthSnapshot, Level, Tick};
use relay_feed::{Decoder, SubscriptionRegistry};

fn sample_tick(kind: i32, index: i32, sequence: i64) -> Tick {
    Tick {
        kind,
        index,
        tx_time_ms: 1_700_000_000_000,
        event_time_ms: 1_700_000_000_001,
        local_time_ns: 1_700_000_000_002_000_000,
        sequence,
        price: 65000.5,
        size: 0.125,
    }
}

fn create_depth(levels_per_side: usize) -> Vec<u8> {
    let snapshot = DepthSnapshot {
        kind: 2,
        index: 1,
        tx_time_ms: 1,
        event_time_ms: 2,
        local_time_ns: 3,
        sequence: 4,
        ask_offset: 0,
        ask_count: levels_per_side as i32,
        bid_offset: 0,
        bid_count: levels_per_side as i32,
    };
    let levels: Vec<Level> = (0..levels_per_side * 2)
        .map(|i| Level {
            price: 65000.0 + i as f64,
            size: 1.0,
        })
        .collect();
    encode_depth(&snapshot, &levels)
}

fn bench_decode_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_throughput");

    for msg_count in [1000usize, 10000, 100000].iter() {
        let datagrams: Vec<[u8; 56]> = (0..*msg_count)
            .map(|seq| sample_tick(if seq % 2 == 0 { 1 } else { -3 }, 1, seq as i64).encode())
            .collect();

        group.throughput(Throughput::Elements(*msg_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(msg_count),
            msg_count,
            |b, _| {
                b.iter(|| {
                    datagrams
                        .iter()
                        .filter(|d| Decoder::decode(black_box(&d[..])).is_ok())
                        .count()
                });
            },
        );
    }
    group.finish();
}

fn bench_decode_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_latency");

    let tick = sample_tick(1, 7, 42).encode();
    group.bench_function("tick", |b| b.iter(|| Decoder::decode(black_box(&tick))));

    let trade = sample_tick(-3, 7, 42).encode();
    group.bench_function("trade", |b| b.iter(|| Decoder::decode(black_box(&trade))));

    for levels in [5usize, 20, 100].iter() {
        let depth = create_depth(*levels);
        group.bench_with_input(BenchmarkId::new("depth", levels), &depth, |b, depth| {
            b.iter(|| Decoder::decode(black_box(depth)))
        });
    }

    let slot = encode_slot(&sample_tick(-2, 7, 42));
    group.bench_function("ring_slot", |b| {
        b.iter(|| Decoder::decode_slot(black_box(&slot)))
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    let mut registry = SubscriptionRegistry::new();
    for index in 0..100 {
        registry.confirm(index, &format!("binance:sym{}", index));
    }

    group.bench_function("first", |b| b.iter(|| registry.resolve(black_box(0))));
    group.bench_function("last", |b| b.iter(|| registry.resolve(black_box(99))));
    group.bench_function("missing", |b| b.iter(|| registry.resolve(black_box(1000))));

    group.finish();
}

criterion_group!(
    benches,
    bench_decode_throughput,
    bench_decode_latency,
    bench_resolve
);
criterion_main!(benches);
