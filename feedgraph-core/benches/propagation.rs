//! Benchmarks for reads, propagation and snapshots

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use feedgraph_core::{impure, merge, pure, State, Store};

/// A chain `n0 -> n1 -> ... -> n{len-1}` headed by an impure counter.
fn chain(len: usize) -> Store {
    let store = Store::new();
    store.feed("n0", impure(|n: &u64| n + 1), &[]).unwrap();

    for i in 1..len {
        let input = format!("n{}", i - 1);
        let name = format!("n{}", i);
        let dependency = input.clone();
        store
            .derived_feed(
                name,
                merge(move |_: &u64, state: &State| {
                    state.get_as::<u64>(&input).copied().unwrap_or(0)
                }),
                &[dependency.as_str()],
            )
            .unwrap();
    }
    store
}

/// One impure source feeding `width` independent merges.
fn fan_out(width: usize) -> Store {
    let store = Store::new();
    store.feed("source", impure(|n: &u64| n + 1), &[]).unwrap();

    for i in 0..width {
        store
            .derived_feed(
                format!("leaf_{}", i),
                merge(|_: &u64, state: &State| state.get_as::<u64>("source").copied().unwrap_or(0)),
                &["source"],
            )
            .unwrap();
    }
    store
}

fn bench_get(c: &mut Criterion) {
    let store = Store::new();
    store.feed("counter", impure(|n: &u64| n + 1), &[]).unwrap();
    store.feed("now", pure(|| 1_u64), &[]).unwrap();

    c.bench_function("get_pure", |b| {
        b.iter(|| {
            black_box(store.get(black_box("now")).unwrap());
        })
    });

    c.bench_function("get_impure", |b| {
        b.iter(|| {
            black_box(store.get(black_box("counter")).unwrap());
        })
    });
}

fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate_chain");

    for len in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, &len| {
            let store = chain(len);
            b.iter(|| {
                black_box(store.get("n0").unwrap());
            })
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_fan_out");

    for width in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, &width| {
            let store = fan_out(width);
            b.iter(|| {
                store.get("source").unwrap();
                black_box(store.all());
            })
        });
    }

    group.finish();

    let store = chain(100);
    store.get("n0").unwrap();
    store.all();

    c.bench_function("snapshot_clean", |b| {
        b.iter(|| {
            black_box(store.all());
        })
    });
}

criterion_group!(benches, bench_get, bench_propagation, bench_snapshot);
criterion_main!(benches);
