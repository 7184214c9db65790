use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use cargodist::{CargoId, Date, EdgeUpdateMode, GraphId, GraphStore, Position, StationId};

/// A ring of `hubs` hubs, each linked to its two neighbours.
fn ring(id: u16, hubs: u16) -> GraphStore {
    let mut g = GraphStore::new(GraphId(id), CargoId(0), Date::ZERO);
    for i in 0..hubs {
        g.add_node(StationId(i), Position::new(u32::from(i) * 7, u32::from(i % 13)), 10);
    }
    for i in 0..hubs {
        let next = (i + 1) % hubs;
        g.node_mut(i)
            .update_edge(next, 100, 40, EdgeUpdateMode::increase(), Date::ZERO);
        g.node_mut(next)
            .update_edge(i, 80, 20, EdgeUpdateMode::increase(), Date::ZERO);
        g.node_mut(i).update_supply(u32::from(i) + 1, Date::ZERO);
    }
    g
}

fn bench_add_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_ops/add_node");
    group.throughput(Throughput::Elements(256));
    group.bench_function("256_hubs", |b| {
        b.iter(|| {
            let mut g = GraphStore::new(GraphId(0), CargoId(0), Date::ZERO);
            for i in 0..256u16 {
                g.add_node(StationId(i), Position::default(), 0);
            }
            black_box(g.size())
        });
    });
    group.finish();
}

fn bench_update_edge(c: &mut Criterion) {
    c.bench_function("graph_ops/update_edge", |b| {
        let mut g = ring(0, 128);
        let mut day = 0;
        b.iter(|| {
            day += 1;
            for i in (0..128u16).step_by(3) {
                g.node_mut(i).update_edge(
                    (i + 5) % 128,
                    10,
                    3,
                    EdgeUpdateMode::refresh(),
                    Date::from_days(day),
                );
            }
        });
    });
}

fn bench_compress(c: &mut Criterion) {
    c.bench_function("graph_ops/compress_256", |b| {
        b.iter_batched(
            || ring(0, 256),
            |mut g| {
                g.compress(Date::from_days(512));
                g
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_merge(c: &mut Criterion) {
    c.bench_function("graph_ops/merge_128_into_128", |b| {
        b.iter_batched(
            || (ring(0, 128), ring(1, 128)),
            |(mut g, other)| {
                let moved = g.merge(other, Date::from_days(64));
                black_box(moved.len());
                g
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_remove_node(c: &mut Criterion) {
    c.bench_function("graph_ops/remove_node_front", |b| {
        b.iter_batched(
            || ring(0, 256),
            |mut g| {
                black_box(g.remove_node(0));
                g
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_add_node,
    bench_update_edge,
    bench_compress,
    bench_merge,
    bench_remove_node
);
criterion_main!(benches);
