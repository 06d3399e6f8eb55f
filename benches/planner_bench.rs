//! Sorting and partitioning benchmarks.
//!
//! Synthetic graphs are layered: each key depends directly on a few keys of
//! the previous layer, and every tenth key closes a short cycle through a
//! `Provider` edge so the sort has non-trivial components to order.

use bindplan::{DeclarationModel, ResolvedOptions, compile};
use bindplan_graph::{DependencyGraph, EdgeKind};
use bindplan_shard::partition;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::fmt::Write;
use std::num::NonZeroUsize;

const WIDTH: usize = 50;

fn synthetic_graph(size: usize) -> DependencyGraph<usize> {
    let mut graph = DependencyGraph::with_capacity(size);
    for key in 0..size {
        graph.add_node(key);
        if key >= WIDTH {
            for offset in [WIDTH, WIDTH + 1, WIDTH + 7] {
                if key >= offset {
                    graph.add_dependency(key, key - offset, EdgeKind::Direct);
                }
            }
        }
        if key % 10 == 9 {
            graph.add_dependency(key - 1, key, EdgeKind::Deferred);
            graph.add_dependency(key, key - 1, EdgeKind::Direct);
        }
    }
    graph
}

fn synthetic_model(size: usize) -> DeclarationModel {
    let mut bindings = String::new();
    for key in 0..size {
        if key > 0 {
            bindings.push(',');
        }
        let deps = if key >= WIDTH {
            format!(r#"[{{ "type": "K{}" }}]"#, key - WIDTH)
        } else {
            "[]".to_string()
        };
        let _ = write!(
            bindings,
            r#"{{ "key": {{ "type": "K{key}" }}, "kind": {{ "provides": {{ "factory": "k{key}" }} }}, "dependencies": {deps} }}"#
        );
    }
    let accessors: Vec<String> = (size.saturating_sub(WIDTH)..size)
        .map(|key| format!(r#"{{ "name": "k{key}", "type": "K{key}" }}"#))
        .collect();
    let json = format!(
        r#"{{ "graphs": [{{ "name": "BenchGraph", "accessors": [{}], "bindings": [{bindings}] }}] }}"#,
        accessors.join(",")
    );
    DeclarationModel::from_json(&json).unwrap()
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology_sort");

    for &size in &[1_000, 10_000, 50_000] {
        let graph = synthetic_graph(size);
        group.bench_with_input(BenchmarkId::new("keys", size), &graph, |b, graph| {
            b.iter(|| black_box(graph.sort().unwrap().sorted_keys.len()))
        });
    }

    group.finish();
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");
    let bound = NonZeroUsize::new(2_000).unwrap();

    for &size in &[10_000, 50_000] {
        let topology = synthetic_graph(size).sort().unwrap();
        group.bench_with_input(BenchmarkId::new("keys", size), &topology, |b, topology| {
            b.iter(|| {
                let result = partition(&topology.sorted_keys, &topology.component_of, bound).unwrap();
                black_box(result.len())
            })
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    group.sample_size(20);
    let options = ResolvedOptions {
        enable_sharding: true,
        keys_per_shard: NonZeroUsize::new(500).unwrap(),
        ..ResolvedOptions::default()
    };

    for &size in &[1_000, 5_000] {
        let model = synthetic_model(size);
        group.bench_with_input(BenchmarkId::new("bindings", size), &model, |b, model| {
            b.iter(|| black_box(compile(model, &options).graphs.len()))
        });
    }

    group.finish();
}

criterion_group!(planner_benches, bench_sort, bench_partition, bench_compile);
criterion_main!(planner_benches);
