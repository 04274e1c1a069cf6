//! Benchmarks for lineage graph operations.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use seshat::artifact::ArtifactId;
use seshat::graph::query::LineageQueryEngine;
use seshat::graph::store::GraphStore;
use seshat::graph::Relationship;

fn art(raw: u64) -> ArtifactId {
    ArtifactId::new(raw).unwrap()
}

/// Balanced binary derivation tree with `depth` levels under one root.
fn tree_graph(depth: u32) -> Arc<GraphStore> {
    let graph = Arc::new(GraphStore::new());
    for parent in 1..2u64.pow(depth) {
        for child in [2 * parent, 2 * parent + 1] {
            graph.add_relationship(&Relationship::new(art(parent), art(child), "derived-from"));
        }
    }
    graph
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_tree_4k", |bench| {
        bench.iter(|| black_box(tree_graph(11)))
    });
}

fn bench_ancestors(c: &mut Criterion) {
    let query = LineageQueryEngine::new(tree_graph(11));
    let leaf = art(2u64.pow(11) - 1);

    c.bench_function("ancestors_depth_11", |bench| {
        bench.iter(|| black_box(query.ancestors(leaf, None)))
    });
}

fn bench_descendants(c: &mut Criterion) {
    let query = LineageQueryEngine::new(tree_graph(11));

    c.bench_function("descendants_4k", |bench| {
        bench.iter(|| black_box(query.descendants(art(1), None)))
    });
}

fn bench_common_ancestors(c: &mut Criterion) {
    let query = LineageQueryEngine::new(tree_graph(11));
    let leaves: Vec<ArtifactId> = (0..8).map(|i| art(2u64.pow(11) - 1 - i)).collect();

    c.bench_function("common_ancestors_8_leaves", |bench| {
        bench.iter(|| black_box(query.common_ancestors(&leaves).unwrap()))
    });
}

fn bench_path(c: &mut Criterion) {
    let query = LineageQueryEngine::new(tree_graph(11));
    let leaf = art(2u64.pow(11) - 1);

    c.bench_function("path_root_to_leaf", |bench| {
        bench.iter(|| black_box(query.path(art(1), leaf).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_build,
    bench_ancestors,
    bench_descendants,
    bench_common_ancestors,
    bench_path
);
criterion_main!(benches);
