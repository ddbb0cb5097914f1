//! Benchmarks for the pattern matcher.
//!
//! Measures:
//! - Two-clause path queries over a ring of edges (clause chaining)
//! - Unordered links of growing arity (permutation search)
//! - Adjacent globs over growing lists (span enumeration)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hypermatch::prelude::*;

/// A ring of `n` concepts joined by edges, plus the path query
/// `Edge($x, $y), Edge($y, $z)`.
fn ring(n: usize) -> (AtomSpace, Query) {
    let space = AtomSpace::new();
    let nodes: Vec<Handle> = (0..n)
        .map(|i| space.add_node(AtomType::Concept, &format!("n{i}")).unwrap())
        .collect();
    for i in 0..n {
        space
            .add_link(AtomType::Edge, vec![nodes[i], nodes[(i + 1) % n]])
            .unwrap();
    }
    let x = space.add_node(AtomType::Variable, "$x").unwrap();
    let y = space.add_node(AtomType::Variable, "$y").unwrap();
    let z = space.add_node(AtomType::Variable, "$z").unwrap();
    let first = space.add_link(AtomType::Edge, vec![x, y]).unwrap();
    let second = space.add_link(AtomType::Edge, vec![y, z]).unwrap();
    let query = Query::new().variable(x).variable(y).variable(z).clause(first).clause(second);
    (space, query)
}

fn bench_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("paths");
    let config = MatchConfig::default();
    for n in [10, 100, 1000] {
        let (space, query) = ring(n);
        let pattern = Pattern::compile(&space, &query, &config).unwrap();
        group.bench_function(BenchmarkId::new("ring", n), |b| {
            b.iter(|| {
                let mut callback = DefaultCallback::new(&space, &config);
                find_groundings(black_box(&space), black_box(&pattern), &mut callback)
            });
        });
    }
    group.finish();
}

fn bench_unordered(c: &mut Criterion) {
    let mut group = c.benchmark_group("unordered");
    let config = MatchConfig::default();
    for arity in [3, 5, 7] {
        let space = AtomSpace::new();
        let items: Vec<Handle> = (0..arity)
            .map(|i| space.add_node(AtomType::Concept, &format!("c{i}")).unwrap())
            .collect();
        space.add_link(AtomType::Set, items).unwrap();
        let vars: Vec<Handle> = (0..arity)
            .map(|i| space.add_node(AtomType::Variable, &format!("$v{i}")).unwrap())
            .collect();
        let clause = space.add_link(AtomType::Set, vars.clone()).unwrap();
        let query = vars
            .iter()
            .fold(Query::new(), |q, v| q.variable(*v))
            .clause(clause);

        group.bench_function(BenchmarkId::new("set", arity), |b| {
            b.iter(|| satisfy(black_box(&space), black_box(&query), &config).unwrap());
        });
    }
    group.finish();
}

fn bench_globs(c: &mut Criterion) {
    let mut group = c.benchmark_group("globs");
    let config = MatchConfig::default();
    for len in [4, 16, 64] {
        let space = AtomSpace::new();
        let items: Vec<Handle> = (0..len)
            .map(|i| space.add_node(AtomType::Concept, &format!("i{i}")).unwrap())
            .collect();
        space.add_link(AtomType::List, items).unwrap();
        let left = space.add_node(AtomType::Glob, "$left").unwrap();
        let right = space.add_node(AtomType::Glob, "$right").unwrap();
        let clause = space.add_link(AtomType::List, vec![left, right]).unwrap();
        let query = Query::new()
            .glob(left, GlobInterval::at_least(0))
            .glob(right, GlobInterval::at_least(0))
            .clause(clause);

        group.bench_function(BenchmarkId::new("split", len), |b| {
            b.iter(|| satisfy(black_box(&space), black_box(&query), &config).unwrap());
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10); // smaller sample for speed
    targets = bench_paths, bench_unordered, bench_globs
);
criterion_main!(benches);
