//! Benchmarks for the atom store: insertion with deduplication and
//! incoming-set lookups.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hypermatch::prelude::*;

fn bench_insert_chain(c: &mut Criterion) {
    c.bench_function("insert_chain_10k", |b| {
        b.iter(|| {
            let space = AtomSpace::new();
            let mut prev = space.add_node(AtomType::Concept, "root").unwrap();
            for i in 0..10_000 {
                let next = space.add_node(AtomType::Concept, &format!("n{i}")).unwrap();
                space.add_link(AtomType::Edge, vec![prev, next]).unwrap();
                prev = next;
            }
            black_box(space.len())
        });
    });
}

fn bench_dedup(c: &mut Criterion) {
    let space = AtomSpace::new();
    let a = space.add_node(AtomType::Concept, "a").unwrap();
    let c_node = space.add_node(AtomType::Concept, "b").unwrap();
    space.add_link(AtomType::Set, vec![a, c_node]).unwrap();

    c.bench_function("dedup_unordered_link", |b| {
        b.iter(|| space.add_link(AtomType::Set, black_box(vec![c_node, a])).unwrap());
    });
}

fn bench_incoming(c: &mut Criterion) {
    let space = AtomSpace::new();
    let hub = space.add_node(AtomType::Concept, "hub").unwrap();
    for i in 0..1_000 {
        let leaf = space.add_node(AtomType::Concept, &format!("leaf{i}")).unwrap();
        space.add_link(AtomType::Edge, vec![hub, leaf]).unwrap();
    }

    c.bench_function("incoming_set_1000", |b| {
        b.iter(|| space.incoming_set(black_box(hub)).len());
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10); // smaller sample for speed
    targets = bench_insert_chain, bench_dedup, bench_incoming
);
criterion_main!(benches);
