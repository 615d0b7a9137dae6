//! This bench test lays out a large, multi-generation family.

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, Criterion};
use family_tree::{compute_layout, LayoutMetrics, Relation, Tree};

/// A few top-level families, each several generations deep. Everyone marries
/// and has two children.
fn preseed_tree(families: usize, generations: usize) -> Tree {
    let mut tree = Tree::new();

    for family in 0..families {
        let root = tree.add_root(format!("Family {family}"));
        tree = root.tree;
        let mut generation = vec![root.id];

        for _ in 0..generations {
            let mut next = Vec::new();
            for parent in &generation {
                tree = tree
                    .insert_related(parent, Relation::Spouse, "Partner")
                    .unwrap()
                    .tree;
                for _ in 0..2 {
                    let child = tree
                        .insert_related(parent, Relation::Child, "Child")
                        .unwrap();
                    tree = child.tree;
                    next.push(child.id);
                }
            }
            generation = next;
        }
    }

    tree
}

fn layout(c: &mut Criterion) {
    let tree = preseed_tree(4, 7);
    let metrics = LayoutMetrics::default();

    c.bench_function("layout deep families", |b| {
        b.iter(|| compute_layout(&tree, &metrics).unwrap());
    });
}

criterion_group!(benches, layout);
criterion_main!(benches);
