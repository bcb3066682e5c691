use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use mindmap_core::{
    Command, DataSourceNode, LayoutConfig, MindMapSession, Theme, Uid, layout_tree,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A random tree of `count` nodes; every node hangs under a random earlier node.
fn random_tree(count: usize, seed: u64) -> DataSourceNode {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    for i in 1..count {
        children[rng.gen_range(0..i)].push(i);
    }

    fn build(index: usize, children: &[Vec<usize>]) -> DataSourceNode {
        DataSourceNode::with_uid(format!("n{index}"), format!("topic number {index}")).with_children(
            children[index]
                .iter()
                .map(|&child| build(child, children))
                .collect(),
        )
    }
    build(0, &children)
}

fn bench_fresh_layout(c: &mut Criterion) {
    let tree = random_tree(5_000, 7);
    let config = LayoutConfig::default();
    let theme = Theme::default();
    c.bench_function("layout/fresh_5k_nodes", |b| {
        b.iter(|| {
            let arena = layout_tree(black_box(&tree), &config, &theme);
            black_box(arena.len());
        })
    });
}

fn bench_relayout_after_select(c: &mut Criterion) {
    let mut session = MindMapSession::new(random_tree(5_000, 11));
    let targets: Vec<Uid> = (0..100).map(|i| Uid::from(format!("n{}", i * 37))).collect();
    c.bench_function("layout/cached_5k_nodes_select", |b| {
        let mut i = 0;
        b.iter(|| {
            session
                .exec_command(Command::select(targets[i % targets.len()].clone()))
                .unwrap();
            i += 1;
            black_box(session.version());
        })
    });
}

fn bench_edit_then_undo_redo(c: &mut Criterion) {
    let tree = random_tree(1_000, 3);
    c.bench_function("history/50_inserts_undo_redo", |b| {
        b.iter_batched(
            || MindMapSession::new(tree.clone()),
            |mut session| {
                for i in 0..50 {
                    session
                        .exec_command(Command::insert_child(format!("n{}", i * 13)))
                        .unwrap();
                }
                for _ in 0..50 {
                    session.exec_command(Command::Undo).unwrap();
                }
                for _ in 0..50 {
                    session.exec_command(Command::Redo).unwrap();
                }
                black_box(session.tree().count());
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_fresh_layout,
    bench_relayout_after_select,
    bench_edit_then_undo_redo
);
criterion_main!(benches);
