use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use tps_core::toy::{Interval, ToyEngine, TransitionEnsemble, UniformSelector};
use tps_core::{EnsembleRef, ReplicaId, Snapshot, Trajectory};
use tps_mcmc::{
    run, ChainConfig, PathMover, PathMoverFactory, PathReversalMover, RandomChoiceMover,
    ReplicaFilter, Sample, SampleSet, SeedPolicy,
};

fn setup() -> (Arc<dyn PathMover>, SampleSet) {
    let ensemble = EnsembleRef::new(TransitionEnsemble::new(
        "ab",
        Interval::new(-10.0, 0.0),
        Interval::new(5.0, 10.0),
    ));
    let shooting = PathMoverFactory::one_way_shooting(
        Arc::new(UniformSelector),
        Arc::new(ToyEngine::new(0.25, 400).with_kick(0.2)),
        Some(vec![ensemble.clone()]),
        ReplicaFilter::All,
    )
    .expect("shooting mover");
    let movers: Vec<Arc<dyn PathMover>> =
        vec![Arc::new(shooting), Arc::new(PathReversalMover::new(None))];
    let root = RandomChoiceMover::with_weights(movers, vec![4.0, 1.0]).expect("root mover");
    let initial: Trajectory = [-1.0, 1.0, 2.0, 3.0, 6.0]
        .iter()
        .map(|&x| Snapshot::new(vec![x], vec![1.0]))
        .collect();
    let state = SampleSet::new(vec![Sample::new(
        ReplicaId::from_raw(0),
        initial,
        ensemble,
    )]);
    (Arc::new(root), state)
}

fn bench_chain(c: &mut Criterion) {
    let (mover, state) = setup();
    let config = ChainConfig {
        steps: 200,
        seed_policy: SeedPolicy {
            master_seed: 2024,
            label: None,
        },
        workers: 1,
    };
    c.bench_function("chain_throughput", |b| {
        b.iter(|| {
            let outcome = run(mover.as_ref(), &state, &config).expect("chain run");
            criterion::black_box(outcome.summary.records.len());
        })
    });
}

criterion_group!(benches, bench_chain);
criterion_main!(benches);
