use std::sync::Arc;

use tps_core::toy::{Interval, ToyEngine, TransitionEnsemble, UniformSelector};
use tps_core::{EnsembleRef, ReplicaId, Snapshot, Trajectory};
use tps_mcmc::{
    run, run_chain, run_independent, ChainConfig, PathMover, PathMoverFactory, PathReversalMover,
    RandomChoiceMover, ReplicaFilter, Sample, SampleSet, SeedPolicy,
};

fn system() -> (Arc<dyn PathMover>, SampleSet) {
    let ensemble = EnsembleRef::new(TransitionEnsemble::new(
        "ab",
        Interval::new(-10.0, 0.0),
        Interval::new(5.0, 10.0),
    ));
    let engine = Arc::new(ToyEngine::new(1.0, 200).with_kick(0.3));
    let shooting = PathMoverFactory::one_way_shooting(
        Arc::new(UniformSelector),
        engine,
        Some(vec![ensemble.clone()]),
        ReplicaFilter::All,
    )
    .unwrap();
    let movers: Vec<Arc<dyn PathMover>> =
        vec![Arc::new(shooting), Arc::new(PathReversalMover::new(None))];
    let root = RandomChoiceMover::with_weights(movers, vec![3.0, 1.0])
        .unwrap()
        .named("root");

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

fn chain_config(steps: usize, master_seed: u64) -> ChainConfig {
    ChainConfig {
        steps,
        seed_policy: SeedPolicy {
            master_seed,
            label: Some("test".into()),
        },
        workers: 4,
    }
}

#[test]
fn repeated_runs_with_same_seed_match() {
    let config = chain_config(40, 99);
    let (mover, state) = system();
    let first = run(mover.as_ref(), &state, &config).unwrap();
    let (mover, state) = system();
    let second = run(mover.as_ref(), &state, &config).unwrap();

    assert_eq!(first.summary.records, second.summary.records);
    assert_eq!(first.summary.acceptance, second.summary.acceptance);
    assert_eq!(first.summary.replicas, second.summary.replicas);
}

#[test]
fn summary_accounts_for_every_step() {
    let (mover, state) = system();
    let outcome = run(mover.as_ref(), &state, &chain_config(30, 5)).unwrap();
    let summary = &outcome.summary;

    assert_eq!(summary.records.len(), 30);
    let proposed: usize = summary.acceptance.values().map(|s| s.proposed).sum();
    assert_eq!(proposed, 30);
    for (path, stats) in &summary.acceptance {
        assert!(path.starts_with("root/"));
        assert!(stats.accepted <= stats.proposed);
        assert!((0.0..=1.0).contains(&stats.rate));
    }
    assert_eq!(summary.replicas.len(), 1);
    assert_eq!(summary.replicas[0].ensemble, "ab");
    assert_eq!(outcome.final_state.move_path().len(), {
        let applied: usize = summary.records.iter().map(|r| r.movers.len()).sum();
        applied
    });
    outcome.final_state.consistency_check().unwrap();

    let json = serde_json::to_string(summary).unwrap();
    assert!(json.contains("\"master_seed\":5"));
}

#[test]
fn independent_chains_run_on_their_own_substreams() {
    let (mover, state) = system();
    let outcomes = run_independent(mover.as_ref(), &state, &chain_config(10, 7), 3).unwrap();

    assert_eq!(outcomes.len(), 3);
    for (idx, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.summary.chain, idx);
        assert_eq!(outcome.summary.records.len(), 10);
        outcome.final_state.consistency_check().unwrap();
    }
}

#[test]
fn independent_runs_repeat_under_the_same_seed() {
    let (mover, state) = system();
    let config = chain_config(25, 7);
    let first = run_independent(mover.as_ref(), &state, &config, 4).unwrap();
    for _ in 0..4 {
        let again = run_independent(mover.as_ref(), &state, &config, 4).unwrap();
        for (a, b) in first.iter().zip(&again) {
            assert_eq!(a.summary, b.summary);
        }
    }
}

#[test]
fn independent_chain_matches_its_solo_run() {
    let (mover, state) = system();
    let config = chain_config(25, 7);
    let outcomes = run_independent(mover.as_ref(), &state, &config, 4).unwrap();

    let solo = run(mover.as_ref(), &state, &config).unwrap();
    assert_eq!(outcomes[0].summary, solo.summary);
    for chain in 1..4 {
        let alone = run_chain(mover.as_ref(), &state, &config, chain).unwrap();
        assert_eq!(outcomes[chain].summary, alone.summary);
    }
}

#[test]
fn worker_bound_does_not_change_results() {
    let (mover, state) = system();
    let mut config = chain_config(15, 3);
    let parallel = run_independent(mover.as_ref(), &state, &config, 5).unwrap();
    config.workers = 1;
    let serial = run_independent(mover.as_ref(), &state, &config, 5).unwrap();
    let summaries = |outcomes: &[tps_mcmc::ChainOutcome]| {
        outcomes
            .iter()
            .map(|outcome| outcome.summary.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(summaries(&parallel), summaries(&serial));
}

#[test]
fn long_chains_keep_their_full_history() {
    let (mover, state) = system();
    let outcome = run(mover.as_ref(), &state, &chain_config(5_000, 11)).unwrap();
    let applied: usize = outcome
        .summary
        .records
        .iter()
        .map(|record| record.movers.len())
        .sum();
    let path = outcome.final_state.move_path();
    assert_eq!(path.len(), applied);
    assert_eq!(path.to_vec().len(), applied);
    assert_eq!(path.since(path.len() - 2).len(), 2);
}
