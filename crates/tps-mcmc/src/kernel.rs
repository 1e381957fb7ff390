use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tps_core::errors::ErrorInfo;
use tps_core::{ReplicaId, RngHandle, TpsError};
use tracing::{info, trace};

use crate::config::ChainConfig;
use crate::determinism;
use crate::mover::PathMover;
use crate::sample::SampleSet;

/// Proposal and acceptance counts of one move-path signature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceStats {
    /// Number of steps that took this path through the mover tree.
    pub proposed: usize,
    /// Number of those steps whose root result was accepted.
    pub accepted: usize,
    /// `accepted / proposed`, zero when nothing was proposed.
    pub rate: f64,
}

/// Outcome of one root-mover application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step index within the chain.
    pub step: usize,
    /// Acceptance flag of the resulting state.
    pub accepted: bool,
    /// Names of the movers applied during the step, outermost first.
    pub movers: Vec<String>,
}

/// Final assignment of one replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaSummary {
    /// Replica identifier.
    pub replica: ReplicaId,
    /// Ensemble label the replica ended in.
    pub ensemble: String,
    /// Number of frames of the final trajectory.
    pub frames: usize,
    /// Canonical hash of the final trajectory.
    pub trajectory_hash: String,
}

/// Summary returned to callers after a chain completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Index of the chain among independent lineages.
    pub chain: usize,
    /// Number of steps executed.
    pub steps: usize,
    /// Master seed of the run.
    pub master_seed: u64,
    /// Seed label, if configured.
    pub label: Option<String>,
    /// Acceptance statistics keyed by move-path signature.
    pub acceptance: BTreeMap<String, AcceptanceStats>,
    /// Per-step records.
    pub records: Vec<StepRecord>,
    /// Final state per replica, in replica order.
    pub replicas: Vec<ReplicaSummary>,
}

/// Summary plus the final state of a chain.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    /// Serializable run summary.
    pub summary: RunSummary,
    /// State after the last step.
    pub final_state: SampleSet,
}

/// Applies `mover` to `initial` for `config.steps` steps.
///
/// Equivalent to [`run_chain`] for chain 0.
pub fn run(
    mover: &dyn PathMover,
    initial: &SampleSet,
    config: &ChainConfig,
) -> Result<ChainOutcome, TpsError> {
    run_chain(mover, initial, config, 0)
}

/// Runs `chains` independent lineages from the same initial state.
///
/// Chains execute on a pool of at most `config.workers` threads and are
/// returned in chain order. Chain `k` is identical to
/// `run_chain(mover, initial, config, k)`.
pub fn run_independent(
    mover: &dyn PathMover,
    initial: &SampleSet,
    config: &ChainConfig,
    chains: usize,
) -> Result<Vec<ChainOutcome>, TpsError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1).min(chains.max(1)))
        .build()
        .map_err(|err| TpsError::Engine(ErrorInfo::new("thread_pool", err.to_string())))?;

    let results: Result<Vec<_>, TpsError> = pool.install(|| {
        (0..chains)
            .into_par_iter()
            .map(|chain| -> Result<(usize, ChainOutcome), TpsError> {
                let outcome = run_chain(mover, initial, config, chain)?;
                Ok((chain, outcome))
            })
            .collect()
    });

    let mut ordered = results?;
    ordered.sort_by_key(|(chain, _)| *chain);
    Ok(ordered.into_iter().map(|(_, outcome)| outcome).collect())
}

/// Runs lineage `chain` of the master seed in `config`.
///
/// Every step draws from a fresh stream derived from the chain seed and the
/// step index; movers and engines hold no random state, so the result does
/// not depend on which other chains run alongside.
pub fn run_chain(
    mover: &dyn PathMover,
    initial: &SampleSet,
    config: &ChainConfig,
    chain: usize,
) -> Result<ChainOutcome, TpsError> {
    let master_seed = config.seed_policy.master_seed;
    info!(
        chain,
        steps = config.steps,
        master_seed,
        mover = %mover.name(),
        replicas = initial.replica_list().len(),
        "starting chain"
    );
    let mut state = initial.clone();
    let mut records = Vec::with_capacity(config.steps);
    let mut counts = BTreeMap::<String, (usize, usize)>::new();
    for step in 0..config.steps {
        let mut rng = RngHandle::from_seed(determinism::step_seed(master_seed, chain, step));
        let before = state.move_path().len();
        state = mover.move_state(&state, &mut rng)?;
        let movers: Vec<String> = state
            .move_path()
            .since(before)
            .iter()
            .map(|reference| reference.name.to_string())
            .collect();
        let accepted = state.accepted();
        trace!(chain, step, accepted, path = %movers.join("/"), "step");
        let entry = counts.entry(movers.join("/")).or_insert((0, 0));
        entry.0 += 1;
        if accepted {
            entry.1 += 1;
        }
        records.push(StepRecord {
            step,
            accepted,
            movers,
        });
    }

    let summary = RunSummary {
        chain,
        steps: config.steps,
        master_seed,
        label: config.seed_policy.label.clone(),
        acceptance: aggregate_acceptance(counts),
        records,
        replicas: summarize_replicas(&state),
    };
    info!(
        chain,
        accepted = summary.records.iter().filter(|r| r.accepted).count(),
        steps = summary.steps,
        "finished chain"
    );
    Ok(ChainOutcome {
        summary,
        final_state: state,
    })
}

fn aggregate_acceptance(
    counts: BTreeMap<String, (usize, usize)>,
) -> BTreeMap<String, AcceptanceStats> {
    counts
        .into_iter()
        .map(|(path, (proposed, accepted))| {
            let rate = if proposed == 0 {
                0.0
            } else {
                accepted as f64 / proposed as f64
            };
            (
                path,
                AcceptanceStats {
                    proposed,
                    accepted,
                    rate,
                },
            )
        })
        .collect()
}

fn summarize_replicas(state: &SampleSet) -> Vec<ReplicaSummary> {
    let mut replicas: Vec<ReplicaSummary> = state
        .iter()
        .map(|sample| ReplicaSummary {
            replica: sample.replica,
            ensemble: sample.ensemble.label().to_string(),
            frames: sample.trajectory.len(),
            trajectory_hash: sample.trajectory.canonical_hash(),
        })
        .collect();
    replicas.sort_by_key(|summary| summary.replica);
    replicas
}
