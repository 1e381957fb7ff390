#![deny(missing_docs)]
#![doc = "Move-combinator engine for transition path sampling: samples and sample sets, elementary path movers (shooting, reversal, ensemble hop, replica exchange), combinators, mover-tree configuration and the chain runner."]

/// Combinator movers dispatching to sub-movers.
pub mod combinators;
/// YAML configuration schema and mover-tree construction.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Per-move audit records.
pub mod details;
/// Replica exchange mover.
pub mod exchange;
/// Convenience constructors for common mover sets.
pub mod factory;
/// Ensemble hop mover and pair-list helpers.
pub mod hop;
/// Chain runner and run summaries.
pub mod kernel;
/// The mover contract and shared mover configuration.
pub mod mover;
/// Path reversal mover.
pub mod reversal;
/// Samples and the global sample set.
pub mod sample;
/// One-way shooting movers.
pub mod shoot;

pub use combinators::{
    ConditionalSequentialMover, PartialAcceptanceSequentialMover, RandomChoiceMover,
    SequentialMover,
};
pub use config::{ChainConfig, MoverConfig, MoverContext, PairList, RunConfig, SeedPolicy};
pub use details::{
    DetailsExtra, ExchangeDetails, HopDetails, MoveDetails, ShootDirection, ShootingDetails,
};
pub use exchange::ReplicaExchange;
pub use factory::PathMoverFactory;
pub use hop::{make_list_of_pairs, EnsembleHopMover};
pub use kernel::{
    run, run_chain, run_independent, AcceptanceStats, ChainOutcome, ReplicaSummary, RunSummary,
    StepRecord,
};
pub use mover::{
    describe_tree, MoverId, MoverInfo, MoverKind, MoverRef, PathMover, ReplicaFilter,
};
pub use reversal::PathReversalMover;
pub use sample::{MovePath, Sample, SampleSet};
pub use shoot::ShootMover;
