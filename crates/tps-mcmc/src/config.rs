use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tps_core::errors::ErrorInfo;
use tps_core::{DynamicsEngine, EnsembleRef, ReplicaId, ShootingPointSelector, TpsError};

use crate::combinators::{
    ConditionalSequentialMover, PartialAcceptanceSequentialMover, RandomChoiceMover,
    SequentialMover,
};
use crate::exchange::ReplicaExchange;
use crate::factory::PathMoverFactory;
use crate::hop::{make_list_of_pairs, EnsembleHopMover};
use crate::mover::{PathMover, ReplicaFilter};
use crate::reversal::PathReversalMover;
use crate::shoot::ShootMover;

fn serde_error(code: &str, err: impl ToString) -> TpsError {
    TpsError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Deserializes a YAML document into the requested type.
pub fn from_yaml_str<T: DeserializeOwned>(contents: &str) -> Result<T, TpsError> {
    serde_yaml::from_str(contents).map_err(|err| serde_error("yaml_deserialize", err))
}

/// Reads and deserializes a YAML file.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, TpsError> {
    let contents = fs::read_to_string(path).map_err(|err| {
        TpsError::Serde(
            ErrorInfo::new("read_config", format!("failed to read config: {err}"))
                .with_context("path", path.display().to_string()),
        )
    })?;
    serde_yaml::from_str(&contents).map_err(|err| {
        TpsError::Serde(
            ErrorInfo::new("yaml_deserialize", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}

/// Chain length and seeding of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Number of root-mover applications.
    #[serde(default = "default_steps")]
    pub steps: usize,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Upper bound on worker threads for independent chains.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_steps() -> usize {
    100
}

fn default_workers() -> usize {
    1
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            seed_policy: SeedPolicy::default(),
            workers: default_workers(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in run summaries.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// A run file: chain settings plus the mover tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of root-mover applications.
    #[serde(default = "default_steps")]
    pub steps: usize,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Upper bound on worker threads for independent chains.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Root of the mover tree.
    pub mover: MoverConfig,
}

impl RunConfig {
    /// Parses a run file from YAML text.
    pub fn from_yaml_str(contents: &str) -> Result<Self, TpsError> {
        from_yaml_str(contents)
    }

    /// Loads a run file from disk.
    pub fn load(path: &Path) -> Result<Self, TpsError> {
        load_yaml(path)
    }

    /// Chain settings of this run.
    pub fn chain(&self) -> ChainConfig {
        ChainConfig {
            steps: self.steps,
            seed_policy: self.seed_policy.clone(),
            workers: self.workers,
        }
    }
}

/// Filters shared by every node of a mover tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeOptions {
    /// Display name override.
    #[serde(default)]
    pub name: Option<String>,
    /// Replicas the mover may act on; omitted means all.
    #[serde(default)]
    pub replicas: Option<Vec<ReplicaId>>,
    /// Labels of the ensembles the mover may act on; omitted means all.
    #[serde(default)]
    pub ensembles: Option<Vec<String>>,
}

impl NodeOptions {
    fn replica_filter(&self) -> ReplicaFilter {
        match &self.replicas {
            None => ReplicaFilter::All,
            Some(list) => list.iter().copied().collect(),
        }
    }
}

/// Leaf mover node without extra parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeafNode {
    /// Shared filters.
    #[serde(flatten)]
    pub options: NodeOptions,
}

/// Ensemble hop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopNode {
    /// Shared filters.
    #[serde(flatten)]
    pub options: NodeOptions,
    /// `(from, to)` ensemble labels.
    pub pairs: PairList,
    /// Optional per-pair bias weights.
    #[serde(default)]
    pub bias: Option<Vec<f64>>,
}

/// Replica exchange parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeNode {
    /// Display name override.
    #[serde(default)]
    pub name: Option<String>,
    /// Replicas the exchange may act on; omitted means all.
    #[serde(default)]
    pub replicas: Option<Vec<ReplicaId>>,
    /// The two ensemble labels whose samples are swapped.
    pub ensembles: Vec<String>,
}

/// Combinator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinatorNode {
    /// Shared filters.
    #[serde(flatten)]
    pub options: NodeOptions,
    /// Sub-movers in order.
    pub movers: Vec<MoverConfig>,
    /// Selection weights, only meaningful for `random-choice`.
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
}

/// Ensemble-hop pairs, given either as pairs or as a flat list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PairList {
    /// `[[from, to], ...]`.
    Pairs(Vec<[String; 2]>),
    /// `[from, to, from, to, ...]`.
    Flat(Vec<String>),
}

impl PairList {
    /// Normalises to a list of `(from, to)` labels.
    pub fn to_pairs(&self) -> Result<Vec<(String, String)>, TpsError> {
        match self {
            PairList::Pairs(pairs) => {
                if pairs.is_empty() {
                    return Err(TpsError::Config(ErrorInfo::new(
                        "malformed-pairs",
                        "pair list is empty",
                    )));
                }
                Ok(pairs
                    .iter()
                    .map(|[from, to]| (from.clone(), to.clone()))
                    .collect())
            }
            PairList::Flat(flat) => make_list_of_pairs(flat),
        }
    }
}

/// Declarative mover tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MoverConfig {
    /// Forward shooting.
    ForwardShoot(LeafNode),
    /// Backward shooting.
    BackwardShoot(LeafNode),
    /// 50/50 forward or backward shooting.
    OneWayShoot(LeafNode),
    /// Path reversal.
    PathReversal(LeafNode),
    /// Ensemble hop.
    EnsembleHop(HopNode),
    /// Replica exchange.
    ReplicaExchange(ExchangeNode),
    /// Weighted random choice.
    RandomChoice(CombinatorNode),
    /// Unconditional pipeline.
    Sequential(CombinatorNode),
    /// Pipeline stopping at the first rejection.
    PartialAcceptance(CombinatorNode),
    /// All-or-nothing pipeline.
    Conditional(CombinatorNode),
}

/// Collaborators and named ensembles that mover configs resolve against.
pub struct MoverContext {
    ensembles: IndexMap<String, EnsembleRef>,
    engine: Arc<dyn DynamicsEngine>,
    selector: Arc<dyn ShootingPointSelector>,
}

impl MoverContext {
    /// Creates a context with no registered ensembles.
    pub fn new(engine: Arc<dyn DynamicsEngine>, selector: Arc<dyn ShootingPointSelector>) -> Self {
        Self {
            ensembles: IndexMap::new(),
            engine,
            selector,
        }
    }

    /// Registers `ensemble` under its label and returns the handle.
    pub fn register(&mut self, ensemble: EnsembleRef) -> EnsembleRef {
        self.ensembles
            .insert(ensemble.label().to_string(), ensemble.clone());
        ensemble
    }

    /// Registered ensembles in registration order.
    pub fn ensembles(&self) -> impl Iterator<Item = &EnsembleRef> {
        self.ensembles.values()
    }

    /// Shared dynamics engine.
    pub fn engine(&self) -> Arc<dyn DynamicsEngine> {
        self.engine.clone()
    }

    /// Shared shooting point selector.
    pub fn selector(&self) -> Arc<dyn ShootingPointSelector> {
        self.selector.clone()
    }

    /// Resolves one ensemble label.
    pub fn ensemble(&self, label: &str) -> Result<EnsembleRef, TpsError> {
        self.ensembles.get(label).cloned().ok_or_else(|| {
            TpsError::Config(
                ErrorInfo::new("unknown-ensemble", "ensemble label is not registered")
                    .with_context("label", label)
                    .with_hint(format!(
                        "known labels: {}",
                        self.ensembles.keys().cloned().collect::<Vec<_>>().join(", ")
                    )),
            )
        })
    }

    fn resolve(&self, labels: &Option<Vec<String>>) -> Result<Option<Vec<EnsembleRef>>, TpsError> {
        labels
            .as_ref()
            .map(|labels| labels.iter().map(|label| self.ensemble(label)).collect())
            .transpose()
    }
}

impl MoverConfig {
    /// Builds the mover tree rooted at this node.
    pub fn build(&self, ctx: &MoverContext) -> Result<Arc<dyn PathMover>, TpsError> {
        let mover: Arc<dyn PathMover> = match self {
            MoverConfig::ForwardShoot(node) | MoverConfig::BackwardShoot(node) => {
                let ensembles = ctx.resolve(&node.options.ensembles)?;
                let mover = match self {
                    MoverConfig::ForwardShoot(_) => {
                        ShootMover::forward(ctx.selector(), ctx.engine(), ensembles)
                    }
                    _ => ShootMover::backward(ctx.selector(), ctx.engine(), ensembles),
                }
                .with_replicas(node.options.replica_filter());
                Arc::new(named(mover, &node.options.name, |m, n| m.named(n)))
            }
            MoverConfig::OneWayShoot(node) => {
                let mover = PathMoverFactory::one_way_shooting(
                    ctx.selector(),
                    ctx.engine(),
                    ctx.resolve(&node.options.ensembles)?,
                    node.options.replica_filter(),
                )?;
                Arc::new(named(mover, &node.options.name, |m, n| m.named(n)))
            }
            MoverConfig::PathReversal(node) => {
                let mover = PathReversalMover::new(ctx.resolve(&node.options.ensembles)?)
                    .with_replicas(node.options.replica_filter());
                Arc::new(named(mover, &node.options.name, |m, n| m.named(n)))
            }
            MoverConfig::EnsembleHop(node) => {
                let pairs = node
                    .pairs
                    .to_pairs()?
                    .iter()
                    .map(|(from, to)| Ok((ctx.ensemble(from)?, ctx.ensemble(to)?)))
                    .collect::<Result<Vec<_>, TpsError>>()?;
                let mut mover =
                    EnsembleHopMover::new(pairs)?.with_replicas(node.options.replica_filter());
                if let Some(bias) = &node.bias {
                    mover = mover.with_bias(bias.clone())?;
                }
                Arc::new(named(mover, &node.options.name, |m, n| m.named(n)))
            }
            MoverConfig::ReplicaExchange(node) => {
                let [first, second] = node.ensembles.as_slice() else {
                    return Err(TpsError::Config(
                        ErrorInfo::new(
                            "malformed-pairs",
                            "replica exchange takes exactly two ensembles",
                        )
                        .with_context("ensembles", node.ensembles.len().to_string()),
                    ));
                };
                let replicas = match &node.replicas {
                    None => ReplicaFilter::All,
                    Some(list) => list.iter().copied().collect(),
                };
                let mover = ReplicaExchange::new(ctx.ensemble(first)?, ctx.ensemble(second)?)?
                    .with_replicas(replicas);
                Arc::new(named(mover, &node.name, |m, n| m.named(n)))
            }
            MoverConfig::RandomChoice(node) => {
                let movers = build_all(&node.movers, ctx)?;
                let mover = match &node.weights {
                    Some(weights) => RandomChoiceMover::with_weights(movers, weights.clone())?,
                    None => RandomChoiceMover::new(movers)?,
                };
                let mover = filtered(mover, &node.options, ctx, |m, e| m.with_ensembles(e))?
                    .with_replicas(node.options.replica_filter());
                Arc::new(named(mover, &node.options.name, |m, n| m.named(n)))
            }
            MoverConfig::Sequential(node) => {
                let mover = SequentialMover::new(build_all(&node.movers, ctx)?)?;
                let mover = filtered(mover, &node.options, ctx, |m, e| m.with_ensembles(e))?
                    .with_replicas(node.options.replica_filter());
                Arc::new(named(mover, &node.options.name, |m, n| m.named(n)))
            }
            MoverConfig::PartialAcceptance(node) => {
                let mover = PartialAcceptanceSequentialMover::new(build_all(&node.movers, ctx)?)?;
                let mover = filtered(mover, &node.options, ctx, |m, e| m.with_ensembles(e))?
                    .with_replicas(node.options.replica_filter());
                Arc::new(named(mover, &node.options.name, |m, n| m.named(n)))
            }
            MoverConfig::Conditional(node) => {
                let mover = ConditionalSequentialMover::new(build_all(&node.movers, ctx)?)?;
                let mover = filtered(mover, &node.options, ctx, |m, e| m.with_ensembles(e))?
                    .with_replicas(node.options.replica_filter());
                Arc::new(named(mover, &node.options.name, |m, n| m.named(n)))
            }
        };
        Ok(mover)
    }
}

fn build_all(
    configs: &[MoverConfig],
    ctx: &MoverContext,
) -> Result<Vec<Arc<dyn PathMover>>, TpsError> {
    configs.iter().map(|config| config.build(ctx)).collect()
}

fn named<M>(mover: M, name: &Option<String>, rename: impl FnOnce(M, String) -> M) -> M {
    match name {
        Some(name) => rename(mover, name.clone()),
        None => mover,
    }
}

fn filtered<M>(
    mover: M,
    options: &NodeOptions,
    ctx: &MoverContext,
    restrict: impl FnOnce(M, Vec<EnsembleRef>) -> M,
) -> Result<M, TpsError> {
    Ok(match ctx.resolve(&options.ensembles)? {
        Some(ensembles) => restrict(mover, ensembles),
        None => mover,
    })
}
