use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tps_core::{EnsembleRef, ReplicaId, RngHandle, TpsError};

use crate::details::MoveDetails;
use crate::sample::{Sample, SampleSet};

/// Tracing target for mover construction records.
pub const INIT_TARGET: &str = "tps_mcmc::init";

static NEXT_MOVER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a constructed mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MoverId(u64);

impl MoverId {
    fn next() -> Self {
        Self(NEXT_MOVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Closed set of mover variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoverKind {
    /// Forward one-way shooting.
    ForwardShoot,
    /// Backward one-way shooting.
    BackwardShoot,
    /// Time reversal of the whole path.
    PathReversal,
    /// Relabel a sample into a neighbouring ensemble.
    EnsembleHop,
    /// Swap ensemble labels between two replicas.
    ReplicaExchange,
    /// Weighted dispatch to one sub-mover.
    RandomChoice,
    /// Unconditional pipeline.
    Sequential,
    /// Pipeline stopping at the first rejection.
    PartialAcceptanceSequential,
    /// All-or-nothing pipeline.
    ConditionalSequential,
}

impl MoverKind {
    /// Default display name for movers of this kind.
    pub fn default_name(&self) -> &'static str {
        match self {
            MoverKind::ForwardShoot => "ForwardShootMover",
            MoverKind::BackwardShoot => "BackwardShootMover",
            MoverKind::PathReversal => "PathReversalMover",
            MoverKind::EnsembleHop => "EnsembleHopMover",
            MoverKind::ReplicaExchange => "ReplicaExchange",
            MoverKind::RandomChoice => "RandomChoiceMover",
            MoverKind::Sequential => "SequentialMover",
            MoverKind::PartialAcceptanceSequential => "PartialAcceptanceSequentialMover",
            MoverKind::ConditionalSequential => "ConditionalSequentialMover",
        }
    }
}

/// Lightweight identity of a mover recorded in move paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoverRef {
    /// Unique identity of the mover instance.
    pub id: MoverId,
    /// Variant tag.
    pub kind: MoverKind,
    /// Display name.
    pub name: Arc<str>,
}

impl fmt::Display for MoverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id.0)
    }
}

/// Replicas a mover may act on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplicaFilter {
    /// Every replica present in the state.
    #[default]
    All,
    /// Only the listed replicas.
    Only(BTreeSet<ReplicaId>),
}

impl ReplicaFilter {
    /// Restricts a mover to a single replica.
    pub fn single(replica: ReplicaId) -> Self {
        ReplicaFilter::Only([replica].into_iter().collect())
    }

    /// Whether `replica` passes the filter.
    pub fn contains(&self, replica: ReplicaId) -> bool {
        match self {
            ReplicaFilter::All => true,
            ReplicaFilter::Only(set) => set.contains(&replica),
        }
    }
}

impl FromIterator<ReplicaId> for ReplicaFilter {
    fn from_iter<I: IntoIterator<Item = ReplicaId>>(iter: I) -> Self {
        ReplicaFilter::Only(iter.into_iter().collect())
    }
}

impl fmt::Display for ReplicaFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicaFilter::All => write!(f, "all"),
            ReplicaFilter::Only(set) => {
                let labels: Vec<String> = set.iter().map(ReplicaId::to_string).collect();
                write!(f, "[{}]", labels.join(", "))
            }
        }
    }
}

/// Configuration shared by every mover, bound at construction.
#[derive(Debug, Clone)]
pub struct MoverInfo {
    id: MoverId,
    kind: MoverKind,
    name: Arc<str>,
    replicas: ReplicaFilter,
    ensembles: Option<Vec<EnsembleRef>>,
}

impl MoverInfo {
    /// Creates the configuration for a new mover of `kind`.
    pub fn new(kind: MoverKind, ensembles: Option<Vec<EnsembleRef>>) -> Self {
        Self {
            id: MoverId::next(),
            kind,
            name: Arc::from(kind.default_name()),
            replicas: ReplicaFilter::All,
            ensembles,
        }
    }

    /// Identity recorded in move paths.
    pub fn reference(&self) -> MoverRef {
        MoverRef {
            id: self.id,
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variant tag.
    pub fn kind(&self) -> MoverKind {
        self.kind
    }

    /// Replica filter.
    pub fn replicas(&self) -> &ReplicaFilter {
        &self.replicas
    }

    /// Ensemble filter, `None` meaning unrestricted.
    pub fn ensembles(&self) -> Option<&[EnsembleRef]> {
        self.ensembles.as_deref()
    }

    /// Labels of the ensemble filter, for logs.
    pub fn ensemble_labels(&self) -> Vec<String> {
        self.ensembles
            .iter()
            .flatten()
            .map(|ensemble| ensemble.label().to_string())
            .collect()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Arc::from(name);
    }

    pub(crate) fn set_replicas(&mut self, replicas: ReplicaFilter) {
        self.replicas = replicas;
    }

    pub(crate) fn set_ensembles(&mut self, ensembles: Option<Vec<EnsembleRef>>) {
        self.ensembles = ensembles;
    }

    /// Whether neither filter restricts anything.
    pub fn is_unrestricted(&self) -> bool {
        self.replicas == ReplicaFilter::All && self.ensembles.is_none()
    }

    /// Legality test behind [`PathMover::legal_sample_set`].
    ///
    /// `ensembles` overrides the bound ensemble filter when given.
    pub fn is_legal(&self, sample: &Sample, ensembles: Option<&[EnsembleRef]>) -> bool {
        if !self.replicas.contains(sample.replica) {
            return false;
        }
        match ensembles.or(self.ensembles.as_deref()) {
            None => true,
            Some(allowed) => allowed.contains(&sample.ensemble),
        }
    }
}

/// A Monte Carlo move in path space.
///
/// Every implementation returns a new [`SampleSet`] whose move path is the
/// input's with this mover appended (combinators may append their
/// sub-movers after themselves) and whose acceptance flag is this mover's
/// decision.
pub trait PathMover: Send + Sync {
    /// Construction-time configuration.
    fn info(&self) -> &MoverInfo;

    /// Performs one move on `state`.
    fn move_state(&self, state: &SampleSet, rng: &mut RngHandle) -> Result<SampleSet, TpsError>;

    /// Correction for asymmetric proposals; 1.0 for symmetric ones.
    fn selection_probability_ratio(&self, _details: &MoveDetails) -> f64 {
        1.0
    }

    /// Sub-movers of a combinator, empty for elementary movers.
    fn submovers(&self) -> &[Arc<dyn PathMover>] {
        &[]
    }

    /// Display name.
    fn name(&self) -> &str {
        self.info().name()
    }

    /// Identity recorded in move paths.
    fn reference(&self) -> MoverRef {
        self.info().reference()
    }

    /// Samples of `state` this mover may act on, in state order.
    fn legal_sample_set(
        &self,
        state: &SampleSet,
        ensembles: Option<&[EnsembleRef]>,
    ) -> Vec<Sample> {
        state
            .iter()
            .filter(|sample| self.info().is_legal(sample, ensembles))
            .cloned()
            .collect()
    }

    /// Uniformly random legal sample.
    fn select_sample(
        &self,
        state: &SampleSet,
        ensembles: Option<&[EnsembleRef]>,
        rng: &mut RngHandle,
    ) -> Result<Sample, TpsError> {
        let mut legal = self.legal_sample_set(state, ensembles);
        if legal.is_empty() {
            return Err(TpsError::empty_selection(self.name()));
        }
        let index = rng.index(legal.len());
        Ok(legal.swap_remove(index))
    }
}

impl fmt::Debug for dyn PathMover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathMover")
            .field("name", &self.name())
            .field("kind", &self.info().kind())
            .field("submovers", &self.submovers().len())
            .finish()
    }
}

/// Renders the mover tree rooted at `mover`, one mover per line.
pub fn describe_tree(mover: &dyn PathMover) -> String {
    fn walk(mover: &dyn PathMover, depth: usize, out: &mut Vec<String>) {
        let info = mover.info();
        let mut line = format!("{}{}", "  ".repeat(depth), info.name());
        if info.replicas() != &ReplicaFilter::All {
            line.push_str(&format!(" replicas={}", info.replicas()));
        }
        let labels = info.ensemble_labels();
        if !labels.is_empty() {
            line.push_str(&format!(" ensembles=[{}]", labels.join(", ")));
        }
        out.push(line);
        for sub in mover.submovers() {
            walk(sub.as_ref(), depth + 1, out);
        }
    }
    let mut lines = Vec::new();
    walk(mover, 0, &mut lines);
    lines.join("\n")
}

/// Adds the `named` and `with_replicas` builders to a mover holding `info`.
macro_rules! mover_builders {
    ($ty:ty) => {
        impl $ty {
            /// Overrides the display name.
            pub fn named(mut self, name: impl Into<String>) -> Self {
                self.info.set_name(name.into());
                self
            }

            /// Restricts the mover to the given replicas.
            pub fn with_replicas(mut self, replicas: $crate::mover::ReplicaFilter) -> Self {
                tracing::debug!(
                    target: $crate::mover::INIT_TARGET,
                    mover = %self.info.name(),
                    replicas = %replicas,
                    "restricted replicas"
                );
                self.info.set_replicas(replicas);
                self
            }
        }
    };
    ($ty:ty, ensembles) => {
        $crate::mover::mover_builders!($ty);

        impl $ty {
            /// Restricts the mover to samples in `ensembles`.
            pub fn with_ensembles(mut self, ensembles: Vec<tps_core::EnsembleRef>) -> Self {
                self.info.set_ensembles(Some(ensembles));
                tracing::debug!(
                    target: $crate::mover::INIT_TARGET,
                    mover = %self.info.name(),
                    ensembles = ?self.info.ensemble_labels(),
                    "restricted ensembles"
                );
                self
            }
        }
    };
}

pub(crate) use mover_builders;
