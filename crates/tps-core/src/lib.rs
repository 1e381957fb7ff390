#![deny(missing_docs)]
#![doc = "Core contracts and data types for the TPS path sampler: errors, seeding, trajectories and the collaborator traits consumed by the mover engine."]

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod rng;
pub mod toy;
mod trajectory;

pub use errors::{ErrorInfo, TpsError};
pub use rng::{derive_substream_seed, RngHandle};
pub use trajectory::{Snapshot, Trajectory, TrajectoryRef};

/// Identifier of an independent Monte Carlo walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(u64);

impl ReplicaId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Predicate over trajectories defining a region of path space.
///
/// Implementations must be pure: the same trajectory content always yields
/// the same answer.
pub trait Ensemble: Send + Sync {
    /// Human readable label, also used to resolve ensembles from configuration.
    fn label(&self) -> &str;

    /// Full membership test for a complete trajectory.
    fn contains(&self, trajectory: &Trajectory) -> bool;

    /// Whether `trajectory` may still grow at its end and become a member.
    fn can_append(&self, trajectory: &Trajectory) -> bool;

    /// Whether `trajectory` may still grow at its start and become a member.
    fn can_prepend(&self, trajectory: &Trajectory) -> bool;
}

/// Shared handle to an externally owned ensemble.
///
/// Equality and hashing use the identity of the shared allocation, so two
/// handles are equal only when they point at the same ensemble object.
#[derive(Clone)]
pub struct EnsembleRef(Arc<dyn Ensemble>);

impl EnsembleRef {
    /// Wraps an ensemble into a shared handle.
    pub fn new<E: Ensemble + 'static>(ensemble: E) -> Self {
        Self(Arc::new(ensemble))
    }

    /// Wraps an already shared ensemble.
    pub fn from_arc(ensemble: Arc<dyn Ensemble>) -> Self {
        Self(ensemble)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl Deref for EnsembleRef {
    type Target = dyn Ensemble;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl PartialEq for EnsembleRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for EnsembleRef {}

impl Hash for EnsembleRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for EnsembleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ensemble({})", self.label())
    }
}

/// Continuation predicate consulted by an engine after every new frame.
pub type Continuation<'a> = &'a dyn Fn(&Trajectory) -> bool;

/// External dynamics engine producing trajectory segments.
pub trait DynamicsEngine: Send + Sync {
    /// Propagates from `initial` until any predicate in `running` returns
    /// `false` for the segment generated so far.
    ///
    /// The returned segment starts with a copy of `initial`. Predicates are
    /// checked cooperatively after each new frame; the engine never mutates
    /// `initial`. Any stochastic part of the dynamics draws from `rng`, the
    /// caller's stream, so engines hold no random state of their own.
    fn generate(
        &self,
        initial: &Snapshot,
        running: &[Continuation<'_>],
        rng: &mut RngHandle,
    ) -> Result<Trajectory, TpsError>;

    /// Maximum number of frames any trial trajectory may reach.
    fn max_frames(&self) -> usize;
}

/// Frame chosen for a shooting move together with its selection weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShootingPoint {
    /// Index of the frame within the trajectory.
    pub index: usize,
    /// Normalisation of the selection weights over the whole trajectory.
    pub sum_bias: f64,
}

/// Chooses shooting points on trajectories.
pub trait ShootingPointSelector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Total selection weight over `trajectory`. Must be strictly positive for
    /// non-empty trajectories.
    fn sum_bias(&self, trajectory: &Trajectory) -> f64;

    /// Picks a shooting point on `trajectory`.
    fn pick(&self, trajectory: &Trajectory, rng: &mut RngHandle)
        -> Result<ShootingPoint, TpsError>;

    /// Describes the frame at `index` on `trajectory` as a shooting point.
    fn shooting_point(&self, trajectory: &Trajectory, index: usize) -> ShootingPoint {
        ShootingPoint {
            index,
            sum_bias: self.sum_bias(trajectory),
        }
    }
}

/// Caps the number of frames a generated trial may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthStopper {
    /// Largest admissible trajectory length.
    pub max_frames: usize,
}

impl LengthStopper {
    /// Creates a stopper for `max_frames` frames.
    pub fn new(max_frames: usize) -> Self {
        Self { max_frames }
    }

    /// Whether a trajectory of this length may still grow at its end.
    pub fn can_append(&self, trajectory: &Trajectory) -> bool {
        trajectory.len() < self.max_frames
    }

    /// Whether a trajectory of this length may still grow at its start.
    pub fn can_prepend(&self, trajectory: &Trajectory) -> bool {
        trajectory.len() < self.max_frames
    }
}
