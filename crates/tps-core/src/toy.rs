//! Reference collaborators for demos and tests.
//!
//! The mover engine treats dynamics, ensembles and shooting-point selection as
//! external. These small implementations work on the first coordinate of a
//! snapshot and are enough to drive complete sampling runs.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, TpsError};
use crate::rng::RngHandle;
use crate::{
    Continuation, DynamicsEngine, Ensemble, ShootingPoint, ShootingPointSelector, Snapshot,
    Trajectory,
};

/// Half-open interval `[lo, hi)` on the first coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Inclusive lower bound.
    pub lo: f64,
    /// Exclusive upper bound.
    pub hi: f64,
}

impl Interval {
    /// Creates a new interval.
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Whether the snapshot lies inside the interval.
    pub fn contains(&self, snapshot: &Snapshot) -> bool {
        let x = snapshot.x();
        x >= self.lo && x < self.hi
    }
}

/// Paths that leave `a`, stay outside both states, and end on entering `b`.
#[derive(Debug, Clone)]
pub struct TransitionEnsemble {
    label: String,
    a: Interval,
    b: Interval,
}

impl TransitionEnsemble {
    /// Creates the `a -> b` transition ensemble.
    pub fn new(label: impl Into<String>, a: Interval, b: Interval) -> Self {
        Self {
            label: label.into(),
            a,
            b,
        }
    }

    fn outside(&self, snapshot: &Snapshot) -> bool {
        !self.a.contains(snapshot) && !self.b.contains(snapshot)
    }
}

impl Ensemble for TransitionEnsemble {
    fn label(&self) -> &str {
        &self.label
    }

    fn contains(&self, trajectory: &Trajectory) -> bool {
        let n = trajectory.len();
        if n < 3 {
            return false;
        }
        self.a.contains(&trajectory[0])
            && self.b.contains(&trajectory[n - 1])
            && trajectory.frames()[1..n - 1]
                .iter()
                .all(|s| self.outside(s))
    }

    fn can_append(&self, trajectory: &Trajectory) -> bool {
        match trajectory.first() {
            None => true,
            Some(first) => {
                self.a.contains(first) && trajectory.frames()[1..].iter().all(|s| self.outside(s))
            }
        }
    }

    fn can_prepend(&self, trajectory: &Trajectory) -> bool {
        match trajectory.last() {
            None => true,
            Some(last) => {
                let n = trajectory.len();
                self.b.contains(last)
                    && trajectory.frames()[..n - 1]
                        .iter()
                        .all(|s| self.outside(s))
            }
        }
    }
}

/// Paths whose every frame lies inside a volume.
#[derive(Debug, Clone)]
pub struct AllInEnsemble {
    label: String,
    volume: Interval,
}

impl AllInEnsemble {
    /// Creates the ensemble for `volume`.
    pub fn new(label: impl Into<String>, volume: Interval) -> Self {
        Self {
            label: label.into(),
            volume,
        }
    }
}

impl Ensemble for AllInEnsemble {
    fn label(&self) -> &str {
        &self.label
    }

    fn contains(&self, trajectory: &Trajectory) -> bool {
        !trajectory.is_empty() && trajectory.iter().all(|s| self.volume.contains(s))
    }

    fn can_append(&self, trajectory: &Trajectory) -> bool {
        trajectory.iter().all(|s| self.volume.contains(s))
    }

    fn can_prepend(&self, trajectory: &Trajectory) -> bool {
        self.can_append(trajectory)
    }
}

/// Paths of exactly `frames` frames.
#[derive(Debug, Clone)]
pub struct LengthEnsemble {
    label: String,
    frames: usize,
}

impl LengthEnsemble {
    /// Creates the ensemble of `frames`-frame paths.
    pub fn new(label: impl Into<String>, frames: usize) -> Self {
        Self {
            label: label.into(),
            frames,
        }
    }
}

impl Ensemble for LengthEnsemble {
    fn label(&self) -> &str {
        &self.label
    }

    fn contains(&self, trajectory: &Trajectory) -> bool {
        trajectory.len() == self.frames
    }

    fn can_append(&self, trajectory: &Trajectory) -> bool {
        trajectory.len() < self.frames
    }

    fn can_prepend(&self, trajectory: &Trajectory) -> bool {
        trajectory.len() < self.frames
    }
}

/// Selects every frame with equal weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSelector;

impl ShootingPointSelector for UniformSelector {
    fn name(&self) -> &str {
        "uniform"
    }

    fn sum_bias(&self, trajectory: &Trajectory) -> f64 {
        trajectory.len() as f64
    }

    fn pick(
        &self,
        trajectory: &Trajectory,
        rng: &mut RngHandle,
    ) -> Result<ShootingPoint, TpsError> {
        if trajectory.is_empty() {
            return Err(TpsError::Invariant(ErrorInfo::new(
                "invalid-trajectory-length",
                "cannot pick a shooting point on an empty trajectory",
            )));
        }
        let index = rng.index(trajectory.len());
        Ok(self.shooting_point(trajectory, index))
    }
}

/// Constant-velocity drift engine.
///
/// Each frame advances the coordinates by `dt` times the effective velocity.
/// With a non-zero `kick`, every call to `generate` first perturbs the
/// initial velocities by a uniform amount in `[-kick, kick)` drawn from the
/// caller's stream.
#[derive(Debug, Clone)]
pub struct ToyEngine {
    dt: f64,
    max_frames: usize,
    kick: f64,
}

impl ToyEngine {
    /// Creates a deterministic engine without velocity kicks.
    pub fn new(dt: f64, max_frames: usize) -> Self {
        Self {
            dt,
            max_frames,
            kick: 0.0,
        }
    }

    /// Enables velocity kicks of magnitude up to `kick`.
    pub fn with_kick(mut self, kick: f64) -> Self {
        self.kick = kick.abs();
        self
    }

    fn advance(&self, snapshot: &Snapshot) -> Snapshot {
        let velocities = snapshot.effective_velocities();
        let coordinates = snapshot
            .coordinates
            .iter()
            .zip(velocities.iter())
            .map(|(x, v)| x + self.dt * v)
            .collect();
        Snapshot {
            coordinates,
            velocities: snapshot.velocities.clone(),
            momentum_reversed: snapshot.momentum_reversed,
        }
    }

    fn kicked(&self, initial: &Snapshot, rng: &mut RngHandle) -> Snapshot {
        let mut start = initial.clone();
        if self.kick != 0.0 {
            for v in start.velocities.iter_mut() {
                *v += self.kick * (2.0 * rng.uniform() - 1.0);
            }
        }
        start
    }
}

impl DynamicsEngine for ToyEngine {
    fn generate(
        &self,
        initial: &Snapshot,
        running: &[Continuation<'_>],
        rng: &mut RngHandle,
    ) -> Result<Trajectory, TpsError> {
        if initial.coordinates.len() != initial.velocities.len() {
            return Err(TpsError::Engine(
                ErrorInfo::new(
                    "dimension-mismatch",
                    "snapshot coordinates and velocities differ in length",
                )
                .with_context("coordinates", initial.coordinates.len().to_string())
                .with_context("velocities", initial.velocities.len().to_string()),
            ));
        }
        let mut segment = Trajectory::from_frames(vec![self.kicked(initial, rng)]);
        let keep_going = |segment: &Trajectory| running.iter().all(|predicate| predicate(segment));
        if !keep_going(&segment) {
            return Ok(segment);
        }
        while segment.len() < self.max_frames {
            let next = match segment.last() {
                Some(last) => self.advance(last),
                None => break,
            };
            segment.push(next);
            if !keep_going(&segment) {
                break;
            }
        }
        Ok(segment)
    }

    fn max_frames(&self) -> usize {
        self.max_frames
    }
}
