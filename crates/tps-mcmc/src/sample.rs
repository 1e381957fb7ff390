use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tps_core::errors::ErrorInfo;
use tps_core::{EnsembleRef, ReplicaId, TpsError, Trajectory, TrajectoryRef};

use crate::details::MoveDetails;
use crate::mover::MoverRef;

/// One replica's current trajectory assignment to an ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Walker carrying the trajectory.
    pub replica: ReplicaId,
    /// Shared, immutable trajectory.
    pub trajectory: TrajectoryRef,
    /// Ensemble the trajectory is assigned to.
    pub ensemble: EnsembleRef,
    /// Record of the move that produced this sample.
    pub details: Arc<MoveDetails>,
}

impl Sample {
    /// Creates an initial sample with an empty move record.
    pub fn new(replica: ReplicaId, trajectory: Trajectory, ensemble: EnsembleRef) -> Self {
        Self::shared(replica, Arc::new(trajectory), ensemble)
    }

    /// Creates an initial sample around an already shared trajectory.
    pub fn shared(replica: ReplicaId, trajectory: TrajectoryRef, ensemble: EnsembleRef) -> Self {
        Self {
            replica,
            trajectory,
            ensemble,
            details: Arc::new(MoveDetails::default()),
        }
    }

    /// Whether the trajectory satisfies the sample's ensemble.
    pub fn is_consistent(&self) -> bool {
        self.ensemble.contains(&self.trajectory)
    }
}

/// Persistent history of the movers applied to a state.
///
/// Entries live in a shared linked list, newest first, so cloning a path and
/// extending it with one mover are constant-time and every state derived
/// from a common ancestor shares that ancestor's history.
#[derive(Clone, Default)]
pub struct MovePath {
    head: Option<Arc<PathNode>>,
    len: usize,
}

struct PathNode {
    mover: MoverRef,
    prev: Option<Arc<PathNode>>,
}

impl MovePath {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded movers.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recently applied mover.
    pub fn last(&self) -> Option<&MoverRef> {
        self.head.as_deref().map(|node| &node.mover)
    }

    /// This history with `mover` appended.
    pub fn pushed(&self, mover: MoverRef) -> MovePath {
        MovePath {
            head: Some(Arc::new(PathNode {
                mover,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Movers recorded after the first `start` entries, oldest first.
    pub fn since(&self, start: usize) -> Vec<&MoverRef> {
        let mut recent: Vec<&MoverRef> = self
            .newest_first()
            .take(self.len.saturating_sub(start))
            .collect();
        recent.reverse();
        recent
    }

    /// Iterates from the most recent mover back to the first.
    pub fn newest_first(&self) -> impl Iterator<Item = &MoverRef> {
        std::iter::successors(self.head.as_deref(), |node| node.prev.as_deref())
            .map(|node| &node.mover)
    }

    /// Copies the whole history, oldest first.
    pub fn to_vec(&self) -> Vec<MoverRef> {
        self.since(0).into_iter().cloned().collect()
    }
}

impl PartialEq for MovePath {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        let mut left = self.head.as_ref();
        let mut right = other.head.as_ref();
        loop {
            match (left, right) {
                (None, None) => return true,
                (Some(a), Some(b)) if Arc::ptr_eq(a, b) => return true,
                (Some(a), Some(b)) if a.mover == b.mover => {
                    left = a.prev.as_ref();
                    right = b.prev.as_ref();
                }
                _ => return false,
            }
        }
    }
}

impl fmt::Debug for MovePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.since(0)).finish()
    }
}

impl Drop for MovePath {
    // Unlinks uniquely owned nodes in a loop; recursive drops of long chains
    // would exhaust the stack.
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.prev.take(),
                Err(_) => break,
            }
        }
    }
}

/// Global Monte Carlo state: the current samples plus the movers applied so far.
///
/// A `SampleSet` is a value. Every operation that changes it returns a new
/// set and leaves the receiver untouched, which is what lets transactional
/// combinators roll back by simply returning their input.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    samples: Vec<Sample>,
    move_path: MovePath,
    accepted: bool,
}

impl Default for SampleSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SampleSet {
    /// Creates a fresh state with an empty move history.
    pub fn new(samples: Vec<Sample>) -> Self {
        Self::with_history(samples, MovePath::new(), true)
    }

    /// Creates a state carrying an explicit history and acceptance flag.
    pub fn with_history(samples: Vec<Sample>, move_path: MovePath, accepted: bool) -> Self {
        Self {
            samples,
            move_path,
            accepted,
        }
    }

    /// Samples in insertion order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Iterates over the samples.
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the state holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Movers applied to reach this state.
    pub fn move_path(&self) -> &MovePath {
        &self.move_path
    }

    /// Acceptance decision of the mover that produced this state.
    pub fn accepted(&self) -> bool {
        self.accepted
    }

    /// Distinct replicas present, in ascending order.
    pub fn replica_list(&self) -> Vec<ReplicaId> {
        self.samples
            .iter()
            .map(|sample| sample.replica)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct ensembles present, in order of first appearance.
    pub fn ensemble_list(&self) -> Vec<EnsembleRef> {
        let mut ensembles: Vec<EnsembleRef> = Vec::new();
        for sample in &self.samples {
            if !ensembles.contains(&sample.ensemble) {
                ensembles.push(sample.ensemble.clone());
            }
        }
        ensembles
    }

    /// All samples belonging to `replica`.
    pub fn all_from_replica(&self, replica: ReplicaId) -> Vec<Sample> {
        self.samples
            .iter()
            .filter(|sample| sample.replica == replica)
            .cloned()
            .collect()
    }

    /// All samples assigned to `ensemble`.
    pub fn all_from_ensemble(&self, ensemble: &EnsembleRef) -> Vec<Sample> {
        self.samples
            .iter()
            .filter(|sample| &sample.ensemble == ensemble)
            .cloned()
            .collect()
    }

    /// Returns the state after `mover` produced `new_samples`.
    ///
    /// Each new sample replaces the first existing sample of the same
    /// replica; samples for unseen replicas are appended. The move path is
    /// extended by `mover` and the acceptance flag set to `accepted`.
    pub fn apply(&self, new_samples: Vec<Sample>, accepted: bool, mover: MoverRef) -> SampleSet {
        let mut samples = self.samples.clone();
        for sample in new_samples {
            match samples.iter().position(|s| s.replica == sample.replica) {
                Some(pos) => samples[pos] = sample,
                None => samples.push(sample),
            }
        }
        SampleSet {
            samples,
            move_path: self.move_path.pushed(mover),
            accepted,
        }
    }

    /// Same samples, with `mover` appended to the history.
    pub fn extended(&self, mover: MoverRef, accepted: bool) -> SampleSet {
        SampleSet {
            samples: self.samples.clone(),
            move_path: self.move_path.pushed(mover),
            accepted,
        }
    }

    /// Splits the state into the samples matching `keep` (as a state sharing
    /// this history) and the remaining samples.
    pub fn partition<F>(&self, keep: F) -> (SampleSet, Vec<Sample>)
    where
        F: Fn(&Sample) -> bool,
    {
        let (kept, rest): (Vec<Sample>, Vec<Sample>) =
            self.samples.iter().cloned().partition(|sample| keep(sample));
        (
            SampleSet::with_history(kept, self.move_path.clone(), self.accepted),
            rest,
        )
    }

    /// Adds samples set aside by [`SampleSet::partition`] back to the state.
    pub fn reattach(mut self, rest: Vec<Sample>) -> SampleSet {
        self.samples.extend(rest);
        self
    }

    /// Fails when any replica has more than one sample.
    pub fn check_single_active(&self) -> Result<(), TpsError> {
        let mut seen = BTreeSet::new();
        for sample in &self.samples {
            if !seen.insert(sample.replica) {
                return Err(TpsError::Invariant(
                    ErrorInfo::new(
                        "multiple-active-samples",
                        "replica holds more than one active sample",
                    )
                    .with_context("replica", sample.replica.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Fails when a sample's trajectory is not a member of its ensemble.
    pub fn consistency_check(&self) -> Result<(), TpsError> {
        for sample in &self.samples {
            if !sample.is_consistent() {
                return Err(TpsError::Invariant(
                    ErrorInfo::new(
                        "sample-outside-ensemble",
                        "sample trajectory is not in its ensemble",
                    )
                    .with_context("replica", sample.replica.to_string())
                    .with_context("ensemble", sample.ensemble.label())
                    .with_context("frames", sample.trajectory.len().to_string()),
                ));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mover::{MoverInfo, MoverKind};

    fn reference(kind: MoverKind) -> MoverRef {
        MoverInfo::new(kind, None).reference()
    }

    #[test]
    fn derived_states_share_history() {
        let base = SampleSet::default();
        let first = reference(MoverKind::PathReversal);
        let second = reference(MoverKind::Sequential);
        let one = base.extended(first.clone(), true);
        let two = one.extended(second.clone(), false);

        assert_eq!(base.move_path().len(), 0);
        assert_eq!(one.move_path().to_vec(), vec![first.clone()]);
        assert_eq!(two.move_path().to_vec(), vec![first.clone(), second.clone()]);
        assert_eq!(two.move_path().since(1), vec![&second]);
        assert_eq!(two.move_path().last(), Some(&second));
        assert_eq!(
            one.move_path().clone().pushed(second.clone()),
            *two.move_path()
        );
        assert_ne!(one.move_path(), two.move_path());
    }

    #[test]
    fn long_histories_drop_without_recursion() {
        let mover = reference(MoverKind::PathReversal);
        let mut path = MovePath::new();
        for _ in 0..200_000 {
            path = path.pushed(mover.clone());
        }
        let shared = path.clone();
        assert_eq!(shared.len(), 200_000);
        drop(path);
        assert_eq!(shared.newest_first().count(), 200_000);
    }
}
