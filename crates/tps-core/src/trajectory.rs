//! Snapshot and trajectory value types.

use std::ops::{Index, RangeBounds};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Shared, read-only handle to a trajectory owned outside the sampler.
pub type TrajectoryRef = Arc<Trajectory>;

/// One frame of a trajectory.
///
/// Velocities are stored as produced by the engine. After a path reversal the
/// `momentum_reversed` flag is toggled instead of negating the stored
/// velocities, so stored velocities of a reversed frame are not physically
/// meaningful on their own; use [`Snapshot::effective_velocities`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Configuration coordinates.
    pub coordinates: Vec<f64>,
    /// Velocities as stored by the engine.
    pub velocities: Vec<f64>,
    /// Whether the momenta of this frame are to be read with inverted sign.
    #[serde(default)]
    pub momentum_reversed: bool,
}

impl Snapshot {
    /// Creates a snapshot with forward-oriented momenta.
    pub fn new(coordinates: Vec<f64>, velocities: Vec<f64>) -> Self {
        Self {
            coordinates,
            velocities,
            momentum_reversed: false,
        }
    }

    /// Returns an independent copy with the momentum flag toggled.
    pub fn reversed_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.momentum_reversed = !copy.momentum_reversed;
        copy
    }

    /// Velocities with the momentum flag applied.
    pub fn effective_velocities(&self) -> Vec<f64> {
        if self.momentum_reversed {
            self.velocities.iter().map(|v| -v).collect()
        } else {
            self.velocities.clone()
        }
    }

    /// First configuration coordinate, the collective variable used by the toy volumes.
    pub fn x(&self) -> f64 {
        self.coordinates.first().copied().unwrap_or(0.0)
    }
}

/// Ordered sequence of snapshots.
///
/// Trajectories are values: slicing, concatenation and reversal return new
/// trajectories and never touch the receiver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    frames: Vec<Snapshot>,
}

impl Trajectory {
    /// Creates an empty trajectory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an owned list of frames.
    pub fn from_frames(frames: Vec<Snapshot>) -> Self {
        Self { frames }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the trajectory holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Returns the frame at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.frames.get(index)
    }

    /// First frame.
    pub fn first(&self) -> Option<&Snapshot> {
        self.frames.first()
    }

    /// Last frame.
    pub fn last(&self) -> Option<&Snapshot> {
        self.frames.last()
    }

    /// Iterates over frames in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.frames.iter()
    }

    /// Borrowed view over all frames.
    pub fn frames(&self) -> &[Snapshot] {
        &self.frames
    }

    /// Appends a frame. Used by engines while growing a segment.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.frames.push(snapshot);
    }

    /// Inserts a frame at the start, shifting the existing frames.
    pub fn push_front(&mut self, snapshot: Snapshot) {
        self.frames.insert(0, snapshot);
    }

    /// Copies the frames in `range` into a new trajectory.
    ///
    /// Bounds are clamped to the trajectory length, mirroring list slicing.
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Trajectory {
        use std::ops::Bound;
        let len = self.frames.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s + 1,
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e + 1,
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .min(len);
        if start >= end {
            return Trajectory::new();
        }
        Trajectory::from_frames(self.frames[start..end].to_vec())
    }

    /// Returns `self` followed by `other`.
    pub fn concat(&self, other: &Trajectory) -> Trajectory {
        let mut frames = Vec::with_capacity(self.len() + other.len());
        frames.extend_from_slice(&self.frames);
        frames.extend_from_slice(&other.frames);
        Trajectory::from_frames(frames)
    }

    /// Returns the time-reversed trajectory.
    ///
    /// Every frame has its momentum flag toggled; velocities are not
    /// recomputed. Reversing twice restores the original frames exactly.
    pub fn reversed(&self) -> Trajectory {
        let frames = self
            .frames
            .iter()
            .rev()
            .map(Snapshot::reversed_copy)
            .collect();
        Trajectory::from_frames(frames)
    }

    /// Canonical SHA-256 content hash of the trajectory.
    pub fn canonical_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.frames.len() as u64).to_le_bytes());
        for frame in &self.frames {
            hasher.update((frame.coordinates.len() as u64).to_le_bytes());
            for value in &frame.coordinates {
                hasher.update(value.to_bits().to_le_bytes());
            }
            hasher.update((frame.velocities.len() as u64).to_le_bytes());
            for value in &frame.velocities {
                hasher.update(value.to_bits().to_le_bytes());
            }
            hasher.update([u8::from(frame.momentum_reversed)]);
        }
        format!("{:x}", hasher.finalize())
    }
}

impl Index<usize> for Trajectory {
    type Output = Snapshot;

    fn index(&self, index: usize) -> &Snapshot {
        &self.frames[index]
    }
}

impl FromIterator<Snapshot> for Trajectory {
    fn from_iter<I: IntoIterator<Item = Snapshot>>(iter: I) -> Self {
        Trajectory::from_frames(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Trajectory {
        (0..n)
            .map(|i| Snapshot::new(vec![i as f64], vec![1.0]))
            .collect()
    }

    #[test]
    fn slice_clamps_out_of_range_bounds() {
        let traj = line(4);
        assert_eq!(traj.slice(2..10).len(), 2);
        assert!(traj.slice(5..).is_empty());
        assert_eq!(traj.slice(..0).len(), 0);
    }

    #[test]
    fn reversed_flips_order_and_flag() {
        let traj = line(3);
        let rev = traj.reversed();
        assert_eq!(rev[0].x(), 2.0);
        assert!(rev.iter().all(|s| s.momentum_reversed));
        assert_eq!(rev[0].effective_velocities(), vec![-1.0]);
    }

    #[test]
    fn hash_depends_on_momentum_flag() {
        let traj = line(3);
        let flipped: Trajectory = traj.iter().map(Snapshot::reversed_copy).collect();
        assert_ne!(traj.canonical_hash(), flipped.canonical_hash());
    }
}
