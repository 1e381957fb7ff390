use std::sync::Arc;

use tps_core::{EnsembleRef, RngHandle, TpsError};
use tracing::debug;

use crate::details::MoveDetails;
use crate::mover::{mover_builders, MoverInfo, MoverKind, PathMover, INIT_TARGET};
use crate::sample::{Sample, SampleSet};

/// Proposes the time-reversed trajectory of a legal sample.
///
/// Reversal toggles the momentum flag of every frame instead of recomputing
/// velocities, so velocities on the trial are only meaningful through
/// [`tps_core::Snapshot::effective_velocities`]. The proposal is symmetric:
/// the trial is accepted exactly when it is a member of the sample's
/// ensemble, without a random draw.
pub struct PathReversalMover {
    info: MoverInfo,
}

mover_builders!(PathReversalMover);

impl PathReversalMover {
    /// Creates a reversal mover restricted to `ensembles`.
    pub fn new(ensembles: Option<Vec<EnsembleRef>>) -> Self {
        let info = MoverInfo::new(MoverKind::PathReversal, ensembles);
        debug!(
            target: INIT_TARGET,
            mover = %info.name(),
            ensembles = ?info.ensemble_labels(),
            "initialized mover"
        );
        Self { info }
    }
}

impl PathMover for PathReversalMover {
    fn info(&self) -> &MoverInfo {
        &self.info
    }

    fn move_state(&self, state: &SampleSet, rng: &mut RngHandle) -> Result<SampleSet, TpsError> {
        let sample = self.select_sample(state, None, rng)?;
        let trajectory = sample.trajectory.clone();
        let reversed = Arc::new(trajectory.reversed());

        let mut details = MoveDetails::started(self.reference(), vec![trajectory.clone()]);
        details.trial = Some(reversed.clone());
        let accepted = sample.ensemble.contains(&reversed);
        if accepted {
            details.accepted = Some(true);
            details.acceptance_probability = Some(1.0);
            details.result = Some(reversed.clone());
        } else {
            details.acceptance_probability = Some(0.0);
            details.result = Some(trajectory.clone());
        }
        debug!(
            mover = %self.name(),
            replica = %sample.replica,
            accepted,
            "path reversal"
        );

        let new_sample = Sample {
            replica: sample.replica,
            trajectory: if accepted { reversed } else { trajectory },
            ensemble: sample.ensemble,
            details: details.freeze(),
        };
        Ok(state.apply(vec![new_sample], accepted, self.reference()))
    }
}
