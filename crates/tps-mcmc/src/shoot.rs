use std::cell::{Ref, RefCell};
use std::sync::Arc;

use tps_core::errors::ErrorInfo;
use tps_core::{
    DynamicsEngine, EnsembleRef, LengthStopper, RngHandle, ShootingPoint, ShootingPointSelector,
    TpsError, Trajectory,
};
use tracing::{debug, info};

use crate::details::{DetailsExtra, MoveDetails, ShootDirection, ShootingDetails};
use crate::mover::{mover_builders, MoverInfo, MoverKind, PathMover, INIT_TARGET};
use crate::sample::{Sample, SampleSet};

/// One-way shooting move.
///
/// Picks a frame on a legal sample's trajectory, regenerates the path from
/// that frame in one direction with the engine, and accepts the trial when
/// it lies in the sample's ensemble and a uniform draw falls below the ratio
/// of shooting-point selection weights on the old and new path.
pub struct ShootMover {
    info: MoverInfo,
    direction: ShootDirection,
    selector: Arc<dyn ShootingPointSelector>,
    engine: Arc<dyn DynamicsEngine>,
    length_stopper: LengthStopper,
}

mover_builders!(ShootMover);

impl ShootMover {
    /// Creates a shooting mover regenerating in `direction`.
    pub fn new(
        direction: ShootDirection,
        selector: Arc<dyn ShootingPointSelector>,
        engine: Arc<dyn DynamicsEngine>,
        ensembles: Option<Vec<EnsembleRef>>,
    ) -> Self {
        let kind = match direction {
            ShootDirection::Forward => MoverKind::ForwardShoot,
            ShootDirection::Backward => MoverKind::BackwardShoot,
        };
        let info = MoverInfo::new(kind, ensembles);
        let length_stopper = LengthStopper::new(engine.max_frames());
        debug!(
            target: INIT_TARGET,
            mover = %info.name(),
            selector = %selector.name(),
            ensembles = ?info.ensemble_labels(),
            max_frames = length_stopper.max_frames,
            "initialized mover"
        );
        Self {
            info,
            direction,
            selector,
            engine,
            length_stopper,
        }
    }

    /// Forward shooting mover.
    pub fn forward(
        selector: Arc<dyn ShootingPointSelector>,
        engine: Arc<dyn DynamicsEngine>,
        ensembles: Option<Vec<EnsembleRef>>,
    ) -> Self {
        Self::new(ShootDirection::Forward, selector, engine, ensembles)
    }

    /// Backward shooting mover.
    pub fn backward(
        selector: Arc<dyn ShootingPointSelector>,
        engine: Arc<dyn DynamicsEngine>,
        ensembles: Option<Vec<EnsembleRef>>,
    ) -> Self {
        Self::new(ShootDirection::Backward, selector, engine, ensembles)
    }

    /// Regeneration direction.
    pub fn direction(&self) -> ShootDirection {
        self.direction
    }

    /// Returns the trial and the index of the shooting frame on it.
    fn generate(
        &self,
        start: &Trajectory,
        index: usize,
        ensemble: &EnsembleRef,
        rng: &mut RngHandle,
    ) -> Result<(Trajectory, usize), TpsError> {
        info!(
            "Shooting {} from frame {} in [0:{}]",
            self.direction.as_str(),
            index,
            start.len() - 1
        );
        let stopper = self.length_stopper;
        match self.direction {
            ShootDirection::Forward => {
                let buffer = TrialBuffer::new(ShootDirection::Forward, start.slice(..index));
                let in_ensemble = |segment: &Trajectory| ensemble.can_append(&buffer.sync(segment));
                let bounded = |segment: &Trajectory| stopper.can_append(&buffer.sync(segment));
                let partial = self
                    .engine
                    .generate(&start[index], &[&in_ensemble, &bounded], rng)?;
                Ok((buffer.into_trial(&partial), index))
            }
            ShootDirection::Backward => {
                let buffer = TrialBuffer::new(ShootDirection::Backward, start.slice(index + 1..));
                let in_ensemble =
                    |segment: &Trajectory| ensemble.can_prepend(&buffer.sync(segment));
                let bounded = |segment: &Trajectory| stopper.can_prepend(&buffer.sync(segment));
                let partial = self.engine.generate(
                    &start[index].reversed_copy(),
                    &[&in_ensemble, &bounded],
                    rng,
                )?;
                let final_index = partial.len().saturating_sub(1);
                Ok((buffer.into_trial(&partial), final_index))
            }
        }
    }
}

/// Trial path assembled while the engine runs.
///
/// Engines grow their segment one frame at a time, so each continuation
/// check only copies the frames added since the previous check. Backward
/// frames are time-reversed and inserted before the fixed suffix.
struct TrialBuffer {
    direction: ShootDirection,
    fixed: Trajectory,
    trial: RefCell<Trajectory>,
}

impl TrialBuffer {
    fn new(direction: ShootDirection, fixed: Trajectory) -> Self {
        Self {
            direction,
            trial: RefCell::new(fixed.clone()),
            fixed,
        }
    }

    fn sync(&self, segment: &Trajectory) -> Ref<'_, Trajectory> {
        {
            let mut trial = self.trial.borrow_mut();
            let synced = trial.len() - self.fixed.len();
            if synced > segment.len() {
                *trial = self.assemble(segment);
            } else {
                for frame in &segment.frames()[synced..] {
                    match self.direction {
                        ShootDirection::Forward => trial.push(frame.clone()),
                        ShootDirection::Backward => trial.push_front(frame.reversed_copy()),
                    }
                }
            }
        }
        self.trial.borrow()
    }

    fn assemble(&self, segment: &Trajectory) -> Trajectory {
        match self.direction {
            ShootDirection::Forward => self.fixed.concat(segment),
            ShootDirection::Backward => segment.reversed().concat(&self.fixed),
        }
    }

    fn into_trial(self, segment: &Trajectory) -> Trajectory {
        drop(self.sync(segment));
        self.trial.into_inner()
    }
}

fn check_bias(point: &ShootingPoint, which: &str) -> Result<(), TpsError> {
    if point.sum_bias > 0.0 && point.sum_bias.is_finite() {
        return Ok(());
    }
    Err(TpsError::Invariant(
        ErrorInfo::new(
            "non-positive-bias",
            "shooting point selector returned a non-positive sum_bias",
        )
        .with_context("point", which)
        .with_context("sum_bias", point.sum_bias.to_string()),
    ))
}

impl PathMover for ShootMover {
    fn info(&self) -> &MoverInfo {
        &self.info
    }

    fn move_state(&self, state: &SampleSet, rng: &mut RngHandle) -> Result<SampleSet, TpsError> {
        let sample = self.select_sample(state, None, rng)?;
        let start = sample.trajectory.clone();
        if start.len() < 2 {
            return Err(TpsError::Invariant(
                ErrorInfo::new(
                    "invalid-trajectory-length",
                    "shooting requires a trajectory of at least two frames",
                )
                .with_context("mover", self.name())
                .with_context("replica", sample.replica.to_string())
                .with_context("frames", start.len().to_string()),
            ));
        }
        let start_point = self.selector.pick(&start, rng)?;
        check_bias(&start_point, "start")?;

        let (trial, final_index) = self.generate(&start, start_point.index, &sample.ensemble, rng)?;
        let trial_is_in_ensemble = sample.ensemble.contains(&trial);
        let final_point = if trial.is_empty() {
            None
        } else {
            Some(self.selector.shooting_point(&trial, final_index))
        };
        let trial = Arc::new(trial);

        let mut details = MoveDetails::started(self.reference(), vec![start.clone()]);
        details.trial = Some(trial.clone());
        details.result = Some(start.clone());
        details.acceptance_probability = Some(0.0);
        details.extra = DetailsExtra::Shooting(ShootingDetails {
            direction: self.direction,
            start: start.clone(),
            start_point,
            final_point,
            trial_is_in_ensemble,
        });

        if trial_is_in_ensemble {
            if let Some(point) = &final_point {
                check_bias(point, "final")?;
            }
            let ratio = self.selection_probability_ratio(&details);
            let draw = rng.uniform();
            debug!(
                mover = %self.name(),
                ratio,
                draw,
                "proposal probability against random draw"
            );
            details.acceptance_probability = Some(ratio.min(1.0));
            if draw < ratio {
                details.accepted = Some(true);
                details.result = Some(trial);
            }
        } else {
            debug!(
                mover = %self.name(),
                frames = trial.len(),
                "trial left the ensemble"
            );
        }

        let accepted = details.is_accepted();
        let result = details.result.clone().unwrap_or(start);
        let new_sample = Sample {
            replica: sample.replica,
            trajectory: result,
            ensemble: sample.ensemble,
            details: details.freeze(),
        };
        Ok(state.apply(vec![new_sample], accepted, self.reference()))
    }

    fn selection_probability_ratio(&self, details: &MoveDetails) -> f64 {
        match details.shooting() {
            Some(ShootingDetails {
                start_point,
                final_point: Some(final_point),
                ..
            }) => start_point.sum_bias / final_point.sum_bias,
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tps_core::Snapshot;

    fn path(xs: &[f64]) -> Trajectory {
        xs.iter()
            .map(|&x| Snapshot::new(vec![x], vec![1.0]))
            .collect()
    }

    #[test]
    fn forward_buffer_tracks_growing_segment() {
        let buffer = TrialBuffer::new(ShootDirection::Forward, path(&[0.0, 1.0]));
        let mut segment = path(&[2.0]);
        assert_eq!(*buffer.sync(&segment), path(&[0.0, 1.0, 2.0]));
        segment.push(Snapshot::new(vec![3.0], vec![1.0]));
        assert_eq!(*buffer.sync(&segment), path(&[0.0, 1.0, 2.0, 3.0]));
        assert_eq!(*buffer.sync(&segment), path(&[0.0, 1.0, 2.0, 3.0]));
        assert_eq!(buffer.into_trial(&path(&[2.0])), path(&[0.0, 1.0, 2.0]));
    }

    #[test]
    fn backward_buffer_prepends_reversed_frames() {
        let suffix = path(&[4.0, 5.0]);
        let buffer = TrialBuffer::new(ShootDirection::Backward, suffix.clone());
        let mut segment = path(&[3.0]).reversed();
        buffer.sync(&segment);
        segment.push(Snapshot::new(vec![2.0], vec![1.0]).reversed_copy());
        let trial = buffer.into_trial(&segment);
        assert_eq!(trial, segment.reversed().concat(&suffix));
        assert_eq!(trial.len(), 4);
        assert_eq!(trial[0].x(), 2.0);
    }
}
