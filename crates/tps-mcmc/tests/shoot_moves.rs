use std::sync::Arc;

use tps_core::errors::TpsError;
use tps_core::toy::{Interval, ToyEngine, TransitionEnsemble};
use tps_core::{
    Continuation, DynamicsEngine, Ensemble, EnsembleRef, ReplicaId, RngHandle, ShootingPoint,
    ShootingPointSelector, Snapshot, Trajectory,
};
use tps_mcmc::{PathMover, Sample, SampleSet, ShootDirection, ShootMover};

fn ab() -> EnsembleRef {
    EnsembleRef::new(TransitionEnsemble::new(
        "A->B",
        Interval::new(-10.0, 0.0),
        Interval::new(5.0, 10.0),
    ))
}

fn path(xs: &[f64]) -> Trajectory {
    xs.iter()
        .map(|&x| Snapshot::new(vec![x], vec![1.0]))
        .collect()
}

fn state_with(trajectory: Trajectory, ensemble: &EnsembleRef) -> SampleSet {
    SampleSet::new(vec![Sample::new(
        ReplicaId::from_raw(0),
        trajectory,
        ensemble.clone(),
    )])
}

/// Always shoots from the same frame with a constant weight.
struct FixedSelector(usize);

impl ShootingPointSelector for FixedSelector {
    fn name(&self) -> &str {
        "fixed"
    }

    fn sum_bias(&self, _trajectory: &Trajectory) -> f64 {
        1.0
    }

    fn pick(
        &self,
        trajectory: &Trajectory,
        _rng: &mut RngHandle,
    ) -> Result<ShootingPoint, TpsError> {
        Ok(self.shooting_point(trajectory, self.0))
    }
}

/// Emits a fixed list of first coordinates after the initial frame.
struct ScriptedEngine(Vec<f64>);

impl DynamicsEngine for ScriptedEngine {
    fn generate(
        &self,
        initial: &Snapshot,
        running: &[Continuation<'_>],
        _rng: &mut RngHandle,
    ) -> Result<Trajectory, TpsError> {
        let mut segment = Trajectory::from_frames(vec![initial.clone()]);
        if !running.iter().all(|p| p(&segment)) {
            return Ok(segment);
        }
        for &x in &self.0 {
            segment.push(Snapshot::new(vec![x], initial.velocities.clone()));
            if !running.iter().all(|p| p(&segment)) {
                break;
            }
        }
        Ok(segment)
    }

    fn max_frames(&self) -> usize {
        100
    }
}

#[test]
fn forward_shot_falling_back_into_a_is_rejected() {
    let ensemble = ab();
    let original = path(&[-1.0, 1.0, 2.0, 3.0, 6.0]);
    let state = state_with(original.clone(), &ensemble);
    let mover = ShootMover::forward(
        Arc::new(FixedSelector(2)),
        Arc::new(ScriptedEngine(vec![-5.0, 7.0])),
        None,
    );

    let mut rng = RngHandle::from_seed(11);
    let result = mover.move_state(&state, &mut rng).unwrap();

    assert!(!result.accepted());
    let sample = &result.samples()[0];
    assert_eq!(*sample.trajectory, original);
    let details = &sample.details;
    assert_eq!(details.accepted, Some(false));
    assert_eq!(details.result.as_deref(), Some(&original));
    assert_eq!(details.trial.as_ref().map(|t| t.len()), Some(4));
    let shooting = details.shooting().unwrap();
    assert_eq!(shooting.direction, ShootDirection::Forward);
    assert_eq!(shooting.start_point.index, 2);
    assert!(!shooting.trial_is_in_ensemble);
    assert_eq!(result.move_path().len(), 1);
    assert_eq!(result.move_path().last(), Some(&mover.reference()));
}

#[test]
fn forward_shot_reaching_b_is_accepted() {
    let ensemble = ab();
    let original = path(&[-1.0, 1.0, 2.0, 3.0, 6.0]);
    let state = state_with(original.clone(), &ensemble);
    let mover = ShootMover::forward(
        Arc::new(FixedSelector(2)),
        Arc::new(ToyEngine::new(1.0, 50)),
        None,
    );

    let mut rng = RngHandle::from_seed(3);
    let result = mover.move_state(&state, &mut rng).unwrap();

    assert!(result.accepted());
    let trajectory = &result.samples()[0].trajectory;
    let xs: Vec<f64> = trajectory.iter().map(Snapshot::x).collect();
    assert_eq!(xs, vec![-1.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    assert!(ensemble.contains(trajectory));
    let details = &result.samples()[0].details;
    assert_eq!(details.acceptance_probability, Some(1.0));
    assert_eq!(details.shooting().and_then(|s| s.final_point).map(|p| p.index), Some(2));
}

#[test]
fn backward_shot_keeps_suffix_and_restores_momentum_flags() {
    let ensemble = ab();
    let original = path(&[-1.0, 1.0, 2.0, 3.0, 6.0]);
    let state = state_with(original.clone(), &ensemble);
    let mover = ShootMover::backward(
        Arc::new(FixedSelector(2)),
        Arc::new(ToyEngine::new(1.0, 50)),
        None,
    );

    let mut rng = RngHandle::from_seed(5);
    let result = mover.move_state(&state, &mut rng).unwrap();

    assert!(result.accepted());
    let trajectory = &result.samples()[0].trajectory;
    let xs: Vec<f64> = trajectory.iter().map(Snapshot::x).collect();
    assert_eq!(xs, vec![-1.0, 0.0, 1.0, 2.0, 3.0, 6.0]);
    assert!(trajectory.iter().all(|s| !s.momentum_reversed));
    let shooting = result.samples()[0].details.shooting().cloned().unwrap();
    let final_point = shooting.final_point.unwrap();
    assert_eq!(trajectory[final_point.index].x(), 2.0);
    assert_eq!(shooting.direction, ShootDirection::Backward);
}

#[test]
fn length_stopper_turns_runaway_generation_into_rejection() {
    let ensemble = ab();
    let original = path(&[-1.0, 1.0, 2.0, 3.0, 6.0]);
    let state = state_with(original.clone(), &ensemble);
    let mover = ShootMover::forward(
        Arc::new(FixedSelector(2)),
        Arc::new(ToyEngine::new(0.1, 8)),
        None,
    );

    let mut rng = RngHandle::from_seed(9);
    let result = mover.move_state(&state, &mut rng).unwrap();

    assert!(!result.accepted());
    assert_eq!(*result.samples()[0].trajectory, original);
    let trial = result.samples()[0].details.trial.clone().unwrap();
    assert!(trial.len() <= 8);
}

#[test]
fn shooting_on_a_single_frame_is_an_invariant_error() {
    let ensemble = ab();
    let state = state_with(path(&[-1.0]), &ensemble);
    let mover = ShootMover::forward(
        Arc::new(FixedSelector(0)),
        Arc::new(ToyEngine::new(1.0, 10)),
        None,
    );

    let mut rng = RngHandle::from_seed(0);
    let err = mover.move_state(&state, &mut rng).unwrap_err();
    assert!(matches!(err, TpsError::Invariant(_)));
    assert_eq!(err.code(), "invalid-trajectory-length");
}

#[test]
fn shooting_outside_its_ensembles_is_a_selection_error() {
    let ensemble = ab();
    let other = ab();
    let state = state_with(path(&[-1.0, 1.0, 6.0]), &ensemble);
    let mover = ShootMover::forward(
        Arc::new(FixedSelector(1)),
        Arc::new(ToyEngine::new(1.0, 10)),
        Some(vec![other]),
    );

    let mut rng = RngHandle::from_seed(0);
    let err = mover.move_state(&state, &mut rng).unwrap_err();
    assert_eq!(err.code(), "empty-selection");
}
