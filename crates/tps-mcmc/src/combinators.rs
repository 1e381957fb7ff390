use std::sync::Arc;

use tps_core::errors::ErrorInfo;
use tps_core::{RngHandle, TpsError};
use tracing::{debug, info};

use crate::mover::{mover_builders, MoverInfo, MoverKind, PathMover, INIT_TARGET};
use crate::sample::{Sample, SampleSet};

/// Splits `state` into the part a filtered combinator hands to its children
/// and the samples it must reattach afterwards.
fn scope(info: &MoverInfo, state: &SampleSet) -> (SampleSet, Vec<Sample>) {
    if info.is_unrestricted() {
        return (state.clone(), Vec::new());
    }
    state.partition(|sample| info.is_legal(sample, None))
}

fn check_movers(kind: MoverKind, movers: &[Arc<dyn PathMover>]) -> Result<(), TpsError> {
    if movers.is_empty() {
        return Err(TpsError::Config(
            ErrorInfo::new("empty-mover-list", "combinator needs at least one mover")
                .with_context("kind", kind.default_name()),
        ));
    }
    Ok(())
}

fn log_init(info: &MoverInfo, movers: &[Arc<dyn PathMover>]) {
    debug!(
        target: INIT_TARGET,
        mover = %info.name(),
        movers = ?movers.iter().map(|m| m.name().to_string()).collect::<Vec<_>>(),
        ensembles = ?info.ensemble_labels(),
        "initialized combinator"
    );
}

/// Dispatches each move to one sub-mover drawn with probability proportional
/// to its weight.
pub struct RandomChoiceMover {
    info: MoverInfo,
    movers: Vec<Arc<dyn PathMover>>,
    weights: Vec<f64>,
    total: f64,
}

mover_builders!(RandomChoiceMover, ensembles);

impl RandomChoiceMover {
    /// Uniform choice among `movers`.
    pub fn new(movers: Vec<Arc<dyn PathMover>>) -> Result<Self, TpsError> {
        let weights = vec![1.0; movers.len()];
        Self::with_weights(movers, weights)
    }

    /// Weighted choice among `movers`. Weights need not be normalised.
    pub fn with_weights(
        movers: Vec<Arc<dyn PathMover>>,
        weights: Vec<f64>,
    ) -> Result<Self, TpsError> {
        check_movers(MoverKind::RandomChoice, &movers)?;
        if weights.len() != movers.len() {
            return Err(TpsError::Config(
                ErrorInfo::new("weight-mismatch", "one weight is required per mover")
                    .with_context("movers", movers.len().to_string())
                    .with_context("weights", weights.len().to_string()),
            ));
        }
        if weights.iter().any(|w| !(*w >= 0.0 && w.is_finite())) {
            return Err(TpsError::Config(ErrorInfo::new(
                "weight-mismatch",
                "weights must be finite and non-negative",
            )));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(TpsError::Config(
                ErrorInfo::new("weight-mismatch", "total weight must be positive")
                    .with_hint("give at least one mover a positive weight"),
            ));
        }
        let info = MoverInfo::new(MoverKind::RandomChoice, None);
        log_init(&info, &movers);
        Ok(Self {
            info,
            movers,
            weights,
            total,
        })
    }

    /// Configured weights, in mover order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Index of the mover selected by a uniform draw in `[0, 1)`.
    pub fn pick(&self, draw: f64) -> usize {
        let target = draw * self.total;
        let mut cumulative = 0.0;
        let mut last_positive = 0;
        for (idx, weight) in self.weights.iter().enumerate() {
            if *weight <= 0.0 {
                continue;
            }
            cumulative += weight;
            last_positive = idx;
            if target < cumulative {
                return idx;
            }
        }
        last_positive
    }
}

impl PathMover for RandomChoiceMover {
    fn info(&self) -> &MoverInfo {
        &self.info
    }

    fn move_state(&self, state: &SampleSet, rng: &mut RngHandle) -> Result<SampleSet, TpsError> {
        let (scoped, rest) = scope(&self.info, state);
        let idx = self.pick(rng.uniform());
        let chosen = &self.movers[idx];
        info!("{} selecting mover index {} ({})", self.name(), idx, chosen.name());
        let result = chosen.move_state(&scoped.extended(self.reference(), true), rng)?;
        Ok(result.reattach(rest))
    }

    fn submovers(&self) -> &[Arc<dyn PathMover>] {
        &self.movers
    }
}

/// Runs every sub-mover in order, threading the state through the chain.
///
/// The resulting acceptance flag is that of the last sub-mover.
pub struct SequentialMover {
    info: MoverInfo,
    movers: Vec<Arc<dyn PathMover>>,
}

mover_builders!(SequentialMover, ensembles);

impl SequentialMover {
    /// Creates the pipeline.
    pub fn new(movers: Vec<Arc<dyn PathMover>>) -> Result<Self, TpsError> {
        check_movers(MoverKind::Sequential, &movers)?;
        let info = MoverInfo::new(MoverKind::Sequential, None);
        log_init(&info, &movers);
        Ok(Self { info, movers })
    }
}

impl PathMover for SequentialMover {
    fn info(&self) -> &MoverInfo {
        &self.info
    }

    fn move_state(&self, state: &SampleSet, rng: &mut RngHandle) -> Result<SampleSet, TpsError> {
        let (scoped, rest) = scope(&self.info, state);
        let mut current = scoped.extended(self.reference(), true);
        for (step, mover) in self.movers.iter().enumerate() {
            current = mover.move_state(&current, rng)?;
            debug!(
                mover = %self.name(),
                step,
                submover = %mover.name(),
                accepted = current.accepted(),
                "sequential step"
            );
        }
        Ok(current.reattach(rest))
    }

    fn submovers(&self) -> &[Arc<dyn PathMover>] {
        &self.movers
    }
}

/// Runs sub-movers in order and stops at the first rejection.
///
/// Samples produced by the steps before the rejection stay in the result.
pub struct PartialAcceptanceSequentialMover {
    info: MoverInfo,
    movers: Vec<Arc<dyn PathMover>>,
}

mover_builders!(PartialAcceptanceSequentialMover, ensembles);

impl PartialAcceptanceSequentialMover {
    /// Creates the pipeline.
    pub fn new(movers: Vec<Arc<dyn PathMover>>) -> Result<Self, TpsError> {
        check_movers(MoverKind::PartialAcceptanceSequential, &movers)?;
        let info = MoverInfo::new(MoverKind::PartialAcceptanceSequential, None);
        log_init(&info, &movers);
        Ok(Self { info, movers })
    }
}

impl PathMover for PartialAcceptanceSequentialMover {
    fn info(&self) -> &MoverInfo {
        &self.info
    }

    fn move_state(&self, state: &SampleSet, rng: &mut RngHandle) -> Result<SampleSet, TpsError> {
        let (scoped, rest) = scope(&self.info, state);
        let mut current = scoped.extended(self.reference(), true);
        for (step, mover) in self.movers.iter().enumerate() {
            current = mover.move_state(&current, rng)?;
            if !current.accepted() {
                debug!(
                    mover = %self.name(),
                    step,
                    submover = %mover.name(),
                    "stopping at first rejection"
                );
                break;
            }
        }
        Ok(current.reattach(rest))
    }

    fn submovers(&self) -> &[Arc<dyn PathMover>] {
        &self.movers
    }
}

/// All-or-nothing pipeline.
///
/// When any step rejects, the input state is returned with `accepted` set
/// to `false` and only this mover appended to the move path. Requires at
/// most one active sample per replica, checked on the input and after every
/// step.
pub struct ConditionalSequentialMover {
    info: MoverInfo,
    movers: Vec<Arc<dyn PathMover>>,
}

mover_builders!(ConditionalSequentialMover, ensembles);

impl ConditionalSequentialMover {
    /// Creates the transaction.
    pub fn new(movers: Vec<Arc<dyn PathMover>>) -> Result<Self, TpsError> {
        check_movers(MoverKind::ConditionalSequential, &movers)?;
        let info = MoverInfo::new(MoverKind::ConditionalSequential, None);
        log_init(&info, &movers);
        Ok(Self { info, movers })
    }
}

impl PathMover for ConditionalSequentialMover {
    fn info(&self) -> &MoverInfo {
        &self.info
    }

    fn move_state(&self, state: &SampleSet, rng: &mut RngHandle) -> Result<SampleSet, TpsError> {
        state.check_single_active()?;
        let (scoped, rest) = scope(&self.info, state);
        let mut current = scoped.extended(self.reference(), true);
        for (step, mover) in self.movers.iter().enumerate() {
            current = mover.move_state(&current, rng)?;
            current.check_single_active()?;
            if !current.accepted() {
                debug!(
                    mover = %self.name(),
                    step,
                    submover = %mover.name(),
                    "rolling back transaction"
                );
                return Ok(state.extended(self.reference(), false));
            }
        }
        Ok(current.reattach(rest))
    }

    fn submovers(&self) -> &[Arc<dyn PathMover>] {
        &self.movers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reversal::PathReversalMover;

    fn reversal() -> Arc<dyn PathMover> {
        Arc::new(PathReversalMover::new(None))
    }

    #[test]
    fn pick_follows_cumulative_weights() {
        let mover =
            RandomChoiceMover::with_weights(vec![reversal(), reversal()], vec![1.0, 3.0]).unwrap();
        assert_eq!(mover.pick(0.0), 0);
        assert_eq!(mover.pick(0.24), 0);
        assert_eq!(mover.pick(0.25), 1);
        assert_eq!(mover.pick(0.999), 1);
    }

    #[test]
    fn zero_weight_is_never_picked() {
        let mover = RandomChoiceMover::with_weights(
            vec![reversal(), reversal(), reversal()],
            vec![0.0, 2.0, 0.0],
        )
        .unwrap();
        for draw in [0.0, 0.3, 0.7, 0.999_999] {
            assert_eq!(mover.pick(draw), 1);
        }
    }

    #[test]
    fn invalid_weights_are_config_errors() {
        let mismatch = RandomChoiceMover::with_weights(vec![reversal()], vec![1.0, 1.0]);
        assert!(matches!(mismatch, Err(TpsError::Config(_))));
        let zero = RandomChoiceMover::with_weights(vec![reversal()], vec![0.0]);
        assert!(matches!(zero, Err(TpsError::Config(_))));
        let negative = RandomChoiceMover::with_weights(vec![reversal()], vec![-1.0]);
        assert!(matches!(negative, Err(TpsError::Config(_))));
        assert!(SequentialMover::new(Vec::new()).is_err());
    }
}
