use tps_core::errors::ErrorInfo;
use tps_core::{EnsembleRef, RngHandle, TpsError};
use tracing::debug;

use crate::details::{DetailsExtra, ExchangeDetails, MoveDetails};
use crate::mover::{mover_builders, MoverInfo, MoverKind, PathMover, INIT_TARGET};
use crate::sample::{Sample, SampleSet};

/// Swaps the ensemble labels of the samples in two ensembles.
///
/// The swap is accepted unconditionally. A Metropolis test weighting the
/// relative path probabilities of both ensembles is not applied, so this
/// mover does not by itself preserve detailed balance between ensembles with
/// different path weights.
pub struct ReplicaExchange {
    info: MoverInfo,
    ensembles: [EnsembleRef; 2],
}

mover_builders!(ReplicaExchange);

impl ReplicaExchange {
    /// Creates an exchange between `first` and `second`.
    pub fn new(first: EnsembleRef, second: EnsembleRef) -> Result<Self, TpsError> {
        if first == second {
            return Err(TpsError::Config(
                ErrorInfo::new("malformed-pairs", "replica exchange needs two distinct ensembles")
                    .with_context("ensemble", first.label()),
            ));
        }
        let info = MoverInfo::new(
            MoverKind::ReplicaExchange,
            Some(vec![first.clone(), second.clone()]),
        );
        debug!(
            target: INIT_TARGET,
            mover = %info.name(),
            ensembles = ?info.ensemble_labels(),
            "initialized mover"
        );
        Ok(Self {
            info,
            ensembles: [first, second],
        })
    }

    /// The two ensembles, in configuration order.
    pub fn ensembles(&self) -> &[EnsembleRef; 2] {
        &self.ensembles
    }

    /// Swaps the ensemble labels of `first` and `second`.
    ///
    /// Each replica keeps its trajectory and receives the other sample's
    /// ensemble.
    pub fn exchange(&self, first: &Sample, second: &Sample) -> (Sample, Sample) {
        let inputs = vec![first.trajectory.clone(), second.trajectory.clone()];
        let ensembles = [first.ensemble.clone(), second.ensemble.clone()];
        let swapped = |this: &Sample, other: &Sample| {
            let mut details = MoveDetails::started(self.reference(), inputs.clone());
            details.trial = Some(this.trajectory.clone());
            details.result = Some(this.trajectory.clone());
            details.accepted = Some(true);
            details.acceptance_probability = Some(1.0);
            details.extra = DetailsExtra::Exchange(ExchangeDetails {
                ensembles: ensembles.clone(),
                partner: other.replica,
            });
            Sample {
                replica: this.replica,
                trajectory: this.trajectory.clone(),
                ensemble: other.ensemble.clone(),
                details: details.freeze(),
            }
        };
        (swapped(first, second), swapped(second, first))
    }
}

impl PathMover for ReplicaExchange {
    fn info(&self) -> &MoverInfo {
        &self.info
    }

    fn move_state(&self, state: &SampleSet, rng: &mut RngHandle) -> Result<SampleSet, TpsError> {
        let [first_ens, second_ens] = &self.ensembles;
        let first = self.select_sample(state, Some(std::slice::from_ref(first_ens)), rng)?;
        let second = self.select_sample(state, Some(std::slice::from_ref(second_ens)), rng)?;
        if first.replica == second.replica {
            return Err(TpsError::Invariant(
                ErrorInfo::new(
                    "multiple-active-samples",
                    "one replica is active in both exchanged ensembles",
                )
                .with_context("replica", first.replica.to_string()),
            ));
        }
        debug!(
            mover = %self.name(),
            first = %first.replica,
            second = %second.replica,
            "replica exchange"
        );
        let (a, b) = self.exchange(&first, &second);
        Ok(state.apply(vec![a, b], true, self.reference()))
    }
}
