use tps_core::errors::ErrorInfo;
use tps_core::{EnsembleRef, RngHandle, TpsError};
use tracing::{debug, info};

use crate::details::{DetailsExtra, HopDetails, MoveDetails};
use crate::mover::{mover_builders, MoverInfo, MoverKind, PathMover, INIT_TARGET};
use crate::sample::{Sample, SampleSet};

/// Groups a flat list `[a, b, c, d]` into pairs `[(a, b), (c, d)]`.
///
/// Fails when the list is empty or has odd length.
pub fn make_list_of_pairs<T: Clone>(flat: &[T]) -> Result<Vec<(T, T)>, TpsError> {
    if flat.is_empty() {
        return Err(TpsError::Config(ErrorInfo::new(
            "malformed-pairs",
            "pair list is empty",
        )));
    }
    if flat.len() % 2 != 0 {
        return Err(TpsError::Config(
            ErrorInfo::new("malformed-pairs", "flattened list length not divisible by 2")
                .with_context("length", flat.len().to_string()),
        ));
    }
    Ok(flat
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

/// Relabels a sample from one ensemble to another without new dynamics.
///
/// The hop is accepted when the existing trajectory already satisfies the
/// target ensemble. The optional `bias` weights are validated and kept for a
/// future asymmetric-hop correction but do not enter the acceptance test.
pub struct EnsembleHopMover {
    info: MoverInfo,
    pairs: Vec<(EnsembleRef, EnsembleRef)>,
    bias: Option<Vec<f64>>,
}

mover_builders!(EnsembleHopMover);

impl EnsembleHopMover {
    /// Creates a hop mover over ordered `(from, to)` pairs.
    pub fn new(pairs: Vec<(EnsembleRef, EnsembleRef)>) -> Result<Self, TpsError> {
        if pairs.is_empty() {
            return Err(TpsError::Config(ErrorInfo::new(
                "malformed-pairs",
                "ensemble hop needs at least one (from, to) pair",
            )));
        }
        if let Some((from, _)) = pairs.iter().find(|(from, to)| from == to) {
            return Err(TpsError::Config(
                ErrorInfo::new("malformed-pairs", "hop pair starts and ends in one ensemble")
                    .with_context("ensemble", from.label()),
            ));
        }
        let mut from: Vec<EnsembleRef> = Vec::new();
        for (ensemble, _) in &pairs {
            if !from.contains(ensemble) {
                from.push(ensemble.clone());
            }
        }
        let info = MoverInfo::new(MoverKind::EnsembleHop, Some(from));
        debug!(
            target: INIT_TARGET,
            mover = %info.name(),
            pairs = ?pairs
                .iter()
                .map(|(a, b)| format!("{}->{}", a.label(), b.label()))
                .collect::<Vec<_>>(),
            "initialized mover"
        );
        Ok(Self {
            info,
            pairs,
            bias: None,
        })
    }

    /// Creates a hop mover from a flat `[from, to, from, to, ...]` list.
    pub fn from_flat(ensembles: &[EnsembleRef]) -> Result<Self, TpsError> {
        Self::new(make_list_of_pairs(ensembles)?)
    }

    /// Attaches one positive bias weight per pair.
    pub fn with_bias(mut self, bias: Vec<f64>) -> Result<Self, TpsError> {
        if bias.len() != self.pairs.len() {
            return Err(TpsError::Config(
                ErrorInfo::new("bias-mismatch", "one bias weight is required per pair")
                    .with_context("pairs", self.pairs.len().to_string())
                    .with_context("weights", bias.len().to_string()),
            ));
        }
        if bias.iter().any(|w| !(*w > 0.0 && w.is_finite())) {
            return Err(TpsError::Config(ErrorInfo::new(
                "bias-mismatch",
                "bias weights must be positive and finite",
            )));
        }
        debug!(target: INIT_TARGET, mover = %self.info.name(), bias = ?bias, "attached bias");
        self.bias = Some(bias);
        Ok(self)
    }

    /// Configured `(from, to)` pairs.
    pub fn pairs(&self) -> &[(EnsembleRef, EnsembleRef)] {
        &self.pairs
    }

    /// Configured bias weights, if any.
    pub fn bias(&self) -> Option<&[f64]> {
        self.bias.as_deref()
    }
}

impl PathMover for EnsembleHopMover {
    fn info(&self) -> &MoverInfo {
        &self.info
    }

    fn move_state(&self, state: &SampleSet, rng: &mut RngHandle) -> Result<SampleSet, TpsError> {
        let legal = self.legal_sample_set(state, None);
        let legal_pairs: Vec<&(EnsembleRef, EnsembleRef)> = self
            .pairs
            .iter()
            .filter(|(from, _)| legal.iter().any(|sample| &sample.ensemble == from))
            .collect();
        debug!(
            mover = %self.name(),
            legal_samples = legal.len(),
            legal_pairs = legal_pairs.len(),
            "ensemble hop candidates"
        );
        if legal_pairs.is_empty() {
            return Err(TpsError::empty_selection(self.name()));
        }
        let (from, to) = legal_pairs[rng.index(legal_pairs.len())];
        info!(
            "Attempting ensemble hop from {} to {}",
            from.label(),
            to.label()
        );

        let sample = self.select_sample(state, Some(std::slice::from_ref(from)), rng)?;
        let trajectory = sample.trajectory.clone();
        let accepted = to.contains(&trajectory);
        let result_ensemble = if accepted { to.clone() } else { from.clone() };

        let mut details = MoveDetails::started(self.reference(), vec![trajectory.clone()]);
        details.trial = Some(trajectory.clone());
        details.result = Some(trajectory.clone());
        details.accepted = Some(accepted);
        details.acceptance_probability = Some(if accepted { 1.0 } else { 0.0 });
        details.extra = DetailsExtra::Hop(HopDetails {
            initial_ensemble: from.clone(),
            trial_ensemble: to.clone(),
            result_ensemble: result_ensemble.clone(),
        });

        let new_sample = Sample {
            replica: sample.replica,
            trajectory,
            ensemble: result_ensemble,
            details: details.freeze(),
        };
        Ok(state.apply(vec![new_sample], accepted, self.reference()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_from_flat_list() {
        let pairs = make_list_of_pairs(&[1, 2, 3, 4]).unwrap();
        assert_eq!(pairs, vec![(1, 2), (3, 4)]);
    }

    #[test]
    fn odd_flat_list_is_rejected() {
        let err = make_list_of_pairs(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.code(), "malformed-pairs");
        assert!(matches!(err, TpsError::Config(_)));
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(make_list_of_pairs::<u8>(&[]).is_err());
    }
}
