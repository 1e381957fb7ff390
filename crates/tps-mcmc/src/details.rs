use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tps_core::{EnsembleRef, ReplicaId, ShootingPoint, TrajectoryRef};

use crate::mover::MoverRef;

/// Direction in which a shooting move regenerates the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShootDirection {
    /// Keep the prefix `[0:i]` and regenerate the tail.
    Forward,
    /// Keep the suffix `[i+1:]` and regenerate the head.
    Backward,
}

impl ShootDirection {
    /// Lowercase label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShootDirection::Forward => "forward",
            ShootDirection::Backward => "backward",
        }
    }
}

/// Extra record kept by shooting moves.
#[derive(Debug, Clone, PartialEq)]
pub struct ShootingDetails {
    /// Direction of the regeneration.
    pub direction: ShootDirection,
    /// Trajectory the move started from.
    pub start: TrajectoryRef,
    /// Shooting point on `start`.
    pub start_point: ShootingPoint,
    /// The same frame described on the trial trajectory, when one exists.
    pub final_point: Option<ShootingPoint>,
    /// Whether the full trial satisfied the sample's ensemble.
    pub trial_is_in_ensemble: bool,
}

/// Extra record kept by ensemble hops.
#[derive(Debug, Clone, PartialEq)]
pub struct HopDetails {
    /// Ensemble the sample started in.
    pub initial_ensemble: EnsembleRef,
    /// Ensemble the hop attempted to reach.
    pub trial_ensemble: EnsembleRef,
    /// Ensemble the sample ended in.
    pub result_ensemble: EnsembleRef,
}

/// Extra record kept by replica exchanges.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeDetails {
    /// The two ensembles whose labels were swapped, in mover order.
    pub ensembles: [EnsembleRef; 2],
    /// Replica on the other side of the swap.
    pub partner: ReplicaId,
}

/// Mover-specific part of a [`MoveDetails`] record.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DetailsExtra {
    /// Plain record, used for initial samples and path reversal.
    #[default]
    None,
    /// Shooting move record.
    Shooting(ShootingDetails),
    /// Ensemble hop record.
    Hop(HopDetails),
    /// Replica exchange record.
    Exchange(ExchangeDetails),
}

/// Audit record of one move attempt on one replica.
///
/// Built by the mover performing the attempt and frozen behind an `Arc` once
/// the mover returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveDetails {
    /// Trajectories read by the move.
    pub inputs: Vec<TrajectoryRef>,
    /// Proposed trajectory, if the move generated one.
    pub trial: Option<TrajectoryRef>,
    /// Trajectory carried by the resulting sample.
    pub result: Option<TrajectoryRef>,
    /// Acceptance probability, when the mover computed one.
    pub acceptance_probability: Option<f64>,
    /// Outcome of the acceptance test.
    pub accepted: Option<bool>,
    /// Movers that produced this particular sample.
    pub mover_path: Vec<MoverRef>,
    /// Mover-specific fields.
    pub extra: DetailsExtra,
}

impl MoveDetails {
    /// Starts a record for `mover` reading `inputs`.
    pub fn started(mover: MoverRef, inputs: Vec<TrajectoryRef>) -> Self {
        Self {
            inputs,
            accepted: Some(false),
            mover_path: vec![mover],
            ..Self::default()
        }
    }

    /// Whether the move was accepted.
    pub fn is_accepted(&self) -> bool {
        self.accepted == Some(true)
    }

    /// Shooting record, if this was a shooting move.
    pub fn shooting(&self) -> Option<&ShootingDetails> {
        match &self.extra {
            DetailsExtra::Shooting(details) => Some(details),
            _ => None,
        }
    }

    /// Hop record, if this was an ensemble hop.
    pub fn hop(&self) -> Option<&HopDetails> {
        match &self.extra {
            DetailsExtra::Hop(details) => Some(details),
            _ => None,
        }
    }

    /// Exchange record, if this was a replica exchange.
    pub fn exchange(&self) -> Option<&ExchangeDetails> {
        match &self.extra {
            DetailsExtra::Exchange(details) => Some(details),
            _ => None,
        }
    }

    /// Freezes the record for sharing between samples.
    pub fn freeze(self) -> Arc<MoveDetails> {
        Arc::new(self)
    }
}
