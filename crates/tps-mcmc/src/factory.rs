use std::sync::Arc;

use tps_core::errors::ErrorInfo;
use tps_core::{DynamicsEngine, EnsembleRef, ShootingPointSelector, TpsError};

use crate::combinators::RandomChoiceMover;
use crate::exchange::ReplicaExchange;
use crate::mover::{PathMover, ReplicaFilter};
use crate::reversal::PathReversalMover;
use crate::shoot::ShootMover;

/// Convenience constructors for the common mover sets of a TPS/TIS setup.
pub struct PathMoverFactory;

impl PathMoverFactory {
    /// Forward or backward shooting with equal probability, sharing one
    /// selector, ensemble filter and replica filter.
    pub fn one_way_shooting(
        selector: Arc<dyn ShootingPointSelector>,
        engine: Arc<dyn DynamicsEngine>,
        ensembles: Option<Vec<EnsembleRef>>,
        replicas: ReplicaFilter,
    ) -> Result<RandomChoiceMover, TpsError> {
        let forward = ShootMover::forward(selector.clone(), engine.clone(), ensembles.clone())
            .with_replicas(replicas.clone());
        let backward = ShootMover::backward(selector, engine, ensembles.clone())
            .with_replicas(replicas.clone());
        let movers: Vec<Arc<dyn PathMover>> = vec![Arc::new(forward), Arc::new(backward)];
        let mut mover = RandomChoiceMover::new(movers)?
            .named("OneWayShootingMover")
            .with_replicas(replicas);
        if let Some(ensembles) = ensembles {
            mover = mover.with_ensembles(ensembles);
        }
        Ok(mover)
    }

    /// One one-way shooting mover per ensemble.
    ///
    /// `selectors` holds either a single selector shared by every ensemble
    /// or exactly one selector per ensemble.
    pub fn one_way_shooting_set(
        selectors: &[Arc<dyn ShootingPointSelector>],
        engine: Arc<dyn DynamicsEngine>,
        ensembles: &[EnsembleRef],
    ) -> Result<Vec<Arc<dyn PathMover>>, TpsError> {
        let per_ensemble: Vec<Arc<dyn ShootingPointSelector>> = match selectors.len() {
            1 => vec![selectors[0].clone(); ensembles.len()],
            n if n == ensembles.len() => selectors.to_vec(),
            n => {
                return Err(TpsError::Config(
                    ErrorInfo::new(
                        "selector-mismatch",
                        "need one selector or one selector per ensemble",
                    )
                    .with_context("selectors", n.to_string())
                    .with_context("ensembles", ensembles.len().to_string()),
                ))
            }
        };
        per_ensemble
            .into_iter()
            .zip(ensembles)
            .map(|(selector, ensemble)| {
                let mover = Self::one_way_shooting(
                    selector,
                    engine.clone(),
                    Some(vec![ensemble.clone()]),
                    ReplicaFilter::All,
                )?
                .named(format!("OneWayShootingMover {}", ensemble.label()));
                Ok(Arc::new(mover) as Arc<dyn PathMover>)
            })
            .collect()
    }

    /// A replica exchange between each adjacent pair of `ensembles`.
    pub fn nearest_neighbor_repex_set(
        ensembles: &[EnsembleRef],
    ) -> Result<Vec<Arc<dyn PathMover>>, TpsError> {
        ensembles
            .windows(2)
            .map(|pair| {
                let mover = ReplicaExchange::new(pair[0].clone(), pair[1].clone())?;
                Ok(Arc::new(mover) as Arc<dyn PathMover>)
            })
            .collect()
    }

    /// One path reversal mover per ensemble.
    pub fn path_reversal_set(ensembles: &[EnsembleRef]) -> Vec<Arc<dyn PathMover>> {
        ensembles
            .iter()
            .map(|ensemble| {
                Arc::new(PathReversalMover::new(Some(vec![ensemble.clone()])))
                    as Arc<dyn PathMover>
            })
            .collect()
    }
}
