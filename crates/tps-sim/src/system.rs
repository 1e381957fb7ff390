use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tps_core::errors::{ErrorInfo, TpsError};
use tps_core::toy::{
    AllInEnsemble, Interval, LengthEnsemble, ToyEngine, TransitionEnsemble, UniformSelector,
};
use tps_core::{
    derive_substream_seed, DynamicsEngine, Ensemble, EnsembleRef, ReplicaId, RngHandle, Snapshot,
    Trajectory,
};
use tps_mcmc::config::load_yaml;
use tps_mcmc::{MoverContext, RunConfig, Sample, SampleSet};
use tracing::{debug, info};

/// Top-level simulation file: a toy system plus the run to perform on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFile {
    pub system: SystemConfig,
    pub run: RunConfig,
}

impl SimFile {
    pub fn load(path: &Path) -> Result<Self, TpsError> {
        load_yaml(path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    pub volumes: IndexMap<String, Interval>,
    pub ensembles: Vec<EnsembleEntry>,
    pub replicas: Vec<ReplicaEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
    #[serde(default)]
    pub kick: f64,
    /// Seed of the streams that generate initial paths, one per replica.
    #[serde(default)]
    pub seed: u64,
}

fn default_dt() -> f64 {
    0.5
}

fn default_max_frames() -> usize {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            max_frames: default_max_frames(),
            kick: 0.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EnsembleEntry {
    Transition {
        label: String,
        from: String,
        to: String,
    },
    AllIn {
        label: String,
        volume: String,
    },
    Length {
        label: String,
        frames: usize,
    },
}

/// Initial path of one replica: explicit first coordinates, or a start
/// point from which the engine generates a path into the ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialPath {
    Explicit {
        path: Vec<f64>,
        #[serde(default = "default_velocity")]
        velocity: f64,
    },
    Generated {
        start: f64,
        #[serde(default = "default_velocity")]
        velocity: f64,
    },
}

fn default_velocity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaEntry {
    pub replica: ReplicaId,
    pub ensemble: String,
    #[serde(flatten)]
    pub initial: InitialPath,
}

/// Engine, ensembles and initial state built from a [`SystemConfig`].
pub struct System {
    pub context: MoverContext,
    pub initial: SampleSet,
}

impl SystemConfig {
    pub fn build(&self) -> Result<System, TpsError> {
        let engine: Arc<dyn DynamicsEngine> = Arc::new(
            ToyEngine::new(self.engine.dt, self.engine.max_frames)
                .with_kick(self.engine.kick),
        );
        let mut context = MoverContext::new(engine.clone(), Arc::new(UniformSelector));
        for entry in &self.ensembles {
            let ensemble = self.ensemble(entry)?;
            debug!(label = %ensemble.label(), "registered ensemble");
            context.register(ensemble);
        }

        let mut samples = Vec::with_capacity(self.replicas.len());
        for entry in &self.replicas {
            let ensemble = context.ensemble(&entry.ensemble)?;
            let mut rng = RngHandle::from_seed(derive_substream_seed(
                self.engine.seed,
                entry.replica.as_raw(),
            ));
            let trajectory =
                initial_path(&entry.initial, &ensemble, engine.as_ref(), &mut rng)?;
            if !ensemble.contains(&trajectory) {
                return Err(TpsError::Config(
                    ErrorInfo::new(
                        "initial-path-outside-ensemble",
                        "initial path does not satisfy its ensemble",
                    )
                    .with_context("replica", entry.replica.to_string())
                    .with_context("ensemble", entry.ensemble.as_str())
                    .with_context("frames", trajectory.len().to_string()),
                ));
            }
            info!(
                replica = %entry.replica,
                ensemble = %entry.ensemble,
                frames = trajectory.len(),
                hash = %trajectory.canonical_hash(),
                "initial sample"
            );
            samples.push(Sample::new(entry.replica, trajectory, ensemble));
        }
        let initial = SampleSet::new(samples);
        initial.check_single_active()?;
        Ok(System { context, initial })
    }

    fn volume(&self, name: &str) -> Result<Interval, TpsError> {
        self.volumes.get(name).copied().ok_or_else(|| {
            TpsError::Config(
                ErrorInfo::new("unknown-volume", "volume name is not defined")
                    .with_context("volume", name),
            )
        })
    }

    fn ensemble(&self, entry: &EnsembleEntry) -> Result<EnsembleRef, TpsError> {
        Ok(match entry {
            EnsembleEntry::Transition { label, from, to } => EnsembleRef::new(
                TransitionEnsemble::new(label.as_str(), self.volume(from)?, self.volume(to)?),
            ),
            EnsembleEntry::AllIn { label, volume } => {
                EnsembleRef::new(AllInEnsemble::new(label.as_str(), self.volume(volume)?))
            }
            EnsembleEntry::Length { label, frames } => {
                EnsembleRef::new(LengthEnsemble::new(label.as_str(), *frames))
            }
        })
    }
}

fn initial_path(
    initial: &InitialPath,
    ensemble: &EnsembleRef,
    engine: &dyn DynamicsEngine,
    rng: &mut RngHandle,
) -> Result<Trajectory, TpsError> {
    match initial {
        InitialPath::Explicit { path, velocity } => Ok(path
            .iter()
            .map(|&x| Snapshot::new(vec![x], vec![*velocity]))
            .collect()),
        InitialPath::Generated { start, velocity } => {
            let seed = Snapshot::new(vec![*start], vec![*velocity]);
            let can_append = |segment: &Trajectory| ensemble.can_append(segment);
            engine.generate(&seed, &[&can_append], rng)
        }
    }
}
