use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::json;
use tps_mcmc::{run as run_chain, run_independent, RunSummary};
use tracing::info;

use crate::system::SimFile;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML file describing the system and the mover tree.
    #[arg(long)]
    pub config: PathBuf,
    /// Output directory for `summary.json`; the summary goes to stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Number of independent chains to run from the initial state.
    #[arg(long, default_value_t = 1)]
    pub chains: usize,
    /// Override the master seed from the configuration.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Maximum number of worker threads for independent chains.
    #[arg(long)]
    pub workers: Option<usize>,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let file = SimFile::load(&args.config)?;
    let system = file.system.build()?;
    let root = file.run.mover.build(&system.context)?;
    let mut chain = file.run.chain();
    if let Some(seed) = args.seed {
        chain.seed_policy.master_seed = seed;
    }
    if let Some(workers) = args.workers {
        chain.workers = workers;
    }
    info!(
        config = %args.config.display(),
        chains = args.chains,
        workers = chain.workers,
        steps = chain.steps,
        "running sampler"
    );

    let summaries: Vec<RunSummary> = if args.chains <= 1 {
        vec![run_chain(root.as_ref(), &system.initial, &chain)?.summary]
    } else {
        run_independent(root.as_ref(), &system.initial, &chain, args.chains)?
            .into_iter()
            .map(|outcome| outcome.summary)
            .collect()
    };

    let payload = json!({
        "config": args.config.display().to_string(),
        "chains": summaries,
    });
    match &args.out {
        Some(dir) => {
            let path = dir.join("summary.json");
            write_json(&path, &payload)?;
            println!("{}", json!({ "summary": path.display().to_string() }));
        }
        None => println!("{}", serde_json::to_string_pretty(&payload)?),
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
