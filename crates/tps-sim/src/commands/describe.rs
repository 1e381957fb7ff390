use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tps_mcmc::describe_tree;

use crate::system::SimFile;

#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// YAML file describing the system and the mover tree.
    #[arg(long)]
    pub config: PathBuf,
}

pub fn run(args: &DescribeArgs) -> Result<(), Box<dyn Error>> {
    let file = SimFile::load(&args.config)?;
    let system = file.system.build()?;
    let root = file.run.mover.build(&system.context)?;
    println!("{}", describe_tree(root.as_ref()));
    for sample in system.initial.iter() {
        println!(
            "{} {} frames={} hash={}",
            sample.replica,
            sample.ensemble.label(),
            sample.trajectory.len(),
            sample.trajectory.canonical_hash()
        );
    }
    Ok(())
}
