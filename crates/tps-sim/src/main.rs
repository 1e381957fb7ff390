use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::{
    describe::{self, DescribeArgs},
    run::{self, RunArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;
mod system;

#[derive(Parser, Debug)]
#[command(name = "tps-sim", about = "Transition path sampling CLI for toy systems")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sampler and emit a JSON summary.
    Run(RunArgs),
    /// Print the mover tree and the initial samples.
    Describe(DescribeArgs),
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tps_mcmc=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn dispatch(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Describe(args) => describe::run(&args),
    }
}

fn main() -> ExitCode {
    init_tracing();
    match dispatch(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
