mod cli;
mod config;
mod convert;
mod delta_cmd;
mod indices_cmd;
mod input;
mod logging;
mod output;
mod refine_cmd;
mod sample_cmd;
mod to_dtmc_cmd;
mod to_sre_cmd;

use std::process;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    match cli.command {
        Command::ToSre(args) => to_sre_cmd::run(args, &config),
        Command::ToDtmc(args) => to_dtmc_cmd::run(args, &config),
        Command::Indices(args) => indices_cmd::run(args),
        Command::Delta(args) => delta_cmd::run(args, &config),
        Command::Refine(args) => refine_cmd::run(args, &config),
        Command::Sample(args) => sample_cmd::run(args, &config),
    }
}
