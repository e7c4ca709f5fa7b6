//! To-sre command: eliminate a DTMC file into an SRE.

use anyhow::{Context, Result};
use tracing::{info, info_span};

use stochex_transform::to_sre;

use crate::cli::ToSreArgs;
use crate::config::StochexConfig;
use crate::{convert, input};

pub fn run(args: ToSreArgs, config: &StochexConfig) -> Result<()> {
    let _cmd = info_span!("to_sre").entered();
    let transform_cfg = convert::build_transform_config(&config.transform)?;

    let dtmc = input::read_dtmc(&args.dtmc)?;
    info!(
        nodes = dtmc.node_count(),
        edges = dtmc.edge_count(),
        "chain loaded"
    );

    let sre = to_sre(&dtmc, &transform_cfg).context("elimination failed")?;
    info!(size = sre.size(), "expression extracted");
    println!("{sre}");
    Ok(())
}
