//! To-dtmc command: construct a DTMC from an SRE file.

use anyhow::{Context, Result};
use tracing::{info, info_span};

use stochex_transform::to_dtmc;

use crate::cli::{OutputFormat, ToDtmcArgs};
use crate::config::StochexConfig;
use crate::output::DtmcJson;
use crate::{convert, input};

pub fn run(args: ToDtmcArgs, config: &StochexConfig) -> Result<()> {
    let _cmd = info_span!("to_dtmc").entered();
    let transform_cfg = convert::build_transform_config(&config.transform)?;

    let sre = input::read_sre(&args.sre)?;
    info!(size = sre.size(), "expression loaded");

    let dtmc = to_dtmc(&sre, &transform_cfg).context("construction failed")?;
    info!(
        nodes = dtmc.node_count(),
        edges = dtmc.edge_count(),
        "chain constructed"
    );

    match args.format {
        OutputFormat::Text => println!("{dtmc}"),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&DtmcJson::from_dtmc(&dtmc))
                .context("failed to serialize chain")?;
            println!("{json}");
        }
    }
    Ok(())
}
