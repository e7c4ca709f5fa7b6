//! Refine command: splice a sub-DTMC into one edge and print the SRE delta.

use anyhow::{Context, Result, anyhow, bail};
use tracing::{info, info_span};

use stochex_graph::{EdgeKey, GraphChange, RestrictedGraphDelta};
use stochex_transform::{DtmcToSre, Transformer};

use crate::cli::RefineArgs;
use crate::config::StochexConfig;
use crate::{convert, input};

pub fn run(args: RefineArgs, config: &StochexConfig) -> Result<()> {
    let _cmd = info_span!("refine").entered();
    let transform_cfg = convert::build_transform_config(&config.transform)?;

    // 1. Load both chains and resolve the refined edge
    let dtmc = input::read_dtmc(&args.dtmc)?;
    let sub = input::read_dtmc(&args.sub)?;
    let from = dtmc
        .resolve_name(&args.from)
        .ok_or_else(|| anyhow!("unknown node '{}' in {}", args.from, args.dtmc.display()))?;
    let to = dtmc
        .resolve_name(&args.to)
        .ok_or_else(|| anyhow!("unknown node '{}' in {}", args.to, args.dtmc.display()))?;
    let edge = EdgeKey::new(from, to, convert::parse_label(&args.label));
    if !dtmc.contains_edge(&edge) {
        bail!(
            "no edge {} --> {} labeled '{}' in {}",
            args.from,
            args.to,
            args.label,
            args.dtmc.display()
        );
    }

    // 2. Eliminate the outer chain
    let mut transformer =
        DtmcToSre::with_config(dtmc, transform_cfg).context("elimination failed")?;
    println!("sre: {}", transformer.target());

    // 3. Refine and report
    let mut refine = RestrictedGraphDelta::new();
    refine.add_change(edge, sub);
    let delta = transformer
        .apply_delta(&GraphChange::Refine(refine))
        .context("refinement failed")?;
    info!(changes = delta.len(), "edge refined");

    print!("{delta}");
    println!("sre: {}", transformer.target());
    println!("dtmc: {}", transformer.source());
    Ok(())
}
