//! Delta command: apply SRE deltas incrementally and print the DTMC deltas.

use anyhow::{Context, Result, bail};
use tracing::{info, info_span};

use stochex_text::parse_expr_delta;
use stochex_transform::{SreToDtmc, Transformer};

use crate::cli::DeltaArgs;
use crate::config::StochexConfig;
use crate::{convert, input};

pub fn run(args: DeltaArgs, config: &StochexConfig) -> Result<()> {
    let _cmd = info_span!("delta").entered();
    let transform_cfg = convert::build_transform_config(&config.transform)?;

    // 1. Build the chain once
    let sre = input::read_sre(&args.sre)?;
    let mut transformer =
        SreToDtmc::with_config(sre, transform_cfg).context("failed to build chain")?;
    println!("dtmc: {}", transformer.target());

    // 2. Apply each delta against the expression left by the previous one
    let script = input::read_text(&args.delta)?;
    let steps = sections(&script);
    if steps.is_empty() {
        bail!("delta file is empty: {}", args.delta.display());
    }
    for (i, section) in steps.iter().enumerate() {
        let step = i + 1;
        let delta = parse_expr_delta(transformer.source(), section)
            .with_context(|| format!("failed to parse delta {step}"))?;
        let graph_delta = transformer
            .apply_delta(&delta)
            .with_context(|| format!("failed to apply delta {step}"))?;
        info!(step, changes = delta.len(), "delta applied");

        println!("--- delta {step}");
        println!("sre: {}", transformer.source());
        print!("{graph_delta}");
        println!("dtmc: {}", transformer.target());
    }
    Ok(())
}

/// Splits a delta file at `---` lines, dropping blank sections.
fn sections(script: &str) -> Vec<String> {
    let mut out = vec![String::new()];
    for line in script.lines() {
        if line.trim() == "---" {
            out.push(String::new());
        } else if let Some(current) = out.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }
    out.retain(|s| !s.trim().is_empty());
    out
}
