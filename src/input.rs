//! Model files given on the command line.

use std::path::Path;

use anyhow::{Context, Result};

use stochex_expr::Expr;
use stochex_graph::Dtmc;
use stochex_text::{parse_dtmc, parse_sre};

pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Reads a chain in either DTMC text form.
pub fn read_dtmc(path: &Path) -> Result<Dtmc> {
    let text = read_text(path)?;
    parse_dtmc(&text).with_context(|| format!("failed to parse DTMC: {}", path.display()))
}

pub fn read_sre(path: &Path) -> Result<Expr> {
    let text = read_text(path)?;
    parse_sre(text.trim()).with_context(|| format!("failed to parse SRE: {}", path.display()))
}
