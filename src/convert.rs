//! Pure conversion functions: TOML config structs -> crate API config types.

use anyhow::{Context, Result};

use stochex_transform::TransformConfig;

use crate::config::TransformToml;

/// Builds a validated [`TransformConfig`] from the TOML transform table.
pub fn build_transform_config(transform: &TransformToml) -> Result<TransformConfig> {
    let cfg = TransformConfig::new()
        .with_weight_scale(transform.weight_scale)
        .with_simplify_output(transform.simplify);
    cfg.validate().context("invalid [transform] config")?;
    Ok(cfg)
}

/// Maps the `ε` token to the empty label used for ε-edges.
pub fn parse_label(label: &str) -> &str {
    if label == "ε" { "" } else { label }
}
