use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level stochex configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StochexConfig {
    /// Global RNG seed.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Transformation settings.
    #[serde(default)]
    pub transform: TransformToml,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformToml {
    #[serde(default = "default_weight_scale")]
    pub weight_scale: f64,
    #[serde(default = "default_true")]
    pub simplify: bool,
}

impl Default for TransformToml {
    fn default() -> Self {
        Self {
            weight_scale: default_weight_scale(),
            simplify: true,
        }
    }
}

fn default_weight_scale() -> f64 {
    stochex_transform::DEFAULT_WEIGHT_SCALE
}
fn default_true() -> bool {
    true
}

/// Reads the TOML file at `path`, or the defaults when no file is given.
pub fn load(path: Option<&Path>) -> Result<StochexConfig> {
    let Some(path) = path else {
        return Ok(StochexConfig::default());
    };
    let toml_str = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&toml_str).context("failed to parse TOML config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: StochexConfig = toml::from_str("").unwrap();
        assert_eq!(config.seed, None);
        assert_eq!(
            config.transform.weight_scale,
            stochex_transform::DEFAULT_WEIGHT_SCALE
        );
        assert!(config.transform.simplify);
    }

    #[test]
    fn transform_table_is_read() {
        let config: StochexConfig = toml::from_str(
            "seed = 7\n[transform]\nweight_scale = 1000.0\nsimplify = false\n",
        )
        .unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.transform.weight_scale, 1000.0);
        assert!(!config.transform.simplify);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<StochexConfig>("[transform]\nscale = 2.0\n").is_err());
        assert!(toml::from_str::<StochexConfig>("verbose = true\n").is_err());
    }

    #[test]
    fn missing_file_has_path_in_error() {
        let err = load(Some(Path::new("/nonexistent/stochex.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/stochex.toml"));
    }
}
