//! Configuration shared by the transformers.

use crate::error::TransformError;

/// Default fixed-point scale of sum weights, 2^30.
pub const DEFAULT_WEIGHT_SCALE: f64 = 1_073_741_824.0;

/// Configuration of the DTMC ⇄ SRE transformations.
///
/// # Example
///
/// ```
/// use stochex_transform::TransformConfig;
///
/// let config = TransformConfig::new()
///     .with_weight_scale(1e6)
///     .with_simplify_output(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct TransformConfig {
    weight_scale: f64,
    simplify_output: bool,
}

impl TransformConfig {
    /// Creates a configuration with defaults.
    ///
    /// Defaults: `weight_scale = 2^30`, `simplify_output = true`.
    pub fn new() -> Self {
        Self {
            weight_scale: DEFAULT_WEIGHT_SCALE,
            simplify_output: true,
        }
    }

    /// Sets the factor that turns branch probabilities into integer sum
    /// weights during elimination.
    pub fn with_weight_scale(mut self, scale: f64) -> Self {
        self.weight_scale = scale;
        self
    }

    /// Sets whether the one-shot SRE → DTMC conversion simplifies its result.
    pub fn with_simplify_output(mut self, simplify: bool) -> Self {
        self.simplify_output = simplify;
        self
    }

    // --- Accessors ---

    /// Returns the weight scale.
    pub fn weight_scale(&self) -> f64 {
        self.weight_scale
    }

    /// Returns whether constructed chains are simplified.
    pub fn simplify_output(&self) -> bool {
        self.simplify_output
    }

    /// Validates this configuration.
    ///
    /// The weight scale must be finite, at least 1, and small enough that a
    /// probability of 1 still fits a `u64` weight.
    pub fn validate(&self) -> Result<(), TransformError> {
        if !self.weight_scale.is_finite() || self.weight_scale < 1.0 {
            return Err(TransformError::InvalidConfig {
                reason: format!(
                    "weight_scale must be finite and at least 1, got {}",
                    self.weight_scale
                ),
            });
        }
        // Sums of rounded weights must stay below u64::MAX.
        if self.weight_scale > 2f64.powi(52) {
            return Err(TransformError::InvalidConfig {
                reason: format!("weight_scale must be at most 2^52, got {}", self.weight_scale),
            });
        }
        Ok(())
    }

    /// Integer weight of a branch with probability `p`, at least 1.
    pub(crate) fn weight(&self, p: f64) -> u64 {
        ((p * self.weight_scale).round() as u64).max(1)
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = TransformConfig::new();
        assert!((cfg.weight_scale() - 1_073_741_824.0).abs() < f64::EPSILON);
        assert!(cfg.simplify_output());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn builder_overrides() {
        let cfg = TransformConfig::new()
            .with_weight_scale(1000.0)
            .with_simplify_output(false);
        assert!((cfg.weight_scale() - 1000.0).abs() < f64::EPSILON);
        assert!(!cfg.simplify_output());
    }

    #[test]
    fn rejects_bad_scales() {
        for scale in [0.0, 0.5, -3.0, f64::NAN, f64::INFINITY, 1e20] {
            let cfg = TransformConfig::new().with_weight_scale(scale);
            assert!(
                matches!(cfg.validate(), Err(TransformError::InvalidConfig { .. })),
                "scale {scale} should be rejected"
            );
        }
    }

    #[test]
    fn weights_round_and_stay_positive() {
        let cfg = TransformConfig::new().with_weight_scale(100.0);
        assert_eq!(cfg.weight(0.234), 23);
        assert_eq!(cfg.weight(0.236), 24);
        assert_eq!(cfg.weight(1e-9), 1);
        assert_eq!(cfg.weight(1.0), 100);
    }

    #[test]
    fn default_matches_new() {
        let a = TransformConfig::default();
        let b = TransformConfig::new();
        assert!((a.weight_scale() - b.weight_scale()).abs() < f64::EPSILON);
        assert_eq!(a.simplify_output(), b.simplify_output());
    }
}
