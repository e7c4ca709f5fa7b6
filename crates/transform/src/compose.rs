//! Expression building with distribution-preserving rewrites only.

use std::collections::HashSet;

use stochex_expr::{Expr, ExprId, ExprKind};

use crate::config::TransformConfig;
use crate::error::TransformError;

/// Builds the expressions of the eliminator.
///
/// Concatenations are flattened and ε dropped, sum branches with equal
/// expressions are merged, and a Kleene over ε is ε. Nested Kleene
/// expressions are never fused.
///
/// With a protected id set, leaves in that set are never dropped, and only
/// branches that are the very same subtree are merged, so every protected
/// leaf survives into the result.
pub(crate) struct Composer<'a> {
    config: &'a TransformConfig,
    protected: Option<&'a HashSet<ExprId>>,
}

impl<'a> Composer<'a> {
    pub(crate) fn new(config: &'a TransformConfig) -> Self {
        Self {
            config,
            protected: None,
        }
    }

    pub(crate) fn protecting(config: &'a TransformConfig, protected: &'a HashSet<ExprId>) -> Self {
        Self {
            config,
            protected: Some(protected),
        }
    }

    fn droppable(&self, expr: &Expr) -> bool {
        expr.is_epsilon() && self.protected.is_none_or(|p| !p.contains(&expr.id()))
    }

    fn mergeable(&self, a: &Expr, b: &Expr) -> bool {
        match self.protected {
            Some(_) => a.id() == b.id(),
            None => a.deep_equals(b),
        }
    }

    /// Sequential composition of `parts`.
    pub(crate) fn concat(&self, parts: Vec<Expr>) -> Result<Expr, TransformError> {
        let mut flat = Vec::with_capacity(parts.len());
        for part in parts {
            match part.kind() {
                ExprKind::Concat(children) => {
                    flat.extend(children.iter().filter(|c| !self.droppable(c)).cloned());
                }
                _ if self.droppable(&part) => {}
                _ => flat.push(part),
            }
        }
        match flat.len() {
            0 => Ok(Expr::epsilon()),
            1 => Ok(flat.swap_remove(0)),
            _ => Ok(Expr::concat(flat)?),
        }
    }

    /// Weighted choice between `branches`, each given with its probability.
    ///
    /// Probabilities are normalized and scaled to integer weights.
    pub(crate) fn sum(&self, branches: Vec<(Expr, f64)>) -> Result<Expr, TransformError> {
        let mut merged: Vec<(Expr, f64)> = Vec::with_capacity(branches.len());
        for (expr, p) in branches {
            if p <= 0.0 {
                continue;
            }
            match merged.iter_mut().find(|(m, _)| self.mergeable(m, &expr)) {
                Some(slot) => slot.1 += p,
                None => merged.push((expr, p)),
            }
        }
        let total: f64 = merged.iter().map(|(_, p)| p).sum();
        if merged.is_empty() || total <= 0.0 {
            return Err(TransformError::Internal {
                reason: "sum of branches without probability".to_string(),
            });
        }
        if merged.len() == 1 {
            return Ok(merged.swap_remove(0).0);
        }
        let weighted = merged
            .into_iter()
            .map(|(e, p)| (e, self.config.weight(p / total)))
            .collect();
        Ok(Expr::sum(weighted)?)
    }

    /// Repetition of `child` with continuation probability `rate`.
    pub(crate) fn kleene(&self, child: Expr, rate: f64) -> Result<Expr, TransformError> {
        let rate = rate.clamp(0.0, 1.0);
        if rate < 1.0 && self.droppable(&child) {
            return Ok(Expr::epsilon());
        }
        Ok(Expr::kleene(child, rate)?)
    }
}
