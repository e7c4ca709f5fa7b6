//! Subtree replacements addressed by [`ExprId`].

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::expr::{Expr, ExprId};
use crate::visit::Visitor;

/// Ordered mapping from existing subtrees to their replacements.
#[derive(Debug, Clone, Default)]
pub struct ExprDelta {
    changes: Vec<(ExprId, Expr)>,
}

impl ExprDelta {
    /// Creates an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps the subtree with id `original` to `replacement`. A later change
    /// for the same id overrides the earlier one in place.
    pub fn add_change(&mut self, original: ExprId, replacement: Expr) {
        match self.changes.iter_mut().find(|(id, _)| *id == original) {
            Some(slot) => slot.1 = replacement,
            None => self.changes.push((original, replacement)),
        }
    }

    /// Changes in insertion order.
    pub fn changes(&self) -> &[(ExprId, Expr)] {
        &self.changes
    }

    /// The replacement registered for `id`.
    pub fn replacement(&self, id: ExprId) -> Option<&Expr> {
        self.changes
            .iter()
            .find(|(original, _)| *original == id)
            .map(|(_, e)| e)
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Rewrites every subtree of `expr` whose id has a replacement.
    ///
    /// Runs as one traversal; replacements are inserted as given and are not
    /// searched again.
    pub fn apply(&self, expr: &Expr) -> Expr {
        if self.changes.is_empty() {
            return expr.clone();
        }
        let mut replacer = Replacer {
            targets: self.changes.iter().map(|(id, e)| (*id, e)).collect(),
            hits: 0,
        };
        let out = expr.traverse(&mut replacer);
        debug!(changes = self.changes.len(), hits = replacer.hits, "applied expression delta");
        out
    }
}

struct Replacer<'a> {
    targets: HashMap<ExprId, &'a Expr>,
    hits: usize,
}

impl Visitor for Replacer<'_> {
    fn post_order(&mut self, expr: Expr, _weight: Option<u64>) -> Expr {
        match self.targets.get(&expr.id()) {
            Some(replacement) => {
                self.hits += 1;
                (*replacement).clone()
            }
            None => expr,
        }
    }
}

/// One `id > replacement` line per change.
impl fmt::Display for ExprDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, replacement) in &self.changes {
            writeln!(f, "{id} > {replacement}")?;
        }
        Ok(())
    }
}
