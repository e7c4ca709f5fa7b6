//! Incremental SRE → DTMC transformation.

use std::collections::HashSet;

use stochex_expr::{Expr, ExprDelta};
use stochex_graph::{Dtmc, Edge, GraphDelta, NodeId};
use tracing::{debug, instrument};

use crate::Transformer;
use crate::config::TransformConfig;
use crate::construct::{Builder, Canvas, Reuse, check_weights};
use crate::error::TransformError;
use crate::fragments::FragmentTree;
use crate::recorder::Recorder;

/// Keeps a chain in step with an expression that is edited by
/// [`ExprDelta`]s.
///
/// Every subtree of the expression owns a fragment of the chain, with its
/// own entry and exit nodes. An edit cuts the old fragment out, builds the
/// replacement and re-points the boundary edges, so the rest of the chain is
/// left alone. Fragments of subtrees pasted into the replacement from inside
/// the replaced subtree are moved rather than rebuilt.
///
/// The chain is not simplified; [`crate::to_dtmc`] builds the compact form.
///
/// # Example
///
/// ```
/// use stochex_expr::{Expr, ExprDelta};
/// use stochex_transform::{SreToDtmc, Transformer};
///
/// let a = Expr::atomic("a");
/// let e = Expr::concat(vec![a.clone(), Expr::atomic("b")]).unwrap();
/// let mut t = SreToDtmc::new(e).unwrap();
///
/// let mut delta = ExprDelta::new();
/// delta.add_change(a.id(), Expr::atomic("c"));
/// let graph_delta = t.apply_delta(&delta).unwrap();
///
/// assert!(!graph_delta.is_empty());
/// assert!((t.target().string_probability("cb") - 1.0).abs() < 1e-12);
/// assert_eq!(t.source().to_string(), "(c : b)");
/// ```
#[derive(Debug, Clone)]
pub struct SreToDtmc {
    expr: Expr,
    dtmc: Dtmc,
    tree: FragmentTree,
    config: TransformConfig,
}

impl SreToDtmc {
    /// Builds the chain of `expr` with the default configuration.
    pub fn new(expr: Expr) -> Result<Self, TransformError> {
        Self::with_config(expr, TransformConfig::default())
    }

    /// Builds the chain of `expr`.
    #[instrument(skip_all, fields(size = expr.size()))]
    pub fn with_config(expr: Expr, config: TransformConfig) -> Result<Self, TransformError> {
        config.validate()?;
        let mut tree = FragmentTree::default();
        let mut canvas = Canvas::new();
        let piece = Builder::isolated(&mut canvas, &mut tree, Reuse::default()).build(&expr)?;
        let root = piece.fragment.ok_or_else(|| TransformError::Internal {
            reason: "isolated build returned no fragment".to_string(),
        })?;
        tree.set_root(root);
        let dtmc = canvas.finish(&piece)?;
        debug!(
            nodes = dtmc.node_count(),
            edges = dtmc.edge_count(),
            fragments = tree.live_count(),
            "built chain"
        );
        Ok(Self {
            expr,
            dtmc,
            tree,
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Replaces the fragment `old` by a fresh one for `replacement`.
    ///
    /// Nodes of retired fragments are detached at once but only removed by
    /// the caller once all changes are in, so no slot is reused within one
    /// delta. The boundary edges of `old` are collected before anything is
    /// cut and re-pointed to the new fragment afterwards.
    fn replace(
        &mut self,
        rec: &mut Recorder<'_>,
        old: usize,
        replacement: &Expr,
        doomed: &mut Vec<NodeId>,
    ) -> Result<(), TransformError> {
        let (initial, finals, parent) = {
            let f = self.tree.get(old);
            (f.initial, f.finals.clone(), f.parent)
        };
        let is_root = self.tree.root() == Some(old);

        let entering: Vec<Edge> = rec.dtmc().incoming(initial)?;
        let mut leaving: Vec<Edge> = Vec::new();
        for &f in &finals {
            leaving.extend(rec.dtmc().outgoing(f)?);
        }
        if is_root {
            for &f in &finals {
                rec.unmark_final(f)?;
            }
        }

        let mut reuse = Reuse::default();
        for id in replacement.ids() {
            let inside = self
                .tree
                .live(id)
                .into_iter()
                .find(|&i| self.tree.is_within(i, old));
            if let Some(index) = inside {
                reuse.offer(id, index, self.tree.ancestors(index));
            }
        }
        let reused = reuse.plan(replacement);

        // Cut the old wiring: retired nodes lose all their edges, reused
        // fragments their boundary edges.
        let retired = self.tree.subtree_except(old, &reused);
        for &index in &retired {
            for &node in &self.tree.get(index).own_nodes {
                rec.detach(node)?;
                doomed.push(node);
            }
        }
        for &index in reused.iter().filter(|&&i| i != old) {
            let f = self.tree.get(index);
            let mut keys: Vec<_> = rec
                .dtmc()
                .incoming(f.initial)?
                .into_iter()
                .map(|e| e.key)
                .collect();
            for &g in &f.finals {
                keys.extend(rec.dtmc().outgoing(g)?.into_iter().map(|e| e.key));
            }
            for key in keys {
                rec.remove_edge(&key)?;
            }
        }

        let piece = Builder::isolated(&mut *rec, &mut self.tree, reuse).build(replacement)?;
        let new = piece.fragment.ok_or_else(|| TransformError::Internal {
            reason: "isolated build returned no fragment".to_string(),
        })?;

        for edge in entering {
            if edge.to() == piece.initial {
                continue;
            }
            if rec.dtmc().contains_edge(&edge.key) {
                rec.remove_edge(&edge.key)?;
            }
            rec.add_edge(edge.from(), piece.initial, edge.label(), edge.probability)?;
        }
        for edge in leaving {
            if piece.finals.contains(&edge.from()) {
                continue;
            }
            if rec.dtmc().contains_edge(&edge.key) {
                rec.remove_edge(&edge.key)?;
            }
            for &g in &piece.finals {
                rec.add_edge(g, edge.to(), edge.label(), edge.probability)?;
            }
        }

        for index in retired {
            self.tree.retire(index);
        }
        self.tree.replace(parent, old, new);

        if is_root {
            rec.make_initial(piece.initial)?;
            for &g in &piece.finals {
                rec.make_final(g)?;
            }
        }
        Ok(())
    }
}

impl Transformer for SreToDtmc {
    type Source = Expr;
    type Target = Dtmc;
    type SourceDelta = ExprDelta;
    type TargetDelta = GraphDelta;

    fn source(&self) -> &Expr {
        &self.expr
    }

    fn target(&self) -> &Dtmc {
        &self.dtmc
    }

    /// Applies `delta` to the expression and returns the matching chain edit.
    ///
    /// A change whose subtree lies inside another changed subtree is dropped,
    /// as [`ExprDelta::apply`] does. Every id must name a subtree of the
    /// current expression, and no replacement may contain a sum without
    /// weight; otherwise nothing changes.
    #[instrument(skip_all, fields(changes = delta.len()))]
    fn apply_delta(&mut self, delta: &ExprDelta) -> Result<GraphDelta, TransformError> {
        let targeted: HashSet<_> = delta.changes().iter().map(|(id, _)| *id).collect();
        let mut jobs = Vec::new();
        for (id, replacement) in delta.changes() {
            let live = self.tree.live(*id);
            if live.is_empty() {
                return Err(TransformError::UnknownSubtree { id: *id });
            }
            check_weights(replacement)?;
            for index in live {
                let nested = self
                    .tree
                    .ancestors(index)
                    .into_iter()
                    .any(|a| targeted.contains(&self.tree.get(a).id));
                if !nested {
                    jobs.push((index, replacement));
                }
            }
        }

        let mut dtmc = std::mem::take(&mut self.dtmc);
        let mut rec = Recorder::new(&mut dtmc);
        let mut doomed = Vec::new();
        let mut outcome = Ok(());
        for (index, replacement) in jobs {
            if !self.tree.get(index).alive {
                continue;
            }
            outcome = self.replace(&mut rec, index, replacement, &mut doomed);
            if outcome.is_err() {
                break;
            }
        }
        if outcome.is_ok() {
            for node in doomed {
                outcome = rec.remove_node(node);
                if outcome.is_err() {
                    break;
                }
            }
        }
        let graph_delta = rec.finish();
        self.dtmc = dtmc;
        self.tree.release();
        outcome?;

        self.expr = delta.apply(&self.expr);
        debug!(
            nodes = self.dtmc.node_count(),
            edges = self.dtmc.edge_count(),
            fragments = self.tree.live_count(),
            "applied expression delta to chain"
        );
        Ok(graph_delta)
    }
}
