//! Incremental DTMC → SRE transformation by edge refinement.

use std::collections::{BTreeMap, HashSet};

use stochex_expr::{Expr, ExprDelta, ExprId};
use stochex_graph::{Dtmc, EdgeKey, GraphChange, NodeId};
use tracing::{debug, instrument};

use crate::Transformer;
use crate::compose::Composer;
use crate::config::TransformConfig;
use crate::eliminate::eliminate;
use crate::error::TransformError;

/// Keeps an expression in step with a chain whose edges are refined into
/// sub-chains.
///
/// Each edge is represented in the expression by its own reference leaf, an
/// `Atomic` node with a unique id, and elimination never merges or drops
/// reference leaves. Refining an edge eliminates only the sub-chain and
/// replaces the edge's leaf by the result. The ε-edges that connect a
/// spliced sub-chain get reference leaves of their own, so they can be
/// refined later as well.
///
/// # Example
///
/// ```
/// use stochex_graph::{Dtmc, EdgeKey, GraphChange, RestrictedGraphDelta};
/// use stochex_transform::{DtmcToSre, TransformConfig, Transformer, to_dtmc};
///
/// let mut outer = Dtmc::new();
/// let end = outer.add_node();
/// outer.add_edge(outer.initial(), end, "a", 1.0).unwrap();
/// outer.make_final(end).unwrap();
/// let edge = EdgeKey::new(outer.initial(), end, "a");
///
/// let mut sub = Dtmc::new();
/// let stop = sub.add_node();
/// sub.add_edge(sub.initial(), stop, "x", 1.0).unwrap();
/// sub.make_final(stop).unwrap();
///
/// let mut t = DtmcToSre::new(outer).unwrap();
/// let leaf = t.leaf(&edge).unwrap().id();
///
/// let mut refine = RestrictedGraphDelta::new();
/// refine.add_change(edge, sub);
/// let delta = t.apply_delta(&GraphChange::Refine(refine)).unwrap();
///
/// assert!(delta.replacement(leaf).is_some());
/// let rebuilt = to_dtmc(t.target(), &TransformConfig::default()).unwrap();
/// assert!((rebuilt.string_probability("x") - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct DtmcToSre {
    dtmc: Dtmc,
    expr: Expr,
    leaves: BTreeMap<EdgeKey, Expr>,
    config: TransformConfig,
}

impl DtmcToSre {
    /// Eliminates `dtmc` with the default configuration.
    pub fn new(dtmc: Dtmc) -> Result<Self, TransformError> {
        Self::with_config(dtmc, TransformConfig::default())
    }

    /// Eliminates `dtmc`.
    #[instrument(skip_all, fields(nodes = dtmc.node_count(), edges = dtmc.edge_count()))]
    pub fn with_config(dtmc: Dtmc, config: TransformConfig) -> Result<Self, TransformError> {
        config.validate()?;
        Self::build(dtmc, config, &BTreeMap::new())
    }

    /// Eliminates `dtmc`, letting `stops[f]` stand for acceptance in the
    /// final node `f`.
    fn build(
        dtmc: Dtmc,
        config: TransformConfig,
        stops: &BTreeMap<NodeId, Expr>,
    ) -> Result<Self, TransformError> {
        let leaves: BTreeMap<EdgeKey, Expr> = dtmc
            .edges()
            .map(|(key, _)| (key.clone(), Expr::atomic(key.label.clone())))
            .collect();
        let mut protected: HashSet<ExprId> = leaves.values().map(Expr::id).collect();
        protected.extend(stops.values().map(Expr::id));

        let composer = Composer::protecting(&config, &protected);
        let expr = eliminate(
            &dtmc,
            &composer,
            |key| {
                leaves
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| Expr::atomic(key.label.clone()))
            },
            |f| stops.get(&f).cloned().unwrap_or_else(Expr::epsilon),
        )?;
        debug!(size = expr.size(), leaves = leaves.len(), "eliminated chain with reference leaves");
        Ok(Self {
            dtmc,
            expr,
            leaves,
            config,
        })
    }

    /// Reference leaf of `edge`.
    pub fn leaf(&self, edge: &EdgeKey) -> Option<&Expr> {
        self.leaves.get(edge)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }
}

impl Transformer for DtmcToSre {
    type Source = Dtmc;
    type Target = Expr;
    type SourceDelta = GraphChange;
    type TargetDelta = ExprDelta;

    /// The current chain.
    fn source(&self) -> &Dtmc {
        &self.dtmc
    }

    /// The current expression.
    fn target(&self) -> &Expr {
        &self.expr
    }

    /// Splices the sub-chains of a refinement into the chain and returns the
    /// expression delta that replaces each refined edge's reference leaf.
    ///
    /// Arbitrary edge edits are rejected with
    /// [`TransformError::Unsupported`]. Every refined edge must have a
    /// reference leaf; otherwise nothing changes.
    #[instrument(skip_all)]
    fn apply_delta(&mut self, change: &GraphChange) -> Result<ExprDelta, TransformError> {
        let refine = match change {
            GraphChange::Edges(_) => {
                return Err(TransformError::Unsupported {
                    what: "edge edits; only edge refinements can be applied".to_string(),
                });
            }
            GraphChange::Refine(refine) => refine,
        };
        for (edge, _) in refine.changes() {
            if !self.leaves.contains_key(edge) {
                return Err(TransformError::UnknownEdge { edge: edge.clone() });
            }
        }

        let mut parts = Vec::with_capacity(refine.len());
        for (_, sub) in refine.changes() {
            let stops: BTreeMap<NodeId, Expr> =
                sub.finals().iter().map(|&f| (f, Expr::epsilon())).collect();
            let inner = Self::build(sub.clone(), self.config.clone(), &stops)?;
            parts.push((inner, stops, Expr::epsilon()));
        }
        let splices = refine.apply(&mut self.dtmc)?;

        let mut delta = ExprDelta::new();
        for (splice, (inner, stops, entry)) in splices.into_iter().zip(parts) {
            let node = |id: NodeId| {
                splice
                    .nodes
                    .get(&id)
                    .copied()
                    .ok_or_else(|| TransformError::Internal {
                        reason: format!("sub-chain node {id} was not spliced"),
                    })
            };
            let leaf = self
                .leaves
                .remove(&splice.edge)
                .ok_or_else(|| TransformError::UnknownEdge {
                    edge: splice.edge.clone(),
                })?;

            let mut protected: HashSet<ExprId> = inner.leaves.values().map(Expr::id).collect();
            protected.extend(stops.values().map(Expr::id));
            protected.insert(entry.id());
            let replacement = Composer::protecting(&self.config, &protected)
                .concat(vec![entry.clone(), inner.expr.clone()])?;
            delta.add_change(leaf.id(), replacement);

            self.leaves.insert(
                EdgeKey::new(splice.edge.from, node(inner.dtmc.initial())?, ""),
                entry,
            );
            for (f, stop) in stops {
                self.leaves
                    .insert(EdgeKey::new(node(f)?, splice.edge.to, ""), stop);
            }
            for (key, leaf) in inner.leaves {
                self.leaves
                    .insert(EdgeKey::new(node(key.from)?, node(key.to)?, key.label), leaf);
            }
        }

        self.expr = delta.apply(&self.expr);
        debug!(
            changes = delta.len(),
            size = self.expr.size(),
            nodes = self.dtmc.node_count(),
            "refined chain"
        );
        Ok(delta)
    }
}
