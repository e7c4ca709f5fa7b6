//! Structural SRE → DTMC translation.
//!
//! Every expression node becomes a fragment with one initial node and a set
//! of final nodes:
//!
//! ```text
//! Atomic c     i --c--> f
//! Concat       c1 ==ε==> c2 ==ε==> .. ==ε==> cn
//! Sum          I --ε:w1/Σw--> c1 --ε--> F
//!                --ε:w2/Σw--> c2 --ε-->
//! Kleene r     H --ε:r--> c --ε--> H,  H --ε:1-r--> F
//! ```
//!
//! The compact layout shares boundary nodes between a concatenation and its
//! children. The isolated layout gives every composite fragment its own entry
//! and exit nodes and exactly one final, so a fragment can later be cut out
//! by re-pointing the edges at its boundary.

use std::collections::{HashMap, VecDeque};

use stochex_expr::{Expr, ExprId, ExprKind};
use stochex_graph::{Dtmc, NodeId};

use crate::error::TransformError;
use crate::fragments::{Fragment, FragmentTree};
use crate::recorder::Recorder;

/// Where the builder puts nodes and edges.
pub(crate) trait Sink {
    fn add_node(&mut self) -> NodeId;

    fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: &str,
        probability: f64,
    ) -> Result<(), TransformError>;
}

/// A fresh chain whose initial placeholder becomes the first built node.
pub(crate) struct Canvas {
    dtmc: Dtmc,
    spare: Option<NodeId>,
}

impl Canvas {
    pub(crate) fn new() -> Self {
        let dtmc = Dtmc::new();
        let spare = Some(dtmc.initial());
        Self { dtmc, spare }
    }

    /// Marks the boundary of the outermost fragment and returns the chain.
    pub(crate) fn finish(mut self, piece: &Piece) -> Result<Dtmc, TransformError> {
        let placeholder = self.dtmc.initial();
        self.dtmc.make_initial(piece.initial)?;
        if placeholder != piece.initial && self.dtmc.in_degree(placeholder) == 0 {
            self.dtmc.remove_node(placeholder)?;
        }
        for &f in &piece.finals {
            self.dtmc.make_final(f)?;
        }
        Ok(self.dtmc)
    }
}

impl Sink for Canvas {
    fn add_node(&mut self) -> NodeId {
        match self.spare.take() {
            Some(id) => id,
            None => self.dtmc.add_node(),
        }
    }

    fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: &str,
        probability: f64,
    ) -> Result<(), TransformError> {
        self.dtmc.add_edge(from, to, label, probability)?;
        Ok(())
    }
}

impl Sink for Recorder<'_> {
    fn add_node(&mut self) -> NodeId {
        Recorder::add_node(self)
    }

    fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: &str,
        probability: f64,
    ) -> Result<(), TransformError> {
        Recorder::add_edge(self, from, to, label, probability)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    Compact,
    Isolated,
}

/// Boundary of a built fragment.
#[derive(Debug, Clone)]
pub(crate) struct Piece {
    pub(crate) initial: NodeId,
    pub(crate) finals: Vec<NodeId>,
    /// Index in the fragment tree, isolated layout only.
    pub(crate) fragment: Option<usize>,
}

/// Existing fragments that may stand in for subtrees of the new expression.
#[derive(Debug, Default)]
pub(crate) struct Reuse {
    by_id: HashMap<ExprId, usize>,
    /// Strict ancestors of every candidate, taken before the build rewires
    /// parent links.
    ancestry: HashMap<usize, Vec<usize>>,
    /// Claimed fragments in build order.
    planned: VecDeque<(ExprId, usize)>,
}

impl Reuse {
    pub(crate) fn offer(&mut self, id: ExprId, index: usize, ancestors: Vec<usize>) {
        self.by_id.entry(id).or_insert(index);
        self.ancestry.insert(index, ancestors);
    }

    /// Claims candidates for the subtrees of `expr` in pre-order, skipping
    /// any that overlaps a fragment claimed before, and returns the claimed
    /// fragments.
    pub(crate) fn plan(&mut self, expr: &Expr) -> Vec<usize> {
        let mut stack = vec![expr];
        while let Some(e) = stack.pop() {
            if self.claim(e.id()) {
                continue;
            }
            stack.extend(e.children().into_iter().rev());
        }
        self.planned.iter().map(|&(_, index)| index).collect()
    }

    fn claim(&mut self, id: ExprId) -> bool {
        let Some(&index) = self.by_id.get(&id) else {
            return false;
        };
        let overlaps = self.planned.iter().any(|&(_, t)| {
            t == index
                || self.ancestry.get(&index).is_some_and(|a| a.contains(&t))
                || self.ancestry.get(&t).is_some_and(|a| a.contains(&index))
        });
        if !overlaps {
            self.planned.push_back((id, index));
        }
        !overlaps
    }

    /// Hands out the next planned fragment if it stands for `id`.
    fn take(&mut self, id: ExprId) -> Option<usize> {
        match self.planned.front() {
            Some(&(next, index)) if next == id => {
                self.planned.pop_front();
                Some(index)
            }
            _ => None,
        }
    }
}

pub(crate) struct Builder<'a, S: Sink> {
    sink: &'a mut S,
    layout: Layout,
    tree: Option<&'a mut FragmentTree>,
    reuse: Reuse,
}

impl<'a, S: Sink> Builder<'a, S> {
    pub(crate) fn compact(sink: &'a mut S) -> Self {
        Self {
            sink,
            layout: Layout::Compact,
            tree: None,
            reuse: Reuse::default(),
        }
    }

    /// Builds isolated fragments and registers each of them in `tree`,
    /// standing in the fragments planned in `reuse`.
    pub(crate) fn isolated(sink: &'a mut S, tree: &'a mut FragmentTree, reuse: Reuse) -> Self {
        Self {
            sink,
            layout: Layout::Isolated,
            tree: Some(tree),
            reuse,
        }
    }

    pub(crate) fn build(&mut self, expr: &Expr) -> Result<Piece, TransformError> {
        if let Some(piece) = self.reused(expr) {
            return Ok(piece);
        }

        let mut own = Vec::new();
        let mut children = Vec::new();
        let (initial, finals) = match expr.kind() {
            ExprKind::Atomic(symbol) => {
                let i = self.node(&mut own);
                if symbol.is_empty() {
                    (i, vec![i])
                } else {
                    let f = self.node(&mut own);
                    self.edge(i, f, symbol, 1.0)?;
                    (i, vec![f])
                }
            }
            ExprKind::Concat(parts) => self.concat(parts, &mut own, &mut children)?,
            ExprKind::Sum(branches) => {
                let total: u128 = branches.iter().map(|b| u128::from(b.weight)).sum();
                if total == 0 {
                    return Err(TransformError::ZeroWeightSum);
                }
                let i = self.node(&mut own);
                let f = self.node(&mut own);
                for branch in branches {
                    if branch.weight == 0 && self.layout == Layout::Compact {
                        continue;
                    }
                    let piece = self.child(&branch.expr, &mut children)?;
                    self.edge(i, piece.initial, "", branch.weight as f64 / total as f64)?;
                    for &g in &piece.finals {
                        self.edge(g, f, "", 1.0)?;
                    }
                }
                (i, vec![f])
            }
            ExprKind::Kleene { child, rate } => {
                let entry = self.node(&mut own);
                let hub = match self.layout {
                    Layout::Compact => entry,
                    Layout::Isolated => {
                        let hub = self.node(&mut own);
                        self.edge(entry, hub, "", 1.0)?;
                        hub
                    }
                };
                let f = self.node(&mut own);
                if *rate > 0.0 || self.layout == Layout::Isolated {
                    let piece = self.child(child, &mut children)?;
                    self.edge(hub, piece.initial, "", *rate)?;
                    for &g in &piece.finals {
                        self.edge(g, hub, "", 1.0)?;
                    }
                }
                self.edge(hub, f, "", 1.0 - rate)?;
                (entry, vec![f])
            }
        };

        let fragment = match self.tree.as_deref_mut() {
            Some(tree) => {
                let index = tree.push(Fragment {
                    id: expr.id(),
                    initial,
                    finals: finals.clone(),
                    own_nodes: own,
                    children: children.clone(),
                    parent: None,
                    alive: true,
                });
                for c in children {
                    tree.get_mut(c).parent = Some(index);
                }
                Some(index)
            }
            None => None,
        };
        Ok(Piece {
            initial,
            finals,
            fragment,
        })
    }

    fn concat(
        &mut self,
        parts: &[Expr],
        own: &mut Vec<NodeId>,
        children: &mut Vec<usize>,
    ) -> Result<(NodeId, Vec<NodeId>), TransformError> {
        match self.layout {
            Layout::Compact => {
                let mut initial = None;
                let mut running: Vec<NodeId> = Vec::new();
                for part in parts {
                    let piece = self.child(part, children)?;
                    for &g in &running {
                        self.edge(g, piece.initial, "", 1.0)?;
                    }
                    initial.get_or_insert(piece.initial);
                    running = piece.finals;
                }
                let initial = initial.ok_or_else(|| TransformError::Internal {
                    reason: "concatenation without children".to_string(),
                })?;
                Ok((initial, running))
            }
            Layout::Isolated => {
                let i = self.node(own);
                let f = self.node(own);
                let mut running = vec![i];
                for part in parts {
                    let piece = self.child(part, children)?;
                    for &g in &running {
                        self.edge(g, piece.initial, "", 1.0)?;
                    }
                    running = piece.finals;
                }
                for &g in &running {
                    self.edge(g, f, "", 1.0)?;
                }
                Ok((i, vec![f]))
            }
        }
    }

    fn child(&mut self, expr: &Expr, children: &mut Vec<usize>) -> Result<Piece, TransformError> {
        let piece = self.build(expr)?;
        children.extend(piece.fragment);
        Ok(piece)
    }

    fn reused(&mut self, expr: &Expr) -> Option<Piece> {
        if self.layout != Layout::Isolated {
            return None;
        }
        let index = self.reuse.take(expr.id())?;
        let fragment = self.tree.as_deref()?.get(index);
        Some(Piece {
            initial: fragment.initial,
            finals: fragment.finals.clone(),
            fragment: Some(index),
        })
    }

    fn node(&mut self, own: &mut Vec<NodeId>) -> NodeId {
        let id = self.sink.add_node();
        own.push(id);
        id
    }

    /// Adds an edge unless its probability vanishes.
    fn edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: &str,
        probability: f64,
    ) -> Result<(), TransformError> {
        if probability <= 0.0 {
            return Ok(());
        }
        self.sink.add_edge(from, to, label, probability.min(1.0))
    }
}

/// Builds the compact automaton of `expr`, without simplification.
pub(crate) fn build_compact(expr: &Expr) -> Result<Dtmc, TransformError> {
    let mut canvas = Canvas::new();
    let piece = Builder::compact(&mut canvas).build(expr)?;
    canvas.finish(&piece)
}

/// Fails with [`TransformError::ZeroWeightSum`] if any sum in `expr` has no
/// positive weight.
pub(crate) fn check_weights(expr: &Expr) -> Result<(), TransformError> {
    for node in expr.preorder() {
        if let ExprKind::Sum(branches) = node.kind() {
            if branches.iter().all(|b| b.weight == 0) {
                return Err(TransformError::ZeroWeightSum);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn ab() -> Expr {
        Expr::concat(vec![Expr::atomic("a"), Expr::atomic("b")]).unwrap()
    }

    #[test]
    fn atomic_and_epsilon() {
        let d = build_compact(&Expr::atomic("a")).unwrap();
        assert_eq!(d.node_count(), 2);
        assert_abs_diff_eq!(d.string_probability("a"), 1.0);

        let e = build_compact(&Expr::epsilon()).unwrap();
        assert_eq!(e.node_count(), 1);
        assert!(e.is_final(e.initial()));
        assert_abs_diff_eq!(e.string_probability(""), 1.0);
    }

    #[test]
    fn concat_chains_children() {
        let d = build_compact(&ab()).unwrap();
        assert_eq!(d.node_count(), 4);
        assert_eq!(d.edge_count(), 3);
        assert_abs_diff_eq!(d.string_probability("ab"), 1.0);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn sum_splits_by_weight() {
        let e = Expr::sum(vec![(Expr::atomic("a"), 1), (Expr::atomic("b"), 3)]).unwrap();
        let d = build_compact(&e).unwrap();
        assert_abs_diff_eq!(d.string_probability("a"), 0.25);
        assert_abs_diff_eq!(d.string_probability("b"), 0.75);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn zero_weight_branch_is_not_built() {
        let e = Expr::sum(vec![(Expr::atomic("a"), 2), (ab(), 0)]).unwrap();
        let d = build_compact(&e).unwrap();
        // I, F and the two nodes of `a`.
        assert_eq!(d.node_count(), 4);
        assert_abs_diff_eq!(d.string_probability("a"), 1.0);
    }

    #[test]
    fn zero_weight_sum_is_rejected() {
        let e = Expr::sum(vec![(Expr::atomic("a"), 0)]).unwrap();
        assert!(matches!(
            build_compact(&e),
            Err(TransformError::ZeroWeightSum)
        ));
        assert!(matches!(
            check_weights(&Expr::concat(vec![Expr::atomic("b"), e]).unwrap()),
            Err(TransformError::ZeroWeightSum)
        ));
    }

    #[test]
    fn kleene_is_geometric() {
        let e = Expr::kleene(Expr::atomic("a"), 0.4).unwrap();
        let d = build_compact(&e).unwrap();
        assert_abs_diff_eq!(d.string_probability(""), 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(d.string_probability("a"), 0.24, epsilon = 1e-12);
        assert_abs_diff_eq!(d.string_probability("aa"), 0.096, epsilon = 1e-12);
    }

    #[test]
    fn nested_kleene_stays_exact() {
        let inner = Expr::kleene(Expr::atomic("a"), 0.5).unwrap();
        let outer = Expr::kleene(inner.clone(), 0.5).unwrap();
        let d = build_compact(&outer).unwrap();
        // P("") = 0.5 + 0.5 * P_inner("") * P("") with P_inner("") = 0.5.
        assert_abs_diff_eq!(d.string_probability(""), 2.0 / 3.0, epsilon = 1e-9);
        let mut simplified = d.clone();
        simplified.simplify();
        assert_abs_diff_eq!(
            simplified.string_probability("aa"),
            d.string_probability("aa"),
            epsilon = 1e-9
        );
    }

    #[test]
    fn kleene_with_rate_zero_is_epsilon() {
        let e = Expr::kleene(ab(), 0.0).unwrap();
        let d = build_compact(&e).unwrap();
        assert_eq!(d.node_count(), 2);
        assert_abs_diff_eq!(d.string_probability(""), 1.0);
    }

    #[test]
    fn isolated_fragments_have_one_final() {
        let e = Expr::sum(vec![(ab(), 1), (Expr::kleene(Expr::atomic("c"), 0.5).unwrap(), 1)])
            .unwrap();
        let mut tree = FragmentTree::default();
        let mut canvas = Canvas::new();
        let piece = Builder::isolated(&mut canvas, &mut tree, Reuse::default())
            .build(&e)
            .unwrap();
        let root = piece.fragment.unwrap();
        // One fragment per expression node.
        assert_eq!(tree.live_count(), e.size());
        for id in e.ids() {
            for index in tree.live(id) {
                assert_eq!(tree.get(index).finals.len(), 1);
            }
        }
        assert_eq!(tree.get(root).children.len(), 2);

        let d = canvas.finish(&piece).unwrap();
        assert_abs_diff_eq!(d.string_probability("ab"), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(d.string_probability("cc"), 0.5 * 0.125, epsilon = 1e-12);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn isolated_initial_has_only_outer_edges() {
        let inner = ab();
        let e = Expr::kleene(inner.clone(), 0.3).unwrap();
        let mut tree = FragmentTree::default();
        let mut canvas = Canvas::new();
        let piece = Builder::isolated(&mut canvas, &mut tree, Reuse::default())
            .build(&e)
            .unwrap();
        let d = canvas.finish(&piece).unwrap();
        let child = tree.get(tree.live(inner.id())[0]).clone();
        // Entered from the hub only, left towards the hub only.
        assert_eq!(d.in_degree(child.initial), 1);
        assert_eq!(d.out_degree(child.finals[0]), 1);
        assert_eq!(d.in_degree(piece.initial), 0);
    }

    #[test]
    fn reuse_plan_skips_overlaps() {
        let a = Expr::atomic("a");
        let e = Expr::concat(vec![a.clone(), Expr::atomic("b")]).unwrap();
        let mut tree = FragmentTree::default();
        let mut canvas = Canvas::new();
        Builder::isolated(&mut canvas, &mut tree, Reuse::default())
            .build(&e)
            .unwrap();
        let root = tree.live(e.id())[0];
        let leaf = tree.live(a.id())[0];

        let mut reuse = Reuse::default();
        reuse.offer(e.id(), root, tree.ancestors(root));
        reuse.offer(a.id(), leaf, tree.ancestors(leaf));
        // The leaf lies inside the whole tree, which is claimed first.
        let twice = Expr::concat(vec![e.clone(), a.clone()]).unwrap();
        assert_eq!(reuse.plan(&twice), vec![root]);
    }
}
