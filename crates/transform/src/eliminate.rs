//! State elimination: DTMC → SRE.

use std::collections::{BTreeMap, BTreeSet};

use stochex_expr::Expr;
use stochex_graph::{Dtmc, EdgeKey, NodeId};
use tracing::{debug, warn};

use crate::compose::Composer;
use crate::error::TransformError;

/// A self-loop this close to 1 never lets the run leave its node.
const TRAP_TOLERANCE: f64 = 1e-12;

const ACCEPT_TOLERANCE: f64 = 1e-6;

/// Probability and expression of the paths between two nodes.
#[derive(Debug, Clone)]
struct Transition {
    probability: f64,
    expr: Expr,
}

struct Eliminator<'c, 'a> {
    composer: &'c Composer<'a>,
    transitions: BTreeMap<(NodeId, NodeId), Transition>,
    succ: BTreeMap<NodeId, BTreeSet<NodeId>>,
    pred: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// Paths from a node to acceptance.
    accept: BTreeMap<NodeId, Transition>,
}

/// Eliminates every node of `dtmc` and returns the expression of the
/// accepted runs from its initial node.
///
/// `leaf` gives the expression of each edge, `accept` the expression that
/// stands for stopping in a final node. Nodes go in id order, the initial
/// node last. The probability of never accepting becomes an [`Expr::null`]
/// branch, and a chain that accepts nothing yields [`Expr::null`].
pub(crate) fn eliminate(
    dtmc: &Dtmc,
    composer: &Composer<'_>,
    leaf: impl Fn(&EdgeKey) -> Expr,
    accept: impl Fn(NodeId) -> Expr,
) -> Result<Expr, TransformError> {
    let mut parallel: BTreeMap<(NodeId, NodeId), Vec<(Expr, f64)>> = BTreeMap::new();
    for (key, p) in dtmc.edges() {
        parallel
            .entry((key.from, key.to))
            .or_default()
            .push((leaf(key), p));
    }

    let mut state = Eliminator {
        composer,
        transitions: BTreeMap::new(),
        succ: BTreeMap::new(),
        pred: BTreeMap::new(),
        accept: BTreeMap::new(),
    };
    for ((from, to), branches) in parallel {
        let probability: f64 = branches.iter().map(|(_, p)| p).sum();
        let expr = composer.sum(branches)?;
        state.merge(from, to, Transition { probability, expr })?;
    }
    for &f in dtmc.finals() {
        state.accept.insert(
            f,
            Transition {
                probability: 1.0,
                expr: accept(f),
            },
        );
    }

    let initial = dtmc.initial();
    let order: Vec<NodeId> = dtmc
        .nodes()
        .filter(|&n| n != initial)
        .chain(std::iter::once(initial))
        .collect();
    for &n in &order {
        state.fold_loop(n)?;
        if n != initial {
            state.bypass(n)?;
        }
    }

    match state.accept.remove(&initial) {
        Some(done) => {
            debug!(
                nodes = order.len(),
                size = done.expr.size(),
                accept = done.probability,
                "eliminated chain"
            );
            if done.probability > 1.0 + ACCEPT_TOLERANCE {
                warn!(
                    accept = done.probability,
                    "chain accepts with probability above 1"
                );
            }
            if done.probability < 1.0 - ACCEPT_TOLERANCE {
                // Runs caught in a cycle without a final node keep their mass.
                return composer.sum(vec![
                    (done.expr, done.probability),
                    (Expr::null(), 1.0 - done.probability),
                ]);
            }
            Ok(done.expr)
        }
        None => {
            warn!("chain accepts no string");
            Ok(Expr::null())
        }
    }
}

impl Eliminator<'_, '_> {
    fn merge(&mut self, from: NodeId, to: NodeId, t: Transition) -> Result<(), TransformError> {
        if t.probability <= 0.0 {
            return Ok(());
        }
        let merged = match self.transitions.remove(&(from, to)) {
            Some(old) => Transition {
                probability: old.probability + t.probability,
                expr: self
                    .composer
                    .sum(vec![(old.expr, old.probability), (t.expr, t.probability)])?,
            },
            None => t,
        };
        self.transitions.insert((from, to), merged);
        self.succ.entry(from).or_default().insert(to);
        self.pred.entry(to).or_default().insert(from);
        Ok(())
    }

    fn merge_accept(&mut self, node: NodeId, t: Transition) -> Result<(), TransformError> {
        if t.probability <= 0.0 {
            return Ok(());
        }
        let merged = match self.accept.remove(&node) {
            Some(old) => Transition {
                probability: old.probability + t.probability,
                expr: self
                    .composer
                    .sum(vec![(old.expr, old.probability), (t.expr, t.probability)])?,
            },
            None => t,
        };
        self.accept.insert(node, merged);
        Ok(())
    }

    fn take(&mut self, from: NodeId, to: NodeId) -> Option<Transition> {
        if let Some(s) = self.succ.get_mut(&from) {
            s.remove(&to);
        }
        if let Some(p) = self.pred.get_mut(&to) {
            p.remove(&from);
        }
        self.transitions.remove(&(from, to))
    }

    fn successors(&self, n: NodeId) -> Vec<NodeId> {
        self.succ
            .get(&n)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    fn predecessors(&self, n: NodeId) -> Vec<NodeId> {
        self.pred
            .get(&n)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Turns the self-loop of `n` into a Kleene prefix of everything that
    /// leaves `n`.
    fn fold_loop(&mut self, n: NodeId) -> Result<(), TransformError> {
        let Some(cycle) = self.take(n, n) else {
            return Ok(());
        };
        let q = cycle.probability;
        if 1.0 - q <= TRAP_TOLERANCE {
            warn!(node = %n, rate = q, "node never leaves its self-loop");
            for s in self.successors(n) {
                self.take(n, s);
            }
            self.accept.remove(&n);
            return Ok(());
        }

        let star = self.composer.kleene(cycle.expr, q)?;
        let scale = 1.0 / (1.0 - q);
        for s in self.successors(n) {
            if let Some(t) = self.transitions.get_mut(&(n, s)) {
                t.expr = self.composer.concat(vec![star.clone(), t.expr.clone()])?;
                t.probability *= scale;
            }
        }
        if let Some(b) = self.accept.get_mut(&n) {
            b.expr = self.composer.concat(vec![star, b.expr.clone()])?;
            b.probability *= scale;
        }
        Ok(())
    }

    /// Removes `n`, connecting each predecessor to each successor.
    fn bypass(&mut self, n: NodeId) -> Result<(), TransformError> {
        let outs: Vec<(NodeId, Transition)> = self
            .successors(n)
            .into_iter()
            .filter_map(|s| self.take(n, s).map(|t| (s, t)))
            .collect();
        let done = self.accept.remove(&n);

        for p in self.predecessors(n) {
            let Some(into) = self.take(p, n) else {
                continue;
            };
            for (s, out) in &outs {
                let t = Transition {
                    probability: into.probability * out.probability,
                    expr: self
                        .composer
                        .concat(vec![into.expr.clone(), out.expr.clone()])?,
                };
                self.merge(p, *s, t)?;
            }
            if let Some(b) = &done {
                let t = Transition {
                    probability: into.probability * b.probability,
                    expr: self.composer.concat(vec![into.expr.clone(), b.expr.clone()])?,
                };
                self.merge_accept(p, t)?;
            }
        }
        self.succ.remove(&n);
        self.pred.remove(&n);
        Ok(())
    }
}
