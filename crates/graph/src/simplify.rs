//! Language-preserving clean-up of a [`Dtmc`].

use tracing::{debug, warn};

use crate::arena::NodeId;
use crate::model::{Dtmc, EdgeKey};

/// Loop probabilities this close to 1 are treated as traps.
const TRAP_TOLERANCE: f64 = 1e-12;

impl Dtmc {
    /// Simplifies the chain without changing the probability of any string.
    ///
    /// 1. ε-edges that lead to a non-final node are fused into that node's
    ///    outgoing edges (probabilities multiply; a fused edge that collides
    ///    with an existing key adds to it). An ε self-loop of probability
    ///    `q < 1` is dropped and the node's other edges renormalized by
    ///    `1 / (1 - q)`.
    /// 2. Nodes with no incoming edge (other than the initial node) and
    ///    non-final nodes with no outgoing edge are removed until none remain.
    ///
    /// Simplifying twice gives the same chain as simplifying once.
    pub fn simplify(&mut self) {
        let (nodes, edges) = (self.node_count(), self.edge_count());
        self.fuse_epsilon_edges();
        self.prune();
        debug!(
            nodes_before = nodes,
            edges_before = edges,
            nodes = self.node_count(),
            edges = self.edge_count(),
            "simplified chain"
        );
    }

    fn fuse_epsilon_edges(&mut self) {
        let limit = 16 * (self.edge_count() + 1) * (self.node_count() + 1);
        let mut steps = 0;
        while let Some(key) = self.next_fusible_epsilon() {
            steps += 1;
            if steps > limit {
                warn!(steps, "epsilon fusion did not settle, stopping early");
                return;
            }
            let Some(p) = self.unlink_edge(&key) else {
                continue;
            };
            if key.from == key.to {
                self.renormalize_after_loop(key.from, p);
                continue;
            }
            let successors: Vec<(EdgeKey, f64)> = match self.nodes.get(key.to) {
                Some(data) => data
                    .outgoing
                    .iter()
                    .filter_map(|k| self.edges.get(k).map(|&q| (k.clone(), q)))
                    .collect(),
                None => Vec::new(),
            };
            for (next, q) in successors {
                self.merge_edge(EdgeKey::new(key.from, next.to, next.label), p * q);
            }
        }
    }

    /// Self-loops come first so a node is never fused while it still loops on ε.
    fn next_fusible_epsilon(&self) -> Option<EdgeKey> {
        self.edges
            .keys()
            .find(|k| k.is_epsilon() && k.from == k.to)
            .or_else(|| {
                self.edges
                    .keys()
                    .find(|k| k.is_epsilon() && !self.is_final(k.to))
            })
            .cloned()
    }

    fn renormalize_after_loop(&mut self, node: NodeId, q: f64) {
        if 1.0 - q <= TRAP_TOLERANCE {
            return;
        }
        let scale = 1.0 / (1.0 - q);
        let outgoing: Vec<EdgeKey> = match self.nodes.get(node) {
            Some(data) => data.outgoing.iter().cloned().collect(),
            None => return,
        };
        for key in outgoing {
            if let Some(p) = self.edges.get_mut(&key) {
                *p = (*p * scale).min(1.0);
            }
        }
    }

    fn merge_edge(&mut self, key: EdgeKey, p: f64) {
        match self.edges.get_mut(&key) {
            Some(existing) => *existing = (*existing + p).min(1.0),
            None => self.link_edge(key, p.min(1.0)),
        }
    }

    fn prune(&mut self) {
        loop {
            let doomed: Vec<NodeId> = self
                .nodes()
                .filter(|&n| {
                    n != self.initial()
                        && (self.in_degree(n) == 0
                            || (self.out_degree(n) == 0 && !self.is_final(n)))
                })
                .collect();
            if doomed.is_empty() {
                return;
            }
            for n in doomed {
                self.detach_and_remove(n);
            }
        }
    }
}
