//! Batched edits of a [`Dtmc`].
//!
//! A [`GraphDelta`] lists edges to add and remove together with the node and
//! mark changes needed to replay it on a clone of the chain it was recorded
//! against. A [`RestrictedGraphDelta`] refines single edges into whole
//! sub-chains.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::arena::NodeId;
use crate::error::GraphError;
use crate::model::{Dtmc, EdgeKey, check_probability};

/// A batch of edge additions and removals.
///
/// [`GraphDelta::apply`] runs in a fixed order: claim new nodes, remove
/// edges, clear final marks, add edges, set final marks, move the initial
/// node, remove retired nodes. The batch is applied to a copy first, so a
/// failing delta leaves the chain untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDelta {
    added_nodes: BTreeSet<NodeId>,
    removed_nodes: BTreeSet<NodeId>,
    added_edges: BTreeMap<EdgeKey, f64>,
    removed_edges: BTreeSet<EdgeKey>,
    added_finals: BTreeSet<NodeId>,
    removed_finals: BTreeSet<NodeId>,
    initial: Option<NodeId>,
}

impl GraphDelta {
    /// Creates an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an edge addition, replacing an earlier addition with the same key.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: impl Into<String>,
        probability: f64,
    ) -> Result<(), GraphError> {
        check_probability(probability)?;
        self.added_edges
            .insert(EdgeKey::new(from, to, label), probability);
        Ok(())
    }

    /// Schedules an edge removal.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId, label: impl Into<String>) {
        self.removed_edges.insert(EdgeKey::new(from, to, label));
    }

    /// Records a node introduced by the change.
    pub fn add_node(&mut self, id: NodeId) {
        self.added_nodes.insert(id);
    }

    /// Records a node retired by the change.
    pub fn remove_node(&mut self, id: NodeId) {
        self.removed_nodes.insert(id);
    }

    /// Schedules a final mark.
    pub fn mark_final(&mut self, id: NodeId) {
        self.removed_finals.remove(&id);
        self.added_finals.insert(id);
    }

    /// Schedules the removal of a final mark.
    pub fn unmark_final(&mut self, id: NodeId) {
        self.added_finals.remove(&id);
        self.removed_finals.insert(id);
    }

    /// Schedules a new initial node.
    pub fn set_initial(&mut self, id: NodeId) {
        self.initial = Some(id);
    }

    /// Drops a scheduled addition, returning its probability.
    pub fn cancel_addition(&mut self, key: &EdgeKey) -> Option<f64> {
        self.added_edges.remove(key)
    }

    /// Drops a scheduled removal. Returns `true` if one was scheduled.
    pub fn cancel_removal(&mut self, key: &EdgeKey) -> bool {
        self.removed_edges.remove(key)
    }

    /// Forgets that `id` was introduced. Returns `true` if it was.
    pub fn cancel_node_addition(&mut self, id: NodeId) -> bool {
        self.added_nodes.remove(&id)
    }

    // --- Accessors ---

    /// Edges to add, with their probabilities.
    pub fn added_edges(&self) -> &BTreeMap<EdgeKey, f64> {
        &self.added_edges
    }

    /// Edges to remove.
    pub fn removed_edges(&self) -> &BTreeSet<EdgeKey> {
        &self.removed_edges
    }

    /// Nodes introduced by the change.
    pub fn added_nodes(&self) -> &BTreeSet<NodeId> {
        &self.added_nodes
    }

    /// Nodes retired by the change.
    pub fn removed_nodes(&self) -> &BTreeSet<NodeId> {
        &self.removed_nodes
    }

    /// Nodes that become final.
    pub fn added_finals(&self) -> &BTreeSet<NodeId> {
        &self.added_finals
    }

    /// Nodes that stop being final.
    pub fn removed_finals(&self) -> &BTreeSet<NodeId> {
        &self.removed_finals
    }

    /// The new initial node, if the change moves it.
    pub fn initial(&self) -> Option<NodeId> {
        self.initial
    }

    /// Returns `true` if the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
            && self.added_finals.is_empty()
            && self.removed_finals.is_empty()
            && self.initial.is_none()
    }

    /// Applies the delta as one batch.
    pub fn apply(&self, dtmc: &mut Dtmc) -> Result<(), GraphError> {
        let mut next = dtmc.clone();
        for &id in &self.added_nodes {
            next.insert_node_with_id(id)?;
        }
        for key in &self.removed_edges {
            next.remove_edge(key)?;
        }
        for &id in &self.removed_finals {
            next.unmark_final(id)?;
        }
        for (key, &p) in &self.added_edges {
            next.add_edge(key.from, key.to, key.label.clone(), p)?;
        }
        for &id in &self.added_finals {
            next.make_final(id)?;
        }
        if let Some(id) = self.initial {
            next.make_initial(id)?;
        }
        for &id in &self.removed_nodes {
            next.remove_node(id)?;
        }
        debug!(
            added = self.added_edges.len(),
            removed = self.removed_edges.len(),
            "applied graph delta"
        );
        *dtmc = next;
        Ok(())
    }
}

/// One line per change: `+ from to p label`, `- from to label`, and
/// `node +id`, `node -id`, `final +id`, `final -id`, `initial id`.
impl fmt::Display for GraphDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in &self.added_nodes {
            writeln!(f, "node +{id}")?;
        }
        for key in &self.removed_edges {
            writeln!(f, "- {} {} {}", key.from, key.to, key.label)?;
        }
        for id in &self.removed_finals {
            writeln!(f, "final -{id}")?;
        }
        for (key, p) in &self.added_edges {
            writeln!(f, "+ {} {} {} {}", key.from, key.to, p, key.label)?;
        }
        for id in &self.added_finals {
            writeln!(f, "final +{id}")?;
        }
        if let Some(id) = self.initial {
            writeln!(f, "initial {id}")?;
        }
        for id in &self.removed_nodes {
            writeln!(f, "node -{id}")?;
        }
        Ok(())
    }
}

/// Where a refined edge was spliced in.
#[derive(Debug, Clone)]
pub struct Splice {
    /// The replaced edge.
    pub edge: EdgeKey,
    /// Its probability, now carried by the ε-edge into the sub-chain.
    pub probability: f64,
    /// Handles of the sub-chain's nodes inside the host chain.
    pub nodes: BTreeMap<NodeId, NodeId>,
}

/// Replaces single edges by whole sub-chains.
#[derive(Debug, Clone, Default)]
pub struct RestrictedGraphDelta {
    changes: Vec<(EdgeKey, Dtmc)>,
}

impl RestrictedGraphDelta {
    /// Creates an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `edge` to be replaced by `sub`; a later call for the same
    /// edge replaces the earlier one.
    pub fn add_change(&mut self, edge: EdgeKey, sub: Dtmc) {
        match self.changes.iter_mut().find(|(e, _)| *e == edge) {
            Some(slot) => slot.1 = sub,
            None => self.changes.push((edge, sub)),
        }
    }

    /// Scheduled replacements in insertion order.
    pub fn changes(&self) -> &[(EdgeKey, Dtmc)] {
        &self.changes
    }

    /// Number of scheduled replacements.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Splices every sub-chain into `dtmc`.
    ///
    /// For each edge: the sub-chain is attached, the edge removed, its source
    /// connected to the sub-chain's initial node by an ε-edge with the edge's
    /// probability, and every final node of the sub-chain loses its final
    /// mark and gets an ε-edge of probability 1 to the edge's target.
    pub fn apply(&self, dtmc: &mut Dtmc) -> Result<Vec<Splice>, GraphError> {
        let mut next = dtmc.clone();
        let mut splices = Vec::with_capacity(self.changes.len());
        for (edge, sub) in &self.changes {
            let probability = next.remove_edge(edge)?;
            let nodes = next.attach(sub);
            let entry = nodes[&sub.initial()];
            for f in sub.finals() {
                let exit = nodes[f];
                next.unmark_final(exit)?;
                next.add_edge(exit, edge.to, "", 1.0)?;
            }
            next.add_edge(edge.from, entry, "", probability)?;
            splices.push(Splice {
                edge: edge.clone(),
                probability,
                nodes,
            });
        }
        *dtmc = next;
        Ok(splices)
    }
}

/// A source-side change submitted to the DTMC to SRE transformer.
#[derive(Debug, Clone)]
pub enum GraphChange {
    /// Arbitrary edge edits.
    Edges(GraphDelta),
    /// Edge refinements.
    Refine(RestrictedGraphDelta),
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn ab_chain() -> (Dtmc, NodeId, NodeId) {
        let mut dtmc = Dtmc::new();
        let s = dtmc.initial();
        let f = dtmc.add_node();
        dtmc.add_edge(s, f, "a", 0.5).unwrap();
        dtmc.add_edge(s, f, "b", 0.5).unwrap();
        dtmc.make_final(f).unwrap();
        (dtmc, s, f)
    }

    #[test]
    fn replace_edge_probability() {
        let (mut dtmc, s, f) = ab_chain();
        let mut delta = GraphDelta::new();
        delta.remove_edge(s, f, "a");
        delta.remove_edge(s, f, "b");
        delta.add_edge(s, f, "a", 0.9).unwrap();
        delta.add_edge(s, f, "c", 0.1).unwrap();
        delta.apply(&mut dtmc).unwrap();
        assert_abs_diff_eq!(dtmc.string_probability("a"), 0.9);
        assert_abs_diff_eq!(dtmc.string_probability("c"), 0.1);
        assert_abs_diff_eq!(dtmc.string_probability("b"), 0.0);
    }

    #[test]
    fn failing_delta_leaves_chain_untouched() {
        let (mut dtmc, s, f) = ab_chain();
        let mut delta = GraphDelta::new();
        delta.remove_edge(s, f, "a");
        delta.remove_edge(s, f, "missing");
        let result = delta.apply(&mut dtmc);
        assert!(matches!(result, Err(GraphError::UnknownEdge { .. })));
        assert_eq!(dtmc.edge_count(), 2);
    }

    #[test]
    fn replays_new_nodes_on_a_clone() {
        let (mut dtmc, s, f) = ab_chain();
        let mut replica = dtmc.clone();

        let m = dtmc.add_node();
        let mut delta = GraphDelta::new();
        delta.add_node(m);
        delta.remove_edge(s, f, "a");
        delta.add_edge(s, m, "a", 0.5).unwrap();
        delta.add_edge(m, f, "x", 1.0).unwrap();
        dtmc.remove_edge(&EdgeKey::new(s, f, "a")).unwrap();
        dtmc.add_edge(s, m, "a", 0.5).unwrap();
        dtmc.add_edge(m, f, "x", 1.0).unwrap();

        delta.apply(&mut replica).unwrap();
        assert_eq!(replica.to_string(), dtmc.to_string());
    }

    #[test]
    fn final_marks_and_initial_move() {
        let (mut dtmc, s, f) = ab_chain();
        let g = dtmc.add_node();
        let mut delta = GraphDelta::new();
        delta.unmark_final(f);
        delta.add_edge(f, g, "c", 1.0).unwrap();
        delta.mark_final(g);
        delta.apply(&mut dtmc).unwrap();
        assert!(dtmc.is_final(g));
        assert!(!dtmc.is_final(f));
        assert_abs_diff_eq!(dtmc.string_probability("ac"), 0.5);

        let mut delta = GraphDelta::new();
        delta.set_initial(f);
        delta.remove_node(s);
        delta.apply(&mut dtmc).unwrap();
        assert_eq!(dtmc.initial(), f);
        assert_abs_diff_eq!(dtmc.string_probability("c"), 1.0);
    }

    #[test]
    fn display_lists_changes() {
        let (_, s, f) = ab_chain();
        let mut delta = GraphDelta::new();
        delta.remove_edge(s, f, "a");
        delta.add_edge(s, f, "c", 0.5).unwrap();
        assert_eq!(delta.to_string(), "- #0 #1 a\n+ #0 #1 0.5 c\n");
        assert!(!delta.is_empty());
        assert!(GraphDelta::new().is_empty());
    }

    #[test]
    fn restricted_delta_splices_sub_chain() {
        let (mut dtmc, s, f) = ab_chain();
        // sub: x then y
        let mut sub = Dtmc::new();
        let m = sub.add_node();
        let t = sub.add_node();
        sub.add_edge(sub.initial(), m, "x", 1.0).unwrap();
        sub.add_edge(m, t, "y", 1.0).unwrap();
        sub.make_final(t).unwrap();

        let mut delta = RestrictedGraphDelta::new();
        delta.add_change(EdgeKey::new(s, f, "a"), sub);
        let splices = delta.apply(&mut dtmc).unwrap();

        assert_eq!(splices.len(), 1);
        assert_abs_diff_eq!(splices[0].probability, 0.5);
        assert_eq!(dtmc.node_count(), 5);
        assert_eq!(dtmc.finals().len(), 1);
        assert_abs_diff_eq!(dtmc.string_probability("xy"), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(dtmc.string_probability("b"), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(dtmc.string_probability("a"), 0.0);
        assert!(dtmc.validate().is_ok());
    }

    #[test]
    fn restricted_delta_with_epsilon_sub_chain() {
        let (mut dtmc, s, f) = ab_chain();
        let mut delta = RestrictedGraphDelta::new();
        delta.add_change(EdgeKey::new(s, f, "a"), Dtmc::epsilon());
        delta.apply(&mut dtmc).unwrap();
        assert_abs_diff_eq!(dtmc.string_probability(""), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn restricted_delta_unknown_edge() {
        let (mut dtmc, s, f) = ab_chain();
        let mut delta = RestrictedGraphDelta::new();
        delta.add_change(EdgeKey::new(s, f, "z"), Dtmc::epsilon());
        assert!(matches!(
            delta.apply(&mut dtmc),
            Err(GraphError::UnknownEdge { .. })
        ));
        assert_eq!(dtmc.node_count(), 2);
    }
}
