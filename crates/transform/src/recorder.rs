//! Mutations of a chain that are mirrored into a [`GraphDelta`].

use std::collections::HashMap;

use stochex_graph::{Dtmc, EdgeKey, GraphDelta, NodeId};

use crate::error::TransformError;

/// Applies changes to a chain and records the net effect.
///
/// An edge removed and added back with the same probability leaves no
/// trace, and so does a node or edge added and removed again.
pub(crate) struct Recorder<'a> {
    dtmc: &'a mut Dtmc,
    delta: GraphDelta,
    removed: HashMap<EdgeKey, f64>,
}

impl<'a> Recorder<'a> {
    pub(crate) fn new(dtmc: &'a mut Dtmc) -> Self {
        Self {
            dtmc,
            delta: GraphDelta::new(),
            removed: HashMap::new(),
        }
    }

    pub(crate) fn dtmc(&self) -> &Dtmc {
        self.dtmc
    }

    pub(crate) fn add_node(&mut self) -> NodeId {
        let id = self.dtmc.add_node();
        self.delta.add_node(id);
        id
    }

    pub(crate) fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: &str,
        probability: f64,
    ) -> Result<(), TransformError> {
        let key = self.dtmc.add_edge(from, to, label, probability)?;
        let restored = self
            .removed
            .get(&key)
            .is_some_and(|&p| p.to_bits() == probability.to_bits());
        if restored && self.delta.cancel_removal(&key) {
            self.removed.remove(&key);
        } else {
            self.delta.add_edge(from, to, label, probability)?;
        }
        Ok(())
    }

    pub(crate) fn remove_edge(&mut self, key: &EdgeKey) -> Result<f64, TransformError> {
        let p = self.dtmc.remove_edge(key)?;
        if self.delta.cancel_addition(key).is_none() {
            self.delta.remove_edge(key.from, key.to, key.label.clone());
            self.removed.insert(key.clone(), p);
        }
        Ok(p)
    }

    /// Removes every edge incident to `id`, leaving the node in place.
    pub(crate) fn detach(&mut self, id: NodeId) -> Result<(), TransformError> {
        let mut keys: Vec<EdgeKey> = self
            .dtmc
            .incoming(id)?
            .into_iter()
            .map(|e| e.key)
            .collect();
        keys.extend(self.dtmc.outgoing(id)?.into_iter().map(|e| e.key));
        keys.sort();
        keys.dedup();
        for key in &keys {
            self.remove_edge(key)?;
        }
        Ok(())
    }

    pub(crate) fn remove_node(&mut self, id: NodeId) -> Result<(), TransformError> {
        self.detach(id)?;
        self.dtmc.remove_node(id)?;
        if !self.delta.cancel_node_addition(id) {
            self.delta.remove_node(id);
        }
        Ok(())
    }

    pub(crate) fn make_final(&mut self, id: NodeId) -> Result<(), TransformError> {
        self.dtmc.make_final(id)?;
        self.delta.mark_final(id);
        Ok(())
    }

    pub(crate) fn unmark_final(&mut self, id: NodeId) -> Result<(), TransformError> {
        self.dtmc.unmark_final(id)?;
        self.delta.unmark_final(id);
        Ok(())
    }

    pub(crate) fn make_initial(&mut self, id: NodeId) -> Result<(), TransformError> {
        self.dtmc.make_initial(id)?;
        self.delta.set_initial(id);
        Ok(())
    }

    pub(crate) fn finish(self) -> GraphDelta {
        self.delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (Dtmc, NodeId, NodeId) {
        let mut dtmc = Dtmc::new();
        let s = dtmc.initial();
        let t = dtmc.add_node();
        dtmc.add_edge(s, t, "a", 1.0).unwrap();
        dtmc.make_final(t).unwrap();
        (dtmc, s, t)
    }

    #[test]
    fn remove_then_restore_cancels() {
        let (mut dtmc, s, t) = chain();
        let mut rec = Recorder::new(&mut dtmc);
        rec.remove_edge(&EdgeKey::new(s, t, "a")).unwrap();
        rec.add_edge(s, t, "a", 1.0).unwrap();
        assert!(rec.finish().is_empty());
    }

    #[test]
    fn restore_with_other_probability_is_kept() {
        let (mut dtmc, s, t) = chain();
        let mut rec = Recorder::new(&mut dtmc);
        rec.remove_edge(&EdgeKey::new(s, t, "a")).unwrap();
        rec.add_edge(s, t, "a", 0.5).unwrap();
        let delta = rec.finish();
        assert_eq!(delta.removed_edges().len(), 1);
        assert_eq!(delta.added_edges().len(), 1);
    }

    #[test]
    fn transient_node_leaves_no_trace() {
        let (mut dtmc, s, _) = chain();
        let mut rec = Recorder::new(&mut dtmc);
        let m = rec.add_node();
        rec.add_edge(s, m, "x", 0.5).unwrap();
        rec.remove_node(m).unwrap();
        assert!(rec.finish().is_empty());
        assert_eq!(dtmc.node_count(), 2);
    }

    #[test]
    fn recorded_delta_replays() {
        let (mut dtmc, s, t) = chain();
        let mut replica = dtmc.clone();
        let mut rec = Recorder::new(&mut dtmc);
        let u = rec.add_node();
        rec.remove_edge(&EdgeKey::new(s, t, "a")).unwrap();
        rec.add_edge(s, u, "b", 1.0).unwrap();
        rec.unmark_final(t).unwrap();
        rec.make_final(u).unwrap();
        rec.remove_node(t).unwrap();
        let delta = rec.finish();

        delta.apply(&mut replica).unwrap();
        assert_eq!(replica.to_string(), dtmc.to_string());
    }
}
