//! The labeled probabilistic graph (DTMC) and its edges.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::arena::{Arena, NodeId};
use crate::error::GraphError;

/// Slack allowed above 1.0 when validating a single edge probability.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Identity of an edge: source, target and label.
///
/// Two edges with the same key cannot coexist in one graph. The empty label
/// is the ε-label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    /// Source node.
    pub from: NodeId,
    /// Target node.
    pub to: NodeId,
    /// Emitted symbol, `""` for ε.
    pub label: String,
}

impl EdgeKey {
    /// Creates an edge key.
    pub fn new(from: NodeId, to: NodeId, label: impl Into<String>) -> Self {
        Self {
            from,
            to,
            label: label.into(),
        }
    }

    /// Returns `true` for an ε-edge.
    pub fn is_epsilon(&self) -> bool {
        self.label.is_empty()
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.label, self.to)
    }
}

/// An edge together with its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Edge identity.
    pub key: EdgeKey,
    /// Transition probability in `(0, 1]`.
    pub probability: f64,
}

impl Edge {
    /// Source node.
    pub fn from(&self) -> NodeId {
        self.key.from
    }

    /// Target node.
    pub fn to(&self) -> NodeId {
        self.key.to
    }

    /// Emitted symbol.
    pub fn label(&self) -> &str {
        &self.key.label
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NodeData {
    pub(crate) name: Option<String>,
    pub(crate) incoming: BTreeSet<EdgeKey>,
    pub(crate) outgoing: BTreeSet<EdgeKey>,
}

/// A discrete-time Markov chain over labeled edges.
///
/// The chain always has exactly one initial node. A node is final iff it has
/// no outgoing edges: marking a node with outgoing edges as final is rejected,
/// and so is adding an edge whose source is final. Probability conservation is
/// not enforced per mutation; [`Dtmc::validate`] checks it on demand.
///
/// Nodes are addressed by [`NodeId`] handles into a generational arena, so a
/// handle to a removed node stays invalid even when its slot is reused.
#[derive(Debug, Clone)]
pub struct Dtmc {
    pub(crate) nodes: Arena<NodeData>,
    pub(crate) edges: BTreeMap<EdgeKey, f64>,
    names: BTreeMap<String, NodeId>,
    initial: NodeId,
    finals: BTreeSet<NodeId>,
}

impl Default for Dtmc {
    fn default() -> Self {
        Self::new()
    }
}

impl Dtmc {
    /// Creates a chain with a single unnamed, non-final initial node.
    pub fn new() -> Self {
        let mut nodes = Arena::new();
        let initial = nodes.insert(NodeData::default());
        Self {
            nodes,
            edges: BTreeMap::new(),
            names: BTreeMap::new(),
            initial,
            finals: BTreeSet::new(),
        }
    }

    /// Creates a chain whose single initial node is named `name`.
    pub fn with_initial_name(name: &str) -> Self {
        let mut dtmc = Self::new();
        let initial = dtmc.initial;
        if let Some(data) = dtmc.nodes.get_mut(initial) {
            data.name = Some(name.to_string());
        }
        dtmc.names.insert(name.to_string(), initial);
        dtmc
    }

    /// Creates the chain that generates only the empty string: one node,
    /// initial and final.
    pub fn epsilon() -> Self {
        let mut dtmc = Self::new();
        dtmc.finals.insert(dtmc.initial);
        dtmc
    }

    /// Adds an unnamed node.
    pub fn add_node(&mut self) -> NodeId {
        self.nodes.insert(NodeData::default())
    }

    /// Adds a named node.
    ///
    /// Names are unique within a chain; a clashing name is prefixed with `_`
    /// until it is free.
    pub fn add_named_node(&mut self, name: &str) -> NodeId {
        let mut unique = name.to_string();
        while self.names.contains_key(&unique) {
            unique.insert(0, '_');
        }
        let id = self.nodes.insert(NodeData {
            name: Some(unique.clone()),
            ..NodeData::default()
        });
        self.names.insert(unique, id);
        id
    }

    /// Adds a node and marks it final.
    pub fn add_final_node(&mut self) -> NodeId {
        let id = self.add_node();
        self.finals.insert(id);
        id
    }

    /// Re-creates a node at the exact slot and generation named by `id`.
    ///
    /// Succeeds without change if the node already exists. Used to replay a
    /// [`GraphDelta`](crate::GraphDelta) on a clone of the chain it was
    /// recorded against.
    pub fn insert_node_with_id(&mut self, id: NodeId) -> Result<(), GraphError> {
        if self.nodes.contains(id) {
            return Ok(());
        }
        if self.nodes.insert_at(id, NodeData::default()) {
            Ok(())
        } else {
            Err(GraphError::NodeSlotTaken { node: id })
        }
    }

    /// Removes a node, its incident edges and its final mark.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        if id == self.initial {
            return Err(GraphError::InitialRemoval { node: id });
        }
        self.data(id)?;
        self.detach_and_remove(id);
        Ok(())
    }

    pub(crate) fn detach_and_remove(&mut self, id: NodeId) {
        let Some(data) = self.nodes.get(id) else {
            return;
        };
        let incident: Vec<EdgeKey> = data
            .incoming
            .iter()
            .chain(data.outgoing.iter())
            .cloned()
            .collect();
        for key in incident {
            self.unlink_edge(&key);
        }
        self.finals.remove(&id);
        if let Some(name) = self.nodes.remove(id).and_then(|d| d.name) {
            self.names.remove(&name);
        }
    }

    /// Adds an edge and returns its key.
    ///
    /// Rejects unknown endpoints, a final source, an existing edge with the
    /// same key, and probabilities outside `(0, 1]`.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: impl Into<String>,
        probability: f64,
    ) -> Result<EdgeKey, GraphError> {
        check_probability(probability)?;
        self.data(from)?;
        self.data(to)?;
        if self.finals.contains(&from) {
            return Err(GraphError::FinalSource { node: from });
        }
        let key = EdgeKey::new(from, to, label);
        if self.edges.contains_key(&key) {
            return Err(GraphError::DuplicateEdge { edge: key });
        }
        self.link_edge(key.clone(), probability);
        Ok(key)
    }

    /// Removes an edge and returns its probability.
    pub fn remove_edge(&mut self, key: &EdgeKey) -> Result<f64, GraphError> {
        self.unlink_edge(key)
            .ok_or_else(|| GraphError::UnknownEdge { edge: key.clone() })
    }

    /// Replaces the probability of an existing edge.
    pub fn set_probability(&mut self, key: &EdgeKey, probability: f64) -> Result<(), GraphError> {
        check_probability(probability)?;
        match self.edges.get_mut(key) {
            Some(p) => {
                *p = probability;
                Ok(())
            }
            None => Err(GraphError::UnknownEdge { edge: key.clone() }),
        }
    }

    pub(crate) fn link_edge(&mut self, key: EdgeKey, probability: f64) {
        if let Some(data) = self.nodes.get_mut(key.from) {
            data.outgoing.insert(key.clone());
        }
        if let Some(data) = self.nodes.get_mut(key.to) {
            data.incoming.insert(key.clone());
        }
        self.edges.insert(key, probability);
    }

    pub(crate) fn unlink_edge(&mut self, key: &EdgeKey) -> Option<f64> {
        let probability = self.edges.remove(key)?;
        if let Some(data) = self.nodes.get_mut(key.from) {
            data.outgoing.remove(key);
        }
        if let Some(data) = self.nodes.get_mut(key.to) {
            data.incoming.remove(key);
        }
        Some(probability)
    }

    pub(crate) fn data(&self, id: NodeId) -> Result<&NodeData, GraphError> {
        self.nodes
            .get(id)
            .ok_or(GraphError::UnknownNode { node: id })
    }

    // --- Queries ---

    /// Returns the initial node.
    pub fn initial(&self) -> NodeId {
        self.initial
    }

    /// Returns the final nodes in handle order.
    pub fn finals(&self) -> &BTreeSet<NodeId> {
        &self.finals
    }

    /// Returns `true` if `id` is a final node.
    pub fn is_final(&self, id: NodeId) -> bool {
        self.finals.contains(&id)
    }

    /// Returns `true` if `id` resolves to a live node.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Returns `true` if an edge with this key exists.
    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterates live nodes in handle order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|(id, _)| id)
    }

    /// Iterates edges in key order.
    pub fn edges(&self) -> impl Iterator<Item = (&EdgeKey, f64)> + '_ {
        self.edges.iter().map(|(k, &p)| (k, p))
    }

    /// Returns the probability of an edge, if present.
    pub fn probability(&self, key: &EdgeKey) -> Option<f64> {
        self.edges.get(key).copied()
    }

    /// Returns the edge with this key, if present.
    pub fn edge(&self, key: &EdgeKey) -> Option<Edge> {
        self.probability(key).map(|probability| Edge {
            key: key.clone(),
            probability,
        })
    }

    /// Returns the edges entering `id`.
    pub fn incoming(&self, id: NodeId) -> Result<Vec<Edge>, GraphError> {
        let data = self.data(id)?;
        Ok(self.collect(data.incoming.iter()))
    }

    /// Returns the edges leaving `id`.
    pub fn outgoing(&self, id: NodeId) -> Result<Vec<Edge>, GraphError> {
        let data = self.data(id)?;
        Ok(self.collect(data.outgoing.iter()))
    }

    /// Number of edges entering `id` (0 for unknown nodes).
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.nodes.get(id).map_or(0, |d| d.incoming.len())
    }

    /// Number of edges leaving `id` (0 for unknown nodes).
    pub fn out_degree(&self, id: NodeId) -> usize {
        self.nodes.get(id).map_or(0, |d| d.outgoing.len())
    }

    /// Returns all edges from `from` to `to`, whatever their label.
    pub fn edges_between(&self, from: NodeId, to: NodeId) -> Vec<Edge> {
        match self.nodes.get(from) {
            Some(data) => self.collect(data.outgoing.iter().filter(|k| k.to == to)),
            None => Vec::new(),
        }
    }

    fn collect<'a>(&self, keys: impl Iterator<Item = &'a EdgeKey>) -> Vec<Edge> {
        keys.filter_map(|k| self.edge(k)).collect()
    }

    // --- Initial and final marks ---

    /// Makes `id` the initial node.
    pub fn make_initial(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.data(id)?;
        self.initial = id;
        Ok(())
    }

    /// Marks `id` as final. Rejected while it has outgoing edges.
    pub fn make_final(&mut self, id: NodeId) -> Result<(), GraphError> {
        let count = self.data(id)?.outgoing.len();
        if count > 0 {
            return Err(GraphError::HasOutgoing { node: id, count });
        }
        self.finals.insert(id);
        Ok(())
    }

    /// Clears the final mark of `id`.
    pub fn unmark_final(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.data(id)?;
        self.finals.remove(&id);
        Ok(())
    }

    // --- Names ---

    /// Returns the explicit name of a node, if it has one.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).and_then(|d| d.name.as_deref())
    }

    /// Returns the name used for display: the explicit name, or `_<index>`.
    pub fn display_name(&self, id: NodeId) -> String {
        match self.name(id) {
            Some(name) => name.to_string(),
            None => format!("_{}", id.index()),
        }
    }

    /// Looks up a node by explicit name.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Resolves a display name back to a node: explicit names first, then
    /// `_<index>` for unnamed nodes.
    pub fn resolve_name(&self, name: &str) -> Option<NodeId> {
        if let Some(id) = self.node_by_name(name) {
            return Some(id);
        }
        let index: u32 = name.strip_prefix('_')?.parse().ok()?;
        self.nodes
            .id_at(index)
            .filter(|&id| self.name(id).is_none())
    }

    /// Copies every node, final mark and edge of `other` into this chain.
    ///
    /// The copy is not connected to the existing nodes and the initial node is
    /// unchanged. Returns the mapping from `other`'s handles to the new ones.
    pub fn attach(&mut self, other: &Dtmc) -> BTreeMap<NodeId, NodeId> {
        let mut mapping = BTreeMap::new();
        for (id, data) in other.nodes.iter() {
            let copy = match &data.name {
                Some(name) => self.add_named_node(name),
                None => self.add_node(),
            };
            mapping.insert(id, copy);
        }
        for f in &other.finals {
            if let Some(&copy) = mapping.get(f) {
                self.finals.insert(copy);
            }
        }
        for (key, &p) in &other.edges {
            if let (Some(&from), Some(&to)) = (mapping.get(&key.from), mapping.get(&key.to)) {
                self.link_edge(EdgeKey::new(from, to, key.label.clone()), p);
            }
        }
        mapping
    }
}

/// Validates a single edge probability.
pub(crate) fn check_probability(p: f64) -> Result<(), GraphError> {
    if p.is_finite() && p > 0.0 && p <= 1.0 + PROBABILITY_TOLERANCE {
        Ok(())
    } else {
        Err(GraphError::InvalidProbability { value: p })
    }
}

/// Formats the chain in the `i: ...; f: ...; edges;` text form.
impl fmt::Display for Dtmc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i: {}; f: ", self.display_name(self.initial))?;
        let finals: Vec<String> = self.finals.iter().map(|&n| self.display_name(n)).collect();
        write!(f, "{};", finals.join(","))?;
        if self.edges.is_empty() {
            return Ok(());
        }
        let edges: Vec<String> = self
            .edges
            .iter()
            .map(|(k, p)| {
                format!(
                    "{} --> {} (\"{}\":{})",
                    self.display_name(k.from),
                    self.display_name(k.to),
                    k.label,
                    p
                )
            })
            .collect();
        write!(f, " {};", edges.join(", "))
    }
}
