//! Error types for the stochex-graph crate.

use crate::arena::NodeId;
use crate::model::EdgeKey;

/// Error type for all fallible operations in the stochex-graph crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    /// Returned when a node handle does not resolve to a live node.
    #[error("unknown node {node}")]
    UnknownNode {
        /// The unresolved handle.
        node: NodeId,
    },

    /// Returned when an edge is not present in the graph.
    #[error("unknown edge {edge}")]
    UnknownEdge {
        /// The missing edge.
        edge: EdgeKey,
    },

    /// Returned when an edge with the same `(from, to, label)` already exists.
    #[error("duplicate edge {edge}")]
    DuplicateEdge {
        /// The conflicting edge.
        edge: EdgeKey,
    },

    /// Returned when an outgoing edge would be added to a final node.
    #[error("cannot add an outgoing edge to final node {node}")]
    FinalSource {
        /// The final node.
        node: NodeId,
    },

    /// Returned when a node with outgoing edges would be marked final.
    #[error("cannot mark node {node} as final: it has {count} outgoing edges")]
    HasOutgoing {
        /// The node.
        node: NodeId,
        /// Number of outgoing edges.
        count: usize,
    },

    /// Returned when the initial node would be removed.
    #[error("cannot remove initial node {node}")]
    InitialRemoval {
        /// The initial node.
        node: NodeId,
    },

    /// Returned when an edge probability is outside `(0, 1]`.
    #[error("invalid probability: {value} (must be in (0, 1])")]
    InvalidProbability {
        /// The rejected value.
        value: f64,
    },

    /// Returned when a node cannot be re-created at a specific arena slot.
    #[error("node slot for {node} is already taken")]
    NodeSlotTaken {
        /// The requested handle.
        node: NodeId,
    },

    /// Returned when the outgoing probabilities of a non-final node do not sum to 1.
    #[error("outgoing probabilities of node {node} sum to {sum}, expected ~1.0")]
    NotStochastic {
        /// The offending node.
        node: NodeId,
        /// Sum of its outgoing probabilities.
        sum: f64,
    },
}
