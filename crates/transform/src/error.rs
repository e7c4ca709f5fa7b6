//! Error types for the stochex-transform crate.

use stochex_expr::{ExprError, ExprId};
use stochex_graph::{EdgeKey, GraphError};

/// Error type for all fallible operations in the stochex-transform crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransformError {
    /// Wraps a rejected graph operation.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Wraps a rejected expression operation.
    #[error("expression error: {0}")]
    Expr(#[from] ExprError),

    /// Returned when a transformer receives a delta variant it cannot apply.
    #[error("unsupported delta: {what}")]
    Unsupported {
        /// The rejected delta variant.
        what: String,
    },

    /// Returned when a sum has no branch with a positive weight.
    #[error("sum has no branch with a positive weight")]
    ZeroWeightSum,

    /// Returned when an expression delta addresses a subtree that was never built.
    #[error("no subtree with id {id} in the current expression")]
    UnknownSubtree {
        /// The unresolved id.
        id: ExprId,
    },

    /// Returned when a graph delta refines an edge without a reference leaf.
    #[error("edge {edge} has no reference leaf")]
    UnknownEdge {
        /// The edge.
        edge: EdgeKey,
    },

    /// Returned when a [`TransformConfig`](crate::TransformConfig) fails validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },

    /// Returned when internal bookkeeping is inconsistent.
    #[error("internal error: {reason}")]
    Internal {
        /// The broken invariant.
        reason: String,
    },
}
