//! Error types for the stochex-expr crate.

/// Error type for all fallible operations in the stochex-expr crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExprError {
    /// Returned when a concatenation is built without children.
    #[error("concatenation needs at least one child")]
    EmptyConcat,

    /// Returned when a sum is built without branches.
    #[error("sum needs at least one branch")]
    EmptySum,

    /// Returned when a Kleene rate is NaN or outside `[0, 1]`.
    #[error("invalid Kleene rate: {rate} (must be in [0, 1])")]
    InvalidRate {
        /// The rejected rate.
        rate: f64,
    },

    /// Returned when an operation is not defined for an expression variant.
    #[error("unsupported operation: {operation}")]
    Unsupported {
        /// What was attempted.
        operation: String,
    },
}
