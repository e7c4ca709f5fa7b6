//! Error types for the stochex-text crate.

use stochex_expr::ExprError;
use stochex_graph::GraphError;

/// Error type for all parsers in the stochex-text crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    /// Returned when an expression does not follow the SRE syntax.
    #[error("syntax error at token {position}: {reason}")]
    Syntax {
        /// Zero-based index of the offending token.
        position: usize,
        /// What was expected or found.
        reason: String,
    },

    /// Returned when a line of a line-based format is malformed.
    #[error("line {line}: {reason}")]
    Line {
        /// One-based line number.
        line: usize,
        /// What is wrong with the line.
        reason: String,
    },

    /// Returned when the input matches none of the accepted DTMC layouts.
    #[error("input is neither an `i: ..; f: ..;` chain nor an initial/finals/edges listing")]
    UnknownLayout,

    /// Returned when a delta names a node the chain does not have.
    #[error("unknown node name '{name}'")]
    UnknownNode {
        /// The unresolved name.
        name: String,
    },

    /// Returned when a pre-order index does not address a node.
    #[error("index {index} is outside 1..={size}")]
    IndexOutOfRange {
        /// The requested one-based index.
        index: usize,
        /// Number of nodes in the expression.
        size: usize,
    },

    /// Wraps a rejected graph mutation.
    #[error("invalid chain: {0}")]
    Graph(#[from] GraphError),

    /// Wraps a rejected expression construction.
    #[error("invalid expression: {0}")]
    Expr(#[from] ExprError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_syntax() {
        let e = ParseError::Syntax {
            position: 3,
            reason: "expected ')'".to_string(),
        };
        assert_eq!(e.to_string(), "syntax error at token 3: expected ')'");
    }

    #[test]
    fn error_line() {
        let e = ParseError::Line {
            line: 4,
            reason: "expected `from to p [label]`".to_string(),
        };
        assert_eq!(e.to_string(), "line 4: expected `from to p [label]`");
    }

    #[test]
    fn error_unknown_layout() {
        assert!(ParseError::UnknownLayout.to_string().starts_with("input is neither"));
    }

    #[test]
    fn error_unknown_node() {
        let e = ParseError::UnknownNode {
            name: "q7".to_string(),
        };
        assert_eq!(e.to_string(), "unknown node name 'q7'");
    }

    #[test]
    fn error_index_out_of_range() {
        let e = ParseError::IndexOutOfRange { index: 9, size: 5 };
        assert_eq!(e.to_string(), "index 9 is outside 1..=5");
    }

    #[test]
    fn error_wraps_graph_error() {
        let e = ParseError::from(GraphError::InvalidProbability { value: 2.0 });
        assert_eq!(
            e.to_string(),
            "invalid chain: invalid probability: 2 (must be in (0, 1])"
        );
    }

    #[test]
    fn error_wraps_expr_error() {
        let e = ParseError::from(ExprError::EmptySum);
        assert!(e.to_string().starts_with("invalid expression: "));
    }

    #[test]
    fn error_is_std_error() {
        fn assert_impl<T: std::error::Error>() {}
        assert_impl::<ParseError>();
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<ParseError>();
    }
}
