//! Stochastic regular expressions (SREs).
//!
//! An SRE is a regular expression whose choices carry integer weights and
//! whose repetitions carry a continuation probability, so it defines a
//! probability distribution over strings:
//!
//! | Variant | Emits |
//! |---------|-------|
//! | `Atomic(s)` | `s` with probability 1 (`""` is ε) |
//! | `Concat(x, y, ..)` | the children in sequence |
//! | `Sum(x[w1], y[w2], ..)` | branch *i* with probability `w_i / Σw` |
//! | `Kleene(x, r)` | `x` repeated `k` times with probability `r^k (1 - r)` |
//!
//! Trees are immutable and shared through [`std::sync::Arc`]. Every node has
//! a stable [`ExprId`], which [`ExprDelta`] uses to address subtrees.
//!
//! # Quick start
//!
//! ```rust
//! use stochex_expr::Expr;
//!
//! let ab = Expr::concat(vec![Expr::atomic("a"), Expr::epsilon(), Expr::atomic("b")]).unwrap();
//! let e = Expr::sum(vec![(ab, 1), (Expr::atomic("c"), 2)]).unwrap();
//!
//! assert_eq!(e.simplify().to_string(), "((a : b)[1] + c[2])");
//! ```

pub mod delta;
pub mod error;
pub mod expr;
mod simplify;
pub mod visit;

pub use delta::ExprDelta;
pub use error::ExprError;
pub use expr::{Branch, Expr, ExprId, ExprKind, Preorder, rates_equal};
pub use visit::Visitor;
