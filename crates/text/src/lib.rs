//! Text formats for DTMCs, SREs and their deltas.
//!
//! Every parser checks the input against a `regex` grammar before it builds
//! anything, and reports the offending token or line:
//!
//! ```text
//!   "((a:b)*0.2)[1]+c[2]"        --parse_sre-------->  Expr
//!   "i: s; f: t; s --> t (..);"  --parse_dtmc------->  Dtmc
//!   "s\nt\ns t 0.5 a"            --parse_dtmc------->  Dtmc
//!   "- s t a\n+ s t 0.5 b"       --parse_graph_delta->  GraphDelta
//!   "3 > \2 : c"                 --parse_expr_delta-->  ExprDelta
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use stochex_text::{format_indices, parse_dtmc, parse_expr_delta, parse_sre};
//!
//! let dtmc = parse_dtmc("0\n1\n0 1 0.23 a\n0 1 0.77 b").unwrap();
//! assert_eq!(dtmc.node_count(), 2);
//!
//! let sre = parse_sre("a : b").unwrap();
//! assert_eq!(format_indices(&sre), "( a : b)\n1 2   3");
//!
//! let delta = parse_expr_delta(&sre, "3 > c*0.5").unwrap();
//! assert_eq!(delta.apply(&sre).to_string(), "(a : (c*0.5))");
//! ```

pub mod delta;
pub mod dtmc;
pub mod error;
pub mod indices;
pub mod sre;

pub use delta::{parse_expr_delta, parse_graph_delta};
pub use dtmc::parse_dtmc;
pub use error::ParseError;
pub use indices::format_indices;
pub use sre::parse_sre;
