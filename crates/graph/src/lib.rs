//! Labeled probabilistic graphs: discrete-time Markov chains whose edges emit
//! symbols.
//!
//! A [`Dtmc`] has one initial node and a set of final nodes; a run starts in
//! the initial node, follows edges according to their probabilities, emits
//! each edge's label and stops when it reaches a final node. The chain thus
//! defines a probability distribution over strings.
//!
//! # Layout
//!
//! ```text
//! stochex-graph
//! ├── arena     generational node handles (NodeId)
//! ├── model     Dtmc, EdgeKey, Edge
//! ├── simplify  ε-fusion and pruning
//! ├── analysis  string probability, sampling, row-sum check
//! └── delta     GraphDelta, RestrictedGraphDelta, GraphChange
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use stochex_graph::Dtmc;
//!
//! let mut dtmc = Dtmc::new();
//! let end = dtmc.add_node();
//! dtmc.add_edge(dtmc.initial(), end, "a", 0.25).unwrap();
//! dtmc.add_edge(dtmc.initial(), end, "b", 0.75).unwrap();
//! dtmc.make_final(end).unwrap();
//!
//! assert!(dtmc.validate().is_ok());
//! assert!((dtmc.string_probability("b") - 0.75).abs() < 1e-12);
//! ```

pub mod analysis;
pub mod arena;
pub mod delta;
pub mod error;
pub mod model;
mod simplify;

pub use arena::NodeId;
pub use delta::{GraphChange, GraphDelta, RestrictedGraphDelta, Splice};
pub use error::GraphError;
pub use model::{Dtmc, Edge, EdgeKey, PROBABILITY_TOLERANCE};
