//! Exact transformations between DTMCs and SREs, one-shot and incremental.
//!
//! Both directions preserve the distribution over strings: the constructor
//! builds one automaton fragment per expression node, and the eliminator
//! removes chain nodes one at a time while accumulating path expressions.
//!
//! # Pipeline
//!
//! ```text
//!  ┌──────────┐   to_dtmc / SreToDtmc   ┌──────────┐
//!  │   Expr   │────────────────────────▶│   Dtmc   │
//!  │  (SRE)   │◀────────────────────────│  (DTMC)  │
//!  └──────────┘   to_sre / DtmcToSre    └──────────┘
//!       ▲                                     ▲
//!   ExprDelta ──────▶ SreToDtmc ──────▶ GraphDelta
//!   ExprDelta ◀────── DtmcToSre ◀────── GraphChange::Refine
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use stochex_expr::Expr;
//! use stochex_transform::{TransformConfig, to_dtmc, to_sre};
//!
//! let ab = Expr::concat(vec![Expr::atomic("a"), Expr::atomic("b")]).unwrap();
//! let e = Expr::sum(vec![(Expr::kleene(ab, 0.2).unwrap(), 1), (Expr::atomic("c"), 2)]).unwrap();
//!
//! let config = TransformConfig::new();
//! let dtmc = to_dtmc(&e, &config).unwrap();
//! let back = to_dtmc(&to_sre(&dtmc, &config).unwrap(), &config).unwrap();
//!
//! let p = dtmc.string_probability("ab");
//! assert!(p > 0.0);
//! assert!((back.string_probability("ab") - p).abs() < 1e-6);
//! assert_eq!(back.string_probability("x"), 0.0);
//! ```

mod compose;
pub mod config;
mod construct;
pub mod dtmc_to_sre;
mod eliminate;
pub mod error;
mod fragments;
mod recorder;
pub mod sre_to_dtmc;

pub use config::{DEFAULT_WEIGHT_SCALE, TransformConfig};
pub use dtmc_to_sre::DtmcToSre;
pub use error::TransformError;
pub use sre_to_dtmc::SreToDtmc;

use stochex_expr::Expr;
use stochex_graph::Dtmc;
use tracing::debug;

use crate::compose::Composer;

/// A live pair of models kept consistent under edits of one side.
pub trait Transformer {
    /// The model edits are submitted for.
    type Source;
    /// The model kept in step.
    type Target;
    /// Edit of the source.
    type SourceDelta;
    /// Resulting edit of the target.
    type TargetDelta;

    fn source(&self) -> &Self::Source;

    fn target(&self) -> &Self::Target;

    /// Applies `delta` to the source, updates the target and returns the
    /// target's edit.
    fn apply_delta(
        &mut self,
        delta: &Self::SourceDelta,
    ) -> Result<Self::TargetDelta, TransformError>;
}

/// Builds a chain with the string distribution of `expr`.
///
/// The chain is simplified unless
/// [`TransformConfig::simplify_output`] is off.
#[tracing::instrument(skip_all, fields(size = expr.size()))]
pub fn to_dtmc(expr: &Expr, config: &TransformConfig) -> Result<Dtmc, TransformError> {
    config.validate()?;
    let mut dtmc = construct::build_compact(expr)?;
    if config.simplify_output() {
        dtmc.simplify();
    }
    debug!(
        nodes = dtmc.node_count(),
        edges = dtmc.edge_count(),
        "constructed chain"
    );
    Ok(dtmc)
}

/// Eliminates `dtmc` into an expression with the same string distribution.
///
/// Sum weights are the branch probabilities scaled by
/// [`TransformConfig::weight_scale`]. A chain that never accepts yields
/// [`Expr::null`].
#[tracing::instrument(skip_all, fields(nodes = dtmc.node_count(), edges = dtmc.edge_count()))]
pub fn to_sre(dtmc: &Dtmc, config: &TransformConfig) -> Result<Expr, TransformError> {
    config.validate()?;
    let composer = Composer::new(config);
    eliminate::eliminate(
        dtmc,
        &composer,
        |key| Expr::atomic(key.label.clone()),
        |_| Expr::epsilon(),
    )
}
