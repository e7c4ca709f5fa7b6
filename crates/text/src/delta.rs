//! Line-based delta formats.
//!
//! Graph deltas, nodes by name (see [`Dtmc::resolve_name`]):
//!
//! ```text
//! + from to p label          add an edge
//! - from to label            remove an edge
//! from to label > from to p label   replace an edge
//! ```
//!
//! SRE deltas, one `index > replacement` per line. Indices are 1-based
//! pre-order positions in the original expression (see
//! [`format_indices`](crate::format_indices)); `\N` inside a replacement
//! pastes the subtree at index `N`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use stochex_expr::{Expr, ExprDelta};
use stochex_graph::{Dtmc, GraphDelta, NodeId};

use crate::dtmc::{label, probability};
use crate::error::ParseError;
use crate::sre::parse_raw;

const P: &str = r"\d+(?:[.,]\d+)?(?:[eE]-?\d+)?";

static ADD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\+\s*(\w+)\s+(\w+)\s+({P})\s+(\S+)$")).expect("add pattern is valid")
});

static REMOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-\s*(\w+)\s+(\w+)\s+(\S+)$").expect("remove pattern is valid")
});

static REPLACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(\w+)\s+(\w+)\s+(\S+)\s*>\s*(\w+)\s+(\w+)\s+({P})\s+(\S+)$"
    ))
    .expect("replace pattern is valid")
});

static SRE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*>\s*(.+)$").expect("delta line pattern is valid"));

/// Parses a graph delta against the chain whose nodes it names.
pub fn parse_graph_delta(dtmc: &Dtmc, input: &str) -> Result<GraphDelta, ParseError> {
    let mut delta = GraphDelta::new();
    for (i, line) in lines(input) {
        if let Some(caps) = ADD.captures(line) {
            let p = probability(&caps[3], i)?;
            delta.add_edge(node(dtmc, &caps[1])?, node(dtmc, &caps[2])?, label(&caps[4]), p)?;
        } else if let Some(caps) = REMOVE.captures(line) {
            delta.remove_edge(node(dtmc, &caps[1])?, node(dtmc, &caps[2])?, label(&caps[3]));
        } else if let Some(caps) = REPLACE.captures(line) {
            delta.remove_edge(node(dtmc, &caps[1])?, node(dtmc, &caps[2])?, label(&caps[3]));
            let p = probability(&caps[6], i)?;
            delta.add_edge(node(dtmc, &caps[4])?, node(dtmc, &caps[5])?, label(&caps[7]), p)?;
        } else {
            return Err(ParseError::Line {
                line: i,
                reason: "expected `+ from to p label`, `- from to label` or a replacement"
                    .to_string(),
            });
        }
    }
    debug!(
        added = delta.added_edges().len(),
        removed = delta.removed_edges().len(),
        "parsed graph delta"
    );
    Ok(delta)
}

/// Parses an SRE delta against the expression it indexes.
///
/// Replacements are kept as written, so pasted subtrees keep their ids.
pub fn parse_expr_delta(expr: &Expr, input: &str) -> Result<ExprDelta, ParseError> {
    let mut delta = ExprDelta::new();
    for (i, line) in lines(input) {
        let Some(caps) = SRE_LINE.captures(line) else {
            return Err(ParseError::Line {
                line: i,
                reason: "expected `index > replacement`".to_string(),
            });
        };
        let index: usize = caps[1].parse().map_err(|_| ParseError::Line {
            line: i,
            reason: format!("index {} is too large", &caps[1]),
        })?;
        let target = expr.node_at(index).ok_or(ParseError::IndexOutOfRange {
            index,
            size: expr.size(),
        })?;
        let replacement = parse_raw(&caps[2], Some(expr)).map_err(|e| at_line(i, e))?;
        delta.add_change(target.id(), replacement);
    }
    debug!(changes = delta.len(), "parsed expression delta");
    Ok(delta)
}

/// Non-blank trimmed lines with their 1-based numbers.
fn lines(input: &str) -> impl Iterator<Item = (usize, &str)> {
    input
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
}

fn node(dtmc: &Dtmc, name: &str) -> Result<NodeId, ParseError> {
    dtmc.resolve_name(name).ok_or_else(|| ParseError::UnknownNode {
        name: name.to_string(),
    })
}

fn at_line(line: usize, e: ParseError) -> ParseError {
    match e {
        ParseError::Syntax { .. } => ParseError::Line {
            line,
            reason: e.to_string(),
        },
        other => other,
    }
}
