//! DTMC text layouts.
//!
//! Form A, the layout [`Dtmc`]'s `Display` writes:
//!
//! ```text
//! i: s; f: t,u; s --> t ("a":0.5), s --> u ("b":0.5);
//! ```
//!
//! Form B, one item per line: the initial node, the space-separated final
//! nodes, then `from to probability [label]` edges. The label defaults to
//! `a<to>` and `,` is accepted as the decimal separator.
//!
//! Node names match `\w+`. Both forms are simplified after parsing.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use stochex_graph::{Dtmc, NodeId};

use crate::error::ParseError;

const EDGE_A: &str = r#"(\w+)\s*-->\s*(\w+)\s*\(\s*"([^\s"]*)"\s*:\s*(\d+(?:\.\d+)?)\s*\)"#;

static FORM_A: LazyLock<Regex> = LazyLock::new(|| {
    let edges = format!(r"(?:{e}(?:\s*,\s*{e})*\s*;?)?", e = EDGE_A);
    Regex::new(&format!(
        r"^\s*i:\s*(\w+)\s*;\s*f:\s*((?:\w+\s*,\s*)*\w+)?\s*;\s*(?P<edges>{edges})\s*$"
    ))
    .expect("form A pattern is valid")
});

static EDGE_A_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EDGE_A).expect("edge pattern is valid"));

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+$").expect("name pattern is valid"));

static NAMES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\w+(?:\s+\w+)*)?$").expect("names pattern is valid"));

static EDGE_B: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)\s+(\w+)\s+(\d+(?:[.,]\d+)?(?:[eE]-?\d+)?)(?:\s+(\S+))?$")
        .expect("edge pattern is valid")
});

/// Parses a DTMC in either layout and simplifies it.
pub fn parse_dtmc(input: &str) -> Result<Dtmc, ParseError> {
    let trimmed = input.trim();
    let mut dtmc = if let Some(caps) = FORM_A.captures(trimmed) {
        form_a(&caps)?
    } else if trimmed.starts_with("i:") {
        return Err(ParseError::Line {
            line: 1,
            reason: "malformed `i: ..; f: ..; edges;` chain".to_string(),
        });
    } else if looks_like_form_b(trimmed) {
        form_b(trimmed)?
    } else {
        return Err(ParseError::UnknownLayout);
    };
    dtmc.simplify();
    debug!(
        nodes = dtmc.node_count(),
        edges = dtmc.edge_count(),
        "parsed chain"
    );
    Ok(dtmc)
}

/// Maps the `ε` label token to the empty label.
pub(crate) fn label(token: &str) -> String {
    if token == "ε" {
        String::new()
    } else {
        token.to_string()
    }
}

/// Parses a probability, accepting `,` as the decimal separator.
pub(crate) fn probability(token: &str, line: usize) -> Result<f64, ParseError> {
    token
        .replace(',', ".")
        .parse()
        .map_err(|_| ParseError::Line {
            line,
            reason: format!("invalid probability '{token}'"),
        })
}

/// Node table that creates named nodes on first use.
struct Names {
    dtmc: Dtmc,
    ids: HashMap<String, NodeId>,
}

impl Names {
    fn new(initial: &str) -> Self {
        let dtmc = Dtmc::with_initial_name(initial);
        let ids = HashMap::from([(initial.to_string(), dtmc.initial())]);
        Self { dtmc, ids }
    }

    fn node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.dtmc.add_named_node(name);
        self.ids.insert(name.to_string(), id);
        id
    }
}

fn form_a(caps: &regex::Captures<'_>) -> Result<Dtmc, ParseError> {
    let mut names = Names::new(&caps[1]);
    if let Some(finals) = caps.get(2) {
        for name in finals.as_str().split(',').map(str::trim) {
            let id = names.node(name);
            names.dtmc.make_final(id)?;
        }
    }
    let edges = caps.name("edges").map_or("", |m| m.as_str());
    for edge in EDGE_A_RE.captures_iter(edges) {
        let from = names.node(&edge[1]);
        let to = names.node(&edge[2]);
        let p = probability(&edge[4], 1)?;
        names.dtmc.add_edge(from, to, &edge[3], p)?;
    }
    Ok(names.dtmc)
}

fn looks_like_form_b(input: &str) -> bool {
    let mut lines = input.lines();
    matches!(lines.next(), Some(first) if NAME.is_match(first.trim())) && lines.next().is_some()
}

fn form_b(input: &str) -> Result<Dtmc, ParseError> {
    let lines: Vec<&str> = input.lines().map(str::trim).collect();
    let mut names = Names::new(lines[0]);
    if !NAMES.is_match(lines[1]) {
        return Err(ParseError::Line {
            line: 2,
            reason: "expected space-separated final node names".to_string(),
        });
    }
    for name in lines[1].split_whitespace() {
        let id = names.node(name);
        names.dtmc.make_final(id)?;
    }
    for (i, line) in lines.iter().enumerate().skip(2) {
        if line.is_empty() {
            continue;
        }
        let Some(edge) = EDGE_B.captures(line) else {
            return Err(ParseError::Line {
                line: i + 1,
                reason: "expected `from to probability [label]`".to_string(),
            });
        };
        let from = names.node(&edge[1]);
        let to = names.node(&edge[2]);
        let p = probability(&edge[3], i + 1)?;
        let label = match edge.get(4) {
            Some(l) => label(l.as_str()),
            None => format!("a{}", &edge[2]),
        };
        names.dtmc.add_edge(from, to, label, p)?;
    }
    Ok(names.dtmc)
}
