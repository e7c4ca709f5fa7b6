//! The expression tree.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ExprError;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an expression node.
///
/// Assigned once when a node is created. Cloning an [`Expr`] and rebuilding
/// an ancestor during a rewrite keep the id; [`Expr::deep_clone`] assigns new
/// ones. Deltas address subtrees by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u64);

impl ExprId {
    fn fresh() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A weighted alternative of a [`ExprKind::Sum`].
#[derive(Debug, Clone)]
pub struct Branch {
    /// The alternative.
    pub expr: Expr,
    /// Relative weight; the branch is taken with probability `weight / total`.
    pub weight: u64,
}

/// The four expression variants.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Emits the symbol with probability 1; `""` is ε.
    Atomic(String),
    /// Emits the children in order.
    Concat(Vec<Expr>),
    /// Emits one branch, chosen by weight.
    Sum(Vec<Branch>),
    /// Emits the child `k` times with probability `rate^k * (1 - rate)`.
    Kleene {
        /// Repeated expression.
        child: Expr,
        /// Probability of one more repetition.
        rate: f64,
    },
}

#[derive(Debug)]
struct Node {
    id: ExprId,
    kind: ExprKind,
}

/// A stochastic regular expression.
///
/// Trees are immutable and structurally shared, so `clone` is cheap. Every
/// node carries an [`ExprId`].
#[derive(Clone)]
pub struct Expr(Arc<Node>);

impl Expr {
    fn from_kind(kind: ExprKind) -> Self {
        Self(Arc::new(Node {
            id: ExprId::fresh(),
            kind,
        }))
    }

    /// Returns a node with the same id and a new body.
    pub(crate) fn with_kind(&self, kind: ExprKind) -> Self {
        Self(Arc::new(Node { id: self.id(), kind }))
    }

    /// An atomic expression emitting `symbol`.
    pub fn atomic(symbol: impl Into<String>) -> Self {
        Self::from_kind(ExprKind::Atomic(symbol.into()))
    }

    /// The empty string.
    pub fn epsilon() -> Self {
        Self::atomic("")
    }

    /// Expression that never terminates and so gives every string probability 0.
    pub fn null() -> Self {
        Self::from_kind(ExprKind::Kleene {
            child: Self::atomic("_"),
            rate: 1.0,
        })
    }

    /// Sequential composition of `children`.
    pub fn concat(children: Vec<Expr>) -> Result<Self, ExprError> {
        if children.is_empty() {
            return Err(ExprError::EmptyConcat);
        }
        Ok(Self::from_kind(ExprKind::Concat(children)))
    }

    /// Weighted choice between `branches`.
    pub fn sum(branches: Vec<(Expr, u64)>) -> Result<Self, ExprError> {
        if branches.is_empty() {
            return Err(ExprError::EmptySum);
        }
        let branches = branches
            .into_iter()
            .map(|(expr, weight)| Branch { expr, weight })
            .collect();
        Ok(Self::from_kind(ExprKind::Sum(branches)))
    }

    /// Geometric repetition of `child`.
    pub fn kleene(child: Expr, rate: f64) -> Result<Self, ExprError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ExprError::InvalidRate { rate });
        }
        Ok(Self::from_kind(ExprKind::Kleene { child, rate }))
    }

    // --- Accessors ---

    /// Stable id of this node.
    pub fn id(&self) -> ExprId {
        self.0.id
    }

    /// Variant and children of this node.
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// The symbol of an atomic node.
    pub fn symbol(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Atomic(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for the atomic ε.
    pub fn is_epsilon(&self) -> bool {
        self.symbol().is_some_and(str::is_empty)
    }

    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        match self.kind() {
            ExprKind::Atomic(_) => Vec::new(),
            ExprKind::Concat(children) => children.iter().collect(),
            ExprKind::Sum(branches) => branches.iter().map(|b| &b.expr).collect(),
            ExprKind::Kleene { child, .. } => vec![child],
        }
    }

    /// Returns `true` if both handles point at the same stored node.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Nodes in pre-order: a node before its children, children left to right.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Number of nodes, counting shared subtrees once per occurrence.
    pub fn size(&self) -> usize {
        self.preorder().count()
    }

    /// The node at a 1-based pre-order index.
    pub fn node_at(&self, index: usize) -> Option<Expr> {
        index
            .checked_sub(1)
            .and_then(|i| self.preorder().nth(i))
            .cloned()
    }

    /// The first node in pre-order with this id.
    pub fn find(&self, id: ExprId) -> Option<Expr> {
        self.preorder().find(|e| e.id() == id).cloned()
    }

    /// Ids of all nodes in pre-order.
    pub fn ids(&self) -> Vec<ExprId> {
        self.preorder().map(Expr::id).collect()
    }

    /// Structurally equal copy in which every node has a fresh id.
    pub fn deep_clone(&self) -> Expr {
        let kind = match self.kind() {
            ExprKind::Atomic(s) => ExprKind::Atomic(s.clone()),
            ExprKind::Concat(children) => {
                ExprKind::Concat(children.iter().map(Expr::deep_clone).collect())
            }
            ExprKind::Sum(branches) => ExprKind::Sum(
                branches
                    .iter()
                    .map(|b| Branch {
                        expr: b.expr.deep_clone(),
                        weight: b.weight,
                    })
                    .collect(),
            ),
            ExprKind::Kleene { child, rate } => ExprKind::Kleene {
                child: child.deep_clone(),
                rate: *rate,
            },
        };
        Expr::from_kind(kind)
    }

    /// Structural equality ignoring ids.
    ///
    /// Weights must match exactly; Kleene rates may differ by less than the
    /// sum of their units in the last place.
    pub fn deep_equals(&self, other: &Expr) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.kind(), other.kind()) {
            (ExprKind::Atomic(a), ExprKind::Atomic(b)) => a == b,
            (ExprKind::Concat(a), ExprKind::Concat(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_equals(y))
            }
            (ExprKind::Sum(a), ExprKind::Sum(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| x.weight == y.weight && x.expr.deep_equals(&y.expr))
            }
            (
                ExprKind::Kleene { child: c1, rate: r1 },
                ExprKind::Kleene { child: c2, rate: r2 },
            ) => rates_equal(*r1, *r2) && c1.deep_equals(c2),
            _ => false,
        }
    }

    /// Probability that this expression emits exactly `s`.
    ///
    /// Defined for atomic expressions and for sums whose branches are
    /// themselves supported. Concatenations and Kleene expressions are
    /// rejected; convert to a DTMC for general strings.
    pub fn probability(&self, s: &str) -> Result<f64, ExprError> {
        match self.kind() {
            ExprKind::Atomic(symbol) => Ok(if symbol == s { 1.0 } else { 0.0 }),
            ExprKind::Sum(branches) => {
                let total: f64 = branches.iter().map(|b| b.weight as f64).sum();
                if total == 0.0 {
                    return Ok(0.0);
                }
                branches.iter().try_fold(0.0, |acc, b| {
                    Ok(acc + b.weight as f64 / total * b.expr.probability(s)?)
                })
            }
            ExprKind::Concat(_) => Err(ExprError::Unsupported {
                operation: "string probability of a concatenation".to_string(),
            }),
            ExprKind::Kleene { .. } => Err(ExprError::Unsupported {
                operation: "string probability of a Kleene expression".to_string(),
            }),
        }
    }
}

/// Distance between `x` and the next representable float away from zero.
fn ulp(x: f64) -> f64 {
    let x = x.abs();
    if !x.is_finite() {
        return f64::INFINITY;
    }
    f64::from_bits(x.to_bits() + 1) - x
}

/// Rate comparison used by [`Expr::deep_equals`].
pub fn rates_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < ulp(a) + ulp(b)
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equals(other)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id(), self)
    }
}

/// Text syntax: `a`, `ε`, `(x : y)`, `(x[1] + y[2])`, `(x*0.5)`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Atomic(s) if s.is_empty() => write!(f, "ε"),
            ExprKind::Atomic(s) => write!(f, "{s}"),
            ExprKind::Concat(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " : ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            ExprKind::Sum(branches) => {
                write!(f, "(")?;
                for (i, b) in branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{}[{}]", b.expr, b.weight)?;
                }
                write!(f, ")")
            }
            ExprKind::Kleene { child, rate } => write!(f, "({child}*{rate})"),
        }
    }
}

/// Pre-order iterator over an expression; see [`Expr::preorder`].
pub struct Preorder<'a> {
    stack: Vec<&'a Expr>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<&'a Expr> {
        let next = self.stack.pop()?;
        match next.kind() {
            ExprKind::Atomic(_) => {}
            ExprKind::Concat(children) => self.stack.extend(children.iter().rev()),
            ExprKind::Sum(branches) => self.stack.extend(branches.iter().rev().map(|b| &b.expr)),
            ExprKind::Kleene { child, .. } => self.stack.push(child),
        }
        Some(next)
    }
}
