//! Depth-first traversal with rewriting.

use crate::expr::{Branch, Expr, ExprKind};

/// Callbacks of [`Expr::traverse`].
///
/// `post_order` returns the node the parent should hold; returning the
/// argument unchanged keeps the tree as it is.
pub trait Visitor {
    /// Called when a node is entered.
    fn pre_order(&mut self, _expr: &Expr) {}

    /// Called between consecutive children of a concatenation or sum.
    fn in_order(&mut self, _expr: &Expr) {}

    /// Called when a node is left. `weight` is the branch weight when the
    /// parent is a sum.
    fn post_order(&mut self, expr: Expr, _weight: Option<u64>) -> Expr {
        expr
    }
}

impl Expr {
    /// Walks the tree once, depth first, and returns the rewritten tree.
    ///
    /// A node whose children were replaced is rebuilt with its original id;
    /// untouched subtrees are shared with the input.
    pub fn traverse<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Expr {
        walk(self, visitor, None)
    }
}

fn walk<V: Visitor + ?Sized>(expr: &Expr, visitor: &mut V, weight: Option<u64>) -> Expr {
    visitor.pre_order(expr);
    let rebuilt = match expr.kind() {
        ExprKind::Atomic(_) => expr.clone(),
        ExprKind::Concat(children) => {
            let mut changed = false;
            let mut next = Vec::with_capacity(children.len());
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    visitor.in_order(expr);
                }
                let c = walk(child, visitor, None);
                changed |= !c.ptr_eq(child);
                next.push(c);
            }
            if changed {
                expr.with_kind(ExprKind::Concat(next))
            } else {
                expr.clone()
            }
        }
        ExprKind::Sum(branches) => {
            let mut changed = false;
            let mut next = Vec::with_capacity(branches.len());
            for (i, branch) in branches.iter().enumerate() {
                if i > 0 {
                    visitor.in_order(expr);
                }
                let c = walk(&branch.expr, visitor, Some(branch.weight));
                changed |= !c.ptr_eq(&branch.expr);
                next.push(Branch {
                    expr: c,
                    weight: branch.weight,
                });
            }
            if changed {
                expr.with_kind(ExprKind::Sum(next))
            } else {
                expr.clone()
            }
        }
        ExprKind::Kleene { child, rate } => {
            let c = walk(child, visitor, None);
            if c.ptr_eq(child) {
                expr.clone()
            } else {
                expr.with_kind(ExprKind::Kleene {
                    child: c,
                    rate: *rate,
                })
            }
        }
    };
    visitor.post_order(rebuilt, weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records the callback sequence as text.
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl Visitor for Trace {
        fn pre_order(&mut self, expr: &Expr) {
            self.0.push(format!("pre {}", label(expr)));
        }

        fn in_order(&mut self, expr: &Expr) {
            self.0.push(format!("in {}", label(expr)));
        }

        fn post_order(&mut self, expr: Expr, weight: Option<u64>) -> Expr {
            match weight {
                Some(w) => self.0.push(format!("post {} [{w}]", label(&expr))),
                None => self.0.push(format!("post {}", label(&expr))),
            }
            expr
        }
    }

    fn label(expr: &Expr) -> &str {
        match expr.kind() {
            ExprKind::Atomic(s) => s.as_str(),
            ExprKind::Concat(_) => ":",
            ExprKind::Sum(_) => "+",
            ExprKind::Kleene { .. } => "*",
        }
    }

    #[test]
    fn callbacks_follow_depth_first_order() {
        // (a[1] + (b*0.5)[2])
        let e = Expr::sum(vec![
            (Expr::atomic("a"), 1),
            (Expr::kleene(Expr::atomic("b"), 0.5).unwrap(), 2),
        ])
        .unwrap();
        let mut trace = Trace::default();
        let out = e.traverse(&mut trace);
        assert!(out.ptr_eq(&e));
        assert_eq!(
            trace.0,
            vec![
                "pre +", "pre a", "post a [1]", "in +", "pre *", "pre b", "post b", "post * [2]",
                "post +",
            ]
        );
    }

    #[test]
    fn in_order_only_between_children() {
        let e = Expr::concat(vec![Expr::atomic("a"), Expr::atomic("b"), Expr::atomic("c")]).unwrap();
        let mut trace = Trace::default();
        e.traverse(&mut trace);
        assert_eq!(trace.0.iter().filter(|s| s.starts_with("in")).count(), 2);
    }

    struct Rename;

    impl Visitor for Rename {
        fn post_order(&mut self, expr: Expr, _weight: Option<u64>) -> Expr {
            match expr.symbol() {
                Some("a") => Expr::atomic("z"),
                _ => expr,
            }
        }
    }

    #[test]
    fn rewriting_keeps_ancestor_ids_and_shares_untouched_subtrees() {
        let untouched = Expr::kleene(Expr::atomic("b"), 0.5).unwrap();
        let e = Expr::concat(vec![Expr::atomic("a"), untouched.clone()]).unwrap();
        let out = e.traverse(&mut Rename);
        assert_eq!(out.to_string(), "(z : (b*0.5))");
        assert_eq!(out.id(), e.id());
        assert!(!out.ptr_eq(&e));
        assert!(out.children()[1].ptr_eq(&untouched));
        // The input is unchanged.
        assert_eq!(e.to_string(), "(a : (b*0.5))");
    }
}
