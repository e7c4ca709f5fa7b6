//! Algebraic normalization of expressions.

use crate::expr::{Branch, Expr, ExprKind};

impl Expr {
    /// Returns the normalized form of this expression, children first.
    ///
    /// - Concat: nested concatenations are flattened and ε children dropped;
    ///   no child left gives ε, one child gives that child.
    /// - Sum: deep-equal branches are merged by adding their weights; a
    ///   single remaining branch gives its expression. Nested sums are kept.
    /// - Kleene: rate 0 gives ε; a Kleene child is fused into one Kleene with
    ///   rate `1 - (1 - outer) / (1 - outer * inner)`; an ε child gives ε.
    ///
    /// The fused rate is the one the rewrite is defined with, not the exact
    /// distribution of nested repetition. Node ids are kept wherever a node
    /// survives with the same variant.
    pub fn simplify(&self) -> Expr {
        match self.kind() {
            ExprKind::Atomic(_) => self.clone(),
            ExprKind::Concat(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children {
                    push_flattened(child.simplify(), &mut flat);
                }
                match flat.len() {
                    0 => Expr::epsilon(),
                    1 => flat.swap_remove(0),
                    _ => self.with_kind(ExprKind::Concat(flat)),
                }
            }
            ExprKind::Sum(branches) => {
                let mut merged: Vec<Branch> = Vec::with_capacity(branches.len());
                for branch in branches {
                    let expr = branch.expr.simplify();
                    match merged.iter_mut().find(|m| m.expr.deep_equals(&expr)) {
                        Some(m) => m.weight = m.weight.saturating_add(branch.weight),
                        None => merged.push(Branch {
                            expr,
                            weight: branch.weight,
                        }),
                    }
                }
                debug_assert!(!merged.is_empty(), "sum without branches");
                if merged.len() == 1 {
                    merged.swap_remove(0).expr
                } else {
                    self.with_kind(ExprKind::Sum(merged))
                }
            }
            ExprKind::Kleene { child, rate } => {
                if *rate == 0.0 {
                    return Expr::epsilon();
                }
                let mut child = child.simplify();
                let mut rate = *rate;
                loop {
                    let (inner, inner_rate) = match child.kind() {
                        ExprKind::Kleene { child, rate } => (child.clone(), *rate),
                        _ => break,
                    };
                    rate = fused_rate(rate, inner_rate);
                    child = inner;
                }
                if child.is_epsilon() {
                    return Expr::epsilon();
                }
                self.with_kind(ExprKind::Kleene { child, rate })
            }
        }
    }
}

fn push_flattened(expr: Expr, out: &mut Vec<Expr>) {
    match expr.kind() {
        ExprKind::Concat(children) => {
            for child in children {
                push_flattened(child.clone(), out);
            }
        }
        ExprKind::Atomic(s) if s.is_empty() => {}
        _ => out.push(expr),
    }
}

/// Rate of `(x*inner)*outer` rewritten as a single Kleene.
pub(crate) fn fused_rate(outer: f64, inner: f64) -> f64 {
    let product = outer * inner;
    if product >= 1.0 {
        return 1.0;
    }
    1.0 - (1.0 - outer) / (1.0 - product)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn a() -> Expr {
        Expr::atomic("a")
    }

    fn b() -> Expr {
        Expr::atomic("b")
    }

    fn eps() -> Expr {
        Expr::epsilon()
    }

    #[test]
    fn concat_flattens_and_drops_epsilon() {
        let inner = Expr::concat(vec![eps(), b(), Expr::atomic("c")]).unwrap();
        let e = Expr::concat(vec![a(), eps(), inner]).unwrap();
        let s = e.simplify();
        assert_eq!(s.to_string(), "(a : b : c)");
        assert_eq!(s.id(), e.id());
    }

    #[test]
    fn concat_collapses() {
        assert!(Expr::concat(vec![eps(), eps()]).unwrap().simplify().is_epsilon());
        let single = a();
        let s = Expr::concat(vec![eps(), single.clone()]).unwrap().simplify();
        assert!(s.ptr_eq(&single));
    }

    #[test]
    fn sum_merges_equal_branches() {
        let e = Expr::sum(vec![(a(), 1), (b(), 2), (a(), 3)]).unwrap();
        assert_eq!(e.simplify().to_string(), "(a[4] + b[2])");
    }

    #[test]
    fn sum_collapses_to_single_branch() {
        let e = Expr::sum(vec![(a(), 1), (a(), 3)]).unwrap();
        assert_eq!(e.simplify(), a());
    }

    #[test]
    fn sum_keeps_nested_sums() {
        let inner = Expr::sum(vec![(a(), 1), (b(), 1)]).unwrap();
        let e = Expr::sum(vec![(inner, 1), (Expr::atomic("c"), 1)]).unwrap();
        assert_eq!(e.simplify().to_string(), "((a[1] + b[1])[1] + c[1])");
    }

    #[test]
    fn sum_weights_saturate() {
        let e = Expr::sum(vec![(a(), u64::MAX), (a(), 5), (b(), 1)]).unwrap();
        match e.simplify().kind() {
            ExprKind::Sum(branches) => assert_eq!(branches[0].weight, u64::MAX),
            other => panic!("expected a sum, got {other:?}"),
        }
    }

    #[test]
    fn kleene_rules() {
        assert!(Expr::kleene(a(), 0.0).unwrap().simplify().is_epsilon());
        assert!(Expr::kleene(eps(), 0.5).unwrap().simplify().is_epsilon());
        let nested = Expr::kleene(Expr::kleene(a(), 0.5).unwrap(), 0.5).unwrap();
        match nested.simplify().kind() {
            ExprKind::Kleene { child, rate } => {
                assert_eq!(child.symbol(), Some("a"));
                // 1 - 0.5 / 0.75
                assert_abs_diff_eq!(*rate, 1.0 / 3.0, epsilon = 1e-15);
            }
            other => panic!("expected a Kleene, got {other:?}"),
        }
    }

    #[test]
    fn triple_nesting_fuses_completely() {
        let e = Expr::kleene(
            Expr::kleene(Expr::kleene(a(), 0.2).unwrap(), 0.3).unwrap(),
            0.4,
        )
        .unwrap();
        let s = e.simplify();
        match s.kind() {
            ExprKind::Kleene { child, .. } => assert_eq!(child.symbol(), Some("a")),
            other => panic!("expected a Kleene, got {other:?}"),
        }
    }

    #[test]
    fn fused_rate_saturates() {
        assert_abs_diff_eq!(fused_rate(1.0, 1.0), 1.0);
        assert_abs_diff_eq!(fused_rate(1.0, 0.5), 1.0);
    }

    #[test]
    fn simplify_works_bottom_up() {
        // ((a : ε) + (a))[..] -> a merged
        let left = Expr::concat(vec![a(), eps()]).unwrap();
        let e = Expr::sum(vec![(left, 1), (a(), 1)]).unwrap();
        assert_eq!(e.simplify(), a());
    }
}
