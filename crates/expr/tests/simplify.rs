use stochex_expr::{Expr, ExprDelta, ExprKind};

fn sym(s: &str) -> Expr {
    Expr::atomic(s)
}

fn cat(children: Vec<Expr>) -> Expr {
    Expr::concat(children).unwrap()
}

fn sum(branches: Vec<(Expr, u64)>) -> Expr {
    Expr::sum(branches).unwrap()
}

fn star(child: Expr, rate: f64) -> Expr {
    Expr::kleene(child, rate).unwrap()
}

/// Hand-built trees covering every rewrite rule, alone and nested.
fn corpus() -> Vec<Expr> {
    let eps = Expr::epsilon();
    vec![
        sym("a"),
        eps.clone(),
        cat(vec![sym("a"), cat(vec![eps.clone(), sym("b")]), eps.clone()]),
        cat(vec![eps.clone(), eps.clone()]),
        sum(vec![(sym("a"), 1), (sym("a"), 2), (sym("b"), 3)]),
        sum(vec![(cat(vec![sym("a"), eps.clone()]), 1), (sym("a"), 1)]),
        sum(vec![(sum(vec![(sym("a"), 1), (sym("b"), 1)]), 2), (sym("c"), 1)]),
        star(sym("a"), 0.0),
        star(eps.clone(), 0.7),
        star(star(sym("a"), 0.5), 0.5),
        star(star(star(sym("a"), 0.2), 0.3), 0.4),
        star(cat(vec![eps.clone(), star(sym("a"), 0.5)]), 0.5),
        cat(vec![
            star(sum(vec![(sym("a"), 1), (cat(vec![sym("b"), eps.clone()]), 1)]), 0.25),
            sum(vec![(eps.clone(), 1), (eps, 4)]),
            sym("c"),
        ]),
        Expr::null(),
    ]
}

// ---------------------------------------------------------------------------
// 1. simplify_is_idempotent
// ---------------------------------------------------------------------------
#[test]
fn simplify_is_idempotent() {
    for e in corpus() {
        let once = e.simplify();
        let twice = once.simplify();
        assert!(twice.deep_equals(&once), "{e} -> {once} -> {twice}");
    }
}

// ---------------------------------------------------------------------------
// 2. simplified_trees_are_normal
// ---------------------------------------------------------------------------
#[test]
fn simplified_trees_are_normal() {
    for e in corpus() {
        let s = e.simplify();
        for node in s.preorder() {
            match node.kind() {
                ExprKind::Concat(children) => {
                    assert!(children.len() >= 2, "{s}");
                    for c in children {
                        assert!(!c.is_epsilon(), "{s}");
                        assert!(!matches!(c.kind(), ExprKind::Concat(_)), "{s}");
                    }
                }
                ExprKind::Sum(branches) => {
                    assert!(branches.len() >= 2, "{s}");
                    for (i, x) in branches.iter().enumerate() {
                        for y in &branches[i + 1..] {
                            assert!(!x.expr.deep_equals(&y.expr), "{s}");
                        }
                    }
                }
                ExprKind::Kleene { child, rate } => {
                    assert!(*rate > 0.0, "{s}");
                    assert!(!child.is_epsilon(), "{s}");
                    assert!(!matches!(child.kind(), ExprKind::Kleene { .. }), "{s}");
                }
                ExprKind::Atomic(_) => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 3. delta_then_simplify
// ---------------------------------------------------------------------------
#[test]
fn delta_then_simplify() {
    // ((a : b)*0.2)[1] + c[2], replace b by ε: the Kleene body becomes just a.
    let b = sym("b");
    let e = sum(vec![(star(cat(vec![sym("a"), b.clone()]), 0.2), 1), (sym("c"), 2)]);
    let mut delta = ExprDelta::new();
    delta.add_change(b.id(), Expr::epsilon());
    let out = delta.apply(&e).simplify();
    assert_eq!(out.to_string(), "((a*0.2)[1] + c[2])");
}
