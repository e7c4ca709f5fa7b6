//! Pre-order index listing used to author SRE deltas.

use stochex_expr::{Expr, ExprKind, Visitor};

/// Formats `expr` on one line and, below it, the 1-based pre-order index
/// of every node at the column where the node starts.
///
/// The expression line is padded with spaces wherever an index would
/// otherwise run into the next one; it still parses as the same SRE.
///
/// ```text
/// ( ( a : b)[1] + c[2])
/// 1 2 3   4       5
/// ```
pub fn format_indices(expr: &Expr) -> String {
    let mut printer = IndexPrinter::default();
    expr.traverse(&mut printer);
    format!("{}\n{}", printer.text.trim_end(), printer.indices.trim_end())
}

#[derive(Default)]
struct IndexPrinter {
    text: String,
    indices: String,
    next: usize,
}

impl IndexPrinter {
    fn align(&mut self) {
        let (text, indices) = (self.text.chars().count(), self.indices.chars().count());
        if text < indices {
            self.text.extend(std::iter::repeat_n(' ', indices - text));
        } else {
            self.indices.extend(std::iter::repeat_n(' ', text - indices));
        }
    }
}

impl Visitor for IndexPrinter {
    fn pre_order(&mut self, expr: &Expr) {
        self.align();
        self.next += 1;
        self.indices.push_str(&format!("{} ", self.next));
        match expr.kind() {
            ExprKind::Atomic(_) => self.text.push_str(&expr.to_string()),
            _ => self.text.push('('),
        }
    }

    fn in_order(&mut self, expr: &Expr) {
        match expr.kind() {
            ExprKind::Concat(_) => self.text.push_str(" : "),
            ExprKind::Sum(_) => self.text.push_str(" + "),
            _ => {}
        }
    }

    fn post_order(&mut self, expr: Expr, weight: Option<u64>) -> Expr {
        match expr.kind() {
            ExprKind::Atomic(_) => {}
            ExprKind::Kleene { rate, .. } => self.text.push_str(&format!("*{rate})")),
            _ => self.text.push(')'),
        }
        if let Some(w) = weight {
            self.text.push_str(&format!("[{w}]"));
        }
        expr
    }
}
