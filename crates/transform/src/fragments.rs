//! Bookkeeping of which automaton nodes were built for which subtree.

use std::collections::HashMap;

use stochex_expr::ExprId;
use stochex_graph::NodeId;

/// The automaton piece built for one expression node.
#[derive(Debug, Clone)]
pub(crate) struct Fragment {
    pub(crate) id: ExprId,
    pub(crate) initial: NodeId,
    pub(crate) finals: Vec<NodeId>,
    /// Nodes created for this fragment itself, not for its children.
    pub(crate) own_nodes: Vec<NodeId>,
    pub(crate) children: Vec<usize>,
    pub(crate) parent: Option<usize>,
    pub(crate) alive: bool,
}

/// Fragments of the current automaton, indexed by expression id.
///
/// A shared subtree that occurs twice in the expression has two fragments.
/// A retired fragment keeps its slot with `alive == false` until
/// [`release`](Self::release) hands the slot back for reuse, so an index
/// taken before an edit never names a fragment built during it.
#[derive(Debug, Clone, Default)]
pub(crate) struct FragmentTree {
    fragments: Vec<Fragment>,
    by_expr: HashMap<ExprId, Vec<usize>>,
    root: Option<usize>,
    retired: Vec<usize>,
    free: Vec<usize>,
}

impl FragmentTree {
    pub(crate) fn push(&mut self, fragment: Fragment) -> usize {
        let id = fragment.id;
        let index = match self.free.pop() {
            Some(index) => {
                self.fragments[index] = fragment;
                index
            }
            None => {
                self.fragments.push(fragment);
                self.fragments.len() - 1
            }
        };
        self.by_expr.entry(id).or_default().push(index);
        index
    }

    pub(crate) fn get(&self, index: usize) -> &Fragment {
        &self.fragments[index]
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> &mut Fragment {
        &mut self.fragments[index]
    }

    pub(crate) fn root(&self) -> Option<usize> {
        self.root
    }

    pub(crate) fn set_root(&mut self, index: usize) {
        self.root = Some(index);
    }

    /// Live fragments built for `id`.
    pub(crate) fn live(&self, id: ExprId) -> Vec<usize> {
        self.by_expr
            .get(&id)
            .map(|v| {
                v.iter()
                    .copied()
                    .filter(|&i| self.fragments[i].alive)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns `true` if `ancestor` is `index` or lies on its parent chain.
    pub(crate) fn is_within(&self, index: usize, ancestor: usize) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            current = self.fragments[i].parent;
        }
        false
    }

    /// Strict ancestors of `index`, nearest first.
    pub(crate) fn ancestors(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut current = self.fragments[index].parent;
        while let Some(i) = current {
            out.push(i);
            current = self.fragments[i].parent;
        }
        out
    }

    /// `index` and its descendants, not descending into `keep`.
    pub(crate) fn subtree_except(&self, index: usize, keep: &[usize]) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            if keep.contains(&i) {
                continue;
            }
            out.push(i);
            stack.extend(self.fragments[i].children.iter().copied());
        }
        out
    }

    /// Marks a fragment dead, drops it from the id index and clears its
    /// links. The slot stays taken until the next [`release`](Self::release).
    pub(crate) fn retire(&mut self, index: usize) {
        let fragment = &mut self.fragments[index];
        if !fragment.alive {
            return;
        }
        fragment.alive = false;
        fragment.finals = Vec::new();
        fragment.own_nodes = Vec::new();
        fragment.children = Vec::new();
        fragment.parent = None;
        let id = fragment.id;
        if let Some(list) = self.by_expr.get_mut(&id) {
            list.retain(|&i| i != index);
            if list.is_empty() {
                self.by_expr.remove(&id);
            }
        }
        self.retired.push(index);
    }

    /// Makes the slots retired so far available to [`push`](Self::push).
    pub(crate) fn release(&mut self) {
        self.free.append(&mut self.retired);
    }

    /// Puts `new` in the place of `old` as a child of `parent`, or as the
    /// root when `parent` is `None`.
    ///
    /// `parent` is passed in because `old` may have been adopted by `new`.
    pub(crate) fn replace(&mut self, parent: Option<usize>, old: usize, new: usize) {
        self.fragments[new].parent = parent;
        match parent {
            Some(p) => {
                for child in &mut self.fragments[p].children {
                    if *child == old {
                        *child = new;
                    }
                }
            }
            None => {
                if self.root == Some(old) {
                    self.root = Some(new);
                }
            }
        }
    }

    /// Number of live fragments.
    pub(crate) fn live_count(&self) -> usize {
        self.fragments.iter().filter(|f| f.alive).count()
    }

    /// Number of slots, live or not.
    pub(crate) fn slot_count(&self) -> usize {
        self.fragments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stochex_expr::Expr;
    use stochex_graph::Dtmc;

    fn fragment(expr: &Expr, parent: Option<usize>, node: NodeId) -> Fragment {
        Fragment {
            id: expr.id(),
            initial: node,
            finals: vec![node],
            own_nodes: vec![node],
            children: Vec::new(),
            parent,
            alive: true,
        }
    }

    #[test]
    fn parent_chain_queries() {
        let node = Dtmc::new().initial();
        let (a, b, c) = (Expr::atomic("a"), Expr::atomic("b"), Expr::atomic("c"));
        let mut tree = FragmentTree::default();
        let root = tree.push(fragment(&a, None, node));
        let mid = tree.push(fragment(&b, Some(root), node));
        let leaf = tree.push(fragment(&c, Some(mid), node));
        tree.get_mut(root).children.push(mid);
        tree.get_mut(mid).children.push(leaf);
        tree.set_root(root);

        assert!(tree.is_within(leaf, root));
        assert!(tree.is_within(mid, mid));
        assert!(!tree.is_within(root, leaf));
        assert_eq!(tree.ancestors(leaf), vec![mid, root]);
        assert_eq!(tree.subtree_except(root, &[leaf]), vec![root, mid]);
    }

    #[test]
    fn retire_and_replace() {
        let node = Dtmc::new().initial();
        let (a, b, c) = (Expr::atomic("a"), Expr::atomic("b"), Expr::atomic("c"));
        let mut tree = FragmentTree::default();
        let root = tree.push(fragment(&a, None, node));
        let old = tree.push(fragment(&b, Some(root), node));
        tree.get_mut(root).children.push(old);
        tree.set_root(root);

        let new = tree.push(fragment(&c, None, node));
        tree.replace(Some(root), old, new);
        tree.retire(old);

        assert_eq!(tree.get(root).children, vec![new]);
        assert_eq!(tree.get(new).parent, Some(root));
        assert!(tree.live(b.id()).is_empty());
        assert_eq!(tree.live(c.id()), vec![new]);
        assert_eq!(tree.live_count(), 2);

        let top = tree.push(fragment(&b, None, node));
        tree.replace(None, root, top);
        assert_eq!(tree.root(), Some(top));
    }

    #[test]
    fn retired_slot_is_reused_after_release() {
        let node = Dtmc::new().initial();
        let (a, b, c) = (Expr::atomic("a"), Expr::atomic("b"), Expr::atomic("c"));
        let mut tree = FragmentTree::default();
        let root = tree.push(fragment(&a, None, node));
        let old = tree.push(fragment(&b, Some(root), node));
        tree.get_mut(root).children.push(old);

        tree.retire(old);
        tree.retire(old);
        assert!(tree.get(old).children.is_empty());
        assert!(tree.get(old).parent.is_none());

        // Not before the release.
        let fresh = tree.push(fragment(&c, Some(root), node));
        assert_ne!(fresh, old);
        assert_eq!(tree.slot_count(), 3);

        tree.retire(fresh);
        tree.release();
        let reused = tree.push(fragment(&b, Some(root), node));
        assert!(reused == old || reused == fresh);
        assert_eq!(tree.slot_count(), 3);
        assert_eq!(tree.live(b.id()), vec![reused]);
        assert!(tree.live(c.id()).is_empty());
        assert_eq!(tree.live_count(), 2);
    }
}
