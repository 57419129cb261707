//! Arena-backed expression trees.
//!
//! Nodes live in a flat arena and refer to each other by index; detached
//! nodes are left behind in the arena and reclaimed when the whole tree is
//! dropped. Parent links are maintained by `set_left`/`set_right` so the
//! algebraic passes can walk towards the root.

use super::ops::{ExprOp, ExprOpType};

pub(crate) type NodeId = usize;

#[derive(Debug, Clone)]
pub(crate) struct TreeNode {
    pub op: ExprOp,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub value_num: i32,
}

#[derive(Debug, Default)]
pub(crate) struct ExpressionTree {
    nodes: Vec<TreeNode>,
    root: Option<NodeId>,
}

impl ExpressionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, node: Option<NodeId>) {
        self.root = node;
    }

    pub fn make_node(&mut self, op: ExprOp) -> NodeId {
        self.nodes.push(TreeNode {
            op,
            parent: None,
            left: None,
            right: None,
            value_num: -1,
        });
        self.nodes.len() - 1
    }

    #[inline]
    pub fn op(&self, id: NodeId) -> ExprOp {
        self.nodes[id].op
    }

    #[inline]
    pub fn set_op(&mut self, id: NodeId, op: ExprOp) {
        self.nodes[id].op = op;
    }

    #[inline]
    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].left
    }

    #[inline]
    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].right
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    #[inline]
    pub fn value_num(&self, id: NodeId) -> i32 {
        self.nodes[id].value_num
    }

    pub fn set_left(&mut self, id: NodeId, child: Option<NodeId>) {
        if let Some(old) = self.nodes[id].left {
            self.nodes[old].parent = None;
        }
        self.nodes[id].left = child;
        if let Some(child) = child {
            self.nodes[child].parent = Some(id);
        }
    }

    pub fn set_right(&mut self, id: NodeId, child: Option<NodeId>) {
        if let Some(old) = self.nodes[id].right {
            self.nodes[old].parent = None;
        }
        self.nodes[id].right = child;
        if let Some(child) = child {
            self.nodes[child].parent = Some(id);
        }
    }

    /// Deep-copies the subtree rooted at `id` into fresh nodes.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let op = self.nodes[id].op;
        let left = self.nodes[id].left;
        let right = self.nodes[id].right;

        let copy = self.make_node(op);
        if let Some(left) = left {
            let l = self.clone_subtree(left);
            self.set_left(copy, Some(l));
        }
        if let Some(right) = right {
            let r = self.clone_subtree(right);
            self.set_right(copy, Some(r));
        }
        copy
    }

    /// Overwrites `id` with the op and children of `src`, keeping `id`'s
    /// position in the tree.
    pub fn replace(&mut self, id: NodeId, src: NodeId) {
        let op = self.nodes[src].op;
        let left = self.nodes[src].left;
        let right = self.nodes[src].right;
        self.nodes[id].op = op;
        self.set_left(id, left);
        self.set_right(id, right);
    }

    /// Turns `id` into a leaf carrying `op`.
    pub fn replace_with_leaf(&mut self, id: NodeId, op: ExprOp) {
        self.nodes[id].op = op;
        self.set_left(id, None);
        self.set_right(id, None);
    }

    /// Exchanges the contents (op and children) of two nodes while leaving
    /// both in place.
    pub fn swap_contents(&mut self, a: NodeId, b: NodeId) {
        let (a_left, a_right) = (self.nodes[a].left, self.nodes[a].right);
        let (b_left, b_right) = (self.nodes[b].left, self.nodes[b].right);
        let a_op = self.nodes[a].op;
        let b_op = self.nodes[b].op;
        let a_vn = self.nodes[a].value_num;
        let b_vn = self.nodes[b].value_num;

        self.nodes[a].op = b_op;
        self.nodes[b].op = a_op;
        self.nodes[a].value_num = b_vn;
        self.nodes[b].value_num = a_vn;
        self.set_left(a, b_left);
        self.set_right(a, b_right);
        self.set_left(b, a_left);
        self.set_right(b, a_right);
    }

    /// Swaps which child nodes two slots refer to. Both slots must be filled.
    pub fn swap_children(
        &mut self,
        (parent_a, left_a): (NodeId, bool),
        (parent_b, left_b): (NodeId, bool),
    ) {
        let a = if left_a {
            self.nodes[parent_a].left
        } else {
            self.nodes[parent_a].right
        };
        let b = if left_b {
            self.nodes[parent_b].left
        } else {
            self.nodes[parent_b].right
        };
        if left_a {
            self.set_left(parent_a, b);
        } else {
            self.set_right(parent_a, b);
        }
        if left_b {
            self.set_left(parent_b, a);
        } else {
            self.set_right(parent_b, a);
        }
    }

    /// Structural equality, short-circuiting through value numbers when both
    /// sides already have one.
    pub fn equal_subtree(&self, lhs: NodeId, rhs: NodeId) -> bool {
        let l = &self.nodes[lhs];
        let r = &self.nodes[rhs];
        if l.value_num >= 0 && r.value_num >= 0 {
            return l.value_num == r.value_num;
        }
        if l.op != r.op {
            return false;
        }
        if l.left.is_some() != r.left.is_some() || l.right.is_some() != r.right.is_some() {
            return false;
        }
        if let (Some(a), Some(b)) = (l.left, r.left) {
            if !self.equal_subtree(a, b) {
                return false;
            }
        }
        if let (Some(a), Some(b)) = (l.right, r.right) {
            if !self.equal_subtree(a, b) {
                return false;
            }
        }
        true
    }

    /// Post-order assignment of value numbers; structurally equal subtrees
    /// receive the same number. `Mux` nodes are skipped.
    pub fn apply_value_numbering(&mut self) {
        let Some(root) = self.root else { return };

        postorder(self, root, &mut |tree, id| {
            tree.nodes[id].value_num = -1;
        });

        let mut numbered: Vec<NodeId> = Vec::new();
        let mut next = 0i32;
        postorder(self, root, &mut |tree, id| {
            if tree.nodes[id].op.ty == ExprOpType::Mux {
                return;
            }
            for &candidate in &numbered {
                if tree.equal_subtree(id, candidate) {
                    tree.nodes[id].value_num = tree.nodes[candidate].value_num;
                    return;
                }
            }
            tree.nodes[id].value_num = next;
            next += 1;
            numbered.push(id);
        });
    }
}

/// Pre-order traversal. The visitor returning `true` prunes descent into the
/// current node's children. Children are read after the visit so rewrites
/// are picked up on the way down.
pub(crate) fn preorder(
    tree: &mut ExpressionTree,
    id: NodeId,
    visitor: &mut dyn FnMut(&mut ExpressionTree, NodeId) -> bool,
) {
    if visitor(tree, id) {
        return;
    }
    if let Some(left) = tree.left(id) {
        preorder(tree, left, visitor);
    }
    if let Some(right) = tree.right(id) {
        preorder(tree, right, visitor);
    }
}

/// Post-order traversal; children are read at descent time.
pub(crate) fn postorder(
    tree: &mut ExpressionTree,
    id: NodeId,
    visitor: &mut dyn FnMut(&mut ExpressionTree, NodeId),
) {
    if let Some(left) = tree.left(id) {
        postorder(tree, left, visitor);
    }
    if let Some(right) = tree.right(id) {
        postorder(tree, right, visitor);
    }
    visitor(tree, id);
}
