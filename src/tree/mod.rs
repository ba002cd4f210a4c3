use std::fmt::{self, Display};

use NodeIdx::{Internal as Int, Leaf};

pub mod tree_node;
pub mod tree_parser;

pub use tree_node::Node;

#[derive(Debug, PartialEq, Clone, Copy, PartialOrd, Eq, Ord, Hash)]
pub enum NodeIdx {
    Internal(usize),
    Leaf(usize),
}

impl From<NodeIdx> for usize {
    fn from(node_idx: NodeIdx) -> usize {
        match node_idx {
            Int(idx) => idx,
            Leaf(idx) => idx,
        }
    }
}

impl From<&NodeIdx> for usize {
    fn from(node_idx: &NodeIdx) -> usize {
        usize::from(*node_idx)
    }
}

impl Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Int(idx) => write!(f, "Internal node {}", idx),
            Leaf(idx) => write!(f, "Leaf node {}", idx),
        }
    }
}

/// Rooted tree stored as an arena of nodes. Children own nothing, every link
/// is an index into `nodes`; parents are plain back-indices.
///
/// Leaves are kept in the order they appear in the topology string,
/// internal nodes in preorder (root first).
#[derive(Debug, Clone)]
pub struct Tree {
    pub root: NodeIdx,
    nodes: Vec<Node>,
    leaves: Vec<NodeIdx>,
    internals: Vec<NodeIdx>,
    preorder: Vec<NodeIdx>,
    positions: Vec<usize>,
}

impl Tree {
    pub(crate) fn new_empty() -> Self {
        Self {
            root: Int(0),
            nodes: Vec::new(),
            leaves: Vec::new(),
            internals: Vec::new(),
            preorder: Vec::new(),
            positions: Vec::new(),
        }
    }

    pub(crate) fn complete(&mut self) {
        self.preorder = self.preorder_subroot(self.root);
        self.leaves = self
            .preorder
            .iter()
            .copied()
            .filter(|idx| matches!(idx, Leaf(_)))
            .collect();
        self.internals = self
            .preorder
            .iter()
            .copied()
            .filter(|idx| matches!(idx, Int(_)))
            .collect();
        self.positions = vec![0; self.nodes.len()];
        for (pos, idx) in self.leaves.iter().enumerate() {
            self.positions[usize::from(idx)] = pos;
        }
        for (pos, idx) in self.internals.iter().enumerate() {
            self.positions[usize::from(idx)] = pos;
        }
    }

    pub fn preorder_subroot(&self, subroot_idx: NodeIdx) -> Vec<NodeIdx> {
        let mut order = Vec::<NodeIdx>::with_capacity(self.nodes.len());
        let mut stack = Vec::<NodeIdx>::with_capacity(self.internals.len());
        stack.push(subroot_idx);
        while let Some(cur_root) = stack.pop() {
            order.push(cur_root);
            for child in self.nodes[usize::from(cur_root)].children.iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[usize::from(idx)]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn children(&self, idx: NodeIdx) -> &[NodeIdx] {
        &self.node(idx).children
    }

    pub fn parent(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.node(idx).parent
    }

    pub fn blen(&self, idx: NodeIdx) -> Option<f64> {
        self.node(idx).blen
    }

    pub fn id(&self, idx: NodeIdx) -> &str {
        &self.node(idx).id
    }

    pub fn is_root(&self, idx: NodeIdx) -> bool {
        idx == self.root
    }

    /// Leaves in the order they were written in the topology string.
    pub fn leaves(&self) -> &[NodeIdx] {
        &self.leaves
    }

    /// Internal nodes in preorder, root first.
    pub fn internals(&self) -> &[NodeIdx] {
        &self.internals
    }

    pub fn preorder(&self) -> &[NodeIdx] {
        &self.preorder
    }

    /// Position of a leaf within [`Tree::leaves`], or of an internal node
    /// within [`Tree::internals`].
    pub fn position(&self, idx: NodeIdx) -> usize {
        self.positions[usize::from(idx)]
    }

    /// The node at the same position of another tree with identical shape,
    /// e.g. the branch length carrying twin of a labelled tree.
    pub fn counterpart(&self, other: &Tree, idx: NodeIdx) -> NodeIdx {
        match idx {
            Leaf(_) => self.leaves[other.position(idx)],
            Int(_) => self.internals[other.position(idx)],
        }
    }

    /// Two trees have the same shape when their preorder traversals visit
    /// nodes with the same number of children.
    pub fn same_shape(&self, other: &Tree) -> bool {
        self.len() == other.len()
            && self
                .preorder
                .iter()
                .zip(other.preorder.iter())
                .all(|(a, b)| self.children(*a).len() == other.children(*b).len())
    }

    pub fn to_newick(&self) -> String {
        let mut newick = String::new();
        if !self.is_empty() {
            self.subtree_to_newick(self.root, &mut newick);
        }
        newick.push(';');
        newick
    }

    fn subtree_to_newick(&self, idx: NodeIdx, newick: &mut String) {
        let node = self.node(idx);
        if let Int(_) = idx {
            newick.push('(');
            for (i, child) in node.children.iter().enumerate() {
                if i > 0 {
                    newick.push(',');
                }
                self.subtree_to_newick(*child, newick);
            }
            newick.push(')');
        }
        newick.push_str(&node.id);
        if let Some(blen) = node.blen {
            newick.push_str(&format!(":{}", blen));
        }
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_newick())
    }
}

/// The tool's numeric index carried in a tip label: the leading number of
/// `3_seq_3`, or the trailing number of `seq_3`.
///
/// # Example
/// ```
/// use ancsub::tree::leaf_number;
/// assert_eq!(leaf_number("12_seq_7"), Some(12));
/// assert_eq!(leaf_number("seq_7"), Some(7));
/// assert_eq!(leaf_number("human"), None);
/// ```
pub fn leaf_number(id: &str) -> Option<usize> {
    let leading: String = id.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !leading.is_empty() {
        return leading.parse().ok();
    }
    id.rsplit('_').next().and_then(|suffix| suffix.parse().ok())
}
