use std::fmt::{Debug, Display};

use crate::tree::NodeIdx::{self, Internal as Int, Leaf};

#[derive(Clone, PartialEq)]
pub struct Node {
    pub idx: NodeIdx,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    pub blen: Option<f64>,
    pub id: String,
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.idx)
        } else {
            write!(f, "{} with id {}", self.idx, self.id)
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            writeln!(
                f,
                "{:?}:{:?}, parent: {:?}, children: {:?}",
                self.idx, self.blen, self.parent, self.children,
            )
        } else {
            writeln!(
                f,
                "({}) {:?}:{:?}, parent: {:?}, children: {:?}",
                self.id, self.idx, self.blen, self.parent, self.children,
            )
        }
    }
}

impl Node {
    pub(crate) fn new_leaf(idx: usize, parent: Option<NodeIdx>) -> Self {
        Self {
            idx: Leaf(idx),
            parent,
            children: Vec::new(),
            blen: None,
            id: String::new(),
        }
    }

    pub(crate) fn new_internal(idx: usize, parent: Option<NodeIdx>) -> Self {
        Self {
            idx: Int(idx),
            parent,
            children: Vec::new(),
            blen: None,
            id: String::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.idx, Leaf(_))
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
