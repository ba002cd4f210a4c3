use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};

use anyhow::bail;
use log::debug;

use crate::errors::ConsistencyError;
use crate::substitution::Substitution;
use crate::tree::{leaf_number, NodeIdx, Tree};
use crate::Result;

/// A branch in canonical numbering, from the ancestor down to the descendant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchKey {
    pub ancestor: usize,
    pub descendant: usize,
}

impl BranchKey {
    pub fn new(ancestor: usize, descendant: usize) -> Self {
        Self {
            ancestor,
            descendant,
        }
    }
}

impl Display for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.ancestor, self.descendant)
    }
}

pub type BranchSubstitutions = BTreeMap<BranchKey, Vec<Substitution>>;

/// Maps the reconstruction tool's node numbers onto canonical ids and its
/// branch labels onto [`BranchKey`]s, in both directions.
///
/// Canonical ids: a tip is its tool number minus one, an internal node is the
/// number of tips plus its preorder position among internal nodes.
#[derive(Debug, Clone)]
pub struct NodeNumbering {
    leaf_count: usize,
    canonical: Vec<usize>,
    branches: Vec<(String, BranchKey)>,
    by_label: HashMap<String, BranchKey>,
    by_tool_ids: HashMap<(usize, usize), BranchKey>,
    labels: HashMap<BranchKey, usize>,
}

impl NodeNumbering {
    /// Builds the numbering from the tool's labelled tree.
    ///
    /// # Example
    /// ```
    /// use ancsub::reconcile::{BranchKey, NodeNumbering};
    /// use ancsub::tree::tree_parser::parse_topology;
    /// let tree = parse_topology("((1_a, 2_b) 5, 3_c) 4;").unwrap();
    /// let numbering = NodeNumbering::new(&tree).unwrap();
    /// assert_eq!(numbering.branch_key("52").unwrap(), BranchKey::new(4, 1));
    /// assert_eq!(numbering.branch_key("4..5").unwrap(), BranchKey::new(3, 4));
    /// ```
    pub fn new(tree: &Tree) -> Result<Self> {
        let leaf_count = tree.leaf_count();
        let mut canonical = vec![0; tree.len()];
        let mut seen = vec![false; leaf_count];
        for &leaf in tree.leaves() {
            let id = tree.id(leaf);
            let Some(number) = leaf_number(id) else {
                bail!(ConsistencyError::new(format!(
                    "Tip '{}' carries no tip number",
                    id
                )));
            };
            if number == 0 || number > leaf_count {
                bail!(ConsistencyError::new(format!(
                    "Tip '{}' has number {}, the tree has {} tips",
                    id, number, leaf_count
                )));
            }
            if seen[number - 1] {
                bail!(ConsistencyError::new(format!(
                    "Tip number {} is used twice",
                    number
                )));
            }
            seen[number - 1] = true;
            canonical[usize::from(leaf)] = number - 1;
        }
        for &internal in tree.internals() {
            let id = leaf_count + tree.position(internal);
            let label = tree.id(internal);
            if !label.is_empty() && label.parse::<usize>().ok() != Some(id + 1) {
                bail!(ConsistencyError::new(format!(
                    "Internal node labelled '{}' is node {} in preorder numbering",
                    label,
                    id + 1
                )));
            }
            canonical[usize::from(internal)] = id;
        }

        let mut numbering = Self {
            leaf_count,
            canonical,
            branches: Vec::with_capacity(tree.len().saturating_sub(1)),
            by_label: HashMap::new(),
            by_tool_ids: HashMap::new(),
            labels: HashMap::new(),
        };
        for &parent in tree.preorder() {
            for &child in tree.children(parent) {
                numbering.add_branch(parent, child)?;
            }
        }
        debug!(
            "Numbered {} nodes and {} branches.",
            numbering.node_count(),
            numbering.branches.len()
        );
        Ok(numbering)
    }

    fn add_branch(&mut self, parent: NodeIdx, child: NodeIdx) -> Result<()> {
        let key = self.key_between(parent, child);
        let (from, to) = (key.ancestor + 1, key.descendant + 1);
        let label = format!("{}{}", from, to);
        if let Some(existing) = self.by_label.get(&label) {
            bail!(ConsistencyError::new(format!(
                "Branch label '{}' names both {} and {}",
                label, existing, key
            )));
        }
        self.by_label.insert(label.clone(), key);
        self.by_tool_ids.insert((from, to), key);
        self.labels.insert(key, self.branches.len());
        self.branches.push((label, key));
        Ok(())
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn node_count(&self) -> usize {
        self.canonical.len()
    }

    pub fn canonical_id(&self, idx: NodeIdx) -> usize {
        self.canonical[usize::from(idx)]
    }

    /// The node number the reconstruction tool uses, 1-based.
    pub fn tool_id(&self, idx: NodeIdx) -> usize {
        self.canonical_id(idx) + 1
    }

    pub fn key_between(&self, parent: NodeIdx, child: NodeIdx) -> BranchKey {
        BranchKey::new(self.canonical_id(parent), self.canonical_id(child))
    }

    /// Key of the branch leading into `idx`, `None` for the root.
    pub fn incoming(&self, tree: &Tree, idx: NodeIdx) -> Option<BranchKey> {
        tree.parent(idx)
            .map(|parent| self.key_between(parent, idx))
    }

    /// Resolves a tool branch label. Both the concatenated form (`57`) and
    /// the dotted form of branch listings (`5..7`) are accepted.
    pub fn branch_key(&self, label: &str) -> Result<BranchKey> {
        let key = match label.split_once("..") {
            Some((from, to)) => match (from.trim().parse(), to.trim().parse()) {
                (Ok(from), Ok(to)) => self.by_tool_ids.get(&(from, to)),
                _ => None,
            },
            None => self.by_label.get(label),
        };
        match key {
            Some(key) => Ok(*key),
            None => bail!(ConsistencyError::new(format!(
                "Branch '{}' is not a branch of the labelled tree",
                label
            ))),
        }
    }

    /// The tool's concatenated label of a branch.
    pub fn branch_label(&self, key: &BranchKey) -> Option<&str> {
        self.labels
            .get(key)
            .map(|&pos| self.branches[pos].0.as_str())
    }

    /// All branches in preorder of their ancestors.
    pub fn branches(&self) -> impl Iterator<Item = (&String, &BranchKey)> {
        self.branches.iter().map(|(label, key)| (label, key))
    }
}
