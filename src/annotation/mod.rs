use std::collections::BTreeMap;
use std::fmt::{self, Display};

use anyhow::bail;
use itertools::Itertools;
use log::info;

use crate::errors::ConsistencyError;
use crate::reconcile::{BranchSubstitutions, NodeNumbering};
use crate::report::Reconstruction;
use crate::substitution::{format_substitutions, non_synonymous, Substitution};
use crate::tree::{NodeIdx, Tree};
use crate::Result;

mod annotator;
pub use annotator::*;

/// Attribute names written into the node comments of the annotated tree.
/// The declaration order is the order they are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeKey {
    RealName,
    Number,
    AllSubs,
    NonSynSubs,
    Full,
    NameAndSubs,
}

impl Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKey::RealName => "REALNAME",
            AttributeKey::Number => "NUMBER",
            AttributeKey::AllSubs => "ALLSUBS",
            AttributeKey::NonSynSubs => "NONSYNSUBS",
            AttributeKey::Full => "FULL",
            AttributeKey::NameAndSubs => "NAME_AND_SUBS",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAnnotation {
    attributes: BTreeMap<AttributeKey, String>,
}

impl NodeAnnotation {
    pub fn insert(&mut self, key: AttributeKey, value: impl Into<String>) {
        self.attributes.insert(key, value.into());
    }

    pub fn get(&self, key: AttributeKey) -> Option<&str> {
        self.attributes.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn value_or_empty(&self, key: AttributeKey) -> &str {
        self.get(key).unwrap_or_default()
    }
}

/// Renders as a tree comment, `[&NUMBER="5",ALLSUBS="[K2K]"]`, or nothing
/// when there are no attributes. Double quotes inside values become single quotes.
impl Display for NodeAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let attributes = self
            .attributes
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", key, value.replace('"', "'")))
            .join(",");
        write!(f, "[&{}]", attributes)
    }
}

/// A substitution together with the canonical id of the node below its branch,
/// i.e. one row of the substitution table.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstitutionRecord {
    pub branch: usize,
    pub substitution: Substitution,
}

/// The labelled tree with its real names, branch lengths, per-node
/// annotations and per-branch substitutions, ready to be written out.
#[derive(Debug, Clone)]
pub struct AnnotatedTree {
    tree: Tree,
    lengths: Tree,
    numbering: NodeNumbering,
    names: Vec<String>,
    annotations: Vec<NodeAnnotation>,
    substitutions: BranchSubstitutions,
}

impl AnnotatedTree {
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn numbering(&self) -> &NodeNumbering {
        &self.numbering
    }

    pub fn annotation(&self, idx: NodeIdx) -> &NodeAnnotation {
        &self.annotations[usize::from(idx)]
    }

    /// Name from the supplied name list, only defined for tips.
    pub fn real_name(&self, idx: NodeIdx) -> Option<&str> {
        match idx {
            NodeIdx::Leaf(_) => Some(self.names[self.numbering.canonical_id(idx)].as_str()),
            NodeIdx::Internal(_) => None,
        }
    }

    /// Length of the branch above `idx` taken from the lengths tree,
    /// `None` for the root. A length missing from the report counts as zero.
    pub fn branch_length(&self, idx: NodeIdx) -> Option<f64> {
        if self.tree.is_root(idx) {
            return None;
        }
        let twin = self.lengths.counterpart(&self.tree, idx);
        Some(self.lengths.blen(twin).unwrap_or(0.0))
    }

    pub fn substitutions(&self) -> &BranchSubstitutions {
        &self.substitutions
    }

    /// All substitutions as table rows, ordered by branch and then by site.
    pub fn substitution_records(&self) -> Vec<SubstitutionRecord> {
        self.substitutions
            .iter()
            .flat_map(|(key, subs)| {
                subs.iter().map(|sub| SubstitutionRecord {
                    branch: key.descendant,
                    substitution: sub.clone(),
                })
            })
            .sorted_by_key(|record| (record.branch, record.substitution.site))
            .collect()
    }
}

/// Combines a parsed reconstruction with the ordered list of original
/// sequence names.
///
/// # Example
/// ```
/// use ancsub::annotation::{annotate, AttributeKey};
/// use ancsub::report::parse_report;
/// let report = std::fs::read_to_string("./data/codeml.rst").unwrap();
/// let names = ["human", "chimpanzee", "gorilla", "orangutan"].map(String::from).to_vec();
/// let annotated = annotate(parse_report(&report, None).unwrap(), names, true).unwrap();
/// let tip = annotated.tree().leaves()[0];
/// assert_eq!(annotated.annotation(tip).get(AttributeKey::RealName), Some("human"));
/// assert_eq!(annotated.annotation(tip).get(AttributeKey::AllSubs), Some("[K2K]"));
/// ```
pub fn annotate(
    reconstruction: Reconstruction,
    names: Vec<String>,
    show_tip_substitutions: bool,
) -> Result<AnnotatedTree> {
    let tree = &reconstruction.labelled_tree;
    if !reconstruction.lengths_tree.same_shape(tree) {
        bail!(ConsistencyError::new(
            "Tree with branch lengths and labelled tree differ in shape"
        ));
    }
    if names.len() != tree.leaf_count() {
        bail!(ConsistencyError::new(format!(
            "{} sequence names for a tree with {} tips",
            names.len(),
            tree.leaf_count()
        )));
    }
    let numbering = NodeNumbering::new(tree)?;
    let substitutions = reconstruction.branch_substitutions(&numbering)?;
    info!(
        "Found {} substitutions on {} of {} branches.",
        substitutions.values().map(Vec::len).sum::<usize>(),
        substitutions.values().filter(|subs| !subs.is_empty()).count(),
        substitutions.len()
    );

    let mut annotations = vec![NodeAnnotation::default(); tree.len()];
    for &idx in tree.preorder() {
        let Some(key) = numbering.incoming(tree, idx) else {
            continue;
        };
        let annotation = &mut annotations[usize::from(idx)];
        annotation.insert(AttributeKey::Number, numbering.canonical_id(idx).to_string());
        let is_leaf = matches!(idx, NodeIdx::Leaf(_));
        if is_leaf {
            annotation.insert(
                AttributeKey::RealName,
                names[numbering.canonical_id(idx)].as_str(),
            );
        }
        let subs = substitutions.get(&key).map(Vec::as_slice).unwrap_or_default();
        if !is_leaf || show_tip_substitutions {
            add_substitutions(annotation, subs);
        }
        add_composites(annotation, is_leaf);
    }

    let Reconstruction {
        lengths_tree,
        labelled_tree,
        ..
    } = reconstruction;
    Ok(AnnotatedTree {
        tree: labelled_tree,
        lengths: lengths_tree,
        numbering,
        names,
        annotations,
        substitutions,
    })
}

fn add_substitutions(annotation: &mut NodeAnnotation, subs: &[Substitution]) {
    if !subs.is_empty() {
        annotation.insert(AttributeKey::AllSubs, format_substitutions(subs));
    }
    let non_syn: Vec<&Substitution> = non_synonymous(subs).collect();
    if !non_syn.is_empty() {
        annotation.insert(AttributeKey::NonSynSubs, format_substitutions(non_syn));
    }
}

fn add_composites(annotation: &mut NodeAnnotation, is_leaf: bool) {
    let number = annotation.value_or_empty(AttributeKey::Number);
    let all_subs = annotation.value_or_empty(AttributeKey::AllSubs);
    let full = if is_leaf {
        let name = annotation.value_or_empty(AttributeKey::RealName);
        format!("{} - {} {}", number, name, all_subs)
    } else {
        format!("{} - {}", number, all_subs)
    };
    let name_and_subs = is_leaf.then(|| {
        format!(
            "{} {}",
            annotation.value_or_empty(AttributeKey::RealName),
            annotation.value_or_empty(AttributeKey::NonSynSubs)
        )
    });
    annotation.insert(AttributeKey::Full, full.trim_end());
    if let Some(name_and_subs) = name_and_subs {
        annotation.insert(AttributeKey::NameAndSubs, name_and_subs.trim_end());
    }
}
