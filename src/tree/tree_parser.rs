use std::error::Error;
use std::fmt;

use anyhow::bail;
use log::debug;
use pest::{error::Error as PestError, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::errors::FormatError;
use crate::tree::{
    Node,
    NodeIdx::{self, Internal as Int, Leaf},
    Tree,
};
use crate::Result;

#[derive(Parser)]
#[grammar = "./tree/newick.pest"]
pub struct NewickParser;

#[derive(Debug)]
pub struct ParsingError(pub(crate) Box<PestError<Rule>>);

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Malformed newick string")?;
        write!(f, "{}", self.0)
    }
}

impl Error for ParsingError {}

/// Parses a single bracketed topology line as embedded in reconstruction
/// reports. Whitespace between tokens is ignored, the trailing semicolon is
/// optional, and child order is kept exactly as written.
///
/// # Example
/// ```
/// use ancsub::tree::tree_parser::parse_topology;
/// let tree = parse_topology("((1_seq_1, 2_seq_2) 5 , 3_seq_3) 4 ;").unwrap();
/// assert_eq!(tree.leaf_count(), 3);
/// assert_eq!(tree.id(tree.root), "4");
/// ```
pub fn parse_topology(line: &str) -> Result<Tree> {
    let mut pairs = match NewickParser::parse(Rule::newick, line.trim()) {
        Ok(pairs) => pairs,
        Err(e) => bail!(ParsingError(Box::new(e))),
    };
    let Some(newick_rule) = pairs.next() else {
        bail!(FormatError::new("Empty topology"));
    };
    let mut tree = Tree::new_empty();
    for rule in newick_rule.into_inner() {
        match rule.as_rule() {
            Rule::internal | Rule::leaf => {
                tree.root = tree.parse_node_rule(rule, None)?;
            }
            Rule::EOI => {}
            _ => unreachable!(),
        }
    }
    tree.complete();
    debug!(
        "Parsed topology with {} leaves and {} internal nodes.",
        tree.leaf_count(),
        tree.internals().len()
    );
    Ok(tree)
}

impl Tree {
    fn parse_node_rule(&mut self, rule: Pair<Rule>, parent: Option<NodeIdx>) -> Result<NodeIdx> {
        match rule.as_rule() {
            Rule::internal => self.parse_internal_rule(rule, parent),
            Rule::leaf => self.parse_leaf_rule(rule, parent),
            _ => unreachable!(),
        }
    }

    fn parse_internal_rule(
        &mut self,
        internal_rule: Pair<Rule>,
        parent: Option<NodeIdx>,
    ) -> Result<NodeIdx> {
        let node_idx = self.nodes.len();
        self.nodes.push(Node::new_internal(node_idx, parent));
        let mut children = Vec::new();
        for rule in internal_rule.into_inner() {
            match rule.as_rule() {
                Rule::internal | Rule::leaf => {
                    children.push(self.parse_node_rule(rule, Some(Int(node_idx)))?)
                }
                Rule::label => self.nodes[node_idx].id = Tree::parse_label_rule(rule),
                Rule::branch_length => {
                    self.nodes[node_idx].blen = Some(Tree::parse_branch_length_rule(rule)?)
                }
                _ => unreachable!(),
            }
        }
        self.nodes[node_idx].children = children;
        Ok(Int(node_idx))
    }

    fn parse_leaf_rule(&mut self, leaf_rule: Pair<Rule>, parent: Option<NodeIdx>) -> Result<NodeIdx> {
        let node_idx = self.nodes.len();
        let mut node = Node::new_leaf(node_idx, parent);
        for rule in leaf_rule.into_inner() {
            match rule.as_rule() {
                Rule::label => node.id = Tree::parse_label_rule(rule),
                Rule::branch_length => node.blen = Some(Tree::parse_branch_length_rule(rule)?),
                _ => unreachable!(),
            }
        }
        self.nodes.push(node);
        Ok(Leaf(node_idx))
    }

    fn parse_branch_length_rule(rule: Pair<Rule>) -> Result<f64> {
        let text = rule.as_str().trim_start_matches(':').trim();
        match text.parse::<f64>() {
            Ok(blen) => Ok(blen),
            Err(_) => bail!(FormatError::new(format!(
                "Branch length '{}' is not a number",
                text
            ))),
        }
    }

    fn parse_label_rule(rule: Pair<Rule>) -> String {
        rule.as_str().to_string()
    }
}
