use std::collections::BTreeMap;
use std::fmt::{self, Display};

use anyhow::bail;
use log::info;

use crate::errors::{ConsistencyError, FormatError};
use crate::reconcile::{BranchSubstitutions, NodeNumbering};
use crate::substitution::{compute_substitution, Substitution};
use crate::tree::Tree;
use crate::Result;

mod branch_listing;
mod lines;
mod sequence_listing;
mod site_table;

pub use branch_listing::BranchListingParser;
pub use sequence_listing::SequenceListingParser;
pub use site_table::SiteTableParser;

pub const RECONSTRUCTION_MARKER: &str = "Ancestral reconstruction by";
pub const SITE_TABLE_MARKER: &str = "Prob of best state at each node, listed by site";
pub const CHANGES_MARKER: &str = "Summary of changes along branches";
pub const SEQUENCES_MARKER: &str = "List of extant and reconstructed sequences";
pub const BRANCH_TOKEN: &str = "Branch";

/// Report layouts the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Per-site table of best states at every node (nucleotide programs).
    SiteTable,
    /// Explicit per-branch lists of changes (codon programs).
    BranchListing,
    /// Full extant and reconstructed sequences, one row per node.
    SequenceListing,
}

impl Dialect {
    /// Picks the dialect from the program named on the reconstruction marker line.
    ///
    /// # Example
    /// ```
    /// use ancsub::report::Dialect;
    /// let report = "header\nAncestral reconstruction by CODONML.\n";
    /// assert_eq!(Dialect::sniff(report).unwrap(), Dialect::BranchListing);
    /// ```
    pub fn sniff(report: &str) -> Result<Dialect> {
        let Some((line_no, line)) = report
            .lines()
            .enumerate()
            .find(|(_, line)| line.starts_with(RECONSTRUCTION_MARKER))
        else {
            bail!(FormatError::new(format!(
                "'{}' not found, not an ancestral reconstruction report",
                RECONSTRUCTION_MARKER
            )));
        };
        let program = line[RECONSTRUCTION_MARKER.len()..]
            .trim()
            .trim_end_matches('.')
            .to_ascii_uppercase();
        match program.as_str() {
            "BASEML" => Ok(Dialect::SiteTable),
            "CODONML" => Ok(Dialect::BranchListing),
            _ => bail!(FormatError::at_line(
                line_no + 1,
                format!("Cannot tell the report dialect from program '{}'", program)
            )),
        }
    }

    pub fn parser(&self) -> Box<dyn ReconstructionParser> {
        match self {
            Dialect::SiteTable => Box::new(SiteTableParser),
            Dialect::BranchListing => Box::new(BranchListingParser),
            Dialect::SequenceListing => Box::new(SequenceListingParser),
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::SiteTable => write!(f, "site table"),
            Dialect::BranchListing => write!(f, "branch listing"),
            Dialect::SequenceListing => write!(f, "sequence listing"),
        }
    }
}

pub trait ReconstructionParser {
    fn parse(&self, report: &str) -> Result<Reconstruction>;
}

/// Parses a report, sniffing the dialect unless one is given.
pub fn parse_report(report: &str, dialect: Option<Dialect>) -> Result<Reconstruction> {
    let dialect = match dialect {
        Some(dialect) => dialect,
        None => Dialect::sniff(report)?,
    };
    info!("Parsing reconstruction report as {}.", dialect);
    dialect.parser().parse(report)
}

/// What a report parser hands on: the same topology twice, once with branch
/// lengths and once with the tool's node numbers, plus the ancestral data.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub lengths_tree: Tree,
    pub labelled_tree: Tree,
    pub data: AncestralData,
}

#[derive(Debug, Clone)]
pub enum AncestralData {
    /// States at every node, compared along the tree afterwards.
    States(SiteStateMatrix),
    /// Substitutions already attributed to branches, keyed by the tool's branch label.
    Changes(BTreeMap<String, Vec<Substitution>>),
}

impl Reconstruction {
    /// Attributes substitutions to canonical branches. Every branch of the
    /// labelled tree gets an entry, possibly empty.
    pub fn branch_substitutions(&self, numbering: &NodeNumbering) -> Result<BranchSubstitutions> {
        let mut branches: BranchSubstitutions = numbering
            .branches()
            .map(|(_, key)| (*key, Vec::new()))
            .collect();
        match &self.data {
            AncestralData::States(matrix) => {
                for (key, subs) in matrix.branch_substitutions(&self.labelled_tree, numbering)? {
                    branches.insert(key, subs);
                }
            }
            AncestralData::Changes(changes) => {
                for (label, subs) in changes {
                    let key = numbering.branch_key(label)?;
                    branches.insert(key, subs.clone());
                }
            }
        }
        Ok(branches)
    }
}

/// Codon states per site. Each site lists the states of all tips in the
/// tool's tip order, followed by all ancestors in the tool's node order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteStateMatrix {
    tip_count: usize,
    node_count: usize,
    sites: Vec<Vec<String>>,
}

impl SiteStateMatrix {
    /// Appends a site whose first `tip_count` states belong to tips.
    pub fn push_site(&mut self, tip_count: usize, states: Vec<String>) -> Result<()> {
        if tip_count > states.len() {
            bail!(ConsistencyError::new(format!(
                "Site {} has {} tip states but only {} states in total",
                self.sites.len() + 1,
                tip_count,
                states.len()
            )));
        }
        if self.sites.is_empty() {
            self.tip_count = tip_count;
            self.node_count = states.len();
        } else if states.len() != self.node_count || tip_count != self.tip_count {
            bail!(ConsistencyError::new(format!(
                "Site {} has {} states ({} tips), previous sites have {} ({} tips)",
                self.sites.len() + 1,
                states.len(),
                tip_count,
                self.node_count,
                self.tip_count
            )));
        }
        self.sites.push(states);
        Ok(())
    }

    pub fn tip_count(&self) -> usize {
        self.tip_count
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// State of a node (canonical id) at a 0-based site.
    pub fn state(&self, site: usize, node: usize) -> &str {
        &self.sites[site][node]
    }

    /// Walks the labelled tree and compares every ancestor with each of its
    /// children at every site.
    pub fn branch_substitutions(
        &self,
        tree: &Tree,
        numbering: &NodeNumbering,
    ) -> Result<BranchSubstitutions> {
        if self.site_count() > 0 && self.node_count != tree.len() {
            bail!(ConsistencyError::new(format!(
                "State table has {} nodes per site, tree has {}",
                self.node_count,
                tree.len()
            )));
        }
        if self.site_count() > 0 && self.tip_count != tree.leaf_count() {
            bail!(ConsistencyError::new(format!(
                "State table has {} tips per site, tree has {}",
                self.tip_count,
                tree.leaf_count()
            )));
        }
        let mut branches = BranchSubstitutions::new();
        for parent in tree.preorder() {
            for child in tree.children(*parent) {
                let key = numbering.key_between(*parent, *child);
                let mut subs = Vec::new();
                for site in 0..self.site_count() {
                    let from = self.state(site, key.ancestor);
                    let to = self.state(site, key.descendant);
                    if let Some(sub) = compute_substitution(site + 1, from, to)? {
                        subs.push(sub);
                    }
                }
                branches.insert(key, subs);
            }
        }
        Ok(branches)
    }
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
