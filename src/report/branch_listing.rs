use std::collections::BTreeMap;

use anyhow::bail;
use log::info;

use crate::codons::CODON_LENGTH;
use crate::errors::FormatError;
use crate::report::lines::{read_tree_section, ReportLines};
use crate::report::{
    AncestralData, Reconstruction, ReconstructionParser, BRANCH_TOKEN, CHANGES_MARKER,
    SEQUENCES_MARKER,
};
use crate::substitution::{AminoAcid, Substitution};
use crate::Result;

const CHANGE_ARROW: &str = "->";

/// Reads the "summary of changes along branches" printed by codon programs.
/// Amino acids come straight from the report, no translation is done.
pub struct BranchListingParser;

impl ReconstructionParser for BranchListingParser {
    fn parse(&self, report: &str) -> Result<Reconstruction> {
        let mut lines = ReportLines::new(report);
        let (lengths_tree, labelled_tree) = read_tree_section(&mut lines)?;
        lines.skip_until(CHANGES_MARKER)?;
        let changes = read_branch_changes(&mut lines)?;
        info!(
            "Read {} branches, {} with changes.",
            changes.len(),
            changes.values().filter(|subs| !subs.is_empty()).count()
        );
        Ok(Reconstruction {
            lengths_tree,
            labelled_tree,
            data: AncestralData::Changes(changes),
        })
    }
}

enum ListingState {
    SeekingBranch,
    AfterHeader(String),
    ReadingChanges(String, Vec<Substitution>),
}

type BranchChanges = BTreeMap<String, Vec<Substitution>>;

fn is_header(line: &str) -> bool {
    line.trim_start().starts_with(BRANCH_TOKEN)
}

fn is_end(line: &str) -> bool {
    line.trim_start().starts_with(SEQUENCES_MARKER)
}

fn read_branch_changes(lines: &mut ReportLines) -> Result<BranchChanges> {
    let mut changes = BranchChanges::new();
    let mut state = ListingState::SeekingBranch;
    loop {
        let line = lines.expect_line(&format!("'{}'", SEQUENCES_MARKER))?;
        let line_no = lines.line_no();
        let blank = line.trim().is_empty();
        state = match state {
            ListingState::SeekingBranch if is_end(line) => return Ok(changes),
            ListingState::SeekingBranch if is_header(line) => {
                ListingState::AfterHeader(branch_label(line_no, line)?)
            }
            ListingState::SeekingBranch => ListingState::SeekingBranch,
            ListingState::AfterHeader(label) if is_end(line) => {
                finish_branch(&mut changes, line_no, label, Vec::new())?;
                return Ok(changes);
            }
            ListingState::ReadingChanges(label, subs) if is_end(line) => {
                finish_branch(&mut changes, line_no, label, subs)?;
                return Ok(changes);
            }
            ListingState::AfterHeader(label) if blank => {
                ListingState::ReadingChanges(label, Vec::new())
            }
            ListingState::AfterHeader(label) if is_header(line) => {
                finish_branch(&mut changes, line_no, label, Vec::new())?;
                ListingState::AfterHeader(branch_label(line_no, line)?)
            }
            ListingState::AfterHeader(label) => {
                ListingState::ReadingChanges(label, vec![parse_change(line_no, line)?])
            }
            ListingState::ReadingChanges(label, subs) if blank => {
                finish_branch(&mut changes, line_no, label, subs)?;
                ListingState::SeekingBranch
            }
            ListingState::ReadingChanges(label, subs) if is_header(line) => {
                finish_branch(&mut changes, line_no, label, subs)?;
                ListingState::AfterHeader(branch_label(line_no, line)?)
            }
            ListingState::ReadingChanges(label, mut subs) => {
                subs.push(parse_change(line_no, line)?);
                ListingState::ReadingChanges(label, subs)
            }
        };
    }
}

fn finish_branch(
    changes: &mut BranchChanges,
    line_no: usize,
    label: String,
    subs: Vec<Substitution>,
) -> Result<()> {
    if changes.contains_key(&label) {
        bail!(FormatError::at_line(
            line_no,
            format!("Branch {} is listed twice", label)
        ));
    }
    changes.insert(label, subs);
    Ok(())
}

/// `Branch 4:    5..7  (n=  1.00 s=  0.00)` yields `5..7`.
fn branch_label(line_no: usize, line: &str) -> Result<String> {
    match line.split_whitespace().nth(2) {
        Some(label) if label.contains("..") => Ok(label.to_string()),
        _ => bail!(FormatError::at_line(
            line_no,
            "Branch header without an 'x..y' branch label"
        )),
    }
}

/// `3 GTC (V) 0.803 -> GCC (A) 0.981`
fn parse_change(line_no: usize, line: &str) -> Result<Substitution> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(arrow) = tokens.iter().position(|token| *token == CHANGE_ARROW) else {
        bail!(FormatError::at_line(
            line_no,
            format!("Change line without '{}'", CHANGE_ARROW)
        ));
    };
    if arrow < 3 || tokens.len() < arrow + 3 {
        bail!(FormatError::at_line(
            line_no,
            "Change line needs a site, codon and amino acid on both sides"
        ));
    }
    let Ok(site) = tokens[0].parse::<usize>() else {
        bail!(FormatError::at_line(
            line_no,
            format!("Site '{}' is not a number", tokens[0])
        ));
    };
    Ok(Substitution::new(
        site,
        codon_token(line_no, tokens[1])?,
        codon_token(line_no, tokens[arrow + 1])?,
        amino_acid_token(line_no, tokens[2])?,
        amino_acid_token(line_no, tokens[arrow + 2])?,
    ))
}

fn codon_token(line_no: usize, token: &str) -> Result<String> {
    if token.chars().count() != CODON_LENGTH {
        bail!(FormatError::at_line(
            line_no,
            format!("'{}' is not a codon", token)
        ));
    }
    Ok(token.to_ascii_uppercase())
}

/// `(V)` yields `V`.
fn amino_acid_token(line_no: usize, token: &str) -> Result<AminoAcid> {
    match token.strip_prefix('(').and_then(|rest| rest.chars().next()) {
        Some(aa) if aa != ')' => Ok(AminoAcid::from_char(aa)),
        _ => bail!(FormatError::at_line(
            line_no,
            format!("'{}' is not a bracketed amino acid", token)
        )),
    }
}
