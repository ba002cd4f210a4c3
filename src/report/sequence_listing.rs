use anyhow::bail;
use log::info;

use crate::codons::CODON_LENGTH;
use crate::errors::FormatError;
use crate::report::lines::{read_tree_section, ReportLines};
use crate::report::{
    AncestralData, Reconstruction, ReconstructionParser, SiteStateMatrix, SEQUENCES_MARKER,
};
use crate::Result;

const NODE_PREFIX: &str = "node";

/// Reads the full extant and reconstructed sequences and slices them into
/// codon sites, giving the same state matrix as the site table.
pub struct SequenceListingParser;

impl ReconstructionParser for SequenceListingParser {
    fn parse(&self, report: &str) -> Result<Reconstruction> {
        let mut lines = ReportLines::new(report);
        let (lengths_tree, labelled_tree) = read_tree_section(&mut lines)?;
        lines.skip_until(SEQUENCES_MARKER)?;
        lines.skip_lines(3, "the sequence list header")?;
        let rows = read_rows(&mut lines)?;
        let matrix = to_matrix(&rows)?;
        info!(
            "Read {} sequences of {} codons.",
            matrix.node_count(),
            matrix.site_count()
        );
        Ok(Reconstruction {
            lengths_tree,
            labelled_tree,
            data: AncestralData::States(matrix),
        })
    }
}

#[derive(Debug)]
struct SequenceRow {
    line_no: usize,
    ancestor: bool,
    sequence: String,
}

/// Tip rows (`seq_1  ATG AAA`) come first, then ancestor rows (`node #5  ATG AAG`)
/// numbered consecutively after the tips.
fn read_rows(lines: &mut ReportLines) -> Result<Vec<SequenceRow>> {
    let mut rows = Vec::new();
    let mut seen_ancestor = false;
    while let Some(line) = lines.next_line() {
        if line.trim().is_empty() {
            break;
        }
        let line_no = lines.line_no();
        let mut tokens = line.split_whitespace();
        let name = tokens.next().unwrap_or_default();
        if name == NODE_PREFIX {
            let number = tokens.next().unwrap_or_default();
            let expected = rows.len() + 1;
            match number.strip_prefix('#').map(str::parse::<usize>) {
                Some(Ok(number)) if number == expected => {}
                _ => bail!(FormatError::at_line(
                    line_no,
                    format!("Expected 'node #{}', found 'node {}'", expected, number)
                )),
            }
            seen_ancestor = true;
        } else if seen_ancestor {
            bail!(FormatError::at_line(
                line_no,
                format!("Sequence '{}' listed after the ancestral sequences", name)
            ));
        }
        let sequence: String = tokens.collect();
        if !sequence.is_ascii() {
            bail!(FormatError::at_line(
                line_no,
                "Sequence contains non-nucleotide characters"
            ));
        }
        rows.push(SequenceRow {
            line_no,
            ancestor: seen_ancestor,
            sequence: sequence.to_ascii_uppercase(),
        });
    }
    if rows.is_empty() {
        bail!(FormatError::at_line(
            lines.line_no(),
            "No sequences listed"
        ));
    }
    Ok(rows)
}

fn to_matrix(rows: &[SequenceRow]) -> Result<SiteStateMatrix> {
    let length = rows[0].sequence.len();
    if length % CODON_LENGTH != 0 {
        bail!(FormatError::at_line(
            rows[0].line_no,
            format!("Sequence length {} is not a whole number of codons", length)
        ));
    }
    if let Some(row) = rows.iter().find(|row| row.sequence.len() != length) {
        bail!(FormatError::at_line(
            row.line_no,
            format!(
                "Sequence has {} characters, the first one has {}",
                row.sequence.len(),
                length
            )
        ));
    }
    let tip_count = rows.iter().filter(|row| !row.ancestor).count();
    let mut matrix = SiteStateMatrix::default();
    for start in (0..length).step_by(CODON_LENGTH) {
        matrix.push_site(
            tip_count,
            rows.iter()
                .map(|row| row.sequence[start..start + CODON_LENGTH].to_string())
                .collect(),
        )?;
    }
    Ok(matrix)
}
