use anyhow::bail;
use log::info;

use crate::codons::CODON_LENGTH;
use crate::errors::FormatError;
use crate::report::lines::{read_tree_section, ReportLines};
use crate::report::{
    AncestralData, Reconstruction, ReconstructionParser, SiteStateMatrix, SITE_TABLE_MARKER,
};
use crate::Result;

/// Reads the per-site table of best states printed by nucleotide programs.
/// Every codon site takes three consecutive table lines, one per codon position.
pub struct SiteTableParser;

impl ReconstructionParser for SiteTableParser {
    fn parse(&self, report: &str) -> Result<Reconstruction> {
        let mut lines = ReportLines::new(report);
        let (lengths_tree, labelled_tree) = read_tree_section(&mut lines)?;
        lines.skip_until(SITE_TABLE_MARKER)?;
        lines.skip_lines(3, "the site table header")?;
        let matrix = read_site_table(&mut lines)?;
        info!(
            "Read states of {} nodes at {} codon sites.",
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

enum TableState<'a> {
    AwaitingSite,
    InSite(Vec<(usize, &'a str)>),
}

fn read_site_table(lines: &mut ReportLines) -> Result<SiteStateMatrix> {
    let mut matrix = SiteStateMatrix::default();
    let mut state = TableState::AwaitingSite;
    loop {
        let line = lines.next_line();
        let line_no = lines.line_no();
        state = match (state, line) {
            (TableState::AwaitingSite, None) => return Ok(matrix),
            (TableState::AwaitingSite, Some(line)) if line.trim().is_empty() => return Ok(matrix),
            (TableState::AwaitingSite, Some(line)) => TableState::InSite(vec![(line_no, line)]),
            (TableState::InSite(_), None) => bail!(FormatError::at_line(
                line_no,
                format!("Report ended inside the record of site {}", matrix.site_count() + 1)
            )),
            (TableState::InSite(_), Some(line)) if line.trim().is_empty() => {
                bail!(FormatError::at_line(
                    line_no,
                    format!(
                        "Record of site {} has fewer than {} lines",
                        matrix.site_count() + 1,
                        CODON_LENGTH
                    )
                ))
            }
            (TableState::InSite(mut record), Some(line)) => {
                record.push((line_no, line));
                if record.len() == CODON_LENGTH {
                    let (tip_count, states) = site_states(&record)?;
                    matrix.push_site(tip_count, states)?;
                    TableState::AwaitingSite
                } else {
                    TableState::InSite(record)
                }
            }
        };
    }
}

/// One table line split into the tip column (without its trailing colon)
/// and the ancestral state tokens that follow it.
struct SiteLine<'a> {
    line_no: usize,
    tips: &'a str,
    ancestors: Vec<&'a str>,
}

impl<'a> SiteLine<'a> {
    fn parse(line_no: usize, line: &'a str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let Some(tips) = tokens.by_ref().find(|token| token.ends_with(':')) else {
            bail!(FormatError::at_line(line_no, "No tip state column ending in ':'"));
        };
        let tips = &tips[..tips.len() - 1];
        if !tips.is_ascii() {
            bail!(FormatError::at_line(
                line_no,
                format!("Tip states '{}' are not nucleotide codes", tips)
            ));
        }
        Ok(Self {
            line_no,
            tips,
            ancestors: tokens.collect(),
        })
    }

    fn ancestor_state(&self, node: usize) -> char {
        self.ancestors[node].chars().next().unwrap_or_default()
    }
}

fn site_states(record: &[(usize, &str)]) -> Result<(usize, Vec<String>)> {
    let site_lines = record
        .iter()
        .map(|(line_no, line)| SiteLine::parse(*line_no, line))
        .collect::<Result<Vec<_>>>()?;
    let first = &site_lines[0];
    for other in &site_lines[1..] {
        if other.tips.len() != first.tips.len() {
            bail!(FormatError::at_line(
                other.line_no,
                format!(
                    "{} tip states, line {} has {}",
                    other.tips.len(),
                    first.line_no,
                    first.tips.len()
                )
            ));
        }
        if other.ancestors.len() != first.ancestors.len() {
            bail!(FormatError::at_line(
                other.line_no,
                format!(
                    "{} ancestral states, line {} has {}",
                    other.ancestors.len(),
                    first.line_no,
                    first.ancestors.len()
                )
            ));
        }
    }

    let mut states = Vec::with_capacity(first.tips.len() + first.ancestors.len());
    for tip in 0..first.tips.len() {
        states.push(
            site_lines
                .iter()
                .map(|site_line| char::from(site_line.tips.as_bytes()[tip]))
                .collect(),
        );
    }
    for node in 0..first.ancestors.len() {
        states.push(
            site_lines
                .iter()
                .map(|site_line| site_line.ancestor_state(node))
                .collect(),
        );
    }
    Ok((first.tips.len(), states))
}
