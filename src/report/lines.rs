use std::iter::Peekable;
use std::str::Lines;

use anyhow::{bail, Context};

use crate::errors::FormatError;
use crate::report::RECONSTRUCTION_MARKER;
use crate::tree::{tree_parser::parse_topology, Tree};
use crate::Result;

/// Forward-only cursor over the report that knows which line it is on,
/// so every failure can name the offending line.
pub(crate) struct ReportLines<'a> {
    lines: Peekable<Lines<'a>>,
    line_no: usize,
}

impl<'a> ReportLines<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().peekable(),
            line_no: 0,
        }
    }

    /// 1-based number of the line returned last, 0 before the first read.
    pub(crate) fn line_no(&self) -> usize {
        self.line_no
    }

    pub(crate) fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.next()?;
        self.line_no += 1;
        Some(line)
    }

    pub(crate) fn peek(&mut self) -> Option<&'a str> {
        self.lines.peek().copied()
    }

    /// Like [`ReportLines::next_line`], but running out of input is a format error.
    pub(crate) fn expect_line(&mut self, expecting: &str) -> Result<&'a str> {
        match self.next_line() {
            Some(line) => Ok(line),
            None => bail!(FormatError::at_line(
                self.line_no,
                format!("Report ended while looking for {}", expecting)
            )),
        }
    }

    /// Consumes lines up to and including the first one starting with `marker`.
    pub(crate) fn skip_until(&mut self, marker: &str) -> Result<&'a str> {
        loop {
            let line = self.expect_line(&format!("'{}'", marker))?;
            if line.trim_start().starts_with(marker) {
                return Ok(line);
            }
        }
    }

    pub(crate) fn skip_lines(&mut self, count: usize, expecting: &str) -> Result<()> {
        for _ in 0..count {
            self.expect_line(expecting)?;
        }
        Ok(())
    }
}

fn is_topology(line: &str) -> bool {
    line.trim_start().starts_with('(')
}

enum TreeSection {
    SeekingMarker,
    SeekingLengths,
    SeekingDiscarded(Tree),
    SeekingLabelled(Tree),
}

impl TreeSection {
    fn expecting(&self) -> String {
        match self {
            TreeSection::SeekingMarker => format!("'{}'", RECONSTRUCTION_MARKER),
            TreeSection::SeekingLengths => String::from("the tree with branch lengths"),
            TreeSection::SeekingDiscarded(_) => String::from("the second topology"),
            TreeSection::SeekingLabelled(_) => String::from("the tree with node labels"),
        }
    }
}

fn parse_topology_at(line_no: usize, line: &str) -> Result<Tree> {
    parse_topology(line).with_context(|| format!("Invalid topology at report line {}", line_no))
}

/// Reads the three topologies following the reconstruction marker. The first
/// carries the branch lengths, the second is skipped, the third carries the
/// tool's node numbers.
pub(crate) fn read_tree_section(lines: &mut ReportLines) -> Result<(Tree, Tree)> {
    let mut state = TreeSection::SeekingMarker;
    loop {
        let line = lines.expect_line(&state.expecting())?;
        state = match state {
            TreeSection::SeekingMarker if line.starts_with(RECONSTRUCTION_MARKER) => {
                TreeSection::SeekingLengths
            }
            TreeSection::SeekingLengths if is_topology(line) => {
                TreeSection::SeekingDiscarded(parse_topology_at(lines.line_no(), line)?)
            }
            TreeSection::SeekingDiscarded(lengths) if is_topology(line) => {
                TreeSection::SeekingLabelled(lengths)
            }
            TreeSection::SeekingLabelled(lengths) if is_topology(line) => {
                let labelled = parse_topology_at(lines.line_no(), line)?;
                return Ok((lengths, labelled));
            }
            other => other,
        };
    }
}
