use std::fmt::{self, Display};
use std::io::Write;

use anyhow::bail;

use crate::annotation::SubstitutionRecord;
use crate::errors::FormatError;
use crate::substitution::{AminoAcid, Substitution};
use crate::Result;

pub const TABLE_HEADER: [&str; 8] = [
    "branch",
    "site",
    "codon_from",
    "codon_to",
    "aa_from",
    "aa_to",
    "string",
    "non_synonymous",
];

const NON_SYNONYMOUS_MARK: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Tab,
    Comma,
}

impl Delimiter {
    pub fn as_byte(&self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
        }
    }

    /// File extension conventionally used for tables with this delimiter.
    pub fn extension(&self) -> &'static str {
        match self {
            Delimiter::Tab => "tsv",
            Delimiter::Comma => "csv",
        }
    }
}

impl Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Tab => write!(f, "tab"),
            Delimiter::Comma => write!(f, "comma"),
        }
    }
}

fn non_synonymous_mark(substitution: &Substitution) -> &'static str {
    if substitution.is_synonymous() {
        ""
    } else {
        NON_SYNONYMOUS_MARK
    }
}

/// Writes one header row and one row per substitution. The last column holds
/// `*` for non-synonymous substitutions and is empty otherwise.
pub fn write_substitution_table<W: Write + ?Sized>(
    records: &[SubstitutionRecord],
    delimiter: Delimiter,
    out: &mut W,
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter.as_byte())
        .from_writer(out);
    wtr.write_record(TABLE_HEADER)?;
    for record in records {
        let sub = &record.substitution;
        wtr.write_record([
            record.branch.to_string(),
            sub.site.to_string(),
            sub.from_state.clone(),
            sub.to_state.clone(),
            sub.from_aa.to_string(),
            sub.to_aa.to_string(),
            sub.to_string(),
            non_synonymous_mark(sub).to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Reads a table written by [`write_substitution_table`] back into records.
///
/// # Example
/// ```
/// use ancsub::io::{read_substitution_table, Delimiter};
/// let table = "branch,site,codon_from,codon_to,aa_from,aa_to,string,non_synonymous\n\
///              6,3,GTC,GCC,V,A,V3A,*\n";
/// let records = read_substitution_table(table, Delimiter::Comma).unwrap();
/// assert_eq!(records[0].branch, 6);
/// assert!(!records[0].substitution.is_synonymous());
/// ```
pub fn read_substitution_table(text: &str, delimiter: Delimiter) -> Result<Vec<SubstitutionRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let header = match rdr.headers() {
        Ok(header) => header.clone(),
        Err(e) => bail!(FormatError::at_line(1, format!("Unreadable header: {}", e))),
    };
    if header.is_empty() {
        bail!(FormatError::new("Empty substitution table"));
    }
    if header.iter().ne(TABLE_HEADER) {
        bail!(FormatError::at_line(
            1,
            format!(
                "Unexpected substitution table header, expected {}",
                TABLE_HEADER.join(", ")
            )
        ));
    }
    let mut records = Vec::new();
    for result in rdr.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map(|pos| pos.line() as usize);
                bail!(FormatError {
                    line,
                    message: format!("Unreadable row: {}", e),
                })
            }
        };
        let line_no = row.position().map_or(0, |pos| pos.line() as usize);
        records.push(parse_row(line_no, &row)?);
    }
    Ok(records)
}

fn parse_row(line_no: usize, row: &csv::StringRecord) -> Result<SubstitutionRecord> {
    let fields: Vec<&str> = row.iter().collect();
    let [branch, site, from, to, from_aa, to_aa, compact, mark] = fields[..] else {
        bail!(FormatError::at_line(
            line_no,
            format!("Expected {} columns, found {}", TABLE_HEADER.len(), fields.len())
        ));
    };
    let branch = number_field(line_no, "branch", branch)?;
    let substitution = Substitution::new(
        number_field(line_no, "site", site)?,
        from,
        to,
        amino_acid_field(line_no, from_aa)?,
        amino_acid_field(line_no, to_aa)?,
    );
    if substitution.to_string() != compact {
        bail!(FormatError::at_line(
            line_no,
            format!("'{}' does not match {}", compact, substitution)
        ));
    }
    if mark != non_synonymous_mark(&substitution) {
        bail!(FormatError::at_line(
            line_no,
            format!("Non-synonymous mark '{}' disagrees with {}", mark, substitution)
        ));
    }
    Ok(SubstitutionRecord {
        branch,
        substitution,
    })
}

fn number_field(line_no: usize, column: &str, value: &str) -> Result<usize> {
    match value.parse() {
        Ok(number) => Ok(number),
        Err(_) => bail!(FormatError::at_line(
            line_no,
            format!("Column {} holds '{}', not a number", column, value)
        )),
    }
}

fn amino_acid_field(line_no: usize, value: &str) -> Result<AminoAcid> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(aa), None) => Ok(AminoAcid::from_char(aa)),
        _ => bail!(FormatError::at_line(
            line_no,
            format!("'{}' is not a single amino acid", value)
        )),
    }
}
