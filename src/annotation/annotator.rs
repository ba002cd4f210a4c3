use std::path::{Path, PathBuf};

use log::info;

use crate::annotation::{annotate, AnnotatedTree};
use crate::io;
use crate::report::{parse_report, Dialect};
use crate::Result;

/// Name list the reconstruction tool's input is prepared with, expected
/// next to the report unless given explicitly.
pub const DEFAULT_NAMES_FILE: &str = "alignment.names";

pub struct Annotator {
    report_file: PathBuf,
    names_file: PathBuf,
    dialect: Option<Dialect>,
    show_tip_substitutions: bool,
}

impl Annotator {
    /// Creates an annotator for a report, reading the sequence names from
    /// `alignment.names` in the report's directory.
    ///
    /// # Example
    /// ```
    /// use std::path::PathBuf;
    /// use ancsub::annotation::Annotator;
    /// let annotated = Annotator::new(PathBuf::from("./data/baseml.rst")).build().unwrap();
    /// assert_eq!(annotated.tree().leaf_count(), 4);
    /// ```
    pub fn new(report_file: PathBuf) -> Annotator {
        let names_file = default_names_file(&report_file);
        Annotator {
            report_file,
            names_file,
            dialect: None,
            show_tip_substitutions: true,
        }
    }

    pub fn with_attrs(report_file: PathBuf, names_file: PathBuf) -> Annotator {
        Annotator {
            names_file,
            ..Annotator::new(report_file)
        }
    }

    pub fn names_file(mut self, path: Option<PathBuf>) -> Annotator {
        if let Some(path) = path {
            self.names_file = path;
        }
        self
    }

    /// Forces a report dialect, `None` sniffs it from the report.
    pub fn dialect(mut self, dialect: Option<Dialect>) -> Annotator {
        self.dialect = dialect;
        self
    }

    pub fn show_tip_substitutions(mut self, show: bool) -> Annotator {
        self.show_tip_substitutions = show;
        self
    }

    pub fn build(self) -> Result<AnnotatedTree> {
        let report = io::read_report(&self.report_file)?;
        let names = io::read_names(&self.names_file)?;
        info!(
            "Annotating {} with {} names from {}.",
            self.report_file.display(),
            names.len(),
            self.names_file.display()
        );
        annotate_report(&report, names, self.dialect, self.show_tip_substitutions)
    }
}

pub fn default_names_file(report_file: &Path) -> PathBuf {
    report_file
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(DEFAULT_NAMES_FILE)
}

/// Parses report text and annotates it in one go.
pub fn annotate_report(
    report: &str,
    names: Vec<String>,
    dialect: Option<Dialect>,
    show_tip_substitutions: bool,
) -> Result<AnnotatedTree> {
    annotate(parse_report(report, dialect)?, names, show_tip_substitutions)
}
