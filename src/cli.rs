use std::fmt;
use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, ValueEnum};
use log::LevelFilter;

use ancsub::annotation::default_names_file;
use ancsub::io::Delimiter;
use ancsub::report::Dialect;

use crate::Result;

pub(super) const TREE_FILE: &str = "substitutions.tree";
pub(super) const TABLE_STEM: &str = "substitutions";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Cli {
    /// Ancestral reconstruction report (rst file)
    #[arg(short, long, value_name = "REPORT_FILE")]
    pub(super) report: PathBuf,

    /// Original sequence names, one per line [default: alignment.names next to the report]
    #[arg(short, long, value_name = "NAMES_FILE")]
    pub(super) names: Option<PathBuf>,

    /// Directory for the annotated tree and substitution table [default: the report's directory]
    #[arg(short, long, value_name = "OUT_DIR")]
    pub(super) out_dir: Option<PathBuf>,

    /// Report layout, sniffed from the report by default
    #[arg(long, value_enum, default_value_t = DialectArg::Auto)]
    pub(super) dialect: DialectArg,

    /// Column delimiter of the substitution table
    #[arg(long, value_enum, default_value_t = DelimiterArg::Tab)]
    pub(super) delimiter: DelimiterArg,

    /// Leave substitutions out of the tip annotations
    #[arg(long)]
    pub(super) hide_tip_substitutions: bool,

    /// Replace existing output files
    #[arg(long)]
    pub(super) overwrite: bool,

    /// Log debug messages
    #[arg(short, long)]
    pub(super) verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(super) enum DialectArg {
    Auto,
    SiteTable,
    BranchListing,
    SequenceListing,
}

impl From<DialectArg> for Option<Dialect> {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Auto => None,
            DialectArg::SiteTable => Some(Dialect::SiteTable),
            DialectArg::BranchListing => Some(Dialect::BranchListing),
            DialectArg::SequenceListing => Some(Dialect::SequenceListing),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(super) enum DelimiterArg {
    Tab,
    Comma,
}

impl From<DelimiterArg> for Delimiter {
    fn from(arg: DelimiterArg) -> Self {
        match arg {
            DelimiterArg::Tab => Delimiter::Tab,
            DelimiterArg::Comma => Delimiter::Comma,
        }
    }
}

pub(super) struct Config {
    pub(super) report_file: PathBuf,
    pub(super) names_file: PathBuf,
    pub(super) out_tree: PathBuf,
    pub(super) out_table: PathBuf,
    pub(super) dialect: Option<Dialect>,
    pub(super) delimiter: Delimiter,
    pub(super) show_tip_substitutions: bool,
    pub(super) overwrite: bool,
    pub(super) log_level: LevelFilter,
}

impl Config {
    pub(super) fn from_cli(cli: Cli) -> Result<Config> {
        if !cli.report.is_file() {
            bail!("Report file {} does not exist", cli.report.display());
        }
        let names_file = cli
            .names
            .unwrap_or_else(|| default_names_file(&cli.report));
        let out_dir = match cli.out_dir {
            Some(dir) => dir,
            None => cli
                .report
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default(),
        };
        if !out_dir.as_os_str().is_empty() && !out_dir.is_dir() {
            bail!("Output directory {} does not exist", out_dir.display());
        }
        let delimiter = Delimiter::from(cli.delimiter);
        Ok(Config {
            names_file,
            out_tree: out_dir.join(TREE_FILE),
            out_table: out_dir.join(format!("{}.{}", TABLE_STEM, delimiter.extension())),
            report_file: cli.report,
            dialect: cli.dialect.into(),
            delimiter,
            show_tip_substitutions: !cli.hide_tip_substitutions,
            overwrite: cli.overwrite,
            log_level: if cli.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
        })
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  report: {}", self.report_file.display())?;
        writeln!(f, "  names: {}", self.names_file.display())?;
        match self.dialect {
            Some(dialect) => writeln!(f, "  dialect: {}", dialect)?,
            None => writeln!(f, "  dialect: detected from the report")?,
        }
        writeln!(f, "  tip substitutions shown: {}", self.show_tip_substitutions)?;
        writeln!(f, "  annotated tree: {}", self.out_tree.display())?;
        writeln!(
            f,
            "  substitution table: {} ({} delimited)",
            self.out_table.display(),
            self.delimiter
        )?;
        write!(f, "  overwrite existing files: {}", self.overwrite)
    }
}
