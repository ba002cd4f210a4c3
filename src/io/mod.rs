use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use anyhow::{bail, Context};
use log::{info, warn};
use tempfile::NamedTempFile;

use crate::annotation::{AnnotatedTree, SubstitutionRecord};
use crate::Result;

mod nexus;
mod substitution_table;

pub use nexus::write_nexus;
pub use substitution_table::{
    read_substitution_table, write_substitution_table, Delimiter, TABLE_HEADER,
};

pub struct DataError {
    pub message: String,
}

impl fmt::Debug for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for DataError {}

/// Reads the whole reconstruction report into memory.
pub fn read_report(path: &Path) -> Result<String> {
    info!("Reading reconstruction report from file {}", path.display());
    fs::read_to_string(path)
        .with_context(|| format!("Cannot read report {}", path.display()))
}

/// Reads the ordered list of original sequence names, one per line.
/// Line `k` is the name of the tip the reconstruction tool numbers `k`.
/// Trailing blank lines are ignored, any other line is taken as is.
///
/// # Example
/// ```
/// use std::path::PathBuf;
/// use ancsub::io::read_names;
/// let names = read_names(&PathBuf::from("./data/alignment.names")).unwrap();
/// assert_eq!(names, vec!["human", "chimpanzee", "gorilla", "orangutan"]);
/// ```
pub fn read_names(path: &Path) -> Result<Vec<String>> {
    info!("Reading sequence names from file {}", path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read sequence names {}", path.display()))?;
    let names = parse_names(&text);
    if names.is_empty() {
        bail!(DataError {
            message: format!("No sequence names found in {}", path.display())
        });
    }
    Ok(names)
}

fn parse_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = text
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect();
    while names.last().is_some_and(|name| name.is_empty()) {
        names.pop();
    }
    names
}

fn refuse_existing(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!(DataError {
            message: format!("File already exists: {}", path.display())
        });
    }
    Ok(())
}

/// Writes the complete output into a temporary file next to `path`.
fn stage<F>(path: &Path, write: F) -> Result<NamedTempFile>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot create a temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    Ok(file)
}

/// Moves a staged file into place. Without `overwrite` the move itself fails
/// when the destination exists, even if it appeared after the staging began.
fn persist(file: NamedTempFile, path: &Path, overwrite: bool) -> Result<()> {
    let persisted = if overwrite {
        file.persist(path)
    } else {
        file.persist_noclobber(path)
    };
    match persisted {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => bail!(DataError {
            message: format!("File already exists: {}", path.display())
        }),
        Err(e) => Err(anyhow::Error::new(e.error)
            .context(format!("Cannot move output into place at {}", path.display()))),
    }
}

/// Writes through a temporary file in the destination directory that is
/// moved into place once complete, so a failed run leaves no partial output.
/// Refuses to replace an existing file unless `overwrite` is set.
pub fn write_atomically<F>(path: &Path, overwrite: bool, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    refuse_existing(path, overwrite)?;
    let file = stage(path, write)?;
    persist(file, path, overwrite)
}

/// Writes the annotated tree and its substitution table as one unit: both
/// destinations are checked and both documents are complete before either is
/// moved into place, and a newly placed tree is removed again if the table
/// cannot follow. Returns the number of substitution rows written.
pub fn write_outputs(
    annotated: &AnnotatedTree,
    tree_path: &Path,
    table_path: &Path,
    delimiter: Delimiter,
    overwrite: bool,
) -> Result<usize> {
    refuse_existing(tree_path, overwrite)?;
    refuse_existing(table_path, overwrite)?;
    let records = annotated.substitution_records();
    info!(
        "Writing annotated tree to file {} and {} substitutions to file {}",
        tree_path.display(),
        records.len(),
        table_path.display()
    );
    let tree = stage(tree_path, |out| write_nexus(annotated, out))?;
    let table = stage(table_path, |out| {
        write_substitution_table(&records, delimiter, out)
    })?;
    persist(tree, tree_path, overwrite)?;
    if let Err(e) = persist(table, table_path, overwrite) {
        if !overwrite {
            if let Err(cleanup) = fs::remove_file(tree_path) {
                warn!("Cannot remove {}: {}", tree_path.display(), cleanup);
            }
        }
        return Err(e);
    }
    info!("Finished writing successfully");
    Ok(records.len())
}

/// Writes the annotated tree as a NEXUS document.
///
/// # Example
/// ```
/// use std::path::PathBuf;
/// use ancsub::annotation::Annotator;
/// use ancsub::io::write_annotated_tree;
/// let annotated = Annotator::new(PathBuf::from("./data/codeml.rst")).build().unwrap();
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("substitutions.tree");
/// write_annotated_tree(&annotated, &path, false).unwrap();
/// assert!(std::fs::read_to_string(&path).unwrap().starts_with("#NEXUS"));
/// assert!(write_annotated_tree(&annotated, &path, false).is_err());
/// ```
pub fn write_annotated_tree(annotated: &AnnotatedTree, path: &Path, overwrite: bool) -> Result<()> {
    info!("Writing annotated tree to file {}", path.display());
    write_atomically(path, overwrite, |out| write_nexus(annotated, out))?;
    info!("Finished writing successfully");
    Ok(())
}

pub fn write_substitution_table_file(
    records: &[SubstitutionRecord],
    delimiter: Delimiter,
    path: &Path,
    overwrite: bool,
) -> Result<()> {
    info!(
        "Writing {} substitutions to file {}",
        records.len(),
        path.display()
    );
    write_atomically(path, overwrite, |out| {
        write_substitution_table(records, delimiter, out)
    })?;
    info!("Finished writing successfully");
    Ok(())
}
