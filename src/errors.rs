use std::error::Error;
use std::fmt;

/// The report (or a token inside it) does not have the expected shape:
/// a marker line that never shows up, a truncated site record, a token that
/// should be a number but is not, an unknown nucleotide code.
pub struct FormatError {
    pub line: Option<usize>,
    pub message: String,
}

impl FormatError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub(crate) fn at_line(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

impl fmt::Debug for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Malformed report at line {}: {}", line, self.message),
            None => write!(f, "Malformed input: {}", self.message),
        }
    }
}

impl Error for FormatError {}

/// The inputs are individually well formed but do not belong together,
/// e.g. a name list that is shorter than the number of tips in the tree.
pub struct ConsistencyError {
    pub message: String,
}

impl ConsistencyError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Debug for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Inconsistent inputs: {}", self.message)
    }
}

impl Error for ConsistencyError {}
