use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use itertools::Itertools;

use crate::codons::amino_acids_for;
use crate::Result;

/// Symbol used for a state whose ambiguity codes resolve to more than one residue.
pub const AMBIGUOUS_MARKER: char = 'X';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AminoAcid {
    Residue(char),
    Ambiguous,
}

impl AminoAcid {
    pub fn from_candidates(candidates: &BTreeSet<char>) -> Self {
        match candidates.len() {
            1 => candidates
                .first()
                .map_or(AminoAcid::Ambiguous, |&aa| AminoAcid::Residue(aa)),
            _ => AminoAcid::Ambiguous,
        }
    }

    /// Translates a codon state, collapsing multiple candidate residues
    /// into [`AminoAcid::Ambiguous`].
    pub fn for_state(state: &str) -> Result<Self> {
        Ok(Self::from_candidates(&amino_acids_for(state)?))
    }

    pub fn from_char(symbol: char) -> Self {
        match symbol.to_ascii_uppercase() {
            AMBIGUOUS_MARKER => AminoAcid::Ambiguous,
            residue => AminoAcid::Residue(residue),
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            AminoAcid::Residue(aa) => *aa,
            AminoAcid::Ambiguous => AMBIGUOUS_MARKER,
        }
    }

    /// True only for two identical resolved residues. An ambiguous call
    /// matches nothing, not even another ambiguous call.
    pub fn same_residue(&self, other: &AminoAcid) -> bool {
        match (self, other) {
            (AminoAcid::Residue(a), AminoAcid::Residue(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for AminoAcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A state change at one (1-based) codon site along a branch.
/// Two substitutions are equal when site and both states agree.
#[derive(Debug, Clone)]
pub struct Substitution {
    pub site: usize,
    pub from_state: String,
    pub to_state: String,
    pub from_aa: AminoAcid,
    pub to_aa: AminoAcid,
}

impl Substitution {
    pub fn new(
        site: usize,
        from_state: impl Into<String>,
        to_state: impl Into<String>,
        from_aa: AminoAcid,
        to_aa: AminoAcid,
    ) -> Self {
        Self {
            site,
            from_state: from_state.into(),
            to_state: to_state.into(),
            from_aa,
            to_aa,
        }
    }

    pub fn is_synonymous(&self) -> bool {
        self.from_aa.same_residue(&self.to_aa)
    }
}

impl PartialEq for Substitution {
    fn eq(&self, other: &Self) -> bool {
        self.site == other.site
            && self.from_state == other.from_state
            && self.to_state == other.to_state
    }
}

impl Eq for Substitution {}

impl Hash for Substitution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.site.hash(state);
        self.from_state.hash(state);
        self.to_state.hash(state);
    }
}

impl Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.from_aa, self.site, self.to_aa)
    }
}

/// Compares the ancestral and descendant states of a site.
/// Returns `None` when they are identical.
///
/// # Example
/// ```
/// use ancsub::substitution::compute_substitution;
/// assert!(compute_substitution(3, "AAA", "AAA").unwrap().is_none());
/// let sub = compute_substitution(3, "AAA", "AAG").unwrap().unwrap();
/// assert!(sub.is_synonymous());
/// assert_eq!(sub.to_string(), "K3K");
/// ```
pub fn compute_substitution(
    site: usize,
    from_state: &str,
    to_state: &str,
) -> Result<Option<Substitution>> {
    if from_state == to_state {
        return Ok(None);
    }
    Ok(Some(Substitution::new(
        site,
        from_state,
        to_state,
        AminoAcid::for_state(from_state)?,
        AminoAcid::for_state(to_state)?,
    )))
}

/// Renders substitutions as `[V12A, K13R]`.
pub fn format_substitutions<'a>(subs: impl IntoIterator<Item = &'a Substitution>) -> String {
    format!("[{}]", subs.into_iter().join(", "))
}

pub fn non_synonymous(subs: &[Substitution]) -> impl Iterator<Item = &Substitution> {
    subs.iter().filter(|s| !s.is_synonymous())
}
