use std::collections::{BTreeSet, HashMap};

use anyhow::bail;
use itertools::iproduct;
use lazy_static::lazy_static;

use crate::errors::FormatError;
use crate::Result;

pub const CODON_LENGTH: usize = 3;
pub const STOP: char = '*';

pub static NUCLEOTIDES: &[u8] = b"TCAG";

/// Universal genetic code, codons enumerated in TCAG order
/// (TTT, TTC, TTA, TTG, TCT, ...).
static UNIVERSAL_CODE: &[u8; 64] =
    b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

lazy_static! {
    static ref IUPAC_EXPANSIONS: HashMap<u8, &'static [u8]> = {
        let mut map: HashMap<u8, &'static [u8]> = HashMap::new();
        map.insert(b'N', NUCLEOTIDES);
        map.insert(b'-', NUCLEOTIDES);
        map.insert(b'R', b"GA");
        map.insert(b'W', b"AT");
        map.insert(b'Y', b"CT");
        map.insert(b'M', b"AC");
        map.insert(b'K', b"GT");
        map.insert(b'S', b"GC");
        map.insert(b'H', b"ACT");
        map.insert(b'B', b"CGT");
        map.insert(b'V', b"ACG");
        map.insert(b'D', b"AGT");
        map
    };
}

fn nucleotide_index(nucleotide: u8) -> Option<usize> {
    NUCLEOTIDES.iter().position(|&n| n == nucleotide)
}

/// Returns the unambiguous nucleotides a single IUPAC code stands for.
/// Canonical nucleotides expand to themselves, gaps to all four nucleotides.
///
/// # Example
/// ```
/// use ancsub::codons::expand_nucleotide;
/// assert_eq!(expand_nucleotide(b'R').unwrap(), b"GA");
/// assert_eq!(expand_nucleotide(b'C').unwrap(), b"C");
/// assert!(expand_nucleotide(b'Q').is_err());
/// ```
pub fn expand_nucleotide(code: u8) -> Result<&'static [u8]> {
    let code = code.to_ascii_uppercase();
    if let Some(i) = nucleotide_index(code) {
        return Ok(&NUCLEOTIDES[i..i + 1]);
    }
    match IUPAC_EXPANSIONS.get(&code) {
        Some(expansion) => Ok(expansion),
        None => bail!(FormatError::new(format!(
            "Unrecognised nucleotide code '{}'",
            code as char
        ))),
    }
}

pub fn is_ambiguous(codon: &[u8]) -> bool {
    codon
        .iter()
        .any(|c| IUPAC_EXPANSIONS.contains_key(&c.to_ascii_uppercase()))
}

fn to_codon(triplet: &str) -> Result<[u8; CODON_LENGTH]> {
    let bytes = triplet.as_bytes();
    if bytes.len() != CODON_LENGTH {
        bail!(FormatError::new(format!(
            "Expected a nucleotide triplet, got '{}'",
            triplet
        )));
    }
    Ok([
        bytes[0].to_ascii_uppercase(),
        bytes[1].to_ascii_uppercase(),
        bytes[2].to_ascii_uppercase(),
    ])
}

/// Direct universal code lookup for a codon made of T, C, A and G only.
fn translate(codon: &[u8; CODON_LENGTH]) -> Result<char> {
    let mut index = 0;
    for &nucleotide in codon {
        match nucleotide_index(nucleotide) {
            Some(i) => index = index * 4 + i,
            None => bail!(FormatError::new(format!(
                "Unrecognised nucleotide code '{}'",
                nucleotide as char
            ))),
        }
    }
    Ok(UNIVERSAL_CODE[index] as char)
}

/// Returns every amino acid a (possibly ambiguous) nucleotide triplet can encode.
/// Ambiguity codes are expanded independently at the three positions and all
/// resulting concrete codons are translated with the universal code.
/// Stop codons translate to `*`.
///
/// # Example
/// ```
/// use std::collections::BTreeSet;
/// use ancsub::codons::amino_acids_for;
/// assert_eq!(amino_acids_for("ATG").unwrap(), BTreeSet::from(['M']));
/// assert_eq!(amino_acids_for("GCN").unwrap(), BTreeSet::from(['A']));
/// assert_eq!(amino_acids_for("AAN").unwrap(), BTreeSet::from(['K', 'N']));
/// ```
pub fn amino_acids_for(triplet: &str) -> Result<BTreeSet<char>> {
    let codon = to_codon(triplet)?;
    if !is_ambiguous(&codon) {
        return Ok(BTreeSet::from([translate(&codon)?]));
    }
    let first = expand_nucleotide(codon[0])?;
    let second = expand_nucleotide(codon[1])?;
    let third = expand_nucleotide(codon[2])?;
    iproduct!(first, second, third)
        .map(|(&a, &b, &c)| translate(&[a, b, c]))
        .collect()
}
