use std::fs;

use approx::assert_relative_eq;
use assert_matches::assert_matches;
use rstest::*;

use crate::errors::{ConsistencyError, FormatError};
use crate::reconcile::{BranchKey, BranchSubstitutions, NodeNumbering};
use crate::report::{
    parse_report, AncestralData, Dialect, Reconstruction, SiteStateMatrix,
};
use crate::substitution::AminoAcid;
use crate::tree::tree_parser::ParsingError;

const TREES: &str = "\
Ancestral reconstruction by BASEML.

((seq_1: 0.1, seq_2: 0.2): 0.05, seq_3: 0.3);

((1, 2), 3);

((1_seq_1, 2_seq_2) 5 , 3_seq_3) 4 ;
";

fn with_trees(body: &str) -> String {
    format!("header\n\n{}\n{}", TREES, body)
}

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("./data/{}", name)).unwrap()
}

fn substitutions_of(reconstruction: &Reconstruction) -> BranchSubstitutions {
    let numbering = NodeNumbering::new(&reconstruction.labelled_tree).unwrap();
    reconstruction.branch_substitutions(&numbering).unwrap()
}

#[rstest]
#[case::nucleotides("Ancestral reconstruction by BASEML.", Dialect::SiteTable)]
#[case::codons("Ancestral reconstruction by CODONML.", Dialect::BranchListing)]
#[case::lowercase("Ancestral reconstruction by codonml", Dialect::BranchListing)]
fn sniff_dialect(#[case] marker: &str, #[case] dialect: Dialect) {
    let report = format!("Supplemental results\n\n{}\n\n(a, b);\n", marker);
    assert_eq!(Dialect::sniff(&report).unwrap(), dialect);
}

#[rstest]
#[case::unknown_program("Ancestral reconstruction by AAML.\n")]
#[case::no_marker("Supplemental results for CODEML\n")]
#[case::empty("")]
fn sniff_fails(#[case] report: &str) {
    let err = Dialect::sniff(report).unwrap_err();
    assert_matches!(err.downcast_ref::<FormatError>(), Some(_));
}

#[test]
fn site_table_fixture() {
    let reconstruction = parse_report(&fixture("baseml.rst"), None).unwrap();
    let lengths = &reconstruction.lengths_tree;
    let labelled = &reconstruction.labelled_tree;
    assert!(lengths.same_shape(labelled));
    assert_eq!(labelled.leaf_count(), 4);
    assert_eq!(labelled.id(labelled.root), "5");
    assert_relative_eq!(lengths.blen(lengths.leaves()[3]).unwrap(), 0.4);

    let AncestralData::States(matrix) = &reconstruction.data else {
        panic!("Site table reports carry states");
    };
    assert_eq!(matrix.site_count(), 3);
    assert_eq!(matrix.node_count(), 7);
    assert_eq!(matrix.tip_count(), 4);
    assert_eq!(matrix.state(0, 0), "ATG");
    assert_eq!(matrix.state(1, 0), "AAA");
    assert_eq!(matrix.state(1, 1), "AAG");
    assert_eq!(matrix.state(2, 2), "GCC");
    assert_eq!(matrix.state(2, 4), "GTC");
    assert_eq!(matrix.state(2, 6), "GCC");
}

#[test]
fn site_table_substitutions() {
    let reconstruction = parse_report(&fixture("baseml.rst"), None).unwrap();
    let branches = substitutions_of(&reconstruction);
    assert_eq!(branches.len(), 6);
    assert_eq!(branches.values().filter(|subs| !subs.is_empty()).count(), 2);

    let tip = &branches[&BranchKey::new(5, 0)];
    assert_eq!(tip.len(), 1);
    assert_eq!(tip[0].site, 2);
    assert_eq!(tip[0].from_state, "AAG");
    assert_eq!(tip[0].to_state, "AAA");
    assert!(tip[0].is_synonymous());

    let internal = &branches[&BranchKey::new(4, 6)];
    assert_eq!(internal.len(), 1);
    assert_eq!(internal[0].to_string(), "V3A");
    assert!(!internal[0].is_synonymous());
}

#[test]
fn branch_listing_fixture() {
    let reconstruction = parse_report(&fixture("codeml.rst"), None).unwrap();
    let AncestralData::Changes(changes) = &reconstruction.data else {
        panic!("Branch listings carry changes");
    };
    let labels: Vec<&str> = changes.keys().map(String::as_str).collect();
    assert_eq!(labels, vec!["5..6", "5..7", "6..1", "6..2", "7..3", "7..4"]);
    assert!(changes["5..6"].is_empty());
    assert_eq!(changes["6..1"].len(), 1);
    let sub = &changes["5..7"][0];
    assert_eq!(sub.site, 3);
    assert_eq!(sub.from_aa, AminoAcid::Residue('V'));
    assert_eq!(sub.to_aa, AminoAcid::Residue('A'));
}

#[rstest]
#[case::site_table("baseml.rst", None)]
#[case::branch_listing("codeml.rst", None)]
#[case::sequences_of_nucleotide_report("baseml.rst", Some(Dialect::SequenceListing))]
#[case::sequences_of_codon_report("codeml.rst", Some(Dialect::SequenceListing))]
fn dialects_agree(#[case] file: &str, #[case] dialect: Option<Dialect>) {
    let reference = substitutions_of(&parse_report(&fixture("baseml.rst"), None).unwrap());
    let branches = substitutions_of(&parse_report(&fixture(file), dialect).unwrap());
    assert_eq!(branches, reference);
    for (key, subs) in &branches {
        for (sub, expected) in subs.iter().zip(&reference[key]) {
            assert_eq!(sub.from_aa, expected.from_aa);
            assert_eq!(sub.to_aa, expected.to_aa);
        }
    }
}

#[test]
fn ambiguous_states_in_site_table() {
    let report = with_trees(
        "Prob of best state at each node, listed by site\n\n  site   Freq   Data:\n\n\
         1  1  AAA: A(0.9) A(0.9)\n\
         2  1  AAA: A(0.9) A(0.9)\n\
         3  1  NGG: G(0.9) G(0.9)\n\n",
    );
    let reconstruction = parse_report(&report, Some(Dialect::SiteTable)).unwrap();
    let branches = substitutions_of(&reconstruction);
    let sub = &branches[&BranchKey::new(4, 0)][0];
    assert_eq!(sub.from_aa, AminoAcid::Residue('K'));
    assert_eq!(sub.to_aa, AminoAcid::Ambiguous);
    assert!(!sub.is_synonymous());
}

#[test]
fn site_table_ending_with_report() {
    let report = with_trees(
        "Prob of best state at each node, listed by site\n\nheader\n\n\
         1  1  AAA: A A\n2  1  AAA: A A\n3  1  AAA: A A",
    );
    let reconstruction = parse_report(&report, Some(Dialect::SiteTable)).unwrap();
    assert_matches!(reconstruction.data, AncestralData::States(ref m) if m.site_count() == 1);
}

#[rstest]
#[case::no_trees("Ancestral reconstruction by BASEML.\n\nnothing here\n")]
#[case::two_trees("Ancestral reconstruction by BASEML.\n(a, b);\n(1, 2);\n")]
#[case::no_table(&with_trees("Summary of changes along branches.\n"))]
#[case::header_cut_short(&with_trees("Prob of best state at each node, listed by site\n\n"))]
#[case::truncated_record(&with_trees(
    "Prob of best state at each node, listed by site\n\nh\n\n1 1 AAA: A A\n2 1 AAA: A A\n"
))]
#[case::blank_inside_record(&with_trees(
    "Prob of best state at each node, listed by site\n\nh\n\n1 1 AAA: A A\n\n3 1 AAA: A A\n"
))]
#[case::tip_lengths_differ(&with_trees(
    "Prob of best state at each node, listed by site\n\nh\n\n1 1 AAA: A A\n2 1 AA: A A\n3 1 AAA: A A\n\n"
))]
#[case::ancestor_counts_differ(&with_trees(
    "Prob of best state at each node, listed by site\n\nh\n\n1 1 AAA: A A\n2 1 AAA: A\n3 1 AAA: A A\n\n"
))]
#[case::no_tip_column(&with_trees(
    "Prob of best state at each node, listed by site\n\nh\n\n1 1 AAA A A\n2 1 AAA: A A\n3 1 AAA: A A\n\n"
))]
fn malformed_site_tables(#[case] report: &str) {
    let err = parse_report(report, Some(Dialect::SiteTable)).unwrap_err();
    assert_matches!(err.downcast_ref::<FormatError>(), Some(_));
}

#[test]
fn malformed_topology_in_report() {
    let report = "Ancestral reconstruction by BASEML.\n((a, b);\n";
    let err = parse_report(report, None).unwrap_err();
    assert!(err.to_string().contains("line 2"));
    assert_matches!(err.downcast_ref::<ParsingError>(), Some(_));
}

#[test]
fn site_state_counts_must_agree() {
    let mut matrix = SiteStateMatrix::default();
    matrix.push_site(3, vec!["AAA".to_string(); 5]).unwrap();
    let err = matrix.push_site(3, vec!["AAA".to_string(); 4]).unwrap_err();
    assert_matches!(err.downcast_ref::<ConsistencyError>(), Some(_));
    let err = matrix.push_site(2, vec!["AAA".to_string(); 5]).unwrap_err();
    assert_matches!(err.downcast_ref::<ConsistencyError>(), Some(_));
    let err = matrix.push_site(6, vec!["AAA".to_string(); 5]).unwrap_err();
    assert_matches!(err.downcast_ref::<ConsistencyError>(), Some(_));
    assert_eq!(matrix.site_count(), 1);
    assert_eq!(matrix.tip_count(), 3);
}

#[test]
fn site_states_must_cover_the_tree() {
    let report = with_trees(
        "Prob of best state at each node, listed by site\n\nh\n\n\
         1 1 AAA: A\n2 1 AAA: A\n3 1 AAA: A\n\n",
    );
    let reconstruction = parse_report(&report, Some(Dialect::SiteTable)).unwrap();
    let numbering = NodeNumbering::new(&reconstruction.labelled_tree).unwrap();
    let err = reconstruction.branch_substitutions(&numbering).unwrap_err();
    assert_matches!(err.downcast_ref::<ConsistencyError>(), Some(_));
}

#[test]
fn site_table_tips_must_match_the_tree() {
    let report = with_trees(
        "Prob of best state at each node, listed by site\n\nh\n\n\
         1 1 AA: A A A\n2 1 AA: A A A\n3 1 AA: A A A\n\n",
    );
    let reconstruction = parse_report(&report, Some(Dialect::SiteTable)).unwrap();
    let AncestralData::States(matrix) = &reconstruction.data else {
        panic!("Site table reports carry states");
    };
    assert_eq!(matrix.node_count(), 5);
    assert_eq!(matrix.tip_count(), 2);
    let numbering = NodeNumbering::new(&reconstruction.labelled_tree).unwrap();
    let err = reconstruction.branch_substitutions(&numbering).unwrap_err();
    assert_matches!(err.downcast_ref::<ConsistencyError>(), Some(_));
    assert!(err.to_string().contains("2 tips per site, tree has 3"));
}

const LISTING_HEAD: &str = "Summary of changes along branches.\nCheck root for directions of change.\n\n";

#[test]
fn branch_listing_without_trailing_blank_lines() {
    let report = with_trees(&format!(
        "{}Branch 1:    4..5  (n= 0 s= 0)\n\
         Branch 2:    5..1 (seq_1)\n\n     1 AAA (K) 1.0 -> AAG (K) 1.0\n\
         Branch 3:    5..2 (seq_2)\n\n     2 GTC (V) 1.0 -> GCC (A) 1.0\n\
         List of extant and reconstructed sequences\n",
        LISTING_HEAD
    ));
    let reconstruction = parse_report(&report, Some(Dialect::BranchListing)).unwrap();
    let AncestralData::Changes(changes) = &reconstruction.data else {
        panic!("Branch listings carry changes");
    };
    assert_eq!(changes.len(), 3);
    assert!(changes["4..5"].is_empty());
    assert_eq!(changes["5..1"][0].to_string(), "K1K");
    assert_eq!(changes["5..2"][0].to_string(), "V2A");

    let branches = substitutions_of(&reconstruction);
    assert_eq!(branches.len(), 4);
    assert!(branches[&BranchKey::new(3, 2)].is_empty());
    assert_eq!(branches[&BranchKey::new(4, 1)].len(), 1);
}

#[rstest]
#[case::no_summary("List of extant and reconstructed sequences\n")]
#[case::no_end_marker("Summary of changes along branches.\n\nBranch 1:  4..5\n\n")]
#[case::duplicate_branch(
    "Summary of changes along branches.\n\nBranch 1:  4..5\n\nBranch 2:  4..5\n\n\nList of extant and reconstructed sequences\n"
)]
#[case::header_without_label(
    "Summary of changes along branches.\n\nBranch 1:\n\nList of extant and reconstructed sequences\n"
)]
#[case::change_without_arrow(
    "Summary of changes along branches.\n\nBranch 1:  4..5\n\n  1 AAA (K) AAG (K)\n\nList of extant and reconstructed sequences\n"
)]
#[case::site_not_a_number(
    "Summary of changes along branches.\n\nBranch 1:  4..5\n\n  x AAA (K) 1.0 -> AAG (K) 1.0\n\nList of extant and reconstructed sequences\n"
)]
#[case::not_a_codon(
    "Summary of changes along branches.\n\nBranch 1:  4..5\n\n  1 AA (K) 1.0 -> AAG (K) 1.0\n\nList of extant and reconstructed sequences\n"
)]
#[case::unbracketed_amino_acid(
    "Summary of changes along branches.\n\nBranch 1:  4..5\n\n  1 AAA K 1.0 -> AAG (K) 1.0\n\nList of extant and reconstructed sequences\n"
)]
#[case::missing_right_side(
    "Summary of changes along branches.\n\nBranch 1:  4..5\n\n  1 AAA (K) 1.0 -> AAG\n\nList of extant and reconstructed sequences\n"
)]
fn malformed_branch_listings(#[case] body: &str) {
    let err = parse_report(&with_trees(body), Some(Dialect::BranchListing)).unwrap_err();
    assert_matches!(err.downcast_ref::<FormatError>(), Some(_));
}

#[test]
fn listed_branch_missing_from_tree() {
    let report = with_trees(&format!(
        "{}Branch 1:    4..9  (n= 0 s= 0)\n\n  1 AAA (K) 1.0 -> AAG (K) 1.0\n\n\
         List of extant and reconstructed sequences\n",
        LISTING_HEAD
    ));
    let reconstruction = parse_report(&report, Some(Dialect::BranchListing)).unwrap();
    let numbering = NodeNumbering::new(&reconstruction.labelled_tree).unwrap();
    let err = reconstruction.branch_substitutions(&numbering).unwrap_err();
    assert_matches!(err.downcast_ref::<ConsistencyError>(), Some(_));
}

const SEQUENCES_HEAD: &str = "List of extant and reconstructed sequences\n\n    3     6\n\n";

#[test]
fn sequence_listing_rows() {
    let report = with_trees(&format!(
        "{}seq_1  atg aaa\nseq_2  ATG AAG\nseq_3  ATGAAG\nnode #4  ATG AAG\nnode #5  ATG AAG\n",
        SEQUENCES_HEAD
    ));
    let reconstruction = parse_report(&report, Some(Dialect::SequenceListing)).unwrap();
    let AncestralData::States(matrix) = &reconstruction.data else {
        panic!("Sequence listings carry states");
    };
    assert_eq!(matrix.site_count(), 2);
    assert_eq!(matrix.node_count(), 5);
    assert_eq!(matrix.tip_count(), 3);
    assert_eq!(matrix.state(1, 0), "AAA");
    let branches = substitutions_of(&reconstruction);
    assert_eq!(branches[&BranchKey::new(4, 0)][0].to_string(), "K2K");
}

#[rstest]
#[case::no_rows("\n")]
#[case::partial_codon("seq_1  ATGA\nseq_2  ATGA\nseq_3  ATGA\nnode #4  ATGA\nnode #5  ATGA\n\n")]
#[case::unequal_lengths("seq_1  ATG\nseq_2  ATGAAA\nseq_3  ATG\nnode #4  ATG\nnode #5  ATG\n\n")]
#[case::ancestor_misnumbered("seq_1  ATG\nseq_2  ATG\nseq_3  ATG\nnode #5  ATG\nnode #4  ATG\n\n")]
#[case::tip_after_ancestor("seq_1  ATG\nseq_2  ATG\nnode #3  ATG\nseq_3  ATG\nnode #5  ATG\n\n")]
fn malformed_sequence_listings(#[case] rows: &str) {
    let report = with_trees(&format!("{}{}", SEQUENCES_HEAD, rows));
    let err = parse_report(&report, Some(Dialect::SequenceListing)).unwrap_err();
    assert_matches!(err.downcast_ref::<FormatError>(), Some(_));
}
