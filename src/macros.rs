#[macro_export]
macro_rules! tree {
    ($e:expr) => {{
        use $crate::tree::tree_parser::parse_topology;
        parse_topology($e).unwrap()
    }};
}

#[macro_export]
macro_rules! codon_sub {
    ($site:expr, $from:expr, $to:expr) => {{
        use $crate::substitution::compute_substitution;
        compute_substitution($site, $from, $to).unwrap().unwrap()
    }};
}
