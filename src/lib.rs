use anyhow::Error;

pub mod annotation;
pub mod codons;
pub mod errors;
pub mod io;
pub mod macros;
pub mod reconcile;
pub mod report;
pub mod substitution;
pub mod tree;

type Result<T> = std::result::Result<T, Error>;
