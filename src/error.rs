//! Error types for the trait graph library.
//!
//! Data-quality problems never surface here: unknown traits, invalid rows
//! and empty tables degrade to empty results. Only caller mistakes and
//! table I/O failures are errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// Parallel estimate/standard-error inputs of different lengths.
    #[error("estimates and standard errors differ in length ({estimates} vs {standard_errors})")]
    LengthMismatch {
        estimates: usize,
        standard_errors: usize,
    },

    #[error("failed to read table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type Result<T> = std::result::Result<T, GraphError>;
