//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// A packed string-table offset that resolves to neither the local nor the shared table.
    /// Signals a codec/version mismatch rather than recoverable data.
    #[error("string table offset {0:#010x} has no entry")]
    StringTableOffset(u32),

    /// Engine version string could not be parsed
    #[error("invalid engine version string {0:?}")]
    InvalidVersion(String),

    /// The persisted type database carries an unknown format tag
    #[error("unsupported type database format version {0}")]
    DatabaseVersion(u32),

    /// Structurally invalid schema data
    #[error("malformed type schema: {0}")]
    Malformed(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
