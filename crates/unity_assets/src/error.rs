//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent wrapper for schema codec errors
    #[error(transparent)]
    TypeTree(#[from] unity_typetree::error::Error),

    /// file is an invalid serialized file
    #[error("file is an invalid serialized file")]
    InvalidFile,

    /// A type name outside the closed primitive set
    #[error("unknown primitive type {0:?}")]
    UnknownPrimitive(String),

    /// The schema did not consume the object's bytes exactly
    #[error("object decode left {0} bytes unaccounted for")]
    TrailingBytes(u64),

    /// No schema could be resolved for the object
    #[error("object has no resolvable type schema")]
    MissingSchema,

    /// The field tree holds a value that cannot be re-encoded
    #[error("field {field:?} cannot be re-serialized: {reason}")]
    UnsupportedSerialize {
        /// Field name of the offending node
        field: String,
        /// Why the value cannot be re-encoded
        reason: String,
    },

    /// Structurally invalid container data
    #[error("malformed serialized file: {0}")]
    Malformed(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
