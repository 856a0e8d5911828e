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

    /// Transparent wrapper for [`xz2::stream::Error`]
    #[error(transparent)]
    LzmaError(#[from] xz2::stream::Error),

    /// file is an invalid asset bundle
    #[error("file is an invalid asset bundle")]
    InvalidArchive,

    /// The packed LZMA properties byte is out of range
    #[error("invalid lzma properties byte {0:#04x}")]
    InvalidLzmaProps(u8),

    /// The compressed stream ended before the requested range
    #[error("bundle data stream ended after {read} of {expected} bytes")]
    Truncated {
        /// Bytes actually produced by the stream
        read: u64,
        /// Bytes the entry table promised
        expected: u64,
    },

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
