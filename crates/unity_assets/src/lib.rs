//! This library handles reading from and creating the **serialized files** used by the *Unity*
//! engine, and decoding the objects they contain through their type schemas.
//!
//! # Serialized File Format Documentation
//!
//! A serialized file is the inner per-asset container of the engine's asset pipeline: a header,
//! a metadata block (type schemas, object index, external references) and a block of raw object
//! data. The header is always big-endian; the rest of the file switches endianness based on the
//! format version.
//!
//! ## Header
//!
//! | Field         | Size | Description                                                   |
//! |---------------|------|---------------------------------------------------------------|
//! | Metadata Size | 4    | Byte size of the metadata block                               |
//! | File Size     | 4    | Total byte size of the file                                   |
//! | Version       | 4    | Format version; drives every downstream layout decision       |
//! | Data Offset   | 4    | Offset of the object-data block                               |
//! | Endianness    | 1    | Only for version >= 9: non-zero means big-endian body         |
//! | Reserved      | 3    | Only for version >= 9                                         |
//!
//! Version decides three things: where the metadata lives (before version 9 it trails the file
//! at `fileSize - metadataSize`, from version 9 on it follows the header and object data starts
//! at the 16-byte-aligned data offset), the body endianness (big through version 5, little
//! after, the explicit tag from version 9 on), and which wire revision of each metadata section
//! to instantiate:
//!
//! | Version | Type schema | Object info        | External refs |
//! |---------|-------------|--------------------|---------------|
//! | <= 6    | V1          | V1                 | V1            |
//! | 7 - 13  | V2          | V1                 | V2            |
//! | 14      | V3          | V2                 | V2            |
//! | >= 15   | V3          | V3 (stripped flag) | V2            |
//!
//! The metadata block holds, in order: the type schema forest, the object index (path ID,
//! offset, length, type and class identifiers), the object-id table (version > 10 only) and the
//! external file reference table. External references are recorded verbatim; resolving them is
//! out of scope.
//!
//! ## Object Decoding
//!
//! Each object is a raw byte range sliced out of the data block. Decoding walks the object's
//! type tree against those bytes, producing a [`object::FieldNode`] tree that is shape
//! isomorphic to the schema: primitives by exhaustive type-name dispatch, arrays via their
//! `size`/`data` child pair, `string` nodes collapsed to UTF-8 text, 4-byte alignment honored
//! where the schema demands it. A decode that leaves bytes unconsumed fails: a non-zero
//! remainder means the schema did not actually match the data.
//!
//! Objects whose type cannot be resolved from the embedded schemas are retained with no schema
//! attached so a type database can supply one later; they only fail when their field tree is
//! actually requested.

pub mod error;
pub mod object;
pub mod read;
pub mod types;
pub mod write;

pub use object::{FieldNode, FieldValue, ObjectCodec};
pub use read::{ObjectRecord, SerializedFile};
pub use types::{DataBlock, SerializedHeader};
