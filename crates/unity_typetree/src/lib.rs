//! This library handles reading from and creating the **type tree** schemas embedded in Unity
//! serialized files.
//!
//! # Type Tree Format Documentation
//!
//! A type tree describes the byte layout of one serialized class as a tree of typed fields. It is
//! the schema that drives the generic object codec: decoding an object is a walk over its type
//! tree against the raw object bytes. Serialized files may embed the trees for every class they
//! contain, or omit them entirely, in which case a persisted [`database::TypeDatabase`] supplies
//! a previously learned tree.
//!
//! ## Wire Revisions
//!
//! Three incompatible encodings exist, selected by the serialized file's format version:
//!
//! | Format version | Revision | Encoding                                                         |
//! |----------------|----------|------------------------------------------------------------------|
//! | <= 6           | V1       | Depth-first recursive records with inline strings                |
//! | 7 - 13         | V2       | V1 plus engine revision string, attributes, trailing padding     |
//! | >= 14          | V3       | Flat 24-byte records with string-table offsets, level-encoded    |
//!
//! ### V1 / V2 Node Record
//!
//! Strings are stored inline, null terminated. All integers use the endianness of the
//! surrounding metadata block.
//!
//! | Field        | Size | Description                                              |
//! |--------------|------|----------------------------------------------------------|
//! | Type         | var  | Type name ("int", "string", "GameObject", ...)           |
//! | Name         | var  | Field name ("m_Name", "size", ...)                       |
//! | Size         | 4    | Byte size of the field, -1 for composites                |
//! | Index        | 4    | Declaration index among siblings                         |
//! | Is Array     | 4    | Non-zero when the node is a collection                   |
//! | Version      | 4    | Schema revision counter of the declaring class           |
//! | Meta Flags   | 4    | Bit flags; 0x4000 forces 4-byte alignment after the field |
//! | Child Count  | 4    | Number of immediate children, read recursively           |
//!
//! V2 wraps the record list with a leading engine revision string plus an attributes integer and
//! appends 4 bytes of padding.
//!
//! ### V3 Flat Record
//!
//! V3 abandons recursion: each class stores `fieldCount` fixed 24-byte records followed by a
//! packed local string table. A record's `level` gives its depth; the tree is rebuilt by
//! climbing `(currentLevel - newLevel)` ancestors before attaching each record.
//!
//! | Field         | Size | Description                                        |
//! |---------------|------|----------------------------------------------------|
//! | Version       | 2    | Schema revision counter                            |
//! | Level         | 1    | Tree depth, root is 0                              |
//! | Is Array      | 1    | Non-zero when the node is a collection             |
//! | Type Offset   | 4    | String-table offset of the type name               |
//! | Name Offset   | 4    | String-table offset of the field name              |
//! | Size          | 4    | Byte size, -1 for composites                       |
//! | Index         | 4    | Declaration index                                  |
//! | Meta Flags    | 4    | Bit flags                                          |
//!
//! A string offset with the high bit set indexes the shared table of well-known names bundled
//! with this crate (`offset & 0x7FFFFFFF`); a low offset indexes the class's local table. Local
//! strings are null terminated and packed back to back, so a string's offset is the sum of the
//! lengths (plus terminators) of the strings before it.
//!
//! ## Type Database
//!
//! [`database::TypeDatabase`] persists learned `(class identifier, engine version) -> tree`
//! entries to a flat version-tagged binary file, deduplicating structurally equal trees. Lookup
//! falls back from an exact version match to a major+minor match, then a warned major-only
//! match, then a warned any-version match.

pub mod database;
pub mod endian;
pub mod error;
pub mod read;
pub mod strings;
pub mod tree;
pub mod version;
pub mod write;

pub use database::TypeDatabase;
pub use endian::Endianness;
pub use read::read_type_forest;
pub use strings::TypeTreeContext;
pub use tree::{ClassSchema, TypeForest, TypeNode, TypeTree};
pub use version::UnityVersion;
pub use write::write_type_forest;
