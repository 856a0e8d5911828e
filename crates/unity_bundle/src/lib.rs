//! This library handles reading from and creating **asset bundle** archives used by the *Unity*
//! engine.
//!
//! # Asset Bundle Format Documentation
//!
//! An asset bundle is the outer container of the engine's asset pipeline: a small big-endian
//! header followed by a data section holding an entry table and one or more named payloads,
//! usually serialized asset files or streamed resources. Depending on the signature the data
//! section is stored raw or as a single LZMA stream.
//!
//! ## Header
//!
//! All multi-byte integers in the header are big-endian; little-endian is never used in this
//! container. Strings are null terminated.
//!
//! | Field                  | Size | Description                                                  |
//! |------------------------|------|--------------------------------------------------------------|
//! | Signature              | var  | `UnityWeb`, `UnityRaw` or `UnityFS`                          |
//! | Stream Version         | 4    | Wire revision of the header itself                           |
//! | Engine Version         | var  | Free-form version string, e.g. `3.x.x`                       |
//! | Engine Revision        | var  | Free-form version string, e.g. `3.5.7f6`                     |
//! | Minimum Streamed Bytes | 4    | Bytes needed before the first level can load                 |
//! | Header Size            | 4    | Byte size of this header; the data section starts here       |
//! | Levels To Download     | 4    | Number of levels fetched before playback                     |
//! | Level Count            | 4    | Number of level byte-end pairs that follow                   |
//! | Level Byte Ends        | 8×n  | Per level: end offset in the compressed / uncompressed data  |
//! | Complete File Size     | 4    | Total file size; only when stream version >= 2               |
//! | Data Header Size       | 4    | Byte size of the entry table; only when stream version >= 3  |
//! | Flags                  | 4    | Reverse-engineered flag word; only when stream version >= 6  |
//! | Padding                | 1    |                                                              |
//!
//! The signature decides payload compression: `UnityWeb` data sections are one LZMA stream
//! (5-byte properties header followed by a raw LZMA1 stream), `UnityRaw` stores the section
//! uncompressed. `UnityFS` is recognized and its header fields (including the flag word, whose
//! bit semantics are unconfirmed) are preserved as opaque values.
//!
//! ## Entry Table
//!
//! The data section begins with the entry table; entry offsets are relative to the start of the
//! (decompressed) data section and therefore include the table itself.
//!
//! | Field  | Size | Description                                |
//! |--------|------|--------------------------------------------|
//! | Count  | 4    | Number of entries                          |
//! | Name   | var  | Null-terminated entry name, per entry      |
//! | Offset | 4    | Offset of the entry payload, per entry     |
//! | Size   | 4    | Byte length of the entry payload, per entry |
//!
//! When the header predates the data-header-size field (stream version < 3) the table is read
//! from a fixed 4096-byte probe window instead.
//!
//! Compressed payloads are consumed through a single forward-only LZMA stream: entries are
//! always exposed sorted by ascending offset, and accessing data behind the stream's position
//! means discarding the decoder and skipping forward from the start of the data section again.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.unity3d`, `.assetbundle`
//! - **Endianness**: Big-endian for all header and table integers
//! - **Compression**: raw LZMA1 with a 5-byte properties header, or none

pub mod compression;
pub mod error;
pub mod read;
pub mod types;
pub mod write;

pub use read::BundleArchive;
pub use types::BundleSignature;
pub use write::BundleWriter;
