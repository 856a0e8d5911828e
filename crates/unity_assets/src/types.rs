//! Base types for structure of serialized files.

use binrw::binrw;
use unity_typetree::Endianness;

/// A byte range within a containing file.
///
/// Offsets are rewritten whenever a section changes size, so blocks are only valid for the
/// byte stream they were decoded from. Ranges belonging to one container never overlap and
/// never extend past the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataBlock {
    pub offset: u64,
    pub length: u64,
}

impl DataBlock {
    pub fn new(offset: u64, length: u64) -> Self {
        DataBlock { offset, length }
    }

    /// First byte past the range.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Whether `other` lies entirely inside this range.
    pub fn contains(&self, other: &DataBlock) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }
}

/// The byte ranges of every section of a decoded serialized file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializedBlocks {
    pub header: DataBlock,
    pub type_tree: DataBlock,
    pub object_info: DataBlock,
    pub object_ids: DataBlock,
    pub externals: DataBlock,
    pub object_data: DataBlock,
}

/// Endianness tag carried by headers from format version 9 on.
#[binrw]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndianTag {
    /// Non-zero selects a big-endian body
    pub big_endian: u8,
    pub reserved: [u8; 3],
}

/// Serialized file header
///
/// Always stored big-endian regardless of the body endianness.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializedHeader {
    /// Byte size of the metadata block
    pub metadata_size: u32,

    /// Total byte size of the file
    pub file_size: u32,

    /// Format version; drives endianness, layout and wire revision selection
    pub version: u32,

    /// Offset of the object-data block
    pub data_offset: u32,

    /// Body endianness tag; format version >= 9 only
    #[br(if(version >= 9))]
    pub endian_tag: Option<EndianTag>,
}

impl SerializedHeader {
    /// Endianness of everything after the header.
    ///
    /// Bodies are big-endian through version 5 and little-endian after; from version 9 on the
    /// explicit tag decides.
    pub fn endianness(&self) -> Endianness {
        match self.endian_tag {
            Some(tag) if tag.big_endian != 0 => Endianness::Big,
            Some(_) => Endianness::Little,
            None if self.version > 5 => Endianness::Little,
            None => Endianness::Big,
        }
    }
}

/// One row of the object index.
///
/// `is_destroyed` only exists in the oldest wire revision, `script_type_index` from version 14
/// and `stripped` from version 15 on; the fields default to zero elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Stable object identity within the file
    pub path_id: i64,
    /// Byte offset of the object data, relative to the data offset
    pub offset: u64,
    /// Byte length of the object data
    pub length: u64,
    /// Type identifier linking into the schema forest
    pub type_id: i32,
    /// Numeric class identifier
    pub class_id: i16,
    /// Legacy destruction marker (version <= 13)
    pub is_destroyed: i16,
    /// Index into the script type table (version >= 14)
    pub script_type_index: i16,
    /// Whether the object was stripped for the target platform (version >= 15)
    pub stripped: bool,
}

/// One row of the object-id table (format version > 10).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectIdRecord {
    /// Index of the serialized file the object lives in
    pub serialized_file_index: i32,
    /// Path ID within that file
    pub path_id: i64,
}

/// A reference to an external file.
///
/// Only the reference strings are recorded; resolving them is out of scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIdentifier {
    /// Original asset path (wire revision V2 only)
    pub asset_path: String,
    /// Unique identifier of the referenced file (V2 only)
    pub guid: [u8; 16],
    /// Kind of the referenced file (V2 only)
    pub kind: i32,
    /// Path of the referenced file
    pub file_path: String,
}
