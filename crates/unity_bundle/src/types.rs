//! Base types for structure of asset bundle files.

use binrw::{binrw, NullString};

/// The three recognized archive signatures.
///
/// The signature must validate before any other header field is trusted; an unknown tag fails
/// the header parse outright.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum BundleSignature {
    /// Web-player bundle, data section is one LZMA stream
    #[default]
    UnityWeb,
    /// Uncompressed bundle
    UnityRaw,
    /// Block-based successor format; recognized, fields preserved opaquely
    UnityFs,
}

impl BundleSignature {
    /// The on-disk tag.
    pub fn tag(&self) -> &'static str {
        match self {
            BundleSignature::UnityWeb => "UnityWeb",
            BundleSignature::UnityRaw => "UnityRaw",
            BundleSignature::UnityFs => "UnityFS",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "UnityWeb" => Some(BundleSignature::UnityWeb),
            "UnityRaw" => Some(BundleSignature::UnityRaw),
            "UnityFS" => Some(BundleSignature::UnityFs),
            _ => None,
        }
    }

    /// Whether the data section is stored as a single LZMA stream.
    pub fn compressed(&self) -> bool {
        matches!(self, BundleSignature::UnityWeb)
    }
}

/// End offsets of one streamed level within the data section.
#[binrw]
#[brw(big)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct LevelEnds {
    /// End offset within the compressed stream
    pub compressed: u32,
    /// End offset within the uncompressed data
    pub uncompressed: u32,
}

/// Asset bundle header
///
/// Always stored big-endian. Several fields only exist from a given stream-format revision on;
/// they read as `None` for older files and are omitted again when writing.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, PartialEq)]
pub struct BundleHeader {
    /// Archive signature, decides payload compression
    #[br(try_map = |raw: NullString| BundleSignature::from_tag(&raw.to_string()).ok_or_else(|| format!("invalid bundle signature {:?}", raw.to_string())))]
    #[bw(map = |signature: &BundleSignature| NullString::from(signature.tag()))]
    pub signature: BundleSignature,

    /// Wire revision of this header
    pub stream_version: u32,

    /// Free-form engine version string, e.g. "3.x.x"
    #[br(map = |raw: NullString| raw.to_string())]
    #[bw(map = |version: &String| NullString::from(version.as_str()))]
    pub unity_version: String,

    /// Free-form engine revision string, e.g. "3.5.7f6"
    #[br(map = |raw: NullString| raw.to_string())]
    #[bw(map = |revision: &String| NullString::from(revision.as_str()))]
    pub unity_revision: String,

    /// Number of bytes needed before the first level can be loaded
    pub minimum_streamed_bytes: u32,

    /// Byte size of this header; the data section starts at this offset
    pub header_size: u32,

    /// Number of levels to fetch before playback starts
    pub levels_to_download: u32,

    #[br(temp)]
    #[bw(calc = level_byte_end.len() as u32)]
    level_count: u32,

    /// Per level end offsets in the compressed and uncompressed data
    #[br(count = level_count)]
    pub level_byte_end: Vec<LevelEnds>,

    /// Total size of the bundle file; stream version >= 2 only
    #[br(if(stream_version >= 2))]
    pub complete_file_size: Option<u32>,

    /// Byte size of the entry table inside the data section; stream version >= 3 only
    #[br(if(stream_version >= 3))]
    pub data_header_size: Option<u32>,

    /// Reverse-engineered flag word; stream version >= 6 only. Bit semantics are unconfirmed,
    /// see the accessors.
    #[br(if(stream_version >= 6))]
    pub flags: Option<u32>,

    #[br(temp)]
    #[bw(calc = 0u8)]
    padding: u8,
}

impl Default for BundleHeader {
    fn default() -> Self {
        BundleHeader {
            signature: BundleSignature::default(),
            stream_version: 3,
            unity_version: String::new(),
            unity_revision: String::new(),
            minimum_streamed_bytes: 0,
            levels_to_download: 1,
            header_size: 0,
            level_byte_end: Vec::new(),
            complete_file_size: Some(0),
            data_header_size: Some(0),
            flags: None,
        }
    }
}

impl BundleHeader {
    /// Whether the data section is stored as a single LZMA stream.
    pub fn compressed(&self) -> bool {
        self.signature.compressed()
    }

    /// Byte size of the entry table, 0 when the revision predates the field.
    pub fn entry_table_size(&self) -> u32 {
        self.data_header_size.unwrap_or(0)
    }

    /// Guessed: the archive carries a directory of named entries. Unconfirmed.
    pub fn flag_directory_info(&self) -> bool {
        self.flags.unwrap_or(0) & 0x40 != 0
    }

    /// Guessed: the entry table sits at the end of the file. Unconfirmed.
    pub fn flag_blocks_info_at_end(&self) -> bool {
        self.flags.unwrap_or(0) & 0x80 != 0
    }

    /// Observed in the wild with no known effect. Unconfirmed.
    pub fn flag_0x100(&self) -> bool {
        self.flags.unwrap_or(0) & 0x100 != 0
    }
}

/// One row of the entry table inside the data section.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleEntryRecord {
    /// Entry name, null terminated on disk
    #[br(map = |raw: NullString| raw.to_string())]
    #[bw(map = |name: &String| NullString::from(name.as_str()))]
    pub name: String,

    /// Payload offset relative to the start of the (decompressed) data section
    pub offset: u32,

    /// Payload byte length
    pub size: u32,
}
