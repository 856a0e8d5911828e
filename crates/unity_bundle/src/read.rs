//! Types for reading asset bundle archives
//!

use binrw::BinRead;
use byteorder::{BigEndian, ReadBytesExt};
use indexmap::IndexMap;
use std::{
    borrow::Cow,
    fmt::{self, Debug},
    io::{Read, Seek},
    sync::Arc,
};
use tracing::warn;

use crate::{
    compression::BundleBlockReader,
    error::{Error, FileNotFoundError, Result},
    types::{BundleEntryRecord, BundleHeader},
};

/// Window used to locate the entry table when the header predates the data-header-size field.
const DATA_HEADER_PROBE: u64 = 4096;

/// A struct for reading an entry from an asset bundle
pub struct BundleFile<'a, R: Read + Seek> {
    data: Cow<'a, BundleFileData>,
    reader: BundleBlockReader<'a, R>,
}

impl<R: Read + Seek> Debug for BundleFile<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BundleFile({:#?})", self.get_metadata())
    }
}

/// Methods for retrieving information on bundle entries
impl<R: Read + Seek> BundleFile<'_, R> {
    /// Get the name of the entry
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`). Carelessly writing to these paths
    /// allows an attacker to craft a bundle that will overwrite critical
    /// files.
    ///
    pub fn name(&self) -> &str {
        &self.get_metadata().file_name
    }

    /// Get the size of the entry payload, in bytes
    pub fn size(&self) -> u64 {
        self.get_metadata().size
    }

    /// Get the offset of the entry payload within the (decompressed) data section
    pub fn data_offset(&self) -> u64 {
        self.get_metadata().offset
    }

    fn get_metadata(&self) -> &BundleFileData {
        self.data.as_ref()
    }
}

impl<R: Read + Seek> Read for BundleFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Structure representing a bundle entry.
#[derive(Debug, Clone, Default)]
pub struct BundleFileData {
    /// Name of the entry
    pub file_name: Box<str>,
    /// Offset of the payload relative to the start of the data section
    pub offset: u64,
    /// Byte length of the payload
    pub size: u64,
}

#[derive(Debug)]
pub(crate) struct Shared {
    header: BundleHeader,
    files: IndexMap<Box<str>, BundleFileData>,
    data_start: u64,
}

/// Asset bundle reader
///
/// Entries are exposed sorted by ascending payload offset regardless of their on-disk table
/// order, because compressed data sections are consumed through a single forward-only LZMA
/// stream.
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_bundle_contents(reader: impl Read + Seek) -> unity_bundle::error::Result<()> {
///     let mut bundle = unity_bundle::BundleArchive::new(reader)?;
///
///     for i in 0..bundle.len() {
///         let mut file = bundle.by_index(i)?;
///         println!("Entry: {}", file.name());
///         std::io::copy(&mut file, &mut std::io::stdout())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct BundleArchive<R> {
    reader: R,
    shared: Arc<Shared>,
}

impl<R> BundleArchive<R> {
    /// Total size of the entry payloads in the archive, if it can be known. Doesn't include
    /// the entry table or header.
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for file in self.shared.files.values() {
            total = total.checked_add(file.size as u128)?;
        }
        Some(total)
    }
}

impl<R: Read + Seek> BundleArchive<R> {
    /// Read a bundle archive collecting the entries it contains.
    pub fn new(mut reader: R) -> Result<BundleArchive<R>> {
        if let Ok(shared) = Self::get_metadata(&mut reader) {
            return Ok(BundleArchive {
                reader,
                shared: shared.into(),
            });
        }

        Err(Error::InvalidArchive)
    }

    /// Number of entries contained in this bundle.
    pub fn len(&self) -> usize {
        self.shared.files.len()
    }

    /// Whether this bundle contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The decoded bundle header.
    pub fn header(&self) -> &BundleHeader {
        &self.shared.header
    }

    /// Returns an iterator over all the entry names in this archive, in ascending offset order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.shared.files.keys().map(|s| s.as_ref())
    }

    /// Get the index of an entry by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.shared.files.get_index_of(name)
    }

    /// Get the name of an entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.shared
            .files
            .get_index(index)
            .map(|(name, _)| name.as_ref())
    }

    /// Search for an entry by name
    pub fn by_name(&mut self, name: &str) -> Result<BundleFile<'_, R>> {
        let Some(index) = self.shared.files.get_index_of(name) else {
            return Err(Error::FileNotFound(FileNotFoundError::Name(
                name.to_owned(),
            )));
        };
        self.by_index(index)
    }

    /// Get a contained entry by index
    ///
    /// For compressed bundles this recreates the decompression stream from the start of the
    /// data section and skips forward to the entry; iterating entries in index order is
    /// therefore the cheap access pattern.
    pub fn by_index(&mut self, file_number: usize) -> Result<BundleFile<'_, R>> {
        let (_, data) = self
            .shared
            .files
            .get_index(file_number)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(file_number)))?;

        Ok(BundleFile {
            data: Cow::Borrowed(data),
            reader: BundleBlockReader::new(
                &mut self.reader,
                self.shared.data_start,
                data.offset,
                data.size,
                self.shared.header.compressed(),
            )?,
        })
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn get_entries(reader: &mut R, header: &BundleHeader, data_start: u64) -> Result<Vec<BundleEntryRecord>> {
        let window = match header.entry_table_size() {
            0 => DATA_HEADER_PROBE,
            size => size as u64,
        };

        let mut table_reader =
            BundleBlockReader::new(reader, data_start, 0, window, header.compressed())?;

        let count = table_reader.read_u32::<BigEndian>()?;
        (0..count)
            .map(|_| BundleEntryRecord::read(&mut table_reader).map_err(Error::from))
            .collect()
    }

    fn get_metadata(reader: &mut R) -> Result<Shared> {
        let header = BundleHeader::read(reader)?;
        let data_start = header.header_size as u64;

        let mut records = Self::get_entries(reader, &header, data_start)?;
        // compressed payloads can only be read forward
        records.sort_by_key(|record| record.offset);

        let mut index_map = IndexMap::with_capacity(records.len());
        for record in records {
            let file = BundleFileData {
                file_name: record.name.clone().into(),
                offset: record.offset as u64,
                size: record.size as u64,
            };
            if index_map.insert(file.file_name.clone(), file).is_some() {
                warn!(name = %record.name, "duplicate entry name in bundle");
            }
        }

        Ok(Shared {
            header,
            files: index_map,
            data_start,
        })
    }
}
