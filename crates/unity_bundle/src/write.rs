//! Types for writing asset bundle archives
//!

use binrw::BinWrite;
use bon::Builder;
use byteorder::WriteBytesExt;
use std::io::{self, Cursor, Seek, Write};
use tracing::{instrument, Level};

use crate::compression;
use crate::error::Result;
use crate::types::{BundleEntryRecord, BundleHeader, BundleSignature, LevelEnds};

/// Entries whose name starts with this prefix are treated as level boundaries when the bundle
/// holds more than one entry.
pub const LEVEL_PREFIX: &str = "level";

fn align4(value: u64) -> u64 {
    (value + 3) & !3
}

/// Options for how the bundle should be written
#[derive(Debug, Clone, Builder)]
pub struct BundleWriterOptions {
    /// The archive signature; `UnityWeb` produces a compressed data section
    #[builder(default)]
    pub signature: BundleSignature,

    /// Header wire revision to emit
    #[builder(default = 3)]
    pub stream_version: u32,

    /// Free-form engine version string
    #[builder(default)]
    pub unity_version: String,

    /// Free-form engine revision string
    #[builder(default)]
    pub unity_revision: String,
}

/// Asset bundle generator
///
/// Payloads are staged uncompressed; when the signature calls for compression the whole data
/// section is compressed in a single pass on [`BundleWriter::finish`], and the header is emitted
/// last with the final offsets.
///
/// ```
/// # fn doit() -> unity_bundle::error::Result<()>
/// # {
/// # use unity_bundle::BundleWriter;
/// use std::io::Write;
/// use unity_bundle::write::BundleWriterOptions;
/// use unity_bundle::BundleSignature;
///
/// // We use a buffer here, though you'd normally use a `File`
/// let mut buf = [0; 65536];
/// let mut bundle = BundleWriter::new(
///     std::io::Cursor::new(&mut buf[..]),
///     BundleWriterOptions::builder()
///         .signature(BundleSignature::UnityRaw)
///         .build(),
/// );
///
/// bundle.start_file("mainData")?;
/// bundle.write(b"Hello, World!")?;
///
/// // Apply the changes you've made.
/// bundle.finish()?;
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct BundleWriter<W: Write + Seek> {
    inner: W,
    options: BundleWriterOptions,
    writing_to_file: bool,
    scratch: Cursor<Vec<u8>>,
    entries: Vec<BundleEntryRecord>,
}

impl<W: Write + Seek> BundleWriter<W> {
    /// Initializes the archive.
    ///
    /// Before writing to this object, the [`BundleWriter::start_file`] function should be
    /// called.
    pub fn new(inner: W, options: BundleWriterOptions) -> BundleWriter<W> {
        BundleWriter {
            inner,
            options,
            writing_to_file: false,
            scratch: Cursor::new(Vec::new()),
            entries: Vec::new(),
        }
    }

    /// Returns true if an entry is currently open for writing.
    pub const fn is_writing_file(&self) -> bool {
        self.writing_to_file
    }

    /// Start a new entry.
    #[instrument(skip(self, name), err)]
    pub fn start_file(&mut self, name: impl ToString) -> Result<()> {
        if self.writing_to_file {
            self.finish_file()?;
        }

        // 4-byte alignment padding between entries
        let len = self.scratch.get_ref().len() as u64;
        for _ in len..align4(len) {
            self.scratch.write_u8(0)?;
        }

        self.entries.push(BundleEntryRecord {
            name: name.to_string(),
            offset: self.scratch.get_ref().len() as u32,
            size: 0,
        });
        self.writing_to_file = true;

        Ok(())
    }

    #[instrument(skip(self), err)]
    fn finish_file(&mut self) -> Result<()> {
        let end = self.scratch.get_ref().len() as u32;
        let record = self
            .entries
            .last_mut()
            .expect("an entry should always be open when finishing a file");
        record.size = end - record.offset;

        self.writing_to_file = false;

        Ok(())
    }

    /// Finish the last entry and write the header, entry table and data section.
    ///
    /// This will return the writer, but one should normally not append any data to the end of
    /// the file.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        if self.writing_to_file {
            self.finish_file()?;
        }

        let table_size = 4 + self
            .entries
            .iter()
            .map(|record| record.name.len() + 1 + 8)
            .sum::<usize>() as u32;
        let base = align4(table_size as u64) as u32;

        let mut table = Cursor::new(Vec::new());
        table.write_all(&(self.entries.len() as u32).to_be_bytes())?;
        for record in &self.entries {
            BundleEntryRecord {
                name: record.name.clone(),
                offset: record.offset + base,
                size: record.size,
            }
            .write(&mut table)?;
        }

        let mut data = table.into_inner();
        data.resize(base as usize, 0);
        data.extend_from_slice(self.scratch.get_ref());

        // level boundaries: the single entry, else entries carrying the reserved prefix
        let mut level_ends: Vec<u32> = match self.entries.as_slice() {
            [only] => vec![base + only.offset + only.size],
            entries => entries
                .iter()
                .filter(|record| record.name.starts_with(LEVEL_PREFIX))
                .map(|record| base + record.offset + record.size)
                .collect(),
        };
        if level_ends.is_empty() {
            level_ends.push(data.len() as u32);
        }

        let body = if self.options.signature.compressed() {
            compression::compress(&data)?
        } else {
            data
        };

        let level_byte_end = level_ends
            .into_iter()
            .map(|uncompressed| LevelEnds {
                compressed: if self.options.signature.compressed() {
                    body.len() as u32
                } else {
                    uncompressed
                },
                uncompressed,
            })
            .collect::<Vec<_>>();

        let mut header = BundleHeader {
            signature: self.options.signature,
            stream_version: self.options.stream_version,
            unity_version: self.options.unity_version.clone(),
            unity_revision: self.options.unity_revision.clone(),
            minimum_streamed_bytes: 0,
            header_size: 0,
            levels_to_download: level_byte_end.len() as u32,
            level_byte_end,
            complete_file_size: (self.options.stream_version >= 2).then_some(0),
            data_header_size: (self.options.stream_version >= 3).then_some(table_size),
            flags: (self.options.stream_version >= 6).then_some(0),
        };

        let mut probe = Cursor::new(Vec::new());
        header.write(&mut probe)?;
        header.header_size = probe.get_ref().len() as u32;

        let complete_file_size = header.header_size + body.len() as u32;
        header.minimum_streamed_bytes = complete_file_size;
        if let Some(size) = header.complete_file_size.as_mut() {
            *size = complete_file_size;
        }

        header.write(&mut self.inner)?;
        self.inner.write_all(&body)?;

        Ok(self.inner)
    }
}

impl<W: Write + Seek> Write for BundleWriter<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size = buf.len()))]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writing_to_file {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "No file has been started",
            ));
        }
        self.scratch.write(buf)
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
