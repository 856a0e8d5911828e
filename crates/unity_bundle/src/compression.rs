//! LZMA stream handling for compressed data sections.

use std::io::{self, Read, Seek, Write};

use binrw::io::NoSeek;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::instrument;
use xz2::read::XzDecoder;
use xz2::stream::{Filters, LzmaOptions, Stream};
use xz2::write::XzEncoder;

use crate::error::{Error, Result};

/// Dictionary size of the single-pass encoder configuration.
pub const DICTIONARY_SIZE: u32 = 1 << 23;

/// Match length ("fast bytes") of the single-pass encoder configuration.
pub const NICE_LEN: u32 = 273;

const LITERAL_CONTEXT_BITS: u32 = 3;
const LITERAL_POSITION_BITS: u32 = 0;
const POSITION_BITS: u32 = 2;

/// The 5-byte properties header preceding a raw LZMA1 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaProps {
    pub literal_context_bits: u32,
    pub literal_position_bits: u32,
    pub position_bits: u32,
    pub dictionary_size: u32,
}

impl Default for LzmaProps {
    fn default() -> Self {
        LzmaProps {
            literal_context_bits: LITERAL_CONTEXT_BITS,
            literal_position_bits: LITERAL_POSITION_BITS,
            position_bits: POSITION_BITS,
            dictionary_size: DICTIONARY_SIZE,
        }
    }
}

impl LzmaProps {
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let packed = reader.read_u8()?;
        if packed >= 225 {
            return Err(Error::InvalidLzmaProps(packed));
        }

        Ok(LzmaProps {
            literal_context_bits: u32::from(packed % 9),
            literal_position_bits: u32::from((packed / 9) % 5),
            position_bits: u32::from(packed / 45),
            dictionary_size: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let packed =
            self.position_bits * 45 + self.literal_position_bits * 9 + self.literal_context_bits;
        writer.write_u8(packed as u8)?;
        writer.write_u32::<LittleEndian>(self.dictionary_size)?;
        Ok(())
    }

    fn options(&self) -> Result<LzmaOptions> {
        let mut options = LzmaOptions::new_preset(6)?;
        options
            .literal_context_bits(self.literal_context_bits)
            .literal_position_bits(self.literal_position_bits)
            .position_bits(self.position_bits)
            .dict_size(self.dictionary_size)
            .nice_len(NICE_LEN);
        Ok(options)
    }

    fn filters(&self) -> Result<Filters> {
        let mut filters = Filters::new();
        filters.lzma1(&self.options()?);
        Ok(filters)
    }
}

/// Raw LZMA1 decoder over `reader`, which must be positioned at the 5-byte properties header.
pub(crate) fn lzma_reader<R: Read>(mut reader: R) -> Result<XzDecoder<R>> {
    let props = LzmaProps::read(&mut reader)?;
    let stream = Stream::new_raw_decoder(&props.filters()?)?;
    Ok(XzDecoder::new_stream(reader, stream))
}

/// Compress a whole data section in a single pass with the fixed configuration.
#[instrument(skip(data), fields(size = data.len()), err)]
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let props = LzmaProps::default();

    let mut output = Vec::new();
    props.write(&mut output)?;

    let stream = Stream::new_raw_encoder(&props.filters()?)?;
    let mut encoder = XzEncoder::new_stream(output, stream);
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// A byte-range reader over a bundle's data section.
///
/// Raw sections use direct positioned reads. Compressed sections are consumed through a single
/// forward-only LZMA stream: the decoder always starts at the beginning of the data section and
/// skips forward to the requested range, it never seeks backward.
pub(crate) enum BundleBlockReader<'a, R: Read + Seek> {
    Raw(io::Take<&'a mut R>),
    Compressed(Box<io::Take<XzDecoder<&'a mut R>>>),
}

impl<'a, R: Read + Seek> BundleBlockReader<'a, R> {
    #[instrument(skip(reader))]
    pub fn new(
        reader: &'a mut R,
        data_start: u64,
        skip: u64,
        limit: u64,
        compressed: bool,
    ) -> Result<Self> {
        if !compressed {
            reader.seek(io::SeekFrom::Start(data_start + skip))?;
            return Ok(BundleBlockReader::Raw(reader.by_ref().take(limit)));
        }

        reader.seek(io::SeekFrom::Start(data_start))?;
        let mut decoder = lzma_reader(reader)?;
        if skip > 0 {
            let skipped = io::copy(&mut decoder.by_ref().take(skip), &mut io::sink())?;
            if skipped < skip {
                return Err(Error::Truncated {
                    read: skipped,
                    expected: skip,
                });
            }
        }

        Ok(BundleBlockReader::Compressed(Box::new(decoder.take(limit))))
    }
}

impl<R: Read + Seek> Seek for BundleBlockReader<'_, R> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        match self {
            BundleBlockReader::Raw(r) => NoSeek::new(r).seek(pos),
            BundleBlockReader::Compressed(r) => NoSeek::new(r).seek(pos),
        }
    }
}

impl<R: Read + Seek> Read for BundleBlockReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BundleBlockReader::Raw(r) => r.read(buf),
            BundleBlockReader::Compressed(r) => r.read(buf),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        match self {
            BundleBlockReader::Raw(r) => r.read_exact(buf),
            BundleBlockReader::Compressed(r) => r.read_exact(buf),
        }
    }

    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            BundleBlockReader::Raw(r) => r.read_to_end(buf),
            BundleBlockReader::Compressed(r) => r.read_to_end(buf),
        }
    }
}
