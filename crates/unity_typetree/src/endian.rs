//! Endianness-switchable read and write primitives.
//!
//! Serialized file bodies switch endianness based on the container's format version, which is
//! only known at runtime. These extension traits mirror the [`byteorder`] API with the byte
//! order passed as a value instead of a type parameter.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Byte order of a metadata or object-data block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Endianness {
    /// Most significant byte first
    Big,
    /// Least significant byte first
    #[default]
    Little,
}

/// Round `value` up to the next multiple of 4.
pub fn align4(value: u64) -> u64 {
    (value + 3) & !3
}

/// Runtime-endianness reads over any [`Read`] type
pub trait ReadEndianExt: Read {
    fn read_u16_endian(&mut self, endian: Endianness) -> io::Result<u16> {
        match endian {
            Endianness::Big => self.read_u16::<BigEndian>(),
            Endianness::Little => self.read_u16::<LittleEndian>(),
        }
    }

    fn read_i16_endian(&mut self, endian: Endianness) -> io::Result<i16> {
        match endian {
            Endianness::Big => self.read_i16::<BigEndian>(),
            Endianness::Little => self.read_i16::<LittleEndian>(),
        }
    }

    fn read_u32_endian(&mut self, endian: Endianness) -> io::Result<u32> {
        match endian {
            Endianness::Big => self.read_u32::<BigEndian>(),
            Endianness::Little => self.read_u32::<LittleEndian>(),
        }
    }

    fn read_i32_endian(&mut self, endian: Endianness) -> io::Result<i32> {
        match endian {
            Endianness::Big => self.read_i32::<BigEndian>(),
            Endianness::Little => self.read_i32::<LittleEndian>(),
        }
    }

    fn read_u64_endian(&mut self, endian: Endianness) -> io::Result<u64> {
        match endian {
            Endianness::Big => self.read_u64::<BigEndian>(),
            Endianness::Little => self.read_u64::<LittleEndian>(),
        }
    }

    fn read_i64_endian(&mut self, endian: Endianness) -> io::Result<i64> {
        match endian {
            Endianness::Big => self.read_i64::<BigEndian>(),
            Endianness::Little => self.read_i64::<LittleEndian>(),
        }
    }

    fn read_f32_endian(&mut self, endian: Endianness) -> io::Result<f32> {
        match endian {
            Endianness::Big => self.read_f32::<BigEndian>(),
            Endianness::Little => self.read_f32::<LittleEndian>(),
        }
    }

    fn read_f64_endian(&mut self, endian: Endianness) -> io::Result<f64> {
        match endian {
            Endianness::Big => self.read_f64::<BigEndian>(),
            Endianness::Little => self.read_f64::<LittleEndian>(),
        }
    }

    /// Read bytes up to (and consuming) a null terminator.
    fn read_cstring_raw(&mut self) -> io::Result<Vec<u8>> {
        let mut raw = Vec::new();
        loop {
            let byte = self.read_u8()?;
            if byte == b'\0' {
                break;
            }
            raw.push(byte);
        }
        Ok(raw)
    }

    /// Read a null-terminated string, replacing invalid UTF-8 sequences.
    fn read_cstring(&mut self) -> io::Result<String> {
        Ok(String::from_utf8_lossy(&self.read_cstring_raw()?).into_owned())
    }
}

impl<R: Read + ?Sized> ReadEndianExt for R {}

/// Runtime-endianness writes over any [`Write`] type
pub trait WriteEndianExt: Write {
    fn write_u16_endian(&mut self, value: u16, endian: Endianness) -> io::Result<()> {
        match endian {
            Endianness::Big => self.write_u16::<BigEndian>(value),
            Endianness::Little => self.write_u16::<LittleEndian>(value),
        }
    }

    fn write_i16_endian(&mut self, value: i16, endian: Endianness) -> io::Result<()> {
        match endian {
            Endianness::Big => self.write_i16::<BigEndian>(value),
            Endianness::Little => self.write_i16::<LittleEndian>(value),
        }
    }

    fn write_u32_endian(&mut self, value: u32, endian: Endianness) -> io::Result<()> {
        match endian {
            Endianness::Big => self.write_u32::<BigEndian>(value),
            Endianness::Little => self.write_u32::<LittleEndian>(value),
        }
    }

    fn write_i32_endian(&mut self, value: i32, endian: Endianness) -> io::Result<()> {
        match endian {
            Endianness::Big => self.write_i32::<BigEndian>(value),
            Endianness::Little => self.write_i32::<LittleEndian>(value),
        }
    }

    fn write_u64_endian(&mut self, value: u64, endian: Endianness) -> io::Result<()> {
        match endian {
            Endianness::Big => self.write_u64::<BigEndian>(value),
            Endianness::Little => self.write_u64::<LittleEndian>(value),
        }
    }

    fn write_i64_endian(&mut self, value: i64, endian: Endianness) -> io::Result<()> {
        match endian {
            Endianness::Big => self.write_i64::<BigEndian>(value),
            Endianness::Little => self.write_i64::<LittleEndian>(value),
        }
    }

    fn write_f32_endian(&mut self, value: f32, endian: Endianness) -> io::Result<()> {
        match endian {
            Endianness::Big => self.write_f32::<BigEndian>(value),
            Endianness::Little => self.write_f32::<LittleEndian>(value),
        }
    }

    fn write_f64_endian(&mut self, value: f64, endian: Endianness) -> io::Result<()> {
        match endian {
            Endianness::Big => self.write_f64::<BigEndian>(value),
            Endianness::Little => self.write_f64::<LittleEndian>(value),
        }
    }

    /// Write a string followed by a null terminator.
    fn write_cstring(&mut self, value: &str) -> io::Result<()> {
        self.write_all(value.as_bytes())?;
        self.write_u8(0)
    }
}

impl<W: Write + ?Sized> WriteEndianExt for W {}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn switched_reads() -> io::Result<()> {
        let mut big = Cursor::new(vec![0x00, 0x00, 0x00, 0x2A]);
        assert_eq!(big.read_u32_endian(Endianness::Big)?, 42);

        let mut little = Cursor::new(vec![0x2A, 0x00, 0x00, 0x00]);
        assert_eq!(little.read_u32_endian(Endianness::Little)?, 42);

        Ok(())
    }

    #[test]
    fn cstring_round_trip() -> io::Result<()> {
        let mut buf = Vec::new();
        buf.write_cstring("m_Name")?;
        assert_eq!(buf, b"m_Name\0");

        let mut reader = Cursor::new(buf);
        assert_eq!(reader.read_cstring()?, "m_Name");

        Ok(())
    }

    #[test]
    fn align4_rounds_up() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(4), 4);
        assert_eq!(align4(9), 12);
    }
}
