//! Bounds-checked reads over a resident metadata buffer.
//!
//! The reader holds no cursor of its own. Every read takes the position as
//! `&mut usize` and advances it, so any number of cursors can walk the same
//! shared buffer at once.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::util::{Error, Result};

/// Byte order declared by the footer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Byte order of the running host.
    #[inline]
    pub const fn host() -> Self {
        if cfg!(target_endian = "big") { Self::Big } else { Self::Little }
    }

    #[inline]
    pub fn is_host(self) -> bool {
        self == Self::host()
    }
}

/// Read-only view of a byte buffer with explicit-cursor decoding.
#[derive(Clone, Copy, Debug)]
pub struct BufferReader<'a> {
    data: &'a [u8],
    endian: Endian,
}

macro_rules! read_int {
    ($($name:ident => $ty:ty, $read:ident;)*) => {
        $(
            #[inline]
            pub fn $name(&self, pos: &mut usize) -> Result<$ty> {
                let bytes = self.take(pos, std::mem::size_of::<$ty>())?;
                Ok(match self.endian {
                    Endian::Little => LittleEndian::$read(bytes),
                    Endian::Big => BigEndian::$read(bytes),
                })
            }
        )*
    };
}

impl<'a> BufferReader<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, endian }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Reader over the same buffer that refuses reads past `end`.
    /// Positions stay absolute.
    pub fn limited(&self, end: usize) -> Result<Self> {
        if end > self.data.len() {
            return Err(Error::TruncatedBuffer { position: 0, needed: end, len: self.data.len() });
        }
        Ok(Self { data: &self.data[..end], endian: self.endian })
    }

    /// Borrow `len` bytes at `pos` and advance past them.
    pub fn take(&self, pos: &mut usize, len: usize) -> Result<&'a [u8]> {
        let end = pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::TruncatedBuffer { position: *pos, needed: len, len: self.data.len() })?;
        let bytes = &self.data[*pos..end];
        *pos = end;
        Ok(bytes)
    }

    /// Move the cursor forward without decoding.
    pub fn skip(&self, pos: &mut usize, len: usize) -> Result<()> {
        self.take(pos, len).map(|_| ())
    }

    #[inline]
    pub fn read_u8(&self, pos: &mut usize) -> Result<u8> {
        Ok(self.take(pos, 1)?[0])
    }

    #[inline]
    pub fn read_i8(&self, pos: &mut usize) -> Result<i8> {
        Ok(self.read_u8(pos)? as i8)
    }

    read_int! {
        read_u16 => u16, read_u16;
        read_u32 => u32, read_u32;
        read_u64 => u64, read_u64;
        read_i16 => i16, read_i16;
        read_i32 => i32, read_i32;
        read_i64 => i64, read_i64;
        read_f32 => f32, read_f32;
        read_f64 => f64, read_f64;
    }

    /// Read a u64 that must fit the host's `usize`.
    pub fn read_usize(&self, pos: &mut usize) -> Result<usize> {
        let at = *pos;
        let v = self.read_u64(pos)?;
        usize::try_from(v).map_err(|_| Error::format(format!("value {v} at {at} exceeds usize")))
    }

    /// Fixed-size byte array.
    pub fn read_array<const N: usize>(&self, pos: &mut usize) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(pos, N)?);
        Ok(out)
    }

    /// String prefixed by a u16 byte length.
    pub fn read_string(&self, pos: &mut usize) -> Result<String> {
        let len = self.read_u16(pos)? as usize;
        let bytes = self.take(pos, len)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_and_big_endian() {
        let bytes = [0x01, 0x02, 0x03, 0x04];
        let mut pos = 0;
        assert_eq!(BufferReader::new(&bytes, Endian::Little).read_u32(&mut pos).unwrap(), 0x04030201);
        assert_eq!(pos, 4);

        let mut pos = 0;
        assert_eq!(BufferReader::new(&bytes, Endian::Big).read_u32(&mut pos).unwrap(), 0x01020304);
    }

    #[test]
    fn test_truncated_read_leaves_cursor() {
        let bytes = [0u8; 6];
        let reader = BufferReader::new(&bytes, Endian::Little);
        let mut pos = 2;
        let err = reader.read_u64(&mut pos).unwrap_err();
        assert!(matches!(err, Error::TruncatedBuffer { position: 2, needed: 8, len: 6 }));
        assert_eq!(pos, 2);
    }

    #[test]
    fn test_overflowing_position() {
        let bytes = [0u8; 4];
        let reader = BufferReader::new(&bytes, Endian::Little);
        let mut pos = usize::MAX;
        assert!(matches!(reader.read_u8(&mut pos), Err(Error::TruncatedBuffer { .. })));
    }

    #[test]
    fn test_read_string() {
        let mut bytes = vec![3, 0];
        bytes.extend_from_slice(b"abc");
        let mut pos = 0;
        let reader = BufferReader::new(&bytes, Endian::Little);
        assert_eq!(reader.read_string(&mut pos).unwrap(), "abc");
        assert_eq!(pos, 5);
    }

    #[test]
    fn test_limited_reader() {
        let bytes = [1u8; 16];
        let reader = BufferReader::new(&bytes, Endian::Little).limited(8).unwrap();
        let mut pos = 4;
        assert!(reader.read_u32(&mut pos).is_ok());
        assert!(reader.read_u8(&mut pos).is_err());
        assert!(BufferReader::new(&bytes, Endian::Little).limited(17).is_err());
    }
}
