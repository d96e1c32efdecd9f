use std::io::{self, Read};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::error::SoldecError;

/// Forward-only reader over a borrowed byte source.
///
/// The source is positioned by the caller; `start` only seeds the offsets
/// reported by [`ByteCursor::position`]. Nothing is buffered here and the
/// source is never rewound.
pub struct ByteCursor<'a, R: Read + ?Sized> {
    inner: &'a mut R,
    pos: u64,
}

impl<'a, R: Read + ?Sized> ByteCursor<'a, R> {
    pub fn new(inner: &'a mut R, start: u64) -> Self {
        Self { inner, pos: start }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, SoldecError> {
        let r = self.inner.read_u8();
        self.track(1, r)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, SoldecError> {
        let r = self.inner.read_u16::<LittleEndian>();
        self.track(2, r)
    }

    pub fn read_i16_le(&mut self) -> Result<i16, SoldecError> {
        let r = self.inner.read_i16::<LittleEndian>();
        self.track(2, r)
    }

    /// Memory offsets are the only big-endian field in the format.
    pub fn read_u16_be(&mut self) -> Result<u16, SoldecError> {
        let r = self.inner.read_u16::<BigEndian>();
        self.track(2, r)
    }

    pub fn read_u24_le(&mut self) -> Result<u32, SoldecError> {
        let r = self.inner.read_u24::<LittleEndian>();
        self.track(3, r)
    }

    pub fn read_i32_le(&mut self) -> Result<i32, SoldecError> {
        let r = self.inner.read_i32::<LittleEndian>();
        self.track(4, r)
    }

    /// Consume and discard `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<(), SoldecError> {
        for _ in 0..n {
            self.read_u8()?;
        }
        Ok(())
    }

    fn track<T>(&mut self, width: u64, r: io::Result<T>) -> Result<T, SoldecError> {
        match r {
            Ok(v) => {
                self.pos += width;
                Ok(v)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(SoldecError::EndOfStream { offset: self.pos })
            }
            Err(e) => Err(SoldecError::Io(e)),
        }
    }
}
