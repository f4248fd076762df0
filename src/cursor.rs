use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::OleError;

/// Seekable little-endian reader over an in-memory buffer.
pub struct ByteCursor<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }

    pub fn seek(&mut self, offset: u64) {
        self.inner.set_position(offset);
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get_ref().is_empty()
    }

    pub fn is_at_end(&self) -> bool {
        self.inner.position() >= self.inner.get_ref().len() as u64
    }

    pub fn read_u8(&mut self) -> Result<u8, OleError> {
        self.inner.read_u8().map_err(|err| self.eof("u8", err))
    }

    pub fn read_i8(&mut self) -> Result<i8, OleError> {
        self.inner.read_i8().map_err(|err| self.eof("i8", err))
    }

    pub fn read_u16(&mut self) -> Result<u16, OleError> {
        self.inner
            .read_u16::<LittleEndian>()
            .map_err(|err| self.eof("u16", err))
    }

    pub fn read_i16(&mut self) -> Result<i16, OleError> {
        self.inner
            .read_i16::<LittleEndian>()
            .map_err(|err| self.eof("i16", err))
    }

    pub fn read_u32(&mut self) -> Result<u32, OleError> {
        self.inner
            .read_u32::<LittleEndian>()
            .map_err(|err| self.eof("u32", err))
    }

    pub fn read_i32(&mut self) -> Result<i32, OleError> {
        self.inner
            .read_i32::<LittleEndian>()
            .map_err(|err| self.eof("i32", err))
    }

    pub fn read_u64(&mut self) -> Result<u64, OleError> {
        self.inner
            .read_u64::<LittleEndian>()
            .map_err(|err| self.eof("u64", err))
    }

    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, OleError> {
        let mut buf = vec![0u8; length];
        self.inner
            .read_exact(&mut buf)
            .map_err(|err| self.eof("bytes", err))?;
        Ok(buf)
    }

    /// Reads `length` UTF-16LE code units starting at `offset`. Invalid surrogates are replaced.
    pub fn read_utf16_at(&mut self, offset: u64, length: usize) -> Result<String, OleError> {
        self.seek(offset);
        let mut units = Vec::with_capacity(length);
        for _ in 0..length {
            units.push(self.read_u16()?);
        }
        Ok(String::from_utf16_lossy(&units))
    }

    fn eof(&self, what: &str, err: std::io::Error) -> OleError {
        OleError::UnexpectedEof(format!(
            "reading {} at offset {}: {}",
            what,
            self.inner.position(),
            err
        ))
    }
}
