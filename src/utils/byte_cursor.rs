use crate::bml_parser::ReadSeek;
use crate::err::{DeserializationError, DeserializationResult};

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read, SeekFrom};

/// A bounds-checked cursor over a seekable byte source.
///
/// The source length is captured once when the cursor is created, so every read can be
/// checked up front: a read that would run past the end fails with
/// [`DeserializationError::Truncated`] *without* moving the cursor, which keeps the reported
/// offset exact.
///
/// All reads are little-endian and advance the cursor on success.
#[derive(Debug)]
pub struct ByteCursor<R> {
    inner: R,
    pos: u64,
    len: u64,
}

impl<R: ReadSeek> ByteCursor<R> {
    /// Wraps `inner` and rewinds it to offset 0, since every offset in the format is absolute.
    pub fn new(mut inner: R) -> DeserializationResult<Self> {
        let len = inner
            .seek(SeekFrom::End(0))
            .map_err(|source| DeserializationError::Io { source, offset: 0 })?;
        inner
            .seek(SeekFrom::Start(0))
            .map_err(|source| DeserializationError::Io { source, offset: 0 })?;

        Ok(ByteCursor { inner, pos: 0, len })
    }

    /// Current absolute offset (`tell`).
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Repositions the cursor to an absolute offset. Seeking to `len` (EOF) is allowed.
    pub fn seek(&mut self, offset: u64, what: &'static str) -> DeserializationResult<()> {
        if offset > self.len {
            return Err(DeserializationError::SeekOutOfRange {
                what,
                offset,
                len: self.len,
            });
        }

        self.inner
            .seek(SeekFrom::Start(offset))
            .map_err(|source| DeserializationError::Io { source, offset })?;
        self.pos = offset;
        Ok(())
    }

    #[inline]
    fn ensure_available(&self, need: usize, what: &'static str) -> DeserializationResult<()> {
        if (need as u64) > self.remaining() {
            return Err(DeserializationError::Truncated {
                what,
                offset: self.pos,
                need,
                have: self.remaining() as usize,
            });
        }
        Ok(())
    }

    #[inline]
    fn io_err(&self, source: io::Error) -> DeserializationError {
        DeserializationError::Io {
            source,
            offset: self.pos,
        }
    }

    #[inline]
    pub fn u8(&mut self) -> DeserializationResult<u8> {
        self.u8_named("u8")
    }

    pub fn u8_named(&mut self, what: &'static str) -> DeserializationResult<u8> {
        self.ensure_available(1, what)?;
        let v = self.inner.read_u8().map_err(|e| self.io_err(e))?;
        self.pos += 1;
        Ok(v)
    }

    #[inline]
    pub fn u16(&mut self) -> DeserializationResult<u16> {
        self.u16_named("u16")
    }

    pub fn u16_named(&mut self, what: &'static str) -> DeserializationResult<u16> {
        self.ensure_available(2, what)?;
        let v = self
            .inner
            .read_u16::<LittleEndian>()
            .map_err(|e| self.io_err(e))?;
        self.pos += 2;
        Ok(v)
    }

    #[inline]
    pub fn u32(&mut self) -> DeserializationResult<u32> {
        self.u32_named("u32")
    }

    pub fn u32_named(&mut self, what: &'static str) -> DeserializationResult<u32> {
        self.ensure_available(4, what)?;
        let v = self
            .inner
            .read_u32::<LittleEndian>()
            .map_err(|e| self.io_err(e))?;
        self.pos += 4;
        Ok(v)
    }

    /// Reads `len` (at most 4) bytes as a little-endian integer, zero-padding the high bytes.
    pub fn uint_le_named(&mut self, len: usize, what: &'static str) -> DeserializationResult<u32> {
        debug_assert!(len <= 4);
        let mut buf = [0_u8; 4];
        self.ensure_available(len, what)?;
        self.inner
            .read_exact(&mut buf[..len])
            .map_err(|e| self.io_err(e))?;
        self.pos += len as u64;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn array<const N: usize>(&mut self, what: &'static str) -> DeserializationResult<[u8; N]> {
        self.ensure_available(N, what)?;
        let mut buf = [0_u8; N];
        self.inner.read_exact(&mut buf).map_err(|e| self.io_err(e))?;
        self.pos += N as u64;
        Ok(buf)
    }

    pub fn take_bytes(&mut self, len: usize, what: &'static str) -> DeserializationResult<Vec<u8>> {
        self.ensure_available(len, what)?;
        let mut buf = vec![0_u8; len];
        self.inner.read_exact(&mut buf).map_err(|e| self.io_err(e))?;
        self.pos += len as u64;
        Ok(buf)
    }

    /// Reads `byte_len` bytes of UTF-16LE, stopping at the first NUL code unit if present.
    ///
    /// An odd trailing byte is ignored, matching how the string table stores lengths in bytes.
    pub fn utf16_by_byte_len(
        &mut self,
        byte_len: usize,
        what: &'static str,
    ) -> DeserializationResult<String> {
        let start = self.pos;
        let bytes = self.take_bytes(byte_len, what)?;

        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&cu| cu != 0)
            .collect();

        String::from_utf16(&units)
            .map_err(|_| DeserializationError::InvalidUtf16String { what, offset: start })
    }
}
