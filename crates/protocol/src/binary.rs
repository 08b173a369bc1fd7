//! Binary reading and writing utilities for the wire protocol.
//!
//! All multi-byte values are big-endian. Strings are a u16 byte length
//! followed by UTF-8 bytes.

use crate::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A reader for parsing binary frames.
#[derive(Debug)]
pub struct FrameReader {
    buf: Bytes,
}

impl FrameReader {
    /// Create a new reader from raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { buf: data.into() }
    }

    /// Returns remaining bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    #[inline]
    pub fn get_u8(&mut self) -> Result<u8, ProtocolError> {
        if self.buf.remaining() < 1 {
            return Err(ProtocolError::UnexpectedEof);
        }
        Ok(self.buf.get_u8())
    }

    #[inline]
    pub fn get_u16(&mut self) -> Result<u16, ProtocolError> {
        if self.buf.remaining() < 2 {
            return Err(ProtocolError::UnexpectedEof);
        }
        Ok(self.buf.get_u16())
    }

    #[inline]
    pub fn get_u32(&mut self) -> Result<u32, ProtocolError> {
        if self.buf.remaining() < 4 {
            return Err(ProtocolError::UnexpectedEof);
        }
        Ok(self.buf.get_u32())
    }

    #[inline]
    pub fn get_u64(&mut self) -> Result<u64, ProtocolError> {
        if self.buf.remaining() < 8 {
            return Err(ProtocolError::UnexpectedEof);
        }
        Ok(self.buf.get_u64())
    }

    #[inline]
    pub fn get_f32(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_bits(self.get_u32()?))
    }

    #[inline]
    pub fn get_f64(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_bits(self.get_u64()?))
    }

    /// Read a u16-length-prefixed UTF-8 string.
    pub fn get_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.get_u16()? as usize;
        if self.buf.remaining() < len {
            return Err(ProtocolError::OverlongString(len));
        }
        let bytes = self.buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

/// A writer for building binary frames.
#[derive(Debug, Default)]
pub struct FrameWriter {
    buf: BytesMut,
}

impl FrameWriter {
    /// Create a new writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the current length.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    #[inline]
    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    #[inline]
    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    /// Float bit-pattern conversion is explicit so the wire format never
    /// depends on in-memory representation.
    #[inline]
    pub fn put_f32(&mut self, v: f32) {
        self.buf.put_u32(v.to_bits());
    }

    #[inline]
    pub fn put_f64(&mut self, v: f64) {
        self.buf.put_u64(v.to_bits());
    }

    /// Write a u16-length-prefixed UTF-8 string. Overlong strings are
    /// truncated to u16::MAX bytes on a char boundary.
    pub fn put_string(&mut self, s: &str) {
        let mut end = s.len().min(u16::MAX as usize);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.buf.put_u16(end as u16);
        self.buf.put_slice(&s.as_bytes()[..end]);
    }

    /// Consume the writer and return the built buffer.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    /// Get the current buffer as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
