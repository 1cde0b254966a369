//! Cursor-based streams over interop memory.
//!
//! All multi-byte integers are Little Endian, as the binary format expects.

use super::InteropMemory;
use crate::error::{GridwireError, Result};

/// Writes into an [`InteropMemory`] at a cursor, growing it as needed.
///
/// Written bytes become visible to the boundary only after
/// [`synchronize`](Self::synchronize).
pub struct InteropOutputStream<'a> {
    mem: &'a mut InteropMemory,
    pos: usize,
}

impl<'a> InteropOutputStream<'a> {
    /// Create a stream positioned at the start of the buffer.
    pub fn new(mem: &'a mut InteropMemory) -> Self {
        Self { mem, pos: 0 }
    }

    /// Current write position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The underlying memory.
    #[inline]
    pub fn memory(&self) -> &InteropMemory {
        &*self.mem
    }

    /// Write raw bytes at the cursor.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos.checked_add(bytes.len()).ok_or_else(|| {
            GridwireError::ResourceExhausted("Write position overflow".to_string())
        })?;

        self.mem.ensure_capacity(end)?;
        self.mem.region_mut()[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// Write a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Write an `i8`.
    #[inline]
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write an `i16`.
    #[inline]
    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write an `i32`.
    #[inline]
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write an `i64`.
    #[inline]
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Publish the cursor as the committed length of the memory.
    pub fn synchronize(&mut self) {
        self.mem.set_len(self.pos);
    }
}

/// Reads from a byte slice at a cursor.
pub struct InteropInputStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> InteropInputStream<'a> {
    /// Create a stream over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Read `len` bytes.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(GridwireError::Decoding(format!(
                "Unexpected end of input: need {} bytes at offset {}, {} remaining",
                len,
                self.pos,
                self.remaining()
            )));
        }

        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8> {
        self.data.get(self.pos).copied().ok_or_else(|| {
            GridwireError::Decoding(format!("Unexpected end of input at offset {}", self.pos))
        })
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_slice(N)?);
        Ok(buf)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read an `i8`.
    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    /// Read an `i16`.
    #[inline]
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    /// Read an `i32`.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read an `i64`.
    #[inline]
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }
}
