//! Binary reader.

use super::types::type_code;
use crate::boundary::RemoteHandle;
use crate::error::{GridwireError, Result};
use crate::memory::InteropInputStream;

/// Reads type-tagged values from an input stream.
pub struct BinaryReader<'r, 'a> {
    input: &'r mut InteropInputStream<'a>,
}

impl<'r, 'a> BinaryReader<'r, 'a> {
    /// Create a reader over `input`.
    pub fn new(input: &'r mut InteropInputStream<'a>) -> Self {
        Self { input }
    }

    /// Check if the next value is null, without consuming it.
    pub fn is_null(&self) -> Result<bool> {
        Ok(self.input.peek_u8()? == type_code::NULL)
    }

    /// Peek at the type code of the next value.
    pub fn peek_type(&self) -> Result<u8> {
        self.input.peek_u8()
    }

    fn expect_type(&mut self, expected: u8) -> Result<()> {
        let offset = self.input.position();
        let actual = self.input.read_u8()?;
        if actual != expected {
            return Err(GridwireError::Decoding(format!(
                "Expected {} at offset {}, found {} ({})",
                type_code::name(expected),
                offset,
                type_code::name(actual),
                actual
            )));
        }
        Ok(())
    }

    /// Consume a null if present.
    fn take_null(&mut self) -> Result<bool> {
        if self.is_null()? {
            self.input.read_u8()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn read_len(&mut self) -> Result<usize> {
        let len = self.input.read_i32()?;
        usize::try_from(len)
            .map_err(|_| GridwireError::Decoding(format!("Negative length prefix {}", len)))
    }

    /// Read an `i8`.
    pub fn read_i8(&mut self) -> Result<i8> {
        self.expect_type(type_code::BYTE)?;
        self.input.read_i8()
    }

    /// Read an `i16`.
    pub fn read_i16(&mut self) -> Result<i16> {
        self.expect_type(type_code::SHORT)?;
        self.input.read_i16()
    }

    /// Read an `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.expect_type(type_code::INT)?;
        self.input.read_i32()
    }

    /// Read an `i64`.
    pub fn read_i64(&mut self) -> Result<i64> {
        self.expect_type(type_code::LONG)?;
        self.input.read_i64()
    }

    /// Read a `bool`.
    pub fn read_bool(&mut self) -> Result<bool> {
        self.expect_type(type_code::BOOL)?;
        match self.input.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(GridwireError::Decoding(format!(
                "Invalid bool byte {}",
                other
            ))),
        }
    }

    /// Read a non-null string.
    pub fn read_string(&mut self) -> Result<String> {
        self.expect_type(type_code::STRING)?;
        let len = self.read_len()?;
        let bytes = self.input.read_slice(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| GridwireError::Decoding(format!("Invalid UTF-8 in string: {}", e)))
    }

    /// Read a string or null.
    pub fn read_optional_string(&mut self) -> Result<Option<String>> {
        if self.take_null()? {
            return Ok(None);
        }
        self.read_string().map(Some)
    }

    /// Read a byte array.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.expect_type(type_code::ARRAY_BYTE)?;
        let len = self.read_len()?;
        Ok(self.input.read_slice(len)?.to_vec())
    }

    /// Read an enum value as `(type_id, ordinal)`.
    pub fn read_enum(&mut self) -> Result<(i32, i32)> {
        self.expect_type(type_code::ENUM)?;
        let type_id = self.input.read_i32()?;
        let ordinal = self.input.read_i32()?;
        Ok((type_id, ordinal))
    }

    /// Read a remote handle written as a long, or null.
    ///
    /// A long of 0 also decodes to `None`.
    pub fn read_handle(&mut self) -> Result<Option<RemoteHandle>> {
        if self.take_null()? {
            return Ok(None);
        }
        let raw = self.read_i64()?;
        Ok(RemoteHandle::new(raw as u64))
    }
}
