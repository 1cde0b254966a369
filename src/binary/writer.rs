//! Binary writer.

use super::types::{type_code, TypeRegistry};
use crate::boundary::RemoteHandle;
use crate::error::{GridwireError, Result};
use crate::memory::InteropOutputStream;

/// Writes type-tagged values into an output stream.
///
/// Every value is prefixed with its type code (see [`type_code`]).
pub struct BinaryWriter<'w, 'm> {
    out: &'w mut InteropOutputStream<'m>,
    types: &'w TypeRegistry,
}

impl<'w, 'm> BinaryWriter<'w, 'm> {
    /// Create a writer over `out`, resolving type names through `types`.
    pub fn new(out: &'w mut InteropOutputStream<'m>, types: &'w TypeRegistry) -> Self {
        Self { out, types }
    }

    /// Write an `i8`.
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.out.write_u8(type_code::BYTE)?;
        self.out.write_i8(value)
    }

    /// Write an `i16`.
    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.out.write_u8(type_code::SHORT)?;
        self.out.write_i16(value)
    }

    /// Write an `i32`.
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.out.write_u8(type_code::INT)?;
        self.out.write_i32(value)
    }

    /// Write an `i64`.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.out.write_u8(type_code::LONG)?;
        self.out.write_i64(value)
    }

    /// Write a `bool`.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.out.write_u8(type_code::BOOL)?;
        self.out.write_u8(u8::from(value))
    }

    /// Write a UTF-8 string with an `i32` byte-length prefix.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if the string is longer than `i32::MAX` bytes.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let len = length_prefix(value.len(), "String")?;
        self.out.write_u8(type_code::STRING)?;
        self.out.write_i32(len)?;
        self.out.write_bytes(value.as_bytes())
    }

    /// Write a string, or null for `None`.
    pub fn write_optional_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(s) => self.write_string(s),
            None => self.write_null(),
        }
    }

    /// Write a byte array with an `i32` length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        let len = length_prefix(value.len(), "Byte array")?;
        self.out.write_u8(type_code::ARRAY_BYTE)?;
        self.out.write_i32(len)?;
        self.out.write_bytes(value)
    }

    /// Write an enum value of the named type.
    ///
    /// The type name is registered on first use.
    pub fn write_enum(&mut self, type_name: &str, ordinal: i32) -> Result<()> {
        let type_id = self.types.register(type_name)?;
        self.out.write_u8(type_code::ENUM)?;
        self.out.write_i32(type_id)?;
        self.out.write_i32(ordinal)
    }

    /// Write a remote handle as a long, or null for `None`.
    pub fn write_handle(&mut self, handle: Option<RemoteHandle>) -> Result<()> {
        match handle {
            Some(h) => self.write_i64(h.get() as i64),
            None => self.write_null(),
        }
    }

    /// Write a null value.
    pub fn write_null(&mut self) -> Result<()> {
        self.out.write_u8(type_code::NULL)
    }
}

fn length_prefix(len: usize, what: &str) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        GridwireError::Encoding(format!(
            "{} of {} bytes exceeds the i32 length prefix",
            what, len
        ))
    })
}
