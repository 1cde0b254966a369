//! Type codes and the type registry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{GridwireError, Result};

/// One-byte type codes that prefix every encoded value.
pub mod type_code {
    /// `i8`.
    pub const BYTE: u8 = 1;
    /// `i16`.
    pub const SHORT: u8 = 2;
    /// `i32`.
    pub const INT: u8 = 3;
    /// `i64`.
    pub const LONG: u8 = 4;
    /// `bool`.
    pub const BOOL: u8 = 8;
    /// Length-prefixed UTF-8 string.
    pub const STRING: u8 = 9;
    /// Length-prefixed byte array.
    pub const ARRAY_BYTE: u8 = 12;
    /// Enum: type id + ordinal.
    pub const ENUM: u8 = 28;
    /// Null value.
    pub const NULL: u8 = 101;

    /// Human-readable name of a type code, for error messages.
    pub fn name(code: u8) -> &'static str {
        match code {
            BYTE => "byte",
            SHORT => "short",
            INT => "int",
            LONG => "long",
            BOOL => "bool",
            STRING => "string",
            ARRAY_BYTE => "byte[]",
            ENUM => "enum",
            NULL => "null",
            _ => "unknown",
        }
    }
}

/// Compute the type id for a type name.
///
/// 31-multiplier hash over the UTF-16 units of the lowercased name, so both
/// sides of the boundary derive the same id from the same name.
///
/// ```
/// use gridwire::binary::type_id;
///
/// assert_eq!(type_id("a"), 97);
/// assert_eq!(type_id("Person"), type_id("person"));
/// ```
pub fn type_id(name: &str) -> i32 {
    name.to_lowercase()
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
}

/// Registry of type names known to this connection.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<HashMap<i32, String>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type name and return its id.
    ///
    /// Registering the same name twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `TypeConflict` if a different name already holds the id.
    pub fn register(&self, name: &str) -> Result<i32> {
        let id = type_id(name);
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);

        match types.get(&id) {
            Some(existing) if existing.to_lowercase() == name.to_lowercase() => Ok(id),
            Some(existing) => Err(GridwireError::TypeConflict {
                id,
                name: name.to_string(),
                existing: existing.clone(),
            }),
            None => {
                types.insert(id, name.to_string());
                tracing::debug!("Registered type '{}' as {}", name, id);
                Ok(id)
            }
        }
    }

    /// Get the registered name for a type id.
    pub fn name(&self, id: i32) -> Option<String> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Check if a type id is registered.
    pub fn contains(&self, id: i32) -> bool {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
