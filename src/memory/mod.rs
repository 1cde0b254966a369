//! Memory module - pooled buffers for crossing the boundary.
//!
//! Requests are encoded into an [`InteropMemory`] leased from a [`MemoryPool`]:
//! - [`InteropOutputStream`] writes at a cursor and publishes it on `synchronize()`
//! - [`InteropInputStream`] reads response payloads
//! - [`PooledMemory`] returns the buffer to the pool when dropped
//!
//! # Example
//!
//! ```
//! use gridwire::memory::{InteropOutputStream, MemoryConfig, MemoryPool};
//!
//! let pool = MemoryPool::new(MemoryConfig::default());
//! let mut mem = pool.allocate().unwrap();
//!
//! let mut out = InteropOutputStream::new(&mut mem);
//! out.write_i32(42).unwrap();
//! assert!(out.memory().committed().is_empty());
//!
//! out.synchronize();
//! assert_eq!(mem.committed(), &42i32.to_le_bytes());
//! ```

mod pool;
mod stream;

use serde::Deserialize;

use crate::error::{GridwireError, Result};

pub use pool::{MemoryPool, PooledMemory};
pub use stream::{InteropInputStream, InteropOutputStream};

/// Default capacity of a freshly allocated buffer.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Default cap on buffer growth (matches the default frame payload limit).
pub const DEFAULT_MAX_CAPACITY: usize = 1_073_741_824;

/// Default number of idle buffers kept for reuse.
pub const DEFAULT_MAX_POOLED: usize = 16;

/// Buffers that grew beyond `initial_capacity * POOL_SHRINK_FACTOR` are freed
/// instead of pooled.
const POOL_SHRINK_FACTOR: usize = 16;

/// Sizing of pooled buffers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Capacity of a newly allocated buffer.
    pub initial_capacity: usize,
    /// Upper bound a buffer may grow to while encoding.
    pub max_capacity: usize,
    /// Maximum idle buffers kept in the pool.
    pub max_pooled: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_capacity: DEFAULT_MAX_CAPACITY,
            max_pooled: DEFAULT_MAX_POOLED,
        }
    }
}

/// A growable byte region with a committed length.
///
/// The whole region is always initialized. Only the first `len()` bytes,
/// published by [`InteropOutputStream::synchronize`], are visible through
/// [`committed`](Self::committed).
#[derive(Debug)]
pub struct InteropMemory {
    /// Zero-initialized storage; `data.len()` is the capacity.
    data: Vec<u8>,
    /// Committed length.
    len: usize,
    /// Growth cap.
    max_capacity: usize,
}

impl InteropMemory {
    /// Allocate a zeroed buffer.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if `capacity` exceeds `max_capacity` or the
    /// allocation fails.
    pub fn with_capacity(capacity: usize, max_capacity: usize) -> Result<Self> {
        if capacity > max_capacity {
            return Err(GridwireError::ResourceExhausted(format!(
                "Requested capacity {} exceeds maximum {}",
                capacity, max_capacity
            )));
        }

        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|e| GridwireError::ResourceExhausted(e.to_string()))?;
        data.resize(capacity, 0);

        Ok(Self {
            data,
            len: 0,
            max_capacity,
        })
    }

    /// Current capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Committed length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if nothing has been committed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The committed bytes, i.e. what crosses the boundary.
    #[inline]
    pub fn committed(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Make sure at least `required` bytes are addressable.
    ///
    /// Grows by doubling (at least to `required`), bounded by the cap.
    pub fn ensure_capacity(&mut self, required: usize) -> Result<()> {
        let capacity = self.data.len();
        if required <= capacity {
            return Ok(());
        }

        if required > self.max_capacity {
            return Err(GridwireError::ResourceExhausted(format!(
                "Buffer of {} bytes exceeds maximum {}",
                required, self.max_capacity
            )));
        }

        let new_capacity = capacity
            .saturating_mul(2)
            .max(required)
            .min(self.max_capacity);

        self.data
            .try_reserve_exact(new_capacity - capacity)
            .map_err(|e| GridwireError::ResourceExhausted(e.to_string()))?;
        self.data.resize(new_capacity, 0);

        Ok(())
    }

    /// Zero the region and drop the committed length.
    pub fn reset(&mut self) {
        self.data.fill(0);
        self.len = 0;
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.data.len());
        self.len = len;
    }

    pub(crate) fn region_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[cfg(test)]
    pub(crate) fn memory_region(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_capacity_is_zeroed() {
        let mem = InteropMemory::with_capacity(64, 1024).unwrap();
        assert_eq!(mem.capacity(), 64);
        assert!(mem.is_empty());
        assert!(mem.committed().is_empty());
    }

    #[test]
    fn test_with_capacity_over_cap() {
        let result = InteropMemory::with_capacity(2048, 1024);
        assert!(matches!(result, Err(GridwireError::ResourceExhausted(_))));
    }

    #[test]
    fn test_ensure_capacity_doubles() {
        let mut mem = InteropMemory::with_capacity(16, 1024).unwrap();
        mem.ensure_capacity(17).unwrap();
        assert_eq!(mem.capacity(), 32);

        mem.ensure_capacity(100).unwrap();
        assert_eq!(mem.capacity(), 100);
    }

    #[test]
    fn test_ensure_capacity_clamped_to_cap() {
        let mut mem = InteropMemory::with_capacity(600, 1000).unwrap();
        mem.ensure_capacity(700).unwrap();
        assert_eq!(mem.capacity(), 1000);

        let result = mem.ensure_capacity(1001);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("exceeds maximum 1000"));
    }

    #[test]
    fn test_reset_zeroes() {
        let mut mem = InteropMemory::with_capacity(8, 8).unwrap();
        mem.region_mut()[0] = 0xFF;
        mem.set_len(1);

        mem.reset();

        assert!(mem.is_empty());
        assert!(mem.region_mut().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_memory_config_from_partial_json() {
        let config: MemoryConfig = serde_json::from_str(r#"{"max_pooled": 2}"#).unwrap();
        assert_eq!(config.max_pooled, 2);
        assert_eq!(config.initial_capacity, DEFAULT_INITIAL_CAPACITY);
    }
}
