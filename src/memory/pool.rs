//! Buffer pool with RAII leases.
//!
//! Each request/response cycle leases one buffer. The lease is exclusive to
//! the caller and goes back to the pool when dropped; buffers are zeroed on
//! their way out, not on their way back.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{InteropMemory, MemoryConfig, POOL_SHRINK_FACTOR};
use crate::error::Result;

/// Pool of reusable [`InteropMemory`] buffers.
#[derive(Debug)]
pub struct MemoryPool {
    config: MemoryConfig,
    /// Idle buffers ready for reuse.
    free: Mutex<Vec<InteropMemory>>,
    /// Leases currently outstanding.
    leased: AtomicUsize,
}

impl MemoryPool {
    /// Create an empty pool.
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(config.max_pooled)),
            config,
            leased: AtomicUsize::new(0),
        }
    }

    /// Lease a zeroed, position-reset buffer.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if a fresh buffer cannot be allocated.
    pub fn allocate(&self) -> Result<PooledMemory<'_>> {
        let reused = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let memory = match reused {
            Some(mut memory) => {
                memory.reset();
                memory
            }
            None => InteropMemory::with_capacity(
                self.config.initial_capacity,
                self.config.max_capacity,
            )?,
        };

        self.leased.fetch_add(1, Ordering::AcqRel);

        Ok(PooledMemory {
            pool: self,
            memory: Some(memory),
        })
    }

    /// Number of idle buffers.
    pub fn pooled(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of outstanding leases.
    #[inline]
    pub fn leased(&self) -> usize {
        self.leased.load(Ordering::Acquire)
    }

    /// Pool configuration.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn release(&self, memory: InteropMemory) {
        self.leased.fetch_sub(1, Ordering::AcqRel);

        let oversized = memory.capacity()
            > self
                .config
                .initial_capacity
                .saturating_mul(POOL_SHRINK_FACTOR);
        if oversized {
            return;
        }

        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.config.max_pooled {
            free.push(memory);
        }
    }
}

/// Exclusive lease on a pooled buffer.
///
/// Dereferences to [`InteropMemory`]; released back to the pool on drop.
pub struct PooledMemory<'a> {
    pool: &'a MemoryPool,
    memory: Option<InteropMemory>,
}

impl Deref for PooledMemory<'_> {
    type Target = InteropMemory;

    fn deref(&self) -> &InteropMemory {
        self.memory.as_ref().expect("memory is present until drop")
    }
}

impl DerefMut for PooledMemory<'_> {
    fn deref_mut(&mut self) -> &mut InteropMemory {
        self.memory.as_mut().expect("memory is present until drop")
    }
}

impl Drop for PooledMemory<'_> {
    fn drop(&mut self) {
        if let Some(memory) = self.memory.take() {
            self.pool.release(memory);
        }
    }
}
