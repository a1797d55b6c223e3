//! Index managers for qubits and result slots.
//!
//! Rule actions that turn runtime allocation into static addressing draw
//! indices from an [`AllocationManager`]. A profile hands the same
//! [`SharedAllocationManager`] to every rule, so indices are unique across
//! the whole module.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::AllocationError;

/// Largest block a single [`AllocationManager::allocate_block`] call hands out.
pub const MAX_BLOCK_SIZE: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode {
    /// A fixed pool of `capacity` indices, never released.
    Static { capacity: u64 },
    /// Unbounded. With `reuse`, released indices are handed out again,
    /// lowest first.
    Dynamic { reuse: bool },
}

#[derive(Debug, Clone)]
pub struct AllocationManager {
    mode: AllocationMode,
    next_index: u64,
    allocated: BTreeSet<u64>,
    free: BTreeSet<u64>,
    peak: usize,
}

impl AllocationManager {
    pub fn new(mode: AllocationMode) -> Self {
        Self {
            mode,
            next_index: 0,
            allocated: BTreeSet::new(),
            free: BTreeSet::new(),
            peak: 0,
        }
    }

    pub fn new_static(capacity: u64) -> Self {
        Self::new(AllocationMode::Static { capacity })
    }

    pub fn new_dynamic(reuse: bool) -> Self {
        Self::new(AllocationMode::Dynamic { reuse })
    }

    pub fn mode(&self) -> AllocationMode {
        self.mode
    }

    pub fn allocate(&mut self) -> Result<u64, AllocationError> {
        if let Some(index) = self.free.pop_first() {
            self.mark(index);
            return Ok(index);
        }
        let index = self.next_index;
        self.next_index = self.reserve(1)?;
        self.mark(index);
        Ok(index)
    }

    /// Allocate `size` consecutive indices and return the first one.
    ///
    /// Blocks always come from fresh indices; released ones are not
    /// coalesced. Sizes above [`MAX_BLOCK_SIZE`] are rejected in every mode.
    pub fn allocate_block(&mut self, size: u64) -> Result<u64, AllocationError> {
        if size > MAX_BLOCK_SIZE {
            return Err(AllocationError::BlockTooLarge {
                size,
                limit: MAX_BLOCK_SIZE,
            });
        }
        let start = self.next_index;
        self.next_index = self.reserve(size)?;
        for index in start..self.next_index {
            self.mark(index);
        }
        Ok(start)
    }

    pub fn release(&mut self, index: u64) -> Result<(), AllocationError> {
        if !self.supports_release() {
            return Err(AllocationError::ReleaseUnsupported);
        }
        if !self.allocated.remove(&index) {
            return Err(AllocationError::NotAllocated(index));
        }
        if let AllocationMode::Dynamic { reuse: true } = self.mode {
            self.free.insert(index);
        }
        Ok(())
    }

    pub fn is_allocated(&self, index: u64) -> bool {
        self.allocated.contains(&index)
    }

    /// Number of indices currently held.
    pub fn count(&self) -> usize {
        self.allocated.len()
    }

    /// Largest number of indices held at once.
    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn supports_release(&self) -> bool {
        matches!(self.mode, AllocationMode::Dynamic { .. })
    }

    /// The index one past `size` fresh indices, if the pool has room for them.
    fn reserve(&self, size: u64) -> Result<u64, AllocationError> {
        let end = self.next_index.checked_add(size);
        match (self.mode, end) {
            (AllocationMode::Static { capacity }, Some(end)) if end > capacity => {
                Err(AllocationError::Exhausted { capacity })
            }
            (AllocationMode::Static { capacity }, None) => {
                Err(AllocationError::Exhausted { capacity })
            }
            (AllocationMode::Dynamic { .. }, None) => Err(AllocationError::Exhausted {
                capacity: u64::MAX,
            }),
            (_, Some(end)) => Ok(end),
        }
    }

    fn mark(&mut self, index: u64) {
        self.allocated.insert(index);
        self.peak = self.peak.max(self.allocated.len());
    }
}

/// An [`AllocationManager`] shared between rule actions and the profile.
///
/// Every operation takes the lock exactly once.
#[derive(Debug, Clone)]
pub struct SharedAllocationManager(Arc<Mutex<AllocationManager>>);

impl SharedAllocationManager {
    pub fn new(manager: AllocationManager) -> Self {
        Self(Arc::new(Mutex::new(manager)))
    }

    pub fn new_static(capacity: u64) -> Self {
        Self::new(AllocationManager::new_static(capacity))
    }

    pub fn new_dynamic(reuse: bool) -> Self {
        Self::new(AllocationManager::new_dynamic(reuse))
    }

    pub fn allocate(&self) -> Result<u64, AllocationError> {
        self.0.lock().allocate()
    }

    pub fn allocate_block(&self, size: u64) -> Result<u64, AllocationError> {
        self.0.lock().allocate_block(size)
    }

    pub fn release(&self, index: u64) -> Result<(), AllocationError> {
        self.0.lock().release(index)
    }

    pub fn is_allocated(&self, index: u64) -> bool {
        self.0.lock().is_allocated(index)
    }

    pub fn count(&self) -> usize {
        self.0.lock().count()
    }

    pub fn peak(&self) -> usize {
        self.0.lock().peak()
    }

    pub fn supports_release(&self) -> bool {
        self.0.lock().supports_release()
    }

    pub fn mode(&self) -> AllocationMode {
        self.0.lock().mode()
    }

    /// Copy of the current state, for reporting.
    pub fn snapshot(&self) -> AllocationManager {
        self.0.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_indices_increase_without_reuse() {
        let mut manager = AllocationManager::new_dynamic(false);
        let issued: Vec<u64> = (0..4).map(|_| manager.allocate().unwrap()).collect();
        assert_eq!(issued, [0, 1, 2, 3]);

        manager.release(1).unwrap();
        assert_eq!(manager.allocate(), Ok(4));
        assert_eq!(manager.count(), 4);
        assert_eq!(manager.peak(), 4);
    }

    #[test]
    fn dynamic_reuse_takes_lowest_free_index() {
        let mut manager = AllocationManager::new_dynamic(true);
        for _ in 0..4 {
            manager.allocate().unwrap();
        }
        manager.release(2).unwrap();
        manager.release(0).unwrap();
        assert!(!manager.is_allocated(0));

        assert_eq!(manager.allocate(), Ok(0));
        assert_eq!(manager.allocate(), Ok(2));
        assert_eq!(manager.allocate(), Ok(4));
        assert_eq!(manager.peak(), 5);
    }

    #[test]
    fn release_of_unknown_index_fails() {
        let mut manager = AllocationManager::new_dynamic(true);
        manager.allocate().unwrap();
        assert_eq!(manager.release(7), Err(AllocationError::NotAllocated(7)));
        manager.release(0).unwrap();
        assert_eq!(manager.release(0), Err(AllocationError::NotAllocated(0)));
    }

    #[test]
    fn static_pool_exhausts_after_capacity() {
        let mut manager = AllocationManager::new_static(3);
        for expected in 0..3 {
            assert_eq!(manager.allocate(), Ok(expected));
        }
        assert_eq!(manager.allocate(), Err(AllocationError::Exhausted { capacity: 3 }));
        assert_eq!(manager.release(0), Err(AllocationError::ReleaseUnsupported));
        assert!(!manager.supports_release());
        assert_eq!(manager.count(), 3);
    }

    #[test]
    fn blocks_are_contiguous_and_respect_capacity() {
        let mut manager = AllocationManager::new_static(8);
        assert_eq!(manager.allocate(), Ok(0));
        assert_eq!(manager.allocate_block(4), Ok(1));
        assert!((1..5).all(|i| manager.is_allocated(i)));
        assert_eq!(
            manager.allocate_block(4),
            Err(AllocationError::Exhausted { capacity: 8 })
        );
        assert_eq!(manager.allocate_block(3), Ok(5));
    }

    #[test]
    fn oversized_blocks_are_rejected_in_both_modes() {
        let too_large = AllocationError::BlockTooLarge {
            size: u64::MAX,
            limit: MAX_BLOCK_SIZE,
        };

        let mut fixed = AllocationManager::new_static(4);
        assert_eq!(fixed.allocate(), Ok(0));
        assert_eq!(fixed.allocate_block(u64::MAX), Err(too_large.clone()));
        assert_eq!(
            fixed.allocate_block(MAX_BLOCK_SIZE),
            Err(AllocationError::Exhausted { capacity: 4 })
        );

        let mut open = AllocationManager::new_dynamic(false);
        assert_eq!(open.allocate(), Ok(0));
        assert_eq!(open.allocate_block(u64::MAX), Err(too_large));
        assert_eq!(
            open.allocate_block(1 << 40),
            Err(AllocationError::BlockTooLarge {
                size: 1 << 40,
                limit: MAX_BLOCK_SIZE,
            })
        );

        // Failed requests leave the pools untouched.
        assert_eq!(fixed.allocate(), Ok(1));
        assert_eq!(open.allocate(), Ok(1));
        assert_eq!(open.count(), 2);
    }

    #[test]
    fn index_space_end_is_an_error() {
        let mut manager = AllocationManager::new_dynamic(false);
        manager.next_index = u64::MAX - 1;
        assert_eq!(manager.allocate(), Ok(u64::MAX - 1));
        assert_eq!(
            manager.allocate(),
            Err(AllocationError::Exhausted { capacity: u64::MAX })
        );
        assert_eq!(
            manager.allocate_block(2),
            Err(AllocationError::Exhausted { capacity: u64::MAX })
        );
    }

    #[test]
    fn shared_handles_see_one_state() {
        let shared = SharedAllocationManager::new_dynamic(false);
        let other = shared.clone();
        assert_eq!(shared.allocate(), Ok(0));
        assert_eq!(other.allocate(), Ok(1));
        assert_eq!(shared.count(), 2);
        assert_eq!(other.snapshot().peak(), 2);
    }
}
