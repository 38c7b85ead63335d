//! # Table Memory
//!
//! The mapper never dereferences physical addresses itself. It asks a
//! [`TableMemory`] for the [`PageTable`] stored at a physical address, so the
//! same code runs against identity-mapped RAM at boot and against a plain
//! arena in tests.

use crate::PageTable;
use kernel_memory_addresses::{PageSize, PhysicalAddress};

/// Access to the physical frames holding page tables.
///
/// Implementations must hand out the same frame for the same address every
/// time, and frames for distinct addresses must not overlap.
pub trait TableMemory {
    /// The table stored at `at` (4 KiB aligned).
    fn table(&self, at: PhysicalAddress) -> &PageTable;

    /// Mutable access to the table stored at `at` (4 KiB aligned).
    fn table_mut(&mut self, at: PhysicalAddress) -> &mut PageTable;

    /// Clear every entry of the table at `at`.
    fn zero(&mut self, at: PhysicalAddress) {
        self.table_mut(at).zero();
    }
}

impl<T: TableMemory + ?Sized> TableMemory for &mut T {
    #[inline]
    fn table(&self, at: PhysicalAddress) -> &PageTable {
        (**self).table(at)
    }

    #[inline]
    fn table_mut(&mut self, at: PhysicalAddress) -> &mut PageTable {
        (**self).table_mut(at)
    }

    #[inline]
    fn zero(&mut self, at: PhysicalAddress) {
        (**self).zero(at);
    }
}

/// Physical memory reachable at the identical virtual address.
///
/// This is the situation during early boot, before paging is enabled (or
/// while running on the loader's identity map).
#[derive(Debug)]
pub struct IdentityMapped {
    _private: (),
}

impl IdentityMapped {
    /// # Safety
    /// - Every address later passed to [`TableMemory`] methods must be
    ///   identity-mapped (or paging must be off), writable and 4 KiB aligned.
    /// - Those frames must be owned exclusively by the caller for as long as
    ///   the returned value lives; nothing else may read or write them.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn frame(at: PhysicalAddress) -> *mut PageTable {
        debug_assert!(at.is_aligned_to(PageSize::Small));
        core::ptr::with_exposed_provenance_mut(at.as_u64() as usize)
    }
}

impl TableMemory for IdentityMapped {
    fn table(&self, at: PhysicalAddress) -> &PageTable {
        // SAFETY: guaranteed by the contract of `IdentityMapped::new`.
        unsafe { &*Self::frame(at) }
    }

    fn table_mut(&mut self, at: PhysicalAddress) -> &mut PageTable {
        // SAFETY: guaranteed by the contract of `IdentityMapped::new`; the
        // `&mut self` receiver keeps the reference unique.
        unsafe { &mut *Self::frame(at) }
    }
}

/// A run of table frames backed by an ordinary slice, pretending to live at
/// physical address `base`.
///
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::{PageTable, SliceMemory, TableMemory};
/// let mut frames = vec![PageTable::zeroed(); 4];
/// let mut mem = SliceMemory::new(PhysicalAddress::new(0x10_0000), &mut frames);
/// assert!(mem.table(PhysicalAddress::new(0x10_3000)).is_empty());
/// assert!(!mem.covers(PhysicalAddress::new(0x10_4000)));
/// ```
///
/// # Panics
/// Accessing an address outside the slice, or one that is not 4 KiB
/// aligned, panics.
#[derive(Debug)]
pub struct SliceMemory<'a> {
    base: PhysicalAddress,
    frames: &'a mut [PageTable],
}

impl<'a> SliceMemory<'a> {
    /// # Panics
    /// Panics if `base` is not 4 KiB aligned.
    #[must_use]
    pub fn new(base: PhysicalAddress, frames: &'a mut [PageTable]) -> Self {
        assert!(base.is_aligned_to(PageSize::Small), "unaligned base {base}");
        Self { base, frames }
    }

    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    #[must_use]
    pub fn frames(&self) -> &[PageTable] {
        &*self.frames
    }

    /// Whether a table at `at` lies inside the slice.
    #[must_use]
    pub fn covers(&self, at: PhysicalAddress) -> bool {
        self.slot(at).is_some()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn slot(&self, at: PhysicalAddress) -> Option<usize> {
        let offset = at.as_u64().checked_sub(self.base.as_u64())?;
        if !at.is_aligned_to(PageSize::Small) {
            return None;
        }
        let slot = (offset / PageSize::SMALL_BYTES) as usize;
        (slot < self.frames.len()).then_some(slot)
    }

    fn expect_slot(&self, at: PhysicalAddress) -> usize {
        match self.slot(at) {
            Some(slot) => slot,
            None => panic!(
                "table at {at} outside arena {}..{}",
                self.base,
                self.base.add_pages(self.frames.len() as u64)
            ),
        }
    }
}

impl TableMemory for SliceMemory<'_> {
    fn table(&self, at: PhysicalAddress) -> &PageTable {
        &self.frames[self.expect_slot(at)]
    }

    fn table_mut(&mut self, at: PhysicalAddress) -> &mut PageTable {
        let slot = self.expect_slot(at);
        &mut self.frames[slot]
    }
}
