//! Table indices carved out of a virtual page number.

use core::fmt;
use kernel_info::memory::{
    ENTRIES_PER_TABLE, INDEX_MASK, PD_INDEX_SHIFT, PDP_INDEX_SHIFT, PML4_INDEX_SHIFT,
    PT_INDEX_SHIFT,
};
use kernel_memory_addresses::VirtualPageNumber;

/// Index into one 512-entry table (`0..512`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u16);

impl TableIndex {
    /// Build an index from a raw value.
    ///
    /// # Panics
    /// Panics if `index >= 512`.
    #[inline]
    #[must_use]
    pub const fn new(index: u16) -> Self {
        assert!((index as u64) < ENTRIES_PER_TABLE);
        Self(index)
    }

    /// The 9-bit field at `shift` in `page`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    const fn extract(page: VirtualPageNumber, shift: u32) -> Self {
        Self(((page.as_u64() >> shift) & INDEX_MASK) as u16)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for TableIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The four table indices selecting the path to a virtual page.
///
/// ```rust
/// # use kernel_memory_addresses::VirtualPageNumber;
/// # use kernel_vmem::PageIndices;
/// let ix = PageIndices::of(VirtualPageNumber::new(0x4_0201));
/// assert_eq!(ix.pd.as_u64(), 1);
/// assert_eq!(ix.pt.as_u64(), 0x1);
/// assert_eq!(ix.pdp.as_u64(), 1);
/// assert_eq!(ix.to_virtual_page(), VirtualPageNumber::new(0x4_0201));
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PageIndices {
    pub pml4: TableIndex,
    pub pdp: TableIndex,
    pub pd: TableIndex,
    pub pt: TableIndex,
}

impl PageIndices {
    /// Split `page` into its PML4/PDP/PD/PT indices.
    ///
    /// Bits of `page` above the PML4 field are ignored.
    #[inline]
    #[must_use]
    pub const fn of(page: VirtualPageNumber) -> Self {
        Self {
            pml4: TableIndex::extract(page, PML4_INDEX_SHIFT),
            pdp: TableIndex::extract(page, PDP_INDEX_SHIFT),
            pd: TableIndex::extract(page, PD_INDEX_SHIFT),
            pt: TableIndex::extract(page, PT_INDEX_SHIFT),
        }
    }

    /// Reassemble the (36-bit) virtual page number.
    #[inline]
    #[must_use]
    pub const fn to_virtual_page(self) -> VirtualPageNumber {
        VirtualPageNumber::new(
            (self.pml4.as_u64() << PML4_INDEX_SHIFT)
                | (self.pdp.as_u64() << PDP_INDEX_SHIFT)
                | (self.pd.as_u64() << PD_INDEX_SHIFT)
                | (self.pt.as_u64() << PT_INDEX_SHIFT),
        )
    }

    /// Which PD table (counted across the whole region) holds the entry.
    ///
    /// Equivalently, the index of the 1 GiB slice of the address space.
    #[inline]
    #[must_use]
    pub const fn pd_table(self) -> u64 {
        self.pml4.as_u64() * ENTRIES_PER_TABLE + self.pdp.as_u64()
    }

    /// Index of the 2 MiB slice of the address space.
    #[inline]
    #[must_use]
    pub const fn large_page_slot(self) -> u64 {
        self.pd_table() * ENTRIES_PER_TABLE + self.pd.as_u64()
    }
}

impl fmt::Display for PageIndices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}:{}:{}]", self.pml4, self.pdp, self.pd, self.pt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pages_live_in_first_table() {
        for n in 0..512 {
            let ix = PageIndices::of(VirtualPageNumber::new(n));
            assert_eq!(ix.pml4.as_u64(), 0);
            assert_eq!(ix.pdp.as_u64(), 0);
            assert_eq!(ix.pd.as_u64(), 0);
            assert_eq!(ix.pt.as_u64(), n);
        }
    }

    #[test]
    fn shifts_select_each_level() {
        let ix = PageIndices::of(VirtualPageNumber::new(1 << 27));
        assert_eq!(ix.pml4, TableIndex::new(1));
        let ix = PageIndices::of(VirtualPageNumber::new(1 << 18));
        assert_eq!(ix.pdp, TableIndex::new(1));
        let ix = PageIndices::of(VirtualPageNumber::new(1 << 9));
        assert_eq!(ix.pd, TableIndex::new(1));
    }

    #[test]
    fn indices_reassemble_the_page_number() {
        let mut n = 0u64;
        while n < 1 << 36 {
            let vp = VirtualPageNumber::new(n);
            assert_eq!(PageIndices::of(vp).to_virtual_page(), vp);
            n = n * 3 + 0x1_2345;
        }
    }

    #[test]
    fn pd_table_counts_gigabytes() {
        // 3 GiB into the address space.
        let ix = PageIndices::of(VirtualPageNumber::new(3 << 18));
        assert_eq!(ix.pd_table(), 3);
        assert_eq!(ix.large_page_slot(), 3 * 512);
    }

    #[test]
    #[should_panic]
    fn out_of_range_index_panics() {
        let _ = TableIndex::new(512);
    }
}
