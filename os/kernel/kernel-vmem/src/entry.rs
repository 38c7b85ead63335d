//! # Page-Table Entry
//!
//! One 64-bit entry, shared by all four table kinds. Only the meaning of the
//! base-address field differs: in PML4, PDP and (non-large) PD entries it
//! names the next table, in PT entries and large PD entries the mapped page.

use kernel_memory_addresses::PhysicalPageNumber;
use bitfield_struct::bitfield;

/// A single x86-64 page-table entry in its raw bit layout.
///
/// Each field is an accessor over a plain `u64`; the layout does not depend
/// on any compiler's bitfield rules and is binary compatible with the
/// hardware format.
///
/// ### Bit layout
///
/// | Bits   | Field                | Meaning |
/// |--------|----------------------|---------|
/// | 0      | `present`            | Entry is valid |
/// | 1      | `writable`           | Writes permitted |
/// | 2      | `user_accessible`    | User-mode access (always clear here) |
/// | 3      | `write_through`      | PWT: write-through caching |
/// | 4      | `cache_disabled`     | PCD: caching disabled |
/// | 5      | `accessed`           | Set by the CPU |
/// | 6      | `dirty`              | Set by the CPU on write (leaf only) |
/// | 7      | `large_page`         | PS: PD entry maps a 2 MiB page |
/// | 8      | `global`             | Survives CR3 reloads (leaf only) |
/// | 9–11   | `os_available_low`   | Ignored by hardware |
/// | 12–51  | base page number     | Physical page number of next table / page |
/// | 52–62  | `os_available_high`  | Ignored by hardware |
/// | 63     | `no_execute`         | NX |
///
/// A non-present entry is all zeroes. A present entry stores a *page
/// number*, never a raw address, so alignment is implied.
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalPageNumber;
/// # use kernel_vmem::PageEntry;
/// let e = PageEntry::table_link(PhysicalPageNumber::new(3));
/// assert!(e.present() && e.writable() && e.write_through());
/// assert_eq!(e.physical_page(), PhysicalPageNumber::new(3));
/// assert_eq!(e.into_bits(), 0x3000 | 0b1011);
/// ```
#[doc(alias = "PTE")]
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntry {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2). Kernel-only while clear.
    pub user_accessible: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Hardware-maintained.
    pub accessed: bool,

    /// Dirty (D, bit 6). Hardware-maintained, leaf entries only.
    pub dirty: bool,

    /// Page Size (PS, bit 7). Set on a PD entry that maps a 2 MiB page.
    pub large_page: bool,

    /// Global (G, bit 8). Leaf entries only.
    pub global: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available_low: u8,

    /// Physical page number (bits 12..=51).
    #[bits(40)]
    base_page: u64,

    /// OS-available (bits 52..=62).
    #[bits(11)]
    pub os_available_high: u16,

    /// No-Execute (NX, bit 63).
    pub no_execute: bool,
}

impl PageEntry {
    /// A non-present entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new()
    }

    /// Entry pointing at the next-level table stored in page `table`.
    ///
    /// Present, writable, write-through; kernel-only and executable.
    #[inline]
    #[must_use]
    pub const fn table_link(table: PhysicalPageNumber) -> Self {
        Self::kernel_rw().with_physical_page(table)
    }

    /// Bottom-level entry mapping the 4 KiB page `page`.
    #[inline]
    #[must_use]
    pub const fn small_leaf(page: PhysicalPageNumber) -> Self {
        Self::kernel_rw().with_physical_page(page)
    }

    /// PD entry mapping the 2 MiB page starting at `page`.
    ///
    /// `page` is counted in small pages and must be a multiple of 512.
    #[inline]
    #[must_use]
    pub const fn large_leaf(page: PhysicalPageNumber) -> Self {
        Self::kernel_rw()
            .with_large_page(true)
            .with_physical_page(page)
    }

    /// Base flags shared by every entry the bootstrap installs.
    #[inline]
    #[must_use]
    const fn kernel_rw() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_accessible(false)
            .with_write_through(true)
            .with_cache_disabled(false)
            .with_no_execute(false)
    }

    /// Physical page number held in the base-address field.
    #[inline]
    #[must_use]
    pub const fn physical_page(&self) -> PhysicalPageNumber {
        PhysicalPageNumber::new(self.base_page())
    }

    /// Store `page` in the base-address field.
    #[inline]
    pub const fn set_physical_page(&mut self, page: PhysicalPageNumber) {
        self.set_base_page(page.as_u64());
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_page(mut self, page: PhysicalPageNumber) -> Self {
        self.set_physical_page(page);
        self
    }

    /// If present, the page number of the next table or mapped page.
    #[inline]
    #[must_use]
    pub const fn target(self) -> Option<PhysicalPageNumber> {
        if self.present() {
            Some(self.physical_page())
        } else {
            None
        }
    }
}
