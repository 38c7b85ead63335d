//! # Page Table
//!
//! A 4 KiB, 4 KiB-aligned array of 512 [`PageEntry`] values. All four table
//! kinds share this layout; [`TableKind`] only names the role a given frame
//! plays in the hierarchy.

use crate::PageEntry;
use crate::index::TableIndex;
use core::fmt;
use kernel_info::memory::ENTRIES_PER_TABLE;

#[allow(clippy::cast_possible_truncation)]
const ENTRIES: usize = ENTRIES_PER_TABLE as usize;

/// One page-table frame.
#[doc(alias = "PML4")]
#[doc(alias = "PDPT")]
#[doc(alias = "PD")]
#[doc(alias = "PT")]
#[repr(C, align(4096))]
#[derive(Clone, Eq, PartialEq)]
pub struct PageTable {
    entries: [PageEntry; ENTRIES],
}

const _: () = assert!(size_of::<PageTable>() == 4096);

impl PageTable {
    /// Create a fully zeroed table (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PageEntry::zero(); ENTRIES],
        }
    }

    /// Read the entry at `i`.
    ///
    /// Plain load; does not imply any TLB synchronization.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: TableIndex) -> PageEntry {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    ///
    /// Caller must handle any required TLB invalidation when changing active mappings.
    #[inline]
    pub const fn set(&mut self, i: TableIndex, e: PageEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Clear every entry.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PageEntry::zero());
    }

    /// Iterate over `(index, entry)` pairs of present entries.
    #[allow(clippy::cast_possible_truncation)]
    pub fn present(&self) -> impl Iterator<Item = (TableIndex, PageEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.present())
            .map(|(i, e)| (TableIndex::new(i as u16), *e))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.into_bits() == 0)
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for PageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, e) in self.present() {
            map.entry(&i.as_usize(), &e);
        }
        map.finish()
    }
}

/// Role of a table frame in the four-level hierarchy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TableKind {
    Pml4,
    Pdp,
    Pd,
    Pt,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pml4 => "PML4",
            Self::Pdp => "PDP",
            Self::Pd => "PD",
            Self::Pt => "PT",
        })
    }
}
