//! # Memory Layout
//!
//! Fixed configuration of the paging bootstrap. The table planner receives
//! the base address through `kernel_vmem::TableLayout` rather than reading
//! it here, so the same algorithm can be pointed at a simulated address
//! space.

use kernel_memory_addresses::{PageSize, PhysicalAddress};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Physical address of the top-level (PML4) table. Everything else is laid
/// out after it:
///
/// ```text
/// PAGING_STRUCTURES_BASE          PML4        (1 page)
/// PAGING_STRUCTURES_BASE + 4 KiB  low PT      (1 page, maps the first 2 MiB)
/// PAGING_STRUCTURES_BASE + 8 KiB  PDP tables  (one per 512 GiB)
///                        ...      PD tables   (one per 1 GiB)
/// ```
///
/// Page 0 is left alone: it is the page the bootstrap never maps, and a
/// reference to address zero is not something Rust code may form.
pub const PAGING_STRUCTURES_BASE: PhysicalAddress = PhysicalAddress::new(0x1000);

/// Number of 8-byte entries in any table (one 4 KiB page).
pub const ENTRIES_PER_TABLE: u64 = PageSize::SMALL_BYTES / 8;

/// Width of every table index.
pub const INDEX_BITS: u32 = 9;

/// Mask applied to a shifted page number to extract one index.
pub const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Lowest bit of the PML4 index within a *virtual page number* (VA bit 39).
pub const PML4_INDEX_SHIFT: u32 = 39 - PageSize::SMALL_SHIFT;

/// Lowest bit of the PDP index within a virtual page number (VA bit 30).
pub const PDP_INDEX_SHIFT: u32 = 30 - PageSize::SMALL_SHIFT;

/// Lowest bit of the PD index within a virtual page number (VA bit 21).
pub const PD_INDEX_SHIFT: u32 = 21 - PageSize::SMALL_SHIFT;

/// Lowest bit of the PT index within a virtual page number (VA bit 12).
pub const PT_INDEX_SHIFT: u32 = 12 - PageSize::SMALL_SHIFT;

/// Bytes addressed by one PDP table.
pub const PDP_TABLE_COVERAGE: u64 = 512 * GIB;

/// Bytes addressed by one PD table.
pub const PD_TABLE_COVERAGE: u64 = GIB;

/// Bytes addressed by the single low PT.
pub const PT_TABLE_COVERAGE: u64 = ENTRIES_PER_TABLE * PageSize::SMALL_BYTES;

/// Smallest amount of RAM the bootstrap accepts. The low PT must be fully
/// backed by real memory.
pub const MIN_AVAILABLE_MEMORY: u64 = 2 * MIB;

/// Where "upper" memory starts when the boot loader only reports the coarse
/// lower/upper pair.
pub const EXTENDED_MEMORY_BASE: u64 = MIB;

/// The identity map created with small pages covers exactly the low PT.
pub const IDENTITY_LOW_BYTES: u64 = PT_TABLE_COVERAGE;

/// Width of a canonical virtual address under 4-level paging.
pub const VIRTUAL_ADDRESS_BITS: u32 = 48;

/// Number of virtual pages the four index fields can address.
pub const VIRTUAL_PAGE_LIMIT: u64 = 1 << (VIRTUAL_ADDRESS_BITS - PageSize::SMALL_SHIFT);

const _: () = {
    assert!(ENTRIES_PER_TABLE == 512);
    assert!(INDEX_MASK == 0x1FF);
    assert!(PML4_INDEX_SHIFT == 27);
    assert!(PDP_INDEX_SHIFT == 18);
    assert!(PD_INDEX_SHIFT == 9);
    assert!(PT_INDEX_SHIFT == 0);
    assert!(PT_TABLE_COVERAGE == PageSize::LARGE_BYTES);
    assert!(PD_TABLE_COVERAGE == ENTRIES_PER_TABLE * PT_TABLE_COVERAGE);
    assert!(PDP_TABLE_COVERAGE == ENTRIES_PER_TABLE * PD_TABLE_COVERAGE);
    assert!(MIN_AVAILABLE_MEMORY == IDENTITY_LOW_BYTES);
    assert!(VIRTUAL_PAGE_LIMIT == 1 << 36);
    assert!(PAGING_STRUCTURES_BASE.is_aligned_to(PageSize::Small));
    assert!(PAGING_STRUCTURES_BASE.as_u64() != 0);
};
