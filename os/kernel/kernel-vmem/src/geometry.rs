//! # Table Geometry Planner
//!
//! Sizes the table hierarchy for a given amount of RAM and lays the tables
//! out back to back, starting at the layout root:
//!
//! ```text
//! root            PML4
//! root + 4K       PT      (the single bottom-level table, first 2 MiB)
//! root + 8K       PDP[0] .. PDP[pdp_count - 1]
//! root + 4K*(2+n) PD[0]  .. PD[pd_count - 1]
//! ```

use crate::table::TableKind;
use core::fmt;
use kernel_info::memory::{
    MIN_AVAILABLE_MEMORY, PAGING_STRUCTURES_BASE, PD_TABLE_COVERAGE, PDP_TABLE_COVERAGE,
};
use kernel_memory_addresses::{PageSize, PhysicalAddress};
use log::info;

/// Where the table hierarchy lives in physical memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableLayout {
    /// Physical address of the PML4; 4 KiB aligned.
    pub root: PhysicalAddress,
    /// First byte the tables must not reach, if the memory past `root` is
    /// known to end somewhere.
    pub limit: Option<PhysicalAddress>,
}

impl TableLayout {
    /// The layout used on real hardware.
    pub const DEFAULT: Self = Self::at(PAGING_STRUCTURES_BASE);

    /// # Panics
    /// Panics if `root` is not 4 KiB aligned.
    #[must_use]
    pub const fn at(root: PhysicalAddress) -> Self {
        assert!(root.is_aligned_to(PageSize::Small));
        Self { root, limit: None }
    }

    /// Reject plans whose tables would extend past `limit`.
    #[must_use]
    pub const fn with_limit(self, limit: PhysicalAddress) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }
}

impl Default for TableLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// Below the 2 MiB floor the low identity mapping needs.
    #[error("insufficient memory: {available:#x} bytes available, at least 2 MiB required")]
    InsufficientMemory { available: u64 },

    /// The tables for this much RAM do not fit below the layout limit.
    #[error("page tables would end at {end}, past the usable limit {limit}")]
    TablesExceedLimit {
        end: PhysicalAddress,
        limit: PhysicalAddress,
    },
}

/// Computed sizes and addresses of every table the bootstrap uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Geometry {
    available_memory: u64,
    pdp_count: u64,
    pd_count: u64,
    pml4: PhysicalAddress,
    pt: PhysicalAddress,
    pdp_base: PhysicalAddress,
    pd_base: PhysicalAddress,
}

/// A run of consecutive tables of one kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableRegion {
    pub kind: TableKind,
    pub base: PhysicalAddress,
    pub count: u64,
}

impl TableRegion {
    /// Address of the `i`-th table in the run.
    #[inline]
    #[must_use]
    pub const fn table(&self, i: u64) -> Option<PhysicalAddress> {
        if i < self.count {
            Some(self.base.add_pages(i))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.count * PageSize::SMALL_BYTES
    }
}

/// Plan the table hierarchy for `available_memory` bytes of RAM.
///
/// ```rust
/// # use kernel_vmem::{plan, TableLayout};
/// # use kernel_memory_addresses::PhysicalAddress;
/// let g = plan(256 << 20, &TableLayout::at(PhysicalAddress::new(0x10_0000))).unwrap();
/// assert_eq!((g.pdp_count(), g.pd_count()), (1, 1));
/// assert_eq!(g.pt().as_u64(), 0x10_1000);
/// assert_eq!(g.pd_table(0).unwrap().as_u64(), 0x10_3000);
/// ```
///
/// # Errors
/// - [`PlanError::InsufficientMemory`] below 2 MiB.
/// - [`PlanError::TablesExceedLimit`] if the layout has a limit and the
///   tables would cross it.
pub fn plan(available_memory: u64, layout: &TableLayout) -> Result<Geometry, PlanError> {
    if available_memory < MIN_AVAILABLE_MEMORY {
        return Err(PlanError::InsufficientMemory {
            available: available_memory,
        });
    }

    let pdp_count = available_memory.div_ceil(PDP_TABLE_COVERAGE).max(1);
    let pd_count = available_memory.div_ceil(PD_TABLE_COVERAGE).max(1);

    let pml4 = layout.root;
    let pt = pml4.add_pages(1);
    let pdp_base = pml4.add_pages(2);
    let pd_base = pml4.add_pages(2 + pdp_count);

    let geometry = Geometry {
        available_memory,
        pdp_count,
        pd_count,
        pml4,
        pt,
        pdp_base,
        pd_base,
    };
    if let Some(limit) = layout.limit
        && geometry.end().as_u64() > limit.as_u64()
    {
        return Err(PlanError::TablesExceedLimit {
            end: geometry.end(),
            limit,
        });
    }
    info!("{geometry}");
    Ok(geometry)
}

impl Geometry {
    #[inline]
    #[must_use]
    pub const fn available_memory(&self) -> u64 {
        self.available_memory
    }

    #[inline]
    #[must_use]
    pub const fn pdp_count(&self) -> u64 {
        self.pdp_count
    }

    #[inline]
    #[must_use]
    pub const fn pd_count(&self) -> u64 {
        self.pd_count
    }

    /// The root (PML4) table; this is what CR3 points at.
    #[inline]
    #[must_use]
    pub const fn pml4(&self) -> PhysicalAddress {
        self.pml4
    }

    #[inline]
    #[must_use]
    pub const fn pt(&self) -> PhysicalAddress {
        self.pt
    }

    #[inline]
    #[must_use]
    pub const fn pdp_tables(&self) -> TableRegion {
        TableRegion {
            kind: TableKind::Pdp,
            base: self.pdp_base,
            count: self.pdp_count,
        }
    }

    #[inline]
    #[must_use]
    pub const fn pd_tables(&self) -> TableRegion {
        TableRegion {
            kind: TableKind::Pd,
            base: self.pd_base,
            count: self.pd_count,
        }
    }

    /// Address of PDP table `i`, if it was planned.
    #[inline]
    #[must_use]
    pub const fn pdp_table(&self, i: u64) -> Option<PhysicalAddress> {
        self.pdp_tables().table(i)
    }

    /// Address of PD table `i` (the table covering GiB `i`), if it was planned.
    #[inline]
    #[must_use]
    pub const fn pd_table(&self, i: u64) -> Option<PhysicalAddress> {
        self.pd_tables().table(i)
    }

    /// Every region the hierarchy occupies, in address order.
    #[must_use]
    pub const fn regions(&self) -> [TableRegion; 4] {
        [
            TableRegion {
                kind: TableKind::Pml4,
                base: self.pml4,
                count: 1,
            },
            TableRegion {
                kind: TableKind::Pt,
                base: self.pt,
                count: 1,
            },
            self.pdp_tables(),
            self.pd_tables(),
        ]
    }

    #[inline]
    #[must_use]
    pub const fn table_count(&self) -> u64 {
        2 + self.pdp_count + self.pd_count
    }

    /// First byte past the last table.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.pml4.add_pages(self.table_count())
    }

    /// Whether `addr` falls inside any planned table.
    #[inline]
    #[must_use]
    pub const fn contains(&self, addr: PhysicalAddress) -> bool {
        addr.as_u64() >= self.pml4.as_u64() && addr.as_u64() < self.end().as_u64()
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Paging geometry for {:#x} bytes: {} PDP, {} PD; PML4 at {}, PT at {}, PDP at {}, PD at {}",
            self.available_memory,
            self.pdp_count,
            self.pd_count,
            self.pml4,
            self.pt,
            self.pdp_base,
            self.pd_base
        )
    }
}
