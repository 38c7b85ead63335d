//! # Page-Table Mapper
//!
//! [`PagingContext`] owns the table memory and the [`Geometry`] it was
//! planned with, and installs mappings by walking PML4 → PDP → PD (→ PT).
//!
//! Intermediate links are created lazily from the planned table slots; the
//! tables themselves must already be zeroed. Leaf entries are always
//! overwritten.

use crate::index::{PageIndices, TableIndex};
use crate::{Geometry, PageEntry, TableMemory};
use kernel_info::memory::VIRTUAL_PAGE_LIMIT;
use kernel_memory_addresses::{
    PageSize, PhysicalAddress, PhysicalPageNumber, UnsupportedPageSize, VirtualPageNumber,
};
use log::trace;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("invalid page size: {0}")]
    InvalidPageSize(#[from] UnsupportedPageSize),

    /// The page falls outside the planned tables: beyond the last PDP/PD
    /// table, a 4 KiB page outside the first 2 MiB (the only region the
    /// single PT backs), or a path through an existing link that points
    /// outside the planned tables.
    #[error("{size} page {virtual_page} lies outside the mapped region")]
    UnmappedRegion {
        virtual_page: VirtualPageNumber,
        size: PageSize,
    },

    #[error("2M mapping {virtual_page} -> {physical_page} is not 2 MiB aligned")]
    MisalignedLargePage {
        virtual_page: VirtualPageNumber,
        physical_page: PhysicalPageNumber,
    },
}

/// Translation of one virtual page.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Translation {
    /// Physical page backing the *virtual page* (not the 2 MiB base).
    pub physical_page: PhysicalPageNumber,
    /// Size of the leaf that produced it.
    pub size: PageSize,
}

/// The entries met while walking to one virtual page.
///
/// A level is `None` when the walk stopped above it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Walk {
    pub indices: PageIndices,
    pub pml4: PageEntry,
    pub pdp: Option<PageEntry>,
    pub pd: Option<PageEntry>,
    pub pt: Option<PageEntry>,
}

impl Walk {
    /// The present leaf entry, if any.
    #[must_use]
    pub fn leaf(&self) -> Option<(PageEntry, PageSize)> {
        match (self.pd, self.pt) {
            (Some(pd), _) if pd.present() && pd.large_page() => Some((pd, PageSize::Large)),
            (_, Some(pt)) if pt.present() => Some((pt, PageSize::Small)),
            _ => None,
        }
    }

    /// Whether the virtual page resolves to a present leaf.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.leaf().is_some()
    }
}

/// A bootstrapped page-table hierarchy.
#[derive(Debug)]
pub struct PagingContext<M> {
    memory: M,
    geometry: Geometry,
}

impl<M: TableMemory> PagingContext<M> {
    /// Wrap `memory` holding the tables described by `geometry`.
    ///
    /// Every planned table must be zeroed, or hold entries produced by an
    /// earlier context over the same geometry.
    #[must_use]
    pub const fn new(memory: M, geometry: Geometry) -> Self {
        Self { memory, geometry }
    }

    /// Physical address of the PML4; the value CR3 must point at.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalAddress {
        self.geometry.pml4()
    }

    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    #[must_use]
    pub const fn memory(&self) -> &M {
        &self.memory
    }

    /// Give back the table memory.
    #[inline]
    #[must_use]
    pub fn into_memory(self) -> M {
        self.memory
    }

    /// Map `virtual_page` to `physical_page` with a `page_size`-byte page.
    ///
    /// Missing PML4/PDP (and, for 4 KiB pages, PD) links are installed
    /// pointing at the planned tables; existing links are kept, but only
    /// followed if they lead into the planned tables. The leaf is
    /// overwritten unconditionally, so mapping the same page twice keeps the
    /// last target.
    ///
    /// Nothing is written unless the call succeeds.
    ///
    /// # Errors
    /// - [`MapError::InvalidPageSize`] unless `page_size` is 4 KiB or 2 MiB.
    /// - [`MapError::MisalignedLargePage`] for a 2 MiB mapping whose page
    ///   numbers are not multiples of 512.
    /// - [`MapError::UnmappedRegion`] if no planned table covers the page,
    ///   or an existing link on the way points elsewhere.
    pub fn map(
        &mut self,
        virtual_page: VirtualPageNumber,
        physical_page: PhysicalPageNumber,
        page_size: u64,
    ) -> Result<(), MapError> {
        let size = PageSize::from_bytes(page_size)?;
        let path = self.plan_path(virtual_page, physical_page, size)?;
        let ix = path.indices;

        let pml4 = self.geometry.pml4();
        let pdp = self.follow_link(pml4, ix.pml4, path.pdp, path.unmapped)?;
        let pd = self.follow_link(pdp, ix.pdp, path.pd, path.unmapped)?;
        let pt = match size {
            PageSize::Large => None,
            PageSize::Small => Some(self.follow_pt_link(pd, ix.pd, path.unmapped)?),
        };

        self.link(pml4, ix.pml4, pdp);
        self.link(pdp, ix.pdp, pd);
        match pt {
            None => {
                self.memory
                    .table_mut(pd)
                    .set(ix.pd, PageEntry::large_leaf(physical_page));
            }
            Some(pt) => {
                if !is_table_link(self.memory.table(pd).get(ix.pd)) {
                    trace!("Link {pd}[{}] -> {pt}", ix.pd);
                    self.memory
                        .table_mut(pd)
                        .set(ix.pd, PageEntry::table_link(pt.page_number()));
                }
                self.memory
                    .table_mut(pt)
                    .set(ix.pt, PageEntry::small_leaf(physical_page));
            }
        }
        Ok(())
    }

    /// Validate a mapping and pick the tables it will use.
    fn plan_path(
        &self,
        virtual_page: VirtualPageNumber,
        physical_page: PhysicalPageNumber,
        size: PageSize,
    ) -> Result<Path, MapError> {
        if size == PageSize::Large
            && !(virtual_page.is_aligned_to(size) && physical_page.is_aligned_to(size))
        {
            return Err(MapError::MisalignedLargePage {
                virtual_page,
                physical_page,
            });
        }

        let unmapped = MapError::UnmappedRegion { virtual_page, size };
        if virtual_page.as_u64() >= VIRTUAL_PAGE_LIMIT {
            return Err(unmapped);
        }

        let indices = PageIndices::of(virtual_page);
        if size == PageSize::Small && indices.large_page_slot() != 0 {
            return Err(unmapped);
        }

        let pdp = self.geometry.pdp_table(indices.pml4.as_u64()).ok_or(unmapped)?;
        let pd = self.geometry.pd_table(indices.pd_table()).ok_or(unmapped)?;
        Ok(Path {
            indices,
            pdp,
            pd,
            unmapped,
        })
    }

    /// The table `table[index]` leads to: its current target, or `planned`
    /// if the entry is not present. A target outside the planned tables is
    /// refused rather than written through.
    fn follow_link(
        &self,
        table: PhysicalAddress,
        index: TableIndex,
        planned: PhysicalAddress,
        unmapped: MapError,
    ) -> Result<PhysicalAddress, MapError> {
        let entry = self.memory.table(table).get(index);
        if entry.present() {
            self.next_table(entry).ok_or(unmapped)
        } else {
            Ok(planned)
        }
    }

    /// Like [`follow_link`](Self::follow_link) for the PD → PT step. Only a
    /// present link is followed; a large-page leaf will be replaced by a
    /// link to the single PT.
    fn follow_pt_link(
        &self,
        pd: PhysicalAddress,
        index: TableIndex,
        unmapped: MapError,
    ) -> Result<PhysicalAddress, MapError> {
        let e = self.memory.table(pd).get(index);
        if is_table_link(e) {
            self.next_table(e).ok_or(unmapped)
        } else {
            Ok(self.geometry.pt())
        }
    }

    /// Point `table[index]` at `next` unless it is already present.
    fn link(&mut self, table: PhysicalAddress, index: TableIndex, next: PhysicalAddress) {
        let t = self.memory.table_mut(table);
        if !t.get(index).present() {
            trace!("Link {table}[{index}] -> {next}");
            t.set(index, PageEntry::table_link(next.page_number()));
        }
    }

    /// Read back the entries on the path to `virtual_page`.
    ///
    /// The walk stops at the first non-present entry, at a large-page leaf,
    /// and at any link pointing outside the planned tables.
    #[must_use]
    pub fn walk(&self, virtual_page: VirtualPageNumber) -> Walk {
        let indices = PageIndices::of(virtual_page);
        let pml4 = self.memory.table(self.geometry.pml4()).get(indices.pml4);
        let mut walk = Walk {
            indices,
            pml4,
            pdp: None,
            pd: None,
            pt: None,
        };

        let Some(pdp) = self.next_table(pml4) else {
            return walk;
        };
        let pdp_entry = self.memory.table(pdp).get(indices.pdp);
        walk.pdp = Some(pdp_entry);

        let Some(pd) = self.next_table(pdp_entry) else {
            return walk;
        };
        let pd_entry = self.memory.table(pd).get(indices.pd);
        walk.pd = Some(pd_entry);
        if pd_entry.large_page() {
            return walk;
        }

        if let Some(pt) = self.next_table(pd_entry) {
            walk.pt = Some(self.memory.table(pt).get(indices.pt));
        }
        walk
    }

    /// Resolve `virtual_page` to the physical page backing it.
    #[must_use]
    pub fn translate(&self, virtual_page: VirtualPageNumber) -> Option<Translation> {
        let walk = self.walk(virtual_page);
        let (leaf, size) = walk.leaf()?;
        let offset = match size {
            PageSize::Small => 0,
            PageSize::Large => walk.indices.pt.as_u64(),
        };
        Some(Translation {
            physical_page: leaf.physical_page() + offset,
            size,
        })
    }

    fn next_table(&self, entry: PageEntry) -> Option<PhysicalAddress> {
        let next = entry.target()?.base();
        self.geometry.contains(next).then_some(next)
    }
}

const fn is_table_link(entry: PageEntry) -> bool {
    entry.present() && !entry.large_page()
}

/// Tables selected for one mapping.
struct Path {
    indices: PageIndices,
    pdp: PhysicalAddress,
    pd: PhysicalAddress,
    unmapped: MapError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PageTable, SliceMemory, TableLayout, plan};
    use kernel_info::memory::{GIB, MIB};

    const ROOT: PhysicalAddress = PhysicalAddress::new(0x10_0000);
    const SMALL: u64 = PageSize::SMALL_BYTES;
    const LARGE: u64 = PageSize::LARGE_BYTES;

    fn arena(available: u64) -> (Geometry, Vec<PageTable>) {
        let g = plan(available, &TableLayout::at(ROOT)).expect("plan");
        let frames = vec![PageTable::zeroed(); usize::try_from(g.table_count()).unwrap()];
        (g, frames)
    }

    fn vp(n: u64) -> VirtualPageNumber {
        VirtualPageNumber::new(n)
    }

    fn pp(n: u64) -> PhysicalPageNumber {
        PhysicalPageNumber::new(n)
    }

    #[test]
    fn map_small_page_creates_links_and_leaf() {
        let (g, mut frames) = arena(256 * MIB);
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);

        ctx.map(vp(5), pp(0x42), SMALL).expect("map");

        let w = ctx.walk(vp(5));
        assert_eq!(w.pml4, PageEntry::table_link(g.pdp_table(0).unwrap().page_number()));
        assert_eq!(w.pdp, Some(PageEntry::table_link(g.pd_table(0).unwrap().page_number())));
        assert_eq!(w.pd, Some(PageEntry::table_link(g.pt().page_number())));
        assert_eq!(w.pt, Some(PageEntry::small_leaf(pp(0x42))));
        assert_eq!(
            ctx.translate(vp(5)),
            Some(Translation {
                physical_page: pp(0x42),
                size: PageSize::Small
            })
        );
        assert!(ctx.translate(vp(6)).is_none());
    }

    #[test]
    fn remap_keeps_links_and_last_write_wins() {
        let (g, mut frames) = arena(256 * MIB);
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);

        ctx.map(vp(1), pp(1), SMALL).expect("first");
        let before = ctx.walk(vp(1));
        ctx.map(vp(1), pp(2), SMALL).expect("second");
        let after = ctx.walk(vp(1));

        assert_eq!(before.pml4, after.pml4);
        assert_eq!(before.pdp, after.pdp);
        assert_eq!(before.pd, after.pd);
        assert_eq!(after.pt.map(|e| e.physical_page()), Some(pp(2)));

        // Only PML4, PDP[0], PD[0] and PT carry entries.
        let memory = ctx.into_memory();
        let used = memory.frames().iter().filter(|t| !t.is_empty()).count();
        assert_eq!(used, 4);
    }

    #[test]
    fn invalid_page_size_changes_nothing() {
        let (g, mut frames) = arena(256 * MIB);
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);
        ctx.map(vp(1), pp(1), SMALL).expect("map");
        let snapshot = ctx.memory().frames().to_vec();

        for bad in [0, 1, 8192, 1 << 30, u64::MAX] {
            assert_eq!(
                ctx.map(vp(3), pp(3), bad),
                Err(MapError::InvalidPageSize(UnsupportedPageSize(bad)))
            );
        }
        assert_eq!(ctx.memory().frames(), snapshot.as_slice());
    }

    #[test]
    fn small_pages_beyond_first_2mib_are_unmapped_region() {
        let (g, mut frames) = arena(256 * MIB);
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);

        assert_eq!(
            ctx.map(vp(512), pp(512), SMALL),
            Err(MapError::UnmappedRegion {
                virtual_page: vp(512),
                size: PageSize::Small
            })
        );
        assert!(ctx.memory().frames().iter().all(PageTable::is_empty));
    }

    #[test]
    fn pages_beyond_planned_tables_are_unmapped_region() {
        let (g, mut frames) = arena(GIB);
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);

        // Second GiB needs PD[1], which a 1 GiB plan does not have.
        let second_gib = vp(1 << 18);
        assert!(matches!(
            ctx.map(second_gib, second_gib.identity(), LARGE),
            Err(MapError::UnmappedRegion { .. })
        ));
        // Second PML4 slot needs PDP[1].
        assert!(matches!(
            ctx.map(vp(1 << 27), pp(0), LARGE),
            Err(MapError::UnmappedRegion { .. })
        ));
        assert!(matches!(
            ctx.map(vp(1 << 36), pp(0), SMALL),
            Err(MapError::UnmappedRegion { .. })
        ));
        assert!(ctx.memory().frames().iter().all(PageTable::is_empty));
    }

    #[test]
    fn large_page_terminates_at_pd() {
        let (g, mut frames) = arena(3 * GIB);
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);

        let page = vp(2 * 512 * 512 + 3 * 512); // 2 GiB + 6 MiB
        ctx.map(page, page.identity(), LARGE).expect("map");

        let w = ctx.walk(page);
        assert_eq!(w.pdp, Some(PageEntry::table_link(g.pd_table(2).unwrap().page_number())));
        assert_eq!(w.pd, Some(PageEntry::large_leaf(page.identity())));
        assert_eq!(w.pt, None);
        assert_eq!(
            ctx.translate(page + 7),
            Some(Translation {
                physical_page: page.identity() + 7,
                size: PageSize::Large
            })
        );
    }

    #[test]
    fn large_page_must_be_aligned() {
        let (g, mut frames) = arena(256 * MIB);
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);

        assert_eq!(
            ctx.map(vp(513), pp(512), LARGE),
            Err(MapError::MisalignedLargePage {
                virtual_page: vp(513),
                physical_page: pp(512)
            })
        );
        assert!(matches!(
            ctx.map(vp(512), pp(1), LARGE),
            Err(MapError::MisalignedLargePage { .. })
        ));
    }

    #[test]
    fn small_page_replaces_large_leaf_in_first_slot() {
        let (g, mut frames) = arena(256 * MIB);
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);

        ctx.map(vp(0), pp(0), LARGE).expect("large");
        assert_eq!(ctx.translate(vp(9)).map(|t| t.size), Some(PageSize::Large));

        ctx.map(vp(9), pp(9), SMALL).expect("small");
        let w = ctx.walk(vp(9));
        assert_eq!(w.pd, Some(PageEntry::table_link(g.pt().page_number())));
        assert_eq!(ctx.translate(vp(9)).map(|t| t.size), Some(PageSize::Small));
        assert!(ctx.translate(vp(8)).is_none());
    }

    #[test]
    fn stale_link_outside_the_tables_is_not_followed() {
        let (g, mut frames) = arena(256 * MIB);
        // A leftover PML4[0] pointing well past the planned tables.
        let stray = PageEntry::table_link(pp(0x4_0000));
        frames[0].set(TableIndex::new(0), stray);
        let snapshot = frames.clone();
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);

        for (page, size) in [(vp(1), SMALL), (vp(512), LARGE)] {
            assert!(matches!(
                ctx.map(page, page.identity(), size),
                Err(MapError::UnmappedRegion { .. })
            ));
        }
        assert_eq!(ctx.memory().frames(), snapshot.as_slice());
    }

    #[test]
    fn stale_pt_link_outside_the_tables_is_not_followed() {
        let (g, mut frames) = arena(256 * MIB);
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);
        ctx.map(vp(512), pp(512), LARGE).expect("large");
        drop(ctx);

        // PD[0] is the first PD table, planned after the PML4, PT and PDP.
        frames[3].set(TableIndex::new(0), PageEntry::table_link(pp(0x4_0000)));
        let snapshot = frames.clone();
        let mut ctx = PagingContext::new(SliceMemory::new(ROOT, &mut frames), g);

        assert_eq!(
            ctx.map(vp(1), pp(1), SMALL),
            Err(MapError::UnmappedRegion {
                virtual_page: vp(1),
                size: PageSize::Small
            })
        );
        assert_eq!(ctx.memory().frames(), snapshot.as_slice());
        // The large page next to it still resolves through the same PD.
        assert_eq!(ctx.translate(vp(512)).map(|t| t.size), Some(PageSize::Large));
    }
}
