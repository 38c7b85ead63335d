//! # Mapping Policy Driver
//!
//! [`PagingBootstrap`] turns table memory plus a RAM size into a ready
//! [`PagingContext`]: plan, zero, map the low 2 MiB with 4 KiB pages
//! (leaving page 0 unmapped), then optionally the rest of RAM with 2 MiB
//! pages.
//!
//! `bootstrap` consumes the builder; a failed bootstrap leaves nothing to
//! retry with.

use crate::{Geometry, MapError, PagingContext, PlanError, TableLayout, TableMemory, plan};
use kernel_info::memory::{ENTRIES_PER_TABLE, IDENTITY_LOW_BYTES, VIRTUAL_PAGE_LIMIT};
use kernel_memory_addresses::{PageSize, VirtualPageNumber};
use log::{debug, info, warn};

/// How much of RAM the bootstrap maps.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MappingPolicy {
    /// Pages 1..512 only (4 KiB..2 MiB).
    LowMemoryOnly,

    /// Pages 1..512, then 2 MiB pages from 2 MiB up to the available memory
    /// rounded down to a 2 MiB multiple. A sub-2 MiB tail stays unmapped.
    #[default]
    LargePageRemainder,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Map(#[from] MapError),
}

/// Builder for the boot-time identity mapping.
///
/// ```rust
/// # use kernel_memory_addresses::{PhysicalAddress, VirtualPageNumber};
/// # use kernel_vmem::{MappingPolicy, PageTable, PagingBootstrap, SliceMemory, TableLayout};
/// let root = PhysicalAddress::new(0x1000);
/// let mut frames = vec![PageTable::zeroed(); 8];
/// let ctx = PagingBootstrap::new(SliceMemory::new(root, &mut frames))
///     .with_layout(TableLayout::at(root))
///     .with_policy(MappingPolicy::LowMemoryOnly)
///     .bootstrap(16 << 20)
///     .unwrap();
///
/// assert_eq!(ctx.root(), root);
/// assert!(ctx.translate(VirtualPageNumber::new(0)).is_none());
/// assert!(ctx.translate(VirtualPageNumber::new(1)).is_some());
/// ```
#[derive(Debug)]
pub struct PagingBootstrap<M> {
    memory: M,
    layout: TableLayout,
    policy: MappingPolicy,
}

impl<M: TableMemory> PagingBootstrap<M> {
    /// Bootstrap into `memory` at [`TableLayout::DEFAULT`] with the default policy.
    #[must_use]
    pub const fn new(memory: M) -> Self {
        Self {
            memory,
            layout: TableLayout::DEFAULT,
            policy: MappingPolicy::LargePageRemainder,
        }
    }

    #[must_use]
    pub fn with_layout(self, layout: TableLayout) -> Self {
        Self { layout, ..self }
    }

    #[must_use]
    pub fn with_policy(self, policy: MappingPolicy) -> Self {
        Self { policy, ..self }
    }

    /// Build the hierarchy for `available_memory` bytes of RAM.
    ///
    /// The geometry is planned before any table is touched, so a
    /// [`PlanError`] leaves memory exactly as it was.
    ///
    /// # Errors
    /// - [`BootstrapError::Plan`] if less than 2 MiB is available, or the
    ///   tables would cross the layout limit.
    /// - [`BootstrapError::Map`] if a mapping falls outside the plan; this
    ///   indicates a layout inconsistency.
    pub fn bootstrap(self, available_memory: u64) -> Result<PagingContext<M>, BootstrapError> {
        let Self {
            mut memory,
            layout,
            policy,
        } = self;

        let geometry = plan(available_memory, &layout)?;
        zero_tables(&mut memory, &geometry);

        let mut context = PagingContext::new(memory, geometry);
        map_low_memory(&mut context)?;
        if policy == MappingPolicy::LargePageRemainder {
            map_large_remainder(&mut context)?;
        }

        info!("Page tables ready, root at {}", context.root());
        Ok(context)
    }
}

/// Zero every planned table, and nothing else.
fn zero_tables<M: TableMemory>(memory: &mut M, geometry: &Geometry) {
    for region in geometry.regions() {
        debug!(
            "Zeroing {} {} table(s) at {}",
            region.count, region.kind, region.base
        );
        for i in 0..region.count {
            memory.zero(region.base.add_pages(i));
        }
    }
}

/// Identity-map pages 1..512 with 4 KiB pages. Page 0 stays unmapped.
fn map_low_memory<M: TableMemory>(context: &mut PagingContext<M>) -> Result<(), MapError> {
    for n in 1..ENTRIES_PER_TABLE {
        let page = VirtualPageNumber::new(n);
        context.map(page, page.identity(), PageSize::SMALL_BYTES)?;
    }
    info!(
        "Identity-mapped {:#x}..{:#x} with 4K pages",
        PageSize::SMALL_BYTES,
        IDENTITY_LOW_BYTES
    );
    Ok(())
}

/// Number of 2 MiB pages covering `available` bytes, rounded down and capped
/// at what a 48-bit virtual address space holds.
const fn large_page_slots(available: u64) -> u64 {
    let slots = available / PageSize::LARGE_BYTES;
    let max = VIRTUAL_PAGE_LIMIT / PageSize::Large.small_pages();
    if slots > max { max } else { slots }
}

/// Identity-map `[2 MiB, available rounded down to 2 MiB)` with 2 MiB pages.
///
/// RAM beyond 256 TiB has no virtual address to be identity-mapped at and is
/// left out.
fn map_large_remainder<M: TableMemory>(context: &mut PagingContext<M>) -> Result<(), MapError> {
    let available = context.geometry().available_memory();
    let slots = large_page_slots(available);
    let step = PageSize::Large.small_pages();
    if slots < available / PageSize::LARGE_BYTES {
        warn!("Only the first {:#x} bytes of RAM are addressable", slots * PageSize::LARGE_BYTES);
    }

    for slot in 1..slots {
        let page = VirtualPageNumber::new(slot * step);
        context.map(page, page.identity(), PageSize::LARGE_BYTES)?;
    }

    let end = slots * PageSize::LARGE_BYTES;
    if slots > 1 {
        info!("Identity-mapped {IDENTITY_LOW_BYTES:#x}..{end:#x} with 2M pages");
    }
    if end < available {
        debug!("Leaving {:#x} trailing bytes unmapped", available - end);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PageEntry, PageTable, SliceMemory};
    use kernel_info::memory::{GIB, MIB};
    use kernel_memory_addresses::{PhysicalAddress, PhysicalPageNumber};

    const ROOT: PhysicalAddress = PhysicalAddress::new(0x1000);

    fn frames_for(available: u64) -> Vec<PageTable> {
        let g = plan(available, &TableLayout::at(ROOT)).expect("plan");
        vec![PageTable::zeroed(); usize::try_from(g.table_count()).unwrap()]
    }

    fn garbage() -> PageTable {
        let mut t = PageTable::zeroed();
        for i in 0..512 {
            t.set(
                crate::index::TableIndex::new(i),
                PageEntry::from_bits(0xDEAD_BEEF_0000_0FFF),
            );
        }
        t
    }

    fn bootstrap(
        frames: &mut [PageTable],
        available: u64,
        policy: MappingPolicy,
    ) -> Result<PagingContext<SliceMemory<'_>>, BootstrapError> {
        PagingBootstrap::new(SliceMemory::new(ROOT, frames))
            .with_layout(TableLayout::at(ROOT))
            .with_policy(policy)
            .bootstrap(available)
    }

    #[test]
    fn low_memory_is_identity_mapped_except_page_zero() {
        let mut frames = frames_for(256 * MIB);
        let ctx =
            bootstrap(&mut frames, 256 * MIB, MappingPolicy::LowMemoryOnly).expect("bootstrap");

        assert_eq!(ctx.geometry().pdp_count(), 1);
        assert_eq!(ctx.geometry().pd_count(), 1);
        for n in 1..512 {
            let t = ctx.translate(VirtualPageNumber::new(n)).expect("present");
            assert_eq!(t.physical_page, PhysicalPageNumber::new(n));
            assert_eq!(t.size, PageSize::Small);
        }
        assert!(!ctx.walk(VirtualPageNumber::new(0)).is_present());
        assert!(!ctx.walk(VirtualPageNumber::new(512)).is_present());
    }

    #[test]
    fn zeroing_covers_planned_tables_only() {
        let available = 256 * MIB;
        // Two extra frames past the planned tables.
        let mut frames = vec![garbage(); frames_for(available).len() + 2];
        let ctx =
            bootstrap(&mut frames, available, MappingPolicy::LowMemoryOnly).expect("bootstrap");
        let used = usize::try_from(ctx.geometry().table_count()).unwrap();
        drop(ctx);

        let pml4 = &frames[0];
        assert_eq!(pml4.present().count(), 1);
        let pt = &frames[1];
        assert_eq!(pt.present().count(), 511);
        assert!(frames[used..].iter().all(|t| *t == garbage()));
    }

    #[test]
    fn insufficient_memory_touches_nothing() {
        let mut frames = vec![garbage(); 8];
        let result = bootstrap(&mut frames, MIB, MappingPolicy::LargePageRemainder);
        assert_eq!(
            result.map(|_| ()),
            Err(BootstrapError::Plan(PlanError::InsufficientMemory {
                available: MIB
            }))
        );
        assert!(frames.iter().all(|t| *t == garbage()));
    }

    #[test]
    fn remainder_is_mapped_with_large_pages() {
        let available = 9 * MIB;
        let mut frames = frames_for(available);
        let ctx = bootstrap(&mut frames, available, MappingPolicy::LargePageRemainder)
            .expect("bootstrap");

        for slot in [1, 2, 3] {
            let page = VirtualPageNumber::new(slot * 512);
            let (leaf, size) = ctx.walk(page).leaf().expect("mapped");
            assert_eq!(size, PageSize::Large);
            assert_eq!(leaf.physical_page(), page.identity());
        }
        // 8..9 MiB is a partial 2 MiB page.
        assert!(ctx.translate(VirtualPageNumber::new(4 * 512)).is_none());
        // Low memory is still 4 KiB pages.
        assert_eq!(
            ctx.translate(VirtualPageNumber::new(7)).map(|t| t.size),
            Some(PageSize::Small)
        );
    }

    #[test]
    fn remainder_spans_several_pd_tables() {
        let available = 3 * GIB;
        let mut frames = frames_for(available);
        let ctx = bootstrap(&mut frames, available, MappingPolicy::LargePageRemainder)
            .expect("bootstrap");
        let g = *ctx.geometry();

        let last = VirtualPageNumber::new(3 * 512 * 512 - 512);
        let w = ctx.walk(last);
        assert_eq!(
            w.pdp,
            Some(PageEntry::table_link(g.pd_table(2).unwrap().page_number()))
        );
        assert_eq!(w.pd, Some(PageEntry::large_leaf(last.identity())));
        assert!(ctx.translate(VirtualPageNumber::new(3 * 512 * 512)).is_none());

        drop(ctx);
        let pdp = &frames[2];
        assert_eq!(pdp.present().count(), 3);
    }

    #[test]
    fn large_page_slots_stop_at_the_virtual_address_space() {
        let tib = 1024 * GIB;
        assert_eq!(large_page_slots(9 * MIB), 4);
        assert_eq!(large_page_slots(3 * GIB), 3 * 512);
        assert_eq!(large_page_slots(256 * tib - 1), (1 << 27) - 1);
        assert_eq!(large_page_slots(256 * tib), 1 << 27);
        assert_eq!(large_page_slots(300 * tib), 1 << 27);
        assert_eq!(large_page_slots(u64::MAX), 1 << 27);

        // The last slot is still mappable; the one after it is not.
        let last = VirtualPageNumber::new(((1 << 27) - 1) * 512);
        assert!(last.as_u64() < VIRTUAL_PAGE_LIMIT);
        assert_eq!(last.as_u64() + 512, VIRTUAL_PAGE_LIMIT);
    }
}
