use crate::MultibootMemoryMap;
use core::fmt;
use kernel_info::boot::{BasicMemoryInfo, MemoryRegion};
use kernel_info::memory::{EXTENDED_MEMORY_BASE, KIB};
use log::{debug, info};

/// A memory map as handed over by the boot loader.
#[derive(Clone)]
pub enum MemoryMap<'a> {
    /// Ranges that were already decoded.
    Regions(&'a [MemoryRegion]),
    /// The loader's raw record buffer; see [`MultibootMemoryMap`].
    Multiboot(&'a [u8]),
}

impl MemoryMap<'_> {
    /// Visit every range of the map, in buffer order.
    pub fn for_each_region(&self, mut f: impl FnMut(MemoryRegion)) {
        match self {
            Self::Regions(regions) => regions.iter().copied().for_each(&mut f),
            Self::Multiboot(bytes) => MultibootMemoryMap::new(bytes).for_each(&mut f),
        }
    }
}

/// The memory information the boot loader chose to provide.
///
/// Both parts are optional; a loader may supply either, both, or (in which
/// case booting cannot continue) neither.
#[derive(Clone, Default)]
pub struct BootMemoryInfo<'a> {
    /// The detailed memory map, if the loader provided one.
    pub memory_map: Option<MemoryMap<'a>>,
    /// The coarse lower/upper pair, if the loader provided it.
    pub basic: Option<BasicMemoryInfo>,
}

impl<'a> BootMemoryInfo<'a> {
    /// Only a memory map is available.
    #[must_use]
    pub const fn with_map(map: MemoryMap<'a>) -> Self {
        Self {
            memory_map: Some(map),
            basic: None,
        }
    }

    /// Only the coarse pair is available.
    #[must_use]
    pub const fn basic(basic: BasicMemoryInfo) -> Self {
        Self {
            memory_map: None,
            basic: Some(basic),
        }
    }
}

/// Highest usable physical byte address plus one.
///
/// Computed once, early, and never changed afterwards.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct MemoryExtent(u64);

impl MemoryExtent {
    #[must_use]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MemoryExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} ({} KiB)", self.0, self.0 / KIB)
    }
}

/// Failure to size physical memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtentError {
    /// The loader supplied neither a memory map nor the coarse pair.
    #[error("the boot loader provided no memory information")]
    NoMemoryInfo,
}

/// Reduce the boot loader's memory information to a [`MemoryExtent`].
///
/// - With a memory map: the maximum `base + length` over all RAM ranges.
///   Ranges may come in any order and may overlap.
/// - With only the coarse pair: `upper_kb * 1024 + 1 MiB`.
///
/// A memory map takes precedence when both are present.
///
/// # Errors
/// [`ExtentError::NoMemoryInfo`] if neither source is present.
pub fn resolve_extent(info: &BootMemoryInfo<'_>) -> Result<MemoryExtent, ExtentError> {
    let extent = if let Some(map) = &info.memory_map {
        let mut highest = 0u64;
        map.for_each_region(|region| {
            debug!(
                "Memory region {:#018x}+{:#x}: {:?}",
                region.base, region.length, region.kind
            );
            if region.kind.is_usable() {
                highest = highest.max(region.end());
            }
        });
        MemoryExtent::new(highest)
    } else if let Some(basic) = info.basic {
        MemoryExtent::new(u64::from(basic.upper_kb) * KIB + EXTENDED_MEMORY_BASE)
    } else {
        return Err(ExtentError::NoMemoryInfo);
    };

    info!("Available memory: {extent}");
    Ok(extent)
}

/// End of the usable memory that contains `addr`.
///
/// - With a memory map: the furthest `base + length` of any RAM range
///   covering `addr`.
/// - With only the coarse pair: the top of lower memory, `lower_kb * 1024`.
///
/// `None` if `addr` is not known to be usable RAM.
#[must_use]
pub fn usable_end_at(info: &BootMemoryInfo<'_>, addr: u64) -> Option<u64> {
    if let Some(map) = &info.memory_map {
        let mut end = None;
        map.for_each_region(|region| {
            if region.kind.is_usable() && region.base <= addr && addr < region.end() {
                end = end.max(Some(region.end()));
            }
        });
        end
    } else {
        let lower = u64::from(info.basic?.lower_kb) * KIB;
        (addr < lower).then_some(lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::boot::MemoryKind;
    use kernel_info::memory::{GIB, MIB};

    #[test]
    fn coarse_pair_adds_extended_base() {
        let info = BootMemoryInfo::basic(BasicMemoryInfo {
            lower_kb: 640,
            upper_kb: 64512,
        });
        let extent = resolve_extent(&info).expect("extent");
        assert_eq!(extent.bytes(), 64512 * 1024 + MIB);
    }

    #[test]
    fn map_takes_highest_ram_end_regardless_of_order() {
        let regions = [
            MemoryRegion::new(0x10_0000, 255 * MIB, MemoryKind::Ram),
            MemoryRegion::new(0, 0x9_FC00, MemoryKind::Ram),
            MemoryRegion::new(0x10_0000, 100 * MIB, MemoryKind::Ram),
        ];
        let info = BootMemoryInfo::with_map(MemoryMap::Regions(&regions));
        assert_eq!(
            resolve_extent(&info).expect("extent").bytes(),
            0x10_0000 + 255 * MIB
        );
    }

    #[test]
    fn non_ram_ranges_are_ignored() {
        let regions = [
            MemoryRegion::new(0, 512 * MIB, MemoryKind::Ram),
            MemoryRegion::new(0xFEC0_0000, 0x1000, MemoryKind::Reserved),
            MemoryRegion::new(4 * GIB, GIB, MemoryKind::BadRam),
            MemoryRegion::new(8 * GIB, GIB, MemoryKind::AcpiNvs),
        ];
        let info = BootMemoryInfo::with_map(MemoryMap::Regions(&regions));
        assert_eq!(resolve_extent(&info).expect("extent").bytes(), 512 * MIB);
    }

    #[test]
    fn map_wins_over_coarse_pair() {
        let regions = [MemoryRegion::new(0, 3 * GIB, MemoryKind::Ram)];
        let info = BootMemoryInfo {
            memory_map: Some(MemoryMap::Regions(&regions)),
            basic: Some(BasicMemoryInfo {
                lower_kb: 640,
                upper_kb: 1024,
            }),
        };
        assert_eq!(resolve_extent(&info).expect("extent").bytes(), 3 * GIB);
    }

    #[test]
    fn map_without_ram_resolves_to_zero() {
        let regions = [MemoryRegion::new(0, MIB, MemoryKind::Reserved)];
        let info = BootMemoryInfo::with_map(MemoryMap::Regions(&regions));
        assert_eq!(resolve_extent(&info), Ok(MemoryExtent::new(0)));
    }

    #[test]
    fn usable_end_follows_the_range_holding_the_address() {
        let regions = [
            MemoryRegion::new(0x10_0000, 255 * MIB, MemoryKind::Ram),
            MemoryRegion::new(0, 0x9_FC00, MemoryKind::Ram),
            MemoryRegion::new(0x9_FC00, 0x400, MemoryKind::Reserved),
        ];
        let info = BootMemoryInfo::with_map(MemoryMap::Regions(&regions));
        assert_eq!(usable_end_at(&info, 0x1000), Some(0x9_FC00));
        assert_eq!(usable_end_at(&info, 0x20_0000), Some(0x10_0000 + 255 * MIB));
        assert_eq!(usable_end_at(&info, 0x9_FC00), None);
        assert_eq!(usable_end_at(&info, 0xA_0000), None);
    }

    #[test]
    fn usable_end_from_coarse_pair_is_top_of_lower_memory() {
        let info = BootMemoryInfo::basic(BasicMemoryInfo {
            lower_kb: 639,
            upper_kb: 64512,
        });
        assert_eq!(usable_end_at(&info, 0x1000), Some(639 * KIB));
        assert_eq!(usable_end_at(&info, 639 * KIB), None);
        assert_eq!(usable_end_at(&BootMemoryInfo::default(), 0x1000), None);
    }

    #[test]
    fn nothing_provided_is_an_error() {
        let info = BootMemoryInfo::default();
        assert_eq!(resolve_extent(&info), Err(ExtentError::NoMemoryInfo));
    }
}
