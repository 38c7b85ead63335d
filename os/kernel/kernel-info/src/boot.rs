//! # Boot Memory Records
//!
//! The pieces of the boot loader's hand-off that the paging bootstrap
//! consumes. Everything else in the hand-off (command line, modules, ...) is
//! of no concern here.

/// Magic value a Multiboot-compliant boot loader leaves in `EAX`.
pub const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

/// Usability of a physical memory range, as reported by the boot loader.
///
/// The numeric codes are the Multiboot memory map `type` values.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemoryKind {
    /// Usable RAM (`1`).
    Ram,
    /// Reserved, unusable (`2`).
    Reserved,
    /// Holds ACPI tables; reclaimable after parsing (`3`).
    AcpiReclaimable,
    /// Must be preserved across hibernation (`4`).
    AcpiNvs,
    /// Defective RAM (`5`).
    BadRam,
    /// Any other code; treated as reserved.
    Unknown(u32),
}

impl MemoryKind {
    /// Decode a Multiboot memory map type code.
    #[must_use]
    pub const fn from_multiboot(code: u32) -> Self {
        match code {
            1 => Self::Ram,
            2 => Self::Reserved,
            3 => Self::AcpiReclaimable,
            4 => Self::AcpiNvs,
            5 => Self::BadRam,
            other => Self::Unknown(other),
        }
    }

    /// Only plain RAM counts towards the memory extent.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Ram)
    }
}

/// One physical memory range from the boot loader's memory map.
///
/// Ranges are neither sorted nor guaranteed to be disjoint.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    /// First byte of the range.
    pub base: u64,
    /// Length of the range in bytes.
    pub length: u64,
    /// What the range may be used for.
    pub kind: MemoryKind,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: MemoryKind) -> Self {
        Self { base, length, kind }
    }

    /// One past the last byte (saturating).
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }
}

/// The coarse memory information every Multiboot loader can provide.
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BasicMemoryInfo {
    /// Conventional memory below 1 MiB, in KiB.
    pub lower_kb: u32,
    /// Contiguous memory starting at 1 MiB, in KiB.
    pub upper_kb: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiboot_codes_decode() {
        assert_eq!(MemoryKind::from_multiboot(1), MemoryKind::Ram);
        assert_eq!(MemoryKind::from_multiboot(5), MemoryKind::BadRam);
        assert_eq!(MemoryKind::from_multiboot(17), MemoryKind::Unknown(17));
        assert!(MemoryKind::Ram.is_usable());
        assert!(!MemoryKind::AcpiReclaimable.is_usable());
    }

    #[test]
    fn region_end_saturates() {
        let r = MemoryRegion::new(u64::MAX - 10, 100, MemoryKind::Ram);
        assert_eq!(r.end(), u64::MAX);
    }
}
