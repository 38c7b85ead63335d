use crate::{PageSize, PhysicalPageNumber};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Physical memory address.
///
/// Carries intent: the paging structures are located by physical address
/// before paging is on, and entries store them as [`PhysicalPageNumber`]s.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x3000);
/// assert!(pa.is_aligned_to(PageSize::Small));
/// assert_eq!(pa.page_number().as_u64(), 3);
/// assert_eq!((pa + 0x1000).as_u64(), 0x4000);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The small-page number containing this address (low 12 bits dropped).
    #[inline]
    #[must_use]
    pub const fn page_number(self) -> PhysicalPageNumber {
        PhysicalPageNumber::new(self.0 >> PageSize::SMALL_SHIFT)
    }

    /// Whether the address is a multiple of `size`.
    #[inline]
    #[must_use]
    pub const fn is_aligned_to(self, size: PageSize) -> bool {
        self.0 & (size.bytes() - 1) == 0
    }

    /// Address `pages` small pages further up.
    #[inline]
    #[must_use]
    pub const fn add_pages(self, pages: u64) -> Self {
        Self(self.0 + pages * PageSize::SMALL_BYTES)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PhysicalPageNumber> for PhysicalAddress {
    #[inline]
    fn from(value: PhysicalPageNumber) -> Self {
        value.base()
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
