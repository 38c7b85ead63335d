use crate::{PageSize, PhysicalAddress};
use core::fmt;
use core::ops::Add;

/// Width of the base-address field in a page-table entry.
const PAGE_NUMBER_BITS: u32 = 40;

/// Physical page number: a physical address right-shifted by
/// [`PageSize::SMALL_SHIFT`].
///
/// This is the unit stored in a page-table entry's base-address field, both
/// for links to the next table and for mapped pages.
///
/// ### Invariants
/// - Fits in 40 bits (checked in debug builds), the width of the entry field.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPageNumber(u64);

/// Virtual page number: a virtual address right-shifted by
/// [`PageSize::SMALL_SHIFT`].
///
/// The four 9-bit table indices are carved out of this value, so only the
/// low 36 bits take part in translation.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPageNumber(u64);

impl PhysicalPageNumber {
    #[inline]
    #[must_use]
    pub const fn new(n: u64) -> Self {
        debug_assert!(n < 1 << PAGE_NUMBER_BITS);
        Self(n)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// First byte of the page.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << PageSize::SMALL_SHIFT)
    }

    /// Whether this page starts on a `size` boundary.
    #[inline]
    #[must_use]
    pub const fn is_aligned_to(self, size: PageSize) -> bool {
        self.0 & (size.small_pages() - 1) == 0
    }
}

impl VirtualPageNumber {
    #[inline]
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this page starts on a `size` boundary.
    #[inline]
    #[must_use]
    pub const fn is_aligned_to(self, size: PageSize) -> bool {
        self.0 & (size.small_pages() - 1) == 0
    }

    /// The physical page with the same number (identity mapping).
    #[inline]
    #[must_use]
    pub const fn identity(self) -> PhysicalPageNumber {
        PhysicalPageNumber::new(self.0)
    }
}

impl Add<u64> for PhysicalPageNumber {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self::new(self.0 + rhs)
    }
}

impl Add<u64> for VirtualPageNumber {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self::new(self.0 + rhs)
    }
}

impl fmt::Debug for PhysicalPageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PPN({:#x})", self.0)
    }
}

impl fmt::Display for PhysicalPageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for VirtualPageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VPN({:#x})", self.0)
    }
}

impl fmt::Display for VirtualPageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for VirtualPageNumber {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<u64> for PhysicalPageNumber {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_number_and_base_agree() {
        let pp = PhysicalPageNumber::new(0x1ff);
        assert_eq!(pp.base().as_u64(), 0x1f_f000);
        assert_eq!(pp.base().page_number(), pp);
    }

    #[test]
    fn large_alignment_is_in_small_pages() {
        assert!(VirtualPageNumber::new(0).is_aligned_to(PageSize::Large));
        assert!(VirtualPageNumber::new(512).is_aligned_to(PageSize::Large));
        assert!(!VirtualPageNumber::new(513).is_aligned_to(PageSize::Large));
        assert!(VirtualPageNumber::new(513).is_aligned_to(PageSize::Small));
        assert!(PhysicalPageNumber::new(1024).is_aligned_to(PageSize::Large));
    }

    #[test]
    fn identity_keeps_the_number() {
        assert_eq!(VirtualPageNumber::new(42).identity(), PhysicalPageNumber::new(42));
    }
}
