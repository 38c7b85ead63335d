use core::fmt;

/// The two mapping granularities the bootstrap supports.
///
/// - [`Small`](Self::Small): 4 KiB, mapped by a bottom-level (PT) entry.
/// - [`Large`](Self::Large): 2 MiB, mapped by a third-level (PD) entry with the
///   page-size bit set; no bottom-level table is involved.
///
/// The 1 GiB size the hardware also offers is deliberately not modelled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PageSize {
    /// 4 KiB page (4096 bytes).
    Small,
    /// 2 MiB page (`2_097_152` bytes).
    Large,
}

/// A page size in bytes that is neither 4 KiB nor 2 MiB.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unsupported page size of {0:#x} bytes")]
pub struct UnsupportedPageSize(pub u64);

impl PageSize {
    /// log2 of the small page size; the granularity of all page numbers.
    pub const SMALL_SHIFT: u32 = 12;

    /// Small page size in bytes.
    pub const SMALL_BYTES: u64 = 1 << Self::SMALL_SHIFT;

    /// log2 of the large page size.
    pub const LARGE_SHIFT: u32 = 21;

    /// Large page size in bytes.
    pub const LARGE_BYTES: u64 = 1 << Self::LARGE_SHIFT;

    /// Page size in bytes.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Small => Self::SMALL_BYTES,
            Self::Large => Self::LARGE_BYTES,
        }
    }

    /// log2 of the page size.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Small => Self::SMALL_SHIFT,
            Self::Large => Self::LARGE_SHIFT,
        }
    }

    /// Number of small pages covered by one page of this size (1 or 512).
    #[inline]
    #[must_use]
    pub const fn small_pages(self) -> u64 {
        1 << (self.shift() - Self::SMALL_SHIFT)
    }

    /// Resolve a byte count into a supported page size.
    ///
    /// # Errors
    /// Returns [`UnsupportedPageSize`] for anything but 4 KiB or 2 MiB.
    #[inline]
    pub const fn from_bytes(bytes: u64) -> Result<Self, UnsupportedPageSize> {
        match bytes {
            Self::SMALL_BYTES => Ok(Self::Small),
            Self::LARGE_BYTES => Ok(Self::Large),
            other => Err(UnsupportedPageSize(other)),
        }
    }
}

impl TryFrom<u64> for PageSize {
    type Error = UnsupportedPageSize;

    #[inline]
    fn try_from(bytes: u64) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl From<PageSize> for u64 {
    #[inline]
    fn from(value: PageSize) -> Self {
        value.bytes()
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Small => f.write_str("4K"),
            Self::Large => f.write_str("2M"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_round_trip_through_bytes() {
        assert_eq!(PageSize::try_from(4096), Ok(PageSize::Small));
        assert_eq!(PageSize::try_from(2 * 1024 * 1024), Ok(PageSize::Large));
        assert_eq!(u64::from(PageSize::Large), 0x20_0000);
    }

    #[test]
    fn other_sizes_are_rejected() {
        for bytes in [0, 1, 2048, 8192, 1024 * 1024, 1024 * 1024 * 1024] {
            assert_eq!(PageSize::try_from(bytes), Err(UnsupportedPageSize(bytes)));
        }
    }

    #[test]
    fn large_page_spans_a_full_table() {
        assert_eq!(PageSize::Small.small_pages(), 1);
        assert_eq!(PageSize::Large.small_pages(), 512);
    }
}
