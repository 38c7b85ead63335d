//! # Physical Addresses, Page Numbers and Page Sizes
//!
//! Strongly typed wrappers for the raw `u64` quantities the paging bootstrap
//! juggles. Mixing them up (a byte address where a page number is expected,
//! a virtual page where a physical one belongs) produces a page table that
//! looks valid and maps the wrong memory, so each gets its own type.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A physical byte address. |
//! | [`PhysicalPageNumber`] | A physical address shifted right by the small-page shift. |
//! | [`VirtualPageNumber`] | A virtual address shifted right by the small-page shift. |
//! | [`PageSize`] | One of the two supported mapping granularities (4 KiB / 2 MiB). |
//!
//! Page numbers are always counted in **small** (4 KiB) pages, regardless of
//! the size of the page being mapped. A 2 MiB page starting at physical
//! address `0x20_0000` therefore has page number `512`.
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x20_0000);
//! let pp = pa.page_number();
//! assert_eq!(pp.as_u64(), 512);
//! assert_eq!(pp.base(), pa);
//! assert!(pp.is_aligned_to(PageSize::Large));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_number;
mod page_size;
mod physical_address;

pub use crate::page_number::{PhysicalPageNumber, VirtualPageNumber};
pub use crate::page_size::{PageSize, UnsupportedPageSize};
pub use crate::physical_address::PhysicalAddress;
