//! # Physical Memory Extent
//!
//! Turns whatever the boot loader reported about physical memory into one
//! number: the highest usable byte address plus one. Everything about the
//! page-table layout is derived from it.
//!
//! Two sources are understood, in order of preference:
//!
//! 1. A **memory map** of `{base, length, type}` ranges, either already
//!    decoded ([`MemoryMap::Regions`]) or as the boot loader's raw record
//!    buffer ([`MemoryMap::Multiboot`]).
//! 2. The **coarse pair** of lower/upper memory sizes in KiB.
//!
//! ```rust
//! use kernel_info::boot::BasicMemoryInfo;
//! use kernel_mmap::{BootMemoryInfo, resolve_extent};
//!
//! let info = BootMemoryInfo::basic(BasicMemoryInfo { lower_kb: 640, upper_kb: 64512 });
//! let extent = resolve_extent(&info).unwrap();
//! assert_eq!(extent.bytes(), 64512 * 1024 + 1024 * 1024);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod extent;
mod multiboot;

pub use crate::extent::{
    BootMemoryInfo, ExtentError, MemoryExtent, MemoryMap, resolve_extent, usable_end_at,
};
pub use crate::multiboot::MultibootMemoryMap;
