//! # Boot-Time Page Tables
//!
//! Builds the x86-64 four-level page-table hierarchy a kernel needs to run
//! in long mode, before any allocator exists.
//!
//! ## What you get
//! - A bit-exact [`PageEntry`] and a 4 KiB-aligned [`PageTable`].
//! - [`PageIndices`] to split a virtual page number into its four table indices.
//! - The planner, [`plan`], which sizes and places every table up front.
//! - The mapper, [`PagingContext::map`], which links the planned tables lazily.
//! - The driver, [`PagingBootstrap`], which zeroes and fills the hierarchy.
//! - [`TableMemory`] to reach table frames, either [`IdentityMapped`] at boot
//!   or [`SliceMemory`] in tests.
//!
//! ## Virtual Page → Physical Page Walk
//!
//! Page numbers count 4 KiB pages, so the usual address bit positions
//! (39, 30, 21, 12) become shifts of 27, 18, 9 and 0:
//!
//! ```text
//! | 35‒27 | 26‒18 | 17‒9 | 8‒0 |   (bits of the virtual page number)
//! |  PML4 |  PDP  |  PD  |  PT |
//! ```
//!
//! ```text
//!  PML4  →  PDP  →  PD  →  PT  →  4 KiB page
//!                   │
//!                   └──── PS=1 → 2 MiB page
//! ```
//!
//! ## Layout
//!
//! All tables are planned in one contiguous run (see [`Geometry`]). There is
//! exactly one PT, and it backs only the first 2 MiB; everything above is
//! mapped with 2 MiB pages directly from the PD tables.
//!
//! ## Example
//!
//! ```rust
//! # use kernel_memory_addresses::{PhysicalAddress, PhysicalPageNumber, VirtualPageNumber};
//! # use kernel_vmem::*;
//! let root = PhysicalAddress::new(0x4000);
//! let geometry = plan(64 << 20, &TableLayout::at(root)).unwrap();
//! let mut frames = vec![PageTable::zeroed(); geometry.table_count() as usize];
//!
//! let mut ctx = PagingContext::new(SliceMemory::new(root, &mut frames), geometry);
//! ctx.map(VirtualPageNumber::new(3), PhysicalPageNumber::new(3), 4096).unwrap();
//! assert!(ctx.walk(VirtualPageNumber::new(3)).is_present());
//! assert!(matches!(
//!     ctx.map(VirtualPageNumber::new(3), PhysicalPageNumber::new(3), 8192),
//!     Err(MapError::InvalidPageSize(_))
//! ));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod bootstrap;
mod context;
mod entry;
mod geometry;
mod index;
mod memory;
mod table;

pub use crate::bootstrap::{BootstrapError, MappingPolicy, PagingBootstrap};
pub use crate::context::{MapError, PagingContext, Translation, Walk};
pub use crate::entry::PageEntry;
pub use crate::geometry::{Geometry, PlanError, TableLayout, TableRegion, plan};
pub use crate::index::{PageIndices, TableIndex};
pub use crate::memory::{IdentityMapped, SliceMemory, TableMemory};
pub use crate::table::{PageTable, TableKind};
