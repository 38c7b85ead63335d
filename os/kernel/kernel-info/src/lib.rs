//! # Paging Bootstrap Configuration and Boot Interface
//!
//! Shared constants and hand-off records used by every crate of the early
//! boot path. This is the single source of truth for the physical layout
//! of the paging structures; the values are `const` and cross-checked at
//! compile time.
//!
//! ## Modules
//!
//! ### Boot Records ([`boot`])
//! What the boot loader tells us about physical memory: either a memory
//! map of `{base, length, type}` ranges, or the coarse lower/upper pair.
//!
//! ### Memory Layout ([`memory`])
//! Where the page tables live and how a virtual page number is carved
//! into table indices:
//!
//! ```text
//! virtual page number (36 significant bits)
//! | 35‒27 | 26‒18 | 17‒9 | 8‒0 |
//! |  PML4 |  PDP  |  PD  |  PT |
//! ```
//!
//! ```rust
//! use kernel_info::memory::{INDEX_MASK, PD_INDEX_SHIFT};
//!
//! // Virtual page 512 is the first page of the second PD entry.
//! assert_eq!((512 >> PD_INDEX_SHIFT) & INDEX_MASK, 1);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
