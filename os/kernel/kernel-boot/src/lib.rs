//! # Boot-Time Paging Setup
//!
//! Glues the pieces together for the trip into long mode:
//!
//! 1. Check the CPU can run 64-bit code and the boot loader's magic.
//! 2. Resolve the physical memory extent from the boot loader's report.
//! 3. Plan the page tables, bounded by the RAM range they start in.
//! 4. Zero and fill them.
//! 5. Hand back the `CR3` value for the mode-switch code to load.
//!
//! [`boot_paging`] does all of that against any [`TableMemory`] and
//! [`CpuCapabilities`] and reports failures as [`BootError`] values.
//! [`setup_paging`] is the real-hardware entry: it installs the QEMU
//! logger, runs [`boot_paging`] on identity-mapped memory, and halts on any
//! error through [`halt_on_error`].
//!
//! [`TableMemory`]: kernel_vmem::TableMemory
//! [`CpuCapabilities`]: kernel_registers::CpuCapabilities

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod fatal;
mod paging;

pub use crate::fatal::halt_on_error;
pub use crate::paging::{BootError, PagingHandoff, boot_paging, setup_paging};
