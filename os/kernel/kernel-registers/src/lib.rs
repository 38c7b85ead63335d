//! # Typed `X86_64` Registers and CPU Capabilities
//!
//! - [`Cr3`](cr3::Cr3): the page-table root register, built from the address
//!   the paging bootstrap hands back.
//! - [`CpuCapabilities`]: the few CPU facts and primitives the boot path
//!   needs (long-mode support, stack pointer, halting), with [`NativeCpu`]
//!   as the inline-assembly implementation.
//!
//! The inline assembly lives behind the `asm` feature so the types stay usable
//! on the host.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod cpu;

#[cfg(feature = "cr3")]
pub mod cr3;

pub use crate::cpu::{CpuCapabilities, CpuidResult, NativeCpu};
