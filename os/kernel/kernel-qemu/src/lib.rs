//! # QEMU Debug Console Output
//!
//! Diagnostic output for the boot path while nothing else is available: no
//! allocator, no console driver, no interrupts. Everything goes to QEMU's
//! debug console, I/O port `0x402`, one byte at a time.
//!
//! ```text
//! log::info!(..) ─► QemuLogger ─┐
//!                               ├─► QemuSink (fmt::Write) ─► out 0x402
//! qemu_trace!(..) ──────────────┘
//! ```
//!
//! Capture it on the host with `-debugcon stdio` (or `-debugcon file:boot.log`).
//!
//! ## Features
//!
//! - `enabled` (default): port writes are compiled in.
//! - Without it, [`qemu_trace!`] and [`QemuLogger`] format nothing and touch
//!   no port.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kernel_qemu::QemuLogger;
//! use log::{LevelFilter, info};
//!
//! static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Debug);
//!
//! LOGGER.install().expect("first logger");
//! info!("paging bootstrap starting");
//! ```
//!
//! Before the logger is installed, [`qemu_trace!`] writes directly:
//!
//! ```rust,ignore
//! kernel_qemu::qemu_trace!("multiboot info at {:#x}\n", info_ptr);
//! ```
//!
//! On real hardware port `0x402` is normally unused and the writes vanish.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::QemuLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// QEMU's `-debugcon` port.
    pub const QEMU_DEBUG_PORT: u16 = 0x402;

    /// Write a single byte to QEMU's debug port.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn dbg_putc(c: u8) {
        // SAFETY: writing the debug port has no effect beyond the console.
        unsafe { outb(QEMU_DEBUG_PORT, c) }
    }

    #[cfg(target_arch = "x86_64")]
    #[allow(clippy::inline_always)]
    #[inline(always)]
    unsafe fn outb(port: u16, val: u8) {
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") port,
                in("al") val,
                options(nomem, nostack, preserves_flags)
            );
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    #[allow(clippy::inline_always)]
    #[inline(always)]
    const unsafe fn outb(_port: u16, _val: u8) {}

    /// `fmt::Write` adapter over the debug port.
    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            s.bytes().for_each(dbg_putc);
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best effort; the sink itself never fails.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub const fn qemu_write(_: fmt::Arguments) {}
}

/// `print!`-style output straight to the QEMU debug port, bypassing `log`.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
