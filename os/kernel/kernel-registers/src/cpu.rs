//! CPU capability interface.

/// Raw `CPUID` output registers.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
#[repr(C)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

impl CpuidResult {
    /// Leaf holding the extended processor feature flags.
    pub const EXTENDED_FEATURES_LEAF: u32 = 0x8000_0001;

    /// `CPUID.80000001h:EDX` bit 29: Intel 64 / AMD64 long mode.
    pub const LONG_MODE_BIT: u32 = 1 << 29;

    /// Whether `leaf 0x8000_0000` reports the extended feature leaf and
    /// `leaf 0x8000_0001` (in `features`) advertises long mode.
    #[must_use]
    pub const fn long_mode(max_extended: Self, features: Self) -> bool {
        max_extended.eax >= Self::EXTENDED_FEATURES_LEAF
            && features.edx & Self::LONG_MODE_BIT != 0
    }
}

/// What the boot path needs from the processor.
///
/// Implemented by [`NativeCpu`] on hardware; tests supply a mock whose
/// [`halt`](Self::halt) panics so the fatal path is observable.
pub trait CpuCapabilities {
    /// Whether the processor can run in 64-bit long mode.
    fn supports_long_mode(&self) -> bool;

    /// Current stack pointer.
    fn read_stack_pointer(&self) -> u64;

    /// Stop the processor for good: interrupts off, `hlt` forever.
    fn halt(&self) -> !;
}

/// The processor we are running on.
#[derive(Debug, Default, Copy, Clone)]
pub struct NativeCpu;

impl NativeCpu {
    /// Execute `CPUID` with the given leaf and subleaf.
    ///
    /// # Safety
    /// The `CPUID` instruction must be available.
    #[cfg(all(feature = "asm", target_arch = "x86_64"))]
    #[inline(always)]
    #[allow(unused_assignments, clippy::inline_always)]
    #[must_use]
    pub unsafe fn cpuid(leaf: u32, subleaf: u32) -> CpuidResult {
        let (mut eax, mut ebx, mut ecx, mut edx) = (leaf, 0u32, subleaf, 0u32);
        unsafe {
            core::arch::asm!(
                "push rbx",
                "cpuid",
                "mov {ebx_out:e}, ebx",
                "pop rbx",
                ebx_out = lateout(reg) ebx,
                inlateout("eax") eax,
                inlateout("ecx") ecx,
                lateout("edx") edx,
                options(nomem, preserves_flags),
            );
        }
        CpuidResult { eax, ebx, ecx, edx }
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl CpuCapabilities for NativeCpu {
    fn supports_long_mode(&self) -> bool {
        // SAFETY: CPUID exists on every x86_64 processor.
        let (max_extended, features) = unsafe {
            (
                Self::cpuid(0x8000_0000, 0),
                Self::cpuid(CpuidResult::EXTENDED_FEATURES_LEAF, 0),
            )
        };
        CpuidResult::long_mode(max_extended, features)
    }

    fn read_stack_pointer(&self) -> u64 {
        let rsp: u64;
        unsafe {
            core::arch::asm!("mov {}, rsp", out(reg) rsp, options(nomem, nostack, preserves_flags));
        }
        rsp
    }

    fn halt(&self) -> ! {
        loop {
            unsafe {
                core::arch::asm!("cli", "hlt", options(nomem, nostack));
            }
        }
    }
}

#[cfg(not(all(feature = "asm", target_arch = "x86_64")))]
impl CpuCapabilities for NativeCpu {
    fn supports_long_mode(&self) -> bool {
        false
    }

    fn read_stack_pointer(&self) -> u64 {
        0
    }

    fn halt(&self) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }
}
