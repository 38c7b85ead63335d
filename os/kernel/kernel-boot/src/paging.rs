use crate::halt_on_error;
use kernel_info::boot::MULTIBOOT_BOOTLOADER_MAGIC;
use kernel_memory_addresses::PhysicalAddress;
use kernel_mmap::{BootMemoryInfo, ExtentError, MemoryExtent, resolve_extent, usable_end_at};
use kernel_registers::cr3::Cr3;
use kernel_registers::{CpuCapabilities, NativeCpu};
use kernel_vmem::{
    BootstrapError, IdentityMapped, MappingPolicy, PagingBootstrap, PagingContext, TableLayout,
    TableMemory,
};
use log::debug;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BootError {
    #[error("CPU does not support long mode")]
    LongModeUnsupported,
    /// The boot loader's magic does not vouch for the memory information.
    #[error("untrusted boot information (magic {magic:#010x})")]
    UntrustedBootInfo { magic: u32 },
    /// The boot loader does not report RAM at the table root.
    #[error("no usable RAM reported at the page table root {root}")]
    TableRegionUnusable { root: PhysicalAddress },
    #[error(transparent)]
    Extent(#[from] ExtentError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

/// Result of a successful paging bootstrap.
#[derive(Debug)]
pub struct PagingHandoff<M> {
    /// The populated tables.
    pub context: PagingContext<M>,
    /// Value to load into `CR3` once PAE is on.
    pub cr3: Cr3,
    pub available_memory: MemoryExtent,
}

/// Build the boot page tables in `memory` at the default layout.
///
/// `magic` is the value the boot loader left in `EAX`; `info` is only
/// looked at if it matches [`MULTIBOOT_BOOTLOADER_MAGIC`]. The tables must
/// fit inside the RAM range `info` reports at the table root.
///
/// # Errors
/// - [`BootError::LongModeUnsupported`] before anything else is looked at.
/// - [`BootError::UntrustedBootInfo`] if `magic` is wrong.
/// - [`BootError::Extent`] if the boot loader reported no memory.
/// - [`BootError::TableRegionUnusable`] if no RAM is reported at the root.
/// - [`BootError::Bootstrap`] if the tables cannot be planned or filled;
///   in the planning case `memory` is left untouched.
pub fn boot_paging<C, M>(
    magic: u32,
    info: &BootMemoryInfo<'_>,
    cpu: &C,
    memory: M,
    policy: MappingPolicy,
) -> Result<PagingHandoff<M>, BootError>
where
    C: CpuCapabilities + ?Sized,
    M: TableMemory,
{
    if !cpu.supports_long_mode() {
        return Err(BootError::LongModeUnsupported);
    }
    debug!("Long mode supported, rsp = {:#x}", cpu.read_stack_pointer());
    check_boot_magic(magic)?;

    let available_memory = resolve_extent(info)?;
    let layout = table_layout(info)?;

    let context = PagingBootstrap::new(memory)
        .with_layout(layout)
        .with_policy(policy)
        .bootstrap(available_memory.bytes())?;
    let cr3 = Cr3::from_root(context.root());

    Ok(PagingHandoff {
        context,
        cr3,
        available_memory,
    })
}

const fn check_boot_magic(magic: u32) -> Result<(), BootError> {
    if magic == MULTIBOOT_BOOTLOADER_MAGIC {
        Ok(())
    } else {
        Err(BootError::UntrustedBootInfo { magic })
    }
}

/// The default layout, bounded by the RAM range holding its root.
fn table_layout(info: &BootMemoryInfo<'_>) -> Result<TableLayout, BootError> {
    let root = TableLayout::DEFAULT.root;
    let end = usable_end_at(info, root.as_u64()).ok_or(BootError::TableRegionUnusable { root })?;
    debug!("Page tables may use {root}..{end:#x}");
    Ok(TableLayout::DEFAULT.with_limit(PhysicalAddress::new(end)))
}

#[cfg(feature = "qemu")]
static LOGGER: kernel_qemu::QemuLogger = kernel_qemu::QemuLogger::new(log::LevelFilter::Debug);

/// Build the boot page tables on the running machine and return `CR3`.
///
/// See [`boot_paging`] for `magic` and `info`. Never returns on failure:
/// the error is logged and the CPU halted.
///
/// # Safety
/// - Paging must be off (or the table region identity-mapped), and the RAM
///   range `info` reports at [`kernel_info::memory::PAGING_STRUCTURES_BASE`]
///   must be writable and owned by the caller.
/// - Must run once, single-threaded, before interrupts are enabled.
#[must_use]
pub unsafe fn setup_paging(magic: u32, info: &BootMemoryInfo<'_>) -> Cr3 {
    #[cfg(feature = "qemu")]
    {
        kernel_qemu::qemu_trace!("Setting up paging\n");
        // A logger installed earlier keeps working.
        let _ = LOGGER.install();
    }

    let cpu = NativeCpu;
    // SAFETY: forwarded to the caller.
    let memory = unsafe { IdentityMapped::new() };
    let handoff = halt_on_error(
        &cpu,
        boot_paging(magic, info, &cpu, memory, MappingPolicy::default()),
    );
    handoff.cr3
}
