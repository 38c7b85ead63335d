use bitfield_struct::bitfield;
use kernel_memory_addresses::{PageSize, PhysicalAddress};

/// CR3: Page-Map Level-4 Base Register (IA-32e, PCID disabled).
///
/// Holds the physical page number of the PML4 table and the cache-control
/// flags used when the CPU reads it.
///
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_registers::cr3::Cr3;
/// let cr3 = Cr3::from_root(PhysicalAddress::new(0x1000));
/// assert_eq!(cr3.into_bits(), 0x1008);
/// assert_eq!(cr3.root(), PhysicalAddress::new(0x1000));
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Cr3 {
    /// Bits 0–2: reserved (must be 0).
    #[bits(3)]
    reserved0: u8,

    /// Bit 3: PWT, page-level write-through for PML4 accesses.
    pub pwt: bool,

    /// Bit 4: PCD, page-level cache disable for PML4 accesses.
    pub pcd: bool,

    /// Bits 5–11: reserved (must be 0 when written).
    #[bits(7)]
    reserved1: u8,

    /// Bits 12–51: PML4 physical page number.
    #[bits(40)]
    pml4_page: u64,

    /// Bits 52–63: reserved.
    #[bits(12)]
    reserved2: u16,
}

impl Cr3 {
    /// `CR3` for a PML4 at `root`, cached write-through like every table
    /// link the bootstrap installs.
    #[must_use]
    pub const fn from_root(root: PhysicalAddress) -> Self {
        Self::from_pml4_phys(root, true, false)
    }

    /// `CR3` for a PML4 at `pml4_phys` with explicit cache flags.
    ///
    /// `pml4_phys` must be 4 KiB-aligned.
    #[must_use]
    pub const fn from_pml4_phys(pml4_phys: PhysicalAddress, pwt: bool, pcd: bool) -> Self {
        debug_assert!(pml4_phys.is_aligned_to(PageSize::Small), "PML4 base must be 4K-aligned");
        Self::new()
            .with_pwt(pwt)
            .with_pcd(pcd)
            .with_pml4_page(pml4_phys.page_number().as_u64())
    }

    /// Physical address of the PML4.
    #[must_use]
    pub const fn root(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.pml4_page() << PageSize::SMALL_SHIFT)
    }
}
