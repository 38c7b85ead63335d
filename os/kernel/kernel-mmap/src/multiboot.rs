//! Walking the boot loader's raw memory map buffer.

use kernel_info::boot::{MemoryKind, MemoryRegion};
use log::warn;

/// Bytes of the `size` field that precedes, and is not counted in, each record.
const SIZE_FIELD_BYTES: usize = 4;

/// Bytes of a record after the `size` field: base (8), length (8), type (4).
const RECORD_BODY_BYTES: usize = 20;

/// Iterator over a Multiboot memory map buffer.
///
/// Each record is laid out as
///
/// ```text
/// offset  0: u32 size     (bytes of the record *excluding* this field)
/// offset  4: u64 base
/// offset 12: u64 length
/// offset 20: u32 type
/// ```
///
/// all little-endian and unaligned. The next record starts `size + 4` bytes
/// after the current one; `size` may exceed 20 if the loader appends fields.
/// A trailing record that does not fit the buffer ends the walk.
#[derive(Clone)]
pub struct MultibootMemoryMap<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> MultibootMemoryMap<'a> {
    /// Wrap the `memory_map_length` bytes found at `memory_map_address`.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }
}

impl Iterator for MultibootMemoryMap<'_> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }

        let record = self.offset;
        let Some((region, stride)) = decode_record(self.bytes, record) else {
            warn!(
                "Truncated memory map record at offset {record} of {} bytes",
                self.bytes.len()
            );
            self.offset = self.bytes.len();
            return None;
        };

        self.offset = record.saturating_add(stride);
        Some(region)
    }
}

/// Decode the record at `offset`, returning it with the distance to the next one.
fn decode_record(bytes: &[u8], offset: usize) -> Option<(MemoryRegion, usize)> {
    let size = read_u32(bytes, offset)? as usize;
    if size < RECORD_BODY_BYTES {
        return None;
    }

    let body = offset + SIZE_FIELD_BYTES;
    let base = read_u64(bytes, body)?;
    let length = read_u64(bytes, body + 8)?;
    let kind = read_u32(bytes, body + 16)?;
    let region = MemoryRegion::new(base, length, MemoryKind::from_multiboot(kind));
    Some((region, size.saturating_add(SIZE_FIELD_BYTES)))
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes(raw.try_into().ok()?))
}

fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let raw = bytes.get(offset..offset.checked_add(8)?)?;
    Some(u64::from_le_bytes(raw.try_into().ok()?))
}
