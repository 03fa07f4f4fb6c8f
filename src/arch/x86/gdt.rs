//! Global descriptor table encoding
//!
//! A segment descriptor is an 8-byte structure packing a 32-bit base, a
//! 20-bit limit and access flags. Limits above 64 KiB must be expressible
//! in 4 KiB granularity; a limit that is not is a boot-time
//! misconfiguration and halts the kernel, since no later code can run on a
//! malformed segment.

use crate::arch;
use crate::types::TSS_SELECTOR;

/// Access bytes for the fixed segment layout.
pub const ACCESS_KERNEL_CODE: u8 = 0x9A;
pub const ACCESS_KERNEL_DATA: u8 = 0x92;
pub const ACCESS_USER_CODE: u8 = 0xF8;
pub const ACCESS_USER_DATA: u8 = 0xF2;
pub const ACCESS_TSS: u8 = 0xE9;

/// A segment described structurally, before hardware encoding.
#[derive(Debug, Clone, Copy)]
pub struct SegmentConfig {
    pub base: u32,
    pub limit: u32,
    pub access: u8,
}

/// The packed 8-byte hardware descriptor.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct SegmentDescriptor([u8; 8]);

impl SegmentConfig {
    pub const NULL: Self = Self {
        base: 0,
        limit: 0,
        access: 0,
    };

    /// Pack into the hardware descriptor format.
    ///
    /// Halts on a limit that cannot be encoded: above 64 KiB the limit is
    /// stored in 4 KiB units, so its low 12 bits must all be set.
    pub fn encode(&self) -> SegmentDescriptor {
        let mut limit = self.limit;
        let mut bytes = [0u8; 8];

        bytes[6] = 0x40;
        if limit > 0x10000 {
            if limit & 0xFFF != 0xFFF {
                panic!("segment limit {:#x} cannot be encoded", limit);
            }
            limit >>= 12;
            bytes[6] = 0xC0;
        }

        bytes[0] = limit as u8;
        bytes[1] = (limit >> 8) as u8;
        bytes[6] |= ((limit >> 16) & 0x0F) as u8;

        bytes[2] = self.base as u8;
        bytes[3] = (self.base >> 8) as u8;
        bytes[4] = (self.base >> 16) as u8;
        bytes[7] = (self.base >> 24) as u8;

        bytes[5] = self.access;

        SegmentDescriptor(bytes)
    }
}

/// Build the fixed six-entry kernel GDT: null, kernel code/data, user
/// code/data, and the TSS. Selector constants in `types` index into this
/// layout.
pub fn kernel_segments(tss_base: u32, tss_limit: u32) -> [SegmentDescriptor; 6] {
    let flat = 0xFFFF_FFFF;
    [
        SegmentConfig::NULL.encode(),
        SegmentConfig { base: 0, limit: flat, access: ACCESS_KERNEL_CODE }.encode(),
        SegmentConfig { base: 0, limit: flat, access: ACCESS_KERNEL_DATA }.encode(),
        SegmentConfig { base: 0, limit: flat, access: ACCESS_USER_CODE }.encode(),
        SegmentConfig { base: 0, limit: flat, access: ACCESS_USER_DATA }.encode(),
        SegmentConfig { base: tss_base, limit: tss_limit, access: ACCESS_TSS }.encode(),
    ]
}

// The CPU keeps referencing the table after lgdt, so it lives in a static.
static GDT: spin::Once<[SegmentDescriptor; 6]> = spin::Once::new();

/// Encode and load the kernel GDT, then load the task register.
/// Interrupts must be disabled by the caller for the duration.
pub fn install(tss_base: u32, tss_limit: u32) {
    let table = GDT.call_once(|| kernel_segments(tss_base, tss_limit));
    let limit = (core::mem::size_of_val(table) - 1) as u16;
    arch::install_descriptor_table(table.as_ptr() as usize, limit);
    arch::load_task_register(TSS_SELECTOR);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_small_limit() {
        let desc = SegmentConfig { base: 0x1234_5678, limit: 0x1000, access: 0x9A }.encode();
        let bytes = desc.0;
        assert_eq!(bytes[0], 0x00);
        assert_eq!(bytes[1], 0x10);
        // byte granularity, 32-bit flag
        assert_eq!(bytes[6] & 0xF0, 0x40);
        assert_eq!(bytes[5], 0x9A);
        assert_eq!(bytes[2], 0x78);
        assert_eq!(bytes[3], 0x56);
        assert_eq!(bytes[4], 0x34);
        assert_eq!(bytes[7], 0x12);
    }

    #[test]
    fn test_encode_page_granular_limit() {
        let desc = SegmentConfig { base: 0, limit: 0xFFFF_FFFF, access: 0x92 }.encode();
        let bytes = desc.0;
        // limit 0xFFFFF in 4 KiB units
        assert_eq!(bytes[0], 0xFF);
        assert_eq!(bytes[1], 0xFF);
        assert_eq!(bytes[6], 0xCF);
    }

    #[test]
    #[should_panic(expected = "segment limit")]
    fn test_unencodable_limit_is_fatal() {
        SegmentConfig { base: 0, limit: 0x2_0000, access: 0x92 }.encode();
    }

    #[test]
    fn test_kernel_segments_shape() {
        let table = kernel_segments(0x8000, 103);
        assert_eq!(table.len(), 6);
        // null descriptor is all zeroes
        assert!(table[0].0.iter().all(|&b| b == 0));
    }
}
