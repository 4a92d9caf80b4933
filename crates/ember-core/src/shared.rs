//! # Shared Region Layout
//!
//! The block of memory shared between the kernel driver and the privileged
//! compositor. The compositor is built against this exact layout, so the
//! struct is `#[repr(C)]`, free of padding, and its size and key offsets are
//! pinned at compile time.
//!
//! Register block table, PLL parameters and clocks are written once during
//! attach and never change afterwards.

use core::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use static_assertions::{assert_eq_size, const_assert_eq};

/// Size of the EDID block copied from the boot loader
pub const EDID_BLOCK_SIZE: usize = 128;

/// Size of the NUL padded device identifier
pub const DEVICE_IDENTIFIER_SIZE: usize = 32;

/// Number of logical register blocks
pub const REGISTER_BLOCK_COUNT: usize = 5;

/// PLL parameters published to the compositor (all kHz except the register)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PllInfo {
    /// Reference frequency
    pub reference_frequency: u32,
    /// Maximum frequency
    pub max_frequency: u32,
    /// Minimum frequency
    pub min_frequency: u32,
    /// Register holding the PLL divisor
    pub divisor_register: u32,
}

/// Kernel/compositor shared state
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct SharedInfo {
    /// Physical base of the graphics aperture
    pub physical_graphics_memory: u64,
    /// Aperture size in bytes
    pub graphics_memory_size: u64,
    /// Primary ring offset within the aperture
    pub ring_offset: u64,
    /// Overlay register block offset within the aperture
    pub overlay_offset: u64,
    /// Physical address of the overlay registers
    pub physical_overlay_registers: u64,
    /// Hardware status page offset within the aperture
    pub status_page_offset: u64,
    /// Physical address of the hardware status page
    pub physical_status_page: u64,
    /// Cursor buffer offset within the aperture
    pub cursor_offset: u64,
    /// Physical address of the cursor buffer
    pub physical_cursor_memory: u64,

    /// Register block base table, indexed by register block
    pub register_blocks: [u32; REGISTER_BLOCK_COUNT],
    /// PLL parameters
    pub pll: PllInfo,
    /// Core display clock (kHz, 0 when not detected)
    pub cd_clock: u32,
    /// FDI link frequency (kHz, 0 when not applicable)
    pub fdi_link_frequency: u32,
    /// Raw clock (kHz, 0 when not applicable)
    pub raw_clock: u32,
    /// Vblank channel id, -1 when invalid
    pub vblank_channel: i32,
    /// Area id of the register mapping
    pub registers_area: i32,
    /// Ring control register base
    pub ring_register_base: u32,
    /// Ring size in bytes, 0 when there is no ring
    pub ring_size: u32,
    /// Packed device type word
    pub device_type: u32,
    /// PCH variant
    pub pch_info: u32,
    /// Non-zero when the hardware cursor is enabled
    pub hardware_cursor_enabled: u32,
    /// Non-zero when `vesa_edid_info` holds a boot EDID block
    pub has_vesa_edid_info: u32,

    /// Boot EDID block
    pub vesa_edid_info: [u8; EDID_BLOCK_SIZE],
    /// NUL padded device identifier
    pub device_identifier: [u8; DEVICE_IDENTIFIER_SIZE],
}

// Wire contract
assert_eq_size!(SharedInfo, [u8; 312]);
const_assert_eq!(size_of::<PllInfo>(), 16);
const_assert_eq!(offset_of!(SharedInfo, register_blocks), 72);
const_assert_eq!(offset_of!(SharedInfo, pll), 92);
const_assert_eq!(offset_of!(SharedInfo, cd_clock), 108);
const_assert_eq!(offset_of!(SharedInfo, vblank_channel), 120);
const_assert_eq!(offset_of!(SharedInfo, ring_size), 132);
const_assert_eq!(offset_of!(SharedInfo, vesa_edid_info), 152);
const_assert_eq!(offset_of!(SharedInfo, device_identifier), 280);

impl SharedInfo {
    /// Freshly attached state: everything zero, ids invalid
    pub fn new() -> Self {
        let mut info = Self::zeroed();
        info.vblank_channel = -1;
        info.registers_area = -1;
        info
    }

    /// Store the device identifier, truncated and NUL padded
    pub fn set_device_identifier(&mut self, identifier: &str) {
        self.device_identifier = [0; DEVICE_IDENTIFIER_SIZE];
        let len = identifier.len().min(DEVICE_IDENTIFIER_SIZE - 1);
        self.device_identifier[..len].copy_from_slice(&identifier.as_bytes()[..len]);
    }

    /// Device identifier up to the first NUL
    pub fn device_identifier(&self) -> &[u8] {
        let end = self
            .device_identifier
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(DEVICE_IDENTIFIER_SIZE);
        &self.device_identifier[..end]
    }

    /// Copy a boot EDID block
    pub fn set_edid(&mut self, edid: &[u8; EDID_BLOCK_SIZE]) {
        self.vesa_edid_info = *edid;
        self.has_vesa_edid_info = 1;
    }

    /// Raw bytes as seen by the compositor
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for SharedInfo {
    fn default() -> Self {
        Self::new()
    }
}
