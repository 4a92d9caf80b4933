//! # Register Block Layout
//!
//! Intel display registers move between chips: before the PCH split they
//! live in the (G)MCH and ICH, afterwards they are spread across the north
//! display block and the PCH. Registers are therefore named by a logical
//! block plus an offset, and the block bases are computed once per device.

use core::fmt;

use ember_core::device::{DeviceType, Group};

use crate::mmio::RegisterIo;

// =============================================================================
// BLOCK BASES
// =============================================================================

/// Block bases without a PCH
pub mod mch {
    /// (G)MCH shared registers
    pub const SHARED_REGISTER_BASE: u32 = 0x00000;
    /// (G)MCH pipe and port registers
    pub const PIPE_AND_PORT_REGISTER_BASE: u32 = 0x60000;
    /// (G)MCH plane control registers
    pub const PLANE_CONTROL_REGISTER_BASE: u32 = 0x70000;
    /// ICH shared registers
    pub const ICH_SHARED_REGISTER_BASE: u32 = 0x00000;
    /// ICH port registers
    pub const ICH_PORT_REGISTER_BASE: u32 = 0x60000;
}

/// Block bases with a PCH
pub mod pch {
    /// North display shared registers
    pub const NORTH_SHARED_REGISTER_BASE: u32 = 0x40000;
    /// North display pipe and port registers
    pub const NORTH_PIPE_AND_PORT_REGISTER_BASE: u32 = 0x60000;
    /// North display plane control registers
    pub const NORTH_PLANE_CONTROL_REGISTER_BASE: u32 = 0x70000;
    /// PCH shared registers
    pub const SOUTH_SHARED_REGISTER_BASE: u32 = 0xc0000;
    /// PCH transcoder and port registers
    pub const SOUTH_TRANSCODER_AND_PORT_REGISTER_BASE: u32 = 0xe0000;
}

/// Display block offset on ValleyView, added to both south bases
pub const VLV_DISPLAY_BASE: u32 = 0x180000;

// =============================================================================
// REGISTER NAMING
// =============================================================================

/// Logical register block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterBlock {
    /// Absolute offset, no block base applied
    Flat,
    /// North shared block
    NorthShared,
    /// North pipe and port block
    NorthPipeAndPort,
    /// North plane control block
    NorthPlaneControl,
    /// South shared block
    SouthShared,
    /// South transcoder and port block
    SouthTranscoderPort,
}

impl RegisterBlock {
    /// Blocks with a computed base, in table order
    pub const TABLE: [RegisterBlock; 5] = [
        RegisterBlock::NorthShared,
        RegisterBlock::NorthPipeAndPort,
        RegisterBlock::NorthPlaneControl,
        RegisterBlock::SouthShared,
        RegisterBlock::SouthTranscoderPort,
    ];

    /// Index into the base table, `None` for [`RegisterBlock::Flat`]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Flat => None,
            Self::NorthShared => Some(0),
            Self::NorthPipeAndPort => Some(1),
            Self::NorthPlaneControl => Some(2),
            Self::SouthShared => Some(3),
            Self::SouthTranscoderPort => Some(4),
        }
    }
}

/// A register named by block and offset within the block
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    /// Block the offset is relative to
    pub block: RegisterBlock,
    /// Offset within the block
    pub offset: u32,
}

impl Register {
    /// Absolute register
    pub const fn flat(offset: u32) -> Self {
        Self { block: RegisterBlock::Flat, offset }
    }

    /// North shared register
    pub const fn north_shared(offset: u32) -> Self {
        Self { block: RegisterBlock::NorthShared, offset }
    }

    /// North pipe/port register
    pub const fn north_pipe_and_port(offset: u32) -> Self {
        Self { block: RegisterBlock::NorthPipeAndPort, offset }
    }

    /// North plane control register
    pub const fn north_plane_control(offset: u32) -> Self {
        Self { block: RegisterBlock::NorthPlaneControl, offset }
    }

    /// South shared register
    pub const fn south_shared(offset: u32) -> Self {
        Self { block: RegisterBlock::SouthShared, offset }
    }

    /// South transcoder/port register
    pub const fn south_transcoder_port(offset: u32) -> Self {
        Self { block: RegisterBlock::SouthTranscoderPort, offset }
    }

    /// Same block, offset moved by `delta`
    pub const fn plus(self, delta: u32) -> Self {
        Self { block: self.block, offset: self.offset + delta }
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}+0x{:05x}", self.block, self.offset)
    }
}

// =============================================================================
// LAYOUT
// =============================================================================

/// Block bases for one device, computed once at attach
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterLayout {
    bases: [u32; 5],
}

impl RegisterLayout {
    /// Select the block bases for a device
    pub fn compute(has_pch: bool, device: &DeviceType) -> Self {
        let mut bases = if has_pch {
            [
                pch::NORTH_SHARED_REGISTER_BASE,
                pch::NORTH_PIPE_AND_PORT_REGISTER_BASE,
                pch::NORTH_PLANE_CONTROL_REGISTER_BASE,
                pch::SOUTH_SHARED_REGISTER_BASE,
                pch::SOUTH_TRANSCODER_AND_PORT_REGISTER_BASE,
            ]
        } else {
            [
                mch::SHARED_REGISTER_BASE,
                mch::PIPE_AND_PORT_REGISTER_BASE,
                mch::PLANE_CONTROL_REGISTER_BASE,
                mch::ICH_SHARED_REGISTER_BASE,
                mch::ICH_PORT_REGISTER_BASE,
            ]
        };

        if device.in_group(Group::ValleyView) {
            bases[3] += VLV_DISPLAY_BASE;
            bases[4] += VLV_DISPLAY_BASE;
        }

        log::debug!(
            "EMBER: register layout (pch: {}) {:05x?}",
            has_pch,
            bases
        );
        Self { bases }
    }

    /// Base of a block (0 for [`RegisterBlock::Flat`])
    #[inline]
    pub fn base(&self, block: RegisterBlock) -> u32 {
        block.index().map_or(0, |i| self.bases[i])
    }

    /// Absolute offset of a register
    #[inline]
    pub fn resolve(&self, register: Register) -> u32 {
        self.base(register.block).wrapping_add(register.offset)
    }

    /// Base table in block order, as published to the compositor
    #[inline]
    pub fn table(&self) -> [u32; 5] {
        self.bases
    }
}

// =============================================================================
// REGISTER WINDOW
// =============================================================================

/// Bounds-checked register access through a layout
///
/// Out-of-range reads return 0 and out-of-range writes are dropped; both
/// are logged.
pub struct RegisterWindow<'a, R: RegisterIo + ?Sized> {
    io: &'a R,
    layout: &'a RegisterLayout,
}

impl<'a, R: RegisterIo + ?Sized> RegisterWindow<'a, R> {
    /// Create a window
    pub fn new(io: &'a R, layout: &'a RegisterLayout) -> Self {
        Self { io, layout }
    }

    /// The layout in use
    pub fn layout(&self) -> &RegisterLayout {
        self.layout
    }

    fn checked(&self, register: Register, width: u32) -> Option<u32> {
        let offset = self.layout.resolve(register);
        match offset.checked_add(width) {
            Some(end) if end <= self.io.size() => Some(offset),
            _ => {
                log::warn!(
                    "EMBER: register {:?} (0x{:x}) outside mapped window of 0x{:x} bytes",
                    register,
                    offset,
                    self.io.size()
                );
                None
            }
        }
    }

    /// Read a 32-bit register
    #[inline]
    pub fn read(&self, register: Register) -> u32 {
        self.checked(register, 4).map_or(0, |offset| self.io.read32(offset))
    }

    /// Write a 32-bit register
    #[inline]
    pub fn write(&self, register: Register, value: u32) {
        if let Some(offset) = self.checked(register, 4) {
            self.io.write32(offset, value);
        }
    }

    /// Read a 16-bit register
    #[inline]
    pub fn read16(&self, register: Register) -> u16 {
        self.checked(register, 2).map_or(0, |offset| self.io.read16(offset))
    }

    /// Write a 16-bit register
    #[inline]
    pub fn write16(&self, register: Register, value: u16) {
        if let Some(offset) = self.checked(register, 2) {
            self.io.write16(offset, value);
        }
    }

    /// Read-modify-write: clear `clear`, then set `set`
    pub fn modify(&self, register: Register, clear: u32, set: u32) {
        if let Some(offset) = self.checked(register, 4) {
            self.io.modify32(offset, clear, set);
        }
    }
}

impl<R: RegisterIo + ?Sized> fmt::Debug for RegisterWindow<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterWindow")
            .field("size", &self.io.size())
            .field("layout", self.layout)
            .finish()
    }
}
