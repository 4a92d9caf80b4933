//! # Test Doubles
//!
//! Recording implementations of [`RegisterIo`], [`ApertureProvider`] and
//! [`Platform`] for exercising the driver without hardware.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::ptr::NonNull;

use ember_core::{AreaId, Error, IrqReturn, PhysAddr, Result, TeamId};
use spin::Mutex;

use crate::aperture::{ApertureInfo, ApertureProvider};
use crate::irq::InterruptHandler;
use crate::mmio::RegisterIo;
use crate::platform::{AreaMapping, AreaProtection, BarInfo, PciLocation, Platform};

// =============================================================================
// MOCK REGISTERS
// =============================================================================

/// One logged register access
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Read of an offset
    Read(u32),
    /// Write of a value to an offset
    Write(u32, u32),
}

#[derive(Debug, Default)]
struct RegisterState {
    values: BTreeMap<u32, u32>,
    write_one_to_clear: BTreeMap<u32, u32>,
    log: Vec<Access>,
}

impl RegisterState {
    fn store(&mut self, offset: u32, value: u32) {
        let clear_mask = self.write_one_to_clear.get(&offset).copied().unwrap_or(0);
        let old = self.values.get(&offset).copied().unwrap_or(0);
        let kept = old & clear_mask & !value;
        let written = value & !clear_mask;
        self.values.insert(offset, kept | written);
    }
}

/// Register map that records every access
///
/// Unwritten registers read as zero. Registers marked with
/// [`MockRegisters::mark_write_one_to_clear`] behave like interrupt identity
/// registers: writing a 1 to a marked bit clears it.
#[derive(Debug)]
pub struct MockRegisters {
    size: u32,
    state: Mutex<RegisterState>,
}

impl MockRegisters {
    /// Register space of `size` bytes
    pub fn new(size: u32) -> Self {
        Self {
            size,
            state: Mutex::new(RegisterState::default()),
        }
    }

    /// Preload a value without logging
    pub fn set(&self, offset: u32, value: u32) {
        self.state.lock().values.insert(offset, value);
    }

    /// Current value without logging
    pub fn get(&self, offset: u32) -> u32 {
        self.state.lock().values.get(&offset).copied().unwrap_or(0)
    }

    /// Make `mask` bits of a register write-one-to-clear
    pub fn mark_write_one_to_clear(&self, offset: u32, mask: u32) {
        self.state.lock().write_one_to_clear.insert(offset, mask);
    }

    /// Every access in order
    pub fn accesses(&self) -> Vec<Access> {
        self.state.lock().log.clone()
    }

    /// Every write in order
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.state
            .lock()
            .log
            .iter()
            .filter_map(|access| match *access {
                Access::Write(offset, value) => Some((offset, value)),
                Access::Read(_) => None,
            })
            .collect()
    }

    /// Values written to one register, in order
    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| v)
            .collect()
    }

    /// Distinct registers touched
    pub fn touched(&self) -> BTreeSet<u32> {
        self.state
            .lock()
            .log
            .iter()
            .map(|access| match *access {
                Access::Read(offset) | Access::Write(offset, _) => offset,
            })
            .collect()
    }

    /// Forget the access log, keep values
    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }
}

impl RegisterIo for MockRegisters {
    fn size(&self) -> u32 {
        self.size
    }

    fn read32(&self, offset: u32) -> u32 {
        let mut state = self.state.lock();
        state.log.push(Access::Read(offset));
        state.values.get(&offset).copied().unwrap_or(0)
    }

    fn write32(&self, offset: u32, value: u32) {
        let mut state = self.state.lock();
        state.log.push(Access::Write(offset, value));
        state.store(offset, value);
    }

    fn read16(&self, offset: u32) -> u16 {
        self.read32(offset) as u16
    }

    fn write16(&self, offset: u32, value: u16) {
        let mut state = self.state.lock();
        state.log.push(Access::Write(offset, value as u32));
        let high = state.values.get(&offset).copied().unwrap_or(0) & 0xffff_0000;
        let clear_mask = state.write_one_to_clear.get(&offset).copied().unwrap_or(0);
        // Untouched high half must survive the store
        state.store(offset, (high & !clear_mask) | value as u32);
    }
}

// =============================================================================
// MOCK APERTURE
// =============================================================================

/// Aperture whose physical addresses mirror the offsets
#[derive(Debug)]
pub struct MockAperture {
    info: ApertureInfo,
    bound: Vec<(u64, u64)>,
    fail_bind: bool,
}

impl MockAperture {
    /// Aperture of `size` bytes at `physical_base`
    pub fn new(physical_base: u64, size: u64) -> Self {
        Self {
            info: ApertureInfo {
                base: 0x8000_0000,
                physical_base: PhysAddr::new(physical_base),
                size,
            },
            bound: Vec::new(),
            fail_bind: false,
        }
    }

    /// Make every physical bind fail
    pub fn fail_binds(mut self) -> Self {
        self.fail_bind = true;
        self
    }

    /// Currently bound ranges
    pub fn bound(&self) -> &[(u64, u64)] {
        &self.bound
    }
}

impl ApertureProvider for MockAperture {
    fn info(&self) -> ApertureInfo {
        self.info
    }

    fn bind_physical(&mut self, offset: u64, size: u64) -> Result<PhysAddr> {
        if self.fail_bind {
            return Err(Error::PhysicalBindFailed);
        }
        self.bound.push((offset, size));
        Ok(self.info.physical_base.offset(offset))
    }

    fn unbind_physical(&mut self, offset: u64, size: u64) {
        self.bound.retain(|&range| range != (offset, size));
    }
}

// =============================================================================
// MOCK PLATFORM
// =============================================================================

/// A platform call, as recorded by [`MockPlatform`]
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum MockCall {
    CreateArea(String),
    DeleteArea(AreaId),
    MapRegisters(u8),
    MapAperture,
    UnmapAperture,
    EnableDevice,
    ConfigureMsi(u8),
    EnableMsi,
    DisableMsi,
    UnconfigureMsi,
    InstallHandler(u8),
    RemoveHandler(u8),
}

/// Injected failures
#[derive(Clone, Copy, Debug, Default)]
pub struct MockFailures {
    /// `map_aperture` fails
    pub map_aperture: bool,
    /// `create_area` fails
    pub create_area: bool,
    /// `map_registers` fails
    pub map_registers: bool,
    /// `configure_msi` fails
    pub configure_msi: bool,
    /// `install_interrupt_handler` fails
    pub install_handler: bool,
    /// Aperture physical binds fail
    pub bind_physical: bool,
}

/// Size of the register BAR the mock exposes
pub const MOCK_REGISTER_SIZE: u32 = 0x20_0000;

/// Size of the aperture the mock exposes
pub const MOCK_APERTURE_SIZE: u64 = 256 * 1024 * 1024;

/// Handlers installed per vector
#[derive(Default)]
struct HandlerTable(BTreeMap<u8, Arc<dyn InterruptHandler>>);

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Recording platform
#[derive(Debug)]
pub struct MockPlatform {
    /// Register map handed out by `map_registers`
    pub registers: Arc<MockRegisters>,
    /// Adapter identity
    pub location: PciLocation,
    /// PCH ISA bridge id
    pub isa_bridge: Option<u16>,
    /// Raw interrupt pin
    pub interrupt_pin: u8,
    /// MSI vectors supported
    pub msi_vectors: u8,
    /// First MSI vector handed out
    pub msi_base_vector: u8,
    /// Boot EDID
    pub edid: Option<[u8; 128]>,
    /// Boolean settings
    pub settings: BTreeMap<String, bool>,
    /// Team returned by `current_team`
    pub team: TeamId,
    /// Injected failures
    pub fail: MockFailures,
    calls: Vec<MockCall>,
    areas: BTreeMap<i32, Box<[u64]>>,
    next_area: i32,
    handlers: HandlerTable,
}

impl MockPlatform {
    /// Platform for a device id, no PCH, pin line 11, one MSI vector
    pub fn new(device_id: u16) -> Self {
        Self {
            registers: Arc::new(MockRegisters::new(MOCK_REGISTER_SIZE)),
            location: PciLocation {
                vendor_id: 0x8086,
                device_id,
                bus: 0,
                device: 2,
                function: 0,
            },
            isa_bridge: None,
            interrupt_pin: 11,
            msi_vectors: 1,
            msi_base_vector: 40,
            edid: None,
            settings: BTreeMap::new(),
            team: TeamId(100),
            fail: MockFailures::default(),
            calls: Vec::new(),
            areas: BTreeMap::new(),
            next_area: 10,
            handlers: HandlerTable::default(),
        }
    }

    /// Add a PCH
    pub fn with_pch(mut self, isa_bridge_device_id: u16) -> Self {
        self.isa_bridge = Some(isa_bridge_device_id);
        self
    }

    /// Set the raw interrupt pin (0 or 0xff for none)
    pub fn with_interrupt_pin(mut self, pin: u8) -> Self {
        self.interrupt_pin = pin;
        self
    }

    /// Set the number of MSI vectors
    pub fn with_msi_vectors(mut self, count: u8) -> Self {
        self.msi_vectors = count;
        self
    }

    /// Set a boolean driver setting
    pub fn with_setting(mut self, key: &str, value: bool) -> Self {
        self.settings.insert(key.to_string(), value);
        self
    }

    /// Recorded calls in order
    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    /// Count of a specific call
    pub fn count(&self, call: &MockCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    /// Areas not yet deleted
    pub fn live_areas(&self) -> usize {
        self.areas.len()
    }

    /// Deliver an interrupt on `vector`, `None` if no handler is installed
    pub fn raise(&self, vector: u8) -> Option<IrqReturn> {
        self.handlers.0.get(&vector).map(|handler| handler.handle_interrupt())
    }

    /// Check a handler is installed on `vector`
    pub fn has_handler(&self, vector: u8) -> bool {
        self.handlers.0.contains_key(&vector)
    }

    fn allocate_area_id(&mut self) -> AreaId {
        let id = self.next_area;
        self.next_area += 1;
        AreaId(id)
    }
}

impl Platform for MockPlatform {
    type Registers = Arc<MockRegisters>;
    type Aperture = MockAperture;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn pci_location(&self) -> PciLocation {
        self.location
    }

    fn isa_bridge_device_id(&self) -> Option<u16> {
        self.isa_bridge
    }

    fn bar_info(&self, index: u8) -> Result<BarInfo> {
        match index {
            0 | 1 => Ok(BarInfo {
                index,
                physical: PhysAddr::new(0xf000_0000),
                size: MOCK_REGISTER_SIZE as u64,
            }),
            _ => Err(Error::NotFound),
        }
    }

    fn enable_device(&mut self) -> Result<()> {
        self.calls.push(MockCall::EnableDevice);
        Ok(())
    }

    fn create_area(
        &mut self,
        name: &str,
        size: usize,
        _protection: AreaProtection,
    ) -> Result<AreaMapping> {
        self.calls.push(MockCall::CreateArea(name.to_string()));
        if self.fail.create_area {
            return Err(Error::AreaCreateFailed);
        }
        let mut backing = vec![0u64; size.div_ceil(8)].into_boxed_slice();
        let address =
            NonNull::new(backing.as_mut_ptr() as *mut u8).ok_or(Error::AreaCreateFailed)?;
        let id = self.allocate_area_id();
        self.areas.insert(id.0, backing);
        Ok(AreaMapping { id, address, size })
    }

    fn delete_area(&mut self, id: AreaId) {
        self.calls.push(MockCall::DeleteArea(id));
        self.areas.remove(&id.0);
    }

    fn map_registers(
        &mut self,
        bar: &BarInfo,
        _protection: AreaProtection,
    ) -> Result<(AreaId, Self::Registers)> {
        self.calls.push(MockCall::MapRegisters(bar.index));
        if self.fail.map_registers {
            return Err(Error::MmioMapFailed);
        }
        let id = self.allocate_area_id();
        self.areas.insert(id.0, Box::new([]));
        Ok((id, Arc::clone(&self.registers)))
    }

    fn map_aperture(&mut self) -> Result<Self::Aperture> {
        self.calls.push(MockCall::MapAperture);
        if self.fail.map_aperture {
            return Err(Error::ApertureMapFailed);
        }
        let aperture = MockAperture::new(0xd000_0000, MOCK_APERTURE_SIZE);
        Ok(if self.fail.bind_physical {
            aperture.fail_binds()
        } else {
            aperture
        })
    }

    fn unmap_aperture(&mut self, _aperture: Self::Aperture) {
        self.calls.push(MockCall::UnmapAperture);
    }

    fn interrupt_line(&self) -> u8 {
        self.interrupt_pin
    }

    fn msi_count(&self) -> u8 {
        self.msi_vectors
    }

    fn configure_msi(&mut self, count: u8) -> Result<u8> {
        self.calls.push(MockCall::ConfigureMsi(count));
        if self.fail.configure_msi || count > self.msi_vectors {
            return Err(Error::MsiFailed);
        }
        Ok(self.msi_base_vector)
    }

    fn enable_msi(&mut self) -> Result<()> {
        self.calls.push(MockCall::EnableMsi);
        Ok(())
    }

    fn disable_msi(&mut self) {
        self.calls.push(MockCall::DisableMsi);
    }

    fn unconfigure_msi(&mut self) {
        self.calls.push(MockCall::UnconfigureMsi);
    }

    fn install_interrupt_handler(
        &mut self,
        vector: u8,
        handler: Arc<dyn InterruptHandler>,
    ) -> Result<()> {
        self.calls.push(MockCall::InstallHandler(vector));
        if self.fail.install_handler || self.handlers.0.contains_key(&vector) {
            return Err(Error::HandlerInstallFailed);
        }
        self.handlers.0.insert(vector, handler);
        Ok(())
    }

    fn remove_interrupt_handler(&mut self, vector: u8) {
        self.calls.push(MockCall::RemoveHandler(vector));
        self.handlers.0.remove(&vector);
    }

    fn current_team(&self) -> TeamId {
        self.team
    }

    fn boot_edid(&self) -> Option<[u8; 128]> {
        self.edid
    }

    fn setting_bool(&self, key: &str, default: bool) -> bool {
        self.settings.get(key).copied().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_one_to_clear() {
        let regs = MockRegisters::new(0x100);
        regs.set(0x10, 0x0002_0002);
        regs.mark_write_one_to_clear(0x10, 0x0000_ffff);
        regs.write32(0x10, 0x0002_0002);
        assert_eq!(regs.get(0x10), 0x0002_0000);

        regs.set(0x20, 0x00ab_0003);
        regs.mark_write_one_to_clear(0x20, 0xffff);
        regs.write16(0x20, 0x0001);
        assert_eq!(regs.get(0x20), 0x00ab_0002);
    }

    #[test]
    fn test_access_log() {
        let regs = MockRegisters::new(0x100);
        regs.write32(0x4, 1);
        let _ = regs.read32(0x4);
        regs.write32(0x8, 2);
        assert_eq!(
            regs.accesses(),
            [Access::Write(0x4, 1), Access::Read(0x4), Access::Write(0x8, 2)]
        );
        assert_eq!(regs.writes_to(0x8), [2]);
        regs.clear_log();
        assert!(regs.accesses().is_empty());
        assert_eq!(regs.get(0x8), 2);
    }

    #[test]
    fn test_platform_areas() {
        let mut platform = MockPlatform::new(0x2a02);
        let area = platform
            .create_area("test", 312, AreaProtection::SHARED)
            .unwrap();
        assert_eq!(platform.live_areas(), 1);
        assert_eq!(area.address.as_ptr() as usize % 8, 0);
        platform.delete_area(area.id);
        assert_eq!(platform.live_areas(), 0);
    }

    struct Counter(Mutex<u32>);

    impl InterruptHandler for Counter {
        fn handle_interrupt(&self) -> IrqReturn {
            *self.0.lock() += 1;
            IrqReturn::Handled
        }
    }

    #[test]
    fn test_platform_dispatches_installed_handler() {
        let mut platform = MockPlatform::new(0x2a02);
        let counter = Arc::new(Counter(Mutex::new(0)));
        assert_eq!(platform.raise(11), None);

        platform
            .install_interrupt_handler(11, Arc::clone(&counter) as Arc<dyn InterruptHandler>)
            .unwrap();
        assert_eq!(platform.raise(11), Some(IrqReturn::Handled));
        assert_eq!(*counter.0.lock(), 1);

        platform.remove_interrupt_handler(11);
        assert!(!platform.has_handler(11));
        assert_eq!(platform.raise(11), None);
        assert_eq!(Arc::strong_count(&counter), 1);
    }
}
