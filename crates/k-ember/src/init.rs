//! # Device Bring-up and Teardown
//!
//! Attach order:
//!
//! 1. classify the device and the PCH
//! 2. map the aperture, create the shared area, power the device up and map
//!    the registers (fatal, unwound in reverse order on failure)
//! 3. publish the register layout, allocate the command ring
//! 4. clock gating and downclocking
//! 5. publish aperture geometry, device type and clocks
//! 6. overlay, status page and cursor buffers (each optional)
//! 7. boot EDID and device identifier
//! 8. vblank channel and interrupt handler
//!
//! Everything after step 2 degrades instead of failing the attach.

use alloc::format;
use alloc::sync::Arc;

use ember_core::{
    ChannelId, DeviceType, Error, PchVariant, Result, SharedInfo, VBlankChannel, PAGE_SIZE,
};
use ember_hal::{AreaProtection, Platform, RegisterIo, RegisterLayout, RegisterWindow};
use ember_mem::{AllocationFlags, ApertureBlock, ApertureMemoryManager};

use crate::clock::{ClockDetector, ClockInfo};
use crate::context::{DeviceContext, FixedBuffers};
use crate::diag::Diagnostics;
use crate::interrupts::{DisplayInterrupts, InterruptController};
use crate::power::PowerStateController;
use crate::regs;
use crate::settings::DriverSettings;
use crate::shared::{SharedRegion, SHARED_AREA_NAME, SHARED_AREA_SIZE};

/// Command ring size
pub const RING_SIZE: u64 = 16 * PAGE_SIZE;

/// Overlay register block size
pub const OVERLAY_SIZE: u64 = PAGE_SIZE;

/// Hardware status page size
pub const STATUS_PAGE_SIZE: u64 = PAGE_SIZE;

/// Cursor buffer size
pub const CURSOR_SIZE: u64 = PAGE_SIZE;

// =============================================================================
// ATTACH
// =============================================================================

/// Bring up the adapter the platform describes
///
/// Fails only for unsupported devices and for aperture, shared area,
/// device enable and register mapping failures; those unwind everything
/// acquired before them. A missing interrupt line is not an attach failure:
/// the context comes back in fake-interrupt mode with the reason in
/// [`DeviceContext::interrupt_status`].
pub fn attach<P: Platform>(platform: &mut P) -> Result<DeviceContext<P>> {
    let location = platform.pci_location();
    let device = DeviceType::lookup(location.device_id).ok_or(Error::UnsupportedDevice)?;
    let pch = platform
        .isa_bridge_device_id()
        .map_or(PchVariant::None, PchVariant::from_isa_bridge);

    log::info!(
        "EMBER: attaching {} (0x{:04x}, gen {}) on {}, pch {:?}",
        device.name(),
        device.device_id(),
        device.generation(),
        platform.name(),
        pch
    );

    // Fatal section
    let aperture = platform.map_aperture().inspect_err(|err| {
        log::error!("EMBER: could not map aperture: {}", err);
    })?;

    let mut shared = match create_shared_region(platform) {
        Ok(shared) => shared,
        Err(err) => {
            platform.unmap_aperture(aperture);
            return Err(err);
        }
    };

    let mapped = platform
        .enable_device()
        .and_then(|()| map_registers(platform, &device));
    let (registers_area, registers) = match mapped {
        Ok(mapped) => mapped,
        Err(err) => {
            log::error!("EMBER: could not set up register access: {}", err);
            platform.delete_area(shared.id());
            platform.unmap_aperture(aperture);
            return Err(err);
        }
    };

    // Degradable section
    let settings = DriverSettings::load(platform);
    let layout = RegisterLayout::compute(pch.is_present(), &device);
    let diag = Diagnostics::new();
    let mut aperture = ApertureMemoryManager::new(aperture);
    let info = shared.get_mut();

    info.register_blocks = layout.table();
    let ring = allocate_ring(&mut aperture, info);

    let clocks = {
        let window = RegisterWindow::new(&registers, &layout);
        program_power(&window, &device);
        ClockDetector::new(&window, &device, pch, &diag).detect()
    };

    publish_device(info, &aperture, &device, pch, registers_area.0, &clocks);

    let buffers = FixedBuffers {
        ring,
        overlay: allocate_fixed(&mut aperture, "overlay registers", OVERLAY_SIZE),
        status_page: allocate_fixed(&mut aperture, "status page", STATUS_PAGE_SIZE),
        cursor: if settings.hardware_cursor {
            allocate_fixed(&mut aperture, "cursor", CURSOR_SIZE)
        } else {
            None
        },
    };
    publish_buffers(info, &buffers);

    if let Some(edid) = platform.boot_edid() {
        info.set_edid(&edid);
    }
    info.set_device_identifier(&format!(
        "ember_{:04x}_{:04x}_{:02x}{:02x}{:02x}",
        location.vendor_id, location.device_id, location.bus, location.device, location.function
    ));

    // Interrupts
    let channel = VBlankChannel::create();
    info.vblank_channel = channel.id().raw();

    let irq = Arc::new(DisplayInterrupts::new(registers, layout, device, pch, channel, diag));
    let mut interrupts = InterruptController::new();
    let interrupt_status = interrupts.install(platform, &irq);

    if let Err(err) = interrupt_status {
        log::error!(
            "EMBER: no interrupt delivery ({}), vblank events unavailable",
            err
        );
        irq.channel().delete();
        info.vblank_channel = ChannelId::INVALID.raw();
    }

    Ok(DeviceContext {
        location,
        irq,
        registers_area,
        aperture,
        shared,
        interrupts,
        buffers,
        clocks,
        settings,
        interrupt_status,
    })
}

fn create_shared_region<P: Platform>(platform: &mut P) -> Result<SharedRegion> {
    let area = platform
        .create_area(SHARED_AREA_NAME, SHARED_AREA_SIZE, AreaProtection::SHARED)
        .inspect_err(|err| log::error!("EMBER: could not create shared area: {}", err))?;

    // SAFETY: the area was just created for us and nothing else maps it
    // in the kernel; it lives until detach deletes it.
    match unsafe { SharedRegion::new(area) } {
        Ok(shared) => Ok(shared),
        Err(err) => {
            platform.delete_area(area.id);
            Err(err)
        }
    }
}

fn map_registers<P: Platform>(
    platform: &mut P,
    device: &DeviceType,
) -> Result<(ember_core::AreaId, P::Registers)> {
    // 8xx parts expose the registers in the second BAR
    let index = if device.generation() >= 3 { 0 } else { 1 };
    let bar = platform.bar_info(index)?;
    let (area, registers) = platform.map_registers(
        &bar,
        AreaProtection::KERNEL_READ | AreaProtection::KERNEL_WRITE | AreaProtection::CLONEABLE,
    )?;
    log::debug!(
        "EMBER: registers at {} ({} bytes) in area {:?}",
        bar.physical,
        registers.size(),
        area
    );
    Ok((area, registers))
}

fn allocate_ring<A: ember_hal::ApertureProvider>(
    aperture: &mut ApertureMemoryManager<A>,
    info: &mut SharedInfo,
) -> Option<ApertureBlock> {
    match aperture.allocate(RING_SIZE, 0, AllocationFlags::empty()) {
        Ok(ring) => {
            info.ring_offset = ring.offset();
            info.ring_register_base = regs::PRIMARY_RING_BUFFER;
            info.ring_size = ring.size() as u32;
            Some(ring)
        }
        Err(err) => {
            // Attach carries on without a ring; the compositor sees size 0
            log::warn!("EMBER: could not allocate command ring: {}", err);
            None
        }
    }
}

fn program_power<R: RegisterIo + ?Sized>(window: &RegisterWindow<'_, R>, device: &DeviceType) {
    let power = PowerStateController::new(window, device);
    power.enable_clock_gating();
    if let Err(err) = power.enable_downclocking() {
        log::debug!("EMBER: downclocking not enabled: {}", err);
    }
}

fn publish_device<A: ember_hal::ApertureProvider>(
    info: &mut SharedInfo,
    aperture: &ApertureMemoryManager<A>,
    device: &DeviceType,
    pch: PchVariant,
    registers_area: i32,
    clocks: &ClockInfo,
) {
    let geometry = aperture.info();
    info.physical_graphics_memory = geometry.physical_base.raw();
    info.graphics_memory_size = geometry.size;
    info.registers_area = registers_area;
    info.device_type = device.type_word();
    info.pch_info = pch as u32;

    info.pll = clocks.pll;
    info.cd_clock = clocks.cd_clock.unwrap_or(0);
    info.fdi_link_frequency = clocks.fdi_link;
    info.raw_clock = clocks.raw_clock;
}

fn allocate_fixed<A: ember_hal::ApertureProvider>(
    aperture: &mut ApertureMemoryManager<A>,
    what: &str,
    size: u64,
) -> Option<ApertureBlock> {
    aperture
        .allocate(size, 0, AllocationFlags::NEED_PHYSICAL)
        .inspect_err(|err| log::warn!("EMBER: no {} ({}), feature disabled", what, err))
        .ok()
}

fn publish_buffers(info: &mut SharedInfo, buffers: &FixedBuffers) {
    let physical = |block: &ApertureBlock| block.physical().map_or(0, |p| p.raw());

    if let Some(overlay) = &buffers.overlay {
        info.overlay_offset = overlay.offset();
        info.physical_overlay_registers = physical(overlay);
    }
    if let Some(status) = &buffers.status_page {
        info.status_page_offset = status.offset();
        info.physical_status_page = physical(status);
    }
    if let Some(cursor) = &buffers.cursor {
        info.cursor_offset = cursor.offset();
        info.physical_cursor_memory = physical(cursor);
    }
    info.hardware_cursor_enabled = u32::from(buffers.cursor.is_some());
}

// =============================================================================
// DETACH
// =============================================================================

/// Tear down an attached adapter, releasing everything in reverse order
pub fn detach<P: Platform>(platform: &mut P, context: DeviceContext<P>) {
    let DeviceContext {
        irq,
        registers_area,
        mut aperture,
        shared,
        mut interrupts,
        buffers,
        ..
    } = context;

    interrupts.uninstall(platform, &irq);
    irq.channel().delete();

    let FixedBuffers {
        ring,
        overlay,
        status_page,
        cursor,
    } = buffers;
    for block in [cursor, status_page, overlay, ring].into_iter().flatten() {
        if let Err(err) = aperture.free(block) {
            log::warn!("EMBER: freeing fixed buffer failed: {}", err);
        }
    }
    platform.unmap_aperture(aperture.release());

    let name = irq.device().name();
    if Arc::strong_count(&irq) > 1 {
        log::warn!("EMBER: interrupt state still referenced at detach");
    }
    // Unmaps the registers once the last reference goes
    drop(irq);
    platform.delete_area(registers_area);
    platform.delete_area(shared.into_area().id);

    log::info!("EMBER: detached {}", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupts::{ControllerState, InterruptStrategy};
    use ember_core::{IrqReturn, PipeSet};
    use ember_hal::layout::mch;
    use ember_hal::testing::{MockCall, MockPlatform};
    use ember_hal::InterruptLine;

    #[test]
    fn test_scenario_gen4_legacy_pin() {
        let mut platform = MockPlatform::new(0x2a02).with_msi_vectors(0);
        let context = attach(&mut platform).unwrap();

        assert_eq!(context.device().generation(), 4);
        assert_eq!(context.pch(), PchVariant::None);
        assert_eq!(
            context.layout().table(),
            [
                mch::SHARED_REGISTER_BASE,
                mch::PIPE_AND_PORT_REGISTER_BASE,
                mch::PLANE_CONTROL_REGISTER_BASE,
                mch::ICH_SHARED_REGISTER_BASE,
                mch::ICH_PORT_REGISTER_BASE,
            ]
        );
        assert_eq!(context.interrupt_strategy(), InterruptStrategy::Legacy);
        assert_eq!(context.interrupt_status(), Ok(InterruptLine::Pin(11)));
        assert!(!context.fake_interrupts());

        let info = context.shared_info();
        assert_eq!(info.register_blocks, context.layout().table());
        assert_eq!(info.vblank_channel, context.channel().id().raw());
        assert!(info.vblank_channel > 0);
        assert_eq!(context.channel().owner(), platform.team);
        assert_eq!(info.pll.reference_frequency, 96000);
        assert_eq!(info.device_identifier(), b"ember_8086_2a02_000200");

        detach(&mut platform, context);
    }

    #[test]
    fn test_scenario_no_line_fake_interrupts() {
        let mut platform = MockPlatform::new(0x2a02).with_interrupt_pin(0);
        platform.fail.configure_msi = true;

        let context = attach(&mut platform).unwrap();
        assert!(context.fake_interrupts());
        assert_eq!(context.interrupt_status(), Err(Error::NoInterruptLine));
        assert!(!context.channel().is_valid());
        assert_eq!(context.channel().id(), ChannelId::INVALID);
        assert_eq!(context.shared_info().vblank_channel, -1);
        assert_eq!(context.interrupts().state(), ControllerState::Uninstalled);
        assert_eq!(context.handle_interrupt(), IrqReturn::Unhandled);
        assert_eq!(
            context.enable_interrupts(PipeSet::ANY, true),
            Err(Error::NoInterruptLine)
        );

        detach(&mut platform, context);
        assert_eq!(platform.count(&MockCall::RemoveHandler(0)), 0);
        assert_eq!(platform.live_areas(), 0);
    }

    #[test]
    fn test_scenario_gen11_icp_hotplug_and_master() {
        let mut platform = MockPlatform::new(0x4e55).with_pch(0x3480);
        let context = attach(&mut platform).unwrap();

        assert_eq!(context.device().generation(), 11);
        assert_eq!(context.pch(), PchVariant::Icp);
        assert_eq!(context.interrupt_strategy(), InterruptStrategy::Gen11);
        assert_eq!(context.interrupt_status(), Ok(InterruptLine::Msi(40)));

        let regs = &platform.registers;
        let hotplug = crate::regs::sde::GMBUS_ICP
            | crate::regs::sde::DDI_HOTPLUG_MASK_ICP
            | crate::regs::sde::TC_HOTPLUG_MASK_ICP;
        assert_eq!(regs.get(0xc400c), hotplug);
        assert_eq!(regs.get(0xc4030), 0x8888);
        assert_eq!(regs.writes_to(0x190010), [crate::regs::gen11::MASTER_IRQ]);

        detach(&mut platform, context);
    }

    #[test]
    fn test_shared_state_published() {
        let mut platform = MockPlatform::new(0x0116)
            .with_pch(0x1c4a)
            .with_setting(crate::settings::HARDWARE_CURSOR_KEY, true);
        platform.edid = Some([0x5a; 128]);
        platform.registers.set(0xc6204, 125);
        let context = attach(&mut platform).unwrap();

        let info = context.shared_info();
        assert_eq!(info.physical_graphics_memory, 0xd000_0000);
        assert_eq!(info.graphics_memory_size, ember_hal::testing::MOCK_APERTURE_SIZE);
        assert_eq!(info.ring_size as u64, RING_SIZE);
        assert_eq!(info.ring_register_base, 0x2030);
        assert_eq!(info.pch_info, PchVariant::Cpt as u32);
        assert_eq!(info.device_type, context.device().type_word());
        assert_eq!(info.registers_area, context.registers_area().0);
        assert_eq!(info.fdi_link_frequency, 270000);
        assert_eq!(info.raw_clock, 125000);
        assert_eq!(info.pll.divisor_register, 0x6040);
        assert_eq!(info.has_vesa_edid_info, 1);
        assert_eq!(info.vesa_edid_info, [0x5a; 128]);

        assert_eq!(info.hardware_cursor_enabled, 1);
        assert_ne!(info.physical_cursor_memory, 0);
        assert_ne!(info.physical_status_page, 0);
        assert_eq!(
            info.physical_overlay_registers,
            0xd000_0000 + info.overlay_offset
        );
        assert!(context.has_command_ring());

        // SandyBridge mobile: downclocking programmed
        assert!(!platform.registers.writes_to(0xa090).is_empty());

        detach(&mut platform, context);
    }

    #[test]
    fn test_physical_bind_failure_degrades() {
        let mut platform = MockPlatform::new(0x2a02);
        platform.fail.bind_physical = true;
        let context = attach(&mut platform).unwrap();

        assert!(context.has_command_ring());
        assert!(context.buffers().overlay.is_none());
        assert!(context.buffers().status_page.is_none());
        assert_eq!(context.shared_info().physical_status_page, 0);
        assert_eq!(context.shared_info().hardware_cursor_enabled, 0);
        detach(&mut platform, context);
    }

    #[test]
    fn test_runtime_allocation_and_interrupt() {
        let mut platform = MockPlatform::new(0x1616).with_pch(0x9c83);
        let mut context = attach(&mut platform).unwrap();

        let before = context.aperture.free_space();
        let block = context
            .allocate_memory(3 * PAGE_SIZE, 0, AllocationFlags::empty())
            .unwrap();
        context.free_memory(block).unwrap();
        assert_eq!(context.aperture.free_space(), before);

        let regs = &platform.registers;
        regs.set(
            0x44200,
            crate::regs::gen8::MASTER_IRQ_CONTROL
                | crate::regs::gen8::de_pipe_irq(ember_core::PipeIndex::A),
        );
        regs.mark_write_one_to_clear(0x44408, !0);
        regs.set(0x44408, crate::regs::gen8::PIPE_VBLANK);
        assert_eq!(context.handle_interrupt(), IrqReturn::Handled);
        assert_eq!(regs.get(0x44408), 0);
        assert_eq!(context.diagnostics().spurious, 0);

        detach(&mut platform, context);
    }

    #[test]
    fn test_platform_reaches_attached_handler() {
        let mut platform = MockPlatform::new(0x1616).with_pch(0x9c83);
        let context = attach(&mut platform).unwrap();
        assert!(context.display_interrupts().is_armed());
        assert_eq!(Arc::strong_count(context.display_interrupts()), 2);

        let regs = Arc::clone(&platform.registers);
        regs.set(
            0x44200,
            crate::regs::gen8::MASTER_IRQ_CONTROL
                | crate::regs::gen8::de_pipe_irq(ember_core::PipeIndex::A),
        );
        regs.mark_write_one_to_clear(0x44408, !0);
        regs.set(0x44408, crate::regs::gen8::PIPE_VBLANK);
        assert_eq!(platform.raise(40), Some(IrqReturn::Handled));
        assert_eq!(regs.get(0x44408), 0);

        let irq = Arc::clone(context.display_interrupts());
        detach(&mut platform, context);
        assert!(!irq.is_armed());
        assert_eq!(platform.raise(40), None);
        assert_eq!(Arc::strong_count(&irq), 1);
    }

    #[test]
    fn test_detach_releases_everything() {
        let mut platform = MockPlatform::new(0x0116)
            .with_pch(0x1c4a)
            .with_setting(crate::settings::HARDWARE_CURSOR_KEY, true);
        let context = attach(&mut platform).unwrap();
        let channel = Arc::clone(context.channel());
        let shared_area = context.shared_area();
        let registers_area = context.registers_area();
        assert_eq!(platform.live_areas(), 2);

        detach(&mut platform, context);

        assert!(!channel.is_valid());
        assert_eq!(platform.count(&MockCall::RemoveHandler(40)), 1);
        assert_eq!(platform.count(&MockCall::DisableMsi), 1);
        assert_eq!(platform.count(&MockCall::UnconfigureMsi), 1);
        assert_eq!(platform.count(&MockCall::UnmapAperture), 1);
        assert_eq!(platform.count(&MockCall::DeleteArea(registers_area)), 1);
        assert_eq!(platform.count(&MockCall::DeleteArea(shared_area)), 1);
        assert_eq!(platform.live_areas(), 0);

        // disarmed: legacy PCH enable register cleared
        assert_eq!(platform.registers.get(0x4400c), 0);
        let tail = &platform.calls()[platform.calls().len() - 6..];
        assert_eq!(
            tail,
            [
                MockCall::RemoveHandler(40),
                MockCall::DisableMsi,
                MockCall::UnconfigureMsi,
                MockCall::UnmapAperture,
                MockCall::DeleteArea(registers_area),
                MockCall::DeleteArea(shared_area),
            ]
        );
    }

    #[test]
    fn test_mmio_failure_unwinds() {
        let mut platform = MockPlatform::new(0x0116).with_pch(0x1c4a);
        platform.fail.map_registers = true;

        assert_eq!(attach(&mut platform).map(|_| ()), Err(Error::MmioMapFailed));
        assert_eq!(platform.live_areas(), 0);
        assert_eq!(platform.count(&MockCall::UnmapAperture), 1);
        assert_eq!(
            platform.calls(),
            [
                MockCall::MapAperture,
                MockCall::CreateArea(SHARED_AREA_NAME.into()),
                MockCall::EnableDevice,
                MockCall::MapRegisters(0),
                MockCall::DeleteArea(ember_core::AreaId(10)),
                MockCall::UnmapAperture,
            ]
        );
    }

    #[test]
    fn test_aperture_and_area_failures() {
        let mut platform = MockPlatform::new(0x2a02);
        platform.fail.map_aperture = true;
        assert_eq!(attach(&mut platform).map(|_| ()), Err(Error::ApertureMapFailed));
        assert_eq!(platform.calls(), [MockCall::MapAperture]);

        let mut platform = MockPlatform::new(0x2a02);
        platform.fail.create_area = true;
        assert_eq!(attach(&mut platform).map(|_| ()), Err(Error::AreaCreateFailed));
        assert_eq!(platform.count(&MockCall::UnmapAperture), 1);
        assert_eq!(platform.live_areas(), 0);
    }

    #[test]
    fn test_unsupported_device() {
        let mut platform = MockPlatform::new(0x1234);
        assert_eq!(attach(&mut platform).map(|_| ()), Err(Error::UnsupportedDevice));
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_gen2_uses_second_bar() {
        let mut platform = MockPlatform::new(0x3577);
        let context = attach(&mut platform).unwrap();
        assert_eq!(platform.count(&MockCall::MapRegisters(1)), 1);
        detach(&mut platform, context);
    }
}
