//! Driver settings read once at attach.

use ember_hal::Platform;

/// Setting enabling the hardware cursor
pub const HARDWARE_CURSOR_KEY: &str = "hardware_cursor";

/// Runtime driver settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverSettings {
    /// Allocate a cursor buffer and let the compositor use the hardware cursor
    pub hardware_cursor: bool,
}

impl DriverSettings {
    /// Read the settings through the platform
    pub fn load<P: Platform + ?Sized>(platform: &P) -> Self {
        let settings = Self {
            hardware_cursor: platform.setting_bool(HARDWARE_CURSOR_KEY, false),
        };
        log::debug!("EMBER: settings {:?}", settings);
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_hal::testing::MockPlatform;

    #[test]
    fn test_defaults_off() {
        let platform = MockPlatform::new(0x2a02);
        assert_eq!(DriverSettings::load(&platform), DriverSettings::default());
    }

    #[test]
    fn test_cursor_enabled() {
        let platform = MockPlatform::new(0x2a02).with_setting(HARDWARE_CURSOR_KEY, true);
        assert!(DriverSettings::load(&platform).hardware_cursor);
    }
}
