//! # Hardware Classification
//!
//! Static classification of supported display adapters.
//!
//! Every dispatch decision in the driver (register layout, clock source,
//! interrupt strategy, power sequences) is derived from a [`DeviceType`].
//! Nothing downstream looks at raw PCI ids again.

use core::fmt;

// =============================================================================
// FAMILY / GROUP
// =============================================================================

/// Coarse hardware era
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Family {
    /// i830 .. i865
    I8xx = 1,
    /// i915 .. G45 and PineView
    I9xx = 2,
    /// Series 5: Ironlake through Broadwell
    Series5 = 3,
    /// Atom display (ValleyView, Cherryview)
    Soc0 = 4,
    /// Skylake and later "Lake" parts
    Lake = 5,
}

/// Fine-grained chipset group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Group {
    I830 = 1,
    I845,
    I85x,
    I865,
    I915,
    I945,
    I965,
    G33,
    G4x,
    PineView,
    Ironlake,
    SandyBridge,
    IvyBridge,
    Haswell,
    ValleyView,
    Cherryview,
    Broadwell,
    Skylake,
    KabyLake,
    CoffeeLake,
    CometLake,
    JasperLake,
    TigerLake,
    AlderLake,
}

impl Group {
    /// Family this group belongs to
    pub const fn family(self) -> Family {
        match self {
            Self::I830 | Self::I845 | Self::I85x | Self::I865 => Family::I8xx,
            Self::I915
            | Self::I945
            | Self::I965
            | Self::G33
            | Self::G4x
            | Self::PineView => Family::I9xx,
            Self::Ironlake
            | Self::SandyBridge
            | Self::IvyBridge
            | Self::Haswell
            | Self::Broadwell => Family::Series5,
            Self::ValleyView | Self::Cherryview => Family::Soc0,
            Self::Skylake
            | Self::KabyLake
            | Self::CoffeeLake
            | Self::CometLake
            | Self::JasperLake
            | Self::TigerLake
            | Self::AlderLake => Family::Lake,
        }
    }
}

// =============================================================================
// DEVICE TYPE
// =============================================================================

/// Immutable classification of one adapter model
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DeviceType {
    device_id: u16,
    group: Group,
    mobile: bool,
    ult: bool,
    name: &'static str,
}

const fn entry(device_id: u16, group: Group, mobile: bool, name: &'static str) -> DeviceType {
    DeviceType {
        device_id,
        group,
        mobile,
        ult: false,
        name,
    }
}

/// Ultra-low-power package of a mobile part
const fn ult(device: DeviceType) -> DeviceType {
    DeviceType { ult: true, ..device }
}

static SUPPORTED: &[DeviceType] = &[
    entry(0x3577, Group::I830, true, "i830GM"),
    entry(0x2562, Group::I845, false, "i845G"),
    entry(0x3582, Group::I85x, true, "i855G"),
    entry(0x2572, Group::I865, false, "i865G"),
    entry(0x2582, Group::I915, false, "i915G"),
    entry(0x2592, Group::I915, true, "i915GM"),
    entry(0x2772, Group::I945, false, "i945G"),
    entry(0x27a2, Group::I945, true, "i945GM"),
    entry(0x29a2, Group::I965, false, "i965G"),
    entry(0x2a02, Group::I965, true, "i965GM"),
    entry(0x29c2, Group::G33, false, "G33G"),
    entry(0x2a42, Group::G4x, true, "GM45"),
    entry(0x2e22, Group::G4x, false, "G45"),
    entry(0xa001, Group::PineView, false, "Atom D4xx"),
    entry(0xa011, Group::PineView, true, "Atom N4xx"),
    entry(0x0042, Group::Ironlake, false, "IronLake Desktop"),
    entry(0x0046, Group::Ironlake, true, "IronLake Mobile"),
    entry(0x0102, Group::SandyBridge, false, "SandyBridge Desktop GT1"),
    entry(0x0106, Group::SandyBridge, true, "SandyBridge Mobile GT1"),
    entry(0x0112, Group::SandyBridge, false, "SandyBridge Desktop GT2"),
    entry(0x0116, Group::SandyBridge, true, "SandyBridge Mobile GT2"),
    entry(0x0126, Group::SandyBridge, true, "SandyBridge Mobile GT2+"),
    entry(0x010a, Group::SandyBridge, false, "SandyBridge Server"),
    entry(0x0152, Group::IvyBridge, false, "IvyBridge Desktop GT1"),
    entry(0x0156, Group::IvyBridge, true, "IvyBridge Mobile GT1"),
    entry(0x0162, Group::IvyBridge, false, "IvyBridge Desktop GT2"),
    entry(0x0166, Group::IvyBridge, true, "IvyBridge Mobile GT2"),
    entry(0x015a, Group::IvyBridge, false, "IvyBridge Server GT1"),
    entry(0x0402, Group::Haswell, false, "Haswell Desktop GT1"),
    entry(0x0412, Group::Haswell, false, "Haswell Desktop GT2"),
    entry(0x0416, Group::Haswell, true, "Haswell Mobile GT2"),
    ult(entry(0x0a16, Group::Haswell, true, "Haswell ULT GT2")),
    entry(0x0155, Group::ValleyView, false, "ValleyView Desktop"),
    entry(0x0f30, Group::ValleyView, true, "ValleyView Mobile"),
    entry(0x22b0, Group::Cherryview, true, "Cherryview"),
    ult(entry(0x1616, Group::Broadwell, true, "Broadwell ULT GT2")),
    entry(0x1612, Group::Broadwell, true, "Broadwell GT2"),
    ult(entry(0x1626, Group::Broadwell, true, "Broadwell ULT GT3")),
    entry(0x1912, Group::Skylake, false, "Skylake GT2"),
    entry(0x1916, Group::Skylake, true, "Skylake U GT2"),
    entry(0x191b, Group::Skylake, true, "Skylake H GT2"),
    entry(0x5912, Group::KabyLake, false, "KabyLake GT2"),
    entry(0x5916, Group::KabyLake, true, "KabyLake U GT2"),
    entry(0x3e92, Group::CoffeeLake, false, "CoffeeLake GT2"),
    entry(0x3ea0, Group::CoffeeLake, true, "WhiskeyLake GT2"),
    entry(0x9bc8, Group::CometLake, false, "CometLake GT2"),
    entry(0x9b41, Group::CometLake, true, "CometLake U GT2"),
    entry(0x4e55, Group::JasperLake, true, "JasperLake"),
    entry(0x4e71, Group::JasperLake, true, "JasperLake"),
    entry(0x9a49, Group::TigerLake, true, "TigerLake GT2"),
    entry(0x9a78, Group::TigerLake, true, "TigerLake GT2"),
    entry(0x4680, Group::AlderLake, false, "AlderLake-S GT1"),
    entry(0x46a6, Group::AlderLake, true, "AlderLake-P GT2"),
];

impl DeviceType {
    /// Classify a PCI device id
    pub fn lookup(device_id: u16) -> Option<DeviceType> {
        let found = SUPPORTED.iter().find(|t| t.device_id == device_id).copied();
        if found.is_none() {
            log::debug!("EMBER: device 0x{:04x} is not supported", device_id);
        }
        found
    }

    /// PCI device id
    #[inline]
    pub const fn device_id(&self) -> u16 {
        self.device_id
    }

    /// Marketing name
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Chipset group
    #[inline]
    pub const fn group(&self) -> Group {
        self.group
    }

    /// Hardware era
    #[inline]
    pub const fn family(&self) -> Family {
        self.group.family()
    }

    /// Check the group
    #[inline]
    pub fn in_group(&self, group: Group) -> bool {
        self.group == group
    }

    /// Check the family
    #[inline]
    pub fn in_family(&self, family: Family) -> bool {
        self.family() == family
    }

    /// Mobile (or ULT/ULX) SKU
    #[inline]
    pub const fn is_mobile(&self) -> bool {
        self.mobile
    }

    /// Ultra-low-power (ULT) package
    #[inline]
    pub const fn is_ult(&self) -> bool {
        self.ult
    }

    /// Graphics generation, monotonic across groups
    pub const fn generation(&self) -> u32 {
        match self.group {
            Group::I830 | Group::I845 | Group::I85x | Group::I865 => 2,
            Group::I915 | Group::I945 | Group::G33 | Group::PineView => 3,
            Group::I965 | Group::G4x => 4,
            Group::Ironlake => 5,
            Group::SandyBridge => 6,
            Group::IvyBridge | Group::Haswell | Group::ValleyView => 7,
            Group::Cherryview | Group::Broadwell => 8,
            Group::Skylake | Group::KabyLake | Group::CoffeeLake | Group::CometLake => 9,
            Group::JasperLake => 11,
            Group::TigerLake | Group::AlderLake => 12,
        }
    }

    /// Display uses DDI ports
    pub fn has_ddi(&self) -> bool {
        self.in_group(Group::Haswell) || (self.generation() >= 8 && !self.in_family(Family::Soc0))
    }

    /// Skylake-derived display engine (Skylake, KabyLake, CoffeeLake, CometLake)
    pub fn is_skylake_style(&self) -> bool {
        matches!(
            self.group,
            Group::Skylake | Group::KabyLake | Group::CoffeeLake | Group::CometLake
        )
    }

    /// Number of display pipes
    pub fn pipe_count(&self) -> u32 {
        if (self.generation() >= 7 && !self.in_family(Family::Soc0))
            || self.in_group(Group::Cherryview)
        {
            3
        } else {
            2
        }
    }

    /// Packed type word published to the compositor
    ///
    /// Layout: family in bits 31:24, group in bits 15:8, mobile in bit 0.
    pub const fn type_word(&self) -> u32 {
        ((self.family() as u32) << 24) | ((self.group as u32) << 8) | (self.mobile as u32)
    }
}

impl fmt::Debug for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceType")
            .field("device_id", &format_args!("0x{:04x}", self.device_id))
            .field("name", &self.name)
            .field("group", &self.group)
            .field("generation", &self.generation())
            .field("mobile", &self.mobile)
            .field("ult", &self.ult)
            .finish()
    }
}

// =============================================================================
// PCH VARIANT
// =============================================================================

/// Platform Controller Hub variant
///
/// Ordered by introduction so `>=` comparisons select newer hubs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum PchVariant {
    /// No PCH (display fully in the graphics device)
    #[default]
    None = 0,
    /// Ibex Peak
    Ibx,
    /// Cougar Point
    Cpt,
    /// Panther Point
    Ppt,
    /// Lynx Point (and Wildcat Point)
    Lpt,
    /// Sunrise Point
    Spt,
    /// Kaby Point
    Kbp,
    /// Cannon Point (and Comet Point)
    Cnp,
    /// Ice Point
    Icp,
    /// Jasper Point
    Jsp,
    /// Mule Creek Canyon
    Mcc,
    /// Tiger Point
    Tgp,
    /// Alder Point
    Adp,
}

/// Significant bits of a PCH ISA bridge device id
pub const PCH_DEVICE_ID_MASK: u16 = 0xff80;

impl PchVariant {
    /// Classify a PCH from its ISA bridge device id
    pub fn from_isa_bridge(device_id: u16) -> Self {
        match device_id & PCH_DEVICE_ID_MASK {
            0x3b00 => Self::Ibx,
            0x1c00 => Self::Cpt,
            0x1e00 => Self::Ppt,
            0x8c00 | 0x9c00 | 0x8c80 | 0x9c80 => Self::Lpt,
            0xa100 | 0x9d00 => Self::Spt,
            0xa280 | 0xa380 => Self::Kbp,
            0xa300 | 0x9d80 | 0x0280 | 0x0680 => Self::Cnp,
            0x3480 => Self::Icp,
            0x4d80 | 0x3880 => Self::Jsp,
            0x4b00 => Self::Mcc,
            0xa080 | 0x4380 => Self::Tgp,
            0x7a80 | 0x5180 | 0x7a00 | 0x5480 => Self::Adp,
            _ => Self::None,
        }
    }

    /// Check if a PCH is present
    #[inline]
    pub fn is_present(self) -> bool {
        self != Self::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_unknown() {
        assert!(DeviceType::lookup(0xffff).is_none());
    }

    #[test]
    fn test_generations_monotonic_by_era() {
        let gm965 = DeviceType::lookup(0x2a02).unwrap();
        let snb = DeviceType::lookup(0x0116).unwrap();
        let jsl = DeviceType::lookup(0x4e55).unwrap();
        assert_eq!(gm965.generation(), 4);
        assert_eq!(snb.generation(), 6);
        assert_eq!(jsl.generation(), 11);
        assert!(snb.is_mobile());
        assert_eq!(snb.family(), Family::Series5);
    }

    #[test]
    fn test_ult_parts_flagged() {
        for id in [0x0a16, 0x1616, 0x1626] {
            let device = DeviceType::lookup(id).unwrap();
            assert!(device.is_ult(), "0x{:04x}", id);
            assert!(device.is_mobile());
        }
        for id in [0x0416, 0x0402, 0x1612, 0x1916, 0x0116] {
            assert!(!DeviceType::lookup(id).unwrap().is_ult(), "0x{:04x}", id);
        }
    }

    #[test]
    fn test_ddi_and_pipes() {
        let hsw = DeviceType::lookup(0x0416).unwrap();
        let vlv = DeviceType::lookup(0x0f30).unwrap();
        let chv = DeviceType::lookup(0x22b0).unwrap();
        let g45 = DeviceType::lookup(0x2e22).unwrap();
        assert!(hsw.has_ddi());
        assert!(!vlv.has_ddi());
        assert!(!chv.has_ddi());
        assert_eq!(hsw.pipe_count(), 3);
        assert_eq!(vlv.pipe_count(), 2);
        assert_eq!(chv.pipe_count(), 3);
        assert_eq!(g45.pipe_count(), 2);
    }

    #[test]
    fn test_skylake_style() {
        assert!(DeviceType::lookup(0x5916).unwrap().is_skylake_style());
        assert!(!DeviceType::lookup(0x9a49).unwrap().is_skylake_style());
    }

    #[test]
    fn test_pch_ordering() {
        assert_eq!(PchVariant::from_isa_bridge(0x1c4a), PchVariant::Cpt);
        assert_eq!(PchVariant::from_isa_bridge(0x3482), PchVariant::Icp);
        assert_eq!(PchVariant::from_isa_bridge(0x1234), PchVariant::None);
        assert!(PchVariant::Tgp >= PchVariant::Icp);
        assert!(PchVariant::Ibx < PchVariant::Cnp);
        assert!(!PchVariant::None.is_present());
    }
}
