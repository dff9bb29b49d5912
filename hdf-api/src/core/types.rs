//! Core types used throughout the driver framework

use core::fmt;

use bitflags::bitflags;

/// Device host identifier type
pub type HostId = u16;

/// Device identifier type, unique inside one host
pub type DeviceId = u16;

/// Identifier gating the visibility of private services
pub type MatchId = u32;

/// Match id used by subscribers that are not bound to a device node
pub const ANONYMOUS_MATCH_ID: MatchId = 0;

/// Build the hardware id of a device from its host and device identifiers.
///
/// The hardware id doubles as the match id a device node publishes and
/// subscribes with, so two nodes agree on it only when they describe the
/// same physical device.
pub const fn make_hardware_id(host_id: HostId, device_id: DeviceId) -> MatchId {
    ((host_id as u32) << 16) | device_id as u32
}

/// Visibility scope of a published service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ServicePolicy {
    /// Service is published in the registry and visible to everyone
    #[default]
    Public,
    /// Service is published in the registry as a capability provider
    Capacity,
    /// Service is only visible to subscribers with the publisher's match id
    Private,
}

impl ServicePolicy {
    /// Whether a node with this policy exposes a named, addressable service
    pub const fn is_addressable(self) -> bool {
        matches!(self, ServicePolicy::Public | ServicePolicy::Capacity)
    }

    /// Visibility gate shared by every publish/subscribe path.
    ///
    /// A subscriber sees the publisher when the policy is not private or when
    /// it knows the exact match id the publisher used.
    pub const fn is_visible_to(self, publisher: MatchId, subscriber: MatchId) -> bool {
        !matches!(self, ServicePolicy::Private) || publisher == subscriber
    }
}

impl fmt::Display for ServicePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServicePolicy::Public => write!(f, "public"),
            ServicePolicy::Capacity => write!(f, "capacity"),
            ServicePolicy::Private => write!(f, "private"),
        }
    }
}

/// When the device manager loads a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PreloadMode {
    /// Loaded while the device manager starts
    #[default]
    Enable,
    /// Loaded by the second boot stage
    EnableStep2,
    /// Loaded on demand only
    Disable,
}

/// Class of a device, used to filter service enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum DeviceClass {
    #[default]
    Default = 1,
    Plat = 2,
    Sensor = 3,
    Input = 4,
    Display = 5,
    Audio = 6,
    Camera = 7,
    Usb = 8,
}

impl DeviceClass {
    /// Decode a class from its wire representation
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(DeviceClass::Default),
            2 => Some(DeviceClass::Plat),
            3 => Some(DeviceClass::Sensor),
            4 => Some(DeviceClass::Input),
            5 => Some(DeviceClass::Display),
            6 => Some(DeviceClass::Audio),
            7 => Some(DeviceClass::Camera),
            8 => Some(DeviceClass::Usb),
            _ => None,
        }
    }

    /// Wire representation of the class
    pub const fn as_raw(self) -> u8 {
        self as u8
    }
}

/// Where the service of a device lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeviceType {
    #[default]
    Local,
    Remote,
}

bitflags! {
    /// Access permission bits of a device service node
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Permission: u16 {
        const OTHER_EXEC = 0o001;
        const OTHER_WRITE = 0o002;
        const OTHER_READ = 0o004;
        const GROUP_EXEC = 0o010;
        const GROUP_WRITE = 0o020;
        const GROUP_READ = 0o040;
        const OWNER_EXEC = 0o100;
        const OWNER_WRITE = 0o200;
        const OWNER_READ = 0o400;
    }
}

impl Permission {
    /// Owner read/write, group and other read
    pub const fn default_service() -> Self {
        Self::from_bits_truncate(0o644)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_id() {
        assert_eq!(make_hardware_id(0, 0), 0);
        assert_eq!(make_hardware_id(1, 2), 0x0001_0002);
        assert_ne!(make_hardware_id(1, 2), make_hardware_id(2, 1));
    }

    #[test]
    fn test_visibility_gate() {
        assert!(ServicePolicy::Public.is_visible_to(7, 9));
        assert!(ServicePolicy::Capacity.is_visible_to(7, 9));
        assert!(!ServicePolicy::Private.is_visible_to(7, 9));
        assert!(ServicePolicy::Private.is_visible_to(7, 7));
    }

    #[test]
    fn test_device_class_round_trip() {
        for raw in 1..=8u8 {
            let class = DeviceClass::from_raw(raw).unwrap();
            assert_eq!(class.as_raw(), raw);
        }
        assert_eq!(DeviceClass::from_raw(0), None);
        assert_eq!(DeviceClass::from_raw(9), None);
    }

    #[test]
    fn test_default_permission() {
        let perm = Permission::default_service();
        assert!(perm.contains(Permission::OWNER_READ | Permission::OWNER_WRITE));
        assert!(!perm.contains(Permission::OTHER_WRITE));
    }
}
