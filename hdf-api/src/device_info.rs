//! Static device descriptors
//!
//! A [`DeviceInfo`] tells the device manager which driver module to load for a
//! device, under which service name the result is published and with which
//! visibility. Descriptors come from the boot device table or from a dynamic
//! registration and are never modified once handed to the manager.

use alloc::string::{String, ToString};

use crate::core::types::{
    make_hardware_id, DeviceId, DeviceType, HostId, MatchId, Permission, PreloadMode, ServicePolicy,
};
use crate::error::{check_name, Result};

/// Static descriptor of one device service
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// Name of the driver module implementing the device
    pub module_name: String,
    /// Name the device's service is published under
    pub svc_name: String,
    /// Key into the configuration tree
    #[cfg_attr(feature = "serde", serde(default))]
    pub device_match_attr: String,
    /// Owning host
    #[cfg_attr(feature = "serde", serde(default))]
    pub host_id: HostId,
    /// Device identifier inside the host
    #[cfg_attr(feature = "serde", serde(default))]
    pub device_id: DeviceId,
    /// Visibility of the published service
    #[cfg_attr(feature = "serde", serde(default))]
    pub policy: ServicePolicy,
    /// Load order, lower first
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: u16,
    /// Load stage
    #[cfg_attr(feature = "serde", serde(default))]
    pub preload: PreloadMode,
    /// Access permission of the service node
    #[cfg_attr(feature = "serde", serde(default = "Permission::default_service"))]
    pub permission: Permission,
    #[cfg_attr(feature = "serde", serde(default))]
    pub device_type: DeviceType,
    /// Added at runtime through dynamic registration
    #[cfg_attr(feature = "serde", serde(skip))]
    pub is_dynamic: bool,
}

impl DeviceInfo {
    /// Create a descriptor with default policy, priority and preload mode
    pub fn new(module_name: &str, svc_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            svc_name: svc_name.to_string(),
            device_match_attr: String::new(),
            host_id: 0,
            device_id: 0,
            policy: ServicePolicy::default(),
            priority: 0,
            preload: PreloadMode::default(),
            permission: Permission::default_service(),
            device_type: DeviceType::default(),
            is_dynamic: false,
        }
    }

    pub fn with_ids(mut self, host_id: HostId, device_id: DeviceId) -> Self {
        self.host_id = host_id;
        self.device_id = device_id;
        self
    }

    pub fn with_policy(mut self, policy: ServicePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_preload(mut self, preload: PreloadMode) -> Self {
        self.preload = preload;
        self
    }

    pub fn with_match_attr(mut self, match_attr: &str) -> Self {
        self.device_match_attr = match_attr.to_string();
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    /// Hardware id of the device, used as its match id
    pub fn match_id(&self) -> MatchId {
        make_hardware_id(self.host_id, self.device_id)
    }

    /// Reject descriptors that cannot be loaded
    pub fn validate(&self) -> Result<()> {
        check_name("module", &self.module_name)?;
        check_name("service", &self.svc_name)
    }

    /// Whether this descriptor describes `module_name` published as `svc_name`
    pub fn matches(&self, module_name: &str, svc_name: &str) -> bool {
        self.module_name == module_name && self.svc_name == svc_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let info = DeviceInfo::new("i2c_driver", "i2c_service")
            .with_ids(2, 5)
            .with_policy(ServicePolicy::Capacity)
            .with_priority(50)
            .with_preload(PreloadMode::Disable)
            .with_match_attr("i2c_bus_0");
        assert_eq!(info.match_id(), (2 << 16) | 5);
        assert_eq!(info.policy, ServicePolicy::Capacity);
        assert_eq!(info.device_match_attr, "i2c_bus_0");
        assert!(!info.is_dynamic);
        assert!(info.matches("i2c_driver", "i2c_service"));
        assert!(!info.matches("i2c_driver", "other"));
    }

    #[test]
    fn test_validate() {
        assert!(DeviceInfo::new("m", "s").validate().is_ok());
        assert!(DeviceInfo::new("", "s").validate().is_err());
        assert!(DeviceInfo::new("m", "").validate().is_err());
    }
}
