//! Boot-time host and device tables
//!
//! The device manager learns which hosts exist and which devices each host
//! carries through an [`AttributeProvider`]. [`DeviceTable`] is the in-memory
//! provider: it is built in code or, with the `serde` feature, deserialized
//! from a configuration blob.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::core::types::HostId;
use crate::device_info::DeviceInfo;
use crate::error::{Error, Result};

/// Identity of a device host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub host_id: HostId,
    pub host_name: String,
    pub priority: u16,
}

/// Source of host and device descriptors
pub trait AttributeProvider: Send + Sync {
    /// Hosts to start, in start order
    fn host_list(&self) -> Vec<HostInfo>;

    /// Devices of `host_id`, sorted by ascending priority
    fn device_list(&self, host_id: HostId) -> Vec<DeviceInfo>;
}

/// Devices carried by one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostTable {
    pub host_id: HostId,
    pub host_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: u16,
    #[cfg_attr(feature = "serde", serde(default))]
    pub devices: Vec<DeviceInfo>,
}

impl HostTable {
    pub fn new(host_id: HostId, host_name: &str) -> Self {
        Self {
            host_id,
            host_name: host_name.to_string(),
            priority: 0,
            devices: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    /// Add a device, forcing its host id to this host
    pub fn with_device(mut self, mut device: DeviceInfo) -> Self {
        device.host_id = self.host_id;
        self.devices.push(device);
        self
    }
}

/// Whole-system device table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceTable {
    #[cfg_attr(feature = "serde", serde(default))]
    pub hosts: Vec<HostTable>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: HostTable) -> Self {
        self.hosts.push(host);
        self
    }

    /// Check the table for entries the device manager could not honor.
    ///
    /// Host ids must be unique, every device needs a module and a service
    /// name, and service names must be unique across the whole table.
    pub fn validate(&self) -> Result<()> {
        for (index, host) in self.hosts.iter().enumerate() {
            if self.hosts[..index].iter().any(|other| other.host_id == host.host_id) {
                return Err(Error::ConfigError(format!("duplicate host id {}", host.host_id)));
            }
        }
        let mut names: Vec<&str> = Vec::new();
        for device in self.hosts.iter().flat_map(|host| host.devices.iter()) {
            device.validate()?;
            if names.contains(&device.svc_name.as_str()) {
                return Err(Error::ConfigError(format!(
                    "duplicate service name {}",
                    device.svc_name
                )));
            }
            names.push(device.svc_name.as_str());
        }
        Ok(())
    }
}

impl AttributeProvider for DeviceTable {
    fn host_list(&self) -> Vec<HostInfo> {
        let mut hosts: Vec<HostInfo> = self
            .hosts
            .iter()
            .map(|host| HostInfo {
                host_id: host.host_id,
                host_name: host.host_name.clone(),
                priority: host.priority,
            })
            .collect();
        hosts.sort_by_key(|host| host.priority);
        hosts
    }

    fn device_list(&self, host_id: HostId) -> Vec<DeviceInfo> {
        let Some(host) = self.hosts.iter().find(|host| host.host_id == host_id) else {
            return Vec::new();
        };
        let mut devices: Vec<DeviceInfo> = host
            .devices
            .iter()
            .cloned()
            .map(|mut device| {
                device.host_id = host_id;
                device
            })
            .collect();
        devices.sort_by_key(|device| device.priority);
        devices
    }
}
