//! Device hosts
//!
//! A host owns the devices of one host id and the service observer its
//! drivers subscribe through. Services of every policy are published on the
//! host observer; public and capacity services additionally go to the shared
//! registry.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use hdf_api::error::{invalid_argument, not_found, Result};
use hdf_api::{DeviceId, DeviceInfo, HostId, LockedList};
use hdf_services::{DevSvcManager, DeviceObject, ServiceObserver};

use crate::device::Device;
use crate::loader::DriverLoader;

/// Container of the devices of one host
pub struct DeviceHost {
    host_id: HostId,
    host_name: String,
    devices: LockedList<Arc<Device>>,
    observer: Arc<ServiceObserver>,
    registry: Arc<DevSvcManager>,
    loader: Arc<DriverLoader>,
}

impl DeviceHost {
    pub fn new(host_id: HostId, host_name: &str, registry: Arc<DevSvcManager>, loader: Arc<DriverLoader>) -> Self {
        Self {
            host_id,
            host_name: host_name.to_string(),
            devices: LockedList::new(),
            observer: Arc::new(ServiceObserver::new()),
            registry,
            loader,
        }
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Observer host-local subscriptions go through
    pub fn observer(&self) -> &Arc<ServiceObserver> {
        &self.observer
    }

    /// Device `device_id`, created and announced for an attach if missing
    fn reserve_device(&self, device_id: DeviceId) -> Arc<Device> {
        self.devices.with(|devices| {
            let device = match devices.iter().find(|device| device.device_id() == device_id) {
                Some(device) => device.clone(),
                None => {
                    let device = Arc::new(Device::new(self.host_id, device_id));
                    devices.push(device.clone());
                    device
                }
            };
            device.reserve();
            device
        })
    }

    fn drop_if_idle(&self, device: &Arc<Device>) {
        if self
            .devices
            .remove_first(|entry| Arc::ptr_eq(entry, device) && entry.is_idle())
            .is_some()
        {
            log::debug!("host {}: device {} removed", self.host_name, device.device_id());
        }
    }

    /// Load the node described by `info` and attach it to its device.
    ///
    /// Returns the node's device object. A failed load leaves the other
    /// nodes of the device alone; a device left without nodes is dropped.
    pub fn add_device(&self, info: &DeviceInfo) -> Result<Arc<DeviceObject>> {
        if info.host_id != self.host_id {
            return Err(invalid_argument("device belongs to another host"));
        }
        let node = Arc::new(self.loader.load_node(info, &self.observer)?);

        let device = self.reserve_device(info.device_id);
        let attached = device.attach(node.clone(), &self.registry, &self.observer);
        device.unreserve();
        if let Err(err) = attached {
            log::error!("host {}: failed to attach {}: {}", self.host_name, info.svc_name, err);
            self.drop_if_idle(&device);
            return Err(err);
        }

        log::info!("host {}: {} loaded", self.host_name, info.svc_name);
        Ok(node.object().clone())
    }

    /// Unload the node loaded for `info`.
    ///
    /// The driver's release hook runs first, then the node is unpublished.
    /// The result of the release step is returned once the node is gone.
    pub fn del_device(&self, info: &DeviceInfo) -> Result<()> {
        let device = self
            .devices
            .find_map(|device| (device.device_id() == info.device_id).then(|| device.clone()));
        let Some(device) = device else {
            log::warn!("host {}: no device {} to delete", self.host_name, info.device_id);
            return Err(not_found(&info.svc_name));
        };
        let Some(node) = device.detach(&info.module_name, &info.svc_name) else {
            return Err(not_found(&info.svc_name));
        };

        let released = self.loader.unload_node(info, node.object());
        node.teardown(&self.registry, &self.observer);
        self.drop_if_idle(&device);
        log::info!("host {}: {} unloaded", self.host_name, info.svc_name);
        released
    }

    /// Device object published under `svc_name` by a node of this host
    pub fn find_object(&self, svc_name: &str) -> Option<Arc<DeviceObject>> {
        self.devices
            .snapshot()
            .iter()
            .find_map(|device| device.find_node(svc_name))
            .map(|node| node.object().clone())
    }

    /// Current devices
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.snapshot()
    }

    /// Release and tear down every node of every device.
    ///
    /// Returns the number of nodes torn down.
    pub fn destroy(&self) -> usize {
        let mut count = 0;
        for device in self.devices.flush() {
            for node in device.nodes() {
                if let Err(err) = self.loader.unload_node(node.info(), node.object()) {
                    log::warn!("host {}: release of {} failed: {}", self.host_name, node.info().svc_name, err);
                }
            }
            count += device.destroy(&self.registry, &self.observer);
        }
        log::info!("host {}: destroyed, {} nodes torn down", self.host_name, count);
        count
    }
}
