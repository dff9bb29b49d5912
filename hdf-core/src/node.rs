//! Device nodes
//!
//! A node is the unit a driver binds to. It carries the descriptor it was
//! loaded from, the driver serving it and the [`DeviceObject`] other drivers
//! reach it through. Exactly one node stands behind each published service
//! name.

use alloc::format;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

use hdf_api::error::{bind_failed, unsupported, Result};
use hdf_api::DeviceInfo;
use hdf_memory::PoolSlot;
use hdf_services::{DevSvcManager, DeviceObject, ServiceObserver};

use crate::driver::{Driver, DriverHooks};

/// Bound driver instance
pub struct DeviceNode {
    info: DeviceInfo,
    driver: Arc<dyn Driver>,
    object: Arc<DeviceObject>,
    /// Pool chunk backing the node, when the loader draws from a pool
    slot: Mutex<Option<PoolSlot>>,
    published: AtomicBool,
}

impl DeviceNode {
    pub(crate) fn new(
        info: DeviceInfo,
        driver: Arc<dyn Driver>,
        object: Arc<DeviceObject>,
        slot: Option<PoolSlot>,
    ) -> Self {
        Self {
            info,
            driver,
            object,
            slot: Mutex::new(slot),
            published: AtomicBool::new(false),
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn object(&self) -> &Arc<DeviceObject> {
        &self.object
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    /// Whether the node was loaded for `module_name` under `svc_name`
    pub fn matches(&self, module_name: &str, svc_name: &str) -> bool {
        self.info.matches(module_name, svc_name)
    }

    /// Run the driver's init hook, then publish the node.
    ///
    /// Public and capacity nodes go to the registry and the host observer,
    /// private nodes to the host observer only.
    pub fn launch(&self, registry: &DevSvcManager, observer: &ServiceObserver) -> Result<()> {
        let module = self.info.module_name.as_str();
        if !self.driver.hooks().contains(DriverHooks::INIT) {
            log::error!("node {}: driver {} has no init hook", self.info.svc_name, module);
            return Err(unsupported(&format!("{}: init", module)));
        }
        if let Err(err) = self.driver.init(&self.object) {
            log::error!("node {}: init of {} failed: {}", self.info.svc_name, module, err);
            return Err(bind_failed(&format!("{}: init: {}", module, err)));
        }
        self.publish(registry, observer)
    }

    fn publish(&self, registry: &DevSvcManager, observer: &ServiceObserver) -> Result<()> {
        let name = self.info.svc_name.as_str();
        let policy = self.info.policy;
        if policy.is_addressable() {
            registry.add_service(name, self.object.clone())?;
        }
        // Set before notifying, a subscriber may tear the node down
        self.published.store(true, Ordering::Release);
        if let Err(err) = observer.publish(name, self.object.match_id(), policy, self.object.clone()) {
            self.published.store(false, Ordering::Release);
            if policy.is_addressable() {
                registry.remove_object(name, &self.object);
            }
            return Err(err);
        }
        log::info!("node {} published ({})", name, policy);
        Ok(())
    }

    /// Withdraw the node's service and return its resources.
    ///
    /// Only records still pointing at this node's object are removed, so a
    /// node that lost a name race never unpublishes the winner.
    pub fn teardown(&self, registry: &DevSvcManager, observer: &ServiceObserver) {
        let name = self.info.svc_name.as_str();
        if self.published.swap(false, Ordering::AcqRel) {
            if self.info.policy.is_addressable() {
                registry.remove_object(name, &self.object);
            }
            observer.remove_publisher(name, &self.object);
        }
        self.object.take_service();
        self.slot.lock().take();
        log::debug!("node {} torn down", name);
    }
}

impl core::fmt::Debug for DeviceNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceNode")
            .field("module_name", &self.info.module_name)
            .field("svc_name", &self.info.svc_name)
            .field("published", &self.is_published())
            .finish()
    }
}
