//! Driver loader
//!
//! Turns a device descriptor into a bound [`DeviceNode`]: the driver is
//! resolved from the module name, the node is backed by a pool chunk when an
//! object pool is configured, the property subtree named by the match
//! attribute is attached, and public or capacity nodes are bound.

use alloc::format;
use alloc::sync::Arc;

use hdf_api::error::{bind_failed, unsupported, ErrorContext, Result};
use hdf_api::property::EmptyProperties;
use hdf_api::{DeviceInfo, PropertyNode, PropertyResolver};
use hdf_memory::ObjectPool;
use hdf_services::{DeviceObject, ServiceObserver};

use crate::driver::{Driver, DriverHooks, DriverTable};
use crate::node::DeviceNode;

/// Bytes reserved from the object pool for each node
pub const NODE_CHUNK_SIZE: usize = core::mem::size_of::<DeviceNode>();

/// Loads and unloads device nodes
pub struct DriverLoader {
    drivers: Arc<DriverTable>,
    properties: Arc<dyn PropertyResolver>,
    pool: Option<Arc<ObjectPool>>,
}

impl DriverLoader {
    /// Loader without a configuration tree or object pool
    pub fn new(drivers: Arc<DriverTable>) -> Self {
        Self {
            drivers,
            properties: Arc::new(EmptyProperties),
            pool: None,
        }
    }

    pub fn with_properties(mut self, properties: Arc<dyn PropertyResolver>) -> Self {
        self.properties = properties;
        self
    }

    /// Back every node with a chunk of `pool`
    pub fn with_pool(mut self, pool: Arc<ObjectPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn drivers(&self) -> &Arc<DriverTable> {
        &self.drivers
    }

    /// Build and bind the node described by `info`.
    ///
    /// `observer` is the observer of the host the node will live in; the
    /// node's object subscribes through it. On failure everything allocated
    /// for the node is released again.
    pub fn load_node(&self, info: &DeviceInfo, observer: &Arc<ServiceObserver>) -> Result<DeviceNode> {
        let driver = self
            .drivers
            .get_driver(&info.module_name)
            .context("no driver for module")?;

        let slot = match self.pool.as_ref() {
            Some(pool) => Some(pool.obtain(NODE_CHUNK_SIZE).context(&info.svc_name)?),
            None => None,
        };

        let property = match self.properties.resolve(&info.device_match_attr) {
            Some(property) => property,
            None => {
                log::warn!(
                    "loader: no property node for {} (match attr '{}')",
                    info.svc_name,
                    info.device_match_attr
                );
                Arc::new(PropertyNode::new(""))
            }
        };

        let object = Arc::new(
            DeviceObject::new(&info.svc_name, info.match_id())
                .with_policy(info.policy)
                .with_property(property)
                .with_observer(observer.clone()),
        );

        if info.policy.is_addressable() {
            if !driver.hooks().contains(DriverHooks::BIND) {
                log::error!("loader: driver {} has no bind hook", info.module_name);
                return Err(unsupported(&format!("{}: bind", info.module_name)));
            }
            if let Err(err) = driver.bind(&object) {
                log::error!("loader: bind of {} failed: {}", info.module_name, err);
                return Err(bind_failed(&format!("{}: bind: {}", info.module_name, err)));
            }
        }

        log::debug!("loader: node {} loaded with {}", info.svc_name, info.module_name);
        Ok(DeviceNode::new(info.clone(), driver, object, slot))
    }

    /// Run the release hook of the driver behind `info` against `object`
    pub fn unload_node(&self, info: &DeviceInfo, object: &Arc<DeviceObject>) -> Result<()> {
        let driver = self
            .drivers
            .get_driver(&info.module_name)
            .context("no driver for module")?;
        if !driver.hooks().contains(DriverHooks::RELEASE) {
            log::info!("loader: driver {} has no release hook", info.module_name);
            return Ok(());
        }
        driver.release(object);
        Ok(())
    }
}
