//! Driver contract and the static driver table
//!
//! A driver binds to device nodes through three hooks, run in a fixed order:
//! `bind` and `init` while a node is loaded, `release` when it is unloaded.
//! Which hooks a driver provides is declared through [`DriverHooks`]; the
//! framework never calls a hook the driver did not declare.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;
use hashbrown::HashMap;
use spin::RwLock;

use hdf_api::error::{already_exists, check_name, not_found, unsupported, Result};
use hdf_services::DeviceObject;

bitflags! {
    /// Hooks a driver implements
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriverHooks: u8 {
        /// Attaches the driver's service to the device object
        const BIND = 0b0000_0001;
        /// Brings the device up once bound
        const INIT = 0b0000_0010;
        /// Drops the driver's state when the node is unloaded
        const RELEASE = 0b0000_0100;
    }
}

/// Driver implementation selected by module name
pub trait Driver: Send + Sync {
    /// Module name device descriptors refer to
    fn module_name(&self) -> &str;

    /// Hooks this driver implements
    fn hooks(&self) -> DriverHooks;

    /// Attach the driver's service to `object`.
    ///
    /// Required for public and capacity services.
    fn bind(&self, object: &Arc<DeviceObject>) -> Result<()> {
        let _ = object;
        Err(unsupported("bind"))
    }

    /// Bring the device up; required to launch a node
    fn init(&self, object: &Arc<DeviceObject>) -> Result<()> {
        let _ = object;
        Err(unsupported("init"))
    }

    /// Release whatever `bind` and `init` set up
    fn release(&self, object: &Arc<DeviceObject>) {
        let _ = object;
    }
}

/// Drivers linked into the system, keyed by module name
pub struct DriverTable {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl DriverTable {
    pub fn new() -> Self {
        Self {
            drivers: RwLock::new(HashMap::new()),
        }
    }

    /// Add a driver; module names are unique
    pub fn register_driver(&self, driver: Arc<dyn Driver>) -> Result<()> {
        let name = driver.module_name().to_string();
        check_name("module", &name)?;

        let mut drivers = self.drivers.write();
        if drivers.contains_key(&name) {
            return Err(already_exists(&name));
        }
        log::debug!("driver table: {} registered", name);
        drivers.insert(name, driver);
        Ok(())
    }

    /// Driver implementing `module_name`
    pub fn get_driver(&self, module_name: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .read()
            .get(module_name)
            .cloned()
            .ok_or_else(|| not_found(module_name))
    }

    /// Remove a driver, returning it
    pub fn unregister_driver(&self, module_name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.write().remove(module_name)
    }

    /// Registered module names, in no particular order
    pub fn module_names(&self) -> Vec<String> {
        self.drivers.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.read().is_empty()
    }
}

impl Default for DriverTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullDriver(&'static str);

    impl Driver for NullDriver {
        fn module_name(&self) -> &str {
            self.0
        }

        fn hooks(&self) -> DriverHooks {
            DriverHooks::empty()
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let table = DriverTable::new();
        table.register_driver(Arc::new(NullDriver("gpio_driver"))).unwrap();
        assert_eq!(table.get_driver("gpio_driver").unwrap().module_name(), "gpio_driver");
        assert!(table.get_driver("uart_driver").is_err());

        let err = table.register_driver(Arc::new(NullDriver("gpio_driver"))).err().unwrap();
        assert!(matches!(err, hdf_api::Error::AlreadyExists(_)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let table = DriverTable::new();
        table.register_driver(Arc::new(NullDriver("i2c_driver"))).unwrap();
        assert!(table.unregister_driver("i2c_driver").is_some());
        assert!(table.unregister_driver("i2c_driver").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_default_hooks_are_unsupported() {
        let driver = NullDriver("bare");
        let object = Arc::new(DeviceObject::new("bare_service", 0));
        assert!(matches!(driver.bind(&object), Err(hdf_api::Error::Unsupported(_))));
        assert!(matches!(driver.init(&object), Err(hdf_api::Error::Unsupported(_))));
    }

    #[test]
    fn test_empty_module_name_rejected() {
        assert!(DriverTable::new().register_driver(Arc::new(NullDriver(""))).is_err());
    }
}
