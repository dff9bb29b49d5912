//! Device service registry
//!
//! The registry maps service names to the device objects publishing them.
//! Records are indexed by the hash of the name; every lookup also compares
//! the full name, so two names sharing a hash never alias. Registration is an
//! atomic check-and-insert: at most one live record exists per name.
//!
//! Every registration is forwarded to the registry's own [`ServiceObserver`],
//! which is how [`DevSvcManager::subscribe_service`] delivers services that
//! only come up after the subscription.

use alloc::string::{String, ToString};
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::RwLock;

use hdf_api::core::types::{DeviceClass, ANONYMOUS_MATCH_ID};
use hdf_api::error::{already_exists, check_name, not_found, Result};
use hdf_api::{string_hash_key, IoService, LockedList, ServiceLoader};

use crate::device_object::DeviceObject;
use crate::observer::{ServiceObserver, SubscriberCallback};

struct ServiceRecord {
    /// Registration order, increasing along the list
    seq: u64,
    key: u32,
    name: String,
    object: Arc<DeviceObject>,
}

impl ServiceRecord {
    fn is(&self, key: u32, name: &str) -> bool {
        self.key == key && self.name == name
    }
}

/// Device service manager
pub struct DevSvcManager {
    services: LockedList<ServiceRecord>,
    observer: Arc<ServiceObserver>,
    loader: RwLock<Option<Weak<dyn ServiceLoader>>>,
    next_seq: AtomicU64,
}

impl DevSvcManager {
    /// Create an empty registry with its own observer
    pub fn new() -> Self {
        Self {
            services: LockedList::new(),
            observer: Arc::new(ServiceObserver::new()),
            loader: RwLock::new(None),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Install the component that loads services on demand.
    ///
    /// The registry keeps a weak reference only; the loader usually owns the
    /// registry.
    pub fn set_service_loader(&self, loader: Weak<dyn ServiceLoader>) {
        *self.loader.write() = Some(loader);
    }

    /// Observer notified of every registration
    pub fn observer(&self) -> &Arc<ServiceObserver> {
        &self.observer
    }

    /// Register `object` under `name`.
    ///
    /// Fails with `AlreadyExists` when the name is already registered; the
    /// existing record is left untouched.
    pub fn add_service(&self, name: &str, object: Arc<DeviceObject>) -> Result<()> {
        check_name("service", name)?;
        let key = string_hash_key(name);
        let added = self.services.with(|records| {
            if records.iter().any(|r| r.is(key, name)) {
                return false;
            }
            records.push(ServiceRecord {
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                key,
                name: name.to_string(),
                object: object.clone(),
            });
            true
        });
        if !added {
            log::warn!("registry: service {} already registered", name);
            return Err(already_exists(name));
        }
        log::info!("registry: service {} added", name);
        self.observer
            .publish(name, object.match_id(), object.policy(), object)
    }

    /// Device object registered under `name`
    pub fn get_object(&self, name: &str) -> Result<Arc<DeviceObject>> {
        let key = string_hash_key(name);
        self.services
            .find_map(|record| record.is(key, name).then(|| record.object.clone()))
            .ok_or_else(|| {
                log::debug!("registry: service {} not found", name);
                not_found(name)
            })
    }

    /// Service bound to the device object registered under `name`
    pub fn get_service(&self, name: &str) -> Result<Arc<dyn IoService>> {
        self.get_object(name)?.service().ok_or_else(|| not_found(name))
    }

    /// Issue a command against the service registered under `name`
    pub fn dispatch(&self, name: &str, cmd: u32, data: &[u8], reply: &mut Vec<u8>) -> Result<()> {
        self.get_service(name)?.dispatch(cmd, data, reply)
    }

    /// Remove the record of `name`, if any, returning its object
    pub fn remove_service(&self, name: &str) -> Option<Arc<DeviceObject>> {
        let key = string_hash_key(name);
        let record = self.services.remove_first(|record| record.is(key, name))?;
        self.observer.remove_record(name);
        log::info!("registry: service {} removed", name);
        Some(record.object)
    }

    /// Remove the record of `name` only if it still holds `object`
    pub fn remove_object(&self, name: &str, object: &Arc<DeviceObject>) -> bool {
        let key = string_hash_key(name);
        let removed = self
            .services
            .remove_first(|record| record.is(key, name) && Arc::ptr_eq(&record.object, object));
        if removed.is_none() {
            return false;
        }
        self.observer.remove_record(name);
        log::info!("registry: service {} removed", name);
        true
    }

    /// Subscribe to `name`, loading it on demand.
    ///
    /// A registered service is delivered to `callback` before this returns.
    /// Otherwise the subscription is parked on the registry observer and the
    /// service loader is asked to bring the service up; if loading fails the
    /// subscription is withdrawn and the error returned. A loader reporting
    /// success leaves the subscription waiting for the registration, as does
    /// the absence of a loader.
    pub fn subscribe_service(&self, name: &str, callback: SubscriberCallback) -> Result<()> {
        check_name("service", name)?;
        if let Ok(object) = self.get_object(name) {
            callback(&object);
            return Ok(());
        }

        let id = self.observer.subscribe(name, ANONYMOUS_MATCH_ID, callback)?;
        let loader = self.loader.read().as_ref().and_then(Weak::upgrade);
        let Some(loader) = loader else {
            log::debug!("registry: no service loader, {} stays pending", name);
            return Ok(());
        };

        if let Err(err) = loader.load_service(name) {
            // Someone else may have brought the service up meanwhile
            if self.get_object(name).is_ok() {
                return Ok(());
            }
            log::warn!("registry: failed to load {}: {}", name, err);
            let _ = self.observer.unsubscribe(name, id);
            return Err(err);
        }
        Ok(())
    }

    /// Names of the registered services of `class`.
    ///
    /// The iterator takes the registry lock for each step only, so
    /// registrations made while iterating neither block nor invalidate it.
    /// Each step resumes after the last name returned: removals never make
    /// it skip a name, and services added meanwhile come out at the end.
    pub fn list_services(&self, class: DeviceClass) -> ServiceNames<'_> {
        ServiceNames {
            manager: self,
            class,
            after: 0,
        }
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl Default for DevSvcManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy iterator over service names of one device class
pub struct ServiceNames<'a> {
    manager: &'a DevSvcManager,
    class: DeviceClass,
    /// Registration order of the last name returned
    after: u64,
}

impl Iterator for ServiceNames<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let (class, after) = (self.class, self.after);
        let (seq, name) = self.manager.services.find_map(|record| {
            (record.seq > after && record.object.device_class() == class)
                .then(|| (record.seq, record.name.clone()))
        })?;
        self.after = seq;
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    fn object(name: &str) -> Arc<DeviceObject> {
        Arc::new(DeviceObject::new(name, 1))
    }

    #[test]
    fn test_add_and_get() {
        let registry = DevSvcManager::new();
        let gpio = object("gpio_service");
        registry.add_service("gpio_service", gpio.clone()).unwrap();
        assert!(Arc::ptr_eq(&registry.get_object("gpio_service").unwrap(), &gpio));
        assert!(registry.get_object("gpio").unwrap_err().is_not_found());
        // Bound object without a service
        assert!(matches!(registry.get_service("gpio_service"), Err(err) if err.is_not_found()));
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = DevSvcManager::new();
        let first = object("uart_service");
        registry.add_service("uart_service", first.clone()).unwrap();
        let err = registry.add_service("uart_service", object("uart_service")).unwrap_err();
        assert!(matches!(err, hdf_api::Error::AlreadyExists(_)));
        assert!(Arc::ptr_eq(&registry.get_object("uart_service").unwrap(), &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = DevSvcManager::new();
        registry.add_service("rtc_service", object("rtc_service")).unwrap();
        assert!(registry.remove_service("rtc_service").is_some());
        assert!(registry.remove_service("rtc_service").is_none());
        assert!(registry.get_object("rtc_service").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_object_checks_owner() {
        let registry = DevSvcManager::new();
        let owner = object("adc_service");
        registry.add_service("adc_service", owner.clone()).unwrap();
        assert!(!registry.remove_object("adc_service", &object("adc_service")));
        assert!(registry.remove_object("adc_service", &owner));
        assert!(!registry.remove_object("adc_service", &owner));
    }

    #[test]
    fn test_list_services_by_class() {
        let registry = DevSvcManager::new();
        for name in ["accel", "gyro", "gpio", "light"] {
            let obj = object(name);
            if name != "gpio" {
                obj.set_device_class(DeviceClass::Sensor);
            }
            registry.add_service(name, obj).unwrap();
        }
        let names: Vec<String> = registry.list_services(DeviceClass::Sensor).collect();
        assert_eq!(names, ["accel", "gyro", "light"]);
        // Restartable
        assert_eq!(registry.list_services(DeviceClass::Sensor).count(), 3);
        assert_eq!(registry.list_services(DeviceClass::Usb).next(), None);
    }

    #[test]
    fn test_list_services_survives_removal() {
        let registry = DevSvcManager::new();
        for name in ["accel", "gyro", "light", "baro"] {
            let obj = object(name);
            obj.set_device_class(DeviceClass::Sensor);
            registry.add_service(name, obj).unwrap();
        }
        let mut names = registry.list_services(DeviceClass::Sensor);
        assert_eq!(names.next().as_deref(), Some("accel"));
        assert_eq!(names.next().as_deref(), Some("gyro"));
        // Both returned and pending names go away
        registry.remove_service("accel");
        registry.remove_service("light");
        let late = object("prox");
        late.set_device_class(DeviceClass::Sensor);
        registry.add_service("prox", late).unwrap();
        let rest: Vec<String> = names.collect();
        assert_eq!(rest, ["baro", "prox"]);
    }

    #[test]
    fn test_subscribe_live_service() {
        let registry = DevSvcManager::new();
        registry.add_service("i2c_service", object("i2c_service")).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        registry
            .subscribe_service(
                "i2c_service",
                Arc::new(move |_: &Arc<DeviceObject>| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_without_loader_waits() {
        let registry = DevSvcManager::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        registry
            .subscribe_service(
                "late_service",
                Arc::new(move |_: &Arc<DeviceObject>| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        registry.add_service("late_service", object("late_service")).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
