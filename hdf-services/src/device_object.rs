//! Device object
//!
//! A [`DeviceObject`] is the part of a device node other drivers get to see:
//! the service the bound driver exposes, the property subtree it was
//! configured with and the identity it is published under. Objects are shared
//! as `Arc<DeviceObject>`; a handle stays valid after its node is torn down,
//! it merely stops answering with a service.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use spin::RwLock;

use hdf_api::core::types::{DeviceClass, MatchId, ServicePolicy, ANONYMOUS_MATCH_ID};
use hdf_api::error::{not_found, unsupported, Result};
use hdf_api::{IoService, PropertyNode};

use crate::observer::{ServiceObserver, SubscriberCallback, SubscriberId};

/// Externally visible handle of a device node
pub struct DeviceObject {
    service_name: String,
    match_id: MatchId,
    policy: ServicePolicy,
    property: Arc<PropertyNode>,
    service: RwLock<Option<Arc<dyn IoService>>>,
    device_class: RwLock<DeviceClass>,
    /// Observer of the owning host, used for driver-side subscriptions
    observer: Option<Arc<ServiceObserver>>,
}

impl DeviceObject {
    /// Create a public object with an empty property view
    pub fn new(service_name: &str, match_id: MatchId) -> Self {
        Self {
            service_name: service_name.to_string(),
            match_id,
            policy: ServicePolicy::Public,
            property: Arc::new(PropertyNode::new("")),
            service: RwLock::new(None),
            device_class: RwLock::new(DeviceClass::Default),
            observer: None,
        }
    }

    pub fn with_policy(mut self, policy: ServicePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_property(mut self, property: Arc<PropertyNode>) -> Self {
        self.property = property;
        self
    }

    pub fn with_observer(mut self, observer: Arc<ServiceObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn policy(&self) -> ServicePolicy {
        self.policy
    }

    /// Property subtree resolved from the device's match attribute
    pub fn property(&self) -> &Arc<PropertyNode> {
        &self.property
    }

    /// Service exposed by the bound driver, if any
    pub fn service(&self) -> Option<Arc<dyn IoService>> {
        self.service.read().clone()
    }

    /// Attach the driver's service; called from the driver's bind hook
    pub fn set_service(&self, service: Arc<dyn IoService>) {
        *self.service.write() = Some(service);
    }

    /// Detach the driver's service, returning it
    pub fn take_service(&self) -> Option<Arc<dyn IoService>> {
        self.service.write().take()
    }

    pub fn device_class(&self) -> DeviceClass {
        *self.device_class.read()
    }

    pub fn set_device_class(&self, class: DeviceClass) {
        *self.device_class.write() = class;
    }

    /// Issue a command against the bound service
    pub fn dispatch(&self, cmd: u32, data: &[u8], reply: &mut alloc::vec::Vec<u8>) -> Result<()> {
        match self.service() {
            Some(service) => service.dispatch(cmd, data, reply),
            None => Err(not_found(&self.service_name)),
        }
    }

    /// Subscribe to `svc_name` through the host observer.
    ///
    /// The subscription carries this object's match id, so private services
    /// published under the same hardware id are visible to it.
    pub fn subscribe_service(&self, svc_name: &str, callback: SubscriberCallback) -> Result<SubscriberId> {
        let Some(observer) = self.observer.as_ref() else {
            return Err(unsupported("device object is not attached to a host"));
        };
        observer.subscribe(svc_name, self.match_id, callback)
    }

    /// Whether the object belongs to no device node
    pub fn is_anonymous(&self) -> bool {
        self.match_id == ANONYMOUS_MATCH_ID
    }
}

impl core::fmt::Debug for DeviceObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceObject")
            .field("service_name", &self.service_name)
            .field("match_id", &self.match_id)
            .field("policy", &self.policy)
            .field("device_class", &self.device_class())
            .field("has_service", &self.service.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    struct Echo;

    impl IoService for Echo {
        fn dispatch(&self, cmd: u32, data: &[u8], reply: &mut Vec<u8>) -> Result<()> {
            reply.push(cmd as u8);
            reply.extend_from_slice(data);
            Ok(())
        }
    }

    #[test]
    fn test_service_binding() {
        let object = DeviceObject::new("echo_service", 0x10001);
        let mut reply = Vec::new();
        assert!(object.dispatch(1, b"x", &mut reply).unwrap_err().is_not_found());

        object.set_service(Arc::new(Echo));
        object.dispatch(7, b"ab", &mut reply).unwrap();
        assert_eq!(reply, [7, b'a', b'b']);

        assert!(object.take_service().is_some());
        assert!(object.service().is_none());
    }

    #[test]
    fn test_device_class() {
        let object = DeviceObject::new("sensor_service", 1);
        assert_eq!(object.device_class(), DeviceClass::Default);
        object.set_device_class(DeviceClass::Sensor);
        assert_eq!(object.device_class(), DeviceClass::Sensor);
    }

    #[test]
    fn test_subscribe_needs_host() {
        let object = DeviceObject::new("orphan", 1);
        let err = object
            .subscribe_service("any", Arc::new(|_: &Arc<DeviceObject>| {}))
            .unwrap_err();
        assert!(matches!(err, hdf_api::Error::Unsupported(_)));
    }
}
