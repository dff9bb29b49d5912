//! HDF Services
//!
//! This crate provides the service side of the driver framework: the handle a
//! bound driver is published through, the device service registry that maps
//! service names to those handles, and the service observer that resolves
//! publish/subscribe races between drivers loaded in any order.
//!
//! # Architecture
//!
//! - **DeviceObject**: Externally visible handle of a device node
//! - **Observer**: Per-service subscriber lists with policy-scoped visibility
//! - **Registry**: Service name to device object mapping
//!
//! Both the registry and the observer are plain context objects shared by
//! `Arc`; several isolated instances can coexist.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use hdf_services::{DeviceObject, DevSvcManager};
//!
//! let registry = DevSvcManager::new();
//! let object = Arc::new(DeviceObject::new("sample_service", 0));
//! registry.add_service("sample_service", object.clone()).unwrap();
//! assert!(Arc::ptr_eq(&registry.get_object("sample_service").unwrap(), &object));
//! ```

#![no_std]
#![allow(dead_code)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// Core modules
pub mod device_object;
pub mod observer;
pub mod registry;

// Re-export commonly used items
pub use device_object::DeviceObject;
pub use observer::{ServiceObserver, SubscriberCallback, SubscriberId, SubscriberState};
pub use registry::{DevSvcManager, ServiceNames};
