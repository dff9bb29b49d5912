//! HDF Core
//!
//! This crate turns a static device table into a live graph of bound
//! drivers. The [`DeviceManager`] starts one [`DeviceHost`] per configured
//! host; hosts ask the [`DriverLoader`] to bind a [`DeviceNode`] for each
//! device descriptor and attach the node to its [`Device`], which launches it
//! and publishes its service.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use hdf_api::{DeviceInfo, DeviceTable, HostTable, PreloadMode};
//! use hdf_core::{DeviceManager, DriverLoader, DriverTable};
//! use hdf_services::DevSvcManager;
//!
//! let drivers = Arc::new(DriverTable::new());
//! let registry = Arc::new(DevSvcManager::new());
//! let manager = DeviceManager::new(registry.clone(), Arc::new(DriverLoader::new(drivers)));
//!
//! let table = DeviceTable::new().with_host(
//!     HostTable::new(1, "sample_host")
//!         .with_device(DeviceInfo::new("sample_driver", "sample_service").with_preload(PreloadMode::Disable)),
//! );
//! manager.start(&table).unwrap();
//! assert!(!manager.is_loaded("sample_service"));
//! ```

#![no_std]
#![allow(dead_code)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod driver;
pub mod loader;
pub mod node;
pub mod device;
pub mod host;
pub mod manager;

pub use device::Device;
pub use driver::{Driver, DriverHooks, DriverTable};
pub use host::DeviceHost;
pub use loader::{DriverLoader, NODE_CHUNK_SIZE};
pub use manager::DeviceManager;
pub use node::DeviceNode;
