//! HDF API - Core interfaces and types for the hardware driver framework
//!
//! This crate provides the types and seams shared by every other crate of the
//! driver framework. It serves as the foundation for communication between the
//! object pool, the service registry, the service observer and the device
//! manager, and keeps them free of any concrete bus driver.
//!
//! # Architecture
//!
//! The API is organized into several key modules:
//!
//! - **Core**: Policies, preload modes, device classes and hashing
//! - **Error**: Common error type and helper constructors
//! - **Collections**: The lock-protected list every registry structure uses
//! - **DeviceInfo**: Static device descriptors
//! - **Property**: Configuration-tree nodes and match-attribute lookup
//! - **IoService**: The dispatch protocol exposed by bound drivers
//! - **Attributes**: Host and device tables supplied at boot
//!
//! # Usage
//!
//! ```rust
//! use hdf_api::{DeviceInfo, ServicePolicy};
//!
//! let info = DeviceInfo::new("sample_driver", "sample_service")
//!     .with_ids(1, 0)
//!     .with_policy(ServicePolicy::Public);
//! assert_eq!(info.match_id(), (1 << 16) | 0);
//! ```

#![no_std]
#![allow(dead_code)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// Core modules
pub mod core;
pub mod error;
pub mod collections;
pub mod device_info;
pub mod property;
pub mod io_service;
pub mod attributes;

// Re-export commonly used types
pub use crate::core::types::*;
pub use crate::core::hash::string_hash_key;
pub use crate::error::{Error, ErrorContext, Result};
pub use crate::collections::LockedList;
pub use crate::device_info::DeviceInfo;
pub use crate::property::{PropertyNode, PropertyResolver, PropertyValue};
pub use crate::io_service::{IoService, ServiceLoader};
pub use crate::attributes::{AttributeProvider, DeviceTable, HostInfo, HostTable};
