//! Service dispatch protocol
//!
//! A bound driver exposes its capability as an [`IoService`]. Clients obtain
//! the service by name and issue commands against it; the payload format of
//! requests and replies belongs to the serialization layer, so the framework
//! only moves opaque bytes.

use alloc::vec::Vec;

use crate::error::Result;

/// Capability object published by a bound driver
pub trait IoService: Send + Sync {
    /// Handle command `cmd` with request bytes `data`, appending any reply to `reply`
    fn dispatch(&self, cmd: u32, data: &[u8], reply: &mut Vec<u8>) -> Result<()>;
}

/// On-demand loading of a service by name.
///
/// The registry uses this seam to ask the device manager for a service that
/// is not up yet; the device manager implements it.
pub trait ServiceLoader: Send + Sync {
    /// Load the device publishing `svc_name`
    fn load_service(&self, svc_name: &str) -> Result<()>;
}

/// Commands understood by the device manager's own control service
pub mod devmgr_cmd {
    /// Load the service named by the UTF-8 payload
    pub const LOAD_SERVICE: u32 = 0;
    /// Unload the service named by the UTF-8 payload
    pub const UNLOAD_SERVICE: u32 = 1;
    /// List services of the class given by the first payload byte
    pub const GET_SERVICES_BY_CLASS: u32 = 2;
}

/// Name the device manager's control service is published under
pub const DEV_MGR_NODE: &str = "dev_mgr";
