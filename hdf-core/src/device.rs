//! Devices
//!
//! A [`Device`] groups the nodes loaded under one device id of a host. The
//! node list is locked for insertion and removal only; launching and tearing
//! down nodes run with the list unlocked, since both reach into driver code
//! and subscriber callbacks.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use hdf_api::error::Result;
use hdf_api::{DeviceId, HostId, LockedList};
use hdf_services::{DevSvcManager, ServiceObserver};

use crate::node::DeviceNode;

/// Nodes of one physical device
pub struct Device {
    host_id: HostId,
    device_id: DeviceId,
    nodes: LockedList<Arc<DeviceNode>>,
    /// Attaches announced by the host but not finished yet
    pending: AtomicUsize,
}

impl Device {
    pub fn new(host_id: HostId, device_id: DeviceId) -> Self {
        Self {
            host_id,
            device_id,
            nodes: LockedList::new(),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Append `node` and launch it.
    ///
    /// A node that fails to launch is taken off the list and torn down
    /// again; the other nodes of the device are not touched.
    pub fn attach(&self, node: Arc<DeviceNode>, registry: &DevSvcManager, observer: &ServiceObserver) -> Result<()> {
        self.nodes.push(node.clone());
        if let Err(err) = node.launch(registry, observer) {
            self.nodes.remove_first(|entry| Arc::ptr_eq(entry, &node));
            node.teardown(registry, observer);
            return Err(err);
        }
        Ok(())
    }

    /// Separate the node loaded for `module_name` under `svc_name`
    pub fn detach(&self, module_name: &str, svc_name: &str) -> Option<Arc<DeviceNode>> {
        self.nodes.remove_first(|node| node.matches(module_name, svc_name))
    }

    /// Node published under `svc_name`
    pub fn find_node(&self, svc_name: &str) -> Option<Arc<DeviceNode>> {
        self.nodes
            .find_map(|node| (node.info().svc_name == svc_name).then(|| node.clone()))
    }

    /// Tear down every node, leaving the device empty.
    ///
    /// Returns the number of nodes torn down.
    pub fn destroy(&self, registry: &DevSvcManager, observer: &ServiceObserver) -> usize {
        let nodes = self.nodes.flush();
        for node in nodes.iter() {
            node.teardown(registry, observer);
        }
        nodes.len()
    }

    /// Current nodes, in attach order
    pub fn nodes(&self) -> Vec<Arc<DeviceNode>> {
        self.nodes.snapshot()
    }

    pub(crate) fn reserve(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn unreserve(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Empty and with no attach in flight
    pub(crate) fn is_idle(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0 && self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
