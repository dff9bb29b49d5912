//! Device manager
//!
//! The device manager turns the boot device table into live hosts and loads
//! their devices in stages:
//!
//! - [`PreloadMode::Enable`] devices are loaded by [`DeviceManager::start`]
//! - [`PreloadMode::EnableStep2`] devices by [`DeviceManager::load_left_drivers`]
//! - [`PreloadMode::Disable`] devices only on demand, when a service is
//!   requested through [`DeviceManager::load_device`], a registry
//!   subscription or the manager's control service
//!
//! Each host keeps its descriptors in priority order together with whether
//! they are currently loaded; descriptors themselves are never modified.
//! A device that fails to load is logged and skipped, the other devices of
//! the stage are still loaded.
//!
//! The manager is the registry's [`ServiceLoader`] and answers the commands
//! of [`hdf_api::io_service::devmgr_cmd`] as an [`IoService`].

use alloc::format;
use alloc::string::ToString;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use hdf_api::core::types::{DeviceClass, PreloadMode, ANONYMOUS_MATCH_ID};
use hdf_api::error::{already_exists, busy, check_name, invalid_argument, not_found, unsupported, Result};
use hdf_api::io_service::{devmgr_cmd, DEV_MGR_NODE};
use hdf_api::{AttributeProvider, DeviceInfo, HostId, IoService, LockedList, ServiceLoader};
use hdf_services::{DevSvcManager, DeviceObject};

use crate::host::DeviceHost;
use crate::loader::DriverLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Unloaded,
    Loaded,
}

struct DeviceEntry {
    info: DeviceInfo,
    state: LoadState,
}

struct HostRecord {
    host: Arc<DeviceHost>,
    entries: LockedList<DeviceEntry>,
}

impl HostRecord {
    /// Flip the entry of `svc_name` from `from` to `to`, returning its descriptor
    fn transition(&self, svc_name: &str, from: LoadState, to: LoadState) -> Option<Result<DeviceInfo>> {
        self.entries.with(|entries| {
            let entry = entries.iter_mut().find(|entry| entry.info.svc_name == svc_name)?;
            if entry.state != from {
                return Some(Err(match from {
                    LoadState::Unloaded => busy(&format!("{} already loaded", svc_name)),
                    LoadState::Loaded => not_found(&format!("{} not loaded", svc_name)),
                }));
            }
            entry.state = to;
            Some(Ok(entry.info.clone()))
        })
    }

    fn set_state(&self, svc_name: &str, state: LoadState) {
        self.entries.with(|entries| {
            if let Some(entry) = entries.iter_mut().find(|entry| entry.info.svc_name == svc_name) {
                entry.state = state;
            }
        });
    }
}

/// Owner of every device host
pub struct DeviceManager {
    registry: Arc<DevSvcManager>,
    loader: Arc<DriverLoader>,
    hosts: LockedList<Arc<HostRecord>>,
    this: Weak<DeviceManager>,
}

impl DeviceManager {
    /// Create a manager and install it as the registry's service loader
    pub fn new(registry: Arc<DevSvcManager>, loader: Arc<DriverLoader>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<DeviceManager>| {
            let service_loader: Weak<dyn ServiceLoader> = this.clone();
            registry.set_service_loader(service_loader);
            Self {
                registry,
                loader,
                hosts: LockedList::new(),
                this: this.clone(),
            }
        })
    }

    pub fn registry(&self) -> &Arc<DevSvcManager> {
        &self.registry
    }

    pub fn loader(&self) -> &Arc<DriverLoader> {
        &self.loader
    }

    /// Create the hosts `provider` lists and load their boot devices.
    ///
    /// Hosts already known are skipped. Devices failing to load are logged
    /// and do not stop the others.
    pub fn start(&self, provider: &dyn AttributeProvider) -> Result<()> {
        for host_info in provider.host_list() {
            if self.get_host(host_info.host_id).is_some() {
                log::warn!("devmgr: host {} already started", host_info.host_id);
                continue;
            }
            let host = Arc::new(DeviceHost::new(
                host_info.host_id,
                &host_info.host_name,
                self.registry.clone(),
                self.loader.clone(),
            ));
            let entries = LockedList::new();
            for info in provider.device_list(host_info.host_id) {
                entries.push(DeviceEntry {
                    info,
                    state: LoadState::Unloaded,
                });
            }
            log::info!(
                "devmgr: host {} ({}) started with {} devices",
                host_info.host_name,
                host_info.host_id,
                entries.len()
            );
            self.hosts.push(Arc::new(HostRecord { host, entries }));
        }
        self.load_stage(PreloadMode::Enable);
        Ok(())
    }

    /// Load the devices deferred to the second boot stage
    pub fn load_left_drivers(&self) {
        self.load_stage(PreloadMode::EnableStep2);
    }

    fn load_stage(&self, mode: PreloadMode) {
        for record in self.hosts.snapshot() {
            let pending: Vec<DeviceInfo> = record.entries.with(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.info.preload == mode && entry.state == LoadState::Unloaded)
                    .map(|entry| entry.info.clone())
                    .collect()
            });
            for info in pending {
                if let Err(err) = self.load_device(&info.svc_name) {
                    log::error!("devmgr: failed to load {} ({}): {}", info.svc_name, info.module_name, err);
                }
            }
        }
    }

    /// Load the device publishing `svc_name`, returning its device object.
    ///
    /// Fails with `Busy` when the device is loaded already and with
    /// `NotFound` when no host describes it.
    pub fn load_device(&self, svc_name: &str) -> Result<Arc<DeviceObject>> {
        check_name("service", svc_name)?;
        if svc_name == DEV_MGR_NODE {
            return Err(invalid_argument("device manager node is not loadable"));
        }
        for record in self.hosts.snapshot() {
            let Some(claimed) = record.transition(svc_name, LoadState::Unloaded, LoadState::Loaded) else {
                continue;
            };
            let info = claimed?;
            return match record.host.add_device(&info) {
                Ok(object) => Ok(object),
                Err(err) => {
                    record.set_state(svc_name, LoadState::Unloaded);
                    Err(err)
                }
            };
        }
        log::debug!("devmgr: no device publishes {}", svc_name);
        Err(not_found(svc_name))
    }

    /// Unload the device publishing `svc_name`
    pub fn unload_device(&self, svc_name: &str) -> Result<()> {
        check_name("service", svc_name)?;
        for record in self.hosts.snapshot() {
            let Some(claimed) = record.transition(svc_name, LoadState::Loaded, LoadState::Unloaded) else {
                continue;
            };
            let info = claimed?;
            return record.host.del_device(&info);
        }
        Err(not_found(svc_name))
    }

    /// Whether the device publishing `svc_name` is loaded
    pub fn is_loaded(&self, svc_name: &str) -> bool {
        self.hosts.snapshot().iter().any(|record| {
            record
                .entries
                .contains(|entry| entry.info.svc_name == svc_name && entry.state == LoadState::Loaded)
        })
    }

    /// Register and load a new instance of `module_name` under `svc_name`.
    ///
    /// The descriptor is cloned from an existing device of the same module,
    /// placed on the same host with the next free device id, and loaded on
    /// demand. If loading fails the descriptor is removed again.
    pub fn register_device(&self, module_name: &str, svc_name: &str) -> Result<Arc<DeviceObject>> {
        check_name("module", module_name)?;
        check_name("service", svc_name)?;

        // Host list lock first, then entry locks
        let record = self.hosts.with(|records| -> Result<Arc<HostRecord>> {
            let taken = records
                .iter()
                .any(|record| record.entries.contains(|entry| entry.info.svc_name == svc_name));
            if taken {
                return Err(already_exists(svc_name));
            }
            let record = records
                .iter()
                .find(|record| record.entries.contains(|entry| entry.info.module_name == module_name))
                .cloned()
                .ok_or_else(|| not_found(module_name))?;
            record.entries.with(|entries| -> Result<()> {
                let template = entries
                    .iter()
                    .find(|entry| entry.info.module_name == module_name)
                    .map(|entry| entry.info.clone())
                    .ok_or_else(|| not_found(module_name))?;
                let device_id = entries
                    .iter()
                    .map(|entry| entry.info.device_id)
                    .max()
                    .unwrap_or(0)
                    .checked_add(1)
                    .ok_or_else(|| busy("no free device id"))?;

                let mut info = template;
                info.svc_name = svc_name.to_string();
                info.device_id = device_id;
                info.preload = PreloadMode::Disable;
                info.is_dynamic = true;
                entries.push(DeviceEntry {
                    info,
                    state: LoadState::Unloaded,
                });
                Ok(())
            })?;
            Ok(record)
        })?;

        match self.load_device(svc_name) {
            Ok(object) => {
                log::info!("devmgr: {} registered with {}", svc_name, module_name);
                Ok(object)
            }
            Err(err) => {
                log::error!("devmgr: failed to load registered {}: {}", svc_name, err);
                record
                    .entries
                    .remove_first(|entry| entry.info.matches(module_name, svc_name));
                Err(err)
            }
        }
    }

    /// Unload `svc_name` and forget its descriptor.
    ///
    /// An unload failure is logged; the descriptor is removed regardless.
    pub fn unregister_device(&self, module_name: &str, svc_name: &str) {
        if let Err(err) = self.unload_device(svc_name) {
            log::warn!("devmgr: failed to unload {}: {}", svc_name, err);
        }
        for record in self.hosts.snapshot() {
            record
                .entries
                .remove_all(|entry| entry.info.matches(module_name, svc_name));
        }
    }

    pub fn get_host(&self, host_id: HostId) -> Option<Arc<DeviceHost>> {
        self.hosts
            .find_map(|record| (record.host.host_id() == host_id).then(|| record.host.clone()))
    }

    /// Hosts in start order
    pub fn hosts(&self) -> Vec<Arc<DeviceHost>> {
        self.hosts.snapshot().iter().map(|record| record.host.clone()).collect()
    }

    /// Descriptors known to host `host_id`, in load order
    pub fn device_infos(&self, host_id: HostId) -> Vec<DeviceInfo> {
        self.hosts
            .find_map(|record| {
                (record.host.host_id() == host_id)
                    .then(|| record.entries.with(|entries| entries.iter().map(|e| e.info.clone()).collect::<Vec<_>>()))
            })
            .unwrap_or_default()
    }

    /// Publish the manager's control service under [`DEV_MGR_NODE`]
    pub fn publish_control_service(&self) -> Result<Arc<DeviceObject>> {
        let object = Arc::new(DeviceObject::new(DEV_MGR_NODE, ANONYMOUS_MATCH_ID));
        object.set_service(Arc::new(ControlService {
            manager: self.this.clone(),
        }));
        self.registry.add_service(DEV_MGR_NODE, object.clone())?;
        Ok(object)
    }

    /// Tear down every host, returning the number of nodes torn down
    pub fn shutdown(&self) -> usize {
        let mut count = 0;
        for record in self.hosts.snapshot() {
            count += record.host.destroy();
            record.entries.with(|entries| {
                for entry in entries.iter_mut() {
                    entry.state = LoadState::Unloaded;
                }
            });
        }
        count
    }
}

fn parse_name(data: &[u8]) -> Result<&str> {
    let data = data.strip_suffix(&[0]).unwrap_or(data);
    let name = core::str::from_utf8(data).map_err(|_| invalid_argument("service name is not UTF-8"))?;
    check_name("service", name)?;
    Ok(name)
}

impl IoService for DeviceManager {
    fn dispatch(&self, cmd: u32, data: &[u8], reply: &mut Vec<u8>) -> Result<()> {
        match cmd {
            devmgr_cmd::LOAD_SERVICE => self.load_device(parse_name(data)?).map(|_| ()),
            devmgr_cmd::UNLOAD_SERVICE => self.unload_device(parse_name(data)?),
            devmgr_cmd::GET_SERVICES_BY_CLASS => {
                let class = data
                    .first()
                    .copied()
                    .and_then(DeviceClass::from_raw)
                    .ok_or_else(|| invalid_argument("unknown device class"))?;
                for name in self.registry.list_services(class) {
                    reply.extend_from_slice(name.as_bytes());
                    reply.push(0);
                }
                Ok(())
            }
            _ => Err(unsupported(&format!("device manager command {}", cmd))),
        }
    }
}

impl ServiceLoader for DeviceManager {
    /// Load `svc_name` for a registry subscription.
    ///
    /// A device that is already loaded, or still launching, counts as
    /// success: its publication reaches the waiting subscriber.
    fn load_service(&self, svc_name: &str) -> Result<()> {
        match self.load_device(svc_name) {
            Ok(_) => Ok(()),
            Err(err) if self.is_loaded(svc_name) => {
                log::debug!("devmgr: {} already loaded or loading ({})", svc_name, err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Control service published in the registry; does not keep the manager alive
struct ControlService {
    manager: Weak<DeviceManager>,
}

impl IoService for ControlService {
    fn dispatch(&self, cmd: u32, data: &[u8], reply: &mut Vec<u8>) -> Result<()> {
        match self.manager.upgrade() {
            Some(manager) => manager.dispatch(cmd, data, reply),
            None => Err(not_found(DEV_MGR_NODE)),
        }
    }
}
