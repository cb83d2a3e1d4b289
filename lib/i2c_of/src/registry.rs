//! The bus registry the binding creates clients in.
//!
//! [BusRegistry] is the seam between the binding and whatever owns the bus. The binding only
//! ever reaches the registry through an injected `Arc<dyn BusRegistry>`, so independent
//! registries can coexist (one per test, for instance). [I2cBus] is an in-memory registry that
//! enforces the usual address rules.
use crate::{
    board_info::{BoardInfo, ClientFlags},
    device::{
        AdapterData, AdapterHandle, ClientData, ClientHandle, Device, DeviceHandle, DeviceKind,
        Module,
    },
};
use alloc::{boxed::Box, format, vec, vec::Vec};
use core::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};
use dt::node::NodeHandle;
use spin::RwLock;
use utils::{debug_ex, handle::Handle};

/// Address space offsets used to keep ten-bit and own-slave addresses apart from plain
/// seven-bit ones when checking for collisions and naming clients.
const ADDR_OFFSET_TEN_BIT: u16 = 0xa000;
const ADDR_OFFSET_SLAVE: u16 = 0x1000;

pub trait BusRegistry: Send + Sync {
    /// Register a new adapter.
    fn add_adapter(&self, desc: AdapterDesc) -> Result<AdapterHandle, RegistryError>;

    /// Create and register a client on `adapter`. The registry keeps its own reference; the
    /// returned one belongs to the caller.
    fn new_client(
        &self,
        adapter: &AdapterHandle,
        info: &BoardInfo,
    ) -> Result<ClientHandle, RegistryError>;

    /// Remove `dev` from the bus, dropping the registry's reference.
    fn unregister(&self, dev: &Device) -> Result<(), RegistryError>;

    /// First registered device, in registration order, accepted by `matcher`. The returned
    /// reference has been acquired for the caller.
    fn find_device(&self, matcher: &dyn Fn(&Device) -> bool) -> Option<DeviceHandle>;

    /// Snapshot of every registered device, in registration order.
    fn devices(&self) -> Vec<DeviceHandle>;
}

/// Everything needed to register an adapter.
#[derive(Debug, Default)]
pub struct AdapterDesc {
    pub of_node: Option<NodeHandle>,
    /// The device the adapter belongs to (controller, mux).
    pub parent: Option<DeviceHandle>,
    pub owner: Option<Handle<Module>>,
}

impl AdapterDesc {
    pub fn new() -> AdapterDesc {
        AdapterDesc::default()
    }

    pub fn with_node(mut self, node: NodeHandle) -> AdapterDesc {
        self.of_node = Some(node);
        self
    }

    pub fn with_parent(mut self, parent: &DeviceHandle) -> AdapterDesc {
        self.parent = Some(parent.clone());
        self
    }

    pub fn with_owner(mut self, owner: &Handle<Module>) -> AdapterDesc {
        self.owner = Some(owner.clone());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The address is not usable for a client with these flags.
    InvalidAddress { addr: u16, flags: ClientFlags },
    /// Another client on the same adapter already uses the address.
    AddressBusy { addr: u16 },
    /// The device (or the adapter a client was meant for) is not registered.
    NotRegistered,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::InvalidAddress { addr, flags } => {
                write!(f, "invalid address {:#x} (flags {:?})", addr, flags)
            }
            RegistryError::AddressBusy { addr } => write!(f, "address {:#x} already in use", addr),
            RegistryError::NotRegistered => f.write_str("device not registered"),
        }
    }
}

impl core::error::Error for RegistryError {}

/// Check that `addr` is a legal client address for `flags`.
pub fn check_addr_validity(addr: u16, flags: ClientFlags) -> Result<(), RegistryError> {
    let addr_usize = addr as usize;
    let valid = if flags.contains(ClientFlags::TEN) {
        addr_usize <= config::I2C_MAX_10BIT_ADDR
    } else {
        addr != 0 && addr_usize <= config::I2C_MAX_7BIT_ADDR
    };
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidAddress { addr, flags })
    }
}

/// The address as seen on the bus, with the address-space offset of its kind applied.
pub fn encode_addr(addr: u16, flags: ClientFlags) -> u16 {
    let mut encoded = addr;
    if flags.contains(ClientFlags::TEN) {
        encoded |= ADDR_OFFSET_TEN_BIT;
    }
    if flags.contains(ClientFlags::SLAVE) {
        encoded |= ADDR_OFFSET_SLAVE;
    }
    encoded
}

/// In-memory bus registry.
pub struct I2cBus {
    devices: RwLock<Vec<DeviceHandle>>,
    next_nr: AtomicUsize,
}

impl Default for I2cBus {
    fn default() -> Self {
        I2cBus::new()
    }
}

impl I2cBus {
    pub fn new() -> I2cBus {
        I2cBus {
            devices: RwLock::new(vec![]),
            next_nr: AtomicUsize::new(0),
        }
    }

    pub fn clients(&self) -> Vec<ClientHandle> {
        self.devices().into_iter().filter_map(ClientHandle::verify).collect()
    }
}

impl BusRegistry for I2cBus {
    fn add_adapter(&self, desc: AdapterDesc) -> Result<AdapterHandle, RegistryError> {
        let nr = self.next_nr.fetch_add(1, Ordering::AcqRel);
        let dev = DeviceHandle::from(Device {
            name: Box::from(format!("i2c-{}", nr).as_str()),
            of_node: desc.of_node,
            parent: desc.parent.as_ref().map(|p| p.create_ref()),
            kind: DeviceKind::Adapter(AdapterData {
                nr,
                owner: desc.owner,
            }),
        });
        self.devices.write().push(dev.clone());
        debug_ex!("i2c: registered adapter {}", dev.name);
        AdapterHandle::verify(dev).ok_or(RegistryError::NotRegistered)
    }

    fn new_client(
        &self,
        adapter: &AdapterHandle,
        info: &BoardInfo,
    ) -> Result<ClientHandle, RegistryError> {
        check_addr_validity(info.addr, info.flags)?;
        let encoded = encode_addr(info.addr, info.flags);

        let mut devices = self.devices.write();
        if !devices.iter().any(|d| Handle::ptr_eq(d, adapter.as_device())) {
            return Err(RegistryError::NotRegistered);
        }
        let busy = devices.iter().any(|d| match &d.kind {
            DeviceKind::Client(c) => {
                d.parent.as_ref().is_some_and(|p| p.is(adapter.as_device()))
                    && encode_addr(c.addr, c.flags) == encoded
            }
            _ => false,
        });
        if busy {
            return Err(RegistryError::AddressBusy { addr: info.addr });
        }

        let dev = DeviceHandle::from(Device {
            name: Box::from(format!("{}-{:04x}", adapter.nr(), encoded).as_str()),
            of_node: info.of_node.clone(),
            parent: Some(adapter.create_ref()),
            kind: DeviceKind::Client(ClientData {
                name: info.type_name.clone(),
                addr: info.addr,
                flags: info.flags,
            }),
        });
        devices.push(dev.clone());
        drop(devices);
        debug_ex!("i2c: registered client {} ({})", dev.name, info.type_name);
        ClientHandle::verify(dev).ok_or(RegistryError::NotRegistered)
    }

    fn unregister(&self, dev: &Device) -> Result<(), RegistryError> {
        let mut devices = self.devices.write();
        let index = devices
            .iter()
            .position(|d| d.is(dev))
            .ok_or(RegistryError::NotRegistered)?;
        devices.remove(index);
        Ok(())
    }

    fn find_device(&self, matcher: &dyn Fn(&Device) -> bool) -> Option<DeviceHandle> {
        self.devices.read().iter().find(|d| matcher(d)).cloned()
    }

    fn devices(&self) -> Vec<DeviceHandle> {
        self.devices.read().clone()
    }
}
