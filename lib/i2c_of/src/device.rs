//! Objects living on the I2C bus and the handles used to reach them.
//!
//! Every bus member is a [Device]: clients, adapters, and the plain parent devices adapters
//! hang off (a controller, a mux). What a device is gets recorded in [DeviceKind]. The typed
//! handles [ClientHandle] and [AdapterHandle] can only be obtained through
//! [ClientHandle::verify] / [AdapterHandle::verify], so holding one proves the kind.
//!
//! All handles are counted references: cloning acquires, dropping releases.
use crate::board_info::ClientFlags;
use alloc::boxed::Box;
use core::{
    fmt,
    ops::Deref,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};
use dt::node::NodeHandle;
use utils::handle::{Handle, HandleRef};

pub type DeviceHandle = Handle<Device>;
pub type DeviceRef = HandleRef<Device>;

pub struct Device {
    pub name: Box<str>,
    /// The description node this device was created from, if any.
    pub of_node: Option<NodeHandle>,
    pub parent: Option<DeviceRef>,
    pub kind: DeviceKind,
}

#[derive(Debug)]
pub enum DeviceKind {
    Client(ClientData),
    Adapter(AdapterData),
    /// Anything else, e.g. the controller or mux an adapter belongs to.
    Other,
}

#[derive(Debug)]
pub struct ClientData {
    /// Client type, as derived from the node's `compatible`.
    pub name: Box<str>,
    pub addr: u16,
    pub flags: ClientFlags,
}

#[derive(Debug)]
pub struct AdapterData {
    pub nr: usize,
    /// Module implementing the adapter. An adapter without owner is always usable.
    pub owner: Option<Handle<Module>>,
}

impl Device {
    /// A device that is not itself a client or an adapter.
    pub fn new(
        name: impl AsRef<str>,
        of_node: Option<NodeHandle>,
        parent: Option<&DeviceHandle>,
    ) -> DeviceHandle {
        DeviceHandle::from(Device {
            name: Box::from(name.as_ref()),
            of_node,
            parent: parent.map(|p| p.create_ref()),
            kind: DeviceKind::Other,
        })
    }

    pub fn parent(&self) -> Option<DeviceHandle> {
        self.parent.as_ref().and_then(|p| p.get_handle())
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("of_node", &self.of_node.as_ref().map(|n| n.full_path()))
            .field("kind", &self.kind)
            .finish()
    }
}

/// A counted reference to a device known to be a client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    inner: DeviceHandle,
}

impl ClientHandle {
    /// Narrow `dev` to a client. Returns [None], releasing `dev`, if it is something else.
    pub fn verify(dev: DeviceHandle) -> Option<ClientHandle> {
        if matches!(dev.kind, DeviceKind::Client(_)) {
            Some(ClientHandle { inner: dev })
        } else {
            None
        }
    }

    pub fn data(&self) -> &ClientData {
        match &self.inner.kind {
            DeviceKind::Client(data) => data,
            _ => unreachable!("client handle wraps a non-client device"),
        }
    }

    pub fn addr(&self) -> u16 {
        self.data().addr
    }

    pub fn flags(&self) -> ClientFlags {
        self.data().flags
    }

    pub fn type_name(&self) -> &str {
        &self.data().name
    }

    /// The adapter this client sits on.
    pub fn adapter(&self) -> Option<AdapterHandle> {
        AdapterHandle::verify(self.inner.parent()?)
    }

    pub fn as_device(&self) -> &DeviceHandle {
        &self.inner
    }
}

impl Deref for ClientHandle {
    type Target = Device;

    fn deref(&self) -> &Device {
        &self.inner
    }
}

/// A counted reference to a device known to be an adapter.
#[derive(Debug, Clone)]
pub struct AdapterHandle {
    inner: DeviceHandle,
}

impl AdapterHandle {
    /// Narrow `dev` to an adapter. Returns [None], releasing `dev`, if it is something else.
    pub fn verify(dev: DeviceHandle) -> Option<AdapterHandle> {
        if matches!(dev.kind, DeviceKind::Adapter(_)) {
            Some(AdapterHandle { inner: dev })
        } else {
            None
        }
    }

    pub fn data(&self) -> &AdapterData {
        match &self.inner.kind {
            DeviceKind::Adapter(data) => data,
            _ => unreachable!("adapter handle wraps a non-adapter device"),
        }
    }

    pub fn nr(&self) -> usize {
        self.data().nr
    }

    pub fn as_device(&self) -> &DeviceHandle {
        &self.inner
    }

    pub fn create_ref(&self) -> DeviceRef {
        self.inner.create_ref()
    }

    /// Pin the owning module and wrap both references into one guard.
    /// Returns [None], releasing the adapter, if the owner is going away.
    pub fn pin(self) -> Option<PinnedAdapter> {
        let pin = match &self.data().owner {
            Some(owner) => Some(Module::try_get(owner)?),
            None => None,
        };
        Some(PinnedAdapter {
            _pin: pin,
            adapter: self,
        })
    }
}

impl Deref for AdapterHandle {
    type Target = Device;

    fn deref(&self) -> &Device {
        &self.inner
    }
}

/// The code module an adapter driver lives in. While pinned it cannot finish unloading;
/// once unloading has begun it can no longer be pinned.
#[derive(Debug)]
pub struct Module {
    pub name: Box<str>,
    refs: AtomicUsize,
    unloading: AtomicBool,
}

impl Module {
    pub fn new(name: impl AsRef<str>) -> Handle<Module> {
        Handle::from(Module {
            name: Box::from(name.as_ref()),
            refs: AtomicUsize::new(0),
            unloading: AtomicBool::new(false),
        })
    }

    pub fn try_get(this: &Handle<Module>) -> Option<ModulePin> {
        if this.unloading.load(Ordering::Acquire) {
            return None;
        }
        this.refs.fetch_add(1, Ordering::AcqRel);
        if this.unloading.load(Ordering::Acquire) {
            this.refs.fetch_sub(1, Ordering::AcqRel);
            return None;
        }
        Some(ModulePin {
            module: this.clone(),
        })
    }

    pub fn begin_unload(&self) {
        self.unloading.store(true, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        !self.unloading.load(Ordering::Acquire)
    }

    /// Number of outstanding pins.
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

/// A pin on a [Module], released on drop.
#[derive(Debug)]
pub struct ModulePin {
    module: Handle<Module>,
}

impl Drop for ModulePin {
    fn drop(&mut self) {
        self.module.refs.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An adapter reference whose owning module is pinned. Dropping it releases the module pin
/// and then the adapter reference.
#[derive(Debug)]
pub struct PinnedAdapter {
    _pin: Option<ModulePin>,
    adapter: AdapterHandle,
}

impl PinnedAdapter {
    pub fn adapter(&self) -> &AdapterHandle {
        &self.adapter
    }
}

impl Deref for PinnedAdapter {
    type Target = AdapterHandle;

    fn deref(&self) -> &AdapterHandle {
        &self.adapter
    }
}
