#![allow(dead_code)]

use dt::{
    node::{DeviceTree, Node, NodeHandle},
    prop::Property,
};
use i2c_of::{
    board_info::BoardInfo,
    device::{AdapterHandle, ClientHandle, Device, DeviceHandle},
    registry::{AdapterDesc, BusRegistry, I2cBus, RegistryError},
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An [I2cBus] that counts the calls made to it and can be told to refuse new clients.
#[derive(Default)]
pub struct RecordingRegistry {
    pub bus: I2cBus,
    pub creates: AtomicUsize,
    pub unregisters: AtomicUsize,
    pub finds: AtomicUsize,
    pub refuse_clients: AtomicBool,
}

impl RecordingRegistry {
    pub fn calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
            + self.unregisters.load(Ordering::SeqCst)
            + self.finds.load(Ordering::SeqCst)
    }

    pub fn refuse(&self, refuse: bool) {
        self.refuse_clients.store(refuse, Ordering::SeqCst);
    }
}

impl BusRegistry for RecordingRegistry {
    fn add_adapter(&self, desc: AdapterDesc) -> Result<AdapterHandle, RegistryError> {
        self.bus.add_adapter(desc)
    }

    fn new_client(
        &self,
        adapter: &AdapterHandle,
        info: &BoardInfo,
    ) -> Result<ClientHandle, RegistryError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.refuse_clients.load(Ordering::SeqCst) {
            return Err(RegistryError::AddressBusy { addr: info.addr });
        }
        self.bus.new_client(adapter, info)
    }

    fn unregister(&self, dev: &Device) -> Result<(), RegistryError> {
        self.unregisters.fetch_add(1, Ordering::SeqCst);
        self.bus.unregister(dev)
    }

    fn find_device(&self, matcher: &dyn Fn(&Device) -> bool) -> Option<DeviceHandle> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.bus.find_device(matcher)
    }

    fn devices(&self) -> Vec<DeviceHandle> {
        self.bus.devices()
    }
}

pub fn client_node(full_name: &str, compatible: &str, reg: u32) -> Node {
    Node::new(full_name)
        .with_prop(Property::from_string("compatible", compatible))
        .with_prop(Property::from_u32("reg", reg))
}

pub fn disabled(node: Node) -> Node {
    node.with_prop(Property::from_string("status", "disabled"))
}

/// `/soc/i2c@1000`, the node of adapter `A` in the scenarios.
pub fn adapter_node(tree: &DeviceTree) -> NodeHandle {
    let soc = tree.add_static(&tree.root(), Node::new("soc"));
    tree.add_static(&soc, Node::new("i2c@1000"))
}
