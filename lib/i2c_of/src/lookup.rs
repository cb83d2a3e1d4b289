//! Node to client / adapter lookups.
//!
//! **Every handle returned here holds a reference; drop it when done.**
use crate::{
    I2cOf,
    device::{AdapterHandle, ClientHandle, Device, PinnedAdapter},
};
use dt::node::Node;

fn dev_node_match(dev: &Device, node: &Node) -> bool {
    dev.of_node.as_ref().is_some_and(|n| n.is(node))
}

/// An adapter may be described by the node of the device it belongs to rather than by a
/// node of its own, e.g. when the bus is exposed through a mux.
fn dev_or_parent_node_match(dev: &Device, node: &Node) -> bool {
    if dev_node_match(dev, node) {
        return true;
    }
    dev.parent()
        .is_some_and(|parent| dev_node_match(&parent, node))
}

impl I2cOf {
    /// The client created from `node`.
    pub fn find_device_by_node(&self, node: &Node) -> Option<ClientHandle> {
        let dev = self
            .registry
            .find_device(&|dev| dev_node_match(dev, node))?;
        ClientHandle::verify(dev)
    }

    /// The adapter described by `node`, directly or through its parent device.
    pub fn find_adapter_by_node(&self, node: &Node) -> Option<AdapterHandle> {
        let dev = self
            .registry
            .find_device(&|dev| dev_or_parent_node_match(dev, node))?;
        AdapterHandle::verify(dev)
    }

    /// Like [I2cOf::find_adapter_by_node], with the adapter's owning module pinned as well.
    /// Returns [None] rather than an adapter whose owner is unloading.
    pub fn get_adapter_by_node(&self, node: &Node) -> Option<PinnedAdapter> {
        self.find_adapter_by_node(node)?.pin()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        BindingConfig, I2cOf,
        device::{Device, Module},
        registry::{AdapterDesc, BusRegistry, I2cBus},
    };
    use alloc::sync::Arc;
    use dt::{
        node::{DeviceTree, Node},
        prop::Property,
    };
    use utils::handle::Handle;

    struct Fixture {
        tree: DeviceTree,
        bus: Arc<I2cBus>,
        of: I2cOf,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(I2cBus::new());
        Fixture {
            tree: DeviceTree::new(),
            of: I2cOf::new(bus.clone(), BindingConfig::default()),
            bus,
        }
    }

    #[test]
    fn device_by_node_balances_references() {
        let f = fixture();
        let adap_node = f.tree.add_static(&f.tree.root(), Node::new("i2c@0"));
        let node = f.tree.add_static(
            &adap_node,
            Node::new("eeprom@50")
                .with_prop(Property::from_string("compatible", "atmel,24c02"))
                .with_prop(Property::from_u32("reg", 0x50)),
        );
        let adap = f
            .of
            .add_adapter(AdapterDesc::new().with_node(adap_node.clone()))
            .unwrap();

        let client = f.of.find_device_by_node(&node).unwrap();
        let base = Handle::strong_count(client.as_device());
        let again = f.of.find_device_by_node(&node).unwrap();
        assert_eq!(Handle::strong_count(client.as_device()), base + 1);
        drop(again);
        assert_eq!(Handle::strong_count(client.as_device()), base);

        // The adapter node matches the adapter, which is not a client.
        assert!(f.of.find_device_by_node(&adap_node).is_none());
        assert_eq!(Handle::strong_count(adap.as_device()), 2);
    }

    #[test]
    fn adapter_found_through_parent_device() {
        let f = fixture();
        let mux_node = f.tree.add_static(&f.tree.root(), Node::new("mux@70"));
        let mux = Device::new("mux", Some(mux_node.clone()), None);
        let adap = f
            .bus
            .add_adapter(AdapterDesc::new().with_parent(&mux))
            .unwrap();

        let found = f.of.find_adapter_by_node(&mux_node).unwrap();
        assert!(Handle::ptr_eq(found.as_device(), adap.as_device()));
        drop(found);
        assert_eq!(Handle::strong_count(adap.as_device()), 2);

        let stranger = f.tree.add_static(&f.tree.root(), Node::new("other"));
        assert!(f.of.find_adapter_by_node(&stranger).is_none());
    }

    #[test]
    fn pinned_adapter_requires_live_owner() {
        let f = fixture();
        let module = Module::new("i2c-demo");
        let adap_node = f.tree.add_static(&f.tree.root(), Node::new("i2c@0"));
        let adap = f
            .bus
            .add_adapter(
                AdapterDesc::new()
                    .with_node(adap_node.clone())
                    .with_owner(&module),
            )
            .unwrap();

        let pinned = f.of.get_adapter_by_node(&adap_node).unwrap();
        assert_eq!(module.ref_count(), 1);
        assert_eq!(pinned.nr(), adap.nr());
        drop(pinned);
        assert_eq!(module.ref_count(), 0);

        module.begin_unload();
        assert!(f.of.get_adapter_by_node(&adap_node).is_none());
        assert_eq!(module.ref_count(), 0);
        assert_eq!(Handle::strong_count(adap.as_device()), 2);
    }
}
