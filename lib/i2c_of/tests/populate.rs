mod common;

use common::{RecordingRegistry, adapter_node, client_node, disabled, init_logger};
use dt::{
    matching::OfDeviceId,
    node::{DeviceTree, Node, NodeFlags},
};
use i2c_of::{
    BindingConfig, I2cOf, board_info::ClientFlags, error::I2cOfError, matching::match_device,
    registry::{AdapterDesc, BusRegistry},
};
use std::{
    sync::{Arc, atomic::Ordering},
    thread,
};
use utils::handle::Handle;

#[test]
fn populate_skips_disabled_nodes() {
    init_logger();
    let tree = DeviceTree::new();
    let a = adapter_node(&tree);
    let bus = tree.add_static(&a, Node::new("i2c-bus"));
    let n1 = tree.add_static(&bus, client_node("eeprom@50", "eeprom", 0x50));
    let n2 = tree.add_static(&bus, disabled(client_node("eeprom@51", "eeprom", 0x51)));

    let registry = Arc::new(RecordingRegistry::default());
    let of = I2cOf::new(registry.clone(), BindingConfig::default());
    let adap = registry.bus.add_adapter(AdapterDesc::new().with_node(a.clone())).unwrap();

    assert_eq!(of.register_children(&adap), 1);
    assert_eq!(registry.bus.clients().len(), 1);
    assert!(n1.check_flag(NodeFlags::POPULATED));
    assert!(!n2.check_flag(NodeFlags::POPULATED));

    let client = of.find_device_by_node(&n1).unwrap();
    assert_eq!(client.type_name(), "eeprom");
    assert_eq!(client.addr(), 0x50);
    assert_eq!(client.flags(), ClientFlags::empty());
    assert_eq!(client.name.as_ref(), "0-0050");
    assert!(Handle::ptr_eq(
        client.adapter().unwrap().as_device(),
        adap.as_device()
    ));
    assert!(of.find_device_by_node(&n2).is_none());
}

#[test]
fn children_directly_under_adapter_node() {
    init_logger();
    let tree = DeviceTree::new();
    let a = adapter_node(&tree);
    tree.add_static(&a, client_node("rtc@68", "nxp,pcf8563", 0x68));
    tree.add_static(&a, client_node("codec@1a", "wlf,wm8960", 0x1a));

    let registry = Arc::new(RecordingRegistry::default());
    let of = I2cOf::new(registry.clone(), BindingConfig::default());
    of.add_adapter(AdapterDesc::new().with_node(a)).unwrap();

    let mut names: Vec<_> = registry
        .bus
        .clients()
        .iter()
        .map(|c| c.type_name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, ["pcf8563", "wm8960"]);
}

#[test]
fn repopulating_creates_nothing_new() {
    init_logger();
    let tree = DeviceTree::new();
    let a = adapter_node(&tree);
    tree.add_static(&a, client_node("eeprom@50", "atmel,24c02", 0x50));

    let registry = Arc::new(RecordingRegistry::default());
    let of = I2cOf::new(registry.clone(), BindingConfig::default());
    let adap = of.add_adapter(AdapterDesc::new().with_node(a)).unwrap();
    let creates = registry.creates.load(Ordering::SeqCst);

    assert_eq!(of.register_children(&adap), 0);
    assert_eq!(
        registry.creates.load(Ordering::SeqCst),
        creates
    );
    assert_eq!(registry.bus.clients().len(), 1);
}

#[test]
fn refused_client_can_be_retried() {
    init_logger();
    let tree = DeviceTree::new();
    let a = adapter_node(&tree);
    let node = tree.add_static(&a, client_node("eeprom@50", "atmel,24c02", 0x50));

    let registry = Arc::new(RecordingRegistry::default());
    let of = I2cOf::new(registry.clone(), BindingConfig::default());
    registry.refuse(true);
    let adap = of.add_adapter(AdapterDesc::new().with_node(a)).unwrap();
    assert!(registry.bus.clients().is_empty());
    assert!(!node.check_flag(NodeFlags::POPULATED));

    registry.refuse(false);
    assert_eq!(of.register_children(&adap), 1);
    assert!(node.check_flag(NodeFlags::POPULATED));
}

#[test]
fn concurrent_claims_create_one_client() {
    init_logger();
    let tree = DeviceTree::new();
    let a = adapter_node(&tree);
    let node = tree.add_static(&a, client_node("eeprom@50", "atmel,24c02", 0x50));

    let registry = Arc::new(RecordingRegistry::default());
    let of = I2cOf::new(registry.clone(), BindingConfig::default());
    let adap = registry.bus.add_adapter(AdapterDesc::new().with_node(a)).unwrap();

    let results: Vec<_> = thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| s.spawn(|| of.claim_and_register(&adap, &node).map(|_| ())))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| *r == Err(I2cOfError::AlreadyClaimed))
    );
    assert_eq!(registry.bus.clients().len(), 1);
}

#[test]
fn populated_clients_match_driver_tables() {
    init_logger();
    const IDS: [OfDeviceId<u32>; 3] = [
        OfDeviceId::new("atmel,24c02", 256),
        OfDeviceId::new("atmel,24c32", 4096),
        OfDeviceId::new("", 0),
    ];

    let tree = DeviceTree::new();
    let a = adapter_node(&tree);
    let node = tree.add_static(&a, client_node("eeprom@50", "atmel,24c32", 0x50));
    let registry = Arc::new(RecordingRegistry::default());
    let of = I2cOf::new(registry.clone(), BindingConfig::default());
    of.add_adapter(AdapterDesc::new().with_node(a)).unwrap();

    let client = of.find_device_by_node(&node).unwrap();
    assert_eq!(match_device(&IDS, &client).map(|id| id.data), Some(4096));
}
