//! Device tree support for the I2C bus.
//!
//! Binds description nodes to bus clients: nodes below an adapter's node are turned into
//! clients when the adapter is populated, and clients follow the tree afterwards as nodes are
//! attached, detached, enabled or disabled at runtime.
//!
//! # Brief Introduction
//! [I2cOf] is the binding. It is built over an injected [registry::BusRegistry] and a
//! [BindingConfig], and subscribes to a [dt::node::DeviceTree] as a
//! [dt::reconfig::ReconfigNotifier].
//!
//! A node's `POPULATED` flag ([dt::node::NodeFlags::POPULATED]) is the claim that at most one
//! client exists per node. It is set atomically before a client is created. It is cleared if
//! creation fails, and again when the client is unregistered.
//!
//! Every lookup hands out counted references ([device::ClientHandle],
//! [device::AdapterHandle], [device::PinnedAdapter]) which are released when dropped.

#![no_std]
extern crate alloc;

pub mod board_info;
pub mod device;
pub mod error;
pub mod lookup;
pub mod matching;
pub mod notify;
pub mod register;
pub mod registry;

use crate::{board_info::BoardInfo, error::I2cOfError, registry::BusRegistry};
use alloc::{boxed::Box, sync::Arc};
use dt::node::NodeHandle;

/// Tunables of the binding. [Default] takes the values generated into the `config` crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConfig {
    /// Name of the optional child of an adapter node that holds the client nodes.
    pub bus_node_name: Box<str>,
    /// Marker bit of a `reg` value flagging a ten-bit address.
    pub ten_bit_address: u32,
    /// Marker bit of a `reg` value flagging an address this host answers on.
    pub own_slave_address: u32,
    /// Size of the client type buffer, terminator included.
    pub name_size: usize,
}

impl Default for BindingConfig {
    fn default() -> Self {
        BindingConfig {
            bus_node_name: Box::from(config::I2C_BUS_NODE_NAME),
            ten_bit_address: config::I2C_TEN_BIT_ADDRESS,
            own_slave_address: config::I2C_OWN_SLAVE_ADDRESS,
            name_size: config::I2C_NAME_SIZE,
        }
    }
}

/// The node-to-client binding of one bus registry.
pub struct I2cOf {
    registry: Arc<dyn BusRegistry>,
    config: BindingConfig,
}

impl I2cOf {
    pub fn new(registry: Arc<dyn BusRegistry>, config: BindingConfig) -> I2cOf {
        I2cOf { registry, config }
    }

    pub fn registry(&self) -> &Arc<dyn BusRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Build the descriptor of `node` without touching the node or the registry.
    pub fn get_board_info(&self, node: &NodeHandle) -> Result<BoardInfo, I2cOfError> {
        board_info::get_board_info(node, &self.config)
    }
}
