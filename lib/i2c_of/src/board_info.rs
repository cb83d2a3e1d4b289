//! Translate a description node into the descriptor a client is created from.
use crate::{BindingConfig, error::I2cOfError};
use alloc::boxed::Box;
use bitflags::bitflags;
use core::fmt;
use dt::node::NodeHandle;
use log::error;
use utils::handle::Handle;

bitflags! {
    /// Client flags carried by a descriptor and by the created client.
    pub struct ClientFlags: u16 {
        /// The address is a ten-bit address.
        const TEN         = 0x10;
        /// The address is one this host answers on as a target.
        const SLAVE       = 0x20;
        /// The client may raise host-notify events.
        const HOST_NOTIFY = 0x40;
        /// The client may wake the system.
        const WAKE        = 0x80;
    }
}

/// Everything needed to instantiate one client. Built fresh for every registration attempt.
pub struct BoardInfo {
    pub type_name: Box<str>,
    pub addr: u16,
    pub flags: ClientFlags,
    pub of_node: Option<NodeHandle>,
}

impl PartialEq for BoardInfo {
    fn eq(&self, other: &Self) -> bool {
        let same_node = match (&self.of_node, &other.of_node) {
            (Some(a), Some(b)) => Handle::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.type_name == other.type_name
            && self.addr == other.addr
            && self.flags == other.flags
            && same_node
    }
}

impl fmt::Debug for BoardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardInfo")
            .field("type_name", &self.type_name)
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("flags", &self.flags)
            .field("of_node", &self.of_node.as_ref().map(|n| n.full_path()))
            .finish()
    }
}

/// Build the descriptor of `node`.
///
/// The type comes from the node's `compatible` (vendor prefix dropped, cut to
/// `name_size - 1` bytes) and the address from its first `reg` cell. The ten-bit and
/// own-slave marker bits of the raw address are independent; each one found is cleared from
/// the address and turned into its flag. `host-notify` and `wakeup-source` are boolean
/// properties: their presence sets the flag.
pub fn get_board_info(node: &NodeHandle, config: &BindingConfig) -> Result<BoardInfo, I2cOfError> {
    let type_name = node.modalias(config.name_size).map_err(|_| {
        error!("of_i2c: modalias failure on {}", node);
        I2cOfError::InvalidType
    })?;

    let mut addr = node.property_read_u32("reg").map_err(|_| {
        error!("of_i2c: invalid reg on {}", node);
        I2cOfError::InvalidAddress
    })?;

    let mut flags = ClientFlags::empty();
    if addr & config.ten_bit_address != 0 {
        addr &= !config.ten_bit_address;
        flags.insert(ClientFlags::TEN);
    }
    if addr & config.own_slave_address != 0 {
        addr &= !config.own_slave_address;
        flags.insert(ClientFlags::SLAVE);
    }
    let addr = u16::try_from(addr).map_err(|_| {
        error!("of_i2c: reg {:#x} out of range on {}", addr, node);
        I2cOfError::InvalidAddress
    })?;

    if node.property_read_bool("host-notify") {
        flags.insert(ClientFlags::HOST_NOTIFY);
    }
    if node.property_read_bool("wakeup-source") {
        flags.insert(ClientFlags::WAKE);
    }

    Ok(BoardInfo {
        type_name: Box::from(type_name.as_str()),
        addr,
        flags,
        of_node: Some(node.clone()),
    })
}
