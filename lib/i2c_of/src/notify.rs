//! Following runtime changes of the tree.
//!
//! A node that becomes available below an adapter's node gets a client; a populated node
//! that goes away loses its client. Creation failures are handed back to the tree as a
//! rejection, so the change that caused them can be undone.
use crate::{I2cOf, error::I2cOfError};
use dt::{
    node::{NodeFlags, NodeHandle},
    reconfig::{
        NotifyError, NotifyResult, ReconfigAction, ReconfigData, ReconfigNotifier, StateChange,
        get_state_change,
    },
};
use log::{error, warn};

impl I2cOf {
    fn notify_add(&self, dn: &NodeHandle) -> NotifyResult {
        let Some(parent) = dn.parent() else {
            return NotifyResult::NotApplicable;
        };
        let Some(adapter) = self.find_adapter_by_node(&parent) else {
            return NotifyResult::NotApplicable; // not for us
        };

        match self.claim_and_register(&adapter, dn) {
            Ok(_) | Err(I2cOfError::AlreadyClaimed) => NotifyResult::Accept,
            Err(err) => {
                error!(
                    "{}: failed to create client for '{}': {}",
                    adapter.name, dn, err
                );
                NotifyResult::Reject(NotifyError::new(err))
            }
        }
    }

    fn notify_remove(&self, dn: &NodeHandle) -> NotifyResult {
        // already depopulated?
        if !dn.check_flag(NodeFlags::POPULATED) {
            return NotifyResult::NotApplicable;
        }

        let Some(client) = self.find_device_by_node(dn) else {
            warn!("of_i2c: '{}' is populated but has no client", dn);
            return NotifyResult::NotApplicable;
        };

        match self.unregister_client(&client) {
            Ok(()) => NotifyResult::Accept,
            Err(err) => {
                warn!("of_i2c: failed to remove client of '{}': {}", dn, err);
                NotifyResult::NotApplicable
            }
        }
    }
}

impl ReconfigNotifier for I2cOf {
    fn notify(&self, action: ReconfigAction, rd: &ReconfigData) -> NotifyResult {
        match get_state_change(action, rd) {
            StateChange::Add => self.notify_add(&rd.dn),
            StateChange::Remove => self.notify_remove(&rd.dn),
            StateChange::NoChange => NotifyResult::NotApplicable,
        }
    }
}
