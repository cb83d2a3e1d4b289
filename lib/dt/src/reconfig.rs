//! Runtime reconfiguration events.
//!
//! Every structural or property change made through [crate::node::DeviceTree] is offered to the
//! subscribed [ReconfigNotifier]s together with a [ReconfigData] describing it. Subscribers
//! usually only care whether a node became usable or unusable, which [get_state_change] derives
//! from the raw action.
use crate::{
    node::{NodeHandle, status_is_okay},
    prop::Property,
};
use alloc::boxed::Box;
use core::{error::Error, fmt};

/// The raw change made to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigAction {
    AttachNode,
    DetachNode,
    AddProperty,
    RemoveProperty,
    UpdateProperty,
}

/// Payload of a reconfiguration event.
#[derive(Debug)]
pub struct ReconfigData {
    /// The node being changed.
    pub dn: NodeHandle,
    /// The added, removed or new property, for property actions.
    pub prop: Option<Property>,
    /// The replaced property, for [ReconfigAction::UpdateProperty].
    pub old_prop: Option<Property>,
}

impl ReconfigData {
    pub fn node(dn: NodeHandle) -> ReconfigData {
        ReconfigData {
            dn,
            prop: None,
            old_prop: None,
        }
    }

    pub fn property(
        dn: NodeHandle,
        prop: Option<Property>,
        old_prop: Option<Property>,
    ) -> ReconfigData {
        ReconfigData { dn, prop, old_prop }
    }
}

/// What a change means for the availability of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    NoChange,
    Add,
    Remove,
}

/// Derive the availability transition of `rd.dn` caused by `action`.
///
/// Attach and detach transitions depend on the node's own `status`. Property actions only count
/// when the property is `status`; a missing `status` means enabled.
pub fn get_state_change(action: ReconfigAction, rd: &ReconfigData) -> StateChange {
    let (prev_state, new_state) = match action {
        ReconfigAction::AttachNode => (false, rd.dn.is_available()),
        ReconfigAction::DetachNode => (rd.dn.is_available(), false),
        ReconfigAction::AddProperty
        | ReconfigAction::RemoveProperty
        | ReconfigAction::UpdateProperty => {
            let Some(prop) = rd.prop.as_ref().filter(|p| p.name.as_ref() == "status") else {
                return StateChange::NoChange;
            };
            let status_state = status_is_okay(prop);
            match action {
                ReconfigAction::AddProperty => (true, status_state),
                ReconfigAction::RemoveProperty => (status_state, true),
                _ => (
                    rd.old_prop.as_ref().is_none_or(status_is_okay),
                    status_state,
                ),
            }
        }
    };
    match (prev_state, new_state) {
        (false, true) => StateChange::Add,
        (true, false) => StateChange::Remove,
        _ => StateChange::NoChange,
    }
}

/// Reason attached to a rejected change.
pub struct NotifyError {
    reason: Box<dyn Error + Send + Sync>,
}

impl NotifyError {
    pub fn new(reason: impl Error + Send + Sync + 'static) -> NotifyError {
        NotifyError {
            reason: Box::new(reason),
        }
    }

    pub fn reason(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.reason.as_ref()
    }
}

impl fmt::Debug for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NotifyError({:?})", self.reason)
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.reason, f)
    }
}

impl Error for NotifyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.reason.as_ref())
    }
}

/// A subscriber's answer to a reconfiguration event.
#[derive(Debug)]
pub enum NotifyResult {
    /// The subscriber handled the change.
    Accept,
    /// The change is of no concern to the subscriber.
    NotApplicable,
    /// The change must not go through.
    Reject(NotifyError),
}

/// Subscriber of the reconfiguration chain.
pub trait ReconfigNotifier: Send + Sync {
    fn notify(&self, action: ReconfigAction, rd: &ReconfigData) -> NotifyResult;
}
