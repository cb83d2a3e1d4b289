use crate::{
    prop::{Property, PropertyError},
    reconfig::{NotifyError, NotifyResult, ReconfigAction, ReconfigData, ReconfigNotifier},
};
use alloc::{
    boxed::Box,
    string::{String, ToString},
    sync::Arc,
    vec,
    vec::Vec,
};
use bitflags::bitflags;
use core::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};
use log::warn;
use spin::{Mutex, RwLock};
use utils::handle::{Handle, HandleRef};

/// A counted reference to a node. Cloning acquires, dropping releases.
pub type NodeHandle = Handle<Node>;

bitflags! {
    /// Per-node state bits, stored on the node itself.
    pub struct NodeFlags: u32 {
        /// The node has been detached from its parent.
        const DETACHED  = 1 << 3;
        /// A device has been instantiated from this node.
        const POPULATED = 1 << 4;
    }
}

pub struct Node {
    pub full_name: Box<str>,
    pub node_name: Box<str>,
    pub unit_addr: Box<str>,
    parent: RwLock<Option<HandleRef<Node>>>,
    children: RwLock<Vec<NodeHandle>>,
    props: RwLock<Vec<Property>>,
    flags: AtomicU32,
}

impl Node {
    /// Create a detached node named `full_name` (`name@unit-address`).
    pub fn new(full_name: impl AsRef<str>) -> Node {
        let full_name = full_name.as_ref();
        let (node_name, unit_addr) = full_name.split_once('@').unwrap_or((full_name, ""));
        Node {
            full_name: Box::from(full_name),
            node_name: Box::from(node_name),
            unit_addr: Box::from(unit_addr),
            parent: RwLock::new(None),
            children: RwLock::new(vec![]),
            props: RwLock::new(vec![]),
            flags: AtomicU32::new(0),
        }
    }

    pub fn with_prop(self, prop: Property) -> Node {
        self.props.write().push(prop);
        self
    }

    pub fn is_root(&self) -> bool {
        self.full_name.is_empty() && self.parent.read().is_none()
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent.read().as_ref().and_then(|p| p.get_handle())
    }

    /// Snapshot of all children, in tree order.
    pub fn children(&self) -> Vec<NodeHandle> {
        self.children.read().clone()
    }

    /// Snapshot of the children whose status marks them as enabled, in tree order.
    pub fn available_children(&self) -> Vec<NodeHandle> {
        self.children
            .read()
            .iter()
            .filter(|child| child.is_available())
            .cloned()
            .collect()
    }

    /// First child whose node name (the part before `@`) equals `name`.
    pub fn child_by_name(&self, name: impl AsRef<str>) -> Option<NodeHandle> {
        let name = name.as_ref();
        self.children
            .read()
            .iter()
            .find(|child| child.node_name.as_ref() == name)
            .cloned()
    }

    pub fn full_path(&self) -> String {
        match self.parent() {
            None if self.full_name.is_empty() => String::from("/"),
            None => self.full_name.to_string(),
            Some(parent) => {
                let mut path = parent.full_path();
                if !path.ends_with('/') {
                    path.push('/');
                }
                path += &self.full_name;
                path
            }
        }
    }
}

/// Property access
impl Node {
    pub fn get_property(&self, name: impl AsRef<str>) -> Option<Property> {
        let name = name.as_ref();
        self.props
            .read()
            .iter()
            .find(|prop| prop.name.as_ref() == name)
            .cloned()
    }

    pub fn has_property(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        self.props.read().iter().any(|prop| prop.name.as_ref() == name)
    }

    pub fn property_read_u32(&self, name: impl AsRef<str>) -> Result<u32, PropertyError> {
        self.get_property(name)
            .ok_or(PropertyError::PropNotFound)?
            .value_as_u32()
    }

    pub fn property_read_string(&self, name: impl AsRef<str>) -> Result<String, PropertyError> {
        let prop = self.get_property(name).ok_or(PropertyError::PropNotFound)?;
        prop.value_as_str().map(String::from)
    }

    /// Boolean properties are true when present, whatever their value.
    pub fn property_read_bool(&self, name: impl AsRef<str>) -> bool {
        self.has_property(name)
    }

    /// `status` absent, `"okay"` or `"ok"`.
    pub fn is_available(&self) -> bool {
        self.get_property("status")
            .is_none_or(|status| status_is_okay(&status))
    }

    pub fn compatible(&self) -> Vec<String> {
        self.get_property("compatible")
            .and_then(|prop| {
                prop.value_as_strlist()
                    .ok()
                    .map(|list| list.into_iter().map(String::from).collect())
            })
            .unwrap_or_default()
    }

    /// Derive a module alias from the first `compatible` string, dropping the vendor prefix.
    /// The result is cut to fit a buffer of `len` bytes including its terminator.
    pub fn modalias(&self, len: usize) -> Result<String, PropertyError> {
        let compatible = self
            .get_property("compatible")
            .ok_or(PropertyError::PropNotFound)?;
        let first = compatible.value_as_str()?;
        let alias = first.split_once(',').map_or(first, |(_, model)| model);
        let mut end = alias.len().min(len.saturating_sub(1));
        while !alias.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        Ok(String::from(&alias[..end]))
    }
}

/// Flag access
impl Node {
    pub fn check_flag(&self, flag: NodeFlags) -> bool {
        self.flags.load(Ordering::Acquire) & flag.bits() != 0
    }

    /// Set `flag` and report whether it was already set. Concurrent callers racing on the
    /// same flag observe exactly one `false`.
    pub fn test_and_set_flag(&self, flag: NodeFlags) -> bool {
        self.flags.fetch_or(flag.bits(), Ordering::AcqRel) & flag.bits() != 0
    }

    pub fn set_flag(&self, flag: NodeFlags) {
        self.flags.fetch_or(flag.bits(), Ordering::AcqRel);
    }

    pub fn clear_flag(&self, flag: NodeFlags) {
        self.flags.fetch_and(!flag.bits(), Ordering::AcqRel);
    }

    pub fn flags(&self) -> NodeFlags {
        NodeFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("path", &self.full_path())
            .field("flags", &self.flags())
            .finish()
    }
}

pub(crate) fn status_is_okay(status: &Property) -> bool {
    matches!(status.value_as_str(), Ok("okay") | Ok("ok"))
}

/// A live description tree with runtime attach/detach and a reconfiguration notifier chain.
pub struct DeviceTree {
    root: NodeHandle,
    notifiers: RwLock<Vec<Arc<dyn ReconfigNotifier>>>,
    mutation: Mutex<()>,
}

impl Default for DeviceTree {
    fn default() -> Self {
        DeviceTree::new()
    }
}

impl DeviceTree {
    pub fn new() -> DeviceTree {
        DeviceTree {
            root: NodeHandle::from(Node::new("")),
            notifiers: RwLock::new(vec![]),
            mutation: Mutex::new(()),
        }
    }

    pub fn root(&self) -> NodeHandle {
        self.root.clone()
    }

    pub fn get_node(&self, path: impl AsRef<str>) -> Option<NodeHandle> {
        let mut node = self.root.clone();
        for section in path.as_ref().split('/') {
            if section.trim().is_empty() {
                continue;
            }
            let next = node
                .children
                .read()
                .iter()
                .find(|child| child.full_name.as_ref() == section)
                .cloned();
            node = next?;
        }
        Some(node)
    }

    /// Link `node` under `parent` without notifying anyone, as when the boot tree is unflattened.
    pub fn add_static(&self, parent: &NodeHandle, node: Node) -> NodeHandle {
        let _guard = self.mutation.lock();
        link_child(parent, node)
    }

    /// Attach `node` under `parent` and notify subscribers. A rejection detaches the node again
    /// and is returned to the caller.
    pub fn attach_node(&self, parent: &NodeHandle, node: Node) -> Result<NodeHandle, TreeError> {
        let node = {
            let _guard = self.mutation.lock();
            link_child(parent, node)
        };
        let rd = ReconfigData::node(node.clone());
        if let Err(err) = self.notify(ReconfigAction::AttachNode, &rd) {
            let _guard = self.mutation.lock();
            unlink_child(parent, &node);
            return Err(TreeError::Rejected(err));
        }
        Ok(node)
    }

    /// Detach `node` from its parent and notify subscribers. A rejection re-links the node
    /// at its previous position.
    pub fn detach_node(&self, node: &NodeHandle) -> Result<(), TreeError> {
        let (parent, index) = {
            let _guard = self.mutation.lock();
            let parent = node.parent().ok_or(if node.is_root() {
                TreeError::NoParent
            } else {
                TreeError::NotAttached
            })?;
            let index = unlink_child(&parent, node).ok_or(TreeError::NotAttached)?;
            (parent, index)
        };
        let rd = ReconfigData::node(node.clone());
        if let Err(err) = self.notify(ReconfigAction::DetachNode, &rd) {
            let _guard = self.mutation.lock();
            relink_child(&parent, node, index);
            return Err(TreeError::Rejected(err));
        }
        Ok(())
    }

    /// Property changes are offered to subscribers first and applied only once accepted.
    pub fn add_property(&self, node: &NodeHandle, prop: Property) -> Result<(), TreeError> {
        if node.has_property(&prop.name) {
            return Err(TreeError::PropertyExists);
        }
        let rd = ReconfigData::property(node.clone(), Some(prop.clone()), None);
        self.notify(ReconfigAction::AddProperty, &rd)
            .map_err(TreeError::Rejected)?;
        let _guard = self.mutation.lock();
        node.props.write().push(prop);
        Ok(())
    }

    pub fn remove_property(
        &self,
        node: &NodeHandle,
        name: impl AsRef<str>,
    ) -> Result<Property, TreeError> {
        let prop = node.get_property(name).ok_or(TreeError::PropertyNotFound)?;
        let rd = ReconfigData::property(node.clone(), Some(prop.clone()), None);
        self.notify(ReconfigAction::RemoveProperty, &rd)
            .map_err(TreeError::Rejected)?;
        let _guard = self.mutation.lock();
        node.props.write().retain(|p| p.name != prop.name);
        Ok(prop)
    }

    /// Replace (or add) a property, returning the previous value.
    pub fn update_property(
        &self,
        node: &NodeHandle,
        prop: Property,
    ) -> Result<Option<Property>, TreeError> {
        let old_prop = node.get_property(&prop.name);
        let rd = ReconfigData::property(node.clone(), Some(prop.clone()), old_prop.clone());
        self.notify(ReconfigAction::UpdateProperty, &rd)
            .map_err(TreeError::Rejected)?;
        let _guard = self.mutation.lock();
        let mut props = node.props.write();
        match props.iter_mut().find(|p| p.name == prop.name) {
            Some(slot) => *slot = prop,
            None => props.push(prop),
        }
        Ok(old_prop)
    }

    pub fn register_notifier(&self, notifier: Arc<dyn ReconfigNotifier>) {
        self.notifiers.write().push(notifier);
    }

    pub fn unregister_notifier(&self, notifier: &Arc<dyn ReconfigNotifier>) -> bool {
        let mut guard = self.notifiers.write();
        let before = guard.len();
        guard.retain(|n| !Arc::ptr_eq(n, notifier));
        guard.len() != before
    }

    /// Call subscribers in registration order, stopping at the first rejection.
    /// The list is snapshotted so that subscribers may read the tree while being notified.
    fn notify(&self, action: ReconfigAction, rd: &ReconfigData) -> Result<(), NotifyError> {
        let notifiers = self.notifiers.read().clone();
        for notifier in notifiers {
            if let NotifyResult::Reject(err) = notifier.notify(action, rd) {
                warn!("{:?} of '{}' rejected: {}", action, rd.dn, err);
                return Err(err);
            }
        }
        Ok(())
    }
}

fn link_child(parent: &NodeHandle, node: Node) -> NodeHandle {
    *node.parent.write() = Some(parent.create_ref());
    let node = NodeHandle::from(node);
    parent.children.write().push(node.clone());
    node
}

fn unlink_child(parent: &NodeHandle, node: &NodeHandle) -> Option<usize> {
    let mut children = parent.children.write();
    let index = children.iter().position(|c| Handle::ptr_eq(c, node))?;
    children.remove(index);
    *node.parent.write() = None;
    node.set_flag(NodeFlags::DETACHED);
    Some(index)
}

fn relink_child(parent: &NodeHandle, node: &NodeHandle, index: usize) {
    let mut children = parent.children.write();
    let index = index.min(children.len());
    children.insert(index, node.clone());
    *node.parent.write() = Some(parent.create_ref());
    node.clear_flag(NodeFlags::DETACHED);
}

#[derive(Debug)]
pub enum TreeError {
    /// The root cannot be detached.
    NoParent,
    NotAttached,
    PropertyExists,
    PropertyNotFound,
    /// A reconfiguration subscriber vetoed the change.
    Rejected(NotifyError),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::NoParent => f.write_str("node has no parent"),
            TreeError::NotAttached => f.write_str("node is not attached"),
            TreeError::PropertyExists => f.write_str("property already exists"),
            TreeError::PropertyNotFound => f.write_str("property not found"),
            TreeError::Rejected(err) => write!(f, "change rejected: {}", err),
        }
    }
}

impl core::error::Error for TreeError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> (DeviceTree, NodeHandle) {
        let tree = DeviceTree::new();
        let soc = tree.add_static(&tree.root(), Node::new("soc"));
        let i2c = tree.add_static(
            &soc,
            Node::new("i2c@1000").with_prop(Property::from_string("compatible", "vend,i2c")),
        );
        tree.add_static(
            &i2c,
            Node::new("eeprom@50")
                .with_prop(Property::from_strlist("compatible", &["atmel,24c02", "eeprom"]))
                .with_prop(Property::from_u32("reg", 0x50)),
        );
        tree.add_static(
            &i2c,
            Node::new("sensor@48").with_prop(Property::from_string("status", "disabled")),
        );
        tree.add_static(
            &i2c,
            Node::new("rtc@68").with_prop(Property::from_string("status", "okay")),
        );
        (tree, i2c)
    }

    #[test]
    fn paths_and_lookup() {
        let (tree, i2c) = sample_tree();
        assert_eq!(i2c.full_path(), "/soc/i2c@1000");
        assert_eq!(tree.root().full_path(), "/");
        let eeprom = tree.get_node("/soc/i2c@1000/eeprom@50").unwrap();
        assert_eq!(eeprom.node_name.as_ref(), "eeprom");
        assert_eq!(eeprom.unit_addr.as_ref(), "50");
        assert!(Handle::ptr_eq(&eeprom.parent().unwrap(), &i2c));
        assert!(tree.get_node("/soc/missing").is_none());
    }

    #[test]
    fn available_children_skip_disabled() {
        let (_tree, i2c) = sample_tree();
        let names: Vec<String> = i2c
            .available_children()
            .iter()
            .map(|c| c.full_name.to_string())
            .collect();
        assert_eq!(names, vec!["eeprom@50", "rtc@68"]);
    }

    #[test]
    fn child_by_name_ignores_unit_address() {
        let (_tree, i2c) = sample_tree();
        assert_eq!(
            i2c.child_by_name("rtc").map(|c| c.full_name.to_string()),
            Some(String::from("rtc@68"))
        );
        assert!(i2c.child_by_name("rtc@68").is_none());
    }

    #[test]
    fn modalias_strips_vendor_and_truncates() {
        let (tree, _) = sample_tree();
        let eeprom = tree.get_node("/soc/i2c@1000/eeprom@50").unwrap();
        assert_eq!(eeprom.modalias(20).unwrap(), "24c02");
        assert_eq!(eeprom.modalias(4).unwrap(), "24c");
        assert_eq!(eeprom.modalias(1), Err(PropertyError::InvalidPropFormat));
        assert_eq!(eeprom.modalias(0), Err(PropertyError::InvalidPropFormat));
        let rtc = tree.get_node("/soc/i2c@1000/rtc@68").unwrap();
        assert_eq!(rtc.modalias(20), Err(PropertyError::PropNotFound));
    }

    #[test]
    fn bool_properties() {
        let node = Node::new("n")
            .with_prop(Property::empty("flag"))
            .with_prop(Property::from_u32("off", 0))
            .with_prop(Property::from_u32("on", 1));
        assert!(node.property_read_bool("flag"));
        assert!(node.property_read_bool("off"));
        assert!(node.property_read_bool("on"));
        assert!(!node.property_read_bool("missing"));
    }

    #[test]
    fn test_and_set_reports_previous_state() {
        let node = Node::new("n");
        assert!(!node.test_and_set_flag(NodeFlags::POPULATED));
        assert!(node.test_and_set_flag(NodeFlags::POPULATED));
        assert!(node.check_flag(NodeFlags::POPULATED));
        node.clear_flag(NodeFlags::POPULATED);
        assert!(!node.check_flag(NodeFlags::POPULATED));
    }

    #[test]
    fn detach_unlinks_and_marks() {
        let (tree, i2c) = sample_tree();
        let rtc = tree.get_node("/soc/i2c@1000/rtc@68").unwrap();
        tree.detach_node(&rtc).unwrap();
        assert!(rtc.parent().is_none());
        assert!(rtc.check_flag(NodeFlags::DETACHED));
        assert!(i2c.child_by_name("rtc").is_none());
        assert!(matches!(tree.detach_node(&rtc), Err(TreeError::NotAttached)));
        assert!(matches!(tree.detach_node(&tree.root()), Err(TreeError::NoParent)));
    }

    #[test]
    fn property_updates() {
        let (tree, i2c) = sample_tree();
        let old = tree
            .update_property(&i2c, Property::from_string("status", "disabled"))
            .unwrap();
        assert!(old.is_none());
        assert!(!i2c.is_available());
        let removed = tree.remove_property(&i2c, "status").unwrap();
        assert_eq!(removed.value_as_str(), Ok("disabled"));
        assert!(i2c.is_available());
        assert!(matches!(
            tree.add_property(&i2c, Property::from_string("compatible", "x")),
            Err(TreeError::PropertyExists)
        ));
    }

    #[test]
    fn handles_are_released_after_lookup() {
        let (tree, _) = sample_tree();
        let eeprom = tree.get_node("/soc/i2c@1000/eeprom@50").unwrap();
        let base = Handle::strong_count(&eeprom);
        let again = tree.get_node("/soc/i2c@1000/eeprom@50").unwrap();
        assert_eq!(Handle::strong_count(&eeprom), base + 1);
        drop(again);
        assert_eq!(Handle::strong_count(&eeprom), base);
    }
}
