//! Live device tree: nodes, properties, per-node flags, compatible matching and the
//! reconfiguration notifier chain used to follow runtime changes of the tree.

#![no_std]
extern crate alloc;

pub mod matching;
pub mod node;
pub mod prop;
pub mod reconfig;
