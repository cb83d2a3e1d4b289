//! Compatible-string matching tables.
use crate::node::Node;

/// One entry of a driver's match table. Tables may end with an entry whose `compatible` is
/// empty; nothing after it is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfDeviceId<T = ()> {
    pub compatible: &'static str,
    pub data: T,
}

impl<T> OfDeviceId<T> {
    pub const fn new(compatible: &'static str, data: T) -> OfDeviceId<T> {
        OfDeviceId { compatible, data }
    }
}

/// Iterate the entries of `table` up to its terminator.
pub fn table_entries<T>(table: &[OfDeviceId<T>]) -> impl Iterator<Item = &OfDeviceId<T>> {
    table.iter().take_while(|entry| !entry.compatible.is_empty())
}

/// Find the entry of `table` that best matches the `compatible` list of `node`.
///
/// Compatible strings compare case-insensitively. An entry matching an earlier string of the
/// node's list beats one matching a later string; ties go to the entry listed first.
pub fn match_node<'a, T>(table: &'a [OfDeviceId<T>], node: &Node) -> Option<&'a OfDeviceId<T>> {
    let compatible = node.compatible();
    let mut best: Option<(usize, &'a OfDeviceId<T>)> = None;
    for entry in table_entries(table) {
        let Some(index) = compatible
            .iter()
            .position(|c| c.eq_ignore_ascii_case(entry.compatible))
        else {
            continue;
        };
        if best.is_none_or(|(best_index, _)| index < best_index) {
            best = Some((index, entry));
        }
    }
    best.map(|(_, entry)| entry)
}
