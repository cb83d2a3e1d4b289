//! Matching clients against compatible tables.
use crate::device::ClientHandle;
use dt::matching::{OfDeviceId, match_node, table_entries};

/// Compare like a sysfs attribute: one trailing newline on either side is ignored, and so is
/// ASCII case.
fn sysfs_streq(a: &str, b: &str) -> bool {
    let a = a.strip_suffix('\n').unwrap_or(a);
    let b = b.strip_suffix('\n').unwrap_or(b);
    a.eq_ignore_ascii_case(b)
}

/// Match by client type, for clients created without a node (e.g. by name from user space).
///
/// For each entry in table order, the full compatible string is compared with the client
/// type, then the part after the vendor prefix. The first entry satisfying either wins.
fn match_device_sysfs<'a, T>(
    table: &'a [OfDeviceId<T>],
    client: &ClientHandle,
) -> Option<&'a OfDeviceId<T>> {
    let name = client.type_name();
    table_entries(table).find(|entry| {
        if sysfs_streq(name, entry.compatible) {
            return true;
        }
        let model = entry
            .compatible
            .split_once(',')
            .map_or(entry.compatible, |(_, model)| model);
        sysfs_streq(name, model)
    })
}

/// Find the entry of `table` describing `client`.
///
/// A client with a node is first matched through the node's compatible list. Matching by
/// client type is the fallback, and the only option for clients without a node.
pub fn match_device<'a, T>(
    table: &'a [OfDeviceId<T>],
    client: &ClientHandle,
) -> Option<&'a OfDeviceId<T>> {
    if let Some(node) = client.of_node.as_ref()
        && let Some(entry) = match_node(table, node)
    {
        return Some(entry);
    }
    match_device_sysfs(table, client)
}
