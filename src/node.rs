//! Wire-level id types for nodes, services and filesystem handles (§3).
//! Mount-point state itself lives on [`crate::backend::MountInfo`], owned
//! by each backend's own node storage.

/// Identifier of the filesystem instance (block device, export, ...)
/// owning a node. Opaque to the core; only used as a registry/backend key.
///
/// Sized to fit a single 32-bit wire argument slot (§6) — every request
/// that names a service id does so in one `Args` element, never split
/// across two like the 64-bit size/offset fields are.
pub type ServiceId = u32;

/// Stable per-instance object identifier a backend hands out for a node.
/// Same width rationale as [`ServiceId`].
pub type NodeIndex = u32;

/// Wire-level sentinel for "start from the root of `service_id`" (§4.4):
/// the source's `(fs_index_t) -1`, i.e. all bits set in the unsigned
/// index type. At the Rust API boundary this collapses to
/// `Option<NodeIndex>` (`None` == root) via [`start_index_from_wire`]
/// and [`start_index_to_wire`].
pub const ROOT_INDEX_WIRE: u32 = u32::MAX;

/// Decodes a wire-level start index into `None` (root) or `Some(index)`.
pub fn start_index_from_wire(raw: u32) -> Option<NodeIndex> {
    if raw == ROOT_INDEX_WIRE {
        None
    } else {
        Some(raw)
    }
}

/// Encodes a start index (`None` == root) back to its wire sentinel form.
pub fn start_index_to_wire(index: Option<NodeIndex>) -> u32 {
    index.unwrap_or(ROOT_INDEX_WIRE)
}

/// Filesystem handle assigned to a registered backend by the VFS
/// front-end at registration time (§4.3).
pub type FsHandle = u32;

/// Kind of node a `create` call should allocate, or a node's own kind as
/// reported by the backend (§4.1, §6 `L_FILE`/`L_DIRECTORY`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}
