//! Pluggable per-filesystem backend capability set (§4.1, §9).
//!
//! The source expresses this as a table of function pointers
//! (`vfs_out_ops_t`/`libfs_ops_t`) stashed in a process-global. Here it is
//! a trait: the dispatcher and lookup engine are generic over `B: Backend`
//! and are handed an `Arc<B>` at registration time instead of reaching
//! into global state.

use async_trait::async_trait;

use crate::node::{FsHandle, NodeIndex, NodeKind, ServiceId};

/// A session handle used to forward requests across a mount point
/// (§4.4, §4.5). Left abstract: concrete transports supply their own
/// cloneable session type (a channel, a socket handle, ...).
pub trait Session: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> Session for T {}

/// Capability set a concrete filesystem server implements to plug into
/// the FS-glue dispatch/lookup engine.
///
/// Every method mirrors one entry of the source's `libfs_ops_t`/
/// `vfs_out_ops_t` tables. `node_get`/`root_get`/`match` distinguish
/// "not found" (`Ok(None)`) from a hard backend failure (`Err`), exactly
/// as the source's `(rc, fn*)` out-parameter pair does.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Node handle type. Kept generic rather than fixed to a plain
    /// `(service_id, index)` pair so a backend may carry extra in-memory
    /// state (open file descriptors, cached attributes, ...) alongside it.
    type Node: Send + Sync + Clone;
    /// Session type used to address a mounted instance.
    type Session: Session;
    /// Backend-specific failure detail (typically wraps `std::io::Error`).
    type Error: std::fmt::Display + Send + Sync + 'static;

    /// Returns the root node of `service_id`.
    async fn root_get(&self, service_id: ServiceId) -> Result<Self::Node, Self::Error>;

    /// Returns the node `index` of `service_id`, or `None` if it does not
    /// exist (not an error).
    async fn node_get(
        &self,
        service_id: ServiceId,
        index: NodeIndex,
    ) -> Result<Option<Self::Node>, Self::Error>;

    /// Releases one reference acquired via `node_get`/`root_get`/`match`/
    /// `create`.
    async fn node_put(&self, node: Self::Node) -> Result<(), Self::Error>;

    /// Marks a node as opened (§4.4 step 7).
    async fn node_open(&self, node: &Self::Node) -> Result<(), Self::Error>;

    /// Looks up `name` inside directory `parent`. `Ok(None)` means no such
    /// entry.
    async fn matches(
        &self,
        parent: &Self::Node,
        name: &str,
    ) -> Result<Option<Self::Node>, Self::Error>;

    /// Allocates a new orphan node of the given kind, not yet linked into
    /// any directory.
    async fn create(&self, service_id: ServiceId, kind: NodeKind) -> Result<Option<Self::Node>, Self::Error>;

    /// Removes a node created but never linked (create/link rollback).
    async fn destroy(&self, node: Self::Node) -> Result<(), Self::Error>;

    /// Links `child` under `parent` with `name`.
    async fn link(&self, parent: &Self::Node, child: &Self::Node, name: &str) -> Result<(), Self::Error>;

    /// Reverse of `link`; does not destroy `child`.
    async fn unlink(&self, parent: &Self::Node, child: &Self::Node, name: &str) -> Result<(), Self::Error>;

    fn is_file(&self, node: &Self::Node) -> bool;
    fn is_directory(&self, node: &Self::Node) -> bool;
    fn index_get(&self, node: &Self::Node) -> NodeIndex;
    fn size_get(&self, node: &Self::Node) -> u64;
    fn link_count_get(&self, node: &Self::Node) -> u32;
    fn service_get(&self, node: &Self::Node) -> ServiceId;

    /// Mount-point bookkeeping the engine needs but which belongs to the
    /// node's own storage (§3): whether `node` is currently an active
    /// mount point, and if so the session/ids to forward to.
    fn mount_point(&self, node: &Self::Node) -> Option<MountInfo<Self::Session>>;

    /// Installs (or clears, via `None`) the mount-point record on `node`.
    /// The caller (mount/unmount handlers) is responsible for holding the
    /// extra reference across an active mount (§3, §4.5).
    fn set_mount_point(&self, node: &Self::Node, info: Option<MountInfo<Self::Session>>);
}

/// Mount-point state returned by [`Backend::mount_point`] (§3).
#[derive(Clone)]
pub struct MountInfo<Session> {
    pub mounted_fs_handle: FsHandle,
    pub mounted_service_id: ServiceId,
    pub session: Session,
}

/// The direct, per-instance filesystem operations the dispatch loop
/// invokes without going through the lookup engine (§4.2): the source's
/// separate `vfs_out_ops_t` table, as opposed to the path-walking
/// `libfs_ops_t` table [`Backend`] mirrors. A concrete filesystem
/// implements both; they are kept as two traits because the source
/// keeps them as two structs with no overlap.
#[async_trait]
pub trait BulkOps: Send + Sync + 'static {
    type Node: Send + Sync + Clone;
    type Error: std::fmt::Display + Send + Sync + 'static;

    /// Accepts an incoming mount on `service_id` with the given
    /// mount-options payload, returning the mounted root node.
    async fn mounted(&self, service_id: ServiceId, opts: Vec<u8>) -> Result<Self::Node, Self::Error>;

    /// Tears down a previously mounted `service_id`.
    async fn unmounted(&self, service_id: ServiceId) -> Result<(), Self::Error>;

    /// Reads up to the backend's own chunk size from `index` at `pos`,
    /// returning the number of bytes actually read.
    async fn read(&self, service_id: ServiceId, index: NodeIndex, pos: u64) -> Result<u32, Self::Error>;

    /// Writes `data` to `index` at `pos`, returning `(bytes_written, new_size)`.
    async fn write(&self, service_id: ServiceId, index: NodeIndex, pos: u64, data: &[u8]) -> Result<(u32, u64), Self::Error>;

    async fn truncate(&self, service_id: ServiceId, index: NodeIndex, size: u64) -> Result<(), Self::Error>;
    async fn close(&self, service_id: ServiceId, index: NodeIndex) -> Result<(), Self::Error>;
    async fn destroy_node(&self, service_id: ServiceId, index: NodeIndex) -> Result<(), Self::Error>;
    async fn sync(&self, service_id: ServiceId, index: NodeIndex) -> Result<(), Self::Error>;
}
