//! Registration handshake a backend performs to join the VFS front-end
//! (§4.3), grounded on the source's `fs_register`
//! (`uspace/lib/fs/libfs.c`).
//!
//! The actual connection establishment is an external collaborator
//! (§1); this module defines the typed sequence of steps
//! [`register`] drives against a [`RegistrationChannel`], and the one
//! piece of state registration produces that the rest of the crate
//! needs: the assigned [`FsHandle`] and the shared [`Plb`].

use async_trait::async_trait;

use crate::error::{Result, RpcError};
use crate::node::FsHandle;
use crate::plb::{Plb, PLB_SIZE};

/// Identifying information a backend advertises at registration time
/// (the source's `vfs_info_t`).
#[derive(Debug, Clone)]
pub struct VfsInfo {
    /// Short name of the filesystem type (e.g. `"fat"`).
    pub name: String,
    /// Whether concurrent reads on the same node are safe.
    pub concurrent_reads: bool,
    /// Whether concurrent writes on the same node are safe.
    pub concurrent_writes: bool,
}

/// The four registration steps a concrete transport implements against
/// its connection to the VFS front-end (§4.3). Kept as four narrow
/// steps, mirroring the source's four ordered calls, rather than one
/// opaque `register()` method, so [`register`] can apply the "forget
/// the outstanding request on failure" policy uniformly at each step.
#[async_trait]
pub trait RegistrationChannel: Send + Sync {
    /// Begins the exchange and asynchronously sends `REGISTER`,
    /// immediately followed by streaming `info` via the data-write
    /// subprotocol (source steps 1-2).
    async fn send_register(&mut self, info: &VfsInfo) -> Result<()>;

    /// Requests that subsequent inbound connections terminate in this
    /// backend's own dispatch loop (source step 3).
    async fn request_callback_connection(&mut self) -> Result<()>;

    /// Requests a read-only shared mapping of the PLB, `size` bytes
    /// long (source step 4).
    async fn share_plb(&mut self, size: usize) -> Result<Plb>;

    /// Awaits the asynchronous answer to the initial `REGISTER` send,
    /// yielding the assigned filesystem handle (source step 5).
    async fn await_fs_handle(&mut self) -> Result<FsHandle>;
}

/// Runs the registration handshake (§4.3) to completion.
///
/// An error at any step before [`RegistrationChannel::await_fs_handle`]
/// ends the exchange immediately without waiting for the `REGISTER`
/// answer — the source's "forget the outstanding request" policy, which
/// falls out here simply by returning early and letting `channel`'s own
/// `Drop` (if any) reclaim the pending call.
pub async fn register<C: RegistrationChannel>(channel: &mut C, info: VfsInfo) -> Result<(FsHandle, Plb)> {
    channel.send_register(&info).await?;
    channel.request_callback_connection().await?;

    let plb = channel.share_plb(PLB_SIZE).await.map_err(|_| RpcError::NoMemory)?;

    let fs_handle = channel.await_fs_handle().await?;
    Ok((fs_handle, plb))
}
