//! MOUNT and UNMOUNT handlers (§4.5).
//!
//! Unlike [`crate::lookup`], which only ever decides what to reply or
//! where to forward, these handlers drive a second exchange with the
//! mountee filesystem through the transport before they can produce
//! their own answer. Grounded on the source's `libfs_mount`/
//! `libfs_unmount` (`uspace/lib/fs/libfs.c`).

use tracing::warn;

use crate::backend::{Backend, MountInfo};
use crate::dispatch::MAX_AUX_PAYLOAD;
use crate::error::{Result, RpcError};
use crate::method::{Args, Reply};
use crate::node::{FsHandle, NodeIndex, ServiceId};
use crate::transport::Transport;

/// Decoded `MOUNT` arguments (§6): `mp_sid, mp_idx, mr_fs, mr_sid`.
#[derive(Debug, Clone, Copy)]
pub struct MountArgs {
    pub mp_service_id: ServiceId,
    pub mp_fs_index: NodeIndex,
    pub mr_fs_handle: FsHandle,
    pub mr_service_id: ServiceId,
}

impl MountArgs {
    pub fn from_args(args: Args) -> Self {
        Self { mp_service_id: args[0], mp_fs_index: args[1], mr_fs_handle: args[2], mr_service_id: args[3] }
    }
}

/// Runs the `MOUNT` handler (§4.5).
///
/// `mountee_session` is the parallel session the transport already
/// cloned from the inbound mount request (the source's
/// `async_clone_receive`). The mount-options data-write is left pending
/// on `transport` until the mount point itself checks out (§4.5 step 1):
/// the source never locally reads those bytes either, forwarding the
/// pending write to the mountee verbatim via `async_data_write_forward_1_1`
/// (modeled here as accepting it and handing the bytes to
/// [`Transport::mount_mountee`]) and voiding it with `async_data_write_void`
/// on every earlier failure path instead.
pub async fn mount<B, T>(backend: &B, transport: &mut T, args: MountArgs, mountee_session: T::Session) -> Result<Reply>
where
    B: Backend<Session = T::Session>,
    T: Transport,
{
    let node = match backend.node_get(args.mp_service_id, args.mp_fs_index).await {
        Ok(Some(node)) => node,
        Ok(None) => return fail_before_exchange(transport, mountee_session, None, RpcError::NoEntry).await,
        Err(err) => {
            warn!(%err, "node_get failed during mount");
            // `combine_rc(res, ENOENT)`: node_get's own error wins over
            // the `ENOENT` fallback, same as every other handler's
            // `.map_err(|_| RpcError::BadFd)?.ok_or(RpcError::NoEntry)?`.
            let rc = RpcError::combine(Err(RpcError::BadFd), Err(RpcError::NoEntry)).unwrap_err();
            return fail_before_exchange(transport, mountee_session, None, rc).await;
        }
    };

    if backend.mount_point(&node).is_some() {
        return fail_before_exchange(transport, mountee_session, Some((backend, node)), RpcError::Busy).await;
    }

    let options = match transport.accept_data_write(MAX_AUX_PAYLOAD).await {
        Ok(options) => options,
        Err(err) => {
            if let Err(put_err) = backend.node_put(node).await {
                warn!(%put_err, "node_put failed after a failed mount-options data-write");
            }
            if let Err(hangup_err) = transport.hangup_session(mountee_session).await {
                warn!(%hangup_err, "hangup_session failed after a failed mount-options data-write");
            }
            return Err(err);
        }
    };

    match transport.mount_mountee(&mountee_session, args.mr_service_id, options).await {
        Ok((index, size, link_count)) => {
            // The reference on `node` is intentionally kept alive here:
            // it is released by `unmount`, not by this handler (§4.5,
            // §9 "Node lifetimes" — the deliberate double-hold).
            backend.set_mount_point(
                &node,
                Some(MountInfo {
                    mounted_fs_handle: args.mr_fs_handle,
                    mounted_service_id: args.mr_service_id,
                    session: mountee_session,
                }),
            );
            Ok(Reply::Mount { index, size, link_count })
        }
        Err(err) => {
            if let Err(put_err) = backend.node_put(node).await {
                warn!(%put_err, "node_put failed after a failed mount exchange");
            }
            Err(err)
        }
    }
}

/// Common teardown for every `MOUNT` failure that happens before the
/// mountee exchange is attempted (§4.5 step 1: mount point missing or
/// already busy): hang up the mountee session, release `node` if one was
/// acquired, and void the pending mount-options data-write with `rc` —
/// the source's `async_hangup` + `ops->node_put` + `async_data_write_void`
/// sequence, since that payload will now never be forwarded anywhere.
async fn fail_before_exchange<B, T>(
    transport: &mut T,
    mountee_session: T::Session,
    held_node: Option<(&B, B::Node)>,
    rc: RpcError,
) -> Result<Reply>
where
    B: Backend<Session = T::Session>,
    T: Transport,
{
    if let Err(err) = transport.hangup_session(mountee_session).await {
        warn!(%err, "hangup_session failed during mount failure cleanup");
    }
    if let Some((backend, node)) = held_node {
        if let Err(err) = backend.node_put(node).await {
            warn!(%err, "node_put failed during mount failure cleanup");
        }
    }
    if let Err(err) = transport.drain_with_error(rc).await {
        warn!(%err, "drain_with_error failed during mount failure cleanup");
    }
    Err(rc)
}

/// Decoded `UNMOUNT` arguments (§6): `mp_sid, mp_idx`.
#[derive(Debug, Clone, Copy)]
pub struct UnmountArgs {
    pub mp_service_id: ServiceId,
    pub mp_fs_index: NodeIndex,
}

impl UnmountArgs {
    pub fn from_args(args: Args) -> Self {
        Self { mp_service_id: args[0], mp_fs_index: args[1] }
    }
}

/// Runs the `UNMOUNT` handler (§4.5).
pub async fn unmount<B, T>(backend: &B, transport: &mut T, args: UnmountArgs) -> Result<Reply>
where
    B: Backend<Session = T::Session>,
    T: Transport,
{
    let node = match backend.node_get(args.mp_service_id, args.mp_fs_index).await {
        Ok(Some(node)) => node,
        Ok(None) => return Err(RpcError::NoEntry),
        Err(err) => {
            warn!(%err, "node_get failed during unmount");
            // `combine_rc(res, ENOENT)`, mirroring `mount`'s node-acquire path.
            return Err(RpcError::combine(Err(RpcError::BadFd), Err(RpcError::NoEntry)).unwrap_err());
        }
    };

    let Some(info) = backend.mount_point(&node) else {
        if let Err(err) = backend.node_put(node).await {
            warn!(%err, "node_put failed after unmount found no active mount point");
        }
        return Err(RpcError::InvalidArgument);
    };

    match transport.unmount_mountee(&info.session, info.mounted_service_id).await {
        Ok(()) => {
            backend.set_mount_point(&node, None);
            // One put for the reference `mount` held onto, one for this
            // handler's own acquisition above (§4.5).
            if let Err(err) = backend.node_put(node.clone()).await {
                warn!(%err, "node_put failed releasing the mount-time reference");
            }
            if let Err(err) = backend.node_put(node).await {
                warn!(%err, "node_put failed releasing unmount's own reference");
            }
            Ok(Reply::Empty)
        }
        Err(err) => {
            if let Err(put_err) = backend.node_put(node).await {
                warn!(%put_err, "node_put failed after a failed unmounted exchange");
            }
            Err(err)
        }
    }
}
