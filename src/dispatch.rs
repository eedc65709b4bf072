//! The per-connection dispatch loop (§4.2, §5), grounded on the
//! source's `vfs_connection` (`uspace/lib/fs/libfs.c`): one task per
//! connection, draining inbound calls serially and routing each one to
//! a handler by method.
//!
//! A zero-valued method terminates the connection (§4.2): [`Transport::recv_call`]
//! models this as `Ok(None)` rather than a [`Method`] variant, since an
//! unrecognized or zero wire id never becomes a valid [`Request`] in the
//! first place — a concrete transport answers unknown ids with
//! [`RpcError::NotSupported`] itself before this loop ever sees them.
//! The handlers that walk or cross mount points ([`crate::lookup`],
//! [`crate::mount`]) are generic over the same `B`/`T` pair used here;
//! the remaining methods invoke [`BulkOps`] directly, mirroring the
//! source's separate `vfs_out_ops_t` dispatch `switch`.

use tracing::{debug, trace, warn};

use crate::backend::{Backend, BulkOps};
use crate::error::RpcError;
use crate::lookup::{self, Input as LookupInput};
use crate::method::{Method, Reply, Request};
use crate::mount::{self, MountArgs, UnmountArgs};
use crate::node::{FsHandle, NodeIndex, ServiceId};
use crate::plb::Plb;
use crate::transport::{CallId, IncomingCall, Transport};

/// Largest mount-options / link-name payload this dispatcher will
/// accept off a data-write handshake before giving up with
/// [`RpcError::Range`]. Also used by [`crate::mount`] for the same
/// mount-options payload.
pub(crate) const MAX_AUX_PAYLOAD: usize = 64 * 1024;

/// Drains one connection to completion (§4.2, §5).
///
/// `initial_call_id`, when set, is answered affirmatively with an empty
/// reply before the main loop starts — the source's `if (iid)
/// async_answer_0(iid, EOK)` for connections opened via
/// `IPC_M_CONNECT_ME_TO` as opposed to a callback connection.
pub async fn run_connection<B, T>(backend: &B, transport: &mut T, fs_handle: FsHandle, plb: &Plb, initial_call_id: Option<CallId>)
where
    B: Backend<Session = T::Session> + BulkOps<Node = <B as Backend>::Node, Error = <B as Backend>::Error>,
    T: Transport,
{
    if let Some(call_id) = initial_call_id {
        if let Err(err) = transport.answer(call_id, Reply::Empty).await {
            warn!(%err, "failed to answer initial connect call");
            return;
        }
    }

    loop {
        match transport.recv_call().await {
            Ok(Some(call)) => dispatch_one(backend, transport, fs_handle, plb, call).await,
            Ok(None) => {
                trace!("connection terminated by zero method");
                return;
            }
            Err(err) => {
                warn!(%err, "failed to receive next call, ending connection");
                return;
            }
        }
    }
}

async fn dispatch_one<B, T>(backend: &B, transport: &mut T, fs_handle: FsHandle, plb: &Plb, call: IncomingCall)
where
    B: Backend<Session = T::Session> + BulkOps<Node = <B as Backend>::Node, Error = <B as Backend>::Error>,
    T: Transport,
{
    let IncomingCall { call_id, request } = call;
    debug!(method = ?request.method, "dispatching call");

    match request.method {
        Method::Lookup => {
            let input = LookupInput::from_args(request.args);
            match lookup::lookup(backend, plb, fs_handle, input).await {
                lookup::Outcome::Reply(result) => answer(transport, call_id, result).await,
                lookup::Outcome::Forward { method, request, session } => {
                    if let Err(err) = transport.forward(call_id, method, request, &session).await {
                        warn!(%err, "failed to forward lookup across a mount point");
                    }
                }
            }
        }
        Method::Mount => {
            let args = MountArgs::from_args(request.args);
            let result = mount_call(backend, transport, args).await;
            answer(transport, call_id, result).await;
        }
        Method::Unmount => {
            let args = UnmountArgs::from_args(request.args);
            let result = mount::unmount(backend, transport, args).await;
            answer(transport, call_id, result).await;
        }
        Method::Mounted => {
            let service_id = request.args[0];
            let result = mounted_call(backend, transport, service_id).await;
            answer(transport, call_id, result).await;
        }
        Method::Unmounted => {
            let service_id = request.args[0];
            let result = backend.unmounted(service_id).await.map(|()| Reply::Empty).map_err(|err| {
                warn!(%err, "unmounted failed");
                RpcError::BadFd
            });
            answer(transport, call_id, result).await;
        }
        Method::Link => {
            let result = link_call(backend, transport, request).await;
            answer(transport, call_id, result).await;
        }
        Method::Read => {
            let (service_id, index, pos) = sid_index_pos(request);
            let result = backend.read(service_id, index, pos).await.map(|bytes| Reply::Read { bytes }).map_err(|err| {
                warn!(%err, "read failed");
                RpcError::BadFd
            });
            answer(transport, call_id, result).await;
        }
        Method::Write => {
            let (service_id, index, pos) = sid_index_pos(request);
            let result = match transport.accept_data_write(MAX_AUX_PAYLOAD).await {
                Ok(data) => backend.write(service_id, index, pos, &data).await.map(|(bytes, new_size)| Reply::Write { bytes, new_size }).map_err(
                    |err| {
                        warn!(%err, "write failed");
                        RpcError::BadFd
                    },
                ),
                Err(err) => Err(err),
            };
            answer(transport, call_id, result).await;
        }
        Method::Truncate => {
            let service_id = request.args[0];
            let index = request.args[1];
            let size = Request::merge64(request.args[2], request.args[3]);
            let result = backend.truncate(service_id, index, size).await.map(|()| Reply::Empty).map_err(|err| {
                warn!(%err, "truncate failed");
                RpcError::BadFd
            });
            answer(transport, call_id, result).await;
        }
        Method::Close => {
            let result = backend.close(request.args[0], request.args[1]).await.map(|()| Reply::Empty).map_err(|err| {
                warn!(%err, "close failed");
                RpcError::BadFd
            });
            answer(transport, call_id, result).await;
        }
        Method::Destroy => {
            let result = backend.destroy_node(request.args[0], request.args[1]).await.map(|()| Reply::Empty).map_err(|err| {
                warn!(%err, "destroy failed");
                RpcError::BadFd
            });
            answer(transport, call_id, result).await;
        }
        Method::Sync => {
            let result = backend.sync(request.args[0], request.args[1]).await.map(|()| Reply::Empty).map_err(|err| {
                warn!(%err, "sync failed");
                RpcError::BadFd
            });
            answer(transport, call_id, result).await;
        }
        Method::OpenNode => {
            let result = open_node_call(backend, request).await;
            answer(transport, call_id, result).await;
        }
        Method::Stat => {
            let result = stat_call(backend, transport, fs_handle, request).await;
            answer(transport, call_id, result).await;
        }
    }
}

async fn answer<T: Transport>(transport: &mut T, call_id: CallId, result: crate::error::Result<Reply>) {
    let outcome = match result {
        Ok(reply) => transport.answer(call_id, reply).await,
        Err(err) => transport.answer_error(call_id, err).await,
    };
    if let Err(err) = outcome {
        warn!(%err, "failed to deliver reply");
    }
}

fn sid_index_pos(request: Request) -> (ServiceId, NodeIndex, u64) {
    (request.args[0], request.args[1], Request::merge64(request.args[2], request.args[3]))
}

async fn mount_call<B, T>(backend: &B, transport: &mut T, args: MountArgs) -> crate::error::Result<Reply>
where
    B: Backend<Session = T::Session>,
    T: Transport,
{
    let session = transport.accept_mount_session().await?;
    mount::mount(backend, transport, args, session).await
}

async fn mounted_call<B, T>(backend: &B, transport: &mut T, service_id: ServiceId) -> crate::error::Result<Reply>
where
    B: Backend + BulkOps<Node = <B as Backend>::Node>,
    T: Transport,
{
    let opts = transport.accept_data_write(MAX_AUX_PAYLOAD).await?;
    match backend.mounted(service_id, opts).await {
        Ok(node) => {
            Ok(Reply::Mounted { index: backend.index_get(&node) as u64, size: backend.size_get(&node), link_count: backend.link_count_get(&node) })
        }
        Err(err) => {
            warn!(%err, "mounted failed");
            Err(RpcError::BadFd)
        }
    }
}

async fn link_call<B, T>(backend: &B, transport: &mut T, request: Request) -> crate::error::Result<Reply>
where
    B: Backend,
    T: Transport,
{
    let parent_sid = request.args[0];
    let parent_index = request.args[1];
    let child_index = request.args[2];

    let name_bytes = transport.accept_data_write(crate::plb::NAME_MAX + 1).await?;
    let name = String::from_utf8_lossy(&name_bytes).into_owned();

    let parent = backend.node_get(parent_sid, parent_index).await.map_err(|_| RpcError::BadFd)?.ok_or(RpcError::BadFd)?;
    let child = match backend.node_get(parent_sid, child_index).await {
        Ok(Some(child)) => child,
        Ok(None) | Err(_) => {
            let _ = backend.node_put(parent).await;
            return Err(RpcError::BadFd);
        }
    };

    let result = backend.link(&parent, &child, &name).await.map(|()| Reply::Empty).map_err(|err| {
        warn!(%err, "link failed");
        RpcError::BadFd
    });
    let _ = backend.node_put(parent).await;
    let _ = backend.node_put(child).await;
    result
}

async fn open_node_call<B: Backend>(backend: &B, request: Request) -> crate::error::Result<Reply> {
    let service_id = request.args[0];
    let index = request.args[1];
    let node = backend.node_get(service_id, index).await.map_err(|_| RpcError::BadFd)?.ok_or(RpcError::NoEntry)?;

    if let Err(err) = backend.node_open(&node).await {
        warn!(%err, "node_open failed");
        let _ = backend.node_put(node).await;
        return Err(RpcError::BadFd);
    }

    let size = backend.size_get(&node);
    let link_count = backend.link_count_get(&node);
    let kind_flags = (backend.is_file(&node) as u32) | ((backend.is_directory(&node) as u32) << 1);
    let _ = backend.node_put(node).await;
    Ok(Reply::OpenNode { size, link_count, kind_flags })
}

async fn stat_call<B, T>(backend: &B, transport: &mut T, fs_handle: FsHandle, request: Request) -> crate::error::Result<Reply>
where
    B: Backend,
    T: Transport,
{
    let service_id = request.args[0];
    let index = request.args[1];
    let node = backend.node_get(service_id, index).await.map_err(|_| RpcError::BadFd)?.ok_or(RpcError::NoEntry)?;

    let stat = StatPayload {
        fs_handle,
        service_id,
        index,
        link_count: backend.link_count_get(&node),
        is_file: backend.is_file(&node),
        is_directory: backend.is_directory(&node),
        size: backend.size_get(&node),
        service: backend.service_get(&node),
    };
    let _ = backend.node_put(node).await;

    let encoded = stat.encode();
    // `libfs_stat`'s exact-size check (§10.5): the peer's requested
    // read buffer must be precisely `encoded.len()`.
    transport.accept_data_read(&encoded).await?;
    Ok(Reply::Empty)
}

/// Fixed-size `stat` payload delivered over the `STAT` data-read
/// handshake (§4.6 refers to the on-disk format; this is the wire
/// reply shape, not a disk structure).
struct StatPayload {
    fs_handle: FsHandle,
    service_id: ServiceId,
    index: NodeIndex,
    link_count: u32,
    is_file: bool,
    is_directory: bool,
    size: u64,
    service: ServiceId,
}

impl StatPayload {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 * 5 + 8 + 2);
        out.extend_from_slice(&self.fs_handle.to_le_bytes());
        out.extend_from_slice(&self.service_id.to_le_bytes());
        out.extend_from_slice(&self.index.to_le_bytes());
        out.extend_from_slice(&self.link_count.to_le_bytes());
        out.push(self.is_file as u8);
        out.push(self.is_directory as u8);
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.service.to_le_bytes());
        out
    }
}
