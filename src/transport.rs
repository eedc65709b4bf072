//! Transport abstraction (§1 external collaborator, §6, §9).
//!
//! The message-passing substrate itself — inter-process call framing, the
//! data-write/read negotiation primitives — is explicitly out of scope
//! (§1): this module defines only the typed seam the rest of the crate
//! programs against, the way [`crate::backend::Backend`] is the seam for
//! the concrete filesystem. A production binary plugs in a transport that
//! actually talks to the VFS front-end (shared memory, a socket); tests
//! plug in an in-memory fake built the same way.

use async_trait::async_trait;

use crate::error::{Result, RpcError};
use crate::method::{Method, Reply, Request};
use crate::node::ServiceId;

/// Identifies one pending call awaiting a reply, analogous to the
/// source's `ipc_callid_t`.
pub type CallId = u64;

/// A single inbound call: its id (for replying) and decoded request body.
#[derive(Debug, Clone)]
pub struct IncomingCall {
    pub call_id: CallId,
    pub request: Request,
}

/// One connection's view of the transport (§5: one fibril per
/// connection). `recv_call` is the suspension point the dispatch loop
/// awaits on; everything else is a reply/forward primitive.
#[async_trait]
pub trait Transport: Send + Sync {
    /// A cloneable session handle usable to address a *different*
    /// connection (used when forwarding across a mount point, or when
    /// establishing a mountee session in §4.5).
    type Session: crate::backend::Session;

    /// Receives the next inbound call, or `Ok(None)` when the peer sent
    /// a zero-valued method (the source's `IPC_GET_IMETHOD(call) == 0`),
    /// which signals the connection is being torn down — the dispatch
    /// loop must treat this as a terminating condition, not an error.
    async fn recv_call(&mut self) -> Result<Option<IncomingCall>>;

    /// Answers `call_id` with a successful reply payload.
    async fn answer(&mut self, call_id: CallId, reply: Reply) -> Result<()>;

    /// Answers `call_id` with a bare error code (no payload).
    async fn answer_error(&mut self, call_id: CallId, error: RpcError) -> Result<()>;

    /// Forwards the remainder of a request to `session` with
    /// "route-from-me" semantics (§4.4 steps 2 and mid-walk): the reply
    /// travels back on the forwarded channel, not through this
    /// transport.
    async fn forward(&mut self, call_id: CallId, method: Method, request: Request, session: &Self::Session) -> Result<()>;

    /// Accepts a pending data-write handshake (§6, §9), capping the
    /// transfer at `max_size` bytes. Rejects (by returning `Err`) a
    /// caller-supplied size larger than `max_size`, mirroring
    /// `async_data_write_receive`'s size check.
    async fn accept_data_write(&mut self, max_size: usize) -> Result<Vec<u8>>;

    /// Accepts a pending data-read handshake by sending `data` back,
    /// failing if the peer's requested buffer size does not match
    /// `data.len()` (mirrors `libfs_stat`'s exact-size check, §10.5).
    async fn accept_data_read(&mut self, data: &[u8]) -> Result<()>;

    /// Drains (rejects) a pending data-write/read handshake with an
    /// error, so the peer is not left blocked (§7 propagation policy).
    async fn drain_with_error(&mut self, error: RpcError) -> Result<()>;

    /// Receives the session clone attached to a pending `MOUNT` call
    /// (the source's `async_clone_receive`), addressing the mountee.
    async fn accept_mount_session(&mut self) -> Result<Self::Session>;

    /// Tears down a session this connection is no longer going to use
    /// (the source's `async_hangup`) — e.g. the mountee session received
    /// for a `MOUNT` call that cannot proceed (§4.5 step 1: mount point
    /// unavailable or already busy).
    async fn hangup_session(&mut self, session: Self::Session) -> Result<()>;

    /// Clones a parallel session to the mountee and forwards the
    /// mount-options data-write as `MOUNTED(mr_service_id)` (§4.5 steps
    /// 3-4: `async_clone_establish` + `async_data_write_forward_1_1`),
    /// returning the mounted root's `(index, size, link_count)` reply.
    async fn mount_mountee(
        &mut self,
        session: &Self::Session,
        mr_service_id: ServiceId,
        options: Vec<u8>,
    ) -> Result<(u64, u64, u32)>;

    /// Sends `UNMOUNTED(service_id)` to the mounted instance's session
    /// (§4.5) and awaits its bare answer.
    async fn unmount_mountee(&mut self, session: &Self::Session, service_id: ServiceId) -> Result<()>;
}
