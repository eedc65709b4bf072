//! An in-memory [`Transport`] fake exercising [`crate::mount`] and
//! [`crate::dispatch`] without a real IPC substrate.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::error::{Result, RpcError};
use crate::method::{Method, Reply, Request};
use crate::node::ServiceId;
use crate::transport::{CallId, IncomingCall, Transport};

pub struct FakeTransport {
    pub incoming: VecDeque<IncomingCall>,
    pub answers: Vec<(CallId, Result<Reply>)>,
    pub forwards: Vec<(CallId, Method, Request, u32)>,
    pub pending_write: Option<Vec<u8>>,
    pub pending_read: Option<Vec<u8>>,
    pub drained_with: Vec<RpcError>,
    pub hungup_sessions: Vec<u32>,
    mount_reply: Option<Result<(u64, u64, u32)>>,
    unmount_reply: Option<Result<()>>,
    mount_session: Option<u32>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            incoming: VecDeque::new(),
            answers: Vec::new(),
            forwards: Vec::new(),
            pending_write: None,
            pending_read: None,
            drained_with: Vec::new(),
            hungup_sessions: Vec::new(),
            mount_reply: None,
            unmount_reply: None,
            mount_session: None,
        }
    }

    pub fn push_call(&mut self, call: IncomingCall) {
        self.incoming.push_back(call);
    }

    pub fn set_mount_reply(&mut self, reply: Result<(u64, u64, u32)>) {
        self.mount_reply = Some(reply);
    }

    pub fn set_unmount_reply(&mut self, reply: Result<()>) {
        self.unmount_reply = Some(reply);
    }

    pub fn set_mount_session(&mut self, session: u32) {
        self.mount_session = Some(session);
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    type Session = u32;

    async fn recv_call(&mut self) -> Result<Option<IncomingCall>> {
        Ok(self.incoming.pop_front())
    }

    async fn answer(&mut self, call_id: CallId, reply: Reply) -> Result<()> {
        self.answers.push((call_id, Ok(reply)));
        Ok(())
    }

    async fn answer_error(&mut self, call_id: CallId, error: RpcError) -> Result<()> {
        self.answers.push((call_id, Err(error)));
        Ok(())
    }

    async fn forward(&mut self, call_id: CallId, method: Method, request: Request, session: &Self::Session) -> Result<()> {
        self.forwards.push((call_id, method, request, *session));
        Ok(())
    }

    async fn accept_data_write(&mut self, max_size: usize) -> Result<Vec<u8>> {
        let data = self.pending_write.take().unwrap_or_default();
        if data.len() > max_size {
            return Err(RpcError::Range);
        }
        Ok(data)
    }

    async fn accept_data_read(&mut self, data: &[u8]) -> Result<()> {
        match self.pending_read.take() {
            Some(expected) if expected.len() == data.len() => Ok(()),
            _ => Err(RpcError::InvalidArgument),
        }
    }

    async fn drain_with_error(&mut self, error: RpcError) -> Result<()> {
        self.pending_write = None;
        self.pending_read = None;
        self.drained_with.push(error);
        Ok(())
    }

    async fn accept_mount_session(&mut self) -> Result<Self::Session> {
        self.mount_session.take().ok_or(RpcError::BadFd)
    }

    async fn hangup_session(&mut self, session: Self::Session) -> Result<()> {
        self.hungup_sessions.push(session);
        Ok(())
    }

    async fn mount_mountee(&mut self, _session: &Self::Session, _mr_service_id: ServiceId, _options: Vec<u8>) -> Result<(u64, u64, u32)> {
        self.mount_reply.take().unwrap_or(Err(RpcError::BadFd))
    }

    async fn unmount_mountee(&mut self, _session: &Self::Session, _service_id: ServiceId) -> Result<()> {
        self.unmount_reply.take().unwrap_or(Err(RpcError::BadFd))
    }
}
