//! Generic lookup & mount-crossing engine (§4.4) — the heart of the core.
//!
//! Walks a path through the [`Plb`], honoring mount-point forwarding and
//! the `L_CREATE`/`L_UNLINK`/`L_OPEN`/`L_EXCLUSIVE` flag composition,
//! while guaranteeing every acquired node is released exactly once
//! (§3, §5, §9 "Node lifetimes").
//!
//! The engine never touches a transport directly. It returns an
//! [`Outcome`] describing either a reply to send or a forward to issue;
//! the dispatch loop (§4.2) is the one place that actually talks to the
//! transport, which keeps this module runnable against a bare [`Backend`]
//! fake in tests.

use tracing::{debug, warn};

use crate::backend::{Backend, MountInfo};
use crate::error::{Result, RpcError};
use crate::method::{LookupFlags, Method, Reply, Request};
use crate::node::{start_index_from_wire, FsHandle, NodeIndex, NodeKind, ServiceId};
use crate::plb::Plb;

/// Decoded `LOOKUP` arguments (§4.4 inputs, §6 wire layout).
#[derive(Debug, Clone, Copy)]
pub struct Input {
    pub first: usize,
    pub length: usize,
    pub service_id: ServiceId,
    pub start_index: Option<NodeIndex>,
    pub lflag: LookupFlags,
}

/// What the lookup engine decided to do with a call. The caller (the
/// dispatch loop) turns this into an actual transport `answer`/`forward`.
pub enum Outcome<Session> {
    /// Answer the call directly with this reply (success or error).
    Reply(Result<Reply>),
    /// Forward the remainder of the path to `session` with
    /// "route-from-me" semantics (§4.4 steps 2 and mid-walk).
    Forward { method: Method, request: Request, session: Session },
}

/// Runs the lookup algorithm (§4.4) against `backend`.
pub async fn lookup<B: Backend>(backend: &B, plb: &Plb, fs_handle: FsHandle, input: Input) -> Outcome<B::Session> {
    // `L_UNLINK | L_CREATE` is rejected outright (§4.4 decided precedence,
    // §9 open question) before any node is acquired.
    if input.lflag.contains(LookupFlags::UNLINK) && input.lflag.contains(LookupFlags::CREATE) {
        return Outcome::Reply(Err(RpcError::InvalidArgument));
    }

    let mut par: Option<B::Node> = None;
    let mut cur: Option<B::Node> = None;
    let mut tmp: Option<B::Node> = None;

    let outcome = run(backend, plb, fs_handle, input, &mut par, &mut cur, &mut tmp).await;

    // Cleanup runs unconditionally and in the source's exact order
    // (par, then cur, then tmp), regardless of which branch produced
    // `outcome` — including the forwarding branches, which only hand off
    // the reply channel, not these references (§4.4 step 9).
    if let Some(node) = par.take() {
        release_node(backend, node).await;
    }
    if let Some(node) = cur.take() {
        release_node(backend, node).await;
    }
    if let Some(node) = tmp.take() {
        release_node(backend, node).await;
    }

    outcome
}

async fn release_node<B: Backend>(backend: &B, node: B::Node) {
    if let Err(err) = backend.node_put(node).await {
        warn!(%err, "node_put failed during lookup cleanup");
    }
}

#[allow(clippy::too_many_arguments)]
async fn run<B: Backend>(
    backend: &B,
    plb: &Plb,
    fs_handle: FsHandle,
    input: Input,
    par: &mut Option<B::Node>,
    cur: &mut Option<B::Node>,
    tmp: &mut Option<B::Node>,
) -> Outcome<B::Session> {
    // Step 1: acquire the starting node.
    let start = match input.start_index {
        None => backend.root_get(input.service_id).await.map(Some),
        Some(index) => backend.node_get(input.service_id, index).await,
    };
    let start = match start {
        Ok(Some(node)) => node,
        Ok(None) => return Outcome::Reply(Err(RpcError::NoEntry)),
        Err(err) => {
            warn!(%err, "failed to acquire starting node");
            return Outcome::Reply(Err(RpcError::BadFd));
        }
    };
    *cur = Some(start);

    // Step 2: whole-path forwarding.
    if let Some(forward) = forward_if_mount_point(backend, cur.as_ref().unwrap(), input, input.first, input.length) {
        // The starting node's extra reference was only a read; release it
        // here so the uniform cleanup in `lookup()` doesn't double up —
        // `cur` already holds it, so just leave it there for cleanup.
        return forward;
    }

    // Step 3: iterate components.
    let mut next = input.first;
    let last = input.first + input.length;
    let mut component = String::new();

    while next != last {
        if cur.is_none() {
            return Outcome::Reply(Err(RpcError::NoEntry));
        }
        if !backend.is_directory(cur.as_ref().unwrap()) {
            return Outcome::Reply(Err(RpcError::NotDirectory));
        }

        component = match plb.get_component(&mut next, last) {
            Ok(c) => c,
            Err(err) => return Outcome::Reply(Err(err)),
        };

        if component.is_empty() {
            // The path was just "/"; stop with the root still in `cur`.
            break;
        }

        debug!(component = %component, "matching path component");
        match backend.matches(cur.as_ref().unwrap(), &component).await {
            Ok(found) => *tmp = found,
            Err(err) => {
                warn!(%err, component = %component, "backend match failed");
                return Outcome::Reply(Err(RpcError::BadFd));
            }
        }

        let crosses_mount = tmp.as_ref().is_some_and(|t| backend.mount_point(t).is_some());
        let is_last_component = next == last;
        if crosses_mount && (!input.lflag.contains(LookupFlags::MP) || !is_last_component) {
            let node = tmp.as_ref().unwrap();
            let info = backend.mount_point(node).expect("checked above");
            return Outcome::Forward {
                method: Method::Lookup,
                request: build_forward_request(input, next, last, info.mounted_service_id),
                session: info.session,
            };
        }

        if let Some(old_par) = par.take() {
            release_node(backend, old_par).await;
        }
        *par = cur.take();
        *cur = tmp.take();
    }

    // Step 4: post-walk checks.
    if let Some(node) = cur.as_ref() {
        if input.lflag.contains(LookupFlags::FILE) && backend.is_directory(node) {
            return Outcome::Reply(Err(RpcError::IsDirectory));
        }
        if input.lflag.contains(LookupFlags::DIRECTORY) && backend.is_file(node) {
            return Outcome::Reply(Err(RpcError::NotDirectory));
        }
    }

    // Step 5: unlink.
    if input.lflag.contains(LookupFlags::UNLINK) {
        let Some(target) = cur.as_ref() else {
            return Outcome::Reply(Err(RpcError::NoEntry));
        };
        let Some(parent) = par.as_ref() else {
            return Outcome::Reply(Err(RpcError::InvalidArgument));
        };
        let old_link_count = backend.link_count_get(target);
        match backend.unlink(parent, target, &component).await {
            Ok(()) => {
                let node = cur.as_ref().unwrap();
                return Outcome::Reply(Ok(Reply::Lookup {
                    fs_handle,
                    service_id: input.service_id as u64,
                    index: backend.index_get(node) as u64,
                    size: backend.size_get(node),
                    link_count: old_link_count,
                }));
            }
            Err(err) => {
                warn!(%err, "unlink failed");
                return Outcome::Reply(Err(RpcError::BadFd));
            }
        }
    }

    // Step 6: create.
    if input.lflag.contains(LookupFlags::CREATE) {
        if cur.is_some() && input.lflag.contains(LookupFlags::EXCLUSIVE) {
            return Outcome::Reply(Err(RpcError::AlreadyExists));
        }
        if cur.is_none() {
            let kind = if input.lflag.contains(LookupFlags::DIRECTORY) { NodeKind::Directory } else { NodeKind::File };
            let created = match backend.create(input.service_id, kind).await {
                Ok(Some(node)) => node,
                Ok(None) => return Outcome::Reply(Err(RpcError::NoSpace)),
                Err(err) => {
                    warn!(%err, "create failed");
                    return Outcome::Reply(Err(RpcError::NoSpace));
                }
            };
            let parent = par.as_ref().expect("root path cannot reach create with no parent");
            if let Err(err) = backend.link(parent, &created, &component).await {
                warn!(%err, "link after create failed, rolling back");
                if let Err(destroy_err) = backend.destroy(created).await {
                    warn!(%destroy_err, "destroy rollback after failed link also failed");
                }
                return Outcome::Reply(Err(RpcError::BadFd));
            }
            *cur = Some(created);
        }
    }

    // Step 7 + return path.
    let Some(node) = cur.as_ref() else {
        return Outcome::Reply(Err(RpcError::NoEntry));
    };

    if input.lflag.contains(LookupFlags::OPEN) {
        if let Err(err) = backend.node_open(node).await {
            warn!(%err, "node_open failed");
            return Outcome::Reply(Err(RpcError::BadFd));
        }
    }

    Outcome::Reply(Ok(Reply::Lookup {
        fs_handle,
        service_id: input.service_id as u64,
        index: backend.index_get(node) as u64,
        size: backend.size_get(node),
        link_count: backend.link_count_get(node),
    }))
}

/// Step 2 helper: if `node` is itself an active mount point, the whole
/// remaining path is forwarded (§4.4).
fn forward_if_mount_point<B: Backend>(
    backend: &B,
    node: &B::Node,
    input: Input,
    first: usize,
    length: usize,
) -> Option<Outcome<B::Session>> {
    let info: MountInfo<B::Session> = backend.mount_point(node)?;
    Some(Outcome::Forward {
        method: Method::Lookup,
        request: build_forward_request(input, first, first + length, info.mounted_service_id),
        session: info.session,
    })
}

fn build_forward_request(input: Input, next: usize, last: usize, mounted_service_id: ServiceId) -> Request {
    use crate::method::Args;
    let args: Args = [next as u32, (last - next) as u32, mounted_service_id, crate::node::ROOT_INDEX_WIRE, input.lflag.bits()];
    Request::new(Method::Lookup, args)
}

impl Input {
    /// Decodes a `LOOKUP` request's argument slots (§6).
    pub fn from_args(args: crate::method::Args) -> Self {
        Self {
            first: args[0] as usize,
            length: args[1] as usize,
            service_id: args[2],
            start_index: start_index_from_wire(args[3]),
            lflag: LookupFlags::from_bits(args[4]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plb::PLB_SIZE;
    use crate::test_support::fake::FakeBackend;

    fn plb_with(path: &str) -> (Plb, usize, usize) {
        let mut bytes = vec![0u8; PLB_SIZE];
        bytes[..path.len()].copy_from_slice(path.as_bytes());
        (Plb::new(bytes.into_boxed_slice()), 0, path.len())
    }

    #[tokio::test]
    async fn plain_lookup_of_existing_file() {
        let backend = FakeBackend::new();
        backend.mkdir_root();
        backend.mkfile_in_root("hello.txt");

        let (plb, first, length) = plb_with("hello.txt");
        let input = Input { first, length, service_id: 1, start_index: None, lflag: LookupFlags::default() };

        match lookup(&backend, &plb, 7, input).await {
            Outcome::Reply(Ok(Reply::Lookup { fs_handle, service_id, link_count, .. })) => {
                assert_eq!(fs_handle, 7);
                assert_eq!(service_id, 1);
                assert_eq!(link_count, 1);
            }
            other => panic!("expected successful lookup reply, got {other:?}"),
        }
        assert_eq!(backend.outstanding_refs(), 0);
    }

    #[tokio::test]
    async fn lookup_of_missing_path_is_no_entry() {
        let backend = FakeBackend::new();
        backend.mkdir_root();

        let (plb, first, length) = plb_with("missing.txt");
        let input = Input { first, length, service_id: 1, start_index: None, lflag: LookupFlags::default() };

        assert!(matches!(lookup(&backend, &plb, 7, input).await, Outcome::Reply(Err(RpcError::NoEntry))));
        assert_eq!(backend.outstanding_refs(), 0);
    }

    #[tokio::test]
    async fn create_exclusive_on_existing_target_is_already_exists() {
        let backend = FakeBackend::new();
        backend.mkdir_root();
        backend.mkfile_in_root("existing");

        let (plb, first, length) = plb_with("existing");
        let input = Input {
            first,
            length,
            service_id: 1,
            start_index: None,
            lflag: LookupFlags::CREATE | LookupFlags::EXCLUSIVE,
        };

        assert!(matches!(lookup(&backend, &plb, 7, input).await, Outcome::Reply(Err(RpcError::AlreadyExists))));
        assert_eq!(backend.link_count_of_root_child("existing"), 1);
        assert_eq!(backend.outstanding_refs(), 0);
    }

    #[tokio::test]
    async fn create_allocates_and_links_a_new_file() {
        let backend = FakeBackend::new();
        backend.mkdir_root();

        let (plb, first, length) = plb_with("new.txt");
        let input =
            Input { first, length, service_id: 1, start_index: None, lflag: LookupFlags::CREATE | LookupFlags::FILE };

        match lookup(&backend, &plb, 7, input).await {
            Outcome::Reply(Ok(Reply::Lookup { .. })) => {}
            other => panic!("expected create to succeed, got {other:?}"),
        }
        assert!(backend.root_has_child("new.txt"));
        assert_eq!(backend.outstanding_refs(), 0);
    }

    #[tokio::test]
    async fn unlink_reports_pre_unlink_link_count() {
        let backend = FakeBackend::new();
        backend.mkdir_root();
        backend.mkfile_in_root("doomed");
        backend.bump_link_count("doomed", 2);

        let (plb, first, length) = plb_with("doomed");
        let input = Input { first, length, service_id: 1, start_index: None, lflag: LookupFlags::UNLINK };

        match lookup(&backend, &plb, 7, input).await {
            Outcome::Reply(Ok(Reply::Lookup { link_count, .. })) => assert_eq!(link_count, 2),
            other => panic!("expected unlink reply, got {other:?}"),
        }
        assert!(!backend.root_has_child("doomed"));
        assert_eq!(backend.outstanding_refs(), 0);
    }

    #[tokio::test]
    async fn unlink_create_combination_is_rejected_up_front() {
        let backend = FakeBackend::new();
        backend.mkdir_root();

        let (plb, first, length) = plb_with("anything");
        let input = Input {
            first,
            length,
            service_id: 1,
            start_index: None,
            lflag: LookupFlags::UNLINK | LookupFlags::CREATE,
        };

        assert!(matches!(lookup(&backend, &plb, 7, input).await, Outcome::Reply(Err(RpcError::InvalidArgument))));
        assert_eq!(backend.outstanding_refs(), 0);
    }

    #[tokio::test]
    async fn mid_walk_mount_point_forwards_unconsumed_suffix() {
        let backend = FakeBackend::new();
        backend.mkdir_root();
        let mount_session = backend.mount_child_dir("mnt", 2, 77);
        backend.mkfile_under(&mount_session, "mnt", "ignored-on-this-side");

        let (plb, first, length) = plb_with("mnt/deep/path");
        let input = Input { first, length, service_id: 1, start_index: None, lflag: LookupFlags::default() };

        match lookup(&backend, &plb, 7, input).await {
            Outcome::Forward { method: Method::Lookup, request, session } => {
                let decoded = Input::from_args(request.args);
                // The unconsumed suffix retains its leading slash: `next`
                // stops right after "mnt", at the '/' before "deep/path".
                assert_eq!(decoded.first, first + "mnt".len());
                assert_eq!(decoded.length, "/deep/path".len());
                assert_eq!(decoded.service_id, 2);
                assert!(decoded.start_index.is_none());
                assert_eq!(session, 77);
            }
            other => panic!("expected forward, got {other:?}"),
        }
        assert_eq!(backend.outstanding_refs(), 0);
    }

    #[tokio::test]
    async fn whole_path_forwarding_when_start_node_is_a_mount_point() {
        let backend = FakeBackend::new();
        let root_session = backend.mount_root(3, 55);
        let _ = root_session;

        let (plb, first, length) = plb_with("anything/at/all");
        let input = Input { first, length, service_id: 1, start_index: None, lflag: LookupFlags::default() };

        match lookup(&backend, &plb, 7, input).await {
            Outcome::Forward { request, session, .. } => {
                let decoded = Input::from_args(request.args);
                assert_eq!(decoded.first, first);
                assert_eq!(decoded.length, length);
                assert_eq!(session, 55);
            }
            other => panic!("expected forward, got {other:?}"),
        }
        assert_eq!(backend.outstanding_refs(), 0);
    }

    #[tokio::test]
    async fn directory_required_but_target_is_file() {
        let backend = FakeBackend::new();
        backend.mkdir_root();
        backend.mkfile_in_root("plain");

        let (plb, first, length) = plb_with("plain");
        let input = Input { first, length, service_id: 1, start_index: None, lflag: LookupFlags::DIRECTORY };

        assert!(matches!(lookup(&backend, &plb, 7, input).await, Outcome::Reply(Err(RpcError::NotDirectory))));
    }
}
