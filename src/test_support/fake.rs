//! An in-memory [`Backend`] fake used to exercise [`crate::lookup`] and
//! [`crate::mount`] without a real block-backed filesystem.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{Backend, BulkOps, MountInfo};
use crate::node::{NodeIndex, NodeKind, ServiceId};

/// Lightweight handle into [`FakeBackend`]'s own storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeNode {
    pub service_id: ServiceId,
    pub index: NodeIndex,
}

#[derive(Clone)]
struct NodeData {
    kind: NodeKind,
    children: BTreeMap<String, NodeIndex>,
    link_count: u32,
    size: u64,
    mount: Option<MountInfo<u32>>,
    content: Vec<u8>,
}

struct Instance {
    nodes: HashMap<NodeIndex, NodeData>,
    next_index: NodeIndex,
}

impl Instance {
    fn empty() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            0,
            NodeData { kind: NodeKind::Directory, children: BTreeMap::new(), link_count: 1, size: 0, mount: None, content: Vec::new() },
        );
        Self { nodes, next_index: 1 }
    }
}

/// An in-memory, multi-instance backend: a `HashMap<ServiceId, Instance>`
/// under one lock, standing in for many on-disk filesystem instances at
/// once (so mount-crossing tests can exercise two "different" backends
/// through a single [`Backend`] implementation).
pub struct FakeBackend {
    instances: Mutex<HashMap<ServiceId, Instance>>,
    refs: AtomicI64,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self { instances: Mutex::new(HashMap::new()), refs: AtomicI64::new(0) }
    }

    /// Outstanding `node_get`/`root_get`/`matches`/`create` acquisitions
    /// not yet balanced by a `node_put`/`destroy`. Tests assert this is
    /// zero after every call to confirm the reference discipline (§3, §5)
    /// held.
    pub fn outstanding_refs(&self) -> i64 {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn mkdir_root(&self) {
        self.instances.lock().unwrap().insert(1, Instance::empty());
    }

    fn insert_child(&self, service_id: ServiceId, parent_index: NodeIndex, name: &str, kind: NodeKind) -> NodeIndex {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(&service_id).expect("instance must exist");
        let index = instance.next_index;
        instance.next_index += 1;
        instance.nodes.insert(index, NodeData { kind, children: BTreeMap::new(), link_count: 1, size: 0, mount: None, content: Vec::new() });
        instance.nodes.get_mut(&parent_index).unwrap().children.insert(name.to_owned(), index);
        index
    }

    pub fn mkfile_in_root(&self, name: &str) -> NodeIndex {
        self.insert_child(1, 0, name, NodeKind::File)
    }

    /// Creates a plain (not mounted) directory under service 1's root.
    pub fn mkfile_in_root_dir(&self, name: &str) -> NodeIndex {
        self.insert_child(1, 0, name, NodeKind::Directory)
    }

    pub fn index_of_root_child(&self, name: &str) -> NodeIndex {
        let instances = self.instances.lock().unwrap();
        instances.get(&1).unwrap().nodes.get(&0).unwrap().children[name]
    }

    pub fn root_has_child(&self, name: &str) -> bool {
        let instances = self.instances.lock().unwrap();
        instances.get(&1).unwrap().nodes.get(&0).unwrap().children.contains_key(name)
    }

    pub fn link_count_of_root_child(&self, name: &str) -> u32 {
        let instances = self.instances.lock().unwrap();
        let root = instances.get(&1).unwrap().nodes.get(&0).unwrap();
        let idx = root.children[name];
        instances.get(&1).unwrap().nodes.get(&idx).unwrap().link_count
    }

    pub fn bump_link_count(&self, name: &str, count: u32) {
        let mut instances = self.instances.lock().unwrap();
        let idx = instances.get(&1).unwrap().nodes.get(&0).unwrap().children[name];
        instances.get_mut(&1).unwrap().nodes.get_mut(&idx).unwrap().link_count = count;
    }

    /// Creates directory `name` under service 1's root and turns it into
    /// an active mount point addressing a freshly created instance
    /// `mounted_service_id`, reachable through session `session`.
    pub fn mount_child_dir(&self, name: &str, mounted_service_id: ServiceId, session: u32) -> u32 {
        let child_index = self.insert_child(1, 0, name, NodeKind::Directory);
        self.instances.lock().unwrap().insert(mounted_service_id, Instance::empty());
        let mut instances = self.instances.lock().unwrap();
        let node = instances.get_mut(&1).unwrap().nodes.get_mut(&child_index).unwrap();
        node.mount = Some(MountInfo { mounted_fs_handle: 99, mounted_service_id, session });
        session
    }

    /// Turns service 1's own root into an active mount point.
    pub fn mount_root(&self, mounted_service_id: ServiceId, session: u32) -> u32 {
        self.instances.lock().unwrap().insert(mounted_service_id, Instance::empty());
        let mut instances = self.instances.lock().unwrap();
        let node = instances.get_mut(&1).unwrap().nodes.get_mut(&0).unwrap();
        node.mount = Some(MountInfo { mounted_fs_handle: 99, mounted_service_id, session });
        session
    }

    pub fn mkfile_under(&self, _session: &u32, parent_name: &str, file_name: &str) -> NodeIndex {
        // `parent_name` addresses a directory in service 1 used to locate
        // the mount; the file itself is created in the mounted instance's
        // root for simplicity of this fixture.
        let mounted_service_id = {
            let instances = self.instances.lock().unwrap();
            let root = instances.get(&1).unwrap().nodes.get(&0).unwrap();
            let idx = root.children[parent_name];
            instances.get(&1).unwrap().nodes.get(&idx).unwrap().mount.as_ref().unwrap().mounted_service_id
        };
        self.insert_child(mounted_service_id, 0, file_name, NodeKind::File)
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    type Node = FakeNode;
    type Session = u32;
    type Error = String;

    async fn root_get(&self, service_id: ServiceId) -> Result<Self::Node, Self::Error> {
        let instances = self.instances.lock().unwrap();
        if instances.contains_key(&service_id) {
            self.refs.fetch_add(1, Ordering::SeqCst);
            Ok(FakeNode { service_id, index: 0 })
        } else {
            Err(format!("no such service {service_id}"))
        }
    }

    async fn node_get(&self, service_id: ServiceId, index: NodeIndex) -> Result<Option<Self::Node>, Self::Error> {
        let instances = self.instances.lock().unwrap();
        match instances.get(&service_id).and_then(|i| i.nodes.get(&index)) {
            Some(_) => {
                self.refs.fetch_add(1, Ordering::SeqCst);
                Ok(Some(FakeNode { service_id, index }))
            }
            None => Ok(None),
        }
    }

    async fn node_put(&self, _node: Self::Node) -> Result<(), Self::Error> {
        self.refs.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn node_open(&self, _node: &Self::Node) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn matches(&self, parent: &Self::Node, name: &str) -> Result<Option<Self::Node>, Self::Error> {
        let instances = self.instances.lock().unwrap();
        let data = instances.get(&parent.service_id).and_then(|i| i.nodes.get(&parent.index)).ok_or("missing parent")?;
        match data.children.get(name) {
            Some(&index) => {
                self.refs.fetch_add(1, Ordering::SeqCst);
                Ok(Some(FakeNode { service_id: parent.service_id, index }))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, service_id: ServiceId, kind: NodeKind) -> Result<Option<Self::Node>, Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(&service_id).ok_or("no such service")?;
        let index = instance.next_index;
        instance.next_index += 1;
        instance.nodes.insert(index, NodeData { kind, children: BTreeMap::new(), link_count: 0, size: 0, mount: None, content: Vec::new() });
        self.refs.fetch_add(1, Ordering::SeqCst);
        Ok(Some(FakeNode { service_id, index }))
    }

    async fn destroy(&self, node: Self::Node) -> Result<(), Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        instances.get_mut(&node.service_id).ok_or("no such service")?.nodes.remove(&node.index);
        self.refs.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn link(&self, parent: &Self::Node, child: &Self::Node, name: &str) -> Result<(), Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(&parent.service_id).ok_or("no such service")?;
        instance.nodes.get_mut(&parent.index).ok_or("no such parent")?.children.insert(name.to_owned(), child.index);
        instance.nodes.get_mut(&child.index).ok_or("no such child")?.link_count += 1;
        Ok(())
    }

    async fn unlink(&self, parent: &Self::Node, child: &Self::Node, name: &str) -> Result<(), Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(&parent.service_id).ok_or("no such service")?;
        instance.nodes.get_mut(&parent.index).ok_or("no such parent")?.children.remove(name);
        let child_data = instance.nodes.get_mut(&child.index).ok_or("no such child")?;
        child_data.link_count = child_data.link_count.saturating_sub(1);
        Ok(())
    }

    fn is_file(&self, node: &Self::Node) -> bool {
        let instances = self.instances.lock().unwrap();
        instances.get(&node.service_id).and_then(|i| i.nodes.get(&node.index)).map(|d| d.kind == NodeKind::File).unwrap_or(false)
    }

    fn is_directory(&self, node: &Self::Node) -> bool {
        let instances = self.instances.lock().unwrap();
        instances
            .get(&node.service_id)
            .and_then(|i| i.nodes.get(&node.index))
            .map(|d| d.kind == NodeKind::Directory)
            .unwrap_or(false)
    }

    fn index_get(&self, node: &Self::Node) -> NodeIndex {
        node.index
    }

    fn size_get(&self, node: &Self::Node) -> u64 {
        let instances = self.instances.lock().unwrap();
        instances.get(&node.service_id).and_then(|i| i.nodes.get(&node.index)).map(|d| d.size).unwrap_or(0)
    }

    fn link_count_get(&self, node: &Self::Node) -> u32 {
        let instances = self.instances.lock().unwrap();
        instances.get(&node.service_id).and_then(|i| i.nodes.get(&node.index)).map(|d| d.link_count).unwrap_or(0)
    }

    fn service_get(&self, node: &Self::Node) -> ServiceId {
        node.service_id
    }

    fn mount_point(&self, node: &Self::Node) -> Option<MountInfo<Self::Session>> {
        let instances = self.instances.lock().unwrap();
        instances.get(&node.service_id).and_then(|i| i.nodes.get(&node.index)).and_then(|d| d.mount.clone())
    }

    fn set_mount_point(&self, node: &Self::Node, info: Option<MountInfo<Self::Session>>) {
        let mut instances = self.instances.lock().unwrap();
        if let Some(data) = instances.get_mut(&node.service_id).and_then(|i| i.nodes.get_mut(&node.index)) {
            data.mount = info;
        }
    }
}

#[async_trait]
impl BulkOps for FakeBackend {
    type Node = FakeNode;
    type Error = String;

    async fn mounted(&self, service_id: ServiceId, _opts: Vec<u8>) -> Result<Self::Node, Self::Error> {
        let instances = self.instances.lock().unwrap();
        if instances.contains_key(&service_id) {
            Ok(FakeNode { service_id, index: 0 })
        } else {
            Err(format!("no such service {service_id}"))
        }
    }

    async fn unmounted(&self, _service_id: ServiceId) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn read(&self, service_id: ServiceId, index: NodeIndex, pos: u64) -> Result<u32, Self::Error> {
        let instances = self.instances.lock().unwrap();
        let data = instances.get(&service_id).and_then(|i| i.nodes.get(&index)).ok_or("no such node")?;
        let pos = pos as usize;
        Ok(data.content.len().saturating_sub(pos) as u32)
    }

    async fn write(&self, service_id: ServiceId, index: NodeIndex, pos: u64, bytes: &[u8]) -> Result<(u32, u64), Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        let data = instances.get_mut(&service_id).and_then(|i| i.nodes.get_mut(&index)).ok_or("no such node")?;
        let pos = pos as usize;
        if data.content.len() < pos {
            data.content.resize(pos, 0);
        }
        let end = pos + bytes.len();
        if data.content.len() < end {
            data.content.resize(end, 0);
        }
        data.content[pos..end].copy_from_slice(bytes);
        data.size = data.content.len() as u64;
        Ok((bytes.len() as u32, data.size))
    }

    async fn truncate(&self, service_id: ServiceId, index: NodeIndex, size: u64) -> Result<(), Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        let data = instances.get_mut(&service_id).and_then(|i| i.nodes.get_mut(&index)).ok_or("no such node")?;
        data.content.resize(size as usize, 0);
        data.size = size;
        Ok(())
    }

    async fn close(&self, _service_id: ServiceId, _index: NodeIndex) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn destroy_node(&self, service_id: ServiceId, index: NodeIndex) -> Result<(), Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        instances.get_mut(&service_id).ok_or("no such service")?.nodes.remove(&index);
        Ok(())
    }

    async fn sync(&self, _service_id: ServiceId, _index: NodeIndex) -> Result<(), Self::Error> {
        Ok(())
    }
}
