//! A tiny in-memory [`Backend`]/[`BulkOps`] implementation used to drive
//! the dispatch/lookup engine end to end without a real block device or
//! IPC transport.
//!
//! Each [`MemFs`] instance owns any number of independent "service"
//! filesystems (keyed by [`ServiceId`]) so a demo or test can exercise
//! mount-point forwarding across two instances of the same backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use fs_glue::backend::{Backend, BulkOps, MountInfo};
use fs_glue::node::{NodeIndex, NodeKind, ServiceId};

/// Handle into [`MemFs`]'s own storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemNode {
    pub service_id: ServiceId,
    pub index: NodeIndex,
}

#[derive(Clone)]
struct Entry {
    kind: NodeKind,
    children: BTreeMap<String, NodeIndex>,
    link_count: u32,
    content: Vec<u8>,
    mount: Option<MountInfo<u32>>,
}

impl Entry {
    fn new_root() -> Self {
        Entry { kind: NodeKind::Directory, children: BTreeMap::new(), link_count: 1, content: Vec::new(), mount: None }
    }
}

struct Instance {
    nodes: HashMap<NodeIndex, Entry>,
    next_index: NodeIndex,
}

impl Instance {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(0, Entry::new_root());
        Self { nodes, next_index: 1 }
    }
}

/// An in-memory, multi-instance backend suitable for driving the dispatch
/// and lookup engine in a demo binary or an integration test.
pub struct MemFs {
    instances: Mutex<HashMap<ServiceId, Instance>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self { instances: Mutex::new(HashMap::new()) }
    }

    /// Registers a fresh, empty instance under `service_id`.
    pub async fn add_instance(&self, service_id: ServiceId) {
        self.instances.lock().unwrap().insert(service_id, Instance::new());
    }

    /// Creates a file under `service_id`'s root with the given contents.
    pub async fn seed_file(&self, service_id: ServiceId, name: &str, content: &[u8]) {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(&service_id).expect("instance must exist");
        let index = instance.next_index;
        instance.next_index += 1;
        instance.nodes.insert(
            index,
            Entry { kind: NodeKind::File, children: BTreeMap::new(), link_count: 1, content: content.to_vec(), mount: None },
        );
        instance.nodes.get_mut(&0).unwrap().children.insert(name.to_owned(), index);
    }

    /// Creates a plain (not mounted) directory under `service_id`'s root.
    pub async fn seed_dir(&self, service_id: ServiceId, name: &str) {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(&service_id).expect("instance must exist");
        let index = instance.next_index;
        instance.next_index += 1;
        instance.nodes.insert(index, Entry::new_root());
        instance.nodes.get_mut(&0).unwrap().children.insert(name.to_owned(), index);
    }

    /// Creates a file named `name` under the root's existing child
    /// directory `parent`, for exercising multi-component lookups.
    pub async fn seed_file_under(&self, service_id: ServiceId, parent: &str, name: &str, content: &[u8]) {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(&service_id).expect("instance must exist");
        let parent_index = instance.nodes.get(&0).unwrap().children[parent];
        let index = instance.next_index;
        instance.next_index += 1;
        instance.nodes.insert(
            index,
            Entry { kind: NodeKind::File, children: BTreeMap::new(), link_count: 1, content: content.to_vec(), mount: None },
        );
        instance.nodes.get_mut(&parent_index).unwrap().children.insert(name.to_owned(), index);
    }

    /// Turns directory `name` under `parent_service_id`'s root into an
    /// active mount point addressing `mounted_service_id`.
    pub async fn mount_dir(&self, parent_service_id: ServiceId, name: &str, mounted_fs_handle: u32, mounted_service_id: ServiceId, session: u32) {
        let mut instances = self.instances.lock().unwrap();
        let index = instances.get(&parent_service_id).unwrap().nodes.get(&0).unwrap().children[name];
        let entry = instances.get_mut(&parent_service_id).unwrap().nodes.get_mut(&index).unwrap();
        entry.mount = Some(MountInfo { mounted_fs_handle, mounted_service_id, session });
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemFs {
    type Node = MemNode;
    type Session = u32;
    type Error = String;

    async fn root_get(&self, service_id: ServiceId) -> Result<Self::Node, Self::Error> {
        let instances = self.instances.lock().unwrap();
        if instances.contains_key(&service_id) {
            Ok(MemNode { service_id, index: 0 })
        } else {
            Err(format!("no such service {service_id}"))
        }
    }

    async fn node_get(&self, service_id: ServiceId, index: NodeIndex) -> Result<Option<Self::Node>, Self::Error> {
        let instances = self.instances.lock().unwrap();
        Ok(instances.get(&service_id).and_then(|i| i.nodes.get(&index)).map(|_| MemNode { service_id, index }))
    }

    async fn node_put(&self, _node: Self::Node) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn node_open(&self, _node: &Self::Node) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn matches(&self, parent: &Self::Node, name: &str) -> Result<Option<Self::Node>, Self::Error> {
        let instances = self.instances.lock().unwrap();
        let data = instances.get(&parent.service_id).and_then(|i| i.nodes.get(&parent.index)).ok_or("missing parent")?;
        Ok(data.children.get(name).map(|&index| MemNode { service_id: parent.service_id, index }))
    }

    async fn create(&self, service_id: ServiceId, kind: NodeKind) -> Result<Option<Self::Node>, Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(&service_id).ok_or("no such service")?;
        let index = instance.next_index;
        instance.next_index += 1;
        instance.nodes.insert(index, Entry { kind, children: BTreeMap::new(), link_count: 0, content: Vec::new(), mount: None });
        Ok(Some(MemNode { service_id, index }))
    }

    async fn destroy(&self, node: Self::Node) -> Result<(), Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        instances.get_mut(&node.service_id).ok_or("no such service")?.nodes.remove(&node.index);
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
        let child = instance.nodes.get_mut(&child.index).ok_or("no such child")?;
        child.link_count = child.link_count.saturating_sub(1);
        Ok(())
    }

    fn is_file(&self, node: &Self::Node) -> bool {
        self.instances.lock().unwrap().get(&node.service_id).and_then(|i| i.nodes.get(&node.index)).map(|e| e.kind == NodeKind::File).unwrap_or(false)
    }

    fn is_directory(&self, node: &Self::Node) -> bool {
        self.instances
            .lock()
            .unwrap()
            .get(&node.service_id)
            .and_then(|i| i.nodes.get(&node.index))
            .map(|e| e.kind == NodeKind::Directory)
            .unwrap_or(false)
    }

    fn index_get(&self, node: &Self::Node) -> NodeIndex {
        node.index
    }

    fn size_get(&self, node: &Self::Node) -> u64 {
        self.instances.lock().unwrap().get(&node.service_id).and_then(|i| i.nodes.get(&node.index)).map(|e| e.content.len() as u64).unwrap_or(0)
    }

    fn link_count_get(&self, node: &Self::Node) -> u32 {
        self.instances.lock().unwrap().get(&node.service_id).and_then(|i| i.nodes.get(&node.index)).map(|e| e.link_count).unwrap_or(0)
    }

    fn service_get(&self, node: &Self::Node) -> ServiceId {
        node.service_id
    }

    fn mount_point(&self, node: &Self::Node) -> Option<MountInfo<Self::Session>> {
        self.instances.lock().unwrap().get(&node.service_id).and_then(|i| i.nodes.get(&node.index)).and_then(|e| e.mount.clone())
    }

    fn set_mount_point(&self, node: &Self::Node, info: Option<MountInfo<Self::Session>>) {
        if let Some(entry) = self.instances.lock().unwrap().get_mut(&node.service_id).and_then(|i| i.nodes.get_mut(&node.index)) {
            entry.mount = info;
        }
    }
}

#[async_trait]
impl BulkOps for MemFs {
    type Node = MemNode;
    type Error = String;

    async fn mounted(&self, service_id: ServiceId, _opts: Vec<u8>) -> Result<Self::Node, Self::Error> {
        let instances = self.instances.lock().unwrap();
        if instances.contains_key(&service_id) {
            Ok(MemNode { service_id, index: 0 })
        } else {
            Err(format!("no such service {service_id}"))
        }
    }

    async fn unmounted(&self, _service_id: ServiceId) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn read(&self, service_id: ServiceId, index: NodeIndex, pos: u64) -> Result<u32, Self::Error> {
        let instances = self.instances.lock().unwrap();
        let entry = instances.get(&service_id).and_then(|i| i.nodes.get(&index)).ok_or("no such node")?;
        Ok(entry.content.len().saturating_sub(pos as usize) as u32)
    }

    async fn write(&self, service_id: ServiceId, index: NodeIndex, pos: u64, data: &[u8]) -> Result<(u32, u64), Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        let entry = instances.get_mut(&service_id).and_then(|i| i.nodes.get_mut(&index)).ok_or("no such node")?;
        let pos = pos as usize;
        if entry.content.len() < pos {
            entry.content.resize(pos, 0);
        }
        let end = pos + data.len();
        if entry.content.len() < end {
            entry.content.resize(end, 0);
        }
        entry.content[pos..end].copy_from_slice(data);
        Ok((data.len() as u32, entry.content.len() as u64))
    }

    async fn truncate(&self, service_id: ServiceId, index: NodeIndex, size: u64) -> Result<(), Self::Error> {
        let mut instances = self.instances.lock().unwrap();
        let entry = instances.get_mut(&service_id).and_then(|i| i.nodes.get_mut(&index)).ok_or("no such node")?;
        entry.content.resize(size as usize, 0);
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
