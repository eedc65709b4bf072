#[path = "../../demos/memfs/backend.rs"]
pub mod backend;

use backend::MemFs;
use fs_glue::method::LookupFlags;
use fs_glue::node::{NodeIndex, ServiceId};
use fs_glue::plb::{Plb, PLB_SIZE};

pub const SERVICE_ID: ServiceId = 1;
pub const FS_HANDLE: u32 = 7;

pub struct Fixture {
    pub fs: MemFs,
}

impl Fixture {
    pub async fn new() -> Self {
        let fs = MemFs::new();
        fs.add_instance(SERVICE_ID).await;
        Self { fs }
    }

    pub async fn write_file(&self, name: &str, content: &[u8]) {
        self.fs.seed_file(SERVICE_ID, name, content).await;
    }

    pub async fn create_dir(&self, name: &str) {
        self.fs.seed_dir(SERVICE_ID, name).await;
    }

    /// Builds a one-shot PLB wrapping `path` and the `(first, length)`
    /// pair spanning it, mirroring how a real transport would fill the
    /// shared buffer before issuing the call.
    pub fn plb_for(path: &str) -> (Plb, usize, usize) {
        let mut bytes = vec![0u8; PLB_SIZE];
        bytes[..path.len()].copy_from_slice(path.as_bytes());
        (Plb::new(bytes.into_boxed_slice()), 0, path.len())
    }

    pub fn plain_lookup(service_id: ServiceId, start_index: Option<NodeIndex>, first: usize, length: usize) -> fs_glue::lookup::Input {
        fs_glue::lookup::Input { first, length, service_id, start_index, lflag: LookupFlags::default() }
    }
}
