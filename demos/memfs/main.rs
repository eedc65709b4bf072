//! A small CLI that stands up an in-memory filesystem instance, seeds it
//! with files and directories from the command line, and runs a single
//! `LOOKUP` against it — enough to exercise the dispatch/lookup engine
//! end to end without a real transport or on-disk backend.

mod backend;

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use backend::MemFs;
use fs_glue::lookup::{self, Input, Outcome};
use fs_glue::method::{LookupFlags, Reply};
use fs_glue::node::ServiceId;
use fs_glue::plb::{Plb, PLB_SIZE};

#[derive(Parser, Debug)]
#[command(about = "Look up a path inside a throwaway in-memory filesystem instance")]
struct Cli {
    /// Path to look up, relative to the instance root.
    path: PathBuf,

    /// Extra files to seed under the root before looking up, as `name=content` pairs.
    #[arg(long = "seed-file", value_parser = parse_seed)]
    seed_files: Vec<(String, String)>,

    /// Extra (empty) directories to seed under the root before looking up.
    #[arg(long = "seed-dir")]
    seed_dirs: Vec<String>,
}

fn parse_seed(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=').map(|(name, content)| (name.to_owned(), content.to_owned())).ok_or_else(|| format!("expected name=content, got {raw:?}"))
}

const SERVICE_ID: ServiceId = 1;
const FS_HANDLE: u32 = 1;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let fs = MemFs::new();
    fs.add_instance(SERVICE_ID).await;
    for (name, content) in &cli.seed_files {
        fs.seed_file(SERVICE_ID, name, content.as_bytes()).await;
    }
    for name in &cli.seed_dirs {
        fs.seed_dir(SERVICE_ID, name).await;
    }

    let path = cli.path.to_string_lossy().into_owned();
    let mut plb_bytes = vec![0u8; PLB_SIZE];
    plb_bytes[..path.len()].copy_from_slice(path.as_bytes());
    let plb = Plb::new(plb_bytes.into_boxed_slice());

    let input = Input { first: 0, length: path.len(), service_id: SERVICE_ID, start_index: None, lflag: LookupFlags::default() };

    match lookup::lookup(&fs, &plb, FS_HANDLE, input).await {
        Outcome::Reply(Ok(Reply::Lookup { index, size, link_count, .. })) => {
            info!(%path, index, size, link_count, "lookup succeeded");
            println!("{path}: index={index} size={size} link_count={link_count}");
        }
        Outcome::Reply(Ok(other)) => {
            info!(?other, "lookup returned an unexpected reply kind");
        }
        Outcome::Reply(Err(err)) => {
            eprintln!("{path}: lookup failed: {err}");
            std::process::exit(1);
        }
        Outcome::Forward { .. } => {
            eprintln!("{path}: crosses a mount point; this demo does not forward");
            std::process::exit(1);
        }
    }
}
