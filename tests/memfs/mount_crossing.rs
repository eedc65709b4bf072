use fs_glue::lookup::{self, Input, Outcome};
use fs_glue::method::Method;

use crate::common::{Fixture, FS_HANDLE, SERVICE_ID};

const MOUNTED_SERVICE_ID: u32 = 2;
const MOUNTED_FS_HANDLE: u32 = 9;
const SESSION: u32 = 77;

#[tokio::test]
async fn mid_walk_mount_point_forwards_the_unconsumed_suffix() {
    let fixture = Fixture::new().await;
    fixture.create_dir("mnt").await;
    fixture.fs.add_instance(MOUNTED_SERVICE_ID).await;
    fixture.fs.mount_dir(SERVICE_ID, "mnt", MOUNTED_FS_HANDLE, MOUNTED_SERVICE_ID, SESSION).await;

    let (plb, first, length) = Fixture::plb_for("mnt/deep/path");
    let input = Input { first, length, service_id: SERVICE_ID, start_index: None, lflag: Default::default() };

    match lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await {
        Outcome::Forward { method: Method::Lookup, request, session } => {
            let decoded = Input::from_args(request.args);
            // The unconsumed suffix retains its leading slash: `next`
            // stops right after "mnt", at the '/' before "deep/path".
            assert_eq!(decoded.first, first + "mnt".len());
            assert_eq!(decoded.length, "/deep/path".len());
            assert_eq!(decoded.service_id, MOUNTED_SERVICE_ID);
            assert!(decoded.start_index.is_none());
            assert_eq!(session, SESSION);
        }
        other => panic!("expected a forward across the mount point, got {other:?}"),
    }
}

#[tokio::test]
async fn lookup_of_a_plain_sibling_does_not_cross_the_mount() {
    let fixture = Fixture::new().await;
    fixture.write_file("plain.txt", b"data").await;
    fixture.create_dir("mnt").await;
    fixture.fs.add_instance(MOUNTED_SERVICE_ID).await;
    fixture.fs.mount_dir(SERVICE_ID, "mnt", MOUNTED_FS_HANDLE, MOUNTED_SERVICE_ID, SESSION).await;

    let (plb, first, length) = Fixture::plb_for("plain.txt");
    let input = Input { first, length, service_id: SERVICE_ID, start_index: None, lflag: Default::default() };

    match lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await {
        Outcome::Reply(Ok(fs_glue::method::Reply::Lookup { size, .. })) => assert_eq!(size, 4),
        other => panic!("expected the plain sibling to resolve locally, got {other:?}"),
    }
}
