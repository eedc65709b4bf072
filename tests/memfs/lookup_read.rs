use fs_glue::backend::BulkOps;
use fs_glue::lookup::{self, Outcome};
use fs_glue::method::Reply;

use crate::common::{Fixture, FS_HANDLE, SERVICE_ID};

#[tokio::test]
async fn lookup_existing_file_reports_its_size() {
    let fixture = Fixture::new().await;
    fixture.write_file("hello.txt", b"hello world").await;

    let (plb, first, length) = Fixture::plb_for("hello.txt");
    let input = Fixture::plain_lookup(SERVICE_ID, None, first, length);

    match lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await {
        Outcome::Reply(Ok(Reply::Lookup { fs_handle, size, link_count, .. })) => {
            assert_eq!(fs_handle, FS_HANDLE);
            assert_eq!(size, 11);
            assert_eq!(link_count, 1);
        }
        other => panic!("expected a successful lookup reply, got {other:?}"),
    }
}

#[tokio::test]
async fn lookup_of_missing_path_is_no_entry() {
    let fixture = Fixture::new().await;

    let (plb, first, length) = Fixture::plb_for("missing.txt");
    let input = Fixture::plain_lookup(SERVICE_ID, None, first, length);

    assert!(matches!(
        lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await,
        Outcome::Reply(Err(fs_glue::error::RpcError::NoEntry))
    ));
}

#[tokio::test]
async fn lookup_walks_into_a_nested_directory() {
    let fixture = Fixture::new().await;
    fixture.create_dir("docs").await;
    fixture.fs.seed_file_under(SERVICE_ID, "docs", "readme.txt", b"contents").await;

    let (plb, first, length) = Fixture::plb_for("docs/readme.txt");
    let input = Fixture::plain_lookup(SERVICE_ID, None, first, length);
    match lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await {
        Outcome::Reply(Ok(Reply::Lookup { size, .. })) => assert_eq!(size, 8),
        other => panic!("expected docs/readme.txt to resolve, got {other:?}"),
    }
}

#[tokio::test]
async fn read_returns_the_byte_count_available_past_pos() {
    let fixture = Fixture::new().await;
    fixture.write_file("notes.txt", b"abcdefghijklmnopqrstuvwxyz").await;

    let (plb, first, length) = Fixture::plb_for("notes.txt");
    let input = Fixture::plain_lookup(SERVICE_ID, None, first, length);
    let index = match lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await {
        Outcome::Reply(Ok(Reply::Lookup { index, .. })) => index as u32,
        other => panic!("expected lookup to succeed, got {other:?}"),
    };

    let bytes = fixture.fs.read(SERVICE_ID, index, 2).await.expect("read succeeds");
    assert_eq!(bytes, 24);
}

#[tokio::test]
async fn read_past_end_is_empty() {
    let fixture = Fixture::new().await;
    fixture.write_file("short.txt", b"abc").await;

    let (plb, first, length) = Fixture::plb_for("short.txt");
    let input = Fixture::plain_lookup(SERVICE_ID, None, first, length);
    let index = match lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await {
        Outcome::Reply(Ok(Reply::Lookup { index, .. })) => index as u32,
        other => panic!("expected lookup to succeed, got {other:?}"),
    };

    let bytes = fixture.fs.read(SERVICE_ID, index, 100).await.expect("read past eof");
    assert_eq!(bytes, 0);
}
