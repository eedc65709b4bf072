use fs_glue::error::RpcError;
use fs_glue::lookup::{self, Input, Outcome};
use fs_glue::method::{LookupFlags, Reply};

use crate::common::{Fixture, FS_HANDLE, SERVICE_ID};

#[tokio::test]
async fn create_allocates_and_links_a_new_file() {
    let fixture = Fixture::new().await;

    let (plb, first, length) = Fixture::plb_for("new.txt");
    let input = Input { first, length, service_id: SERVICE_ID, start_index: None, lflag: LookupFlags::CREATE };

    match lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await {
        Outcome::Reply(Ok(Reply::Lookup { link_count, .. })) => assert_eq!(link_count, 1),
        other => panic!("expected create to succeed, got {other:?}"),
    }

    // A second lookup of the same name now finds the freshly linked node.
    let (plb, first, length) = Fixture::plb_for("new.txt");
    let input = Input { first, length, service_id: SERVICE_ID, start_index: None, lflag: LookupFlags::default() };
    assert!(matches!(lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await, Outcome::Reply(Ok(Reply::Lookup { .. }))));
}

#[tokio::test]
async fn create_exclusive_on_an_existing_target_fails() {
    let fixture = Fixture::new().await;
    fixture.write_file("existing.txt", b"x").await;

    let (plb, first, length) = Fixture::plb_for("existing.txt");
    let input = Input { first, length, service_id: SERVICE_ID, start_index: None, lflag: LookupFlags::CREATE | LookupFlags::EXCLUSIVE };

    assert!(matches!(lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await, Outcome::Reply(Err(RpcError::AlreadyExists))));
}

#[tokio::test]
async fn unlink_removes_the_entry_and_reports_its_prior_link_count() {
    let fixture = Fixture::new().await;
    fixture.write_file("doomed.txt", b"bye").await;

    let (plb, first, length) = Fixture::plb_for("doomed.txt");
    let input = Input { first, length, service_id: SERVICE_ID, start_index: None, lflag: LookupFlags::UNLINK };

    match lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await {
        Outcome::Reply(Ok(Reply::Lookup { link_count, .. })) => assert_eq!(link_count, 1),
        other => panic!("expected unlink to succeed, got {other:?}"),
    }

    let (plb, first, length) = Fixture::plb_for("doomed.txt");
    let input = Input { first, length, service_id: SERVICE_ID, start_index: None, lflag: LookupFlags::default() };
    assert!(matches!(lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await, Outcome::Reply(Err(RpcError::NoEntry))));
}

#[tokio::test]
async fn unlink_and_create_together_is_rejected_up_front() {
    let fixture = Fixture::new().await;

    let (plb, first, length) = Fixture::plb_for("anything");
    let input = Input { first, length, service_id: SERVICE_ID, start_index: None, lflag: LookupFlags::UNLINK | LookupFlags::CREATE };

    assert!(matches!(lookup::lookup(&fixture.fs, &plb, FS_HANDLE, input).await, Outcome::Reply(Err(RpcError::InvalidArgument))));
}
