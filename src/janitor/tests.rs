//! Unit tests for the janitor module.

use std::collections::BTreeMap;

use rstest::rstest;

use super::*;
use crate::hetzner::{ApiError, ServerStatus};
use crate::test_support::{ApiCall, FakeCloudApi, managed_server, not_found};

fn janitor(api: &FakeCloudApi) -> Janitor<FakeCloudApi> {
    Janitor::new(HetznerClient::with_api(api.clone()))
}

fn rendered(buf: Vec<u8>) -> String {
    String::from_utf8(buf).expect("utf8 output")
}

#[tokio::test]
async fn status_prints_aligned_table_and_count() {
    let mut rescued = managed_server(12, "blackbsd-builder-abc");
    rescued.rescue_enabled = true;
    let mut offline = managed_server(3, "b");
    offline.status = ServerStatus::Off;
    offline.public_ipv4 = None;
    let api = FakeCloudApi::with_servers(vec![rescued, offline]);

    let mut out = Vec::new();
    let found = janitor(&api)
        .print_status(&mut out)
        .await
        .expect("status should succeed");

    assert_eq!(found, 2);
    assert_eq!(
        rendered(out),
        concat!(
            "ID   NAME                   STATUS    IPv4         RESCUE\n",
            "12   blackbsd-builder-abc   running   192.0.2.12   yes\n",
            "3    b                      off                    no\n",
            "\n",
            "Found 2 BlackBSD server(s).\n",
        )
    );
}

#[tokio::test]
async fn status_with_no_servers_writes_nothing() {
    let api = FakeCloudApi::new();
    let mut out = Vec::new();

    let found = janitor(&api)
        .print_status(&mut out)
        .await
        .expect("status should succeed");

    assert_eq!(found, 0);
    assert!(out.is_empty());
}

#[tokio::test]
async fn status_ignores_unlabelled_servers() {
    let mut foreign = managed_server(9, "someone-else");
    foreign.labels = BTreeMap::new();
    let api = FakeCloudApi::with_servers(vec![foreign, managed_server(1, "mine")]);
    let mut out = Vec::new();

    let found = janitor(&api)
        .print_status(&mut out)
        .await
        .expect("status should succeed");

    assert_eq!(found, 1);
    assert!(!rendered(out).contains("someone-else"));
}

#[tokio::test]
async fn destroy_reports_each_outcome_and_continues() {
    let api = FakeCloudApi::with_servers(vec![
        managed_server(1, "first"),
        managed_server(2, "second"),
        managed_server(3, "third"),
    ]);
    api.fail_delete(2, ApiError::response(403, "forbidden", "insufficient permissions"));
    api.fail_delete(3, not_found());

    let mut out = Vec::new();
    let summary = janitor(&api)
        .destroy_all(&mut out)
        .await
        .expect("destroy should succeed");

    assert_eq!(
        summary,
        DestroySummary {
            destroyed: 1,
            skipped: 1,
            failed: 1,
        }
    );
    assert!(!summary.is_clean());
    let text = rendered(out);
    assert!(text.starts_with("Destroying 3 BlackBSD server(s)...\n"));
    assert!(text.contains("  first (1)... destroyed\n"));
    assert!(text.contains("  second (2)... error: delete server 2: request rejected:"));
    assert!(text.contains("  third (3)... not found (skipped)\n"));
    assert!(text.ends_with("\nDone.\n"));

    let deletes: Vec<u64> = api
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ApiCall::DeleteServer(id) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(deletes, vec![1, 2, 3]);
}

#[rstest]
#[case(0, 0, 0, true)]
#[case(2, 1, 0, true)]
#[case(0, 0, 1, false)]
fn summary_is_clean_only_without_failures(
    #[case] destroyed: usize,
    #[case] skipped: usize,
    #[case] failed: usize,
    #[case] expected: bool,
) {
    let summary = DestroySummary {
        destroyed,
        skipped,
        failed,
    };
    assert_eq!(summary.is_clean(), expected);
}

#[tokio::test]
async fn destroy_with_no_servers_writes_nothing() {
    let api = FakeCloudApi::new();
    let mut out = Vec::new();

    let summary = janitor(&api)
        .destroy_all(&mut out)
        .await
        .expect("destroy should succeed");

    assert_eq!(summary, DestroySummary::default());
    assert!(out.is_empty());
    assert!(
        !api.calls()
            .iter()
            .any(|call| matches!(call, ApiCall::DeleteServer(_)))
    );
}
