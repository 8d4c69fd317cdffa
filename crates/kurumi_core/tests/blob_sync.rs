//! Blob backend and orchestrator against a mock blob server.

use std::sync::Arc;
use std::time::Duration;

use kurumi_core::KurumiError;
use kurumi_core::crdt::MemoryStorage;
use kurumi_core::merge::MergeOutcome;
use kurumi_core::store::DocumentStore;
use kurumi_core::sync::{
    BlobClient, SkipReason, SyncBackend, SyncOrchestrator, SyncOutcome, SyncPhase, SyncTrigger,
};
use tokio::sync::Mutex;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "blob-token";

fn store() -> DocumentStore {
    DocumentStore::open(Arc::new(MemoryStorage::new())).unwrap()
}

fn client(server: &MockServer) -> BlobClient {
    BlobClient::new(format!("{}/sync", server.uri()), TOKEN).unwrap()
}

fn orchestrator(server: &MockServer, store: DocumentStore, min_interval: Duration) -> (SyncOrchestrator, Arc<Mutex<DocumentStore>>) {
    let shared = Arc::new(Mutex::new(store));
    let orchestrator = SyncOrchestrator::new(SyncBackend::Blob(client(server)), shared.clone(), min_interval);
    (orchestrator, shared)
}

async fn mount_put(server: &MockServer) {
    Mock::given(method("PUT"))
        .and(path("/sync"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pull_missing_state_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sync"))
        .and(header("authorization", "Bearer blob-token"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client(&server).pull().await.unwrap(), None);
}

#[tokio::test]
async fn test_pull_server_error_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sync"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    match client(&server).pull().await {
        Err(KurumiError::Http { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("unexpected pull result {:?}", other),
    }
}

#[tokio::test]
async fn test_push_sends_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/sync"))
        .and(header("authorization", "Bearer blob-token"))
        .and(header("content-type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).push(vec![1, 2, 3, 4]).await.unwrap();
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_connection_status_mapping() {
    for (status, expect_ok) in [(200, true), (404, true), (401, false), (403, false), (500, false)] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let result = client(&server).test_connection().await;
        assert_eq!(result.is_ok(), expect_ok, "status {}", status);
        match status {
            401 | 403 => assert!(matches!(result, Err(KurumiError::Auth(_)))),
            500 => assert!(matches!(result, Err(KurumiError::Http { status: 500, .. }))),
            _ => {}
        }
    }

    let unreachable = BlobClient::new("http://127.0.0.1:1/sync", TOKEN).unwrap();
    assert!(matches!(
        unreachable.test_connection().await,
        Err(KurumiError::Network(_))
    ));
}

#[tokio::test]
async fn test_cycle_merges_remote_then_pushes_union() {
    let mut other = store();
    other.add_note("From phone", "remote", None).unwrap();
    let remote_state = other.save_binary();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(remote_state))
        .mount(&server)
        .await;
    mount_put(&server).await;

    let mut local = store();
    local.add_note("From laptop", "local", None).unwrap();
    let (orchestrator, shared) = orchestrator(&server, local, Duration::from_secs(30));

    let outcome = orchestrator.request_sync(SyncTrigger::Manual).await;
    let SyncOutcome::Completed(report) = outcome else {
        panic!("unexpected outcome {:?}", outcome);
    };
    assert!(matches!(report.merge, Some(MergeOutcome::Merged { notes: 2, .. })));
    assert_eq!(shared.lock().await.notes().len(), 2);

    // The pushed state carries both notes.
    let pushed = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.method.as_str() == "PUT")
        .expect("state pushed");
    let mut fresh = store();
    fresh.merge_remote(&pushed.body);
    assert_eq!(fresh.snapshot().notes.len(), 2);

    let status = orchestrator.status();
    assert_eq!(status.phase, SyncPhase::Success);
    assert!(status.last_synced_at.is_some());
}

#[tokio::test]
async fn test_first_push_when_server_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut local = store();
    local.add_note("Only here", "", None).unwrap();
    let (orchestrator, _) = orchestrator(&server, local, Duration::ZERO);

    let SyncOutcome::Completed(report) = orchestrator.request_sync(SyncTrigger::Manual).await else {
        panic!("expected completion");
    };
    assert_eq!(report.merge, None);
}

#[tokio::test]
async fn test_failed_pull_leaves_store_and_skips_push() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut local = store();
    local.add_note("Untouched", "", None).unwrap();
    let before = local.snapshot();
    let (orchestrator, shared) = orchestrator(&server, local, Duration::ZERO);

    let outcome = orchestrator.request_sync(SyncTrigger::Manual).await;
    assert!(matches!(outcome, SyncOutcome::Failed(ref m) if m.contains("Authentication failed")));
    assert!(Arc::ptr_eq(&before, &shared.lock().await.snapshot()));
    assert_eq!(orchestrator.status().phase, SyncPhase::Error);
}

#[tokio::test]
async fn test_automatic_sync_is_debounced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_put(&server).await;

    let (orchestrator, _) = orchestrator(&server, store(), Duration::from_secs(3600));

    assert!(matches!(
        orchestrator.request_sync(SyncTrigger::Automatic).await,
        SyncOutcome::Completed(_)
    ));
    assert!(matches!(
        orchestrator.request_sync(SyncTrigger::Automatic).await,
        SyncOutcome::Skipped(SkipReason::Debounced { .. })
    ));
    assert!(matches!(
        orchestrator.request_sync(SyncTrigger::Manual).await,
        SyncOutcome::Completed(_)
    ));
}

#[tokio::test]
async fn test_overlapping_request_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;
    mount_put(&server).await;

    let (orchestrator, _) = orchestrator(&server, store(), Duration::ZERO);

    let (first, second) = tokio::join!(
        orchestrator.request_sync(SyncTrigger::Manual),
        orchestrator.request_sync(SyncTrigger::Manual)
    );
    assert!(matches!(first, SyncOutcome::Completed(_)), "{:?}", first);
    assert_eq!(second, SyncOutcome::Skipped(SkipReason::InFlight));
    assert!(!orchestrator.is_syncing());

    assert!(matches!(
        orchestrator.request_sync(SyncTrigger::Manual).await,
        SyncOutcome::Completed(_)
    ));
}
