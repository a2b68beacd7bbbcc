//! End-to-end tests for guarded sessions
//!
//! These tests run the whole client against a mock backend: sign-in, loading
//! the workspace, the idle guard and the purge notification. The guard runs
//! on the real clock with short offsets so HTTP timeouts are not disturbed.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sitedesk_cli::SitedeskConfig;
use sitedesk_client::{BackendClient, TaskQuery};
use sitedesk_core::{ClientWorkspace, Credentials, IdentityStore, PurgeNotifier, TaskFilter};
use sitedesk_guard::{
    ActivitySignal, ActivitySource, GuardConfig, GuardEvent, PurgeExecutor, PurgeReason,
    SessionGuard, SessionState,
};
use tempfile::TempDir;
use tokio::sync::RwLock;
use tokio::time::timeout;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PATIENCE: Duration = Duration::from_secs(5);

fn fast_guard() -> GuardConfig {
    GuardConfig {
        warn_offset: Duration::from_millis(200),
        purge_offset: Duration::from_millis(400),
        tick: Duration::from_millis(50),
    }
}

async fn backend(purge_status: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": "u-42",
            "email": "site@example.com",
            "name": "Site Lead",
            "token": "tok-42"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": uuid::Uuid::new_v4(), "name": "Level 3 fit-out", "trade": "Drywall"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .and(header("authorization", "Bearer tok-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": uuid::Uuid::new_v4(),
            "title": "Board north wall",
            "description": "12 sheets",
            "status": "in_progress",
            "priority": "high",
            "category": "Work",
            "trade": "Drywall",
            "created_at": "2024-05-01T08:00:00",
            "updated_at": "2024-05-01T08:00:00"
        }])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/session/purge"))
        .and(header("authorization", "Bearer tok-42"))
        .and(body_json(json!({"user_id": "u-42"})))
        .respond_with(ResponseTemplate::new(purge_status))
        .mount(&server)
        .await;

    server
}

/// Config file pointing at the mock backend, as a user would write it
fn write_config(dir: &TempDir, server: &MockServer) -> SitedeskConfig {
    let config = SitedeskConfig {
        backend_url: server.uri(),
        request_timeout_secs: 5,
        identity_path: Some(dir.path().join("identity.json")),
        guard: fast_guard(),
    };
    let path = dir.path().join("config.json");
    config.save(&path).unwrap();
    SitedeskConfig::load(&path).unwrap()
}

struct Running {
    guard: SessionGuard,
    source: ActivitySource,
    executor: PurgeExecutor,
    workspace: Arc<RwLock<ClientWorkspace>>,
    store: IdentityStore,
}

/// Sign in, load the workspace and start guarding
async fn sign_in_and_guard(config: &SitedeskConfig) -> Running {
    let store = config.identity_store().unwrap();
    let identity = config
        .backend()
        .unwrap()
        .sign_in(&Credentials::new("site@example.com", "pw"))
        .await
        .unwrap();
    store.save(&identity).unwrap();

    let backend = config.backend().unwrap().authenticated(&identity);
    let mut workspace = ClientWorkspace::for_identity(identity.clone());
    workspace.set_projects(backend.list_projects().await.unwrap());
    workspace.set_tasks(backend.list_tasks(&TaskQuery::new()).await.unwrap());
    let workspace = Arc::new(RwLock::new(workspace));

    let notifier: Arc<dyn PurgeNotifier> = Arc::new(backend);
    let executor =
        PurgeExecutor::new(Arc::clone(&workspace), notifier).with_identity_store(store.clone());
    let source = ActivitySource::new();
    let guard =
        SessionGuard::spawn(identity, config.guard, source.subscribe(), executor.clone()).unwrap();

    Running {
        guard,
        source,
        executor,
        workspace,
        store,
    }
}

async fn purge_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/api/session/purge")
        .count()
}

// ============================================================================
// Idle timeout
// ============================================================================

#[tokio::test]
async fn test_idle_session_is_purged_end_to_end() {
    let dir = TempDir::new().unwrap();
    let server = backend(204).await;
    let config = write_config(&dir, &server);

    let running = sign_in_and_guard(&config).await;
    {
        let ws = running.workspace.read().await;
        assert_eq!(ws.projects().len(), 1);
        assert_eq!(ws.tasks().len(), 1);
        let filter = TaskFilter {
            query: "north".to_string(),
            ..Default::default()
        };
        assert_eq!(ws.filter_tasks(&filter).len(), 1);
    }
    assert!(running.store.load().unwrap().is_some());
    let mut events = running.guard.subscribe();

    let reason = timeout(PATIENCE, running.guard.purged()).await.unwrap();
    assert_eq!(reason, Some(PurgeReason::IdleTimeout));
    assert_eq!(running.guard.state(), SessionState::Purged);

    // Local state is gone before anyone observes the purge
    assert!(running.workspace.read().await.is_empty());
    assert!(running.store.load().unwrap().is_none());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(GuardEvent::Warned { .. })));
    assert_eq!(
        seen.last(),
        Some(&GuardEvent::Purged {
            reason: PurgeReason::IdleTimeout
        })
    );
    assert_eq!(
        seen.iter()
            .filter(|e| matches!(e, GuardEvent::Warned { .. }))
            .count(),
        1
    );

    assert!(running.executor.settle(PATIENCE).await);
    assert_eq!(purge_requests(&server).await, 1);

    let notice = running.guard.join().await.unwrap();
    assert_eq!(notice.reason, PurgeReason::IdleTimeout);
}

#[tokio::test]
async fn test_backend_outage_does_not_block_purge() {
    let dir = TempDir::new().unwrap();
    let server = backend(500).await;
    let config = write_config(&dir, &server);

    let running = sign_in_and_guard(&config).await;
    let reason = timeout(PATIENCE, running.guard.purged()).await.unwrap();
    assert_eq!(reason, Some(PurgeReason::IdleTimeout));
    assert!(running.workspace.read().await.is_empty());
    assert!(running.store.load().unwrap().is_none());

    // The failed notification is attempted once and only logged
    assert!(running.executor.settle(PATIENCE).await);
    assert_eq!(purge_requests(&server).await, 1);
}

// ============================================================================
// User response
// ============================================================================

#[tokio::test]
async fn test_keep_active_then_sign_out() {
    let dir = TempDir::new().unwrap();
    let server = backend(204).await;
    let mut config = write_config(&dir, &server);
    config.guard = GuardConfig {
        warn_offset: Duration::from_millis(150),
        purge_offset: Duration::from_millis(2_000),
        tick: Duration::from_millis(100),
    };

    let running = sign_in_and_guard(&config).await;
    let mut watch = running.guard.watch();

    timeout(PATIENCE, watch.wait_for(|s| s.state == SessionState::Warned))
        .await
        .unwrap()
        .unwrap();

    // Plain activity does not dismiss the warning
    running.source.emit(ActivitySignal::Keyboard);
    assert!(running.guard.keep_active());
    timeout(PATIENCE, watch.wait_for(|s| s.state == SessionState::Active))
        .await
        .unwrap()
        .unwrap();
    assert!(!running.workspace.read().await.is_empty());
    assert_eq!(purge_requests(&server).await, 0);

    assert!(running.guard.purge_now());
    let reason = timeout(PATIENCE, running.guard.purged()).await.unwrap();
    assert_eq!(reason, Some(PurgeReason::SignOut));
    assert!(running.workspace.read().await.is_empty());
    assert!(running.store.load().unwrap().is_none());

    assert!(running.executor.settle(PATIENCE).await);
    assert_eq!(purge_requests(&server).await, 1);
}

#[tokio::test]
async fn test_closing_session_keeps_identity() {
    let dir = TempDir::new().unwrap();
    let server = backend(204).await;
    let mut config = write_config(&dir, &server);
    config.guard = GuardConfig::default();

    let running = sign_in_and_guard(&config).await;
    running.source.emit(ActivitySignal::Pointer);

    assert!(running.guard.shutdown().await.is_none());
    assert!(running.store.load().unwrap().is_some());
    assert!(!running.workspace.read().await.is_empty());
    assert_eq!(purge_requests(&server).await, 0);
}
