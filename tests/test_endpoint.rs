//! End-to-end test of the resolution endpoint: a real Unix socket, the
//! JSON-line protocol, token-based identity, and the audit log.

use changegate::audit::AuditLogger;
use changegate::connector::MemoryConnector;
use changegate::gateway::protocol::ResolutionRequest;
use changegate::gateway::{ResolutionClient, ResolutionServer};
use changegate::hooks::{HookStage, MutationContext, ResourceHooks};
use changegate::identity::StaticTokens;
use changegate::record::FieldMap;
use changegate::replay::ReplayEngine;
use changegate::request::{MutationKind, RequestId, RequestStore};
use changegate::review::ReviewGate;
use changegate::{
    ColumnSchema, Identity, Interception, Interceptor, ResourceSchema, ReviewConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn record(pairs: &[(&str, Value)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

struct Endpoint {
    client: ResolutionClient,
    connector: Arc<MemoryConnector>,
    interceptor: Arc<Interceptor>,
    log_path: std::path::PathBuf,
    _tmp: TempDir,
    server: tokio::task::JoinHandle<()>,
}

async fn start_endpoint() -> Endpoint {
    // exercised once so RUST_LOG works when debugging these tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let tmp = TempDir::new().unwrap();
    let socket_path = tmp.path().join("changegate.sock");
    let log_path = tmp.path().join("people.jsonl");

    let schema = Arc::new(ResourceSchema::new(
        "people",
        vec![ColumnSchema::new("id").primary_key(), ColumnSchema::new("name")],
    ));
    let connector = Arc::new(
        MemoryConnector::new()
            .with_resource("people", "id")
            .with_resource("approval_requests", "id"),
    );
    let config = ReviewConfig::new("approval_requests").allow_user("carol");
    let store = Arc::new(RequestStore::new(connector.clone(), &config));
    let interceptor = Arc::new(
        Interceptor::new(schema.clone(), connector.clone(), store.clone()).unwrap(),
    );

    let mut hooks = ResourceHooks::new();
    for kind in [MutationKind::Create, MutationKind::Edit, MutationKind::Delete] {
        hooks.push_front(kind, HookStage::Before, interceptor.as_hook(kind));
    }

    let engine = Arc::new(
        ReplayEngine::new(
            schema,
            connector.clone(),
            store,
            Arc::new(hooks),
            ReviewGate::from_config(&config),
        )
        .unwrap(),
    );

    let identities = Arc::new(
        StaticTokens::new()
            .with_token("tok-carol", Identity::new("u9", "carol"))
            .with_token("tok-mallory", Identity::new("u3", "mallory")),
    );

    let logger = AuditLogger::with_path(&log_path).unwrap();
    let server = ResolutionServer::new(&socket_path, identities, engine, logger);
    let server = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            panic!("server exited: {e}");
        }
    });

    // wait for the socket to appear
    for _ in 0..50 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    Endpoint {
        client: ResolutionClient::new(&socket_path),
        connector,
        interceptor,
        log_path,
        _tmp: tmp,
        server,
    }
}

async fn capture_create(endpoint: &Endpoint) -> RequestId {
    let ctx = MutationContext::new(Identity::new("u1", "alice"));
    match endpoint
        .interceptor
        .intercept(
            &ctx,
            MutationKind::Create,
            &record(&[("id", json!("p1")), ("name", json!("Bob"))]),
        )
        .await
        .unwrap()
    {
        Interception::Captured { request_id } => request_id,
        Interception::Proceed => panic!("mutation was not captured"),
    }
}

fn resolve_blocking(
    endpoint: &Endpoint,
    token: &str,
    request_id: String,
    approved: bool,
) -> changegate::gateway::protocol::ResolutionResponse {
    let request = ResolutionRequest {
        token: token.to_string(),
        request_id,
        approved,
        verification_code: None,
    };
    endpoint.client.resolve(&request).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_resolution_over_socket() {
    let endpoint = start_endpoint().await;
    let id = capture_create(&endpoint).await;

    // unknown token → 401
    let response = {
        let id = id.to_string();
        let ep = &endpoint;
        tokio::task::block_in_place(|| resolve_blocking(ep, "tok-nobody", id, true))
    };
    assert_eq!(response.status, 401);

    // authenticated but not allow-listed → 403, request untouched
    let response = {
        let id = id.to_string();
        let ep = &endpoint;
        tokio::task::block_in_place(|| resolve_blocking(ep, "tok-mallory", id, true))
    };
    assert_eq!(response.status, 403);
    assert_eq!(endpoint.connector.len("people").await, 0);

    // unknown request id → 404
    let response = {
        let ep = &endpoint;
        let ghost = RequestId::new().to_string();
        tokio::task::block_in_place(|| resolve_blocking(ep, "tok-carol", ghost, true))
    };
    assert_eq!(response.status, 404);

    // a junk id is just an unknown request
    let response = {
        let ep = &endpoint;
        tokio::task::block_in_place(|| {
            resolve_blocking(ep, "tok-carol", "not-a-uuid".to_string(), true)
        })
    };
    assert_eq!(response.status, 404);

    // the allow-listed reviewer approves → 200, mutation applied
    let response = {
        let id = id.to_string();
        let ep = &endpoint;
        tokio::task::block_in_place(|| resolve_blocking(ep, "tok-carol", id, true))
    };
    assert!(response.ok, "approve failed: {:?}", response.error);
    assert_eq!(response.status, 200);
    assert_eq!(endpoint.connector.len("people").await, 1);

    // resolving again → 400 not pending
    let response = {
        let id = id.to_string();
        let ep = &endpoint;
        tokio::task::block_in_place(|| resolve_blocking(ep, "tok-carol", id, false))
    };
    assert_eq!(response.status, 400);

    // every attempt that reached the engine is in the audit log
    let content = std::fs::read_to_string(&endpoint.log_path).unwrap();
    let lines: Vec<&str> = content.trim().lines().collect();
    assert_eq!(lines.len(), 4, "expected one entry per engine attempt");
    let approved_line = lines
        .iter()
        .find(|l| l.contains("\"ok\":true"))
        .expect("approved attempt logged");
    assert!(approved_line.contains("carol"));

    endpoint.server.abort();
}
