//! Gateway behaviour against mock upstreams: request shaping, retries,
//! timeouts and circuit breaking.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use integration_gateway::{AppState, GatewayServer, Shutdown};

mod common;
use common::{
    build_app, get, post_json, send, start_fixed_upstream, start_mock_upstream, test_config, ADMIN_KEY,
};

#[tokio::test]
async fn test_list_contacts_shapes_request_and_response() {
    let crm = start_fixed_upstream(200, r#"{"contacts":[{"id":"c1"}],"total":41}"#).await;
    let app = build_app(test_config(Some(&crm.url())));

    let (status, body) = send(&app, get("/api/crm/contacts?search=ada&limit=10&offset=25")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!([{"id": "c1"}]));
    assert_eq!(body["total"], 41);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["offset"], 20);

    let requests = crm.requests();
    assert_eq!(requests.len(), 1);
    let head = requests[0].to_ascii_lowercase();
    assert!(head.starts_with("post /contacts/search "));
    assert!(head.contains("authorization: bearer crm-token"));
    assert!(head.contains("version: 2021-07-28"));
}

#[tokio::test]
async fn test_create_contact_unwraps_and_validates_first() {
    let crm = start_fixed_upstream(201, r#"{"contact":{"id":"new-1","email":"ada@example.com"}}"#).await;
    let app = build_app(test_config(Some(&crm.url())));

    let (status, _) = send(&app, post_json("/api/crm/contacts", r#"{"firstName":"Ada"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(crm.hits(), 0);

    let (status, body) = send(
        &app,
        post_json("/api/crm/contacts", r#"{"firstName":"Ada","email":"ada@example.com"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["id"], "new-1");
    assert_eq!(crm.hits(), 1);
}

#[tokio::test]
async fn test_upstream_not_found_maps_to_404() {
    let crm = start_fixed_upstream(404, r#"{"message":"Contact not found"}"#).await;
    let app = build_app(test_config(Some(&crm.url())));

    let (status, body) = send(&app, get("/api/crm/contacts/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "NOT_FOUND");
    // Development mode exposes the upstream payload.
    assert_eq!(body["error"]["details"]["body"]["message"], "Contact not found");
}

#[tokio::test]
async fn test_production_hides_upstream_details() {
    let crm = start_fixed_upstream(500, r#"{"message":"stack trace here"}"#).await;
    let mut config = test_config(Some(&crm.url()));
    config.environment = "production".to_string();
    config.retries.enabled = false;
    let app = build_app(config);

    let (status, body) = send(&app, get("/api/crm/contacts/c1")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "EXTERNAL_SERVICE");
    assert_eq!(body["error"]["message"], "External service error");
    assert!(body["error"].get("details").is_none());
}

#[tokio::test]
async fn test_idempotent_call_retried_after_503() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let crm = start_mock_upstream(move |_| {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                (503, r#"{"message":"busy"}"#.to_string())
            } else {
                (200, r#"{"contact":{"id":"c1"}}"#.to_string())
            }
        }
    })
    .await;
    let app = build_app(test_config(Some(&crm.url())));

    let (status, body) = send(&app, get("/api/crm/contacts/c1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "c1");
    assert_eq!(crm.hits(), 3);
}

#[tokio::test]
async fn test_non_idempotent_call_not_retried() {
    let crm = start_fixed_upstream(503, r#"{"message":"busy"}"#).await;
    let app = build_app(test_config(Some(&crm.url())));

    let (status, _) = send(&app, get("/api/crm/contacts")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(crm.hits(), 1);
}

#[tokio::test]
async fn test_upstream_timeout_returns_504() {
    let crm = start_mock_upstream(|_| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, "{}".to_string())
    })
    .await;
    let mut config = test_config(Some(&crm.url()));
    config.retries.enabled = false;
    config.upstream_mut("crm").unwrap().timeout_ms = Some(100);
    let app = build_app(config);

    let (status, body) = send(&app, get("/api/crm/contacts/c1")).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_breaker_opens_and_fails_fast() {
    let crm = start_fixed_upstream(503, r#"{"message":"down"}"#).await;
    let mut config = test_config(Some(&crm.url()));
    config.retries.enabled = false;
    config.circuit_breaker.failure_threshold = 3;
    config.circuit_breaker.reset_timeout_secs = 60;
    let app = build_app(config);

    for _ in 0..3 {
        let (status, _) = send(&app, get("/api/crm/contacts/c1")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
    assert_eq!(crm.hits(), 3);

    let (status, body) = send(&app, get("/api/crm/contacts/c1")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["kind"], "SERVICE_UNAVAILABLE");
    assert_eq!(crm.hits(), 3, "open breaker must not reach the upstream");

    let request = Request::builder()
        .uri("/api/circuit-breakers")
        .header("authorization", format!("Bearer {}", ADMIN_KEY))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalOpen"], 1);
    assert_eq!(body["data"]["breakers"][0]["name"], "crm");
    assert_eq!(body["data"]["breakers"][0]["state"], "OPEN");
}

#[tokio::test]
async fn test_crm_probe_and_stats() {
    let crm = start_mock_upstream(|head| async move {
        let line = head.lines().next().unwrap_or_default().to_string();
        let body = if line.starts_with("GET /locations/loc-1") {
            r#"{"location":{"id":"loc-1","name":"HQ"}}"#
        } else if line.starts_with("POST /contacts/search") {
            r#"{"contacts":[],"total":42}"#
        } else if line.starts_with("GET /opportunities/search") {
            r#"{"opportunities":[{"status":"open"},{"status":"won"},{"status":"open"}],"meta":{"total":3}}"#
        } else {
            return (404, "{}".to_string());
        };
        (200, body.to_string())
    })
    .await;
    let app = build_app(test_config(Some(&crm.url())));

    let (status, body) = send(&app, get("/api/test/crm")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "crm");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "HQ");

    let (status, body) = send(&app, get("/api/crm/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["contacts"]["total"], 42);
    assert_eq!(body["data"]["opportunities"]["total"], 3);
    assert_eq!(body["data"]["opportunities"]["byStatus"]["open"], 2);
    assert_eq!(body["data"]["opportunities"]["byStatus"]["won"], 1);
    assert_eq!(body["data"]["opportunities"]["byStatus"]["lost"], 0);
}

#[tokio::test]
async fn test_contact_id_cannot_escape_path() {
    let crm = start_fixed_upstream(200, r#"{"tasks":[],"contact":{}}"#).await;
    let app = build_app(test_config(Some(&crm.url())));

    for uri in [
        "/api/crm/tasks?contactId=../locations/other-loc",
        "/api/crm/tasks?contactId=%2E%2E%2Flocations%2Fother-loc",
        "/api/crm/contacts/%2e%2e",
    ] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"]["kind"], "VALIDATION");
    }
    assert_eq!(crm.hits(), 0);
    assert!(crm.requests().is_empty());
}

#[tokio::test]
async fn test_tasks_require_contact_and_filter() {
    let crm = start_fixed_upstream(
        200,
        r#"{"tasks":[{"id":"t1","completed":true},{"id":"t2","completed":false}]}"#,
    )
    .await;
    let app = build_app(test_config(Some(&crm.url())));

    let (status, _) = send(&app, get("/api/crm/tasks")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(crm.hits(), 0);

    let (status, body) = send(&app, get("/api/crm/tasks?contactId=c1&status=completed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["id"], "t1");
    assert!(crm.requests()[0].starts_with("GET /contacts/c1/tasks"));
}

#[tokio::test]
async fn test_server_serves_and_drains_on_shutdown() {
    let shutdown = Shutdown::new();
    let state = AppState::from_config(test_config(None), shutdown.clone()).unwrap();
    let server = GatewayServer::new(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(server.run(listener));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client.get(format!("http://{}/health", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert!(!shutdown.is_fatal());
}
