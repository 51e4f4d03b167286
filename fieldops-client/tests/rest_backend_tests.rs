//! RestBackend request shapes and error decoding against a mock HTTP server.

use fieldops_client::{Backend, BackendError, ClientConfig, ReconnectConfig, RestBackend};
use fieldops_core::{Fields, RecordId};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        rest_url: format!("{}/rest/v1", server.uri()),
        realtime_url: "ws://127.0.0.1:9/realtime/v1".to_string(),
        api_key: "anon-key".to_string(),
        access_token: Some("user-jwt".to_string()),
        request_timeout_ms: 2_000,
        heartbeat_interval_ms: 30_000,
        feed_buffer: 16,
        reconnect: ReconnectConfig {
            initial_ms: 100,
            max_ms: 1_000,
            multiplier: 2.0,
            jitter_ms: 0,
        },
    }
}

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

#[tokio::test]
async fn test_fetch_all_sends_order_and_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/equipment"))
        .and(query_param("select", "*"))
        .and(query_param("order", "created_at.desc"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer user-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "b", "created_at": "2024-01-02T00:00:00Z", "name": "Sprayer"},
            {"id": "a", "created_at": "2024-01-01T00:00:00Z", "name": "Tractor"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RestBackend::new(&config_for(&server)).expect("backend");
    let rows = backend
        .fetch_all("equipment", "created_at")
        .await
        .expect("fetch");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, RecordId::from("b"));
    assert_eq!(rows[1].field_text("name").as_deref(), Some("Tractor"));
}

#[tokio::test]
async fn test_insert_returns_stored_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/job_cards"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({"title": "Grease bearings"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": 41, "created_at": "2024-05-01T10:00:00Z", "title": "Grease bearings"}
        ])))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&config_for(&server)).expect("backend");
    let record = backend
        .insert("job_cards", &fields(json!({"title": "Grease bearings"})))
        .await
        .expect("insert");

    assert_eq!(record.id, RecordId::Number(41));
    assert_eq!(record.field_text("title").as_deref(), Some("Grease bearings"));
}

#[tokio::test]
async fn test_update_filters_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/repairs"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "created_at": "2024-05-01", "updated_at": "2024-05-03T00:00:00Z", "status": "done"}
        ])))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&config_for(&server)).expect("backend");
    let record = backend
        .update("repairs", &RecordId::Number(7), &fields(json!({"status": "done"})))
        .await
        .expect("update");

    assert!(record.updated_at.is_some());
    assert_eq!(record.field_text("status").as_deref(), Some("done"));
}

#[tokio::test]
async fn test_update_with_no_matching_row_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/repairs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&config_for(&server)).expect("backend");
    let err = backend
        .update("repairs", &RecordId::from("missing"), &Fields::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BackendError::NotFound {
            table: "repairs".to_string(),
            id: RecordId::from("missing"),
        }
    );
}

#[tokio::test]
async fn test_delete_succeeds_when_no_row_matches() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/fuel_logs"))
        .and(query_param("id", "eq.present"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/fuel_logs"))
        .and(query_param("id", "eq.gone"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RestBackend::new(&config_for(&server)).expect("backend");
    backend
        .delete("fuel_logs", &RecordId::from("present"))
        .await
        .expect("delete");
    backend
        .delete("fuel_logs", &RecordId::from("gone"))
        .await
        .expect("zero-row delete");

    let requests = server.received_requests().await.expect("recorded requests");
    assert!(requests
        .iter()
        .all(|request| !request.headers.contains_key("prefer")));
}

#[tokio::test]
async fn test_delete_surfaces_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/fuel_logs"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "42501",
            "message": "permission denied for table fuel_logs"
        })))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&config_for(&server)).expect("backend");
    match backend.delete("fuel_logs", &RecordId::from("a")).await {
        Err(BackendError::Rejected { status, message }) => {
            assert_eq!(status, 403);
            assert!(message.contains("permission denied"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_rejection_carries_remote_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/inventory_items"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint",
            "details": null,
            "hint": null
        })))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&config_for(&server)).expect("backend");
    let err = backend
        .insert("inventory_items", &fields(json!({"sku": "A1"})))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BackendError::Rejected {
            status: 409,
            message: "23505: duplicate key value violates unique constraint".to_string(),
        }
    );
}

#[tokio::test]
async fn test_plain_text_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/inspections"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&config_for(&server)).expect("backend");
    let err = backend
        .fetch_all("inspections", "created_at")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "upstream unavailable (HTTP 503)");
}

#[tokio::test]
async fn test_malformed_rows_are_decode_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/parts_orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "x"}])))
        .mount(&server)
        .await;

    let backend = RestBackend::new(&config_for(&server)).expect("backend");
    assert!(matches!(
        backend.fetch_all("parts_orders", "created_at").await,
        Err(BackendError::Decode(_))
    ));
}
