//! API integration tests, in process against the memory backend

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use rentflow_server::{
    api,
    config::{AppConfig, EngineConfig},
    repository::memory::MemoryStore,
    services::Services,
    AppState,
};

fn app() -> Router {
    let config = AppConfig {
        engine: EngineConfig {
            max_retries: 0,
            background_resync: false,
            ..EngineConfig::default()
        },
        ..AppConfig::default()
    };
    let services = Services::new(
        Arc::new(MemoryStore::new()),
        &config.engine,
        &config.notifications,
    )
    .unwrap();

    api::router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(format!("/api/v1{}", uri))
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let body = match body {
        Some(json) => Body::from(serde_json::to_vec(&json).unwrap()),
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_equipment(app: &Router, owner_id: Uuid) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/equipment",
        Some(json!({ "owner_id": owner_id, "name": "Scissor lift" })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["availability"], "available");
    body["id"].as_str().unwrap().to_string()
}

async fn create_rental(app: &Router, equipment_id: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/rentals",
        Some(json!({
            "equipment_id": equipment_id,
            "renter_id": Uuid::new_v4(),
            "start_date": "2025-07-01",
            "end_date": "2025-07-04",
            "total_price": "180.00"
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["payment_status"], "unpaid");
    body["id"].as_str().unwrap().to_string()
}

async fn transition(app: &Router, rental_id: &str, target: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/rentals/{}/transition", rental_id),
        Some(json!({ "target_status": target })),
        &[],
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_confirm_rents_equipment() {
    let app = app();
    let equipment_id = create_equipment(&app, Uuid::new_v4()).await;
    let rental_id = create_rental(&app, &equipment_id).await;

    let (status, body) = transition(&app, &rental_id, "confirmed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "success");
    assert_eq!(body["rental"]["status"], "confirmed");
    assert_eq!(body["equipment"]["action"], "write");
    assert_eq!(body["equipment"]["to"], "rented");

    let (status, body) = send(&app, Method::GET, &format!("/equipment/{}", equipment_id), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availability"], "rented");
}

#[tokio::test]
async fn test_transition_outcome_status_codes() {
    let app = app();
    let equipment_id = create_equipment(&app, Uuid::new_v4()).await;
    let rental_id = create_rental(&app, &equipment_id).await;

    let (status, body) = transition(&app, &rental_id, "in_progress").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["outcome"], "invalid_transition");
    assert_eq!(body["from"], "pending");
    assert_eq!(body["to"], "in_progress");

    let (status, body) = transition(&app, &rental_id, "pending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "no_op");

    let (status, body) = transition(&app, &Uuid::new_v4().to_string(), "confirmed").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["outcome"], "not_found");
}

#[tokio::test]
async fn test_legacy_status_names_are_accepted() {
    let app = app();
    let equipment_id = create_equipment(&app, Uuid::new_v4()).await;
    let rental_id = create_rental(&app, &equipment_id).await;

    let (status, body) = transition(&app, &rental_id, "approved").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rental"]["status"], "confirmed");

    let (status, body) = transition(&app, &rental_id, "rejected").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rental"]["status"], "cancelled");
}

#[tokio::test]
async fn test_actor_headers() {
    let app = app();
    let equipment_id = create_equipment(&app, Uuid::new_v4()).await;
    let rental_id = create_rental(&app, &equipment_id).await;
    let uri = format!("/rentals/{}/transition", rental_id);

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "target_status": "confirmed" })),
        &[("x-actor-id", "not-a-uuid")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let actor = Uuid::new_v4().to_string();
    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "target_status": "confirmed" })),
        &[("x-actor-id", actor.as_str()), ("x-actor-kind", "owner")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "success");
}

#[tokio::test]
async fn test_rental_validation() {
    let app = app();
    let owner_id = Uuid::new_v4();
    let equipment_id = create_equipment(&app, owner_id).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/rentals",
        Some(json!({
            "equipment_id": equipment_id,
            "renter_id": Uuid::new_v4(),
            "start_date": "2025-07-04",
            "end_date": "2025-07-01",
            "total_price": "180.00"
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // More precision than the price column keeps
    let (status, _) = send(
        &app,
        Method::POST,
        "/rentals",
        Some(json!({
            "equipment_id": equipment_id,
            "renter_id": Uuid::new_v4(),
            "start_date": "2025-07-01",
            "end_date": "2025-07-04",
            "total_price": "0.001"
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/rentals",
        Some(json!({
            "equipment_id": equipment_id,
            "renter_id": owner_id,
            "start_date": "2025-07-01",
            "end_date": "2025-07-04",
            "total_price": "180.00"
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::POST,
        "/rentals",
        Some(json!({
            "equipment_id": Uuid::new_v4(),
            "renter_id": Uuid::new_v4(),
            "start_date": "2025-07-01",
            "end_date": "2025-07-04",
            "total_price": "180.00"
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payment_recording() {
    let app = app();
    let equipment_id = create_equipment(&app, Uuid::new_v4()).await;
    let rental_id = create_rental(&app, &equipment_id).await;
    let uri = format!("/rentals/{}/payment", rental_id);

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({ "outcome": "failed" })), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "unpaid");

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({ "outcome": "succeeded" })), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "paid");
    assert_eq!(body["status"], "pending");

    transition(&app, &rental_id, "cancelled").await;
    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "outcome": "cash_on_delivery" })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_owner_maintenance_is_kept() {
    let app = app();
    let equipment_id = create_equipment(&app, Uuid::new_v4()).await;
    let rental_id = create_rental(&app, &equipment_id).await;
    let uri = format!("/equipment/{}/availability", equipment_id);

    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({ "status": "maintenance" })), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availability"], "maintenance");

    let (status, body) = transition(&app, &rental_id, "confirmed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["equipment"]["action"], "skip");
    assert_eq!(body["equipment"]["reason"]["reason"], "owner_managed");

    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({ "status": "active" })), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availability"], "rented");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/equipment/{}/reconcile", equipment_id),
        None,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "skip");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/rentals/{}/equipment-sync", rental_id),
        None,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "skip");
}

#[tokio::test]
async fn test_status_table() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/rentals/statuses", None, &[]).await;
    assert_eq!(status, StatusCode::OK);

    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 6);
    let pending = rows.iter().find(|row| row["status"] == "pending").unwrap();
    assert_eq!(pending["allowed_targets"], json!(["confirmed", "cancelled"]));
    assert_eq!(pending["occupies_equipment"], false);
    let completed = rows.iter().find(|row| row["status"] == "completed").unwrap();
    assert_eq!(completed["terminal"], true);
}
