//! HTTP-level tests for the fare API, driven through the router without a
//! socket.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use farelink_api::{create_app, ApiConfig, AppState};
use farelink_core::{CardStatus, Money, VehicleStatus};
use farelink_db::{Database, DbConfig, NewCard, NewVehicle};

struct TestApp {
    app: Router,
    db: Database,
    vehicle_id: i64,
}

async fn setup() -> TestApp {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let vehicle = db.vehicles().insert(&NewVehicle::bus("T 101 DLA")).await.unwrap();
    let state = Arc::new(AppState::new(db.clone(), ApiConfig::default()));

    TestApp {
        app: create_app(state),
        db,
        vehicle_id: vehicle.id,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn fare_tap_returns_new_balance() {
    let t = setup().await;
    t.db.cards()
        .register(&NewCard::active("25:0E:8B:1B:08", Money::from_units(500)))
        .await
        .unwrap();

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/payments/fare",
        Some(json!({
            "card_uid": "250e8b1b08",
            "vehicle_id": t.vehicle_id,
            "fare_amount": 150,
            "latitude": -6.7924,
            "longitude": 39.2083
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["new_balance"], "350");
    assert_eq!(body["transaction"]["balance_before"], "500");
    assert_eq!(body["transaction"]["balance_after"], "350");
    assert!(body["transaction"]["reference"].is_string());

    let (status, body) = send(
        &t.app,
        "GET",
        &format!("/api/vehicles/{}/location", t.vehicle_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["position"]["latitude"], -6.7924);
}

#[tokio::test]
async fn fare_tap_missing_fields_is_400() {
    let t = setup().await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/payments/fare",
        Some(json!({ "card_uid": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELDS");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("card_uid"));
    assert!(message.contains("vehicle_id"));
    assert!(message.contains("fare_amount"));
}

#[tokio::test]
async fn fare_tap_malformed_json_keeps_error_shape() {
    let t = setup().await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/payments/fare",
        Some(json!({ "card_uid": "04A1B2C3", "vehicle_id": "seven", "fare_amount": 10 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_card_is_404_with_suggestion() {
    let t = setup().await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/payments/fare",
        Some(json!({
            "card_uid": "de:ad:be:ef:00",
            "vehicle_id": t.vehicle_id,
            "fare_amount": "150"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CARD_NOT_FOUND");
    assert_eq!(body["suggested_uid"], "DEADBEEF");
}

#[tokio::test]
async fn insufficient_balance_is_402() {
    let t = setup().await;
    t.db.cards()
        .register(&NewCard::active("04A1B2C3", Money::from_units(100)))
        .await
        .unwrap();

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/payments/fare",
        Some(json!({ "card_uid": "04A1B2C3", "vehicle_id": t.vehicle_id, "fare_amount": 150 })),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "INSUFFICIENT_BALANCE");
}

#[tokio::test]
async fn blocked_card_is_403_and_inactive_vehicle_is_404() {
    let t = setup().await;
    let mut blocked = NewCard::active("04A1B2C3", Money::from_units(500));
    blocked.status = CardStatus::Blocked;
    t.db.cards().register(&blocked).await.unwrap();
    t.db.cards()
        .register(&NewCard::active("04D4E5F6", Money::from_units(500)))
        .await
        .unwrap();

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/payments/fare",
        Some(json!({ "card_uid": "04A1B2C3", "vehicle_id": t.vehicle_id, "fare_amount": 150 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "CARD_NOT_ACTIVE");

    t.db.vehicles()
        .set_status(t.vehicle_id, VehicleStatus::Inactive)
        .await
        .unwrap();
    let (status, body) = send(
        &t.app,
        "POST",
        "/api/payments/fare",
        Some(json!({ "card_uid": "04D4E5F6", "vehicle_id": t.vehicle_id, "fare_amount": 150 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "VEHICLE_NOT_FOUND");
}

#[tokio::test]
async fn top_up_then_list_transactions() {
    let t = setup().await;
    let card = t
        .db
        .cards()
        .register(&NewCard::active("04A1B2C3", Money::from_units(0)))
        .await
        .unwrap();

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/payments/top-up",
        Some(json!({ "card_id": card.id, "amount": "1000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_balance"], "1000");

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/payments/fare",
        Some(json!({ "card_uid": "04A1B2C3", "vehicle_id": t.vehicle_id, "fare_amount": 150 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &t.app,
        "GET",
        &format!("/api/payments/transactions?card_id={}", card.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["transactions"][0]["type"], "fare_payment");
    assert_eq!(body["transactions"][1]["type"], "top_up");
}

#[tokio::test]
async fn resolve_dry_run() {
    let t = setup().await;
    let card = t
        .db
        .cards()
        .register(&NewCard::active("250E8B1B08", Money::from_units(10)))
        .await
        .unwrap();

    let (status, body) = send(&t.app, "GET", "/api/cards/resolve?uid=081B8B0E25", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["card_id"], card.id);
    assert_eq!(body["rule"], "reversed_bytes");

    let (status, body) = send(&t.app, "GET", "/api/cards/resolve?uid=FFEE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["suggested_uid"], "FFEE");
}

#[tokio::test]
async fn location_report_validation() {
    let t = setup().await;

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/vehicles/{}/location", t.vehicle_id),
        Some(json!({ "latitude": -6.8 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELDS");

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/vehicles/999/location",
        Some(json!({ "latitude": -6.8, "longitude": 39.28 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "VEHICLE_NOT_FOUND");

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/vehicles/{}/location", t.vehicle_id),
        Some(json!({ "latitude": -6.8, "longitude": 39.28, "accuracy": 12.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vehicle_id"], t.vehicle_id);
}

#[tokio::test]
async fn health_reports_database() {
    let t = setup().await;

    let (status, body) = send(&t.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
    assert_eq!(body["migrations"]["applied"], body["migrations"]["embedded"]);
}

#[tokio::test]
async fn storage_failure_during_debit_is_500_and_balance_kept() {
    let t = setup().await;
    let card = t
        .db
        .cards()
        .register(&NewCard::active("04A1B2C3", Money::from_units(500)))
        .await
        .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_ledger BEFORE INSERT ON transactions \
         BEGIN SELECT RAISE(ABORT, 'ledger offline'); END",
    )
    .execute(t.db.pool())
    .await
    .unwrap();

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/payments/fare",
        Some(json!({ "card_uid": "04A1B2C3", "vehicle_id": t.vehicle_id, "fare_amount": 150 })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "PERSISTENCE_FAILURE");
    assert_eq!(body["message"], "Internal server error");
    let stored = t.db.cards().get_by_id(card.id).await.unwrap().unwrap();
    assert_eq!(stored.balance, Money::from_units(500));
}
