mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use common::{body_json, decimal, error_message, TestApp};
use dealership_api::entities::subscription;
use rust_decimal_macros::dec;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};

fn date(value: &Value) -> DateTime<Utc> {
    value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| panic!("not a datetime: {}", value))
}

struct Fixture {
    app: TestApp,
    vendor: i64,
    product: i64,
    tax: i64,
}

async fn fixture() -> Fixture {
    let app = TestApp::new().await;
    let vendor = app.seed_partner("Parts Supplier", Some("orders@parts.test")).await;
    let product = app.seed_service_product("Floor mats", "10").await;
    let tax = app.seed_tax("VAT 10%", "10").await;
    Fixture {
        app,
        vendor,
        product,
        tax,
    }
}

async fn subscription(fx: &Fixture, extra: Value) -> Value {
    let mut body = json!({
        "vendor_id": fx.vendor,
        "product_id": fx.product,
        "quantity": "3",
        "unit_price": "10",
        "tax_id": fx.tax,
        "frequency": "monthly",
        "start_date": "2024-01-01T00:00:00Z",
        "last_invoice_date": "2024-01-01T00:00:00Z"
    });
    if let (Some(target), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
    let response = fx.app.post("/api/v2/subscriptions", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_i64().unwrap();
    body_json(fx.app.get(&format!("/api/v2/subscriptions/{}", id)).await).await["data"].clone()
}

#[tokio::test]
async fn create_computes_amounts_and_next_date() {
    let fx = fixture().await;
    let sub = subscription(&fx, json!({})).await;

    assert_eq!(sub["state"], "draft");
    assert!(sub["name"].as_str().unwrap().starts_with("SUB/"));
    assert_eq!(decimal(&sub["sub_amount"]), dec!(30));
    assert_eq!(decimal(&sub["amount"]), dec!(33));
    assert_eq!(date(&sub["next_invoice_date"]).to_rfc3339(), "2024-02-01T00:00:00+00:00");
    assert_eq!(sub["po_count"], 0);
}

#[tokio::test]
async fn non_positive_quantities_are_rejected() {
    let fx = fixture().await;
    let response = fx
        .app
        .post(
            "/api/v2/subscriptions",
            json!({
                "vendor_id": fx.vendor,
                "product_id": fx.product,
                "quantity": "0",
                "frequency": "weekly"
            }),
        )
        .await;
    assert_eq!(
        error_message(response, StatusCode::BAD_REQUEST).await,
        "Quantity must be greater than 0."
    );
}

#[tokio::test]
async fn update_recomputes_the_schedule() {
    let fx = fixture().await;
    let sub = subscription(&fx, json!({})).await;
    let id = sub["id"].as_i64().unwrap();

    let response = fx
        .app
        .request(
            Method::PUT,
            &format!("/api/v2/subscriptions/{}", id),
            Some(json!({ "frequency": "quarterly", "quantity": "5" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = &body_json(response).await["data"];
    assert_eq!(date(&updated["next_invoice_date"]).to_rfc3339(), "2024-04-01T00:00:00+00:00");
    assert_eq!(decimal(&updated["sub_amount"]), dec!(50));

    let empty = fx
        .app
        .request(
            Method::PATCH,
            &format!("/api/v2/subscriptions/{}", id),
            Some(json!({})),
        )
        .await;
    assert_eq!(
        error_message(empty, StatusCode::BAD_REQUEST).await,
        "No valid fields to update"
    );
}

#[tokio::test]
async fn raise_po_needs_a_running_subscription() {
    let fx = fixture().await;
    let sub = subscription(&fx, json!({})).await;
    let id = sub["id"].as_i64().unwrap();

    let early = fx
        .app
        .action(&format!("/api/v2/subscriptions/{}/raise-po", id))
        .await;
    assert_eq!(
        error_message(early, StatusCode::BAD_REQUEST).await,
        "Subscription must be running to raise a Purchase Order."
    );

    let started = body_json(
        fx.app
            .action(&format!("/api/v2/subscriptions/{}/start", id))
            .await,
    )
    .await;
    assert_eq!(started["data"]["state"], "running");

    let raised = fx
        .app
        .action(&format!("/api/v2/subscriptions/{}/raise-po", id))
        .await;
    assert_eq!(raised.status(), StatusCode::CREATED);
    let order_id = body_json(raised).await["id"].as_i64().unwrap();

    let order = body_json(fx.app.get(&format!("/api/v2/purchases/{}", order_id)).await).await;
    assert_eq!(order["data"]["state"], "draft");
    assert_eq!(order["data"]["origin"], sub["name"]);
    assert_eq!(decimal(&order["data"]["amount_total"]), dec!(33));

    let purchases = body_json(
        fx.app
            .get(&format!("/api/v2/subscriptions/{}/purchases", id))
            .await,
    )
    .await;
    assert_eq!(purchases["data"]["po_count"], 1);
}

#[tokio::test]
async fn process_due_raises_orders_for_due_subscriptions_only() {
    let fx = fixture().await;
    let due = subscription(&fx, json!({ "payment_method": "automatic" })).await;
    let later = subscription(
        &fx,
        json!({ "frequency": "yearly", "last_invoice_date": "2024-02-15T00:00:00Z" }),
    )
    .await;
    let idle = subscription(&fx, json!({})).await;
    for sub in [&due, &later] {
        fx.app
            .action(&format!("/api/v2/subscriptions/{}/start", sub["id"]))
            .await;
    }

    let response = fx
        .app
        .action("/api/v2/subscriptions/process-due?now=2024-03-01T00:00:00Z")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["data"]["processed"], json!([due["id"]]));
    assert_eq!(report["data"]["created"].as_array().unwrap().len(), 1);
    assert!(report["data"]["failures"].as_array().unwrap().is_empty());

    let refreshed = body_json(
        fx.app
            .get(&format!("/api/v2/subscriptions/{}", due["id"]))
            .await,
    )
    .await;
    assert_eq!(
        date(&refreshed["data"]["next_invoice_date"]).to_rfc3339(),
        "2024-04-01T00:00:00+00:00"
    );
    assert_eq!(refreshed["data"]["po_count"], 1);

    // Automatic payment confirms the raised order.
    let order_id = refreshed["data"]["purchase_order_id"].as_i64().unwrap();
    let order = body_json(fx.app.get(&format!("/api/v2/purchases/{}", order_id)).await).await;
    assert_eq!(order["data"]["state"], "purchase");

    // A second run at the same instant finds nothing due.
    let again = body_json(
        fx.app
            .action("/api/v2/subscriptions/process-due?now=2024-03-01T00:00:00Z")
            .await,
    )
    .await;
    assert_eq!(again["data"]["processed"], json!([]));

    let idle = body_json(
        fx.app
            .get(&format!("/api/v2/subscriptions/{}", idle["id"]))
            .await,
    )
    .await;
    assert_eq!(idle["data"]["po_count"], 0);
}

#[tokio::test]
async fn one_failing_subscription_does_not_stop_the_batch() {
    let fx = fixture().await;
    let broken = subscription(&fx, json!({})).await;
    let healthy = subscription(&fx, json!({})).await;
    for sub in [&broken, &healthy] {
        fx.app
            .action(&format!("/api/v2/subscriptions/{}/start", sub["id"]))
            .await;
    }
    // Point the first subscription at a product that does not exist.
    subscription::Entity::update_many()
        .col_expr(subscription::Column::ProductId, Expr::value(9_999))
        .filter(subscription::Column::Id.eq(broken["id"].as_i64().unwrap() as i32))
        .exec(&*fx.app.state.db)
        .await
        .unwrap();

    let report = body_json(
        fx.app
            .action("/api/v2/subscriptions/process-due?now=2024-03-01T00:00:00Z")
            .await,
    )
    .await;
    assert_eq!(report["data"]["processed"], json!([broken["id"], healthy["id"]]));
    let failures = report["data"]["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["subscription_id"], broken["id"]);
    assert_eq!(failures[0]["name"], broken["name"]);

    let healthy = body_json(
        fx.app
            .get(&format!("/api/v2/subscriptions/{}", healthy["id"]))
            .await,
    )
    .await;
    assert_eq!(healthy["data"]["po_count"], 1);
    assert_eq!(
        date(&healthy["data"]["next_invoice_date"]).to_rfc3339(),
        "2024-04-01T00:00:00+00:00"
    );
    let order_id = healthy["data"]["purchase_order_id"].as_i64().unwrap();
    let order = body_json(fx.app.get(&format!("/api/v2/purchases/{}", order_id)).await).await;
    assert_eq!(report["data"]["created"], json!([order["data"]["name"]]));

    // The failed run left nothing behind and stays due.
    let broken = body_json(
        fx.app
            .get(&format!("/api/v2/subscriptions/{}", broken["id"]))
            .await,
    )
    .await;
    assert_eq!(broken["data"]["po_count"], 0);
    assert_eq!(
        date(&broken["data"]["next_invoice_date"]).to_rfc3339(),
        "2024-02-01T00:00:00+00:00"
    );
}

#[tokio::test]
async fn running_subscriptions_must_be_closed_before_delete() {
    let fx = fixture().await;
    let sub = subscription(&fx, json!({})).await;
    let id = sub["id"].as_i64().unwrap();
    fx.app
        .action(&format!("/api/v2/subscriptions/{}/start", id))
        .await;

    let blocked = fx
        .app
        .request(Method::DELETE, &format!("/api/v2/subscriptions/{}", id), None)
        .await;
    assert_eq!(
        error_message(blocked, StatusCode::BAD_REQUEST).await,
        "Running subscriptions cannot be deleted; close them first."
    );

    let closed = body_json(
        fx.app
            .action(&format!("/api/v2/subscriptions/{}/close", id))
            .await,
    )
    .await;
    assert_eq!(closed["data"]["state"], "closed");

    let deleted = fx
        .app
        .request(Method::DELETE, &format!("/api/v2/subscriptions/{}", id), None)
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
}
