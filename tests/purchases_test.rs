mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, created_id, decimal, error_message, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn draft_order(app: &TestApp, vendor: i64, product: i64, tax: Option<i64>) -> (i64, String) {
    let response = app
        .post(
            "/api/v2/purchases",
            json!({
                "partner_id": vendor,
                "order_lines": [
                    { "product_id": product, "quantity": "3", "price_unit": "10", "tax_id": tax }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    (
        body["id"].as_i64().unwrap(),
        body["name"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn create_computes_line_and_header_amounts() {
    let app = TestApp::new().await;
    let vendor = app.seed_partner("Autohaus Nord", Some("sales@nord.test")).await;
    let product = app.seed_service_product("Detailing", "10").await;
    let tax = app.seed_tax("VAT 10%", "10").await;

    let (id, name) = draft_order(&app, vendor, product, Some(tax)).await;
    assert!(name.starts_with('P'), "unexpected name {}", name);

    let body = body_json(app.get(&format!("/api/v2/purchases/{}", id)).await).await;
    let order = &body["data"];
    assert_eq!(order["state"], "draft");
    assert_eq!(order["vendor"], "Autohaus Nord");
    assert_eq!(decimal(&order["amount_untaxed"]), dec!(30));
    assert_eq!(decimal(&order["amount_tax"]), dec!(3));
    assert_eq!(decimal(&order["amount_total"]), dec!(33));
    assert_eq!(order["lines"].as_array().unwrap().len(), 1);
    assert_eq!(order["customs_status"], "none");
}

#[tokio::test]
async fn orders_are_addressable_by_name() {
    let app = TestApp::new().await;
    let vendor = app.seed_partner("Vendor", None).await;
    let product = app.seed_service_product("Service", "10").await;
    let (id, name) = draft_order(&app, vendor, product, None).await;

    let body = body_json(app.get(&format!("/api/v2/purchases/{}", name)).await).await;
    assert_eq!(body["data"]["id"].as_i64(), Some(id));

    let missing = app.get("/api/v2/purchases/P99999").await;
    let message = error_message(missing, StatusCode::NOT_FOUND).await;
    assert_eq!(message, "Purchase Order not found");
}

#[tokio::test]
async fn create_requires_partner_and_lines() {
    let app = TestApp::new().await;
    let response = app
        .post("/api/v2/purchases", json!({ "order_lines": [] }))
        .await;
    let message = error_message(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "partner_id and order_lines required");
}

#[tokio::test]
async fn confirm_opens_an_incoming_receipt() {
    let app = TestApp::new().await;
    let vendor = app.seed_partner("Vendor", None).await;
    let car = app.seed_car("Roadster", "25000").await;
    let (id, _) = draft_order(&app, vendor, car, None).await;

    let response = app.action(&format!("/api/v2/purchases/{}/confirm", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["order"]["state"], "purchase");
    assert_eq!(body["data"]["receipt"]["picking_type"], "incoming");

    let receipts = body_json(app.get(&format!("/api/v2/purchases/{}/receipts", id)).await).await;
    assert_eq!(receipts["count"], 1);

    let again = app.action(&format!("/api/v2/purchases/{}/confirm", id)).await;
    let message = error_message(again, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "Only draft purchase orders can be confirmed.");
}

#[tokio::test]
async fn repeat_numbers_copies_from_the_base_name() {
    let app = TestApp::new().await;
    let vendor = app.seed_partner("Vendor", None).await;
    let product = app.seed_service_product("Service", "10").await;
    let (id, name) = draft_order(&app, vendor, product, None).await;

    let first = body_json(app.action(&format!("/api/v2/purchases/{}/repeat", id)).await).await;
    assert_eq!(first["name"], format!("{}-RO1", name));

    // Repeating a repeat still counts against the original.
    let first_id = first["id"].as_i64().unwrap();
    let second = app
        .action(&format!("/api/v2/purchases/{}/repeat", first_id))
        .await;
    assert_eq!(second.status(), StatusCode::CREATED);
    let second = body_json(second).await;
    assert_eq!(second["name"], format!("{}-RO2", name));

    let copy = body_json(app.get(&format!("/api/v2/purchases/{}", second["id"])).await).await;
    assert_eq!(copy["data"]["state"], "draft");
    assert_eq!(decimal(&copy["data"]["amount_total"]), dec!(30));
}

#[tokio::test]
async fn closed_orders_cannot_be_repeated() {
    let app = TestApp::new().await;
    let vendor = app.seed_partner("Vendor", None).await;
    let product = app.seed_service_product("Service", "10").await;
    let (id, _) = draft_order(&app, vendor, product, None).await;

    let closed = body_json(app.action(&format!("/api/v2/purchases/{}/close", id)).await).await;
    assert_eq!(closed["data"]["state"], "done");
    assert_eq!(closed["data"]["is_closed_operation"], true);

    let response = app.action(&format!("/api/v2/purchases/{}/repeat", id)).await;
    let message = error_message(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "This Purchase Order is closed.");
}

#[tokio::test]
async fn only_drafts_can_be_deleted() {
    let app = TestApp::new().await;
    let vendor = app.seed_partner("Vendor", None).await;
    let product = app.seed_service_product("Service", "10").await;
    let (id, _) = draft_order(&app, vendor, product, None).await;
    app.action(&format!("/api/v2/purchases/{}/confirm", id)).await;

    let response = app
        .request(Method::DELETE, &format!("/api/v2/purchases/{}", id), None)
        .await;
    let message = error_message(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "Only draft purchase orders can be deleted.");

    let still_there = app.get(&format!("/api/v2/purchases/{}", id)).await;
    assert_eq!(still_there.status(), StatusCode::OK);

    let (draft_id, _) = draft_order(&app, vendor, product, None).await;
    let deleted = app
        .request(Method::DELETE, &format!("/api/v2/purchases/{}", draft_id), None)
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let gone = app.get(&format!("/api/v2/purchases/{}", draft_id)).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_edits_lines_and_patch_edits_header() {
    let app = TestApp::new().await;
    let vendor = app.seed_partner("Vendor", None).await;
    let other_vendor = app.seed_partner("Other Vendor", None).await;
    let product = app.seed_service_product("Service", "10").await;
    let (id, _) = draft_order(&app, vendor, product, None).await;

    let detail = body_json(app.get(&format!("/api/v2/purchases/{}", id)).await).await;
    let line_id = detail["data"]["lines"][0]["line_id"].as_i64().unwrap();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v2/purchases/{}", id),
            Some(json!({
                "update_lines": [{ "line_id": line_id, "quantity": "5" }],
                "new_lines": [{ "product_id": product, "quantity": "1", "price_unit": "7.5" }]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["lines"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&body["data"]["amount_total"]), dec!(57.5));

    let patched = app
        .request(
            Method::PATCH,
            &format!("/api/v2/purchases/{}", id),
            Some(json!({ "partner_id": other_vendor, "notes": "deliver to lot B" })),
        )
        .await;
    assert_eq!(patched.status(), StatusCode::OK);
    let patched = body_json(patched).await;
    assert_eq!(patched["data"]["partner_id"].as_i64(), Some(other_vendor));

    let empty = app
        .request(
            Method::PATCH,
            &format!("/api/v2/purchases/{}", id),
            Some(json!({})),
        )
        .await;
    let message = error_message(empty, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "No valid fields to update");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new().await;
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/v2/purchases")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;
    error_message(response, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
async fn options_lists_allowed_methods() {
    let app = TestApp::new().await;
    let response = app.request(Method::OPTIONS, "/api/v2/purchases", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let allow = response
        .headers()
        .get("allow")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(allow.contains("POST"), "allow header was {}", allow);
}

#[tokio::test]
async fn cancel_cancels_the_open_receipt() {
    let app = TestApp::new().await;
    let vendor = app.seed_partner("Vendor", None).await;
    let car = app.seed_car("Coupe", "30000").await;
    let (id, _) = draft_order(&app, vendor, car, None).await;
    app.action(&format!("/api/v2/purchases/{}/confirm", id)).await;

    let body = body_json(app.action(&format!("/api/v2/purchases/{}/cancel", id)).await).await;
    assert_eq!(body["data"]["state"], "cancel");

    let receipts = body_json(app.get(&format!("/api/v2/purchases/{}/receipts", id)).await).await;
    assert_eq!(receipts["data"][0]["state"], "cancel");

    let created = created_id(
        app.post(
            "/api/v2/purchases",
            json!({ "partner_id": vendor, "order_lines": [{ "product_id": car }] }),
        )
        .await,
    )
    .await;
    assert!(created > id);
}
