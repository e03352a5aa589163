mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, created_id, decimal, error_message, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn sale_order(app: &TestApp, customer: i64, product: i64, quantity: &str, lots: &[i64]) -> i64 {
    created_id(
        app.post(
            "/api/v2/sales",
            json!({
                "partner_id": customer,
                "order_lines": [
                    { "product_id": product, "quantity": quantity, "lot_ids": lots }
                ]
            }),
        )
        .await,
    )
    .await
}

async fn confirm(app: &TestApp, order_id: i64) -> axum::response::Response {
    app.action(&format!("/api/v2/sales/{}/confirm", order_id))
        .await
}

#[tokio::test]
async fn create_prices_lines_from_the_product() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", Some("buyer@example.test")).await;
    let car = app.seed_car("Hatchback", "18000").await;
    let lot = app.seed_lot(car, "VIN-A", Some("CUST-A")).await;

    let id = sale_order(&app, customer, car, "1", &[lot]).await;
    let body = body_json(app.get(&format!("/api/v2/sales/{}", id)).await).await;
    let order = &body["data"];
    assert_eq!(order["state"], "draft");
    assert_eq!(order["customer"], "Customer");
    assert_eq!(decimal(&order["amount_total"]), dec!(18000));
    assert_eq!(order["lines"][0]["lots"], json!(["VIN-A"]));
}

#[tokio::test]
async fn confirm_requires_serials_for_cars() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let car = app.seed_car("Hatchback", "18000").await;

    let id = sale_order(&app, customer, car, "1", &[]).await;
    let message = error_message(confirm(&app, id).await, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "Serial Number required for 'Hatchback'.");
}

#[tokio::test]
async fn confirm_requires_one_serial_per_unit() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let car = app.seed_car("Hatchback", "18000").await;
    let lot = app.seed_lot(car, "VIN-A", Some("CUST-A")).await;

    let id = sale_order(&app, customer, car, "2", &[lot]).await;
    let message = error_message(confirm(&app, id).await, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "Quantity must match number of serial numbers.");
}

#[tokio::test]
async fn confirm_rejects_serials_without_custom_id() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let car = app.seed_car("Hatchback", "18000").await;
    let cleared = app.seed_lot(car, "VIN-A", Some("CUST-A")).await;
    let pending = app.seed_lot(car, "VIN-B", None).await;

    let id = sale_order(&app, customer, car, "2", &[cleared, pending]).await;
    let message = error_message(confirm(&app, id).await, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "Serial(s) without Customs ID:\nVIN-B");

    let order = body_json(app.get(&format!("/api/v2/sales/{}", id)).await).await;
    assert_eq!(order["data"]["state"], "draft");
}

#[tokio::test]
async fn services_confirm_without_a_delivery() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let service = app.seed_service_product("Extended warranty", "900").await;

    let id = sale_order(&app, customer, service, "1", &[]).await;
    let response = confirm(&app, id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["order"]["state"], "sale");
    assert_eq!(body["data"]["delivery"], Value::Null);
}

#[tokio::test]
async fn lot_tracked_lines_draw_many_units_from_one_lot() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let tyres = created_id(
        app.post(
            "/api/v2/products",
            json!({
                "name": "Tyres",
                "list_price": "120",
                "product_type": "consu",
                "tracking": "lot"
            }),
        )
        .await,
    )
    .await;
    let batch = app.seed_lot(tyres, "BATCH-1", None).await;

    let without_lot = sale_order(&app, customer, tyres, "4", &[]).await;
    let message = error_message(confirm(&app, without_lot).await, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "Lot required for product 'Tyres'.");

    let id = sale_order(&app, customer, tyres, "4", &[batch]).await;
    let response = confirm(&app, id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["order"]["state"], "sale");
    assert_eq!(body["data"]["delivery"]["picking_type"], "outgoing");
}

#[tokio::test]
async fn a_car_product_appears_on_one_line_only() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let car = app.seed_car("Hatchback", "18000").await;

    let response = app
        .post(
            "/api/v2/sales",
            json!({
                "partner_id": customer,
                "order_lines": [
                    { "product_id": car, "quantity": "1" },
                    { "product_id": car, "quantity": "1" }
                ]
            }),
        )
        .await;
    assert_eq!(
        error_message(response, StatusCode::BAD_REQUEST).await,
        "Car product 'Hatchback' cannot be added twice in the same Sale Order."
    );

    let id = sale_order(&app, customer, car, "1", &[]).await;
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v2/sales/{}", id),
            Some(json!({ "new_lines": [{ "product_id": car, "quantity": "1" }] })),
        )
        .await;
    assert_eq!(
        error_message(response, StatusCode::BAD_REQUEST).await,
        "Car product 'Hatchback' cannot be added twice in the same Sale Order."
    );

    // Other products can still be added next to the car.
    let wash = app.seed_service_product("Wash", "20").await;
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v2/sales/{}", id),
            Some(json!({ "new_lines": [{ "product_id": wash, "quantity": "2" }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["lines"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn lots_are_rejected_on_untracked_products() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let car = app.seed_car("Hatchback", "18000").await;
    let service = app.seed_service_product("Wash", "20").await;
    let lot = app.seed_lot(car, "VIN-A", None).await;

    let response = app
        .post(
            "/api/v2/sales",
            json!({
                "partner_id": customer,
                "order_lines": [{ "product_id": service, "lot_ids": [lot] }]
            }),
        )
        .await;
    let message = error_message(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(
        message,
        "Lot selection is only allowed for lot/serial tracked products ('Wash')."
    );
}

#[tokio::test]
async fn lots_must_belong_to_the_line_product() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let car = app.seed_car("Hatchback", "18000").await;
    let other_car = app.seed_car("Pickup", "30000").await;
    let lot = app.seed_lot(other_car, "VIN-X", None).await;

    let response = app
        .post(
            "/api/v2/sales",
            json!({
                "partner_id": customer,
                "order_lines": [{ "product_id": car, "lot_ids": [lot] }]
            }),
        )
        .await;
    let message = error_message(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "Lot 'VIN-X' does not belong to product 'Hatchback'.");
}

#[tokio::test]
async fn a_serial_can_be_sold_only_once() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let car = app.seed_car("Hatchback", "18000").await;
    let lot = app.seed_lot(car, "VIN-A", Some("CUST-A")).await;

    let first = sale_order(&app, customer, car, "1", &[lot]).await;
    let first_name = body_json(app.get(&format!("/api/v2/sales/{}", first)).await).await["data"]
        ["name"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .post(
            "/api/v2/sales",
            json!({
                "partner_id": customer,
                "order_lines": [{ "product_id": car, "lot_ids": [lot] }]
            }),
        )
        .await;
    let message = error_message(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(
        message,
        format!("Serial 'VIN-A' already used in Sale Order '{}'.", first_name)
    );

    // Cancelling the first order frees the serial.
    app.action(&format!("/api/v2/sales/{}/cancel", first)).await;
    let second = sale_order(&app, customer, car, "1", &[lot]).await;
    assert!(second > first);
}

#[tokio::test]
async fn delivery_lots_must_match_the_sold_lots() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let car = app.seed_car("Hatchback", "18000").await;
    let a = app.seed_lot(car, "VIN-A", Some("CUST-A")).await;
    app.seed_lot(car, "VIN-B", Some("CUST-B")).await;
    let c = app.seed_lot(car, "VIN-C", Some("CUST-C")).await;

    let id = sale_order(&app, customer, car, "2", &[a, c]).await;
    let body = body_json(confirm(&app, id).await).await;
    let delivery = &body["data"]["delivery"];
    assert_eq!(delivery["picking_type"], "outgoing");
    let delivery_id = delivery["id"].as_i64().unwrap();

    let detail = body_json(app.get(&format!("/api/v2/inventory/{}", delivery_id)).await).await;
    let move_id = detail["data"]["moves"][0]["id"].as_i64().unwrap();

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v2/inventory/{}/validate", delivery_id),
            Some(json!({ "moves": [{ "move_id": move_id, "lot_names": ["VIN-A", "VIN-B"] }] })),
        )
        .await;
    let message = error_message(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(
        message,
        "Delivery lots for Hatchback must match selected lots on the Sale Order.\nMissing: VIN-C\nExtra: VIN-B"
    );

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v2/inventory/{}/validate", delivery_id),
            Some(json!({ "moves": [{ "move_id": move_id, "lot_names": ["VIN-C", "VIN-A"] }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["state"], "done");
}

#[tokio::test]
async fn sale_orders_are_deletable_only_as_drafts() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let service = app.seed_service_product("Wash", "20").await;
    let id = sale_order(&app, customer, service, "1", &[]).await;
    confirm(&app, id).await;

    let response = app
        .request(Method::DELETE, &format!("/api/v2/sales/{}", id), None)
        .await;
    let message = error_message(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(message, "Only draft sale orders can be deleted.");
}

#[tokio::test]
async fn manual_transfers_can_be_created_and_deleted() {
    let app = TestApp::new().await;
    let service = app.seed_service_product("Wash", "20").await;

    let id = created_id(
        app.post(
            "/api/v2/inventory",
            json!({
                "picking_type": "internal",
                "location_id": 8,
                "location_dest_id": 8,
                "moves": [{ "product_id": service, "quantity": "2" }]
            }),
        )
        .await,
    )
    .await;

    let listed = body_json(app.get("/api/v2/inventory").await).await;
    assert_eq!(listed["count"], 1);

    let deleted = app
        .request(Method::DELETE, &format!("/api/v2/inventory/{}", id), None)
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let gone = app.get(&format!("/api/v2/inventory/{}", id)).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}
