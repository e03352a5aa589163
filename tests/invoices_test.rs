mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, created_id, decimal, error_message, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn draft_invoice(app: &TestApp, partner: i64, product: i64, tax: Option<i64>) -> i64 {
    created_id(
        app.post(
            "/api/v2/invoices",
            json!({
                "partner_id": partner,
                "invoice_date": "2024-03-05",
                "auto_post": false,
                "invoice_lines": [
                    { "product_id": product, "quantity": "2", "price_unit": "150", "tax_id": tax }
                ]
            }),
        )
        .await,
    )
    .await
}

#[tokio::test]
async fn posting_names_invoices_from_the_yearly_sequence() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let product = app.seed_service_product("Inspection", "150").await;
    let tax = app.seed_tax("VAT 10%", "10").await;

    let first = draft_invoice(&app, customer, product, Some(tax)).await;
    let detail = body_json(app.get(&format!("/api/v2/invoices/{}", first)).await).await;
    assert_eq!(detail["data"]["state"], "draft");
    assert_eq!(decimal(&detail["data"]["amount_untaxed"]), dec!(300));
    assert_eq!(decimal(&detail["data"]["amount_total"]), dec!(330));

    let posted = body_json(app.action(&format!("/api/v2/invoices/{}/post", first)).await).await;
    assert_eq!(posted["data"]["state"], "posted");
    assert_eq!(posted["data"]["name"], "INV/2024/00001");
    assert_eq!(posted["data"]["invoice_date_due"], "2024-03-05");

    let second = draft_invoice(&app, customer, product, None).await;
    let posted = body_json(app.action(&format!("/api/v2/invoices/{}/post", second)).await).await;
    assert_eq!(posted["data"]["name"], "INV/2024/00002");

    let by_name = app.get("/api/v2/invoices/INV%2F2024%2F00002").await;
    assert_eq!(by_name.status(), StatusCode::OK);
}

#[tokio::test]
async fn vendor_bills_use_their_own_sequence() {
    let app = TestApp::new().await;
    let vendor = app.seed_partner("Vendor", None).await;
    let product = app.seed_service_product("Transport", "80").await;

    let response = app
        .post(
            "/api/v2/invoices",
            json!({
                "partner_id": vendor,
                "move_type": "in_invoice",
                "invoice_date": "2025-01-10",
                "invoice_lines": [{ "product_id": product }]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["name"], "BILL/2025/00001");

    let bills = body_json(app.get("/api/v2/invoices?move_type=in_invoice").await).await;
    assert_eq!(bills["count"], 1);
    let customer_invoices = body_json(app.get("/api/v2/invoices?move_type=out_invoice").await).await;
    assert_eq!(customer_invoices["count"], 0);
}

#[tokio::test]
async fn create_validates_partner_and_lines() {
    let app = TestApp::new().await;
    let product = app.seed_service_product("Transport", "80").await;

    let missing = app
        .post("/api/v2/invoices", json!({ "partner_id": 1 }))
        .await;
    assert_eq!(
        error_message(missing, StatusCode::BAD_REQUEST).await,
        "partner_id and invoice_lines required"
    );

    let unknown = app
        .post(
            "/api/v2/invoices",
            json!({ "partner_id": 999, "invoice_lines": [{ "product_id": product }] }),
        )
        .await;
    assert_eq!(
        error_message(unknown, StatusCode::BAD_REQUEST).await,
        "Invalid partner_id"
    );
}

#[tokio::test]
async fn posted_invoices_are_read_only() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let product = app.seed_service_product("Inspection", "150").await;
    let id = draft_invoice(&app, customer, product, None).await;
    app.action(&format!("/api/v2/invoices/{}/post", id)).await;

    let delete = app
        .request(Method::DELETE, &format!("/api/v2/invoices/{}", id), None)
        .await;
    assert_eq!(
        error_message(delete, StatusCode::BAD_REQUEST).await,
        "Only draft invoices can be deleted"
    );

    let patch = app
        .request(
            Method::PATCH,
            &format!("/api/v2/invoices/{}", id),
            Some(json!({ "narration": "late fee" })),
        )
        .await;
    error_message(patch, StatusCode::BAD_REQUEST).await;

    let repost = app.action(&format!("/api/v2/invoices/{}/post", id)).await;
    assert_eq!(
        error_message(repost, StatusCode::BAD_REQUEST).await,
        "Only draft invoices can be posted"
    );
}

#[tokio::test]
async fn drafts_can_be_edited_and_deleted() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let product = app.seed_service_product("Inspection", "150").await;
    let id = draft_invoice(&app, customer, product, None).await;

    let detail = body_json(app.get(&format!("/api/v2/invoices/{}", id)).await).await;
    let line_id = detail["data"]["lines"][0]["line_id"].as_i64().unwrap();
    let updated = app
        .request(
            Method::PUT,
            &format!("/api/v2/invoices/{}", id),
            Some(json!({ "update_lines": [{ "line_id": line_id, "quantity": "3" }] })),
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(decimal(&body_json(updated).await["data"]["amount_total"]), dec!(450));

    let empty_patch = app
        .request(Method::PATCH, &format!("/api/v2/invoices/{}", id), Some(json!({})))
        .await;
    assert_eq!(
        error_message(empty_patch, StatusCode::BAD_REQUEST).await,
        "No valid fields to update"
    );

    let deleted = app
        .request(Method::DELETE, &format!("/api/v2/invoices/{}", id), None)
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let gone = app.get(&format!("/api/v2/invoices/{}", id)).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_is_terminal() {
    let app = TestApp::new().await;
    let customer = app.seed_partner("Customer", None).await;
    let product = app.seed_service_product("Inspection", "150").await;
    let id = draft_invoice(&app, customer, product, None).await;

    let cancelled = body_json(app.action(&format!("/api/v2/invoices/{}/cancel", id)).await).await;
    assert_eq!(cancelled["data"]["state"], "cancel");

    let again = app.action(&format!("/api/v2/invoices/{}/cancel", id)).await;
    assert_eq!(
        error_message(again, StatusCode::BAD_REQUEST).await,
        "Invoice is already cancelled"
    );
}
