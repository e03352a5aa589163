mod common;

use axum::http::{Method, StatusCode};
use common::{body_bytes, body_json, created_id, decimal, error_message, Part, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

const AVATAR: &[u8] = b"\x89PNG\r\n\x1a\nfake-avatar";

async fn hire(app: &TestApp, name: &str, department: Option<i64>) -> i64 {
    let department = department.map(|d| d.to_string()).unwrap_or_default();
    let mut parts = vec![
        Part::Text("name", name),
        Part::Text("job_title", "Sales Advisor"),
        Part::Text("work_email", "advisor@dealer.test"),
        Part::File {
            field: "image",
            filename: "avatar.png",
            content_type: "image/png",
            bytes: AVATAR,
        },
    ];
    if !department.is_empty() {
        parts.push(Part::Text("department_id", &department));
    }
    created_id(app.multipart(Method::POST, "/api/v2/employees", &parts).await).await
}

async fn leave_type(app: &TestApp) -> i64 {
    created_id(
        app.post("/api/v2/leave-types", json!({ "name": "Paid Time Off" }))
            .await,
    )
    .await
}

async fn request_time_off(app: &TestApp, employee: i64, leave_type: i64) -> i64 {
    created_id(
        app.post(
            "/api/v2/time_off",
            json!({
                "employee_id": employee,
                "holiday_status_id": leave_type,
                "date_from": "2024-07-01",
                "date_to": "2024-07-03"
            }),
        )
        .await,
    )
    .await
}

#[tokio::test]
async fn employees_are_created_from_multipart_forms() {
    let app = TestApp::new().await;
    let department = created_id(
        app.post("/api/v2/departments", json!({ "name": "Showroom" }))
            .await,
    )
    .await;
    let id = hire(&app, "Dana Weber", Some(department)).await;

    let body = body_json(app.get(&format!("/api/v2/employees/{}", id)).await).await;
    let employee = &body["data"];
    assert_eq!(employee["name"], "Dana Weber");
    assert_eq!(employee["department"], "Showroom");
    assert_eq!(employee["has_image"], true);

    let image = app.get(&format!("/api/v2/employees/{}/image", id)).await;
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(image.headers()["content-type"], "image/png");
    assert_eq!(body_bytes(image).await, AVATAR.to_vec());
}

#[tokio::test]
async fn employee_creation_requires_name_and_image() {
    let app = TestApp::new().await;

    let no_name = app
        .multipart(
            Method::POST,
            "/api/v2/employees",
            &[Part::File {
                field: "image",
                filename: "avatar.png",
                content_type: "image/png",
                bytes: AVATAR,
            }],
        )
        .await;
    assert_eq!(
        error_message(no_name, StatusCode::BAD_REQUEST).await,
        "Name is required"
    );

    let no_image = app
        .multipart(Method::POST, "/api/v2/employees", &[Part::Text("name", "Sam")])
        .await;
    assert_eq!(
        error_message(no_image, StatusCode::BAD_REQUEST).await,
        "Image is required"
    );
}

#[tokio::test]
async fn employee_updates_and_image_management() {
    let app = TestApp::new().await;
    let id = hire(&app, "Dana Weber", None).await;

    let replaced = app
        .request(
            Method::PUT,
            &format!("/api/v2/employees/{}", id),
            Some(json!({ "name": "Dana Weber-Lang", "job_title": "Sales Manager" })),
        )
        .await;
    assert_eq!(body_json(replaced).await["message"], "Employee fully updated");

    let bad_email = app
        .request(
            Method::PATCH,
            &format!("/api/v2/employees/{}", id),
            Some(json!({ "work_email": "not-an-email" })),
        )
        .await;
    error_message(bad_email, StatusCode::BAD_REQUEST).await;

    let empty = app
        .request(Method::PATCH, &format!("/api/v2/employees/{}", id), Some(json!({})))
        .await;
    assert_eq!(
        error_message(empty, StatusCode::BAD_REQUEST).await,
        "No valid fields to update"
    );

    let removed = app
        .request(Method::DELETE, &format!("/api/v2/employees/{}/image", id), None)
        .await;
    assert_eq!(body_json(removed).await["message"], "Employee image removed");
    let missing = app.get(&format!("/api/v2/employees/{}/image", id)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let replaced_image = app
        .multipart(
            Method::PUT,
            &format!("/api/v2/employees/{}/image", id),
            &[Part::File {
                field: "image",
                filename: "new.jpg",
                content_type: "image/jpeg",
                bytes: b"jpeg-bytes",
            }],
        )
        .await;
    assert_eq!(body_json(replaced_image).await["message"], "Employee image updated");

    let employee = body_json(app.get(&format!("/api/v2/employees/{}", id)).await).await;
    assert_eq!(employee["data"]["name"], "Dana Weber-Lang");
    assert_eq!(employee["data"]["job_title"], "Sales Manager");
    assert_eq!(employee["data"]["has_image"], true);
}

#[tokio::test]
async fn time_off_counts_days_inclusively() {
    let app = TestApp::new().await;
    let employee = hire(&app, "Dana Weber", None).await;
    let leave_type = leave_type(&app).await;
    let id = request_time_off(&app, employee, leave_type).await;

    let body = body_json(app.get(&format!("/api/v2/time_off/{}", id)).await).await;
    let leave = &body["data"];
    assert_eq!(decimal(&leave["days"]), dec!(3));
    assert_eq!(leave["state"], "confirm");
    assert_eq!(leave["name"], "Time Off Request");
    assert_eq!(leave["leave_type"], "Paid Time Off");

    let patched = app
        .request(
            Method::PATCH,
            &format!("/api/v2/time_off/{}", id),
            Some(json!({ "date_to": "2024-07-10", "name": "Summer" })),
        )
        .await;
    assert_eq!(body_json(patched).await["message"], "Time off partially updated");
    let body = body_json(app.get(&format!("/api/v2/time_off/{}", id)).await).await;
    assert_eq!(decimal(&body["data"]["days"]), dec!(10));
    assert_eq!(body["data"]["name"], "Summer");
}

#[tokio::test]
async fn time_off_rejects_inverted_ranges_and_missing_fields() {
    let app = TestApp::new().await;
    let employee = hire(&app, "Dana Weber", None).await;
    let leave_type = leave_type(&app).await;

    let inverted = app
        .post(
            "/api/v2/time_off",
            json!({
                "employee_id": employee,
                "holiday_status_id": leave_type,
                "date_from": "2024-07-05",
                "date_to": "2024-07-01"
            }),
        )
        .await;
    assert_eq!(
        error_message(inverted, StatusCode::BAD_REQUEST).await,
        "The end date must be on or after the start date."
    );

    let incomplete = app
        .post("/api/v2/time_off", json!({ "employee_id": employee }))
        .await;
    assert_eq!(
        error_message(incomplete, StatusCode::BAD_REQUEST).await,
        "Missing required fields"
    );
}

#[tokio::test]
async fn head_reports_whether_a_request_exists() {
    let app = TestApp::new().await;
    let employee = hire(&app, "Dana Weber", None).await;
    let leave_type = leave_type(&app).await;
    let id = request_time_off(&app, employee, leave_type).await;

    let found = app
        .request(Method::HEAD, &format!("/api/v2/time_off/{}", id), None)
        .await;
    assert_eq!(found.status(), StatusCode::OK);
    let missing = app
        .request(Method::HEAD, "/api/v2/time_off/4242", None)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn time_off_attachments_round_trip_and_follow_their_owner() {
    let app = TestApp::new().await;
    let employee = hire(&app, "Dana Weber", None).await;
    let leave_type = leave_type(&app).await;
    let id = request_time_off(&app, employee, leave_type).await;

    let empty_upload = app
        .multipart(
            Method::POST,
            &format!("/api/v2/time_off/{}/attachments", id),
            &[Part::Text("note", "no file here")],
        )
        .await;
    assert_eq!(
        error_message(empty_upload, StatusCode::BAD_REQUEST).await,
        "File is required"
    );

    let upload = app
        .multipart(
            Method::POST,
            &format!("/api/v2/time_off/{}/attachments", id),
            &[Part::File {
                field: "file",
                filename: "doctor-note.txt",
                content_type: "text/plain",
                bytes: b"rest for three days",
            }],
        )
        .await;
    assert_eq!(upload.status(), StatusCode::CREATED);
    let attachment_id = body_json(upload).await["attachment_id"].as_i64().unwrap();

    let listed = body_json(app.get(&format!("/api/v2/time_off/{}/attachments", id)).await).await;
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["data"][0]["size"], 19);

    let download = app
        .get(&format!("/api/v2/time_off/{}/attachments/{}", id, attachment_id))
        .await;
    assert_eq!(download.headers()["content-type"], "text/plain");
    assert_eq!(
        download.headers()["content-disposition"],
        "attachment; filename=\"doctor-note.txt\""
    );
    assert_eq!(body_bytes(download).await, b"rest for three days".to_vec());

    // An attachment is only reachable through its own owner.
    let other = request_time_off(&app, employee, leave_type).await;
    let wrong_owner = app
        .get(&format!("/api/v2/time_off/{}/attachments/{}", other, attachment_id))
        .await;
    assert_eq!(
        error_message(wrong_owner, StatusCode::NOT_FOUND).await,
        "Attachment not found"
    );

    let deleted = app
        .request(
            Method::DELETE,
            &format!("/api/v2/time_off/{}/attachments/{}", id, attachment_id),
            None,
        )
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let listed = body_json(app.get(&format!("/api/v2/time_off/{}/attachments", id)).await).await;
    assert_eq!(listed["count"], 0);
}

#[tokio::test]
async fn deleting_an_employee_removes_their_time_off() {
    let app = TestApp::new().await;
    let employee = hire(&app, "Dana Weber", None).await;
    let leave_type = leave_type(&app).await;
    let id = request_time_off(&app, employee, leave_type).await;

    let deleted = app
        .request(Method::DELETE, &format!("/api/v2/employees/{}", employee), None)
        .await;
    assert_eq!(body_json(deleted).await["message"], "Employee deleted");

    let leave = app.get(&format!("/api/v2/time_off/{}", id)).await;
    assert_eq!(leave.status(), StatusCode::NOT_FOUND);
    let listed = body_json(app.get("/api/v2/time_off").await).await;
    assert_eq!(listed["count"], 0);
}
