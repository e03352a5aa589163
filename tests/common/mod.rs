#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use dealership_api::{
    config::AppConfig,
    db,
    events::{self, EventSender},
    AppState,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "dealership-test-boundary";

/// Helper harness for spinning up the router over an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

/// One part of a multipart body
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps the in-memory database alive and shared.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = dealership_api::build_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a JSON request against the router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("failed to serialize json body"))
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("failed to build request"))
            .await
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(body)).await
    }

    /// POST without a body, for state transitions.
    pub async fn action(&self, uri: &str) -> Response {
        self.request(Method::POST, uri, None).await
    }

    pub async fn multipart(&self, method: Method, uri: &str, parts: &[Part<'_>]) -> Response {
        let mut body: Vec<u8> = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    field,
                    filename,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            field, filename, content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .expect("failed to build multipart request");
        self.send(request).await
    }

    /// Creates a vendor or customer and returns its id.
    pub async fn seed_partner(&self, name: &str, email: Option<&str>) -> i64 {
        let response = self
            .post("/api/v2/partners", json!({ "name": name, "email": email }))
            .await;
        created_id(response).await
    }

    /// Serial tracked car product
    pub async fn seed_car(&self, name: &str, list_price: &str) -> i64 {
        let response = self
            .post(
                "/api/v2/products",
                json!({
                    "name": name,
                    "list_price": list_price,
                    "standard_price": list_price,
                    "product_type": "consu",
                    "tracking": "serial",
                    "is_car": true
                }),
            )
            .await;
        created_id(response).await
    }

    pub async fn seed_service_product(&self, name: &str, list_price: &str) -> i64 {
        let response = self
            .post(
                "/api/v2/products",
                json!({
                    "name": name,
                    "list_price": list_price,
                    "product_type": "service",
                    "tracking": "none"
                }),
            )
            .await;
        created_id(response).await
    }

    pub async fn seed_tax(&self, name: &str, amount: &str) -> i64 {
        let response = self
            .post("/api/v2/taxes", json!({ "name": name, "amount": amount }))
            .await;
        created_id(response).await
    }

    pub async fn seed_lot(&self, product_id: i64, name: &str, custom_id: Option<&str>) -> i64 {
        let response = self
            .post(
                "/api/v2/lots",
                json!({ "name": name, "product_id": product_id, "custom_id": custom_id }),
            )
            .await;
        created_id(response).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("response body is not JSON")
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body")
        .to_vec()
}

/// Asserts a 201 and returns the created id.
pub async fn created_id(response: Response) -> i64 {
    let status = response.status();
    let body = body_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", body);
    body["id"].as_i64().expect("created response carries an id")
}

/// Asserts the error envelope and returns its message.
pub async fn error_message(response: Response, expected: StatusCode) -> String {
    let status = response.status();
    let body = body_json(response).await;
    assert_eq!(status, expected, "unexpected body: {}", body);
    assert_eq!(body["status"], "error");
    body["message"].as_str().unwrap_or_default().to_string()
}

/// Decimals serialize as strings; numbers are accepted too.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}
