//! Dealership API Library
//!
//! Purchasing, sales, stock, customs identifiers for car serials, invoicing,
//! recurring purchase subscriptions and HR over a REST surface.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{extract::DefaultBodyLimit, http::HeaderValue, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::{db::DbPool, events::EventSender};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<EventSender>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: config::AppConfig, event_sender: Arc<EventSender>) -> Self {
        let services =
            handlers::AppServices::new(db.clone(), event_sender.clone(), &config.default_currency);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Every resource mounted under `/api/v2`
pub fn api_v2_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        // Procurement and sales
        .nest("/purchases", handlers::purchases::purchase_routes())
        .nest("/sales", handlers::sales::sale_routes())
        .nest("/subscriptions", handlers::subscriptions::subscription_routes())
        // Stock and customs
        .nest("/inventory", handlers::inventory::inventory_routes())
        .nest("/customs-operations", handlers::customs::customs_routes())
        // Accounting
        .nest("/invoices", handlers::invoices::invoice_routes())
        // HR
        .nest("/employees", handlers::hr::employee_routes())
        .nest("/time_off", handlers::hr::time_off_routes())
        .nest("/departments", handlers::hr::department_routes())
        .nest("/leave-types", handlers::hr::leave_type_routes())
        // Catalog
        .nest("/partners", handlers::catalog::partner_routes())
        .nest("/products", handlers::catalog::product_routes())
        .nest("/taxes", handlers::catalog::tax_routes())
        .nest("/lots", handlers::catalog::lot_routes())
}

async fn api_status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "dealership-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        ::tracing::info!("Using permissive CORS because explicit origins were not configured");
        CorsLayer::permissive()
    }
}

/// Full application router with the middleware stack applied.
pub fn build_router(state: AppState) -> Router {
    let cfg = state.config.clone();

    Router::new()
        .route("/", get(|| async { "dealership-api up" }))
        .nest("/health", handlers::health::health_routes())
        .nest("/api/v2", api_v2_routes())
        .layer(DefaultBodyLimit::max(cfg.max_upload_bytes))
        // Request/response tracing and request logging
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_logging_middleware,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            cfg.request_timeout_secs,
        )))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&cfg))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

pub mod prelude {
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::repositories::*;
}
