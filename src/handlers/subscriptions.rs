use super::common::{
    action_response, created_response, list_response, message_response, single_response,
    ApiResult, JsonBody,
};
use crate::{
    handlers::AppState,
    services::subscriptions::{CreateSubscriptionInput, UpdateSubscriptionInput},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct ProcessDueQuery {
    /// Evaluation instant; defaults to now
    pub now: Option<DateTime<Utc>>,
}

async fn list_subscriptions(State(state): State<AppState>) -> ApiResult {
    let subscriptions = state.services.subscriptions.list().await?;
    Ok(list_response(subscriptions))
}

async fn get_subscription(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let subscription = state.services.subscriptions.get(&identifier).await?;
    Ok(single_response(subscription))
}

async fn create_subscription(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateSubscriptionInput>,
) -> ApiResult {
    let subscription = state.services.subscriptions.create(payload).await?;
    Ok(created_response(subscription.id, Some(&subscription.name)))
}

async fn update_subscription(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    JsonBody(payload): JsonBody<UpdateSubscriptionInput>,
) -> ApiResult {
    let subscription = state
        .services
        .subscriptions
        .update(&identifier, payload)
        .await?;
    Ok(action_response("Subscription updated", subscription))
}

async fn delete_subscription(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    state.services.subscriptions.delete(&identifier).await?;
    Ok(message_response("Subscription deleted"))
}

async fn start_subscription(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let subscription = state.services.subscriptions.start(&identifier).await?;
    Ok(action_response("Subscription started", subscription))
}

async fn close_subscription(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let subscription = state.services.subscriptions.close(&identifier).await?;
    Ok(action_response("Subscription closed", subscription))
}

async fn raise_purchase_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let order = state.services.subscriptions.raise_po(&identifier).await?;
    Ok(created_response(order.id, Some(&order.name)))
}

async fn subscription_purchases(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let purchases = state.services.subscriptions.purchases(&identifier).await?;
    Ok(single_response(purchases))
}

/// Entry point for an external scheduler.
async fn process_due(
    State(state): State<AppState>,
    Query(query): Query<ProcessDueQuery>,
) -> ApiResult {
    let now = query.now.unwrap_or_else(Utc::now);
    let report = state
        .services
        .subscriptions
        .process_due_subscriptions(now)
        .await?;
    info!(
        processed = report.processed.len(),
        created = report.created.len(),
        failed = report.failures.len(),
        "Recurring purchase orders processed"
    );
    Ok(single_response(report))
}

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route("/process-due", post(process_due))
        .route(
            "/:identifier",
            get(get_subscription)
                .put(update_subscription)
                .patch(update_subscription)
                .delete(delete_subscription),
        )
        .route("/:identifier/start", post(start_subscription))
        .route("/:identifier/close", post(close_subscription))
        .route("/:identifier/raise-po", post(raise_purchase_order))
        .route("/:identifier/purchases", get(subscription_purchases))
}
