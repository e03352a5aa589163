use super::common::{
    action_response, created_response, list_response, message_response, options_response,
    single_response, ApiResult, JsonBody,
};
use crate::{
    handlers::AppState,
    services::purchases::{
        CreatePurchaseOrderInput, PatchPurchaseOrderInput, UpdatePurchaseOrderInput,
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;
use tracing::info;

async fn list_purchase_orders(State(state): State<AppState>) -> ApiResult {
    let orders = state.services.purchases.list().await?;
    Ok(list_response(orders))
}

async fn get_purchase_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let order = state.services.purchases.get(&identifier).await?;
    Ok(single_response(order))
}

async fn create_purchase_order(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreatePurchaseOrderInput>,
) -> ApiResult {
    let order = state.services.purchases.create(payload).await?;
    Ok(created_response(order.id, Some(&order.name)))
}

async fn update_purchase_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    JsonBody(payload): JsonBody<UpdatePurchaseOrderInput>,
) -> ApiResult {
    let order = state.services.purchases.update(&identifier, payload).await?;
    Ok(action_response("Purchase Order updated", order))
}

async fn patch_purchase_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    JsonBody(payload): JsonBody<PatchPurchaseOrderInput>,
) -> ApiResult {
    let order = state.services.purchases.patch(&identifier, payload).await?;
    Ok(action_response("Purchase Order partially updated", order))
}

async fn delete_purchase_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    state.services.purchases.delete(&identifier).await?;
    info!(identifier = %identifier, "Purchase Order deleted");
    Ok(message_response("Purchase Order deleted"))
}

async fn confirm_purchase_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let (order, receipt) = state.services.purchases.confirm(&identifier).await?;
    Ok(action_response(
        "Purchase Order confirmed",
        json!({ "order": order, "receipt": receipt }),
    ))
}

async fn cancel_purchase_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let order = state.services.purchases.cancel(&identifier).await?;
    Ok(action_response("Purchase Order cancelled", order))
}

async fn repeat_purchase_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let order = state.services.purchases.repeat(&identifier).await?;
    Ok(created_response(order.id, Some(&order.name)))
}

async fn close_purchase_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let order = state.services.purchases.close(&identifier).await?;
    Ok(action_response("Purchase Order closed", order))
}

async fn list_receipts(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let receipts = state.services.purchases.receipts(&identifier).await?;
    Ok(list_response(receipts))
}

async fn purchase_customs_summary(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let summary = state.services.customs.purchase_summary(&identifier).await?;
    Ok(single_response(summary))
}

/// Opens (or reuses) the draft customs operation for the order's received lots.
async fn open_purchase_customs(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let (operation, created) = state.services.customs.for_purchase(&identifier).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, single_response(operation)).into_response())
}

async fn purchase_options() -> ApiResult {
    Ok(options_response(
        "/api/v2/purchases",
        &["GET", "POST", "OPTIONS"],
        "/api/v2/purchases/{identifier}",
        &["GET", "PUT", "PATCH", "DELETE", "OPTIONS"],
    ))
}

pub fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_purchase_orders)
                .post(create_purchase_order)
                .options(purchase_options),
        )
        .route(
            "/:identifier",
            get(get_purchase_order)
                .put(update_purchase_order)
                .patch(patch_purchase_order)
                .delete(delete_purchase_order)
                .options(purchase_options),
        )
        .route("/:identifier/confirm", post(confirm_purchase_order))
        .route("/:identifier/cancel", post(cancel_purchase_order))
        .route("/:identifier/repeat", post(repeat_purchase_order))
        .route("/:identifier/close", post(close_purchase_order))
        .route("/:identifier/receipts", get(list_receipts))
        .route(
            "/:identifier/customs",
            get(purchase_customs_summary).post(open_purchase_customs),
        )
}
