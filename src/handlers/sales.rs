use super::common::{
    action_response, created_response, list_response, message_response, options_response,
    single_response, ApiResult, JsonBody,
};
use crate::{
    handlers::AppState,
    services::sales::{CreateSaleOrderInput, PatchSaleOrderInput, UpdateSaleOrderInput},
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

async fn list_sale_orders(State(state): State<AppState>) -> ApiResult {
    let orders = state.services.sales.list().await?;
    Ok(list_response(orders))
}

async fn get_sale_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let order = state.services.sales.get(&identifier).await?;
    Ok(single_response(order))
}

async fn create_sale_order(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateSaleOrderInput>,
) -> ApiResult {
    let order = state.services.sales.create(payload).await?;
    Ok(created_response(order.id, Some(&order.name)))
}

async fn update_sale_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    JsonBody(payload): JsonBody<UpdateSaleOrderInput>,
) -> ApiResult {
    let order = state.services.sales.update(&identifier, payload).await?;
    Ok(action_response("Sale Order updated", order))
}

async fn patch_sale_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    JsonBody(payload): JsonBody<PatchSaleOrderInput>,
) -> ApiResult {
    let order = state.services.sales.patch(&identifier, payload).await?;
    Ok(action_response("Sale Order partially updated", order))
}

async fn delete_sale_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    state.services.sales.delete(&identifier).await?;
    info!(identifier = %identifier, "Sale Order deleted");
    Ok(message_response("Sale Order deleted"))
}

async fn confirm_sale_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let (order, delivery) = state.services.sales.confirm(&identifier).await?;
    Ok(action_response(
        "Sale Order confirmed",
        json!({ "order": order, "delivery": delivery }),
    ))
}

async fn cancel_sale_order(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let order = state.services.sales.cancel(&identifier).await?;
    Ok(action_response("Sale Order cancelled", order))
}

async fn open_sale_customs(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let (operation, created) = state.services.customs.for_sale(&identifier).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, single_response(operation)).into_response())
}

async fn sale_options() -> ApiResult {
    Ok(options_response(
        "/api/v2/sales",
        &["GET", "POST", "OPTIONS"],
        "/api/v2/sales/{identifier}",
        &["GET", "PUT", "PATCH", "DELETE", "OPTIONS"],
    ))
}

pub fn sale_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_sale_orders)
                .post(create_sale_order)
                .options(sale_options),
        )
        .route(
            "/:identifier",
            get(get_sale_order)
                .put(update_sale_order)
                .patch(patch_sale_order)
                .delete(delete_sale_order)
                .options(sale_options),
        )
        .route("/:identifier/confirm", post(confirm_sale_order))
        .route("/:identifier/cancel", post(cancel_sale_order))
        .route("/:identifier/customs", post(open_sale_customs))
}
