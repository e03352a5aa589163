use super::common::{
    action_response, created_response, list_response, message_response, options_response,
    single_response, ApiResult, JsonBody,
};
use crate::{
    entities::invoice::MoveType,
    handlers::AppState,
    services::invoices::{CreateInvoiceInput, PatchInvoiceInput, UpdateInvoiceInput},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListQuery {
    pub move_type: Option<MoveType>,
}

async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoiceListQuery>,
) -> ApiResult {
    let invoices = state.services.invoices.list(query.move_type).await?;
    Ok(list_response(invoices))
}

async fn get_invoice(State(state): State<AppState>, Path(identifier): Path<String>) -> ApiResult {
    let invoice = state.services.invoices.get(&identifier).await?;
    Ok(single_response(invoice))
}

async fn create_invoice(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateInvoiceInput>,
) -> ApiResult {
    let invoice = state.services.invoices.create(payload).await?;
    Ok(created_response(invoice.id, Some(&invoice.name)))
}

async fn update_invoice(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    JsonBody(payload): JsonBody<UpdateInvoiceInput>,
) -> ApiResult {
    let invoice = state.services.invoices.update(&identifier, payload).await?;
    Ok(action_response("Invoice updated", invoice))
}

async fn patch_invoice(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    JsonBody(payload): JsonBody<PatchInvoiceInput>,
) -> ApiResult {
    let invoice = state.services.invoices.patch(&identifier, payload).await?;
    Ok(action_response("Invoice partially updated", invoice))
}

async fn delete_invoice(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    state.services.invoices.delete(&identifier).await?;
    Ok(message_response("Invoice deleted"))
}

async fn post_invoice(State(state): State<AppState>, Path(identifier): Path<String>) -> ApiResult {
    let invoice = state.services.invoices.post(&identifier).await?;
    Ok(action_response("Invoice posted", invoice))
}

async fn cancel_invoice(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let invoice = state.services.invoices.cancel(&identifier).await?;
    Ok(action_response("Invoice cancelled", invoice))
}

async fn invoice_options() -> ApiResult {
    Ok(options_response(
        "/api/v2/invoices",
        &["GET", "POST", "OPTIONS"],
        "/api/v2/invoices/{identifier}",
        &["GET", "PUT", "PATCH", "DELETE", "OPTIONS"],
    ))
}

pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_invoices)
                .post(create_invoice)
                .options(invoice_options),
        )
        .route(
            "/:identifier",
            get(get_invoice)
                .put(update_invoice)
                .patch(patch_invoice)
                .delete(delete_invoice)
                .options(invoice_options),
        )
        .route("/:identifier/post", post(post_invoice))
        .route("/:identifier/cancel", post(cancel_invoice))
}
