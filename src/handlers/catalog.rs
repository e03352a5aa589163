use super::common::{
    action_response, created_response, list_response, single_response, ApiResult, JsonBody,
};
use crate::{
    handlers::AppState,
    services::catalog::{
        CreateLotInput, CreatePartnerInput, CreateProductInput, CreateTaxInput,
        UpdateProductInput,
    },
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct LotListQuery {
    pub product_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct LotCustomIdInput {
    pub custom_id: Option<String>,
}

async fn list_partners(State(state): State<AppState>) -> ApiResult {
    Ok(list_response(state.services.catalog.list_partners().await?))
}

async fn get_partner(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult {
    Ok(single_response(state.services.catalog.get_partner(id).await?))
}

async fn create_partner(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreatePartnerInput>,
) -> ApiResult {
    let partner = state.services.catalog.create_partner(payload).await?;
    Ok(created_response(partner.id, Some(&partner.name)))
}

async fn list_products(State(state): State<AppState>) -> ApiResult {
    Ok(list_response(state.services.catalog.list_products().await?))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult {
    Ok(single_response(state.services.catalog.get_product(id).await?))
}

async fn create_product(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateProductInput>,
) -> ApiResult {
    let product = state.services.catalog.create_product(payload).await?;
    Ok(created_response(product.id, Some(&product.name)))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<UpdateProductInput>,
) -> ApiResult {
    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(action_response("Product updated", product))
}

async fn list_taxes(State(state): State<AppState>) -> ApiResult {
    Ok(list_response(state.services.catalog.list_taxes().await?))
}

async fn create_tax(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateTaxInput>,
) -> ApiResult {
    let tax = state.services.catalog.create_tax(payload).await?;
    Ok(created_response(tax.id, Some(&tax.name)))
}

async fn list_lots(State(state): State<AppState>, Query(query): Query<LotListQuery>) -> ApiResult {
    Ok(list_response(
        state.services.catalog.list_lots(query.product_id).await?,
    ))
}

async fn get_lot(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult {
    Ok(single_response(state.services.catalog.get_lot(id).await?))
}

async fn create_lot(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateLotInput>,
) -> ApiResult {
    let lot = state.services.catalog.create_lot(payload).await?;
    Ok(created_response(lot.id, Some(&lot.name)))
}

async fn set_lot_custom_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<LotCustomIdInput>,
) -> ApiResult {
    let lot = state
        .services
        .catalog
        .set_lot_custom_id(id, payload.custom_id)
        .await?;
    Ok(action_response("Lot updated", lot))
}

pub fn partner_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_partners).post(create_partner))
        .route("/:id", get(get_partner))
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).patch(update_product))
}

pub fn tax_routes() -> Router<AppState> {
    Router::new().route("/", get(list_taxes).post(create_tax))
}

pub fn lot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_lots).post(create_lot))
        .route("/:id", get(get_lot).patch(set_lot_custom_id))
}
