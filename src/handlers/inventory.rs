use super::common::{
    action_response, created_response, list_response, message_response, parse_id,
    single_response, ApiResult, JsonBody,
};
use crate::{
    handlers::AppState,
    services::pickings::{CreatePickingInput, UpdatePickingInput, ValidatePickingInput},
};
use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Router,
};

async fn list_pickings(State(state): State<AppState>) -> ApiResult {
    let pickings = state.services.pickings.list().await?;
    Ok(list_response(pickings))
}

async fn get_picking(State(state): State<AppState>, Path(identifier): Path<String>) -> ApiResult {
    let picking = state.services.pickings.get(&identifier).await?;
    Ok(single_response(picking))
}

async fn create_picking(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreatePickingInput>,
) -> ApiResult {
    let picking = state.services.pickings.create(payload).await?;
    Ok(created_response(picking.id, Some(&picking.name)))
}

async fn update_picking(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    JsonBody(payload): JsonBody<UpdatePickingInput>,
) -> ApiResult {
    let picking = state.services.pickings.update(&identifier, payload).await?;
    Ok(action_response("Picking updated", picking))
}

/// Lot names per move are optional; moves without an entry keep their lines.
async fn validate_picking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<JsonBody<ValidatePickingInput>>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let input = payload.map(|JsonBody(input)| input).unwrap_or_default();
    let picking = state.services.pickings.validate(id, input).await?;
    Ok(action_response("Picking validated", picking))
}

async fn delete_picking(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    state.services.pickings.delete(&identifier).await?;
    Ok(message_response("Picking deleted"))
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pickings).post(create_picking))
        .route(
            "/:identifier",
            get(get_picking).put(update_picking).delete(delete_picking),
        )
        .route("/:identifier/validate", patch(validate_picking))
}
