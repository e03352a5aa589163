use super::common::{
    action_response, list_response, message_response, parse_id, single_response, ApiResult,
    JsonBody, MultipartForm,
};
use crate::{
    handlers::AppState,
    services::{attachments::AttachmentOwner, customs::UpdateLinesInput},
};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;

async fn list_operations(State(state): State<AppState>) -> ApiResult {
    let operations = state.services.customs.list().await?;
    Ok(list_response(operations))
}

async fn get_operation(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult {
    let operation = state.services.customs.get(&identifier).await?;
    Ok(single_response(operation))
}

async fn update_lines(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateLinesInput>,
) -> ApiResult {
    let operation = state
        .services
        .customs
        .update_lines(parse_id(&id)?, payload)
        .await?;
    Ok(action_response("Customs operation updated", operation))
}

async fn confirm_operation(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let operation = state.services.customs.confirm(parse_id(&id)?).await?;
    Ok(action_response("Customs operation confirmed", operation))
}

async fn cancel_operation(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let operation = state.services.customs.cancel(parse_id(&id)?).await?;
    Ok(action_response("Customs operation cancelled", operation))
}

async fn list_attachments(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let owner = AttachmentOwner::CustomsOperation(parse_id(&id)?);
    let attachments = state.services.attachments.list(owner).await?;
    Ok(list_response(attachments))
}

async fn upload_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult {
    let owner = AttachmentOwner::CustomsOperation(parse_id(&id)?);
    let mut form = MultipartForm::read(multipart).await?;
    let saved = state
        .services
        .attachments
        .upload(owner, form.take_file("file"))
        .await?;
    Ok((
        StatusCode::CREATED,
        axum::Json(json!({ "status": "success", "attachment_id": saved.id })),
    )
        .into_response())
}

async fn download_attachment(
    State(state): State<AppState>,
    Path((id, attachment_id)): Path<(String, i32)>,
) -> ApiResult {
    let owner = AttachmentOwner::CustomsOperation(parse_id(&id)?);
    let content = state
        .services
        .attachments
        .download(owner, attachment_id)
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, content.mimetype.clone()),
            (header::CONTENT_DISPOSITION, content.content_disposition()),
        ],
        content.bytes,
    )
        .into_response())
}

async fn delete_attachment(
    State(state): State<AppState>,
    Path((id, attachment_id)): Path<(String, i32)>,
) -> ApiResult {
    let owner = AttachmentOwner::CustomsOperation(parse_id(&id)?);
    state
        .services
        .attachments
        .delete(owner, attachment_id)
        .await?;
    Ok(message_response("Attachment deleted"))
}

pub fn customs_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_operations))
        .route("/:identifier", get(get_operation).put(update_lines))
        .route("/:identifier/lines", axum::routing::put(update_lines))
        .route("/:identifier/confirm", post(confirm_operation))
        .route("/:identifier/cancel", post(cancel_operation))
        .route(
            "/:identifier/attachments",
            get(list_attachments).post(upload_attachment),
        )
        .route(
            "/:identifier/attachments/:attachment_id",
            get(download_attachment).delete(delete_attachment),
        )
}
