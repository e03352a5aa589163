use super::common::{
    created_response, list_response, message_response, single_response,
    ApiResult, JsonBody, MultipartForm,
};
use crate::{
    handlers::AppState,
    services::{
        attachments::AttachmentOwner,
        hr::{
            CreateTimeOffInput, NamedInput, NewEmployee, PatchEmployeeInput, PatchTimeOffInput,
            ReplaceEmployeeInput, UpdateTimeOffInput,
        },
    },
};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

async fn list_employees(State(state): State<AppState>) -> ApiResult {
    let employees = state.services.hr.list_employees().await?;
    Ok(list_response(employees))
}

async fn get_employee(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult {
    let employee = state.services.hr.get_employee(id).await?;
    Ok(single_response(employee))
}

async fn create_employee(State(state): State<AppState>, multipart: Multipart) -> ApiResult {
    let mut form = MultipartForm::read(multipart).await?;
    let input = NewEmployee {
        name: form.text("name"),
        job_title: form.text("job_title"),
        work_email: form.text("work_email"),
        work_phone: form.text("work_phone"),
        department_id: form.int("department_id")?,
        image: form.take_file("image"),
    };
    let employee = state.services.hr.create_employee(input).await?;
    Ok(created_response(employee.id, None))
}

async fn replace_employee(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<ReplaceEmployeeInput>,
) -> ApiResult {
    state.services.hr.replace_employee(id, payload).await?;
    Ok(message_response("Employee fully updated"))
}

async fn patch_employee(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<PatchEmployeeInput>,
) -> ApiResult {
    state.services.hr.patch_employee(id, payload).await?;
    Ok(message_response("Employee partially updated"))
}

async fn delete_employee(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult {
    state.services.hr.delete_employee(id).await?;
    Ok(message_response("Employee deleted"))
}

async fn get_employee_image(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult {
    let (bytes, mimetype) = state.services.hr.employee_image(id).await?;
    Ok(([(header::CONTENT_TYPE, mimetype)], bytes).into_response())
}

async fn set_employee_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> ApiResult {
    let mut form = MultipartForm::read(multipart).await?;
    state
        .services
        .hr
        .set_employee_image(id, form.take_file("image"))
        .await?;
    Ok(message_response("Employee image updated"))
}

async fn remove_employee_image(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult {
    state.services.hr.remove_employee_image(id).await?;
    Ok(message_response("Employee image removed"))
}

async fn list_time_off(State(state): State<AppState>) -> ApiResult {
    let leaves = state.services.hr.list_time_off().await?;
    Ok(list_response(leaves))
}

async fn get_time_off(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult {
    let leave = state.services.hr.get_time_off(id).await?;
    Ok(single_response(leave))
}

async fn head_time_off(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult {
    let status = if state.services.hr.time_off_exists(id).await? {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok(status.into_response())
}

async fn create_time_off(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateTimeOffInput>,
) -> ApiResult {
    let leave = state.services.hr.create_time_off(payload).await?;
    Ok(created_response(leave.id, None))
}

async fn replace_time_off(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<UpdateTimeOffInput>,
) -> ApiResult {
    state.services.hr.update_time_off(id, payload).await?;
    Ok(message_response("Time off fully updated"))
}

async fn patch_time_off(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<PatchTimeOffInput>,
) -> ApiResult {
    state.services.hr.update_time_off(id, payload.into()).await?;
    Ok(message_response("Time off partially updated"))
}

async fn delete_time_off(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult {
    state.services.hr.delete_time_off(id).await?;
    Ok(message_response("Time off deleted"))
}

async fn list_time_off_attachments(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult {
    let attachments = state
        .services
        .attachments
        .list(AttachmentOwner::TimeOff(id))
        .await?;
    Ok(list_response(attachments))
}

async fn upload_time_off_attachment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> ApiResult {
    let mut form = MultipartForm::read(multipart).await?;
    let saved = state
        .services
        .attachments
        .upload(AttachmentOwner::TimeOff(id), form.take_file("file"))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "attachment_id": saved.id })),
    )
        .into_response())
}

async fn download_time_off_attachment(
    State(state): State<AppState>,
    Path((id, attachment_id)): Path<(i32, i32)>,
) -> ApiResult {
    let content = state
        .services
        .attachments
        .download(AttachmentOwner::TimeOff(id), attachment_id)
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

async fn delete_time_off_attachment(
    State(state): State<AppState>,
    Path((id, attachment_id)): Path<(i32, i32)>,
) -> ApiResult {
    state
        .services
        .attachments
        .delete(AttachmentOwner::TimeOff(id), attachment_id)
        .await?;
    Ok(message_response("Attachment deleted"))
}

async fn list_departments(State(state): State<AppState>) -> ApiResult {
    let departments = state.services.hr.list_departments().await?;
    Ok(list_response(departments))
}

async fn create_department(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NamedInput>,
) -> ApiResult {
    let department = state.services.hr.create_department(payload).await?;
    Ok(created_response(department.id, Some(&department.name)))
}

async fn list_leave_types(State(state): State<AppState>) -> ApiResult {
    let leave_types = state.services.hr.list_leave_types().await?;
    Ok(list_response(leave_types))
}

async fn create_leave_type(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NamedInput>,
) -> ApiResult {
    let leave_type = state.services.hr.create_leave_type(payload).await?;
    Ok(created_response(leave_type.id, Some(&leave_type.name)))
}

pub fn employee_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_employees).post(create_employee))
        .route(
            "/:id",
            get(get_employee)
                .put(replace_employee)
                .patch(patch_employee)
                .delete(delete_employee),
        )
        .route(
            "/:id/image",
            get(get_employee_image)
                .put(set_employee_image)
                .post(set_employee_image)
                .delete(remove_employee_image),
        )
}

pub fn time_off_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_time_off).post(create_time_off))
        .route(
            "/:id",
            get(get_time_off)
                .head(head_time_off)
                .put(replace_time_off)
                .patch(patch_time_off)
                .delete(delete_time_off),
        )
        .route(
            "/:id/attachments",
            get(list_time_off_attachments).post(upload_time_off_attachment),
        )
        .route(
            "/:id/attachments/:attachment_id",
            get(download_time_off_attachment).delete(delete_time_off_attachment),
        )
}

pub fn department_routes() -> Router<AppState> {
    Router::new().route("/", get(list_departments).post(create_department))
}

pub fn leave_type_routes() -> Router<AppState> {
    Router::new().route("/", get(list_leave_types).post(create_leave_type))
}
