use crate::{errors::ServiceError, services::hr::UploadedFile};
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Multipart, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::collections::HashMap;

pub type ApiResult = Result<Response, ServiceError>;

/// JSON body whose rejections render as the standard 400 envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ServiceError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ServiceError::BadRequest("Expected a JSON body".to_string())
        }
        other => ServiceError::BadRequest(format!("Invalid JSON body: {}", other.body_text())),
    }
}

/// `{status, count, data}`
pub fn list_response<T: Serialize>(data: Vec<T>) -> Response {
    let count = data.len();
    Json(json!({ "status": "success", "count": count, "data": data })).into_response()
}

/// `{status, data}`
pub fn single_response<T: Serialize>(data: T) -> Response {
    Json(json!({ "status": "success", "data": data })).into_response()
}

pub fn created_response(id: i32, name: Option<&str>) -> Response {
    let body = match name {
        Some(name) => json!({ "status": "success", "id": id, "name": name }),
        None => json!({ "status": "success", "id": id }),
    };
    (StatusCode::CREATED, Json(body)).into_response()
}

pub fn message_response(message: &str) -> Response {
    Json(json!({ "status": "success", "message": message })).into_response()
}

/// Mutation that also hands back the affected record
pub fn action_response<T: Serialize>(message: &str, data: T) -> Response {
    Json(json!({ "status": "success", "message": message, "data": data })).into_response()
}

/// Discovery payload for OPTIONS on a resource
pub fn options_response(
    collection: &str,
    collection_methods: &[&str],
    single: &str,
    single_methods: &[&str],
) -> Response {
    let allow = collection_methods.join(", ");
    (
        [(axum::http::header::ALLOW, allow)],
        Json(json!({
            "collection": { "endpoint": collection, "methods": collection_methods },
            "single_resource": { "endpoint": single, "methods": single_methods },
            "version": "v2",
        })),
    )
        .into_response()
}

pub fn parse_id(raw: &str) -> Result<i32, ServiceError> {
    raw.parse::<i32>()
        .map_err(|_| ServiceError::BadRequest(format!("Invalid id '{}'", raw)))
}

/// Text fields and files of a multipart form, keyed by field name
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ServiceError> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServiceError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(|e| {
                        ServiceError::BadRequest(format!("Invalid multipart body: {}", e))
                    })?;
                    form.files.insert(
                        name,
                        UploadedFile {
                            filename,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        ServiceError::BadRequest(format!("Invalid multipart body: {}", e))
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn int(&self, name: &str) -> Result<Option<i32>, ServiceError> {
        self.text(name)
            .map(|v| {
                v.parse::<i32>()
                    .map_err(|_| ServiceError::BadRequest(format!("Invalid {}", name)))
            })
            .transpose()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn list_envelope_counts_items() {
        let response = list_response(vec![1, 2, 3]);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["count"], 3);
    }

    #[tokio::test]
    async fn created_envelope_omits_missing_name() {
        let response = created_response(7, None);
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["id"], 7);
        assert!(value.get("name").is_none());
    }

    #[test]
    fn non_numeric_ids_are_bad_requests() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert_eq!(
            parse_id("P00012").unwrap_err().status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
