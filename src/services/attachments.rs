use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    db::DbPool,
    entities::{
        attachment,
        customs_operation::{self, CustomsStatus},
        time_off,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::get_by_id,
    services::hr::UploadedFile,
};

pub const TIME_OFF_MODEL: &str = "hr.leave";
pub const CUSTOMS_OPERATION_MODEL: &str = "stock.operation.customids";

/// Record an attachment hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentOwner {
    TimeOff(i32),
    CustomsOperation(i32),
}

impl AttachmentOwner {
    pub fn res_model(&self) -> &'static str {
        match self {
            AttachmentOwner::TimeOff(_) => TIME_OFF_MODEL,
            AttachmentOwner::CustomsOperation(_) => CUSTOMS_OPERATION_MODEL,
        }
    }

    pub fn res_id(&self) -> i32 {
        match self {
            AttachmentOwner::TimeOff(id) | AttachmentOwner::CustomsOperation(id) => *id,
        }
    }

    async fn ensure_exists<C: ConnectionTrait>(&self, db: &C) -> Result<(), ServiceError> {
        match self {
            AttachmentOwner::TimeOff(id) => {
                get_by_id::<time_off::Entity, _>(db, *id, "Time off").await?;
            }
            AttachmentOwner::CustomsOperation(id) => {
                get_by_id::<customs_operation::Entity, _>(db, *id, "Customs operation").await?;
            }
        }
        Ok(())
    }

    /// Customs documents are frozen once the operation leaves draft.
    async fn ensure_deletable<C: ConnectionTrait>(&self, db: &C) -> Result<(), ServiceError> {
        if let AttachmentOwner::CustomsOperation(id) = self {
            let operation =
                get_by_id::<customs_operation::Entity, _>(db, *id, "Customs operation").await?;
            if operation.status != CustomsStatus::Draft {
                return Err(ServiceError::InvalidOperation(
                    "You cannot delete attachments when the status is not 'draft'.".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentView {
    pub id: i32,
    pub name: String,
    pub mimetype: String,
    pub size: i64,
    pub created_on: DateTime<Utc>,
}

impl From<attachment::Model> for AttachmentView {
    fn from(model: attachment::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            mimetype: model.mimetype,
            size: model.file_size,
            created_on: model.created_at,
        }
    }
}

/// Decoded attachment ready to stream back
#[derive(Debug, Clone)]
pub struct AttachmentContent {
    pub name: String,
    pub mimetype: String,
    pub bytes: Vec<u8>,
}

impl AttachmentContent {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.name.replace('"', "'"))
    }
}

#[derive(Clone)]
pub struct AttachmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl AttachmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn find_owned(
        &self,
        owner: AttachmentOwner,
        attachment_id: i32,
    ) -> Result<attachment::Model, ServiceError> {
        attachment::Entity::find_by_id(attachment_id)
            .filter(attachment::Column::ResModel.eq(owner.res_model()))
            .filter(attachment::Column::ResId.eq(owner.res_id()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Attachment not found".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, owner: AttachmentOwner) -> Result<Vec<AttachmentView>, ServiceError> {
        let db = &*self.db_pool;
        owner.ensure_exists(db).await?;
        let attachments = attachment::Entity::find()
            .filter(attachment::Column::ResModel.eq(owner.res_model()))
            .filter(attachment::Column::ResId.eq(owner.res_id()))
            .order_by_asc(attachment::Column::Id)
            .all(db)
            .await?;
        Ok(attachments.into_iter().map(AttachmentView::from).collect())
    }

    #[instrument(skip(self, file))]
    pub async fn upload(
        &self,
        owner: AttachmentOwner,
        file: Option<UploadedFile>,
    ) -> Result<attachment::Model, ServiceError> {
        let file = file
            .filter(|f| !f.bytes.is_empty())
            .ok_or_else(|| ServiceError::BadRequest("File is required".to_string()))?;
        let db = &*self.db_pool;
        owner.ensure_exists(db).await?;

        let saved = attachment::ActiveModel {
            name: Set(file.filename),
            mimetype: Set(file.content_type),
            res_model: Set(owner.res_model().to_string()),
            res_id: Set(owner.res_id()),
            datas: Set(STANDARD.encode(&file.bytes)),
            file_size: Set(file.bytes.len() as i64),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(
            attachment_id = saved.id,
            res_model = %saved.res_model,
            res_id = saved.res_id,
            size = saved.file_size,
            "Attachment uploaded"
        );
        self.event_sender
            .send_or_log(Event::AttachmentUploaded {
                id: saved.id,
                res_model: saved.res_model.clone(),
                res_id: saved.res_id,
            })
            .await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn download(
        &self,
        owner: AttachmentOwner,
        attachment_id: i32,
    ) -> Result<AttachmentContent, ServiceError> {
        let found = self.find_owned(owner, attachment_id).await?;
        let bytes = STANDARD.decode(found.datas.as_bytes()).map_err(|e| {
            ServiceError::InternalError(format!("Stored attachment is corrupt: {}", e))
        })?;
        Ok(AttachmentContent {
            name: found.name,
            mimetype: found.mimetype,
            bytes,
        })
    }

    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        owner: AttachmentOwner,
        attachment_id: i32,
    ) -> Result<(), ServiceError> {
        owner.ensure_deletable(&*self.db_pool).await?;
        let found = self.find_owned(owner, attachment_id).await?;
        found.delete(&*self.db_pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_map_to_their_models() {
        assert_eq!(AttachmentOwner::TimeOff(3).res_model(), "hr.leave");
        assert_eq!(
            AttachmentOwner::CustomsOperation(9).res_model(),
            "stock.operation.customids"
        );
        assert_eq!(AttachmentOwner::CustomsOperation(9).res_id(), 9);
    }

    #[test]
    fn disposition_quotes_the_filename() {
        let content = AttachmentContent {
            name: "invoice \"final\".pdf".to_string(),
            mimetype: "application/pdf".to_string(),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(
            content.content_disposition(),
            "attachment; filename=\"invoice 'final'.pdf\""
        );
    }
}
