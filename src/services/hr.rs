use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    common::deserialize_optional_datetime,
    db::DbPool,
    entities::{
        attachment, department, employee, leave_type,
        time_off::{self, TimeOffState},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::get_by_id,
    services::attachments::AttachmentOwner,
};

pub const DEFAULT_TIME_OFF_NAME: &str = "Time Off Request";

/// Decoded multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct NewEmployee {
    pub name: Option<String>,
    pub job_title: Option<String>,
    pub work_email: Option<String>,
    pub work_phone: Option<String>,
    pub department_id: Option<i32>,
    pub image: Option<UploadedFile>,
}

/// Full replacement of the editable employee fields
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReplaceEmployeeInput {
    pub name: Option<String>,
    pub job_title: Option<String>,
    #[validate(email)]
    pub work_email: Option<String>,
    pub work_phone: Option<String>,
    pub department_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PatchEmployeeInput {
    pub name: Option<String>,
    pub job_title: Option<String>,
    #[validate(email)]
    pub work_email: Option<String>,
    pub work_phone: Option<String>,
    pub department_id: Option<i32>,
}

impl PatchEmployeeInput {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.job_title.is_none()
            && self.work_email.is_none()
            && self.work_phone.is_none()
            && self.department_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeView {
    pub id: i32,
    pub name: String,
    pub job_title: Option<String>,
    pub work_email: Option<String>,
    pub work_phone: Option<String>,
    pub department_id: Option<i32>,
    pub department: Option<String>,
    pub has_image: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTimeOffInput {
    pub employee_id: Option<i32>,
    pub holiday_status_id: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_to: Option<DateTime<Utc>>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTimeOffInput {
    pub employee_id: Option<i32>,
    pub holiday_status_id: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_to: Option<DateTime<Utc>>,
    pub name: Option<String>,
}

impl UpdateTimeOffInput {
    pub fn is_empty(&self) -> bool {
        self.employee_id.is_none()
            && self.holiday_status_id.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.name.is_none()
    }
}

/// PATCH allow-list for time off
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchTimeOffInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_to: Option<DateTime<Utc>>,
    pub holiday_status_id: Option<i32>,
}

impl From<PatchTimeOffInput> for UpdateTimeOffInput {
    fn from(patch: PatchTimeOffInput) -> Self {
        Self {
            employee_id: None,
            holiday_status_id: patch.holiday_status_id,
            date_from: patch.date_from,
            date_to: patch.date_to,
            name: patch.name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeOffView {
    pub id: i32,
    pub name: String,
    pub employee_id: i32,
    pub employee: Option<String>,
    pub leave_type_id: i32,
    pub leave_type: Option<String>,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    pub state: TimeOffState,
    pub days: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NamedInput {
    #[validate(length(min = 1))]
    pub name: String,
}

/// Calendar days covered by the request, both ends included.
pub fn number_of_days(
    date_from: DateTime<Utc>,
    date_to: DateTime<Utc>,
) -> Result<Decimal, ServiceError> {
    if date_to < date_from {
        return Err(ServiceError::ValidationError(
            "The end date must be on or after the start date.".to_string(),
        ));
    }
    let days = (date_to.date_naive() - date_from.date_naive()).num_days() + 1;
    Ok(Decimal::from(days))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn ensure_department<C: ConnectionTrait>(
    db: &C,
    department_id: Option<i32>,
) -> Result<(), ServiceError> {
    if let Some(id) = department_id {
        get_by_id::<department::Entity, _>(db, id, "Department").await?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct HrService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl HrService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn employee_view<C: ConnectionTrait>(
        &self,
        db: &C,
        employee: employee::Model,
    ) -> Result<EmployeeView, ServiceError> {
        let department = match employee.department_id {
            Some(id) => department::Entity::find_by_id(id)
                .one(db)
                .await?
                .map(|d| d.name),
            None => None,
        };
        Ok(EmployeeView {
            id: employee.id,
            name: employee.name,
            job_title: employee.job_title,
            work_email: employee.work_email,
            work_phone: employee.work_phone,
            department_id: employee.department_id,
            department,
            has_image: employee.image.is_some(),
        })
    }

    #[instrument(skip(self))]
    pub async fn list_employees(&self) -> Result<Vec<EmployeeView>, ServiceError> {
        let db = &*self.db_pool;
        let employees = employee::Entity::find()
            .order_by_asc(employee::Column::Id)
            .all(db)
            .await?;
        let mut views = Vec::with_capacity(employees.len());
        for employee in employees {
            views.push(self.employee_view(db, employee).await?);
        }
        Ok(views)
    }

    #[instrument(skip(self))]
    pub async fn get_employee(&self, id: i32) -> Result<EmployeeView, ServiceError> {
        let db = &*self.db_pool;
        let employee = get_by_id::<employee::Entity, _>(db, id, "Employee").await?;
        self.employee_view(db, employee).await
    }

    /// Name and portrait are mandatory; the portrait is stored base64 encoded.
    #[instrument(skip(self, input))]
    pub async fn create_employee(&self, input: NewEmployee) -> Result<employee::Model, ServiceError> {
        let name = blank_to_none(input.name)
            .ok_or_else(|| ServiceError::BadRequest("Name is required".to_string()))?;
        let image = input
            .image
            .filter(|file| !file.bytes.is_empty())
            .ok_or_else(|| ServiceError::BadRequest("Image is required".to_string()))?;

        let db = &*self.db_pool;
        ensure_department(db, input.department_id).await?;
        let employee = employee::ActiveModel {
            name: Set(name),
            job_title: Set(blank_to_none(input.job_title)),
            work_email: Set(blank_to_none(input.work_email)),
            work_phone: Set(blank_to_none(input.work_phone)),
            department_id: Set(input.department_id),
            image: Set(Some(STANDARD.encode(&image.bytes))),
            image_mimetype: Set(Some(image.content_type)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(employee_id = employee.id, "Employee created");
        self.event_sender
            .send_or_log(Event::EmployeeCreated(employee.id))
            .await;
        Ok(employee)
    }

    #[instrument(skip(self, input))]
    pub async fn replace_employee(
        &self,
        id: i32,
        input: ReplaceEmployeeInput,
    ) -> Result<employee::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let current = get_by_id::<employee::Entity, _>(db, id, "Employee").await?;
        let name = blank_to_none(input.name)
            .ok_or_else(|| ServiceError::BadRequest("Name is required".to_string()))?;
        ensure_department(db, input.department_id).await?;

        let mut active: employee::ActiveModel = current.into();
        active.name = Set(name);
        active.job_title = Set(input.job_title);
        active.work_email = Set(input.work_email);
        active.work_phone = Set(input.work_phone);
        active.department_id = Set(input.department_id);
        Ok(active.update(db).await?)
    }

    #[instrument(skip(self, input))]
    pub async fn patch_employee(
        &self,
        id: i32,
        input: PatchEmployeeInput,
    ) -> Result<employee::Model, ServiceError> {
        let db = &*self.db_pool;
        let current = get_by_id::<employee::Entity, _>(db, id, "Employee").await?;
        if input.is_empty() {
            return Err(ServiceError::BadRequest(
                "No valid fields to update".to_string(),
            ));
        }
        input.validate()?;

        let mut active: employee::ActiveModel = current.into();
        if let Some(name) = blank_to_none(input.name) {
            active.name = Set(name);
        }
        if let Some(job_title) = input.job_title {
            active.job_title = Set(Some(job_title));
        }
        if let Some(email) = input.work_email {
            active.work_email = Set(Some(email));
        }
        if let Some(phone) = input.work_phone {
            active.work_phone = Set(Some(phone));
        }
        if let Some(department_id) = input.department_id {
            ensure_department(db, Some(department_id)).await?;
            active.department_id = Set(Some(department_id));
        }
        Ok(active.update(db).await?)
    }

    /// Removes the employee with their time off requests and its attachments.
    #[instrument(skip(self))]
    pub async fn delete_employee(&self, id: i32) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let employee = get_by_id::<employee::Entity, _>(&txn, id, "Employee").await?;
        let leaves = time_off::Entity::find()
            .filter(time_off::Column::EmployeeId.eq(employee.id))
            .all(&txn)
            .await?;
        for leave in leaves {
            let owner = AttachmentOwner::TimeOff(leave.id);
            attachment::Entity::delete_many()
                .filter(attachment::Column::ResModel.eq(owner.res_model()))
                .filter(attachment::Column::ResId.eq(owner.res_id()))
                .exec(&txn)
                .await?;
            leave.delete(&txn).await?;
        }
        employee.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Decoded portrait and its content type
    #[instrument(skip(self))]
    pub async fn employee_image(&self, id: i32) -> Result<(Vec<u8>, String), ServiceError> {
        let employee = get_by_id::<employee::Entity, _>(&*self.db_pool, id, "Employee").await?;
        let encoded = employee
            .image
            .ok_or_else(|| ServiceError::NotFound("Employee has no image".to_string()))?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("Stored image is corrupt: {}", e)))?;
        Ok((
            bytes,
            employee
                .image_mimetype
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        ))
    }

    #[instrument(skip(self, image))]
    pub async fn set_employee_image(
        &self,
        id: i32,
        image: Option<UploadedFile>,
    ) -> Result<employee::Model, ServiceError> {
        let db = &*self.db_pool;
        let current = get_by_id::<employee::Entity, _>(db, id, "Employee").await?;
        let image = image
            .filter(|file| !file.bytes.is_empty())
            .ok_or_else(|| ServiceError::BadRequest("Image file is required".to_string()))?;
        let mut active: employee::ActiveModel = current.into();
        active.image = Set(Some(STANDARD.encode(&image.bytes)));
        active.image_mimetype = Set(Some(image.content_type));
        Ok(active.update(db).await?)
    }

    #[instrument(skip(self))]
    pub async fn remove_employee_image(&self, id: i32) -> Result<employee::Model, ServiceError> {
        let db = &*self.db_pool;
        let current = get_by_id::<employee::Entity, _>(db, id, "Employee").await?;
        let mut active: employee::ActiveModel = current.into();
        active.image = Set(None);
        active.image_mimetype = Set(None);
        Ok(active.update(db).await?)
    }

    async fn time_off_view<C: ConnectionTrait>(
        &self,
        db: &C,
        leave: time_off::Model,
    ) -> Result<TimeOffView, ServiceError> {
        let employee = employee::Entity::find_by_id(leave.employee_id)
            .one(db)
            .await?
            .map(|e| e.name);
        let leave_type = leave_type::Entity::find_by_id(leave.holiday_status_id)
            .one(db)
            .await?
            .map(|t| t.name);
        Ok(TimeOffView {
            id: leave.id,
            name: leave.name,
            employee_id: leave.employee_id,
            employee,
            leave_type_id: leave.holiday_status_id,
            leave_type,
            date_from: leave.date_from,
            date_to: leave.date_to,
            state: leave.state,
            days: leave.number_of_days,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_time_off(&self) -> Result<Vec<TimeOffView>, ServiceError> {
        let db = &*self.db_pool;
        let leaves = time_off::Entity::find()
            .order_by_asc(time_off::Column::Id)
            .all(db)
            .await?;
        let mut views = Vec::with_capacity(leaves.len());
        for leave in leaves {
            views.push(self.time_off_view(db, leave).await?);
        }
        Ok(views)
    }

    #[instrument(skip(self))]
    pub async fn get_time_off(&self, id: i32) -> Result<TimeOffView, ServiceError> {
        let db = &*self.db_pool;
        let leave = get_by_id::<time_off::Entity, _>(db, id, "Time off").await?;
        self.time_off_view(db, leave).await
    }

    #[instrument(skip(self))]
    pub async fn time_off_exists(&self, id: i32) -> Result<bool, ServiceError> {
        Ok(time_off::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .is_some())
    }

    #[instrument(skip(self, input))]
    pub async fn create_time_off(
        &self,
        input: CreateTimeOffInput,
    ) -> Result<time_off::Model, ServiceError> {
        let (Some(employee_id), Some(holiday_status_id), Some(date_from), Some(date_to)) = (
            input.employee_id,
            input.holiday_status_id,
            input.date_from,
            input.date_to,
        ) else {
            return Err(ServiceError::BadRequest(
                "Missing required fields".to_string(),
            ));
        };
        let days = number_of_days(date_from, date_to)?;

        let db = &*self.db_pool;
        get_by_id::<employee::Entity, _>(db, employee_id, "Employee").await?;
        get_by_id::<leave_type::Entity, _>(db, holiday_status_id, "Leave type").await?;
        let leave = time_off::ActiveModel {
            employee_id: Set(employee_id),
            holiday_status_id: Set(holiday_status_id),
            name: Set(blank_to_none(input.name).unwrap_or_else(|| DEFAULT_TIME_OFF_NAME.to_string())),
            date_from: Set(date_from),
            date_to: Set(date_to),
            number_of_days: Set(days),
            state: Set(TimeOffState::Confirm),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(time_off_id = leave.id, employee_id, "Time off requested");
        self.event_sender
            .send_or_log(Event::TimeOffRequested {
                id: leave.id,
                employee_id,
            })
            .await;
        Ok(leave)
    }

    /// Writes the provided fields and recomputes the day count.
    #[instrument(skip(self, input))]
    pub async fn update_time_off(
        &self,
        id: i32,
        input: UpdateTimeOffInput,
    ) -> Result<time_off::Model, ServiceError> {
        let db = &*self.db_pool;
        let current = get_by_id::<time_off::Entity, _>(db, id, "Time off").await?;
        if input.is_empty() {
            return Err(ServiceError::BadRequest(
                "No valid fields to update".to_string(),
            ));
        }
        let date_from = input.date_from.unwrap_or(current.date_from);
        let date_to = input.date_to.unwrap_or(current.date_to);
        let days = number_of_days(date_from, date_to)?;

        let mut active: time_off::ActiveModel = current.into();
        if let Some(employee_id) = input.employee_id {
            get_by_id::<employee::Entity, _>(db, employee_id, "Employee").await?;
            active.employee_id = Set(employee_id);
        }
        if let Some(leave_type_id) = input.holiday_status_id {
            get_by_id::<leave_type::Entity, _>(db, leave_type_id, "Leave type").await?;
            active.holiday_status_id = Set(leave_type_id);
        }
        if let Some(name) = blank_to_none(input.name) {
            active.name = Set(name);
        }
        active.date_from = Set(date_from);
        active.date_to = Set(date_to);
        active.number_of_days = Set(days);
        Ok(active.update(db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_time_off(&self, id: i32) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let leave = get_by_id::<time_off::Entity, _>(&txn, id, "Time off").await?;
        let owner = AttachmentOwner::TimeOff(leave.id);
        attachment::Entity::delete_many()
            .filter(attachment::Column::ResModel.eq(owner.res_model()))
            .filter(attachment::Column::ResId.eq(owner.res_id()))
            .exec(&txn)
            .await?;
        leave.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_departments(&self) -> Result<Vec<department::Model>, ServiceError> {
        Ok(department::Entity::find()
            .order_by_asc(department::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn create_department(
        &self,
        input: NamedInput,
    ) -> Result<department::Model, ServiceError> {
        input.validate()?;
        Ok(department::ActiveModel {
            name: Set(input.name),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn list_leave_types(&self) -> Result<Vec<leave_type::Model>, ServiceError> {
        Ok(leave_type::Entity::find()
            .order_by_asc(leave_type::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn create_leave_type(
        &self,
        input: NamedInput,
    ) -> Result<leave_type::Model, ServiceError> {
        input.validate()?;
        Ok(leave_type::ActiveModel {
            name: Set(input.name),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[rstest]
    #[case(at(2024, 5, 6, 8), at(2024, 5, 6, 17), 1)]
    #[case(at(2024, 5, 6, 8), at(2024, 5, 10, 17), 5)]
    #[case(at(2024, 2, 28, 0), at(2024, 3, 1, 0), 3)]
    fn days_are_counted_inclusively(
        #[case] from: DateTime<Utc>,
        #[case] to: DateTime<Utc>,
        #[case] expected: i64,
    ) {
        assert_eq!(number_of_days(from, to).unwrap(), Decimal::from(expected));
    }

    #[test]
    fn end_before_start_is_rejected() {
        assert!(number_of_days(at(2024, 5, 10, 8), at(2024, 5, 9, 8)).is_err());
    }

    #[test]
    fn patch_never_moves_a_request_to_another_employee() {
        let patch: PatchTimeOffInput = serde_json::from_value(serde_json::json!({
            "employee_id": 42,
            "name": "Dentist"
        }))
        .unwrap();
        let update = UpdateTimeOffInput::from(patch);
        assert_eq!(update.employee_id, None);
        assert_eq!(update.name.as_deref(), Some("Dentist"));
    }
}
