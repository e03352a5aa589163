use chrono::Utc;
use metrics::counter;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    db::DbPool,
    entities::{
        customs_operation::{self, CustomsStatus, OperationType},
        customs_operation_line,
        picking::{self, PickingState},
        product, purchase_order, purchase_order_line, sale_order, sale_order_line,
        sale_order_line_lot, stock_lot, stock_move_line,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{get_by_id, lot_repository, require_by_identifier, sequence_name},
    services::catalog::normalize_custom_id,
};

/// Customs progress of a purchase order across its operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomsAggregate {
    None,
    Draft,
    Confirmed,
    Canceled,
}

/// Confirmed wins over draft, draft over canceled.
pub fn aggregate_status<I>(statuses: I) -> CustomsAggregate
where
    I: IntoIterator<Item = CustomsStatus>,
{
    let statuses: Vec<CustomsStatus> = statuses.into_iter().collect();
    if statuses.contains(&CustomsStatus::Confirmed) {
        CustomsAggregate::Confirmed
    } else if statuses.contains(&CustomsStatus::Draft) {
        CustomsAggregate::Draft
    } else if statuses.contains(&CustomsStatus::Canceled) {
        CustomsAggregate::Canceled
    } else {
        CustomsAggregate::None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomsOperationDetail {
    #[serde(flatten)]
    pub operation: customs_operation::Model,
    pub lines: Vec<customs_operation_line::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseCustomsSummary {
    pub purchase_order_id: i32,
    pub customs_status: CustomsAggregate,
    pub show_custom_ids_button: bool,
    pub operations: Vec<customs_operation::Model>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLineInput {
    pub product_id: i32,
    pub lot_id: Option<i32>,
    pub custom_id: Option<String>,
    pub quantity: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLineInput {
    pub line_id: i32,
    pub lot_id: Option<i32>,
    pub custom_id: Option<String>,
    pub quantity: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLinesInput {
    #[serde(default)]
    pub update_lines: Vec<UpdateLineInput>,
    #[serde(default)]
    pub new_lines: Vec<NewLineInput>,
    #[serde(default)]
    pub delete_lines: Vec<i32>,
}

/// Rejects `custom_id` when another lot or another operation line already holds it.
pub(crate) async fn ensure_custom_id_unique<C: ConnectionTrait>(
    db: &C,
    custom_id: &str,
    lot_id: Option<i32>,
    line_id: Option<i32>,
) -> Result<(), ServiceError> {
    if let Some(existing) = lot_repository::lot_with_custom_id(db, custom_id, lot_id).await? {
        return Err(ServiceError::Conflict(format!(
            "Customs ID '{}' is already assigned to Lot '{}'.",
            custom_id, existing.name
        )));
    }
    if lot_repository::line_with_custom_id(db, custom_id, line_id, lot_id)
        .await?
        .is_some()
    {
        return Err(ServiceError::Conflict(format!(
            "Customs ID '{}' is already used in another operation.",
            custom_id
        )));
    }
    Ok(())
}

pub(crate) fn reassignment_error(lot: &stock_lot::Model, held: &str, requested: &str) -> ServiceError {
    ServiceError::ValidationError(format!(
        "Lot '{}' already has Customs ID '{}'; cannot assign '{}'.",
        lot.name, held, requested
    ))
}

/// A lot may sit on only one confirmed operation per purchase order.
async fn ensure_not_confirmed_elsewhere<C: ConnectionTrait>(
    db: &C,
    operation: &customs_operation::Model,
    lot: &stock_lot::Model,
) -> Result<(), ServiceError> {
    let Some(purchase_order_id) = operation.purchase_order_id else {
        return Ok(());
    };
    let others: Vec<i32> = customs_operation::Entity::find()
        .filter(customs_operation::Column::PurchaseOrderId.eq(purchase_order_id))
        .filter(customs_operation::Column::Status.eq(CustomsStatus::Confirmed))
        .filter(customs_operation::Column::Id.ne(operation.id))
        .all(db)
        .await?
        .into_iter()
        .map(|op| op.id)
        .collect();
    if others.is_empty() {
        return Ok(());
    }
    let taken = customs_operation_line::Entity::find()
        .filter(customs_operation_line::Column::OperationId.is_in(others))
        .filter(customs_operation_line::Column::LotId.eq(lot.id))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(ServiceError::ValidationError(format!(
            "Lot '{}' already has a confirmed Customs ID for this Purchase Order.",
            lot.name
        )));
    }
    Ok(())
}

/// Checks one line write against the lot and the rest of the operation.
async fn check_line_write<C: ConnectionTrait>(
    db: &C,
    operation: &customs_operation::Model,
    line_id: Option<i32>,
    product_id: i32,
    lot_id: Option<i32>,
    custom_id: Option<&str>,
) -> Result<(), ServiceError> {
    let product = get_by_id::<product::Entity, _>(db, product_id, "Product").await?;

    if let Some(lot_id) = lot_id {
        let lot = get_by_id::<stock_lot::Entity, _>(db, lot_id, "Lot").await?;
        if lot.product_id != product.id {
            return Err(ServiceError::ValidationError(format!(
                "Lot '{}' does not belong to product '{}'.",
                lot.name, product.name
            )));
        }
        if let (Some(held), Some(requested)) = (lot.custom_id.as_deref(), custom_id) {
            if held != requested {
                return Err(reassignment_error(&lot, held, requested));
            }
        }

        let mut same_lot = customs_operation_line::Entity::find()
            .filter(customs_operation_line::Column::OperationId.eq(operation.id))
            .filter(customs_operation_line::Column::LotId.eq(lot.id));
        if let Some(line_id) = line_id {
            same_lot = same_lot.filter(customs_operation_line::Column::Id.ne(line_id));
        }
        if same_lot.one(db).await?.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "Lot '{}' appears more than once in this operation.",
                lot.name
            )));
        }
        ensure_not_confirmed_elsewhere(db, operation, &lot).await?;
    }

    if let Some(custom_id) = custom_id {
        ensure_custom_id_unique(db, custom_id, lot_id, line_id).await?;
    }
    Ok(())
}

async fn insert_operation<C: ConnectionTrait>(
    db: &C,
    operation_type: OperationType,
    partner_id: i32,
    source: &str,
    purchase_order_id: Option<i32>,
    sale_order_id: Option<i32>,
) -> Result<customs_operation::Model, ServiceError> {
    let now = Utc::now();
    let draft = customs_operation::ActiveModel {
        // Placeholder until the id is known
        name: Set(format!("CID/draft/{}", uuid::Uuid::new_v4())),
        operation_type: Set(operation_type),
        source_number: Set(Some(source.to_string())),
        partner_id: Set(Some(partner_id)),
        purchase_order_id: Set(purchase_order_id),
        sale_order_id: Set(sale_order_id),
        date: Set(now),
        sale_purchase_reference: Set(Some(source.to_string())),
        status: Set(CustomsStatus::Draft),
        description: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let name = sequence_name("CID/", draft.id);
    let mut active: customs_operation::ActiveModel = draft.into();
    active.name = Set(name);
    Ok(active.update(db).await?)
}

async fn insert_line<C: ConnectionTrait>(
    db: &C,
    operation_id: i32,
    product_id: i32,
    lot_id: Option<i32>,
    custom_id: Option<String>,
    quantity: Decimal,
) -> Result<customs_operation_line::Model, ServiceError> {
    Ok(customs_operation_line::ActiveModel {
        operation_id: Set(operation_id),
        product_id: Set(product_id),
        lot_id: Set(lot_id),
        custom_id: Set(custom_id),
        quantity: Set(quantity),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

async fn operation_lines<C: ConnectionTrait>(
    db: &C,
    operation_id: i32,
) -> Result<Vec<customs_operation_line::Model>, ServiceError> {
    Ok(customs_operation_line::Entity::find()
        .filter(customs_operation_line::Column::OperationId.eq(operation_id))
        .order_by_asc(customs_operation_line::Column::Id)
        .all(db)
        .await?)
}

/// Done pickings of an order
async fn done_pickings<C: ConnectionTrait>(
    db: &C,
    column: picking::Column,
    order_id: i32,
) -> Result<Vec<picking::Model>, ServiceError> {
    Ok(picking::Entity::find()
        .filter(column.eq(order_id))
        .filter(picking::Column::State.eq(PickingState::Done))
        .order_by_asc(picking::Column::Id)
        .all(db)
        .await?)
}

/// Received lots per product, in receipt order
async fn received_lots<C: ConnectionTrait>(
    db: &C,
    purchase_order_id: i32,
) -> Result<HashMap<i32, Vec<stock_lot::Model>>, ServiceError> {
    let picking_ids: Vec<i32> = done_pickings(db, picking::Column::PurchaseId, purchase_order_id)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();
    if picking_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let move_lines = stock_move_line::Entity::find()
        .filter(stock_move_line::Column::PickingId.is_in(picking_ids))
        .filter(stock_move_line::Column::LotId.is_not_null())
        .order_by_asc(stock_move_line::Column::Id)
        .all(db)
        .await?;
    let lot_ids: Vec<i32> = move_lines.iter().filter_map(|ml| ml.lot_id).collect();
    let lots = lot_repository::lots_by_id(db, &lot_ids).await?;

    let mut by_product: HashMap<i32, Vec<stock_lot::Model>> = HashMap::new();
    let mut seen = HashSet::new();
    for lot_id in lot_ids {
        if !seen.insert(lot_id) {
            continue;
        }
        if let Some(lot) = lots.get(&lot_id) {
            by_product.entry(lot.product_id).or_default().push(lot.clone());
        }
    }
    Ok(by_product)
}

/// Adds one line per expected car unit of the purchase order.
/// Lots that already carry a customs identifier or are already on the operation are skipped,
/// and units without a received lot become lot-less draft lines.
pub(crate) async fn create_lines<C: ConnectionTrait>(
    db: &C,
    operation: &customs_operation::Model,
    purchase_order_id: i32,
) -> Result<usize, ServiceError> {
    let existing = operation_lines(db, operation.id).await?;
    let existing_lots: HashSet<i32> = existing.iter().filter_map(|l| l.lot_id).collect();
    let mut lotless: HashMap<i32, usize> = HashMap::new();
    for line in existing.iter().filter(|l| l.lot_id.is_none()) {
        *lotless.entry(line.product_id).or_default() += 1;
    }

    let received = received_lots(db, purchase_order_id).await?;
    let order_lines = purchase_order_line::Entity::find()
        .filter(purchase_order_line::Column::OrderId.eq(purchase_order_id))
        .order_by_asc(purchase_order_line::Column::Id)
        .all(db)
        .await?;

    let mut created = 0;
    for order_line in order_lines {
        let product =
            get_by_id::<product::Entity, _>(db, order_line.product_id, "Product").await?;
        if !product.is_car {
            continue;
        }
        let units = order_line.product_qty.trunc().to_usize().unwrap_or(0);
        let serials = received.get(&product.id).map(Vec::as_slice).unwrap_or(&[]);

        for lot in serials.iter().take(units) {
            if lot.custom_id.is_some() || existing_lots.contains(&lot.id) {
                continue;
            }
            insert_line(db, operation.id, product.id, Some(lot.id), None, Decimal::ONE).await?;
            created += 1;
        }

        let missing = units.saturating_sub(serials.len());
        let already = lotless.get(&product.id).copied().unwrap_or(0);
        for _ in already..missing {
            insert_line(db, operation.id, product.id, None, None, Decimal::ONE).await?;
            created += 1;
        }
    }
    Ok(created)
}

pub(crate) async fn customs_status_for_purchase<C: ConnectionTrait>(
    db: &C,
    purchase_order_id: i32,
) -> Result<CustomsAggregate, ServiceError> {
    let operations = customs_operation::Entity::find()
        .filter(customs_operation::Column::PurchaseOrderId.eq(purchase_order_id))
        .all(db)
        .await?;
    Ok(aggregate_status(operations.into_iter().map(|op| op.status)))
}

/// True when no operation exists yet and a done receipt carries lots.
pub(crate) async fn show_custom_ids_button<C: ConnectionTrait>(
    db: &C,
    purchase_order_id: i32,
) -> Result<bool, ServiceError> {
    let has_operation = customs_operation::Entity::find()
        .filter(customs_operation::Column::PurchaseOrderId.eq(purchase_order_id))
        .one(db)
        .await?
        .is_some();
    if has_operation {
        return Ok(false);
    }
    Ok(!received_lots(db, purchase_order_id).await?.is_empty())
}

#[derive(Clone)]
pub struct CustomsService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CustomsService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<customs_operation::Model>, ServiceError> {
        Ok(customs_operation::Entity::find()
            .order_by_asc(customs_operation::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, identifier: &str) -> Result<CustomsOperationDetail, ServiceError> {
        let operation = require_by_identifier::<customs_operation::Entity, _>(
            &*self.db_pool,
            identifier,
            "Customs operation",
        )
        .await?;
        let lines = operation_lines(&*self.db_pool, operation.id).await?;
        Ok(CustomsOperationDetail { operation, lines })
    }

    /// Applies deletes, then updates, then new lines; draft operations only.
    #[instrument(skip(self, input))]
    pub async fn update_lines(
        &self,
        id: i32,
        input: UpdateLinesInput,
    ) -> Result<CustomsOperationDetail, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let operation =
            get_by_id::<customs_operation::Entity, _>(&txn, id, "Customs operation").await?;
        if operation.status != CustomsStatus::Draft {
            return Err(ServiceError::InvalidOperation(
                "Only draft operations can be edited.".to_string(),
            ));
        }

        for line_id in input.delete_lines {
            let line = self.line_of(&txn, &operation, line_id).await?;
            line.delete(&txn).await?;
        }

        for update in input.update_lines {
            let line = self.line_of(&txn, &operation, update.line_id).await?;
            let lot_id = update.lot_id.or(line.lot_id);
            let custom_id = match update.custom_id {
                Some(raw) => normalize_custom_id(Some(&raw)),
                None => line.custom_id.clone(),
            };
            check_line_write(
                &txn,
                &operation,
                Some(line.id),
                line.product_id,
                lot_id,
                custom_id.as_deref(),
            )
            .await?;

            let mut active: customs_operation_line::ActiveModel = line.into();
            active.lot_id = Set(lot_id);
            active.custom_id = Set(custom_id);
            if let Some(quantity) = update.quantity {
                active.quantity = Set(quantity);
            }
            active.update(&txn).await?;
        }

        for new_line in input.new_lines {
            let custom_id = normalize_custom_id(new_line.custom_id.as_deref());
            check_line_write(
                &txn,
                &operation,
                None,
                new_line.product_id,
                new_line.lot_id,
                custom_id.as_deref(),
            )
            .await?;
            insert_line(
                &txn,
                operation.id,
                new_line.product_id,
                new_line.lot_id,
                custom_id,
                new_line.quantity.unwrap_or(Decimal::ONE),
            )
            .await?;
        }

        let lines = operation_lines(&txn, operation.id).await?;
        txn.commit().await?;
        Ok(CustomsOperationDetail { operation, lines })
    }

    async fn line_of<C: ConnectionTrait>(
        &self,
        db: &C,
        operation: &customs_operation::Model,
        line_id: i32,
    ) -> Result<customs_operation_line::Model, ServiceError> {
        customs_operation_line::Entity::find_by_id(line_id)
            .filter(customs_operation_line::Column::OperationId.eq(operation.id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Operation line"))
    }

    /// Validates every line and persists the customs identifiers onto the lots.
    #[instrument(skip(self))]
    pub async fn confirm(&self, id: i32) -> Result<customs_operation::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let operation =
            get_by_id::<customs_operation::Entity, _>(&txn, id, "Customs operation").await?;
        if operation.status != CustomsStatus::Draft {
            return Err(ServiceError::InvalidOperation(
                "Only draft operations can be confirmed.".to_string(),
            ));
        }

        let lines = operation_lines(&txn, operation.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Please add at least one line.".to_string(),
            ));
        }

        for line in &lines {
            let product =
                get_by_id::<product::Entity, _>(&txn, line.product_id, "Product").await?;
            let Some(lot_id) = line.lot_id else {
                return Err(ServiceError::ValidationError(format!(
                    "Line for product '{}' has no Lot/Serial.",
                    product.name
                )));
            };
            let lot = get_by_id::<stock_lot::Entity, _>(&txn, lot_id, "Lot").await?;
            let Some(custom_id) = line.custom_id.clone() else {
                return Err(ServiceError::ValidationError(format!(
                    "Customs ID is required for Lot '{}'.",
                    lot.name
                )));
            };
            if !product.is_car {
                return Err(ServiceError::ValidationError(
                    "Only Car products are allowed in this operation.".to_string(),
                ));
            }

            let already_held = match lot.custom_id.as_deref() {
                Some(held) if held != custom_id => {
                    return Err(reassignment_error(&lot, held, &custom_id));
                }
                Some(_) => true,
                None => false,
            };

            ensure_not_confirmed_elsewhere(&txn, &operation, &lot).await?;

            if !already_held {
                ensure_custom_id_unique(&txn, &custom_id, Some(lot.id), Some(line.id)).await?;
                let mut active: stock_lot::ActiveModel = lot.clone().into();
                active.custom_id = Set(Some(custom_id.clone()));
                active.update(&txn).await?;
            }

            if let (OperationType::Po, Some(purchase_order_id)) =
                (operation.operation_type, operation.purchase_order_id)
            {
                let order_line = purchase_order_line::Entity::find()
                    .filter(purchase_order_line::Column::OrderId.eq(purchase_order_id))
                    .filter(purchase_order_line::Column::ProductId.eq(line.product_id))
                    .filter(purchase_order_line::Column::CustomId.is_null())
                    .order_by_asc(purchase_order_line::Column::Id)
                    .one(&txn)
                    .await?;
                if let Some(order_line) = order_line {
                    let mut active: purchase_order_line::ActiveModel = order_line.into();
                    active.custom_id = Set(Some(custom_id.clone()));
                    active.update(&txn).await?;
                }
            }
        }

        let mut active: customs_operation::ActiveModel = operation.into();
        active.status = Set(CustomsStatus::Confirmed);
        let operation = active.update(&txn).await?;
        txn.commit().await?;

        counter!("dealership_customs.confirmed", 1);
        info!(operation = %operation.name, lines = lines.len(), "Customs operation confirmed");
        self.event_sender
            .send_or_log(Event::CustomsOperationConfirmed {
                id: operation.id,
                lots: lines.len(),
            })
            .await;
        Ok(operation)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, id: i32) -> Result<customs_operation::Model, ServiceError> {
        let operation =
            get_by_id::<customs_operation::Entity, _>(&*self.db_pool, id, "Customs operation")
                .await?;
        if operation.status == CustomsStatus::Canceled {
            return Err(ServiceError::InvalidOperation(
                "Operation is already canceled.".to_string(),
            ));
        }
        let mut active: customs_operation::ActiveModel = operation.into();
        active.status = Set(CustomsStatus::Canceled);
        let operation = active.update(&*self.db_pool).await?;

        self.event_sender
            .send_or_log(Event::CustomsOperationCancelled(operation.id))
            .await;
        Ok(operation)
    }

    /// Returns the purchase order's live operation, creating and filling one when absent.
    #[instrument(skip(self))]
    pub async fn for_purchase(
        &self,
        identifier: &str,
    ) -> Result<(CustomsOperationDetail, bool), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = require_by_identifier::<purchase_order::Entity, _>(
            &txn,
            identifier,
            "Purchase Order",
        )
        .await?;

        let existing = customs_operation::Entity::find()
            .filter(customs_operation::Column::PurchaseOrderId.eq(order.id))
            .filter(customs_operation::Column::Status.ne(CustomsStatus::Canceled))
            .order_by_asc(customs_operation::Column::Id)
            .one(&txn)
            .await?;

        let (operation, created) = match existing {
            Some(operation) => (operation, false),
            None => {
                let operation = insert_operation(
                    &txn,
                    OperationType::Po,
                    order.partner_id,
                    &order.name,
                    Some(order.id),
                    None,
                )
                .await?;
                (operation, true)
            }
        };
        if operation.status == CustomsStatus::Draft {
            create_lines(&txn, &operation, order.id).await?;
        }
        let lines = operation_lines(&txn, operation.id).await?;
        txn.commit().await?;

        if created {
            self.event_sender
                .send_or_log(Event::CustomsOperationCreated {
                    id: operation.id,
                    name: operation.name.clone(),
                })
                .await;
        }
        Ok((CustomsOperationDetail { operation, lines }, created))
    }

    /// Creates an `so` operation with one line per selected lot of the car lines.
    #[instrument(skip(self))]
    pub async fn for_sale(
        &self,
        identifier: &str,
    ) -> Result<(CustomsOperationDetail, bool), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order =
            require_by_identifier::<sale_order::Entity, _>(&txn, identifier, "Sale Order")
                .await?;

        if let Some(operation) = customs_operation::Entity::find()
            .filter(customs_operation::Column::SaleOrderId.eq(order.id))
            .filter(customs_operation::Column::Status.ne(CustomsStatus::Canceled))
            .order_by_asc(customs_operation::Column::Id)
            .one(&txn)
            .await?
        {
            let lines = operation_lines(&txn, operation.id).await?;
            return Ok((CustomsOperationDetail { operation, lines }, false));
        }

        let operation = insert_operation(
            &txn,
            OperationType::So,
            order.partner_id,
            &order.name,
            None,
            Some(order.id),
        )
        .await?;

        let sale_lines = sale_order_line::Entity::find()
            .filter(sale_order_line::Column::OrderId.eq(order.id))
            .order_by_asc(sale_order_line::Column::Id)
            .all(&txn)
            .await?;
        for sale_line in sale_lines {
            let product =
                get_by_id::<product::Entity, _>(&txn, sale_line.product_id, "Product").await?;
            if !product.is_car {
                continue;
            }
            let lot_ids: Vec<i32> = sale_order_line_lot::Entity::find()
                .filter(sale_order_line_lot::Column::SaleLineId.eq(sale_line.id))
                .order_by_asc(sale_order_line_lot::Column::Id)
                .all(&txn)
                .await?
                .into_iter()
                .map(|link| link.lot_id)
                .collect();
            let lots = lot_repository::lots_by_id(&txn, &lot_ids).await?;
            for lot_id in lot_ids {
                let custom_id = lots.get(&lot_id).and_then(|lot| lot.custom_id.clone());
                insert_line(
                    &txn,
                    operation.id,
                    product.id,
                    Some(lot_id),
                    custom_id,
                    Decimal::ONE,
                )
                .await?;
            }
        }
        if done_pickings(&txn, picking::Column::SaleId, order.id)
            .await?
            .is_empty()
        {
            warn!(sale_order = %order.name, "Customs operation created before delivery");
        }

        let lines = operation_lines(&txn, operation.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CustomsOperationCreated {
                id: operation.id,
                name: operation.name.clone(),
            })
            .await;
        Ok((CustomsOperationDetail { operation, lines }, true))
    }

    #[instrument(skip(self))]
    pub async fn purchase_summary(
        &self,
        identifier: &str,
    ) -> Result<PurchaseCustomsSummary, ServiceError> {
        let db = &*self.db_pool;
        let order =
            require_by_identifier::<purchase_order::Entity, _>(db, identifier, "Purchase Order")
                .await?;
        let operations = customs_operation::Entity::find()
            .filter(customs_operation::Column::PurchaseOrderId.eq(order.id))
            .order_by_asc(customs_operation::Column::Id)
            .all(db)
            .await?;
        Ok(PurchaseCustomsSummary {
            purchase_order_id: order.id,
            customs_status: aggregate_status(operations.iter().map(|op| op.status)),
            show_custom_ids_button: show_custom_ids_button(db, order.id).await?,
            operations,
        })
    }
}
