use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    common::deserialize_optional_datetime,
    db::DbPool,
    entities::{
        partner,
        picking::{self, PickingState, PickingType},
        product,
        purchase_order::{self, PurchaseState},
        purchase_order_line,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{get_by_id, require_by_identifier, sequence_name},
    services::{
        customs::{self, CustomsAggregate},
        pickings::{self, NewMove, NewPicking},
        pricing,
    },
};

const REPEAT_MARKER: &str = "-RO";

fn default_quantity() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseLineInput {
    pub product_id: i32,
    pub name: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    #[serde(default)]
    pub price_unit: Decimal,
    pub tax_id: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_planned: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePurchaseOrderInput {
    pub partner_id: Option<i32>,
    pub order_lines: Option<Vec<PurchaseLineInput>>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_order: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseLineChange {
    pub line_id: i32,
    pub quantity: Option<Decimal>,
    pub price_unit: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePurchaseOrderInput {
    #[serde(default)]
    pub update_lines: Vec<PurchaseLineChange>,
    #[serde(default)]
    pub new_lines: Vec<PurchaseLineInput>,
    #[serde(default)]
    pub delete_lines: Vec<i32>,
}

/// Header fields a PATCH may touch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchPurchaseOrderInput {
    pub partner_id: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_order: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl PatchPurchaseOrderInput {
    pub fn is_empty(&self) -> bool {
        self.partner_id.is_none() && self.date_order.is_none() && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderSummary {
    pub id: i32,
    pub name: String,
    pub vendor: Option<String>,
    pub state: PurchaseState,
    pub date_order: DateTime<Utc>,
    pub amount_total: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseLineView {
    pub line_id: i32,
    pub product_id: i32,
    pub product: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub price_unit: Decimal,
    pub tax_id: Option<i32>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub custom_id: Option<String>,
    pub date_planned: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: purchase_order::Model,
    pub vendor: Option<String>,
    pub customs_status: CustomsAggregate,
    pub show_custom_ids_button: bool,
    pub lines: Vec<PurchaseLineView>,
}

/// Header of an order created from code rather than a request body
#[derive(Debug, Clone)]
pub(crate) struct NewPurchaseOrder {
    pub partner_id: i32,
    pub date_order: DateTime<Utc>,
    pub notes: Option<String>,
    pub origin: Option<String>,
    pub currency: String,
    pub lines: Vec<PurchaseLineInput>,
}

/// `P00012-RO2` repeats `P00012`.
pub fn repeat_base(name: &str) -> &str {
    name.split(REPEAT_MARKER).next().unwrap_or(name)
}

pub(crate) async fn insert_line<C: ConnectionTrait>(
    db: &C,
    order_id: i32,
    input: &PurchaseLineInput,
) -> Result<purchase_order_line::Model, ServiceError> {
    let product = get_by_id::<product::Entity, _>(db, input.product_id, "Product").await?;
    let tax = pricing::load_tax(db, input.tax_id).await?;
    let amounts = pricing::line_amounts(input.quantity, input.price_unit, tax.as_ref());
    Ok(purchase_order_line::ActiveModel {
        order_id: Set(order_id),
        product_id: Set(product.id),
        name: Set(input.name.clone().unwrap_or(product.name)),
        product_qty: Set(input.quantity),
        price_unit: Set(input.price_unit),
        tax_id: Set(input.tax_id),
        date_planned: Set(input.date_planned),
        custom_id: Set(None),
        price_subtotal: Set(amounts.subtotal),
        price_tax: Set(amounts.tax),
        price_total: Set(amounts.total),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

async fn order_lines<C: ConnectionTrait>(
    db: &C,
    order_id: i32,
) -> Result<Vec<purchase_order_line::Model>, ServiceError> {
    Ok(purchase_order_line::Entity::find()
        .filter(purchase_order_line::Column::OrderId.eq(order_id))
        .order_by_asc(purchase_order_line::Column::Id)
        .all(db)
        .await?)
}

/// Recomputes line and header amounts after a line change.
async fn recompute_totals<C: ConnectionTrait>(
    db: &C,
    order: purchase_order::Model,
) -> Result<purchase_order::Model, ServiceError> {
    let mut amounts = Vec::new();
    for line in order_lines(db, order.id).await? {
        let tax = pricing::load_tax(db, line.tax_id).await?;
        let line_amounts = pricing::line_amounts(line.product_qty, line.price_unit, tax.as_ref());
        if line_amounts.subtotal != line.price_subtotal
            || line_amounts.tax != line.price_tax
            || line_amounts.total != line.price_total
        {
            let mut active: purchase_order_line::ActiveModel = line.into();
            active.price_subtotal = Set(line_amounts.subtotal);
            active.price_tax = Set(line_amounts.tax);
            active.price_total = Set(line_amounts.total);
            active.update(db).await?;
        }
        amounts.push(line_amounts);
    }
    let totals = pricing::order_totals(&amounts);

    let mut active: purchase_order::ActiveModel = order.into();
    active.amount_untaxed = Set(totals.untaxed);
    active.amount_tax = Set(totals.tax);
    active.amount_total = Set(totals.total);
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

async fn insert_order<C: ConnectionTrait>(
    db: &C,
    partner_id: i32,
    date_order: DateTime<Utc>,
    notes: Option<String>,
    origin: Option<String>,
    currency: String,
) -> Result<purchase_order::Model, ServiceError> {
    get_by_id::<partner::Entity, _>(db, partner_id, "Partner").await?;
    let now = Utc::now();
    Ok(purchase_order::ActiveModel {
        name: Set(format!("P/draft/{}", uuid::Uuid::new_v4())),
        partner_id: Set(partner_id),
        state: Set(PurchaseState::Draft),
        date_order: Set(date_order),
        notes: Set(notes),
        origin: Set(origin),
        currency: Set(currency),
        is_closed_operation: Set(false),
        amount_untaxed: Set(Decimal::ZERO),
        amount_tax: Set(Decimal::ZERO),
        amount_total: Set(Decimal::ZERO),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

async fn rename<C: ConnectionTrait>(
    db: &C,
    order: purchase_order::Model,
    name: String,
) -> Result<purchase_order::Model, ServiceError> {
    let mut active: purchase_order::ActiveModel = order.into();
    active.name = Set(name);
    Ok(active.update(db).await?)
}

/// Creates a draft order with its lines inside the caller's transaction.
pub(crate) async fn create_order_in<C: ConnectionTrait>(
    db: &C,
    new_order: NewPurchaseOrder,
) -> Result<purchase_order::Model, ServiceError> {
    let order = insert_order(
        db,
        new_order.partner_id,
        new_order.date_order,
        new_order.notes,
        new_order.origin,
        new_order.currency,
    )
    .await?;
    let name = sequence_name("P", order.id);
    let order = rename(db, order, name).await?;
    for line in &new_order.lines {
        insert_line(db, order.id, line).await?;
    }
    let order = recompute_totals(db, order).await?;
    counter!("dealership_orders.created", 1, "kind" => "purchase");
    Ok(order)
}

/// Moves a draft order to `purchase` and opens its receipt.
pub(crate) async fn confirm_in<C: ConnectionTrait>(
    db: &C,
    order: purchase_order::Model,
) -> Result<(purchase_order::Model, picking::Model), ServiceError> {
    if order.state != PurchaseState::Draft {
        return Err(ServiceError::InvalidOperation(
            "Only draft purchase orders can be confirmed.".to_string(),
        ));
    }
    let lines = order_lines(db, order.id).await?;
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "Cannot confirm a Purchase Order without lines.".to_string(),
        ));
    }

    let moves = lines
        .into_iter()
        .map(|line| NewMove {
            product_id: line.product_id,
            name: line.name,
            quantity: line.product_qty,
            purchase_line_id: Some(line.id),
            sale_line_id: None,
            lot_ids: Vec::new(),
        })
        .collect();
    let receipt = pickings::create_picking_in(
        db,
        NewPicking {
            picking_type: PickingType::Incoming,
            location_id: pickings::VENDOR_LOCATION_ID,
            location_dest_id: pickings::STOCK_LOCATION_ID,
            partner_id: Some(order.partner_id),
            origin: Some(order.name.clone()),
            purchase_id: Some(order.id),
            sale_id: None,
            state: PickingState::Assigned,
            scheduled_date: Utc::now(),
            moves,
        },
    )
    .await?;

    let mut active: purchase_order::ActiveModel = order.into();
    active.state = Set(PurchaseState::Purchase);
    active.updated_at = Set(Utc::now());
    Ok((active.update(db).await?, receipt))
}

async fn vendor_name<C: ConnectionTrait>(
    db: &C,
    partner_id: i32,
) -> Result<Option<String>, ServiceError> {
    Ok(partner::Entity::find_by_id(partner_id)
        .one(db)
        .await?
        .map(|p| p.name))
}

#[derive(Clone)]
pub struct PurchaseService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl PurchaseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, currency: String) -> Self {
        Self {
            db_pool,
            event_sender,
            currency,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<PurchaseOrderSummary>, ServiceError> {
        let db = &*self.db_pool;
        let orders = purchase_order::Entity::find()
            .find_also_related(partner::Entity)
            .order_by_desc(purchase_order::Column::Id)
            .all(db)
            .await?;
        Ok(orders
            .into_iter()
            .map(|(order, vendor)| PurchaseOrderSummary {
                id: order.id,
                name: order.name,
                vendor: vendor.map(|v| v.name),
                state: order.state,
                date_order: order.date_order,
                amount_total: order.amount_total,
                currency: order.currency,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, identifier: &str) -> Result<PurchaseOrderDetail, ServiceError> {
        let order = self.find(&*self.db_pool, identifier).await?;
        self.detail(&*self.db_pool, order).await
    }

    async fn find<C: ConnectionTrait>(
        &self,
        db: &C,
        identifier: &str,
    ) -> Result<purchase_order::Model, ServiceError> {
        require_by_identifier::<purchase_order::Entity, _>(db, identifier, "Purchase Order").await
    }

    async fn detail<C: ConnectionTrait>(
        &self,
        db: &C,
        order: purchase_order::Model,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        let mut lines = Vec::new();
        for line in order_lines(db, order.id).await? {
            let product = product::Entity::find_by_id(line.product_id).one(db).await?;
            lines.push(PurchaseLineView {
                line_id: line.id,
                product_id: line.product_id,
                product: product.map(|p| p.name),
                description: line.name,
                quantity: line.product_qty,
                price_unit: line.price_unit,
                tax_id: line.tax_id,
                subtotal: line.price_subtotal,
                tax: line.price_tax,
                total: line.price_total,
                custom_id: line.custom_id,
                date_planned: line.date_planned,
            });
        }
        Ok(PurchaseOrderDetail {
            vendor: vendor_name(db, order.partner_id).await?,
            customs_status: customs::customs_status_for_purchase(db, order.id).await?,
            show_custom_ids_button: customs::show_custom_ids_button(db, order.id).await?,
            order,
            lines,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: CreatePurchaseOrderInput,
    ) -> Result<purchase_order::Model, ServiceError> {
        let (partner_id, lines) = match (input.partner_id, input.order_lines) {
            (Some(partner_id), Some(lines)) if !lines.is_empty() => (partner_id, lines),
            _ => {
                return Err(ServiceError::BadRequest(
                    "partner_id and order_lines required".to_string(),
                ))
            }
        };

        let txn = self.db_pool.begin().await?;
        let order = create_order_in(
            &txn,
            NewPurchaseOrder {
                partner_id,
                date_order: input.date_order.unwrap_or_else(Utc::now),
                notes: input.notes,
                origin: input.origin,
                currency: self.currency.clone(),
                lines,
            },
        )
        .await?;
        txn.commit().await?;

        info!(purchase_order = %order.name, "Purchase Order created");
        self.event_sender
            .send_or_log(Event::PurchaseOrderCreated {
                id: order.id,
                name: order.name.clone(),
            })
            .await;
        Ok(order)
    }

    /// Line-level replace: updates, additions and removals in one pass.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        identifier: &str,
        input: UpdatePurchaseOrderInput,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = self.find(&txn, identifier).await?;
        if matches!(order.state, PurchaseState::Done | PurchaseState::Cancel) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot modify a Purchase Order in state '{}'.",
                order.state
            )));
        }

        for change in input.update_lines {
            let line = self.line_of(&txn, &order, change.line_id).await?;
            let mut active: purchase_order_line::ActiveModel = line.into();
            if let Some(quantity) = change.quantity {
                active.product_qty = Set(quantity);
            }
            if let Some(price_unit) = change.price_unit {
                active.price_unit = Set(price_unit);
            }
            active.update(&txn).await?;
        }
        for new_line in &input.new_lines {
            insert_line(&txn, order.id, new_line).await?;
        }
        for line_id in input.delete_lines {
            let line = self.line_of(&txn, &order, line_id).await?;
            line.delete(&txn).await?;
        }

        let order = recompute_totals(&txn, order).await?;
        let detail = self.detail(&txn, order).await?;
        txn.commit().await?;
        Ok(detail)
    }

    async fn line_of<C: ConnectionTrait>(
        &self,
        db: &C,
        order: &purchase_order::Model,
        line_id: i32,
    ) -> Result<purchase_order_line::Model, ServiceError> {
        purchase_order_line::Entity::find_by_id(line_id)
            .filter(purchase_order_line::Column::OrderId.eq(order.id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Purchase Order line"))
    }

    #[instrument(skip(self, input))]
    pub async fn patch(
        &self,
        identifier: &str,
        input: PatchPurchaseOrderInput,
    ) -> Result<purchase_order::Model, ServiceError> {
        if input.is_empty() {
            return Err(ServiceError::BadRequest(
                "No valid fields to update".to_string(),
            ));
        }
        let txn = self.db_pool.begin().await?;
        let order = self.find(&txn, identifier).await?;
        let mut active: purchase_order::ActiveModel = order.into();
        if let Some(partner_id) = input.partner_id {
            get_by_id::<partner::Entity, _>(&txn, partner_id, "Partner").await?;
            active.partner_id = Set(partner_id);
        }
        if let Some(date_order) = input.date_order {
            active.date_order = Set(date_order);
        }
        if let Some(notes) = input.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;
        txn.commit().await?;
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, identifier: &str) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = self.find(&txn, identifier).await?;
        if order.state != PurchaseState::Draft {
            return Err(ServiceError::InvalidOperation(
                "Only draft purchase orders can be deleted.".to_string(),
            ));
        }
        purchase_order_line::Entity::delete_many()
            .filter(purchase_order_line::Column::OrderId.eq(order.id))
            .exec(&txn)
            .await?;
        order.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        identifier: &str,
    ) -> Result<(purchase_order::Model, picking::Model), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = self.find(&txn, identifier).await?;
        let (order, receipt) = confirm_in(&txn, order).await?;
        txn.commit().await?;

        info!(purchase_order = %order.name, picking = %receipt.name, "Purchase Order confirmed");
        self.event_sender
            .send_or_log(Event::PurchaseOrderConfirmed {
                id: order.id,
                picking_id: receipt.id,
            })
            .await;
        Ok((order, receipt))
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, identifier: &str) -> Result<purchase_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = self.find(&txn, identifier).await?;
        match order.state {
            PurchaseState::Done => {
                return Err(ServiceError::InvalidOperation(
                    "Done purchase orders cannot be cancelled.".to_string(),
                ))
            }
            PurchaseState::Cancel => {
                return Err(ServiceError::InvalidOperation(
                    "Purchase Order is already cancelled.".to_string(),
                ))
            }
            _ => {}
        }
        pickings::cancel_open_pickings(&txn, picking::Column::PurchaseId, order.id).await?;
        let mut active: purchase_order::ActiveModel = order.into();
        active.state = Set(PurchaseState::Cancel);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PurchaseOrderCancelled(order.id))
            .await;
        Ok(order)
    }

    /// Copies the order into a fresh draft named `<base>-RO<n>`.
    #[instrument(skip(self))]
    pub async fn repeat(&self, identifier: &str) -> Result<purchase_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let source = self.find(&txn, identifier).await?;
        if source.is_closed_operation {
            return Err(ServiceError::InvalidOperation(
                "This Purchase Order is closed.".to_string(),
            ));
        }
        let lines = order_lines(&txn, source.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Cannot repeat a Purchase Order without lines.".to_string(),
            ));
        }

        let base = repeat_base(&source.name).to_string();
        let repeats = purchase_order::Entity::find()
            .filter(purchase_order::Column::Name.like(format!("{}{}%", base, REPEAT_MARKER)))
            .count(&txn)
            .await?;

        let order = insert_order(
            &txn,
            source.partner_id,
            Utc::now(),
            source.notes.clone(),
            source.origin.clone(),
            source.currency.clone(),
        )
        .await?;
        let order = rename(&txn, order, format!("{}{}{}", base, REPEAT_MARKER, repeats + 1)).await?;
        for line in lines {
            insert_line(
                &txn,
                order.id,
                &PurchaseLineInput {
                    product_id: line.product_id,
                    name: Some(line.name),
                    quantity: line.product_qty,
                    price_unit: line.price_unit,
                    tax_id: line.tax_id,
                    date_planned: None,
                },
            )
            .await?;
        }
        let order = recompute_totals(&txn, order).await?;
        txn.commit().await?;

        counter!("dealership_orders.created", 1, "kind" => "purchase_repeat");
        info!(source = %source.name, purchase_order = %order.name, "Purchase Order repeated");
        self.event_sender
            .send_or_log(Event::PurchaseOrderRepeated {
                source_id: source.id,
                id: order.id,
                name: order.name.clone(),
            })
            .await;
        Ok(order)
    }

    /// Confirms a draft first, then locks the order as a closed operation.
    #[instrument(skip(self))]
    pub async fn close(&self, identifier: &str) -> Result<purchase_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let mut order = self.find(&txn, identifier).await?;
        if order.state == PurchaseState::Cancel {
            return Err(ServiceError::InvalidOperation(
                "Cancelled purchase orders cannot be closed.".to_string(),
            ));
        }
        if order.state == PurchaseState::Draft {
            order = confirm_in(&txn, order).await?.0;
        }
        let mut active: purchase_order::ActiveModel = order.into();
        active.state = Set(PurchaseState::Done);
        active.is_closed_operation = Set(true);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PurchaseOrderClosed(order.id))
            .await;
        Ok(order)
    }

    /// Receipts opened for the order
    #[instrument(skip(self))]
    pub async fn receipts(&self, identifier: &str) -> Result<Vec<picking::Model>, ServiceError> {
        let db = &*self.db_pool;
        let order = self.find(db, identifier).await?;
        Ok(picking::Entity::find()
            .filter(picking::Column::PurchaseId.eq(order.id))
            .order_by_asc(picking::Column::Id)
            .all(db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("P00012", "P00012")]
    #[case("P00012-RO1", "P00012")]
    #[case("P00012-RO3", "P00012")]
    #[case("", "")]
    fn repeat_base_strips_suffix(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(repeat_base(name), expected);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(PatchPurchaseOrderInput::default().is_empty());
        let patch = PatchPurchaseOrderInput {
            notes: Some("rush".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn line_quantity_defaults_to_one() {
        let line: PurchaseLineInput =
            serde_json::from_value(serde_json::json!({"product_id": 3})).unwrap();
        assert_eq!(line.quantity, Decimal::ONE);
        assert_eq!(line.price_unit, Decimal::ZERO);
    }
}
