use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    common::deserialize_optional_datetime,
    db::DbPool,
    entities::{
        partner,
        picking::{self, PickingState, PickingType},
        product::{self, ProductType, Tracking},
        sale_order::{self, SaleState},
        sale_order_line, sale_order_line_lot, stock_lot,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{get_by_id, lot_repository, require_by_identifier, sequence_name},
    services::{
        pickings::{self, NewMove, NewPicking},
        pricing,
    },
};

fn default_quantity() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleLineInput {
    pub product_id: i32,
    pub name: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    /// Defaults to the product's list price
    pub price_unit: Option<Decimal>,
    pub tax_id: Option<i32>,
    #[serde(default)]
    pub lot_ids: Vec<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSaleOrderInput {
    pub partner_id: Option<i32>,
    pub order_lines: Option<Vec<SaleLineInput>>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_order: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaleLineChange {
    pub line_id: i32,
    pub quantity: Option<Decimal>,
    pub price_unit: Option<Decimal>,
    /// Replaces the selection when present
    pub lot_ids: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSaleOrderInput {
    #[serde(default)]
    pub update_lines: Vec<SaleLineChange>,
    #[serde(default)]
    pub new_lines: Vec<SaleLineInput>,
    #[serde(default)]
    pub delete_lines: Vec<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchSaleOrderInput {
    pub partner_id: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub date_order: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl PatchSaleOrderInput {
    pub fn is_empty(&self) -> bool {
        self.partner_id.is_none() && self.date_order.is_none() && self.note.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleOrderSummary {
    pub id: i32,
    pub name: String,
    pub customer: Option<String>,
    pub state: SaleState,
    pub date_order: DateTime<Utc>,
    pub amount_total: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleLineView {
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
    pub lot_ids: Vec<i32>,
    pub lots: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleOrderDetail {
    #[serde(flatten)]
    pub order: sale_order::Model,
    pub customer: Option<String>,
    pub lines: Vec<SaleLineView>,
}

/// Rejects a lot selection that does not fit the line's product.
pub fn check_lot_selection(
    product: &product::Model,
    lots: &[stock_lot::Model],
) -> Result<(), ServiceError> {
    if lots.is_empty() {
        return Ok(());
    }
    if !product.is_tracked() {
        return Err(ServiceError::ValidationError(format!(
            "Lot selection is only allowed for lot/serial tracked products ('{}').",
            product.name
        )));
    }
    if let Some(foreign) = lots.iter().find(|lot| lot.product_id != product.id) {
        return Err(ServiceError::ValidationError(format!(
            "Lot '{}' does not belong to product '{}'.",
            foreign.name, product.name
        )));
    }
    Ok(())
}

/// Confirmation rules for one line of a car or tracked product.
///
/// Cars and serial tracked products need one lot per unit; lot tracked
/// products need at least one lot.
pub fn check_confirmable_line(
    product: &product::Model,
    quantity: Decimal,
    lots: &[stock_lot::Model],
) -> Result<(), ServiceError> {
    let per_unit = product.is_car || product.tracking == Tracking::Serial;
    if !per_unit {
        if product.tracking == Tracking::Lot && lots.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Lot required for product '{}'.",
                product.name
            )));
        }
        return Ok(());
    }
    if lots.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "Serial Number required for '{}'.",
            product.name
        )));
    }
    if Decimal::from(lots.len() as i64) != quantity {
        return Err(ServiceError::ValidationError(
            "Quantity must match number of serial numbers.".to_string(),
        ));
    }
    if product.is_car {
        let missing: Vec<&str> = lots
            .iter()
            .filter(|lot| lot.custom_id.is_none())
            .map(|lot| lot.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Serial(s) without Customs ID:\n{}",
                missing.join(", ")
            )));
        }
    }
    Ok(())
}

async fn line_lot_ids<C: ConnectionTrait>(db: &C, line_id: i32) -> Result<Vec<i32>, ServiceError> {
    Ok(sale_order_line_lot::Entity::find()
        .filter(sale_order_line_lot::Column::SaleLineId.eq(line_id))
        .order_by_asc(sale_order_line_lot::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.lot_id)
        .collect())
}

async fn load_lots<C: ConnectionTrait>(
    db: &C,
    lot_ids: &[i32],
) -> Result<Vec<stock_lot::Model>, ServiceError> {
    let found = lot_repository::lots_by_id(db, lot_ids).await?;
    lot_ids
        .iter()
        .map(|id| {
            found
                .get(id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(format!("Lot {} not found", id)))
        })
        .collect()
}

async fn order_lines<C: ConnectionTrait>(
    db: &C,
    order_id: i32,
) -> Result<Vec<sale_order_line::Model>, ServiceError> {
    Ok(sale_order_line::Entity::find()
        .filter(sale_order_line::Column::OrderId.eq(order_id))
        .order_by_asc(sale_order_line::Column::Id)
        .all(db)
        .await?)
}

/// A lot may be selected once per order and on no other live order.
async fn check_lot_reuse<C: ConnectionTrait>(
    db: &C,
    line: &sale_order_line::Model,
    lots: &[stock_lot::Model],
) -> Result<(), ServiceError> {
    if lots.is_empty() {
        return Ok(());
    }
    let lot_ids: Vec<i32> = lots.iter().map(|lot| lot.id).collect();
    let other_links = sale_order_line_lot::Entity::find()
        .filter(sale_order_line_lot::Column::LotId.is_in(lot_ids))
        .filter(sale_order_line_lot::Column::SaleLineId.ne(line.id))
        .order_by_asc(sale_order_line_lot::Column::Id)
        .all(db)
        .await?;
    if other_links.is_empty() {
        return Ok(());
    }

    let sibling_ids: HashSet<i32> = order_lines(db, line.order_id)
        .await?
        .into_iter()
        .map(|l| l.id)
        .collect();
    let mut duplicates: Vec<&str> = lots
        .iter()
        .filter(|lot| {
            other_links
                .iter()
                .any(|link| link.lot_id == lot.id && sibling_ids.contains(&link.sale_line_id))
        })
        .map(|lot| lot.name.as_str())
        .collect();
    if !duplicates.is_empty() {
        duplicates.sort_unstable();
        return Err(ServiceError::ValidationError(format!(
            "Lot/Serial already selected on another line: {}",
            duplicates.join(", ")
        )));
    }

    for link in other_links {
        let Some(other_line) = sale_order_line::Entity::find_by_id(link.sale_line_id)
            .one(db)
            .await?
        else {
            continue;
        };
        let other_order =
            get_by_id::<sale_order::Entity, _>(db, other_line.order_id, "Sale Order").await?;
        if other_order.state == SaleState::Cancel {
            continue;
        }
        let lot_name = lots
            .iter()
            .find(|lot| lot.id == link.lot_id)
            .map(|lot| lot.name.clone())
            .unwrap_or_default();
        return Err(ServiceError::ValidationError(format!(
            "Serial '{}' already used in Sale Order '{}'.",
            lot_name, other_order.name
        )));
    }
    Ok(())
}

/// Replaces a line's lot selection after validating it.
async fn set_line_lots<C: ConnectionTrait>(
    db: &C,
    line: &sale_order_line::Model,
    product: &product::Model,
    lot_ids: &[i32],
) -> Result<(), ServiceError> {
    let lots = load_lots(db, lot_ids).await?;
    check_lot_selection(product, &lots)?;
    check_lot_reuse(db, line, &lots).await?;

    sale_order_line_lot::Entity::delete_many()
        .filter(sale_order_line_lot::Column::SaleLineId.eq(line.id))
        .exec(db)
        .await?;
    let mut seen = HashSet::new();
    for lot in lots {
        if !seen.insert(lot.id) {
            continue;
        }
        sale_order_line_lot::ActiveModel {
            sale_line_id: Set(line.id),
            lot_id: Set(lot.id),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn insert_line<C: ConnectionTrait>(
    db: &C,
    order_id: i32,
    input: &SaleLineInput,
) -> Result<sale_order_line::Model, ServiceError> {
    let product = product::Entity::find_by_id(input.product_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::BadRequest(format!("Invalid product_id {}", input.product_id)))?;
    if product.is_car {
        let duplicate = sale_order_line::Entity::find()
            .filter(sale_order_line::Column::OrderId.eq(order_id))
            .filter(sale_order_line::Column::ProductId.eq(product.id))
            .one(db)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "Car product '{}' cannot be added twice in the same Sale Order.",
                product.name
            )));
        }
    }
    let price_unit = input.price_unit.unwrap_or(product.list_price);
    let tax = pricing::load_tax(db, input.tax_id).await?;
    let amounts = pricing::line_amounts(input.quantity, price_unit, tax.as_ref());
    let line = sale_order_line::ActiveModel {
        order_id: Set(order_id),
        product_id: Set(product.id),
        name: Set(input.name.clone().unwrap_or_else(|| product.name.clone())),
        product_uom_qty: Set(input.quantity),
        price_unit: Set(price_unit),
        tax_id: Set(input.tax_id),
        price_subtotal: Set(amounts.subtotal),
        price_tax: Set(amounts.tax),
        price_total: Set(amounts.total),
        ..Default::default()
    }
    .insert(db)
    .await?;
    set_line_lots(db, &line, &product, &input.lot_ids).await?;
    Ok(line)
}

async fn recompute_totals<C: ConnectionTrait>(
    db: &C,
    order: sale_order::Model,
) -> Result<sale_order::Model, ServiceError> {
    let mut amounts = Vec::new();
    for line in order_lines(db, order.id).await? {
        let tax = pricing::load_tax(db, line.tax_id).await?;
        let line_amounts =
            pricing::line_amounts(line.product_uom_qty, line.price_unit, tax.as_ref());
        let mut active: sale_order_line::ActiveModel = line.into();
        active.price_subtotal = Set(line_amounts.subtotal);
        active.price_tax = Set(line_amounts.tax);
        active.price_total = Set(line_amounts.total);
        active.update(db).await?;
        amounts.push(line_amounts);
    }
    let totals = pricing::order_totals(&amounts);

    let mut active: sale_order::ActiveModel = order.into();
    active.amount_untaxed = Set(totals.untaxed);
    active.amount_tax = Set(totals.tax);
    active.amount_total = Set(totals.total);
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

#[derive(Clone)]
pub struct SaleService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl SaleService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, currency: String) -> Self {
        Self {
            db_pool,
            event_sender,
            currency,
        }
    }

    async fn find<C: ConnectionTrait>(
        &self,
        db: &C,
        identifier: &str,
    ) -> Result<sale_order::Model, ServiceError> {
        require_by_identifier::<sale_order::Entity, _>(db, identifier, "Sale Order").await
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<SaleOrderSummary>, ServiceError> {
        let orders = sale_order::Entity::find()
            .find_also_related(partner::Entity)
            .order_by_desc(sale_order::Column::Id)
            .all(&*self.db_pool)
            .await?;
        Ok(orders
            .into_iter()
            .map(|(order, customer)| SaleOrderSummary {
                id: order.id,
                name: order.name,
                customer: customer.map(|c| c.name),
                state: order.state,
                date_order: order.date_order,
                amount_total: order.amount_total,
                currency: order.currency,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, identifier: &str) -> Result<SaleOrderDetail, ServiceError> {
        let order = self.find(&*self.db_pool, identifier).await?;
        self.detail(&*self.db_pool, order).await
    }

    async fn detail<C: ConnectionTrait>(
        &self,
        db: &C,
        order: sale_order::Model,
    ) -> Result<SaleOrderDetail, ServiceError> {
        let mut lines = Vec::new();
        for line in order_lines(db, order.id).await? {
            let product = product::Entity::find_by_id(line.product_id).one(db).await?;
            let lot_ids = line_lot_ids(db, line.id).await?;
            let lots = load_lots(db, &lot_ids).await?;
            lines.push(SaleLineView {
                line_id: line.id,
                product_id: line.product_id,
                product: product.map(|p| p.name),
                description: line.name,
                quantity: line.product_uom_qty,
                price_unit: line.price_unit,
                tax_id: line.tax_id,
                subtotal: line.price_subtotal,
                tax: line.price_tax,
                total: line.price_total,
                lot_ids,
                lots: lots.into_iter().map(|lot| lot.name).collect(),
            });
        }
        let customer = partner::Entity::find_by_id(order.partner_id)
            .one(db)
            .await?
            .map(|p| p.name);
        Ok(SaleOrderDetail {
            order,
            customer,
            lines,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: CreateSaleOrderInput,
    ) -> Result<sale_order::Model, ServiceError> {
        let (partner_id, lines) = match (input.partner_id, input.order_lines) {
            (Some(partner_id), Some(lines)) if !lines.is_empty() => (partner_id, lines),
            _ => {
                return Err(ServiceError::BadRequest(
                    "partner_id and order_lines required".to_string(),
                ))
            }
        };

        let txn = self.db_pool.begin().await?;
        get_by_id::<partner::Entity, _>(&txn, partner_id, "Partner").await?;
        let now = Utc::now();
        let order = sale_order::ActiveModel {
            name: Set(format!("S/draft/{}", uuid::Uuid::new_v4())),
            partner_id: Set(partner_id),
            state: Set(SaleState::Draft),
            date_order: Set(input.date_order.unwrap_or(now)),
            note: Set(input.note),
            currency: Set(self.currency.clone()),
            amount_untaxed: Set(Decimal::ZERO),
            amount_tax: Set(Decimal::ZERO),
            amount_total: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        let name = sequence_name("S", order.id);
        let mut active: sale_order::ActiveModel = order.into();
        active.name = Set(name);
        let order = active.update(&txn).await?;

        for line in &lines {
            insert_line(&txn, order.id, line).await?;
        }
        let order = recompute_totals(&txn, order).await?;
        txn.commit().await?;

        counter!("dealership_orders.created", 1, "kind" => "sale");
        info!(sale_order = %order.name, "Sale Order created");
        self.event_sender
            .send_or_log(Event::SaleOrderCreated {
                id: order.id,
                name: order.name.clone(),
            })
            .await;
        Ok(order)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        identifier: &str,
        input: UpdateSaleOrderInput,
    ) -> Result<SaleOrderDetail, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = self.find(&txn, identifier).await?;
        if matches!(order.state, SaleState::Done | SaleState::Cancel) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot modify a Sale Order in state '{}'.",
                order.state
            )));
        }

        for line_id in input.delete_lines {
            let line = self.line_of(&txn, &order, line_id).await?;
            sale_order_line_lot::Entity::delete_many()
                .filter(sale_order_line_lot::Column::SaleLineId.eq(line.id))
                .exec(&txn)
                .await?;
            line.delete(&txn).await?;
        }
        for change in input.update_lines {
            let line = self.line_of(&txn, &order, change.line_id).await?;
            if let Some(lot_ids) = &change.lot_ids {
                let product =
                    get_by_id::<product::Entity, _>(&txn, line.product_id, "Product").await?;
                set_line_lots(&txn, &line, &product, lot_ids).await?;
            }
            let mut active: sale_order_line::ActiveModel = line.into();
            if let Some(quantity) = change.quantity {
                active.product_uom_qty = Set(quantity);
            }
            if let Some(price_unit) = change.price_unit {
                active.price_unit = Set(price_unit);
            }
            active.update(&txn).await?;
        }
        for new_line in &input.new_lines {
            insert_line(&txn, order.id, new_line).await?;
        }

        let order = recompute_totals(&txn, order).await?;
        let detail = self.detail(&txn, order).await?;
        txn.commit().await?;
        Ok(detail)
    }

    async fn line_of<C: ConnectionTrait>(
        &self,
        db: &C,
        order: &sale_order::Model,
        line_id: i32,
    ) -> Result<sale_order_line::Model, ServiceError> {
        sale_order_line::Entity::find_by_id(line_id)
            .filter(sale_order_line::Column::OrderId.eq(order.id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale Order line"))
    }

    #[instrument(skip(self, input))]
    pub async fn patch(
        &self,
        identifier: &str,
        input: PatchSaleOrderInput,
    ) -> Result<sale_order::Model, ServiceError> {
        if input.is_empty() {
            return Err(ServiceError::BadRequest(
                "No valid fields to update".to_string(),
            ));
        }
        let txn = self.db_pool.begin().await?;
        let order = self.find(&txn, identifier).await?;
        let mut active: sale_order::ActiveModel = order.into();
        if let Some(partner_id) = input.partner_id {
            get_by_id::<partner::Entity, _>(&txn, partner_id, "Partner").await?;
            active.partner_id = Set(partner_id);
        }
        if let Some(date_order) = input.date_order {
            active.date_order = Set(date_order);
        }
        if let Some(note) = input.note {
            active.note = Set(Some(note));
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
        if order.state != SaleState::Draft {
            return Err(ServiceError::InvalidOperation(
                "Only draft sale orders can be deleted.".to_string(),
            ));
        }
        for line in order_lines(&txn, order.id).await? {
            sale_order_line_lot::Entity::delete_many()
                .filter(sale_order_line_lot::Column::SaleLineId.eq(line.id))
                .exec(&txn)
                .await?;
            line.delete(&txn).await?;
        }
        order.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Checks the car lot rules, then opens a delivery with the selected lots reserved.
    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        identifier: &str,
    ) -> Result<(sale_order::Model, Option<picking::Model>), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = self.find(&txn, identifier).await?;
        if order.state != SaleState::Draft {
            return Err(ServiceError::InvalidOperation(
                "Only draft sale orders can be confirmed.".to_string(),
            ));
        }
        let lines = order_lines(&txn, order.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cannot confirm a Sale Order without lines.".to_string(),
            ));
        }

        let mut moves = Vec::new();
        for line in lines {
            let product =
                get_by_id::<product::Entity, _>(&txn, line.product_id, "Product").await?;
            let lot_ids = line_lot_ids(&txn, line.id).await?;
            let lots = load_lots(&txn, &lot_ids).await?;
            check_confirmable_line(&product, line.product_uom_qty, &lots)?;
            check_lot_reuse(&txn, &line, &lots).await?;

            if product.product_type == ProductType::Goods {
                moves.push(NewMove {
                    product_id: product.id,
                    name: line.name,
                    quantity: line.product_uom_qty,
                    purchase_line_id: None,
                    sale_line_id: Some(line.id),
                    lot_ids,
                });
            }
        }

        let delivery = if moves.is_empty() {
            None
        } else {
            Some(
                pickings::create_picking_in(
                    &txn,
                    NewPicking {
                        picking_type: PickingType::Outgoing,
                        location_id: pickings::STOCK_LOCATION_ID,
                        location_dest_id: pickings::CUSTOMER_LOCATION_ID,
                        partner_id: Some(order.partner_id),
                        origin: Some(order.name.clone()),
                        purchase_id: None,
                        sale_id: Some(order.id),
                        state: PickingState::Assigned,
                        scheduled_date: Utc::now(),
                        moves,
                    },
                )
                .await?,
            )
        };

        let mut active: sale_order::ActiveModel = order.into();
        active.state = Set(SaleState::Sale);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;
        txn.commit().await?;

        info!(sale_order = %order.name, "Sale Order confirmed");
        self.event_sender
            .send_or_log(Event::SaleOrderConfirmed {
                id: order.id,
                picking_id: delivery.as_ref().map(|p| p.id),
            })
            .await;
        Ok((order, delivery))
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, identifier: &str) -> Result<sale_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = self.find(&txn, identifier).await?;
        match order.state {
            SaleState::Done => {
                return Err(ServiceError::InvalidOperation(
                    "Done sale orders cannot be cancelled.".to_string(),
                ))
            }
            SaleState::Cancel => {
                return Err(ServiceError::InvalidOperation(
                    "Sale Order is already cancelled.".to_string(),
                ))
            }
            _ => {}
        }
        pickings::cancel_open_pickings(&txn, picking::Column::SaleId, order.id).await?;
        let mut active: sale_order::ActiveModel = order.into();
        active.state = Set(SaleState::Cancel);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::SaleOrderCancelled(order.id))
            .await;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn product(is_car: bool, tracking: Tracking) -> product::Model {
        product::Model {
            id: 7,
            name: "Coupe".into(),
            default_code: None,
            list_price: dec!(25000),
            standard_price: dec!(20000),
            product_type: ProductType::Goods,
            tracking,
            is_car,
            created_at: Utc::now(),
        }
    }

    fn lot(id: i32, name: &str, custom_id: Option<&str>) -> stock_lot::Model {
        stock_lot::Model {
            id,
            name: name.into(),
            product_id: 7,
            custom_id: custom_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn car_line_needs_a_lot_per_unit() {
        let car = product(true, Tracking::Serial);
        let err = check_confirmable_line(&car, dec!(2), &[lot(1, "VIN-1", Some("C1"))])
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(ref m) if m == "Quantity must match number of serial numbers.");

        let err = check_confirmable_line(&car, dec!(1), &[]).unwrap_err();
        assert_eq!(err.to_string(), "Serial Number required for 'Coupe'.");
    }

    #[test]
    fn car_lots_need_customs_ids() {
        let car = product(true, Tracking::Serial);
        let lots = [lot(1, "VIN-1", None), lot(2, "VIN-2", None), lot(3, "VIN-3", Some("C3"))];
        let err = check_confirmable_line(&car, dec!(3), &lots).unwrap_err();
        assert_eq!(err.to_string(), "Serial(s) without Customs ID:\nVIN-1, VIN-2");
    }

    #[test]
    fn lot_tracked_lines_need_a_lot_but_not_one_per_unit() {
        let tyres = product(false, Tracking::Lot);
        assert!(check_confirmable_line(&tyres, dec!(4), &[lot(1, "BATCH-1", None)]).is_ok());

        let err = check_confirmable_line(&tyres, dec!(4), &[]).unwrap_err();
        assert_eq!(err.to_string(), "Lot required for product 'Coupe'.");
    }

    #[test]
    fn serial_tracked_non_car_lines_need_a_lot_per_unit() {
        let key_fob = product(false, Tracking::Serial);
        let err = check_confirmable_line(&key_fob, dec!(2), &[lot(1, "FOB-1", None)]).unwrap_err();
        assert_eq!(err.to_string(), "Quantity must match number of serial numbers.");
    }

    #[test]
    fn untracked_lines_are_not_checked() {
        let plain = product(false, Tracking::None);
        assert!(check_confirmable_line(&plain, dec!(4), &[]).is_ok());
    }

    #[test]
    fn lot_selection_requires_tracking_and_matching_product() {
        let plain = product(false, Tracking::None);
        assert!(check_lot_selection(&plain, &[lot(1, "L1", None)]).is_err());

        let car = product(true, Tracking::Serial);
        let mut foreign = lot(2, "L2", None);
        foreign.product_id = 99;
        let err = check_lot_selection(&car, &[foreign]).unwrap_err();
        assert_eq!(err.to_string(), "Lot 'L2' does not belong to product 'Coupe'.");
        assert!(check_lot_selection(&car, &[lot(3, "L3", None)]).is_ok());
    }
}
