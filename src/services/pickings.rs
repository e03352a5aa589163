use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    common::deserialize_optional_datetime,
    db::DbPool,
    entities::{
        picking::{self, PickingState, PickingType},
        product::{self, Tracking},
        sale_order_line_lot, stock_lot, stock_move, stock_move_line,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{get_by_id, lot_repository, require_by_identifier, sequence_name},
};

pub const STOCK_LOCATION_ID: i32 = 8;
pub const VENDOR_LOCATION_ID: i32 = 4;
pub const CUSTOMER_LOCATION_ID: i32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct MoveInput {
    pub product_id: i32,
    pub quantity: Decimal,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePickingInput {
    pub picking_type: Option<PickingType>,
    pub location_id: Option<i32>,
    pub location_dest_id: Option<i32>,
    pub partner_id: Option<i32>,
    pub origin: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub scheduled_date: Option<DateTime<Utc>>,
    pub moves: Option<Vec<MoveInput>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveQuantityInput {
    pub move_id: i32,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePickingInput {
    #[serde(default)]
    pub update_moves: Vec<MoveQuantityInput>,
    #[serde(default)]
    pub new_moves: Vec<MoveInput>,
    #[serde(default)]
    pub delete_moves: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveLotsInput {
    pub move_id: i32,
    #[serde(default)]
    pub lot_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidatePickingInput {
    #[serde(default)]
    pub moves: Vec<MoveLotsInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveView {
    #[serde(flatten)]
    pub stock_move: stock_move::Model,
    pub lots: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PickingDetail {
    #[serde(flatten)]
    pub picking: picking::Model,
    pub moves: Vec<MoveView>,
}

/// A move to create alongside its picking
#[derive(Debug, Clone)]
pub(crate) struct NewMove {
    pub product_id: i32,
    pub name: String,
    pub quantity: Decimal,
    pub purchase_line_id: Option<i32>,
    pub sale_line_id: Option<i32>,
    /// Prefilled reservations, one move line per lot
    pub lot_ids: Vec<i32>,
}

#[derive(Debug, Clone)]
pub(crate) struct NewPicking {
    pub picking_type: PickingType,
    pub location_id: i32,
    pub location_dest_id: i32,
    pub partner_id: Option<i32>,
    pub origin: Option<String>,
    pub purchase_id: Option<i32>,
    pub sale_id: Option<i32>,
    pub state: PickingState,
    pub scheduled_date: DateTime<Utc>,
    pub moves: Vec<NewMove>,
}

/// Compares delivered lots with the lots sold on the sale line.
///
/// Returns the rejection message when the sets differ; names are listed sorted.
pub fn delivery_mismatch(product: &str, delivered: &[String], selected: &[String]) -> Option<String> {
    let delivered: BTreeSet<&str> = delivered.iter().map(String::as_str).collect();
    let selected: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
    if delivered == selected {
        return None;
    }

    let missing: Vec<&str> = selected.difference(&delivered).copied().collect();
    let extra: Vec<&str> = delivered.difference(&selected).copied().collect();

    let mut message = format!(
        "Delivery lots for {} must match selected lots on the Sale Order.",
        product
    );
    if !missing.is_empty() {
        message.push_str(&format!("\nMissing: {}", missing.join(", ")));
    }
    if !extra.is_empty() {
        message.push_str(&format!("\nExtra: {}", extra.join(", ")));
    }
    Some(message)
}

async fn insert_move<C: ConnectionTrait>(
    db: &C,
    picking: &picking::Model,
    new_move: NewMove,
) -> Result<stock_move::Model, ServiceError> {
    let created = stock_move::ActiveModel {
        picking_id: Set(picking.id),
        product_id: Set(new_move.product_id),
        name: Set(new_move.name),
        product_uom_qty: Set(new_move.quantity),
        quantity: Set(Decimal::ZERO),
        state: Set(picking.state),
        purchase_line_id: Set(new_move.purchase_line_id),
        sale_line_id: Set(new_move.sale_line_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    for lot_id in new_move.lot_ids {
        stock_move_line::ActiveModel {
            move_id: Set(created.id),
            picking_id: Set(picking.id),
            product_id: Set(created.product_id),
            lot_id: Set(Some(lot_id)),
            quantity: Set(Decimal::ONE),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(created)
}

/// Inserts a picking and its moves, naming it from the picking type sequence.
pub(crate) async fn create_picking_in<C: ConnectionTrait>(
    db: &C,
    new_picking: NewPicking,
) -> Result<picking::Model, ServiceError> {
    let now = Utc::now();
    let draft = picking::ActiveModel {
        name: Set(format!("WH/draft/{}", uuid::Uuid::new_v4())),
        picking_type: Set(new_picking.picking_type),
        location_id: Set(new_picking.location_id),
        location_dest_id: Set(new_picking.location_dest_id),
        partner_id: Set(new_picking.partner_id),
        origin: Set(new_picking.origin),
        purchase_id: Set(new_picking.purchase_id),
        sale_id: Set(new_picking.sale_id),
        state: Set(new_picking.state),
        scheduled_date: Set(new_picking.scheduled_date),
        date_done: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let name = sequence_name(new_picking.picking_type.sequence_prefix(), draft.id);
    let mut active: picking::ActiveModel = draft.into();
    active.name = Set(name);
    let picking = active.update(db).await?;

    for new_move in new_picking.moves {
        insert_move(db, &picking, new_move).await?;
    }
    Ok(picking)
}

/// Cancels every picking of an order that is not done yet.
pub(crate) async fn cancel_open_pickings<C: ConnectionTrait>(
    db: &C,
    column: picking::Column,
    order_id: i32,
) -> Result<usize, ServiceError> {
    let open = picking::Entity::find()
        .filter(column.eq(order_id))
        .filter(picking::Column::State.is_not_in([PickingState::Done, PickingState::Cancel]))
        .all(db)
        .await?;
    let count = open.len();
    for picking in open {
        let moves = stock_move::Entity::find()
            .filter(stock_move::Column::PickingId.eq(picking.id))
            .all(db)
            .await?;
        for stock_move in moves {
            let mut active: stock_move::ActiveModel = stock_move.into();
            active.state = Set(PickingState::Cancel);
            active.update(db).await?;
        }
        let mut active: picking::ActiveModel = picking.into();
        active.state = Set(PickingState::Cancel);
        active.update(db).await?;
    }
    Ok(count)
}

async fn move_lot_names<C: ConnectionTrait>(
    db: &C,
    move_id: i32,
) -> Result<Vec<String>, ServiceError> {
    let lot_ids: Vec<i32> = stock_move_line::Entity::find()
        .filter(stock_move_line::Column::MoveId.eq(move_id))
        .order_by_asc(stock_move_line::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|line| line.lot_id)
        .collect();
    let lots = lot_repository::lots_by_id(db, &lot_ids).await?;
    Ok(lot_ids
        .iter()
        .filter_map(|id| lots.get(id).map(|lot| lot.name.clone()))
        .collect())
}

pub(crate) async fn picking_detail<C: ConnectionTrait>(
    db: &C,
    picking: picking::Model,
) -> Result<PickingDetail, ServiceError> {
    let moves = stock_move::Entity::find()
        .filter(stock_move::Column::PickingId.eq(picking.id))
        .order_by_asc(stock_move::Column::Id)
        .all(db)
        .await?;
    let mut views = Vec::with_capacity(moves.len());
    for stock_move in moves {
        let lots = move_lot_names(db, stock_move.id).await?;
        views.push(MoveView { stock_move, lots });
    }
    Ok(PickingDetail {
        picking,
        moves: views,
    })
}

async fn product_move<C: ConnectionTrait>(
    db: &C,
    input: MoveInput,
) -> Result<NewMove, ServiceError> {
    let product = get_by_id::<product::Entity, _>(db, input.product_id, "Product").await?;
    if input.quantity <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Move quantity must be greater than 0.".to_string(),
        ));
    }
    Ok(NewMove {
        product_id: product.id,
        name: input.name.unwrap_or(product.name),
        quantity: input.quantity,
        purchase_line_id: None,
        sale_line_id: None,
        lot_ids: Vec::new(),
    })
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, ServiceError> {
    value.ok_or_else(|| ServiceError::BadRequest(format!("{} is required", field)))
}

/// Resolves the lot names entered for one move into lot ids.
async fn resolve_lots<C: ConnectionTrait>(
    db: &C,
    picking: &picking::Model,
    product: &product::Model,
    names: &[String],
) -> Result<Vec<i32>, ServiceError> {
    if !product.is_tracked() {
        return Err(ServiceError::ValidationError(format!(
            "Product '{}' is not tracked by lots.",
            product.name
        )));
    }
    let mut ids = Vec::with_capacity(names.len());
    for raw in names {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        let lot = match lot_repository::lot_by_name(db, product.id, name).await? {
            Some(lot) => lot,
            None if picking.picking_type == PickingType::Incoming => {
                stock_lot::ActiveModel {
                    name: Set(name.to_string()),
                    product_id: Set(product.id),
                    custom_id: Set(None),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(db)
                .await?
            }
            None => {
                return Err(ServiceError::ValidationError(format!(
                    "Lot '{}' not found for product '{}'.",
                    name, product.name
                )));
            }
        };
        if ids.contains(&lot.id) {
            return Err(ServiceError::ValidationError(format!(
                "Lot '{}' entered twice for product '{}'.",
                lot.name, product.name
            )));
        }
        ids.push(lot.id);
    }
    Ok(ids)
}

/// Replaces the move's lines with one line per entered lot.
async fn replace_move_lines<C: ConnectionTrait>(
    db: &C,
    stock_move: &stock_move::Model,
    product: &product::Model,
    lot_ids: &[i32],
) -> Result<(), ServiceError> {
    stock_move_line::Entity::delete_many()
        .filter(stock_move_line::Column::MoveId.eq(stock_move.id))
        .exec(db)
        .await?;
    if lot_ids.is_empty() {
        return Ok(());
    }
    let per_lot = match product.tracking {
        Tracking::Serial => Decimal::ONE,
        _ => stock_move.product_uom_qty / Decimal::from(lot_ids.len() as i64),
    };
    for lot_id in lot_ids {
        stock_move_line::ActiveModel {
            move_id: Set(stock_move.id),
            picking_id: Set(stock_move.picking_id),
            product_id: Set(stock_move.product_id),
            lot_id: Set(Some(*lot_id)),
            quantity: Set(per_lot),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Serial tracking needs one lot per unit, lot tracking at least one lot.
fn check_tracking(
    product: &product::Model,
    demand: Decimal,
    lot_count: usize,
) -> Result<(), ServiceError> {
    match product.tracking {
        Tracking::Serial if Decimal::from(lot_count as i64) != demand => {
            Err(ServiceError::ValidationError(format!(
                "Product '{}' needs {} serial numbers, got {}.",
                product.name,
                demand.normalize(),
                lot_count
            )))
        }
        Tracking::Lot if lot_count == 0 => Err(ServiceError::ValidationError(format!(
            "Lot required for product '{}'.",
            product.name
        ))),
        _ => Ok(()),
    }
}

async fn selected_lot_names<C: ConnectionTrait>(
    db: &C,
    sale_line_id: i32,
) -> Result<Vec<String>, ServiceError> {
    let lot_ids: Vec<i32> = sale_order_line_lot::Entity::find()
        .filter(sale_order_line_lot::Column::SaleLineId.eq(sale_line_id))
        .order_by_asc(sale_order_line_lot::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.lot_id)
        .collect();
    let lots = lot_repository::lots_by_id(db, &lot_ids).await?;
    Ok(lot_ids
        .iter()
        .filter_map(|id| lots.get(id).map(|lot| lot.name.clone()))
        .collect())
}

/// Inventory transfers
#[derive(Clone)]
pub struct PickingService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl PickingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<picking::Model>, ServiceError> {
        Ok(picking::Entity::find()
            .order_by_desc(picking::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, identifier: &str) -> Result<PickingDetail, ServiceError> {
        let picking =
            require_by_identifier::<picking::Entity, _>(&*self.db_pool, identifier, "Picking")
                .await?;
        picking_detail(&*self.db_pool, picking).await
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreatePickingInput) -> Result<picking::Model, ServiceError> {
        let picking_type = require(input.picking_type, "picking_type")?;
        let location_id = require(input.location_id, "location_id")?;
        let location_dest_id = require(input.location_dest_id, "location_dest_id")?;
        let moves = require(input.moves, "moves")?;

        let txn = self.db_pool.begin().await?;
        let mut new_moves = Vec::with_capacity(moves.len());
        for move_input in moves {
            new_moves.push(product_move(&txn, move_input).await?);
        }
        let picking = create_picking_in(
            &txn,
            NewPicking {
                picking_type,
                location_id,
                location_dest_id,
                partner_id: input.partner_id,
                origin: input.origin,
                purchase_id: None,
                sale_id: None,
                state: PickingState::Draft,
                scheduled_date: input.scheduled_date.unwrap_or_else(Utc::now),
                moves: new_moves,
            },
        )
        .await?;
        txn.commit().await?;

        info!(picking = %picking.name, "Picking created");
        self.event_sender
            .send_or_log(Event::PickingCreated {
                id: picking.id,
                name: picking.name.clone(),
            })
            .await;
        Ok(picking)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        identifier: &str,
        input: UpdatePickingInput,
    ) -> Result<PickingDetail, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let picking =
            require_by_identifier::<picking::Entity, _>(&txn, identifier, "Picking").await?;
        if picking.state != PickingState::Draft {
            return Err(ServiceError::InvalidOperation(
                "Only draft pickings can be updated".to_string(),
            ));
        }

        for change in input.update_moves {
            let stock_move = self.move_of(&txn, &picking, change.move_id).await?;
            let mut active: stock_move::ActiveModel = stock_move.into();
            active.product_uom_qty = Set(change.quantity);
            active.update(&txn).await?;
        }
        for move_input in input.new_moves {
            let new_move = product_move(&txn, move_input).await?;
            insert_move(&txn, &picking, new_move).await?;
        }
        for move_id in input.delete_moves {
            let stock_move = self.move_of(&txn, &picking, move_id).await?;
            stock_move_line::Entity::delete_many()
                .filter(stock_move_line::Column::MoveId.eq(stock_move.id))
                .exec(&txn)
                .await?;
            stock_move.delete(&txn).await?;
        }

        let detail = picking_detail(&txn, picking).await?;
        txn.commit().await?;
        Ok(detail)
    }

    async fn move_of<C: ConnectionTrait>(
        &self,
        db: &C,
        picking: &picking::Model,
        move_id: i32,
    ) -> Result<stock_move::Model, ServiceError> {
        stock_move::Entity::find_by_id(move_id)
            .filter(stock_move::Column::PickingId.eq(picking.id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Move"))
    }

    /// Confirms, reserves, applies entered lots and marks the transfer done.
    #[instrument(skip(self, input))]
    pub async fn validate(
        &self,
        id: i32,
        input: ValidatePickingInput,
    ) -> Result<PickingDetail, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let picking = get_by_id::<picking::Entity, _>(&txn, id, "Picking").await?;
        match picking.state {
            PickingState::Done => {
                return Err(ServiceError::InvalidOperation(
                    "Picking is already done.".to_string(),
                ))
            }
            PickingState::Cancel => {
                return Err(ServiceError::InvalidOperation(
                    "Cancelled pickings cannot be validated.".to_string(),
                ))
            }
            _ => {}
        }

        let moves = stock_move::Entity::find()
            .filter(stock_move::Column::PickingId.eq(picking.id))
            .order_by_asc(stock_move::Column::Id)
            .all(&txn)
            .await?;
        if moves.is_empty() {
            return Err(ServiceError::ValidationError(
                "Nothing to validate: the picking has no moves.".to_string(),
            ));
        }

        let entered: HashMap<i32, Vec<String>> = input
            .moves
            .into_iter()
            .map(|entry| (entry.move_id, entry.lot_names))
            .collect();
        if let Some(unknown) = entered.keys().find(|id| !moves.iter().any(|m| m.id == **id)) {
            return Err(ServiceError::NotFound(format!(
                "Move {} not found in picking",
                unknown
            )));
        }

        for stock_move in moves {
            let product =
                get_by_id::<product::Entity, _>(&txn, stock_move.product_id, "Product").await?;

            if let Some(names) = entered.get(&stock_move.id) {
                let lot_ids = resolve_lots(&txn, &picking, &product, names).await?;
                replace_move_lines(&txn, &stock_move, &product, &lot_ids).await?;
            }

            let delivered = move_lot_names(&txn, stock_move.id).await?;
            check_tracking(&product, stock_move.product_uom_qty, delivered.len())?;

            if picking.picking_type == PickingType::Outgoing && product.is_car {
                if let Some(sale_line_id) = stock_move.sale_line_id {
                    let selected = selected_lot_names(&txn, sale_line_id).await?;
                    if !selected.is_empty() {
                        if let Some(message) =
                            delivery_mismatch(&product.name, &delivered, &selected)
                        {
                            return Err(ServiceError::ValidationError(message));
                        }
                    }
                }
            }

            let demand = stock_move.product_uom_qty;
            let mut active: stock_move::ActiveModel = stock_move.into();
            active.quantity = Set(demand);
            active.state = Set(PickingState::Done);
            active.update(&txn).await?;
        }

        let mut active: picking::ActiveModel = picking.into();
        active.state = Set(PickingState::Done);
        active.date_done = Set(Some(Utc::now()));
        let picking = active.update(&txn).await?;
        let detail = picking_detail(&txn, picking).await?;
        txn.commit().await?;

        info!(picking = %detail.picking.name, "Picking validated");
        self.event_sender
            .send_or_log(Event::PickingValidated {
                id: detail.picking.id,
                name: detail.picking.name.clone(),
            })
            .await;
        Ok(detail)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, identifier: &str) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let picking =
            require_by_identifier::<picking::Entity, _>(&txn, identifier, "Picking").await?;
        if picking.state != PickingState::Draft {
            return Err(ServiceError::InvalidOperation(
                "Only draft pickings can be deleted".to_string(),
            ));
        }
        stock_move_line::Entity::delete_many()
            .filter(stock_move_line::Column::PickingId.eq(picking.id))
            .exec(&txn)
            .await?;
        stock_move::Entity::delete_many()
            .filter(stock_move::Column::PickingId.eq(picking.id))
            .exec(&txn)
            .await?;
        picking.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn car(tracking: Tracking) -> product::Model {
        product::Model {
            id: 1,
            name: "Sedan".into(),
            default_code: None,
            list_price: dec!(0),
            standard_price: dec!(0),
            product_type: product::ProductType::Goods,
            tracking,
            is_car: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn matching_sets_pass_regardless_of_order() {
        assert_eq!(
            delivery_mismatch("Sedan", &names(&["B", "A"]), &names(&["A", "B"])),
            None
        );
    }

    #[test]
    fn mismatch_names_missing_and_extra() {
        let message =
            delivery_mismatch("Sedan", &names(&["A", "B"]), &names(&["A", "C"])).unwrap();
        assert_eq!(
            message,
            "Delivery lots for Sedan must match selected lots on the Sale Order.\nMissing: C\nExtra: B"
        );
    }

    #[test]
    fn mismatch_omits_empty_sections() {
        let message = delivery_mismatch("Sedan", &names(&["A"]), &names(&["A", "D", "C"])).unwrap();
        assert!(message.ends_with("\nMissing: C, D"));
        assert!(!message.contains("Extra"));
    }

    #[test]
    fn serial_tracking_needs_one_lot_per_unit() {
        assert!(check_tracking(&car(Tracking::Serial), dec!(2), 2).is_ok());
        let err = check_tracking(&car(Tracking::Serial), dec!(2.0000), 1).unwrap_err();
        assert_eq!(err.to_string(), "Product 'Sedan' needs 2 serial numbers, got 1.");
        assert!(check_tracking(&car(Tracking::Lot), dec!(5), 0).is_err());
        assert!(check_tracking(&car(Tracking::None), dec!(5), 0).is_ok());
    }
}
