use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::picking::PickingState;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_moves")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub picking_id: i32,
    pub product_id: i32,
    pub name: String,
    /// Demand
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub product_uom_qty: Decimal,
    /// Done quantity
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    pub state: PickingState,
    pub purchase_line_id: Option<i32>,
    pub sale_line_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::picking::Entity",
        from = "Column::PickingId",
        to = "super::picking::Column::Id",
        on_delete = "Cascade"
    )]
    Picking,
    #[sea_orm(has_many = "super::stock_move_line::Entity")]
    MoveLines,
}

impl Related<super::picking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Picking.def()
    }
}

impl Related<super::stock_move_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MoveLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
