use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Detailed operation of a move; carries the lot actually picked
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_move_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub move_id: i32,
    pub picking_id: i32,
    pub product_id: i32,
    pub lot_id: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_move::Entity",
        from = "Column::MoveId",
        to = "super::stock_move::Column::Id",
        on_delete = "Cascade"
    )]
    Move,
}

impl Related<super::stock_move::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Move.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
