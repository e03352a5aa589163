use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lots selected on a sale order line
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sale_order_line_lots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub sale_line_id: i32,
    pub lot_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale_order_line::Entity",
        from = "Column::SaleLineId",
        to = "super::sale_order_line::Column::Id",
        on_delete = "Cascade"
    )]
    SaleLine,
    #[sea_orm(
        belongs_to = "super::stock_lot::Entity",
        from = "Column::LotId",
        to = "super::stock_lot::Column::Id"
    )]
    Lot,
}

impl Related<super::sale_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleLine.def()
    }
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
