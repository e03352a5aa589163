use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sale_order_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub product_uom_qty: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub price_unit: Decimal,
    pub tax_id: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub price_subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub price_tax: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub price_total: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale_order::Entity",
        from = "Column::OrderId",
        to = "super::sale_order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(has_many = "super::sale_order_line_lot::Entity")]
    SelectedLots,
}

impl Related<super::sale_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::sale_order_line_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SelectedLots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
