use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub default_code: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub list_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub standard_price: Decimal,
    pub product_type: ProductType,
    pub tracking: Tracking,
    pub is_car: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_lot::Entity")]
    Lots,
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Lot selection and serial checks apply to these products
    pub fn is_tracked(&self) -> bool {
        self.tracking != Tracking::None
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductType {
    #[sea_orm(string_value = "consu")]
    #[serde(rename = "consu")]
    #[strum(serialize = "consu")]
    Goods,
    #[sea_orm(string_value = "service")]
    Service,
    #[sea_orm(string_value = "combo")]
    Combo,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Tracking {
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "lot")]
    Lot,
    #[sea_orm(string_value = "serial")]
    Serial,
}
