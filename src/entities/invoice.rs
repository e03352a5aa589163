use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Customer invoice or vendor bill
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// `/` until the invoice is posted
    pub name: String,
    pub move_type: MoveType,
    pub partner_id: i32,
    pub state: InvoiceState,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_date_due: Option<NaiveDate>,
    pub invoice_payment_term_id: Option<i32>,
    pub narration: Option<String>,
    pub invoice_origin: Option<String>,
    /// Date the invoice was posted
    pub confirmed_by: Option<NaiveDate>,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub amount_untaxed: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub amount_tax: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub amount_total: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoice_line::Entity")]
    Lines,
}

impl Related<super::invoice_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MoveType {
    #[sea_orm(string_value = "out_invoice")]
    OutInvoice,
    #[sea_orm(string_value = "in_invoice")]
    InInvoice,
}

impl MoveType {
    pub fn sequence_prefix(self) -> &'static str {
        match self {
            MoveType::OutInvoice => "INV",
            MoveType::InInvoice => "BILL",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceState {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "posted")]
    Posted,
    #[sea_orm(string_value = "cancel")]
    Cancel,
}
