use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::entities::tax;
use crate::errors::ServiceError;
use crate::repositories::get_by_id;

/// Computed amounts of one order or invoice line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LineAmounts {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Header totals, the sum of the line amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OrderTotals {
    pub untaxed: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Line amounts for `qty` at `price_unit`, optionally taxed.
///
/// A percent tax adds `subtotal * amount / 100`. A price-inclusive tax treats
/// the gross amount as the total and backs the subtotal out of it.
pub fn line_amounts(qty: Decimal, price_unit: Decimal, tax: Option<&tax::Model>) -> LineAmounts {
    let gross = qty * price_unit;
    let Some(tax) = tax else {
        let subtotal = round_money(gross);
        return LineAmounts {
            subtotal,
            tax: Decimal::ZERO,
            total: subtotal,
        };
    };

    let rate = tax.amount / Decimal::ONE_HUNDRED;
    if tax.price_include {
        let total = round_money(gross);
        let subtotal = round_money(gross / (Decimal::ONE + rate));
        LineAmounts {
            subtotal,
            tax: total - subtotal,
            total,
        }
    } else {
        let subtotal = round_money(gross);
        let tax = round_money(gross * rate);
        LineAmounts {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}

pub fn order_totals<'a, I>(lines: I) -> OrderTotals
where
    I: IntoIterator<Item = &'a LineAmounts>,
{
    lines
        .into_iter()
        .fold(OrderTotals::default(), |acc, line| OrderTotals {
            untaxed: acc.untaxed + line.subtotal,
            tax: acc.tax + line.tax,
            total: acc.total + line.total,
        })
}

/// Loads the referenced tax, failing with 404 for unknown ids
pub async fn load_tax<C: ConnectionTrait>(
    db: &C,
    tax_id: Option<i32>,
) -> Result<Option<tax::Model>, ServiceError> {
    match tax_id {
        Some(id) => Ok(Some(get_by_id::<tax::Entity, C>(db, id, "Tax").await?)),
        None => Ok(None),
    }
}
