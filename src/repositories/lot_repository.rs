use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use std::collections::HashMap;

use crate::entities::{
    customs_operation::{self, CustomsStatus},
    customs_operation_line, stock_lot,
};

/// Lot holding `custom_id`, ignoring `except_lot`
pub async fn lot_with_custom_id<C: ConnectionTrait>(
    db: &C,
    custom_id: &str,
    except_lot: Option<i32>,
) -> Result<Option<stock_lot::Model>, DbErr> {
    let mut query = stock_lot::Entity::find().filter(stock_lot::Column::CustomId.eq(custom_id));
    if let Some(lot_id) = except_lot {
        query = query.filter(stock_lot::Column::Id.ne(lot_id));
    }
    query.one(db).await
}

/// Operation line holding `custom_id`, ignoring `except_line` and lines of `except_lot`
pub async fn line_with_custom_id<C: ConnectionTrait>(
    db: &C,
    custom_id: &str,
    except_line: Option<i32>,
    except_lot: Option<i32>,
) -> Result<Option<customs_operation_line::Model>, DbErr> {
    let mut query = customs_operation_line::Entity::find()
        .filter(customs_operation_line::Column::CustomId.eq(custom_id));
    if let Some(line_id) = except_line {
        query = query.filter(customs_operation_line::Column::Id.ne(line_id));
    }
    if let Some(lot_id) = except_lot {
        query = query.filter(
            Condition::any()
                .add(customs_operation_line::Column::LotId.ne(lot_id))
                .add(customs_operation_line::Column::LotId.is_null()),
        );
    }
    query.one(db).await
}

/// Line of a confirmed operation that carries `lot_id`
pub async fn confirmed_line_for_lot<C: ConnectionTrait>(
    db: &C,
    lot_id: i32,
) -> Result<Option<customs_operation_line::Model>, DbErr> {
    customs_operation_line::Entity::find()
        .inner_join(customs_operation::Entity)
        .filter(customs_operation_line::Column::LotId.eq(lot_id))
        .filter(customs_operation::Column::Status.eq(CustomsStatus::Confirmed))
        .one(db)
        .await
}

pub async fn lots_by_id<C: ConnectionTrait>(
    db: &C,
    ids: &[i32],
) -> Result<HashMap<i32, stock_lot::Model>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let lots = stock_lot::Entity::find()
        .filter(stock_lot::Column::Id.is_in(ids.to_vec()))
        .order_by_asc(stock_lot::Column::Id)
        .all(db)
        .await?;
    Ok(lots.into_iter().map(|lot| (lot.id, lot)).collect())
}

pub async fn lot_by_name<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
    name: &str,
) -> Result<Option<stock_lot::Model>, DbErr> {
    stock_lot::Entity::find()
        .filter(stock_lot::Column::ProductId.eq(product_id))
        .filter(stock_lot::Column::Name.eq(name))
        .one(db)
        .await
}
