use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        partner,
        product::{self, ProductType, Tracking},
        stock_lot, tax,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{get_by_id, lot_repository},
    services::customs,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePartnerInput {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1))]
    pub name: String,
    pub default_code: Option<String>,
    #[serde(default)]
    pub list_price: Decimal,
    #[serde(default)]
    pub standard_price: Decimal,
    pub product_type: Option<ProductType>,
    pub tracking: Option<Tracking>,
    #[serde(default)]
    pub is_car: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub default_code: Option<String>,
    pub list_price: Option<Decimal>,
    pub standard_price: Option<Decimal>,
    pub product_type: Option<ProductType>,
    pub tracking: Option<Tracking>,
    pub is_car: Option<bool>,
}

impl UpdateProductInput {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.default_code.is_none()
            && self.list_price.is_none()
            && self.standard_price.is_none()
            && self.product_type.is_none()
            && self.tracking.is_none()
            && self.is_car.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTaxInput {
    #[validate(length(min = 1))]
    pub name: String,
    pub amount: Decimal,
    #[serde(default)]
    pub price_include: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLotInput {
    #[validate(length(min = 1))]
    pub name: String,
    pub product_id: i32,
    pub custom_id: Option<String>,
}

/// Car products are serial tracked goods.
pub fn check_car_rules(
    is_car: bool,
    product_type: ProductType,
    tracking: Tracking,
) -> Result<(), ServiceError> {
    if !is_car {
        return Ok(());
    }
    if product_type != ProductType::Goods {
        return Err(ServiceError::ValidationError(
            "Car products must be of type 'Goods'.".to_string(),
        ));
    }
    if tracking != Tracking::Serial {
        return Err(ServiceError::ValidationError(
            "Car products must use Serial tracking.".to_string(),
        ));
    }
    Ok(())
}

/// Trims a customs identifier; blank means unset
pub fn normalize_custom_id(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Writes `custom_id` onto a lot after the uniqueness check.
///
/// A lot on a confirmed operation keeps the identifier it was confirmed with.
pub(crate) async fn assign_lot_custom_id<C: ConnectionTrait>(
    db: &C,
    lot: stock_lot::Model,
    custom_id: Option<String>,
) -> Result<stock_lot::Model, ServiceError> {
    if let Some(line) = lot_repository::confirmed_line_for_lot(db, lot.id).await? {
        if let Some(held) = lot.custom_id.clone().or(line.custom_id) {
            match custom_id.as_deref() {
                Some(requested) if requested == held => {}
                Some(requested) => {
                    return Err(customs::reassignment_error(&lot, &held, requested));
                }
                None => {
                    return Err(ServiceError::ValidationError(format!(
                        "Lot '{}' has confirmed Customs ID '{}'; it cannot be cleared.",
                        lot.name, held
                    )));
                }
            }
        }
    }
    if let Some(custom_id) = custom_id.as_deref() {
        customs::ensure_custom_id_unique(db, custom_id, Some(lot.id), None).await?;
    }
    let mut active: stock_lot::ActiveModel = lot.into();
    active.custom_id = Set(custom_id);
    Ok(active.update(db).await?)
}

/// Partners, products, taxes and lots
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_partners(&self) -> Result<Vec<partner::Model>, ServiceError> {
        Ok(partner::Entity::find()
            .order_by_asc(partner::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_partner(&self, id: i32) -> Result<partner::Model, ServiceError> {
        get_by_id::<partner::Entity, _>(&*self.db_pool, id, "Partner").await
    }

    #[instrument(skip(self))]
    pub async fn create_partner(
        &self,
        input: CreatePartnerInput,
    ) -> Result<partner::Model, ServiceError> {
        input.validate()?;
        let partner = partner::ActiveModel {
            name: Set(input.name),
            email: Set(input.email),
            phone: Set(input.phone),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;
        info!(partner_id = partner.id, "Partner created");
        Ok(partner)
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find()
            .order_by_asc(product::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i32) -> Result<product::Model, ServiceError> {
        get_by_id::<product::Entity, _>(&*self.db_pool, id, "Product").await
    }

    /// A car product is forced to serial tracked goods on create.
    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let (product_type, tracking) = if input.is_car {
            (ProductType::Goods, Tracking::Serial)
        } else {
            (
                input.product_type.unwrap_or(ProductType::Goods),
                input.tracking.unwrap_or(Tracking::None),
            )
        };
        let product = product::ActiveModel {
            name: Set(input.name),
            default_code: Set(input.default_code),
            list_price: Set(input.list_price),
            standard_price: Set(input.standard_price),
            product_type: Set(product_type),
            tracking: Set(tracking),
            is_car: Set(input.is_car),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;
        info!(product_id = product.id, is_car = product.is_car, "Product created");
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        id: i32,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        if input.is_empty() {
            return Err(ServiceError::BadRequest(
                "No valid fields to update".to_string(),
            ));
        }
        let current = get_by_id::<product::Entity, _>(&*self.db_pool, id, "Product").await?;

        let is_car = input.is_car.unwrap_or(current.is_car);
        let product_type = input.product_type.unwrap_or(current.product_type);
        // Flagging an untracked product as a car upgrades its tracking
        let tracking = match input.tracking {
            Some(tracking) => tracking,
            None if is_car && !current.is_car => Tracking::Serial,
            None => current.tracking,
        };
        check_car_rules(is_car, product_type, tracking)?;

        let mut active: product::ActiveModel = current.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(code) = input.default_code {
            active.default_code = Set(Some(code));
        }
        if let Some(price) = input.list_price {
            active.list_price = Set(price);
        }
        if let Some(price) = input.standard_price {
            active.standard_price = Set(price);
        }
        active.product_type = Set(product_type);
        active.tracking = Set(tracking);
        active.is_car = Set(is_car);
        Ok(active.update(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_taxes(&self) -> Result<Vec<tax::Model>, ServiceError> {
        Ok(tax::Entity::find()
            .order_by_asc(tax::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn create_tax(&self, input: CreateTaxInput) -> Result<tax::Model, ServiceError> {
        input.validate()?;
        if input.amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Tax amount cannot be negative.".to_string(),
            ));
        }
        Ok(tax::ActiveModel {
            name: Set(input.name),
            amount: Set(input.amount),
            price_include: Set(input.price_include),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn list_lots(
        &self,
        product_id: Option<i32>,
    ) -> Result<Vec<stock_lot::Model>, ServiceError> {
        let mut query = stock_lot::Entity::find().order_by_asc(stock_lot::Column::Id);
        if let Some(product_id) = product_id {
            query = query.filter(stock_lot::Column::ProductId.eq(product_id));
        }
        Ok(query.all(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_lot(&self, id: i32) -> Result<stock_lot::Model, ServiceError> {
        get_by_id::<stock_lot::Entity, _>(&*self.db_pool, id, "Lot").await
    }

    #[instrument(skip(self))]
    pub async fn create_lot(&self, input: CreateLotInput) -> Result<stock_lot::Model, ServiceError> {
        input.validate()?;
        let txn = self.db_pool.begin().await?;

        let product = get_by_id::<product::Entity, _>(&txn, input.product_id, "Product").await?;
        if !product.is_tracked() {
            return Err(ServiceError::ValidationError(format!(
                "Product '{}' is not tracked by lots or serial numbers.",
                product.name
            )));
        }
        let name = input.name.trim().to_string();
        if lot_repository::lot_by_name(&txn, product.id, &name)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Lot '{}' already exists for product '{}'.",
                name, product.name
            )));
        }
        let custom_id = normalize_custom_id(input.custom_id.as_deref());
        if let Some(custom_id) = custom_id.as_deref() {
            customs::ensure_custom_id_unique(&txn, custom_id, None, None).await?;
        }

        let lot = stock_lot::ActiveModel {
            name: Set(name),
            product_id: Set(product.id),
            custom_id: Set(custom_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        Ok(lot)
    }

    /// PATCH of a lot's customs identifier
    #[instrument(skip(self))]
    pub async fn set_lot_custom_id(
        &self,
        id: i32,
        custom_id: Option<String>,
    ) -> Result<stock_lot::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let lot = get_by_id::<stock_lot::Entity, _>(&txn, id, "Lot").await?;
        let custom_id = normalize_custom_id(custom_id.as_deref());
        let lot = assign_lot_custom_id(&txn, lot, custom_id).await?;
        txn.commit().await?;

        if let Some(custom_id) = lot.custom_id.clone() {
            self.event_sender
                .send_or_log(Event::LotCustomsIdAssigned {
                    lot_id: lot.id,
                    custom_id,
                })
                .await;
        }
        Ok(lot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn car_products_must_be_serial_tracked_goods() {
        assert!(check_car_rules(true, ProductType::Goods, Tracking::Serial).is_ok());
        assert!(check_car_rules(false, ProductType::Service, Tracking::None).is_ok());

        assert_matches!(
            check_car_rules(true, ProductType::Goods, Tracking::Lot),
            Err(ServiceError::ValidationError(msg)) if msg == "Car products must use Serial tracking."
        );
        assert_matches!(
            check_car_rules(true, ProductType::Service, Tracking::Serial),
            Err(ServiceError::ValidationError(msg)) if msg == "Car products must be of type 'Goods'."
        );
    }

    #[test]
    fn blank_custom_ids_are_unset() {
        assert_eq!(normalize_custom_id(Some("  ")), None);
        assert_eq!(normalize_custom_id(None), None);
        assert_eq!(
            normalize_custom_id(Some(" CUST-100 ")),
            Some("CUST-100".to_string())
        );
    }
}
