use chrono::{DateTime, Duration, Months, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::{
    common::deserialize_optional_datetime,
    db::DbPool,
    entities::{
        partner, product,
        purchase_order,
        subscription::{
            self, Frequency, PaymentMethod, PaymentType, PoType, SubscriptionState,
        },
        tax,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{get_by_id, require_by_identifier, sequence_name},
    services::{
        notifications::VendorNotifier,
        pricing,
        purchases::{self, NewPurchaseOrder, PurchaseLineInput},
    },
};

fn default_one() -> Decimal {
    Decimal::ONE
}

fn default_days_to_notify() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubscriptionInput {
    pub vendor_id: i32,
    pub product_id: i32,
    pub product_description: Option<String>,
    #[serde(default)]
    pub po_type: Option<PoType>,
    #[serde(default = "default_days_to_notify")]
    pub days_to_notify: i32,
    #[serde(default = "default_one")]
    pub quantity: Decimal,
    #[serde(default = "default_one")]
    pub unit_price: Decimal,
    pub tax_id: Option<i32>,
    pub frequency: Frequency,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub last_invoice_date: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_type: Option<PaymentType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSubscriptionInput {
    pub vendor_id: Option<i32>,
    pub product_id: Option<i32>,
    pub product_description: Option<String>,
    pub po_type: Option<PoType>,
    pub days_to_notify: Option<i32>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub tax_id: Option<i32>,
    pub frequency: Option<Frequency>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub last_invoice_date: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_type: Option<PaymentType>,
}

impl UpdateSubscriptionInput {
    pub fn is_empty(&self) -> bool {
        self.vendor_id.is_none()
            && self.product_id.is_none()
            && self.product_description.is_none()
            && self.po_type.is_none()
            && self.days_to_notify.is_none()
            && self.quantity.is_none()
            && self.unit_price.is_none()
            && self.tax_id.is_none()
            && self.frequency.is_none()
            && self.start_date.is_none()
            && self.last_invoice_date.is_none()
            && self.payment_method.is_none()
            && self.payment_type.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetail {
    #[serde(flatten)]
    pub subscription: subscription::Model,
    pub po_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionPurchases {
    pub po_count: u64,
    pub purchase_orders: Vec<purchase_order::Model>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunFailure {
    pub subscription_id: i32,
    pub name: String,
    pub error: String,
}

/// Outcome of one pass of the recurring order processor
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessReport {
    pub processed: Vec<i32>,
    pub created: Vec<String>,
    pub failures: Vec<RunFailure>,
}

/// Adds one period; month based periods clamp to the end of the month.
pub fn next_occurrence(last: DateTime<Utc>, frequency: Frequency) -> DateTime<Utc> {
    let months = match frequency {
        Frequency::Daily => return last + Duration::days(1),
        Frequency::Weekly => return last + Duration::days(7),
        Frequency::Monthly => 1,
        Frequency::Quarterly => 3,
        Frequency::HalfYearly => 6,
        Frequency::Yearly => 12,
    };
    last.checked_add_months(Months::new(months)).unwrap_or(last)
}

/// `(sub_amount, amount)`: the untaxed value and the value including tax
pub fn amounts(quantity: Decimal, unit_price: Decimal, tax: Option<&tax::Model>) -> (Decimal, Decimal) {
    let line = pricing::line_amounts(quantity, unit_price, tax);
    let sub_amount = (quantity * unit_price)
        .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    (sub_amount, line.total)
}

pub fn compute_next_invoice_date(sub: &subscription::Model) -> DateTime<Utc> {
    next_occurrence(sub.last_invoice_date.unwrap_or(sub.start_date), sub.frequency)
}

pub fn is_due(sub: &subscription::Model, now: DateTime<Utc>) -> bool {
    sub.state == SubscriptionState::Running
        && sub.next_invoice_date.map_or(false, |next| next <= now)
}

fn check_positive(quantity: Decimal, unit_price: Decimal) -> Result<(), ServiceError> {
    if quantity <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Quantity must be greater than 0.".to_string(),
        ));
    }
    if unit_price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Unit price must be greater than 0.".to_string(),
        ));
    }
    Ok(())
}

/// Refreshes the stored amounts and next date from the current field values.
fn refresh_computed(sub: &mut subscription::Model, tax: Option<&tax::Model>) {
    let (sub_amount, amount) = amounts(sub.quantity, sub.unit_price, tax);
    sub.sub_amount = sub_amount;
    sub.amount = amount;
    sub.next_invoice_date = Some(compute_next_invoice_date(sub));
}

async fn save<C: ConnectionTrait>(
    db: &C,
    mut sub: subscription::Model,
) -> Result<subscription::Model, ServiceError> {
    let tax = pricing::load_tax(db, sub.tax_id).await?;
    refresh_computed(&mut sub, tax.as_ref());
    Ok(sub.into_active_model().reset_all().update(db).await?)
}

async fn po_count<C: ConnectionTrait>(db: &C, name: &str) -> Result<u64, ServiceError> {
    Ok(purchase_order::Entity::find()
        .filter(purchase_order::Column::Origin.eq(name))
        .count(db)
        .await?)
}

/// Creates the subscription's purchase order and moves its schedule forward.
pub(crate) async fn create_subscription_po<C: ConnectionTrait>(
    db: &C,
    sub: &subscription::Model,
    now: DateTime<Utc>,
    currency: &str,
) -> Result<(purchase_order::Model, subscription::Model), ServiceError> {
    let product = get_by_id::<product::Entity, _>(db, sub.product_id, "Product").await?;
    let order = purchases::create_order_in(
        db,
        NewPurchaseOrder {
            partner_id: sub.vendor_id,
            date_order: now,
            notes: None,
            origin: Some(sub.name.clone()),
            currency: currency.to_string(),
            lines: vec![PurchaseLineInput {
                product_id: product.id,
                name: Some(
                    sub.product_description
                        .clone()
                        .filter(|d| !d.trim().is_empty())
                        .unwrap_or(product.name),
                ),
                quantity: sub.quantity,
                price_unit: sub.unit_price,
                tax_id: sub.tax_id,
                date_planned: Some(now),
            }],
        },
    )
    .await?;

    let mut next = sub.clone();
    next.last_invoice_date = Some(now);
    next.purchase_order_id = Some(order.id);
    let sub = save(db, next).await?;
    Ok((order, sub))
}

#[derive(Clone)]
pub struct SubscriptionService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn VendorNotifier>,
    currency: String,
}

impl SubscriptionService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn VendorNotifier>,
        currency: String,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            notifier,
            currency,
        }
    }

    async fn find<C: ConnectionTrait>(
        &self,
        db: &C,
        identifier: &str,
    ) -> Result<subscription::Model, ServiceError> {
        require_by_identifier::<subscription::Entity, _>(db, identifier, "Subscription").await
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<subscription::Model>, ServiceError> {
        Ok(subscription::Entity::find()
            .order_by_desc(subscription::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, identifier: &str) -> Result<SubscriptionDetail, ServiceError> {
        let db = &*self.db_pool;
        let subscription = self.find(db, identifier).await?;
        let po_count = po_count(db, &subscription.name).await?;
        Ok(SubscriptionDetail {
            subscription,
            po_count,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: CreateSubscriptionInput,
    ) -> Result<subscription::Model, ServiceError> {
        check_positive(input.quantity, input.unit_price)?;

        let txn = self.db_pool.begin().await?;
        get_by_id::<partner::Entity, _>(&txn, input.vendor_id, "Vendor").await?;
        get_by_id::<product::Entity, _>(&txn, input.product_id, "Product").await?;
        pricing::load_tax(&txn, input.tax_id).await?;

        let draft = subscription::ActiveModel {
            name: Set(format!("SUB/draft/{}", uuid::Uuid::new_v4())),
            vendor_id: Set(input.vendor_id),
            product_id: Set(input.product_id),
            product_description: Set(input.product_description),
            po_type: Set(input.po_type.unwrap_or(PoType::Regular)),
            days_to_notify: Set(input.days_to_notify),
            quantity: Set(input.quantity),
            unit_price: Set(input.unit_price),
            tax_id: Set(input.tax_id),
            frequency: Set(input.frequency),
            start_date: Set(input.start_date.unwrap_or_else(Utc::now)),
            last_invoice_date: Set(input.last_invoice_date),
            next_invoice_date: Set(None),
            sub_amount: Set(Decimal::ZERO),
            amount: Set(Decimal::ZERO),
            payment_method: Set(input.payment_method.unwrap_or(PaymentMethod::Manual)),
            payment_type: Set(input.payment_type.unwrap_or(PaymentType::Bank)),
            purchase_order_id: Set(None),
            state: Set(SubscriptionState::Draft),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut next = draft;
        next.name = sequence_name("SUB/", next.id);
        let subscription = save(&txn, next).await?;
        txn.commit().await?;

        info!(subscription = %subscription.name, "Subscription created");
        Ok(subscription)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        identifier: &str,
        input: UpdateSubscriptionInput,
    ) -> Result<subscription::Model, ServiceError> {
        if input.is_empty() {
            return Err(ServiceError::BadRequest(
                "No valid fields to update".to_string(),
            ));
        }
        let txn = self.db_pool.begin().await?;
        let current = self.find(&txn, identifier).await?;
        check_positive(
            input.quantity.unwrap_or(current.quantity),
            input.unit_price.unwrap_or(current.unit_price),
        )?;

        let mut next = current;
        if let Some(vendor_id) = input.vendor_id {
            get_by_id::<partner::Entity, _>(&txn, vendor_id, "Vendor").await?;
            next.vendor_id = vendor_id;
        }
        if let Some(product_id) = input.product_id {
            get_by_id::<product::Entity, _>(&txn, product_id, "Product").await?;
            next.product_id = product_id;
        }
        if let Some(tax_id) = input.tax_id {
            next.tax_id = Some(tax_id);
        }
        if let Some(description) = input.product_description {
            next.product_description = Some(description);
        }
        next.po_type = input.po_type.unwrap_or(next.po_type);
        next.days_to_notify = input.days_to_notify.unwrap_or(next.days_to_notify);
        next.quantity = input.quantity.unwrap_or(next.quantity);
        next.unit_price = input.unit_price.unwrap_or(next.unit_price);
        next.frequency = input.frequency.unwrap_or(next.frequency);
        next.start_date = input.start_date.unwrap_or(next.start_date);
        if let Some(last) = input.last_invoice_date {
            next.last_invoice_date = Some(last);
        }
        next.payment_method = input.payment_method.unwrap_or(next.payment_method);
        next.payment_type = input.payment_type.unwrap_or(next.payment_type);
        let subscription = save(&txn, next).await?;
        txn.commit().await?;
        Ok(subscription)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, identifier: &str) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let subscription = self.find(db, identifier).await?;
        if subscription.state == SubscriptionState::Running {
            return Err(ServiceError::InvalidOperation(
                "Running subscriptions cannot be deleted; close them first.".to_string(),
            ));
        }
        subscription.delete(db).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn start(&self, identifier: &str) -> Result<subscription::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let current = self.find(&txn, identifier).await?;
        if current.state != SubscriptionState::Draft {
            return Err(ServiceError::InvalidOperation(
                "Only draft subscriptions can be started.".to_string(),
            ));
        }
        let mut next = current;
        next.state = SubscriptionState::Running;
        next.last_invoice_date = Some(next.last_invoice_date.unwrap_or_else(Utc::now));
        let subscription = save(&txn, next).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::SubscriptionStarted(subscription.id))
            .await;
        Ok(subscription)
    }

    #[instrument(skip(self))]
    pub async fn close(&self, identifier: &str) -> Result<subscription::Model, ServiceError> {
        let db = &*self.db_pool;
        let current = self.find(db, identifier).await?;
        if current.state == SubscriptionState::Closed {
            return Err(ServiceError::InvalidOperation(
                "Subscription is already closed.".to_string(),
            ));
        }
        let mut active: subscription::ActiveModel = current.into();
        active.state = Set(SubscriptionState::Closed);
        let subscription = active.update(db).await?;

        self.event_sender
            .send_or_log(Event::SubscriptionClosed(subscription.id))
            .await;
        Ok(subscription)
    }

    /// Raises a purchase order now, outside the schedule.
    #[instrument(skip(self))]
    pub async fn raise_po(&self, identifier: &str) -> Result<purchase_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let current = self.find(&txn, identifier).await?;
        if current.state != SubscriptionState::Running {
            return Err(ServiceError::InvalidOperation(
                "Subscription must be running to raise a Purchase Order.".to_string(),
            ));
        }
        let (order, subscription) =
            create_subscription_po(&txn, &current, Utc::now(), &self.currency).await?;
        txn.commit().await?;

        info!(subscription = %subscription.name, purchase_order = %order.name, "Purchase Order raised");
        self.event_sender
            .send_or_log(Event::SubscriptionPurchaseOrderRaised {
                subscription_id: subscription.id,
                purchase_order_id: order.id,
                name: order.name.clone(),
            })
            .await;
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn purchases(&self, identifier: &str) -> Result<SubscriptionPurchases, ServiceError> {
        let db = &*self.db_pool;
        let subscription = self.find(db, identifier).await?;
        let purchase_orders = purchase_order::Entity::find()
            .filter(purchase_order::Column::Origin.eq(subscription.name.as_str()))
            .order_by_desc(purchase_order::Column::Id)
            .all(db)
            .await?;
        Ok(SubscriptionPurchases {
            po_count: purchase_orders.len() as u64,
            purchase_orders,
        })
    }

    /// Raises an order for every running subscription due at `now`.
    ///
    /// Each subscription runs in its own transaction; a failure is recorded and
    /// the batch moves on.
    #[instrument(skip(self))]
    pub async fn process_due_subscriptions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ProcessReport, ServiceError> {
        let due: Vec<subscription::Model> = subscription::Entity::find()
            .filter(subscription::Column::State.eq(SubscriptionState::Running))
            .order_by_asc(subscription::Column::Id)
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .filter(|sub| is_due(sub, now))
            .collect();
        info!("Found {} subscriptions to process", due.len());

        let mut report = ProcessReport::default();
        for sub in due {
            report.processed.push(sub.id);
            match self.run_one(sub.id, now).await {
                Ok(order) => {
                    counter!("dealership_subscriptions.runs", 1, "outcome" => "success");
                    self.event_sender
                        .send_or_log(Event::SubscriptionPurchaseOrderRaised {
                            subscription_id: sub.id,
                            purchase_order_id: order.id,
                            name: order.name.clone(),
                        })
                        .await;
                    report.created.push(order.name);
                }
                Err(err) => {
                    counter!("dealership_subscriptions.runs", 1, "outcome" => "failure");
                    error!("Error processing {}: {}", sub.name, err);
                    self.event_sender
                        .send_or_log(Event::SubscriptionRunFailed {
                            subscription_id: sub.id,
                            error: err.to_string(),
                        })
                        .await;
                    report.failures.push(RunFailure {
                        subscription_id: sub.id,
                        name: sub.name,
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn run_one(
        &self,
        subscription_id: i32,
        now: DateTime<Utc>,
    ) -> Result<purchase_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let sub = get_by_id::<subscription::Entity, _>(&txn, subscription_id, "Subscription").await?;
        if !is_due(&sub, now) {
            return Err(ServiceError::InvalidOperation(format!(
                "Subscription {} is no longer due.",
                sub.name
            )));
        }
        let (mut order, sub) = create_subscription_po(&txn, &sub, now, &self.currency).await?;
        if sub.payment_method == PaymentMethod::Automatic {
            order = purchases::confirm_in(&txn, order).await?.0;
        }
        txn.commit().await?;

        // The order is committed; notification problems only get logged.
        match partner::Entity::find_by_id(sub.vendor_id)
            .one(&*self.db_pool)
            .await
        {
            Ok(Some(vendor)) => {
                if let Err(err) = self.notifier.purchase_order_raised(&vendor, &order).await {
                    warn!(subscription = %sub.name, error = %err, "Vendor notification failed");
                }
            }
            Ok(None) => {
                warn!(subscription = %sub.name, "Vendor record missing; notification skipped")
            }
            Err(err) => {
                warn!(subscription = %sub.name, error = %err, "Vendor lookup failed; notification skipped")
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[rstest]
    #[case(at(2024, 1, 1), Frequency::Daily, at(2024, 1, 2))]
    #[case(at(2024, 1, 1), Frequency::Weekly, at(2024, 1, 8))]
    #[case(at(2024, 1, 1), Frequency::Monthly, at(2024, 2, 1))]
    #[case(at(2024, 1, 31), Frequency::Monthly, at(2024, 2, 29))]
    #[case(at(2023, 11, 30), Frequency::Quarterly, at(2024, 2, 29))]
    #[case(at(2024, 8, 31), Frequency::HalfYearly, at(2025, 2, 28))]
    #[case(at(2024, 2, 29), Frequency::Yearly, at(2025, 2, 28))]
    fn next_occurrence_adds_one_period(
        #[case] last: DateTime<Utc>,
        #[case] frequency: Frequency,
        #[case] expected: DateTime<Utc>,
    ) {
        assert_eq!(next_occurrence(last, frequency), expected);
    }

    #[test]
    fn amounts_include_tax() {
        let ten_percent = tax::Model {
            id: 1,
            name: "10%".into(),
            amount: dec!(10),
            price_include: false,
        };
        assert_eq!(amounts(dec!(3), dec!(10), None), (dec!(30), dec!(30)));
        assert_eq!(
            amounts(dec!(3), dec!(10), Some(&ten_percent)),
            (dec!(30), dec!(33))
        );
    }

    #[test]
    fn positive_quantity_and_price_required() {
        assert_eq!(
            check_positive(dec!(0), dec!(5)).unwrap_err().to_string(),
            "Quantity must be greater than 0."
        );
        assert_eq!(
            check_positive(dec!(1), dec!(-1)).unwrap_err().to_string(),
            "Unit price must be greater than 0."
        );
    }

    #[test]
    fn only_running_subscriptions_past_their_date_are_due() {
        let mut sub = subscription::Model {
            id: 1,
            name: "SUB/00001".into(),
            vendor_id: 1,
            product_id: 1,
            product_description: None,
            po_type: PoType::Regular,
            days_to_notify: 1,
            quantity: dec!(1),
            unit_price: dec!(1),
            tax_id: None,
            frequency: Frequency::Monthly,
            start_date: at(2024, 1, 1),
            last_invoice_date: Some(at(2024, 1, 1)),
            next_invoice_date: Some(at(2024, 2, 1)),
            sub_amount: dec!(1),
            amount: dec!(1),
            payment_method: PaymentMethod::Manual,
            payment_type: PaymentType::Bank,
            purchase_order_id: None,
            state: SubscriptionState::Running,
            created_at: at(2024, 1, 1),
        };
        assert!(is_due(&sub, at(2024, 2, 1)));
        assert!(!is_due(&sub, at(2024, 1, 31)));

        sub.state = SubscriptionState::Closed;
        assert!(!is_due(&sub, at(2024, 3, 1)));
        assert_eq!(compute_next_invoice_date(&sub), at(2024, 2, 1));
    }
}
