use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    common::deserialize_optional_date,
    db::DbPool,
    entities::{
        invoice::{self, InvoiceState, MoveType},
        invoice_line, partner, product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{require_by_identifier, sequence_name},
    services::pricing,
};

/// Name of an invoice that has not been posted yet
pub const DRAFT_NAME: &str = "/";

fn default_quantity() -> Decimal {
    Decimal::ONE
}

fn default_auto_post() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLineInput {
    pub product_id: i32,
    pub name: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    pub price_unit: Option<Decimal>,
    pub tax_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoiceInput {
    pub partner_id: Option<i32>,
    pub invoice_lines: Option<Vec<InvoiceLineInput>>,
    pub move_type: Option<MoveType>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub invoice_date_due: Option<NaiveDate>,
    pub invoice_payment_term_id: Option<i32>,
    pub narration: Option<String>,
    pub invoice_origin: Option<String>,
    #[serde(default = "default_auto_post")]
    pub auto_post: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLineChange {
    pub line_id: i32,
    pub quantity: Option<Decimal>,
    pub price_unit: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInvoiceInput {
    #[serde(default)]
    pub update_lines: Vec<InvoiceLineChange>,
    #[serde(default)]
    pub new_lines: Vec<InvoiceLineInput>,
    #[serde(default)]
    pub delete_lines: Vec<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchInvoiceInput {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub invoice_date: Option<NaiveDate>,
    pub invoice_payment_term_id: Option<i32>,
    pub narration: Option<String>,
}

impl PatchInvoiceInput {
    pub fn is_empty(&self) -> bool {
        self.invoice_date.is_none()
            && self.invoice_payment_term_id.is_none()
            && self.narration.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSummary {
    pub id: i32,
    pub name: String,
    pub customer: Option<String>,
    pub state: InvoiceState,
    pub invoice_date: Option<NaiveDate>,
    pub amount_total: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceLineView {
    pub line_id: i32,
    pub product_id: Option<i32>,
    pub product: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub price_unit: Decimal,
    pub tax_id: Option<i32>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: invoice::Model,
    pub partner: Option<String>,
    pub lines: Vec<InvoiceLineView>,
}

/// `INV/2024/` style prefix for the posting year
pub fn posting_prefix(move_type: MoveType, date: NaiveDate) -> String {
    format!("{}/{}/", move_type.sequence_prefix(), date.year())
}

fn draft_only(invoice: &invoice::Model, action: &str) -> Result<(), ServiceError> {
    if invoice.state != InvoiceState::Draft {
        return Err(ServiceError::InvalidOperation(format!(
            "Only draft invoices can be {}",
            action
        )));
    }
    Ok(())
}

async fn insert_line<C: ConnectionTrait>(
    db: &C,
    invoice_id: i32,
    input: &InvoiceLineInput,
) -> Result<invoice_line::Model, ServiceError> {
    let product = product::Entity::find_by_id(input.product_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::BadRequest(format!("Invalid product_id {}", input.product_id)))?;
    let price_unit = input.price_unit.unwrap_or(product.list_price);
    let tax = pricing::load_tax(db, input.tax_id).await?;
    let amounts = pricing::line_amounts(input.quantity, price_unit, tax.as_ref());
    Ok(invoice_line::ActiveModel {
        invoice_id: Set(invoice_id),
        product_id: Set(Some(product.id)),
        name: Set(input.name.clone().unwrap_or(product.name)),
        quantity: Set(input.quantity),
        price_unit: Set(price_unit),
        tax_id: Set(input.tax_id),
        price_subtotal: Set(amounts.subtotal),
        price_tax: Set(amounts.tax),
        price_total: Set(amounts.total),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

async fn invoice_lines<C: ConnectionTrait>(
    db: &C,
    invoice_id: i32,
) -> Result<Vec<invoice_line::Model>, ServiceError> {
    Ok(invoice_line::Entity::find()
        .filter(invoice_line::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(invoice_line::Column::Id)
        .all(db)
        .await?)
}

async fn recompute_totals<C: ConnectionTrait>(
    db: &C,
    invoice: invoice::Model,
) -> Result<invoice::Model, ServiceError> {
    let mut amounts = Vec::new();
    for line in invoice_lines(db, invoice.id).await? {
        let tax = pricing::load_tax(db, line.tax_id).await?;
        let line_amounts = pricing::line_amounts(line.quantity, line.price_unit, tax.as_ref());
        let mut active: invoice_line::ActiveModel = line.into();
        active.price_subtotal = Set(line_amounts.subtotal);
        active.price_tax = Set(line_amounts.tax);
        active.price_total = Set(line_amounts.total);
        active.update(db).await?;
        amounts.push(line_amounts);
    }
    let totals = pricing::order_totals(&amounts);
    let mut active: invoice::ActiveModel = invoice.into();
    active.amount_untaxed = Set(totals.untaxed);
    active.amount_tax = Set(totals.tax);
    active.amount_total = Set(totals.total);
    Ok(active.update(db).await?)
}

/// Names the invoice from its yearly sequence and stamps the confirmation date.
async fn post_in<C: ConnectionTrait>(
    db: &C,
    invoice: invoice::Model,
) -> Result<invoice::Model, ServiceError> {
    if invoice.state != InvoiceState::Draft {
        return Err(ServiceError::InvalidOperation(
            "Only draft invoices can be posted".to_string(),
        ));
    }
    if invoice_lines(db, invoice.id).await?.is_empty() {
        return Err(ServiceError::ValidationError(
            "Cannot post an invoice without lines.".to_string(),
        ));
    }

    let today = Utc::now().date_naive();
    let invoice_date = invoice.invoice_date.unwrap_or(today);
    let prefix = posting_prefix(invoice.move_type, invoice_date);
    let posted_this_year = invoice::Entity::find()
        .filter(invoice::Column::Name.like(format!("{}%", prefix)))
        .count(db)
        .await?;
    let name = sequence_name(&prefix, posted_this_year as i32 + 1);

    let due = invoice.invoice_date_due.unwrap_or(invoice_date);
    let mut active: invoice::ActiveModel = invoice.into();
    active.name = Set(name);
    active.invoice_date = Set(Some(invoice_date));
    active.invoice_date_due = Set(Some(due));
    active.confirmed_by = Set(Some(today));
    active.state = Set(InvoiceState::Posted);
    Ok(active.update(db).await?)
}

#[derive(Clone)]
pub struct InvoiceService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl InvoiceService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, currency: String) -> Self {
        Self {
            db_pool,
            event_sender,
            currency,
        }
    }

    async fn find<C: ConnectionTrait>(
        &self,
        db: &C,
        identifier: &str,
    ) -> Result<invoice::Model, ServiceError> {
        require_by_identifier::<invoice::Entity, _>(db, identifier, "Invoice").await
    }

    /// Customer invoices unless another move type is asked for
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        move_type: Option<MoveType>,
    ) -> Result<Vec<InvoiceSummary>, ServiceError> {
        let db = &*self.db_pool;
        let invoices = invoice::Entity::find()
            .filter(invoice::Column::MoveType.eq(move_type.unwrap_or(MoveType::OutInvoice)))
            .order_by_desc(invoice::Column::Id)
            .all(db)
            .await?;
        let mut summaries = Vec::with_capacity(invoices.len());
        for inv in invoices {
            let customer = partner::Entity::find_by_id(inv.partner_id)
                .one(db)
                .await?
                .map(|p| p.name);
            summaries.push(InvoiceSummary {
                id: inv.id,
                name: inv.name,
                customer,
                state: inv.state,
                invoice_date: inv.invoice_date,
                amount_total: inv.amount_total,
                currency: inv.currency,
            });
        }
        Ok(summaries)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, identifier: &str) -> Result<InvoiceDetail, ServiceError> {
        let db = &*self.db_pool;
        let invoice = self.find(db, identifier).await?;
        self.detail(db, invoice).await
    }

    async fn detail<C: ConnectionTrait>(
        &self,
        db: &C,
        invoice: invoice::Model,
    ) -> Result<InvoiceDetail, ServiceError> {
        let mut lines = Vec::new();
        for line in invoice_lines(db, invoice.id).await? {
            let product = match line.product_id {
                Some(id) => product::Entity::find_by_id(id).one(db).await?.map(|p| p.name),
                None => None,
            };
            lines.push(InvoiceLineView {
                line_id: line.id,
                product_id: line.product_id,
                product,
                description: line.name,
                quantity: line.quantity,
                price_unit: line.price_unit,
                tax_id: line.tax_id,
                subtotal: line.price_subtotal,
                tax: line.price_tax,
                total: line.price_total,
            });
        }
        let partner = partner::Entity::find_by_id(invoice.partner_id)
            .one(db)
            .await?
            .map(|p| p.name);
        Ok(InvoiceDetail {
            invoice,
            partner,
            lines,
        })
    }

    /// Creates the invoice and posts it unless `auto_post` is off.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateInvoiceInput) -> Result<invoice::Model, ServiceError> {
        let (partner_id, lines) = match (input.partner_id, input.invoice_lines) {
            (Some(partner_id), Some(lines)) if !lines.is_empty() => (partner_id, lines),
            _ => {
                return Err(ServiceError::BadRequest(
                    "partner_id and invoice_lines required".to_string(),
                ))
            }
        };

        let txn = self.db_pool.begin().await?;
        if partner::Entity::find_by_id(partner_id).one(&txn).await?.is_none() {
            return Err(ServiceError::BadRequest("Invalid partner_id".to_string()));
        }
        let invoice = invoice::ActiveModel {
            name: Set(DRAFT_NAME.to_string()),
            move_type: Set(input.move_type.unwrap_or(MoveType::OutInvoice)),
            partner_id: Set(partner_id),
            state: Set(InvoiceState::Draft),
            invoice_date: Set(input.invoice_date),
            invoice_date_due: Set(input.invoice_date_due),
            invoice_payment_term_id: Set(input.invoice_payment_term_id),
            narration: Set(input.narration),
            invoice_origin: Set(input.invoice_origin),
            confirmed_by: Set(None),
            currency: Set(self.currency.clone()),
            amount_untaxed: Set(Decimal::ZERO),
            amount_tax: Set(Decimal::ZERO),
            amount_total: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        for line in &lines {
            insert_line(&txn, invoice.id, line).await?;
        }
        let mut invoice = recompute_totals(&txn, invoice).await?;
        if input.auto_post {
            invoice = post_in(&txn, invoice).await?;
        }
        txn.commit().await?;

        info!(invoice_id = invoice.id, name = %invoice.name, "Invoice created");
        self.event_sender
            .send_or_log(Event::InvoiceCreated(invoice.id))
            .await;
        if invoice.state == InvoiceState::Posted {
            self.event_sender
                .send_or_log(Event::InvoicePosted {
                    id: invoice.id,
                    name: invoice.name.clone(),
                })
                .await;
        }
        Ok(invoice)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        identifier: &str,
        input: UpdateInvoiceInput,
    ) -> Result<InvoiceDetail, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let invoice = self.find(&txn, identifier).await?;
        draft_only(&invoice, "updated")?;

        for change in input.update_lines {
            let line = self.line_of(&txn, &invoice, change.line_id).await?;
            let mut active: invoice_line::ActiveModel = line.into();
            if let Some(quantity) = change.quantity {
                active.quantity = Set(quantity);
            }
            if let Some(price_unit) = change.price_unit {
                active.price_unit = Set(price_unit);
            }
            active.update(&txn).await?;
        }
        for new_line in &input.new_lines {
            insert_line(&txn, invoice.id, new_line).await?;
        }
        for line_id in input.delete_lines {
            let line = self.line_of(&txn, &invoice, line_id).await?;
            line.delete(&txn).await?;
        }

        let invoice = recompute_totals(&txn, invoice).await?;
        let detail = self.detail(&txn, invoice).await?;
        txn.commit().await?;
        Ok(detail)
    }

    async fn line_of<C: ConnectionTrait>(
        &self,
        db: &C,
        invoice: &invoice::Model,
        line_id: i32,
    ) -> Result<invoice_line::Model, ServiceError> {
        invoice_line::Entity::find_by_id(line_id)
            .filter(invoice_line::Column::InvoiceId.eq(invoice.id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice line"))
    }

    #[instrument(skip(self, input))]
    pub async fn patch(
        &self,
        identifier: &str,
        input: PatchInvoiceInput,
    ) -> Result<invoice::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let invoice = self.find(&txn, identifier).await?;
        draft_only(&invoice, "updated")?;
        if input.is_empty() {
            return Err(ServiceError::BadRequest(
                "No valid fields to update".to_string(),
            ));
        }
        let mut active: invoice::ActiveModel = invoice.into();
        if let Some(date) = input.invoice_date {
            active.invoice_date = Set(Some(date));
        }
        if let Some(term) = input.invoice_payment_term_id {
            active.invoice_payment_term_id = Set(Some(term));
        }
        if let Some(narration) = input.narration {
            active.narration = Set(Some(narration));
        }
        let invoice = active.update(&txn).await?;
        txn.commit().await?;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, identifier: &str) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let invoice = self.find(&txn, identifier).await?;
        draft_only(&invoice, "deleted")?;
        invoice_line::Entity::delete_many()
            .filter(invoice_line::Column::InvoiceId.eq(invoice.id))
            .exec(&txn)
            .await?;
        invoice.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn post(&self, identifier: &str) -> Result<invoice::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let invoice = self.find(&txn, identifier).await?;
        let invoice = post_in(&txn, invoice).await?;
        txn.commit().await?;

        info!(name = %invoice.name, "Invoice posted");
        self.event_sender
            .send_or_log(Event::InvoicePosted {
                id: invoice.id,
                name: invoice.name.clone(),
            })
            .await;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, identifier: &str) -> Result<invoice::Model, ServiceError> {
        let invoice = self.find(&*self.db_pool, identifier).await?;
        if invoice.state == InvoiceState::Cancel {
            return Err(ServiceError::InvalidOperation(
                "Invoice is already cancelled".to_string(),
            ));
        }
        let mut active: invoice::ActiveModel = invoice.into();
        active.state = Set(InvoiceState::Cancel);
        let invoice = active.update(&*self.db_pool).await?;

        self.event_sender
            .send_or_log(Event::InvoiceCancelled(invoice.id))
            .await;
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn posting_prefix_uses_move_type_and_year() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(posting_prefix(MoveType::OutInvoice, date), "INV/2024/");
        assert_eq!(posting_prefix(MoveType::InInvoice, date), "BILL/2024/");
        assert_eq!(
            sequence_name(&posting_prefix(MoveType::OutInvoice, date), 7),
            "INV/2024/00007"
        );
    }

    #[test]
    fn auto_post_defaults_on() {
        let input: CreateInvoiceInput = serde_json::from_value(serde_json::json!({
            "partner_id": 1,
            "invoice_lines": [{"product_id": 2}]
        }))
        .unwrap();
        assert!(input.auto_post);
        assert_eq!(input.invoice_lines.unwrap()[0].quantity, Decimal::ONE);
    }

    #[test]
    fn non_draft_invoices_are_locked() {
        let invoice = invoice::Model {
            id: 1,
            name: "INV/2024/00001".into(),
            move_type: MoveType::OutInvoice,
            partner_id: 1,
            state: InvoiceState::Posted,
            invoice_date: None,
            invoice_date_due: None,
            invoice_payment_term_id: None,
            narration: None,
            invoice_origin: None,
            confirmed_by: None,
            currency: "USD".into(),
            amount_untaxed: Decimal::ZERO,
            amount_tax: Decimal::ZERO,
            amount_total: Decimal::ZERO,
            created_at: Utc::now(),
        };
        assert_matches!(
            draft_only(&invoice, "deleted"),
            Err(ServiceError::InvalidOperation(ref m)) if m == "Only draft invoices can be deleted"
        );
    }
}
