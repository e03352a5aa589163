use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    entities::{partner, purchase_order},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent { email: String },
    /// The vendor has no address on file
    Skipped,
}

/// Tells a vendor that a purchase order was raised for them.
#[async_trait]
pub trait VendorNotifier: Send + Sync {
    async fn purchase_order_raised(
        &self,
        vendor: &partner::Model,
        order: &purchase_order::Model,
    ) -> Result<NotificationOutcome, ServiceError>;
}

/// Publishes vendor notifications on the event bus for a mailer to pick up.
#[derive(Clone)]
pub struct EventNotifier {
    event_sender: Arc<EventSender>,
}

impl EventNotifier {
    pub fn new(event_sender: Arc<EventSender>) -> Self {
        Self { event_sender }
    }
}

#[async_trait]
impl VendorNotifier for EventNotifier {
    async fn purchase_order_raised(
        &self,
        vendor: &partner::Model,
        order: &purchase_order::Model,
    ) -> Result<NotificationOutcome, ServiceError> {
        let Some(email) = vendor.email.as_deref().filter(|e| !e.trim().is_empty()) else {
            warn!("No email found for vendor {}", vendor.name);
            return Ok(NotificationOutcome::Skipped);
        };

        self.event_sender
            .send(Event::VendorNotified {
                partner_id: vendor.id,
                email: email.to_string(),
                purchase_order: order.name.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;
        info!(vendor = %vendor.name, purchase_order = %order.name, "Vendor notified");
        Ok(NotificationOutcome::Sent {
            email: email.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tokio::sync::mpsc;

    fn vendor(email: Option<&str>) -> partner::Model {
        partner::Model {
            id: 3,
            name: "Autohaus".into(),
            email: email.map(str::to_string),
            phone: None,
            created_at: Utc::now(),
        }
    }

    fn order() -> purchase_order::Model {
        purchase_order::Model {
            id: 9,
            name: "P00009".into(),
            partner_id: 3,
            state: purchase_order::PurchaseState::Draft,
            date_order: Utc::now(),
            notes: None,
            origin: Some("SUB/00001".into()),
            currency: "USD".into(),
            is_closed_operation: false,
            amount_untaxed: Decimal::ZERO,
            amount_tax: Decimal::ZERO,
            amount_total: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn vendor_without_email_is_skipped() {
        let (tx, mut rx) = mpsc::channel(4);
        let notifier = EventNotifier::new(Arc::new(EventSender::new(tx)));

        let outcome = notifier
            .purchase_order_raised(&vendor(None), &order())
            .await
            .unwrap();

        assert_eq!(outcome, NotificationOutcome::Skipped);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn vendor_with_email_gets_an_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let notifier = EventNotifier::new(Arc::new(EventSender::new(tx)));

        let outcome = notifier
            .purchase_order_raised(&vendor(Some("sales@autohaus.example")), &order())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            NotificationOutcome::Sent {
                email: "sales@autohaus.example".into()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::VendorNotified {
                partner_id: 3,
                email: "sales@autohaus.example".into(),
                purchase_order: "P00009".into(),
            }
        );
    }
}
