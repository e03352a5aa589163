use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event after the owning transaction committed; a closed channel only logs.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

// Domain events emitted after a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    // Purchase events
    PurchaseOrderCreated { id: i32, name: String },
    PurchaseOrderConfirmed { id: i32, picking_id: i32 },
    PurchaseOrderCancelled(i32),
    PurchaseOrderRepeated { source_id: i32, id: i32, name: String },
    PurchaseOrderClosed(i32),

    // Sale events
    SaleOrderCreated { id: i32, name: String },
    SaleOrderConfirmed { id: i32, picking_id: Option<i32> },
    SaleOrderCancelled(i32),

    // Inventory events
    PickingCreated { id: i32, name: String },
    PickingValidated { id: i32, name: String },

    // Customs events
    CustomsOperationCreated { id: i32, name: String },
    CustomsOperationConfirmed { id: i32, lots: usize },
    CustomsOperationCancelled(i32),
    LotCustomsIdAssigned { lot_id: i32, custom_id: String },

    // Accounting events
    InvoiceCreated(i32),
    InvoicePosted { id: i32, name: String },
    InvoiceCancelled(i32),

    // Subscription events
    SubscriptionStarted(i32),
    SubscriptionClosed(i32),
    SubscriptionPurchaseOrderRaised {
        subscription_id: i32,
        purchase_order_id: i32,
        name: String,
    },
    SubscriptionRunFailed { subscription_id: i32, error: String },
    VendorNotified {
        partner_id: i32,
        email: String,
        purchase_order: String,
    },

    // HR events
    EmployeeCreated(i32),
    TimeOffRequested { id: i32, employee_id: i32 },
    AttachmentUploaded {
        id: i32,
        res_model: String,
        res_id: i32,
    },
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::SubscriptionRunFailed {
                subscription_id,
                error,
            } => {
                error!(subscription_id, error = %error, "Subscription run failed");
            }
            Event::VendorNotified {
                partner_id,
                email,
                purchase_order,
            } => {
                info!(
                    partner_id,
                    email = %email,
                    purchase_order = %purchase_order,
                    "Vendor notified about purchase order"
                );
            }
            Event::CustomsOperationConfirmed { id, lots } => {
                info!(operation_id = id, lots, "Customs operation confirmed");
            }
            other => {
                info!(event = ?other, "Received event");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_events_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender.send(Event::PurchaseOrderCancelled(1)).await.unwrap();
        sender.send_or_log(Event::SubscriptionStarted(2)).await;

        assert_eq!(rx.recv().await, Some(Event::PurchaseOrderCancelled(1)));
        assert_eq!(rx.recv().await, Some(Event::SubscriptionStarted(2)));
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::InvoiceCreated(9)).await.is_err());
        // Must not panic
        sender.send_or_log(Event::InvoiceCreated(9)).await;
    }
}
